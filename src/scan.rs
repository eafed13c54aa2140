// 该文件是 Kanmen （看门） 项目的一部分。
// src/scan.rs - 单个视频的人物扫描
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt::Display;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  input::{FrameSampler, VideoFile, VideoOpener, VideoSource},
  model::{DetectResult, Model},
  output::Render,
};

/// 默认抽帧步长
pub const DEFAULT_STRIDE: NonZeroU64 = match NonZeroU64::new(3) {
  Some(n) => n,
  None => unreachable!(),
};

/// 扫描状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
  Opening,
  Sampling,
  Found,
  Exhausted,
  Failed,
}

/// 扫描的终态
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
  /// 第一次出现人物的帧；快照写入失败时 `snapshot` 为空
  Found {
    frame_index: u64,
    snapshot: Option<PathBuf>,
  },
  /// 采样结束仍未发现人物
  Exhausted { sampled: u64 },
  /// 视频无法打开或读不到帧数，按未检出处理
  Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
  video: PathBuf,
  outcome: ScanOutcome,
}

impl ScanResult {
  pub fn new(video: impl Into<PathBuf>, outcome: ScanOutcome) -> Self {
    Self {
      video: video.into(),
      outcome,
    }
  }

  pub fn video(&self) -> &Path {
    &self.video
  }

  pub fn outcome(&self) -> &ScanOutcome {
    &self.outcome
  }

  pub fn detected(&self) -> bool {
    matches!(self.outcome, ScanOutcome::Found { .. })
  }

  pub fn snapshot(&self) -> Option<&Path> {
    match &self.outcome {
      ScanOutcome::Found { snapshot, .. } => snapshot.as_deref(),
      _ => None,
    }
  }

  pub fn state(&self) -> ScanState {
    match self.outcome {
      ScanOutcome::Found { .. } => ScanState::Found,
      ScanOutcome::Exhausted { .. } => ScanState::Exhausted,
      ScanOutcome::Failed { .. } => ScanState::Failed,
    }
  }
}

/// 对单个视频按步长抽帧检测，命中第一帧人物即停止
pub struct VideoScanner<V, M, R> {
  opener: V,
  model: M,
  render: R,
  stride: NonZeroU64,
}

impl<V, M, R> VideoScanner<V, M, R>
where
  V: VideoOpener,
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: Display,
  R: Render<RgbImage, DetectResult>,
  R::Error: Display,
{
  pub fn new(opener: V, model: M, render: R) -> Self {
    Self {
      opener,
      model,
      render,
      stride: DEFAULT_STRIDE,
    }
  }

  pub fn with_stride(mut self, stride: NonZeroU64) -> Self {
    self.stride = stride;
    self
  }

  /// 视频句柄在返回前释放
  pub fn scan(&self, video: &VideoFile) -> ScanResult {
    debug!("{:?}: {}", ScanState::Opening, video.path().display());
    let mut source = match self.opener.open(video.path()) {
      Ok(source) => source,
      Err(e) => {
        warn!("无法打开视频 {}: {}", video.path().display(), e);
        return ScanResult::new(
          video.path(),
          ScanOutcome::Failed {
            reason: e.to_string(),
          },
        );
      }
    };

    let sampler = FrameSampler::new(source.frame_count(), self.stride);
    debug!(
      "{:?}: {} 共 {} 帧, 采样 {} 帧",
      ScanState::Sampling,
      video.path().display(),
      sampler.frame_count(),
      sampler.len()
    );

    let mut sampled = 0u64;
    for index in sampler.indices() {
      let frame = match source.read_frame(index) {
        Ok(frame) => frame,
        Err(e) => {
          debug!("跳过第 {} 帧: {}", index, e);
          continue;
        }
      };
      sampled += 1;

      let result = match self.model.infer(&frame.image) {
        Ok(result) => result,
        Err(e) => {
          warn!("第 {} 帧推理失败: {}", index, e);
          continue;
        }
      };

      if result.contains_person() {
        info!("在 {} 第 {} 帧检测到人物", video.path().display(), index);
        let snapshot = match self
          .render
          .render_result(&video.base_name(), &frame.image, &result)
        {
          Ok(path) => Some(path),
          Err(e) => {
            warn!("保存快照失败 {}: {}", video.path().display(), e);
            None
          }
        };
        return ScanResult::new(
          video.path(),
          ScanOutcome::Found {
            frame_index: index,
            snapshot,
          },
        );
      }
    }

    ScanResult::new(video.path(), ScanOutcome::Exhausted { sampled })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::{Frame, VideoError};
  use crate::model::DetectItem;
  use std::cell::RefCell;
  use std::collections::HashSet;

  /// 内存中的假视频，帧的第一个像素红色通道记录帧号
  struct FakeSource {
    frames: u64,
    broken: HashSet<u64>,
    reads: std::rc::Rc<RefCell<Vec<u64>>>,
  }

  impl VideoSource for FakeSource {
    fn frame_count(&self) -> u64 {
      self.frames
    }

    fn read_frame(&mut self, index: u64) -> Result<Frame, VideoError> {
      self.reads.borrow_mut().push(index);
      if self.broken.contains(&index) {
        return Err(VideoError::Decode {
          index,
          reason: "broken".to_string(),
        });
      }
      let mut image = RgbImage::new(4, 4);
      image.get_pixel_mut(0, 0).0[0] = index as u8;
      Ok(Frame { image, index })
    }
  }

  struct FakeOpener {
    frames: u64,
    broken: HashSet<u64>,
    reads: std::rc::Rc<RefCell<Vec<u64>>>,
    fail: bool,
  }

  impl FakeOpener {
    fn new(frames: u64) -> Self {
      Self {
        frames,
        broken: HashSet::new(),
        reads: Default::default(),
        fail: false,
      }
    }
  }

  impl VideoOpener for FakeOpener {
    type Source = FakeSource;

    fn open(&self, path: &Path) -> Result<Self::Source, VideoError> {
      if self.fail {
        return Err(VideoError::Open {
          path: path.to_path_buf(),
          reason: "corrupt".to_string(),
        });
      }
      Ok(FakeSource {
        frames: self.frames,
        broken: self.broken.clone(),
        reads: self.reads.clone(),
      })
    }
  }

  /// 帧号不小于 `from` 时报告人物
  struct PersonFrom {
    from: u8,
  }

  impl Model for PersonFrom {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = String;

    fn infer(&self, input: &RgbImage) -> Result<DetectResult, String> {
      let index = input.get_pixel(0, 0).0[0];
      if index >= self.from {
        Ok(DetectResult::from(vec![DetectItem::new(0, 0.8, [0.0, 0.0, 1.0, 1.0])]))
      } else {
        Ok(DetectResult::from(vec![DetectItem::new(2, 0.8, [0.0, 0.0, 1.0, 1.0])]))
      }
    }
  }

  #[derive(Default)]
  struct RecordRender {
    calls: RefCell<Vec<(String, u8)>>,
  }

  impl Render<RgbImage, DetectResult> for RecordRender {
    type Error = String;

    fn render_result(
      &self,
      name: &str,
      frame: &RgbImage,
      _result: &DetectResult,
    ) -> Result<PathBuf, String> {
      self
        .calls
        .borrow_mut()
        .push((name.to_string(), frame.get_pixel(0, 0).0[0]));
      Ok(PathBuf::from(format!("{}.jpeg", name)))
    }
  }

  struct FailingRender;

  impl Render<RgbImage, DetectResult> for FailingRender {
    type Error = String;

    fn render_result(&self, _: &str, _: &RgbImage, _: &DetectResult) -> Result<PathBuf, String> {
      Err("disk full".to_string())
    }
  }

  fn video() -> VideoFile {
    VideoFile::new("cams/door.mp4")
  }

  #[test]
  fn stops_at_first_person() {
    let opener = FakeOpener::new(100);
    let render = RecordRender::default();
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 52 }, &render);

    let result = scanner.scan(&video());

    assert!(result.detected());
    assert_eq!(
      result.outcome(),
      &ScanOutcome::Found {
        frame_index: 52,
        snapshot: Some(PathBuf::from("door.mp4.jpeg"))
      }
    );
    assert_eq!(*render.calls.borrow(), vec![("door.mp4".to_string(), 52)]);
    assert_eq!(opener.reads.borrow().last(), Some(&52));
  }

  #[test]
  fn exhausts_without_person() {
    let opener = FakeOpener::new(100);
    let render = RecordRender::default();
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 255 }, &render);

    let result = scanner.scan(&video());

    assert_eq!(result.outcome(), &ScanOutcome::Exhausted { sampled: 32 });
    assert_eq!(result.state(), ScanState::Exhausted);
    assert!(render.calls.borrow().is_empty());
  }

  #[test]
  fn broken_frames_are_skipped() {
    let mut opener = FakeOpener::new(100);
    opener.broken = [52, 55].into_iter().collect();
    let render = RecordRender::default();
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 50 }, &render);

    let result = scanner.scan(&video());

    assert_eq!(
      result.outcome(),
      &ScanOutcome::Found {
        frame_index: 58,
        snapshot: Some(PathBuf::from("door.mp4.jpeg"))
      }
    );
    assert_eq!(render.calls.borrow().len(), 1);
  }

  #[test]
  fn open_failure_is_not_a_detection() {
    let mut opener = FakeOpener::new(100);
    opener.fail = true;
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 0 }, RecordRender::default());

    let result = scanner.scan(&video());

    assert!(!result.detected());
    assert_eq!(result.state(), ScanState::Failed);
    assert!(opener.reads.borrow().is_empty());
  }

  #[test]
  fn tiny_video_is_exhausted_immediately() {
    let opener = FakeOpener::new(4);
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 0 }, RecordRender::default());
    assert_eq!(
      scanner.scan(&video()).outcome(),
      &ScanOutcome::Exhausted { sampled: 0 }
    );
  }

  #[test]
  fn snapshot_failure_still_counts() {
    let opener = FakeOpener::new(20);
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 0 }, FailingRender);

    let result = scanner.scan(&video());

    assert!(result.detected());
    assert_eq!(result.snapshot(), None);
  }

  #[test]
  fn stride_controls_sampling() {
    let opener = FakeOpener::new(30);
    let scanner = VideoScanner::new(&opener, PersonFrom { from: 255 }, RecordRender::default())
      .with_stride(NonZeroU64::new(10).unwrap());

    scanner.scan(&video());

    assert_eq!(*opener.reads.borrow(), vec![1, 11, 21]);
  }
}
