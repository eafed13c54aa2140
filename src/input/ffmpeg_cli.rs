// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/ffmpeg_cli.rs - 基于 ffmpeg/ffprobe 命令行的视频解码
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

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use tracing::{debug, warn};

use super::{Frame, VideoError, VideoOpener, VideoSource};

const RGB_CHANNELS: usize = 3;

/// 视频流基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProbeInfo {
  pub width: u32,
  pub height: u32,
  pub frame_count: u64,
}

/// 解析 `ffprobe -print_format json -show_format -show_streams` 的输出
///
/// 帧数优先取 `nb_frames`，容器未记录时按 `时长 × 帧率` 估算。
/// 宽高为 ffmpeg 自动旋转后输出帧的尺寸。
pub(crate) fn parse_probe(json: &str) -> Result<ProbeInfo, VideoError> {
  let json: serde_json::Value = serde_json::from_str(json)
    .map_err(|e| VideoError::FrameCount(format!("解析 ffprobe 输出失败: {}", e)))?;

  let stream = json["streams"]
    .as_array()
    .and_then(|streams| {
      streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
    })
    .ok_or_else(|| VideoError::FrameCount("找不到视频流".to_string()))?;

  let coded_width = stream["width"].as_u64().unwrap_or(0) as u32;
  let coded_height = stream["height"].as_u64().unwrap_or(0) as u32;
  if coded_width == 0 || coded_height == 0 {
    return Err(VideoError::FrameCount(format!(
      "视频尺寸无效: {}x{}",
      coded_width, coded_height
    )));
  }
  let (width, height) = match rotation(stream) {
    90 | 270 => (coded_height, coded_width),
    _ => (coded_width, coded_height),
  };

  let nb_frames = stream["nb_frames"]
    .as_str()
    .and_then(|s| s.parse::<u64>().ok())
    .filter(|&n| n > 0);

  let frame_count = match nb_frames {
    Some(n) => n,
    None => {
      let duration = stream["duration"]
        .as_str()
        .or_else(|| json["format"]["duration"].as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
      let fps = stream["avg_frame_rate"]
        .as_str()
        .map(parse_frame_rate)
        .filter(|&fps| fps > 0.0)
        .or_else(|| stream["r_frame_rate"].as_str().map(parse_frame_rate))
        .unwrap_or(0.0);
      let estimate = (duration * fps).round();
      if !estimate.is_finite() || estimate <= 0.0 {
        return Err(VideoError::FrameCount("容器未提供帧数或时长".to_string()));
      }
      estimate as u64
    }
  };

  Ok(ProbeInfo {
    width,
    height,
    frame_count,
  })
}

/// 旋转角度，归一到 0..360
///
/// 新版 ffprobe 写在 `side_data_list` 的 display matrix 中，旧版写在 `tags.rotate`。
fn rotation(stream: &serde_json::Value) -> i64 {
  let from_side_data = stream["side_data_list"].as_array().and_then(|list| {
    list
      .iter()
      .find_map(|side| side["rotation"].as_f64().map(|r| r.round() as i64))
  });
  let from_tags = || {
    stream["tags"]["rotate"]
      .as_str()
      .and_then(|s| s.trim().parse::<i64>().ok())
  };
  from_side_data.or_else(from_tags).unwrap_or(0).rem_euclid(360)
}

/// 解析 "30000/1001" 形式的帧率
fn parse_frame_rate(rate: &str) -> f64 {
  match rate.split_once('/') {
    Some((num, den)) => {
      let num = num.trim().parse::<f64>().unwrap_or(0.0);
      let den = den.trim().parse::<f64>().unwrap_or(0.0);
      if den > 0.0 { num / den } else { 0.0 }
    }
    None => rate.trim().parse::<f64>().unwrap_or(0.0),
  }
}

/// 调用系统中的 `ffprobe` / `ffmpeg` 解码视频
#[derive(Debug, Clone)]
pub struct FfmpegCliOpener {
  ffmpeg: String,
  ffprobe: String,
}

impl Default for FfmpegCliOpener {
  fn default() -> Self {
    Self {
      ffmpeg: "ffmpeg".to_string(),
      ffprobe: "ffprobe".to_string(),
    }
  }
}

impl FfmpegCliOpener {
  pub fn with_programs(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
    Self {
      ffmpeg: ffmpeg.into(),
      ffprobe: ffprobe.into(),
    }
  }

  fn probe(&self, path: &Path) -> Result<ProbeInfo, VideoError> {
    let output = Command::new(&self.ffprobe)
      .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
      .arg(path)
      .stdin(Stdio::null())
      .output()
      .map_err(|e| VideoError::Open {
        path: path.to_path_buf(),
        reason: format!("ffprobe 执行失败: {}", e),
      })?;

    if !output.status.success() {
      return Err(VideoError::Open {
        path: path.to_path_buf(),
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
  }
}

impl VideoOpener for FfmpegCliOpener {
  type Source = FfmpegCliSource;

  fn open(&self, path: &Path) -> Result<Self::Source, VideoError> {
    let info = self.probe(path)?;
    debug!(
      "视频 {}: {}x{}, 约 {} 帧",
      path.display(),
      info.width,
      info.height,
      info.frame_count
    );
    Ok(FfmpegCliSource {
      ffmpeg: self.ffmpeg.clone(),
      path: path.to_path_buf(),
      info,
      stream: None,
      end: None,
    })
  }
}

/// 正在输出 rgb24 原始帧的 ffmpeg 子进程
struct RawStream {
  child: Child,
  stdout: ChildStdout,
  /// 下一次读取得到的帧号
  position: u64,
}

impl Drop for RawStream {
  fn drop(&mut self) {
    let _ = self.child.kill();
    let _ = self.child.wait();
  }
}

/// 一个已打开的视频
///
/// 读取更靠后的帧时跳过中间帧，回退时重新启动解码进程。
pub struct FfmpegCliSource {
  ffmpeg: String,
  path: PathBuf,
  info: ProbeInfo,
  stream: Option<RawStream>,
  /// 实际读到的帧数，容器记录的帧数可能偏大
  end: Option<u64>,
}

impl FfmpegCliSource {
  fn frame_bytes(&self) -> usize {
    self.info.width as usize * self.info.height as usize * RGB_CHANNELS
  }

  fn spawn(&self) -> io::Result<RawStream> {
    let mut child = Command::new(&self.ffmpeg)
      .args(["-v", "error", "-nostdin", "-i"])
      .arg(&self.path)
      .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .spawn()?;
    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| io::Error::other("ffmpeg 未提供标准输出"))?;
    Ok(RawStream {
      child,
      stdout,
      position: 0,
    })
  }

  fn stream_at(&mut self, index: u64) -> io::Result<&mut RawStream> {
    let restart = match &self.stream {
      Some(stream) => stream.position > index,
      None => true,
    };
    if restart {
      // 先结束旧进程
      self.stream = None;
      self.stream = Some(self.spawn()?);
    }
    self
      .stream
      .as_mut()
      .ok_or_else(|| io::Error::other("解码进程不可用"))
  }
}

impl VideoSource for FfmpegCliSource {
  fn frame_count(&self) -> u64 {
    self.info.frame_count
  }

  fn read_frame(&mut self, index: u64) -> Result<Frame, VideoError> {
    let frame_bytes = self.frame_bytes();
    let (width, height) = (self.info.width, self.info.height);
    let decode_error = |e: io::Error| VideoError::Decode {
      index,
      reason: e.to_string(),
    };

    if self.end.is_some_and(|end| index >= end) {
      return Err(decode_error(io::ErrorKind::UnexpectedEof.into()));
    }

    let stream = self.stream_at(index).map_err(decode_error)?;
    let mut buffer = vec![0u8; frame_bytes];

    let result = (|| -> io::Result<()> {
      while stream.position < index {
        stream.stdout.read_exact(&mut buffer)?;
        stream.position += 1;
      }
      stream.stdout.read_exact(&mut buffer)?;
      stream.position += 1;
      Ok(())
    })();
    let position = stream.position;

    if let Err(e) = result {
      if e.kind() == io::ErrorKind::UnexpectedEof {
        debug!("{} 在第 {} 帧结束", self.path.display(), position);
        self.end = Some(position);
      } else {
        warn!("读取 {} 第 {} 帧失败: {}", self.path.display(), index, e);
      }
      // 之后回退读取时重新启动解码进程
      self.stream = None;
      return Err(decode_error(e));
    }

    let image = RgbImage::from_raw(width, height, buffer).ok_or(VideoError::Decode {
      index,
      reason: "无法创建 RGB 图像".to_string(),
    })?;

    Ok(Frame { image, index })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn probe_prefers_nb_frames() {
    let json = r#"{
      "streams": [
        {"codec_type": "audio", "nb_frames": "10"},
        {"codec_type": "video", "width": 640, "height": 360,
         "nb_frames": "100", "avg_frame_rate": "25/1", "duration": "9.0"}
      ],
      "format": {"duration": "9.0"}
    }"#;
    let info = parse_probe(json).unwrap();
    assert_eq!(
      info,
      ProbeInfo {
        width: 640,
        height: 360,
        frame_count: 100
      }
    );
  }

  #[test]
  fn probe_estimates_from_duration() {
    let json = r#"{
      "streams": [
        {"codec_type": "video", "width": 1280, "height": 720,
         "avg_frame_rate": "30000/1001"}
      ],
      "format": {"duration": "10.010000"}
    }"#;
    assert_eq!(parse_probe(json).unwrap().frame_count, 300);
  }

  #[test]
  fn probe_without_video_stream_fails() {
    let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
    assert!(matches!(parse_probe(json), Err(VideoError::FrameCount(_))));
  }

  #[test]
  fn probe_without_any_count_fails() {
    let json = r#"{"streams": [{"codec_type": "video", "width": 2, "height": 2,
      "nb_frames": "N/A", "avg_frame_rate": "0/0"}], "format": {}}"#;
    assert!(parse_probe(json).is_err());
  }

  #[test]
  fn rotated_stream_swaps_dimensions() {
    let json = r#"{
      "streams": [
        {"codec_type": "video", "width": 1920, "height": 1080, "nb_frames": "50",
         "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}
      ],
      "format": {}
    }"#;
    let info = parse_probe(json).unwrap();
    assert_eq!((info.width, info.height), (1080, 1920));

    let json = r#"{
      "streams": [
        {"codec_type": "video", "width": 1920, "height": 1080, "nb_frames": "50",
         "tags": {"rotate": "90"}}
      ],
      "format": {}
    }"#;
    let info = parse_probe(json).unwrap();
    assert_eq!((info.width, info.height), (1080, 1920));

    let json = r#"{
      "streams": [
        {"codec_type": "video", "width": 1920, "height": 1080, "nb_frames": "50",
         "side_data_list": [{"rotation": 180}]}
      ],
      "format": {}
    }"#;
    let info = parse_probe(json).unwrap();
    assert_eq!((info.width, info.height), (1920, 1080));
  }

  #[test]
  fn frame_rate_forms() {
    assert_eq!(parse_frame_rate("25/1"), 25.0);
    assert_eq!(parse_frame_rate("0/0"), 0.0);
    assert_eq!(parse_frame_rate("12.5"), 12.5);
  }

  #[test]
  fn missing_program_is_open_error() {
    let opener = FfmpegCliOpener::with_programs(
      "kanmen-no-such-ffmpeg",
      "kanmen-no-such-ffprobe",
    );
    let result = opener.open(Path::new("whatever.mp4"));
    assert!(matches!(result, Err(VideoError::Open { .. })));
  }

  /// 用 shell 脚本模拟 ffprobe/ffmpeg：声称 20 帧 2x2 视频，实际只输出 10 帧
  #[cfg(unix)]
  mod short_stream {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    const FRAME_BYTES: usize = 2 * 2 * RGB_CHANNELS;

    fn script(dir: &Path, name: &str, body: &str) -> String {
      let path = dir.join(name);
      fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
      fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
      path.to_string_lossy().into_owned()
    }

    fn opener(dir: &Path) -> (FfmpegCliOpener, PathBuf) {
      let spawns = dir.join("spawns.log");
      let ffprobe = script(
        dir,
        "ffprobe",
        r#"echo '{"streams":[{"codec_type":"video","width":2,"height":2,"nb_frames":"20"}],"format":{}}'"#,
      );
      let ffmpeg = script(
        dir,
        "ffmpeg",
        &format!(
          "echo spawn >> '{}'\nhead -c {} /dev/zero",
          spawns.display(),
          FRAME_BYTES * 10
        ),
      );
      (FfmpegCliOpener::with_programs(ffmpeg, ffprobe), spawns)
    }

    fn spawn_count(log: &Path) -> usize {
      fs::read_to_string(log).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn reads_past_the_end_do_not_restart_decoding() {
      let dir = tempfile::tempdir().unwrap();
      let (opener, spawns) = opener(dir.path());
      let mut source = opener.open(Path::new("short.mp4")).unwrap();
      assert_eq!(source.frame_count(), 20);

      let sampler = crate::input::FrameSampler::new(20, std::num::NonZeroU64::new(3).unwrap());
      let outcomes: Vec<(u64, bool)> = sampler
        .indices()
        .map(|index| (index, source.read_frame(index).is_ok()))
        .collect();

      assert_eq!(
        outcomes,
        vec![
          (1, true),
          (4, true),
          (7, true),
          (10, false),
          (13, false),
          (16, false)
        ]
      );
      assert_eq!(spawn_count(&spawns), 1);
    }

    #[test]
    fn earlier_frame_after_the_end_restarts_once() {
      let dir = tempfile::tempdir().unwrap();
      let (opener, spawns) = opener(dir.path());
      let mut source = opener.open(Path::new("short.mp4")).unwrap();

      assert!(source.read_frame(12).is_err());
      assert!(source.read_frame(15).is_err());
      let frame = source.read_frame(3).unwrap();
      assert_eq!((frame.image.width(), frame.image.height()), (2, 2));
      assert_eq!(spawn_count(&spawns), 2);
    }
  }
}
