// 该文件是 Kanmen （看门） 项目的一部分。
// src/task.rs - 批量扫描任务
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
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  input::{VideoError, VideoFile, VideoOpener, list_files},
  model::{DetectResult, Model},
  output::{Render, RunLog},
  scan::{ScanResult, VideoScanner},
};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("无法列出输入目录 {path}: {source}")]
  Enumerate {
    path: PathBuf,
    #[source]
    source: VideoError,
  },
}

/// 当前进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  /// 从 1 开始
  pub index: usize,
  pub total: usize,
}

impl Progress {
  pub fn percent(&self) -> usize {
    if self.total == 0 {
      100
    } else {
      self.index * 100 / self.total
    }
  }
}

impl Display for Progress {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} / {} ({}%)", self.index, self.total, self.percent())
  }
}

/// 一次运行的汇总结果
#[derive(Debug, Clone)]
pub struct RunReport {
  run_id: String,
  results: Vec<ScanResult>,
  human_detected: bool,
  log_path: PathBuf,
}

impl RunReport {
  pub fn new(run_id: impl Into<String>, log_path: impl Into<PathBuf>) -> Self {
    Self {
      run_id: run_id.into(),
      results: Vec::new(),
      human_detected: false,
      log_path: log_path.into(),
    }
  }

  pub fn from_results(
    run_id: impl Into<String>,
    log_path: impl Into<PathBuf>,
    results: impl IntoIterator<Item = ScanResult>,
  ) -> Self {
    let mut report = Self::new(run_id, log_path);
    for result in results {
      report.push(result);
    }
    report
  }

  fn push(&mut self, result: ScanResult) {
    self.human_detected |= result.detected();
    self.results.push(result);
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn results(&self) -> &[ScanResult] {
    &self.results
  }

  /// 至少一个视频检出人物
  pub fn human_detected(&self) -> bool {
    self.human_detected
  }

  pub fn log_path(&self) -> &Path {
    &self.log_path
  }

  /// 检出人物的视频，按扫描顺序
  pub fn flagged_files(&self) -> Vec<&Path> {
    self
      .results
      .iter()
      .filter(|r| r.detected())
      .map(|r| r.video())
      .collect()
  }
}

/// 依次扫描目录下的所有文件，写运行日志并汇总结果
pub struct BatchRunner<V, M, R> {
  scanner: VideoScanner<V, M, R>,
  log: RunLog,
  report: RunReport,
}

impl<V, M, R> BatchRunner<V, M, R>
where
  V: VideoOpener,
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: Display,
  R: Render<RgbImage, DetectResult>,
  R::Error: Display,
{
  pub fn new(run_id: impl Into<String>, scanner: VideoScanner<V, M, R>, log: RunLog) -> Self {
    let report = RunReport::new(run_id, log.path());
    Self {
      scanner,
      log,
      report,
    }
  }

  /// 列出 `directory` 下的文件后逐个扫描
  pub fn run(self, directory: &Path) -> Result<RunReport, TaskError> {
    let files = list_files(directory).map_err(|source| TaskError::Enumerate {
      path: directory.to_path_buf(),
      source,
    })?;
    info!("在 {} 下找到 {} 个文件", directory.display(), files.len());
    Ok(self.run_files(files))
  }

  pub fn run_files(mut self, files: Vec<PathBuf>) -> RunReport {
    let total = files.len();
    for (i, path) in files.into_iter().enumerate() {
      let progress = Progress {
        index: i + 1,
        total,
      };
      info!("正在处理 {}: {}", path.display(), progress);

      let video = VideoFile::new(path);
      let result = self.scanner.scan(&video);
      if result.detected() {
        warn!("检测到人物: {}", video.path().display());
        if let Err(e) = self.log.record_detection(video.path()) {
          warn!("写入运行日志失败: {}", e);
        }
      }
      self.report.push(result);
    }

    info!(
      "运行 {} 完成: 共 {} 个文件, {} 个检出人物",
      self.report.run_id(),
      total,
      self.report.flagged_files().len()
    );
    // 日志文件随 self 一起关闭
    self.report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scan::ScanOutcome;

  #[test]
  fn progress_percent() {
    assert_eq!(Progress { index: 1, total: 3 }.percent(), 33);
    assert_eq!(Progress { index: 3, total: 3 }.percent(), 100);
    assert_eq!(Progress { index: 2, total: 3 }.to_string(), "2 / 3 (66%)");
  }

  #[test]
  fn report_aggregates_flag() {
    let mut report = RunReport::new("run", "run/run.txt");
    assert!(!report.human_detected());

    report.push(ScanResult::new(
      "a.mp4",
      ScanOutcome::Failed {
        reason: "corrupt".to_string(),
      },
    ));
    report.push(ScanResult::new("b.mp4", ScanOutcome::Exhausted { sampled: 3 }));
    assert!(!report.human_detected());

    report.push(ScanResult::new(
      "c.mp4",
      ScanOutcome::Found {
        frame_index: 7,
        snapshot: None,
      },
    ));
    report.push(ScanResult::new("d.mp4", ScanOutcome::Exhausted { sampled: 3 }));

    assert!(report.human_detected());
    assert_eq!(report.flagged_files(), vec![Path::new("c.mp4")]);
    assert_eq!(report.results().len(), 4);
  }
}
