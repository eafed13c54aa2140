// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/run_log.rs - 运行日志文件
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

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputError;

/// 每次检测命中写一行，立即落盘
pub struct RunLog {
  path: PathBuf,
  file: File,
}

impl RunLog {
  pub fn create(path: impl Into<PathBuf>) -> Result<Self, OutputError> {
    let path = path.into();
    let file = File::create(&path)?;
    Ok(Self { path, file })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn record_detection(&mut self, video: &Path) -> Result<(), OutputError> {
    writeln!(
      self.file,
      "intruder alert: person detected in {}",
      video.display()
    )?;
    self.file.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn one_line_per_detection() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = RunLog::create(dir.path().join("run.txt")).unwrap();
    log.record_detection(Path::new("videos/a.mp4")).unwrap();
    log.record_detection(Path::new("videos/b.mp4")).unwrap();

    let content = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(
      content,
      "intruder alert: person detected in videos/a.mp4\n\
       intruder alert: person detected in videos/b.mp4\n"
    );
  }
}
