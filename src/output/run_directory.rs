// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/run_directory.rs - 按运行时间命名的输出目录
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

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{info, warn};

use super::OutputError;

/// 运行编号格式：月日年-时:分:秒
pub const RUN_ID_FORMAT: &str = "%m%d%Y-%H:%M:%S";

/// 同一秒内重复启动时最多尝试的后缀数
const MAX_SUFFIX: u32 = 999;

/// 一次运行的输出目录，包含日志文件和快照
#[derive(Debug, Clone)]
pub struct RunDirectory {
  run_id: String,
  path: PathBuf,
}

impl RunDirectory {
  /// 在 `root` 下创建新目录
  ///
  /// 目录名已被占用时依次尝试 `<编号>-1`、`<编号>-2`…，从不复用已有目录。
  pub fn create<Tz>(root: &Path, started_at: &DateTime<Tz>) -> Result<Self, OutputError>
  where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
  {
    let stamp = started_at.format(RUN_ID_FORMAT).to_string();
    std::fs::create_dir_all(root)?;

    for suffix in 0..=MAX_SUFFIX {
      let run_id = if suffix == 0 {
        stamp.clone()
      } else {
        format!("{}-{}", stamp, suffix)
      };
      let path = root.join(&run_id);
      match std::fs::create_dir(&path) {
        Ok(()) => {
          info!("创建输出目录: {}", path.display());
          return Ok(Self { run_id, path });
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
          warn!("输出目录已存在: {}", path.display());
        }
        Err(e) => return Err(e.into()),
      }
    }

    Err(OutputError::RunDirectoryTaken(root.join(stamp)))
  }

  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 日志文件与目录同名
  pub fn log_path(&self) -> PathBuf {
    self.path.join(format!("{}.txt", self.run_id))
  }
}
