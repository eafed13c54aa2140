// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/files.rs - 递归列出视频文件
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

use std::fs::ReadDir;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::VideoError;

const HIDDEN_MARKER: char = '.';

fn is_hidden(name: &std::ffi::OsStr) -> bool {
  name.to_string_lossy().starts_with(HIDDEN_MARKER)
}

/// 列出 `root` 下所有非隐藏文件，包括子目录
///
/// 以显式栈遍历目录树，子目录的内容出现在该子目录所在的位置，
/// 其余顺序取决于文件系统返回的顺序。
/// 子目录读取失败时仅记录警告并跳过；根目录读取失败返回错误。
/// 不检测符号链接成环。
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, VideoError> {
  let mut files = Vec::new();
  let mut pending: Vec<(PathBuf, ReadDir)> = vec![(root.to_path_buf(), std::fs::read_dir(root)?)];

  while let Some((dir, entries)) = pending.last_mut() {
    let entry = match entries.next() {
      Some(Ok(entry)) => entry,
      Some(Err(e)) => {
        warn!("读取目录项失败 {}: {}", dir.display(), e);
        continue;
      }
      None => {
        pending.pop();
        continue;
      }
    };

    if is_hidden(&entry.file_name()) {
      debug!("跳过隐藏项: {}", entry.path().display());
      continue;
    }

    let path = entry.path();
    if path.is_dir() {
      match std::fs::read_dir(&path) {
        Ok(entries) => pending.push((path, entries)),
        Err(e) => warn!("无法读取目录 {}: {}", path.display(), e),
      }
    } else {
      files.push(path);
    }
  }

  Ok(files)
}
