// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/snapshot.rs - 保存带标注的快照
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

use std::path::PathBuf;

use image::RgbImage;
use tracing::info;

use crate::{
  model::DetectResult,
  output::{OutputError, Render, draw::Draw},
};

const SNAPSHOT_EXTENSION: &str = "jpeg";

/// 把命中帧写成 `<视频文件名>.jpeg`
pub struct SnapshotOutput {
  directory: PathBuf,
  draw: Draw,
}

impl SnapshotOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Result<Self, OutputError> {
    Ok(Self {
      directory: directory.into(),
      draw: Draw::new()?,
    })
  }

  /// 同名快照已存在时追加 `-k` 后缀，不覆盖已有证据
  fn snapshot_path(&self, name: &str) -> PathBuf {
    let path = self
      .directory
      .join(format!("{}.{}", name, SNAPSHOT_EXTENSION));
    if !path.exists() {
      return path;
    }
    (1u32..)
      .map(|k| {
        self
          .directory
          .join(format!("{}-{}.{}", name, k, SNAPSHOT_EXTENSION))
      })
      .find(|candidate| !candidate.exists())
      .unwrap_or(path)
  }
}

impl Render<RgbImage, DetectResult> for SnapshotOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    name: &str,
    frame: &RgbImage,
    result: &DetectResult,
  ) -> Result<PathBuf, Self::Error> {
    let image = self.draw.draw_detection(frame, result);
    let path = self.snapshot_path(name);
    image.save(&path)?;
    info!("保存快照到文件: {}", path.display());
    Ok(path)
  }
}
