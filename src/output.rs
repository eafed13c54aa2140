// 该文件是 Kanmen （看门） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;

/// 把一帧及其检测结果渲染为证据文件，返回写入的路径
pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&self, name: &str, frame: &Frame, result: &Output)
  -> Result<PathBuf, Self::Error>;
}

impl<F, O, R: Render<F, O> + ?Sized> Render<F, O> for &R {
  type Error = R::Error;

  fn render_result(&self, name: &str, frame: &F, result: &O) -> Result<PathBuf, Self::Error> {
    (**self).render_result(name, frame, result)
  }
}

pub mod draw;

mod snapshot;
pub use self::snapshot::SnapshotOutput;

mod run_directory;
pub use self::run_directory::{RUN_ID_FORMAT, RunDirectory};

mod run_log;
pub use self::run_log::RunLog;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("字体加载失败: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
  #[error("运行目录已存在且无可用后缀: {0}")]
  RunDirectoryTaken(PathBuf),
}
