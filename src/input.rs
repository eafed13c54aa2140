// 该文件是 Kanmen （看门） 项目的一部分。
// src/input.rs - 视频文件输入
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

mod files;
pub use self::files::list_files;

mod sampler;
pub use self::sampler::{FrameIndices, FrameSampler};

mod ffmpeg_cli;
pub use self::ffmpeg_cli::{FfmpegCliOpener, FfmpegCliSource};

#[cfg(feature = "ffmpeg_input")]
mod ffmpeg_input;
#[cfg(feature = "ffmpeg_input")]
pub use self::ffmpeg_input::{FfmpegOpener, FfmpegSource};

#[derive(Error, Debug)]
pub enum VideoError {
  #[error("无法打开视频文件 {path}: {reason}")]
  Open { path: PathBuf, reason: String },
  #[error("无法读取视频帧数: {0}")]
  FrameCount(String),
  #[error("第 {index} 帧解码失败: {reason}")]
  Decode { index: u64, reason: String },
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 待扫描的视频文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
  path: PathBuf,
}

impl VideoFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 文件名（不含目录），快照以此命名
  pub fn base_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
  }
}

impl From<PathBuf> for VideoFile {
  fn from(path: PathBuf) -> Self {
    Self::new(path)
  }
}

/// 解码后的单帧
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引（从 0 开始）
  pub index: u64,
}

/// 已打开的视频，按帧号随机读取
pub trait VideoSource {
  /// 视频总帧数（可能是估算值）
  fn frame_count(&self) -> u64;

  /// 定位并解码第 `index` 帧
  fn read_frame(&mut self, index: u64) -> Result<Frame, VideoError>;
}

/// 视频解码能力：打开文件得到 [`VideoSource`]
pub trait VideoOpener {
  type Source: VideoSource;

  fn open(&self, path: &Path) -> Result<Self::Source, VideoError>;
}

impl<T: VideoOpener + ?Sized> VideoOpener for &T {
  type Source = T::Source;

  fn open(&self, path: &Path) -> Result<Self::Source, VideoError> {
    (**self).open(path)
  }
}
