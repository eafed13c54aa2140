// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/ffmpeg_input.rs - 基于 libav 的进程内视频解码
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

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{Pixel, input};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{context::Context as ScalingContext, flag::Flags};
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;
use tracing::debug;

use super::{Frame, VideoError, VideoOpener, VideoSource};

fn ffmpeg_error(path: &Path) -> impl Fn(ffmpeg::Error) -> VideoError + '_ {
  move |e| VideoError::Open {
    path: path.to_path_buf(),
    reason: e.to_string(),
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegOpener;

impl VideoOpener for FfmpegOpener {
  type Source = FfmpegSource;

  fn open(&self, path: &Path) -> Result<Self::Source, VideoError> {
    FfmpegSource::new(path)
  }
}

/// libav 视频输入
pub struct FfmpegSource {
  /// FFmpeg 输入上下文
  input_context: ffmpeg::format::context::Input,
  /// 视频流索引
  video_stream_index: usize,
  /// 视频解码器
  decoder: ffmpeg::decoder::Video,
  /// 缩放上下文
  scaler: ScalingContext,
  /// 下一个解码出的帧号
  position: u64,
  /// 总帧数
  frame_count: u64,
  width: u32,
  height: u32,
  path: PathBuf,
}

impl FfmpegSource {
  pub fn new(path: &Path) -> Result<Self, VideoError> {
    ffmpeg::init().map_err(ffmpeg_error(path))?;

    let input_context = input(&path).map_err(ffmpeg_error(path))?;

    let video_stream = input_context
      .streams()
      .best(Type::Video)
      .ok_or_else(|| VideoError::Open {
        path: path.to_path_buf(),
        reason: "找不到视频流".to_string(),
      })?;

    let video_stream_index = video_stream.index();
    let context_decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
      .map_err(ffmpeg_error(path))?;
    let decoder = context_decoder.decoder().video().map_err(ffmpeg_error(path))?;

    let width = decoder.width();
    let height = decoder.height();

    let frame_count = match video_stream.frames() {
      n if n > 0 => n as u64,
      _ => {
        // 容器未记录帧数时按时长估算
        let rate = video_stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
          rate.numerator() as f64 / rate.denominator() as f64
        } else {
          0.0
        };
        let seconds = input_context.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
        let estimate = (seconds * fps).round();
        if !estimate.is_finite() || estimate <= 0.0 {
          return Err(VideoError::FrameCount(format!(
            "{} 未提供帧数或时长",
            path.display()
          )));
        }
        estimate as u64
      }
    };

    let scaler = ScalingContext::get(
      decoder.format(),
      width,
      height,
      Pixel::RGB24,
      width,
      height,
      Flags::BILINEAR,
    )
    .map_err(ffmpeg_error(path))?;

    debug!("视频 {}: {}x{}, 约 {} 帧", path.display(), width, height, frame_count);

    Ok(Self {
      input_context,
      video_stream_index,
      decoder,
      scaler,
      position: 0,
      frame_count,
      width,
      height,
      path: path.to_path_buf(),
    })
  }

  /// 解码下一帧
  fn decode_next_frame(&mut self) -> Result<Option<Video>, ffmpeg::Error> {
    loop {
      // 首先尝试从解码器获取已解码的帧
      let mut decoded = Video::empty();
      if self.decoder.receive_frame(&mut decoded).is_ok() {
        return Ok(Some(decoded));
      }

      // 读取下一个数据包
      let mut packet_iter = self.input_context.packets();
      loop {
        match packet_iter.next() {
          Some((stream, packet)) => {
            if stream.index() == self.video_stream_index {
              self.decoder.send_packet(&packet)?;
              break;
            }
          }
          None => {
            self.decoder.send_eof()?;
            if self.decoder.receive_frame(&mut decoded).is_ok() {
              return Ok(Some(decoded));
            }
            return Ok(None);
          }
        }
      }
    }
  }

  fn rewind(&mut self) -> Result<(), ffmpeg::Error> {
    self.input_context.seek(0, ..0)?;
    self.decoder.flush();
    self.position = 0;
    Ok(())
  }

  fn to_rgb(&mut self, decoded: &Video) -> Result<RgbImage, ffmpeg::Error> {
    let mut rgb_frame = Video::empty();
    self.scaler.run(decoded, &mut rgb_frame)?;

    let data = rgb_frame.data(0);
    let stride = rgb_frame.stride(0);
    let width = self.width as usize;
    let height = self.height as usize;

    // 处理步长对齐的数据
    let mut image_data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
      let row_start = y * stride;
      let row_end = row_start + width * 3;
      image_data.extend_from_slice(&data[row_start..row_end]);
    }

    RgbImage::from_raw(self.width, self.height, image_data).ok_or(ffmpeg::Error::InvalidData)
  }
}

impl VideoSource for FfmpegSource {
  fn frame_count(&self) -> u64 {
    self.frame_count
  }

  fn read_frame(&mut self, index: u64) -> Result<Frame, VideoError> {
    let decode_error = |e: ffmpeg::Error| VideoError::Decode {
      index,
      reason: e.to_string(),
    };

    if self.position > index {
      self.rewind().map_err(decode_error)?;
    }

    loop {
      let decoded = self
        .decode_next_frame()
        .map_err(decode_error)?
        .ok_or_else(|| VideoError::Decode {
          index,
          reason: format!("{} 在第 {} 帧提前结束", self.path.display(), self.position),
        })?;
      let current = self.position;
      self.position += 1;
      if current == index {
        let image = self.to_rgb(&decoded).map_err(decode_error)?;
        return Ok(Frame { image, index });
      }
    }
  }
}
