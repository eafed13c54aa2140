// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/sampler.rs - 抽帧序列
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

use std::num::NonZeroU64;

/// 第一个采样帧
const FIRST_SAMPLE: u64 = 1;
/// 末尾保留的帧数，避免解码流尾部失败
const TAIL_MARGIN: u64 = 3;

/// 按固定步长生成待检测的帧号：`1, 1+n, 1+2n, ...`，且小于 `F-3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
  frame_count: u64,
  stride: NonZeroU64,
}

impl FrameSampler {
  pub fn new(frame_count: u64, stride: NonZeroU64) -> Self {
    Self {
      frame_count,
      stride,
    }
  }

  pub fn frame_count(&self) -> u64 {
    self.frame_count
  }

  /// 每次调用都从头开始
  pub fn indices(&self) -> FrameIndices {
    FrameIndices {
      next: FIRST_SAMPLE,
      end: self.frame_count.saturating_sub(TAIL_MARGIN),
      stride: self.stride.get(),
    }
  }

  /// 采样帧数量
  pub fn len(&self) -> u64 {
    let end = self.frame_count.saturating_sub(TAIL_MARGIN);
    if end <= FIRST_SAMPLE {
      0
    } else {
      (end - FIRST_SAMPLE).div_ceil(self.stride.get())
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl IntoIterator for &FrameSampler {
  type Item = u64;
  type IntoIter = FrameIndices;

  fn into_iter(self) -> Self::IntoIter {
    self.indices()
  }
}

#[derive(Debug, Clone)]
pub struct FrameIndices {
  next: u64,
  end: u64,
  stride: u64,
}

impl Iterator for FrameIndices {
  type Item = u64;

  fn next(&mut self) -> Option<Self::Item> {
    if self.next >= self.end {
      return None;
    }
    let index = self.next;
    // 溢出时直接结束
    self.next = index.checked_add(self.stride).unwrap_or(u64::MAX);
    Some(index)
  }
}
