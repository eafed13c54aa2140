// 该文件是 Kanmen （看门） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

/// 触发告警的类别
pub const PERSON_LABEL: &str = "person";

/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.4;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model + ?Sized> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误 {path}: {reason}")]
  Load { path: PathBuf, reason: String },
  #[error("推理错误: {0}")]
  Inference(String),
}

/// 模型规格，每次运行只选择一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
  /// 速度快、精度较低
  #[default]
  Fast,
  /// 速度慢、精度较高
  Accurate,
}

impl ModelVariant {
  pub fn file_name(&self) -> &'static str {
    match self {
      ModelVariant::Fast => "yolov8n.onnx",
      ModelVariant::Accurate => "yolov8x.onnx",
    }
  }

  pub fn model_path(&self, model_dir: &Path) -> PathBuf {
    model_dir.join(self.file_name())
  }
}

impl std::fmt::Display for ModelVariant {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ModelVariant::Fast => write!(f, "fast"),
      ModelVariant::Accurate => write!(f, "accurate"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

impl DetectItem {
  /// 置信度截断到 [0, 1]，边框截断到画面内
  pub fn new(class_id: u32, score: f32, bbox: [f32; 4]) -> Self {
    let clamp = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    let [x0, y0, x1, y1] = bbox.map(clamp);
    Self {
      class_id,
      label: coco_label(class_id).to_string(),
      score: clamp(score),
      bbox: [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)],
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.items.iter().map(|item| item.label.as_str())
  }

  pub fn contains_label(&self, label: &str) -> bool {
    self.labels().any(|l| l == label)
  }

  pub fn contains_person(&self) -> bool {
    self.contains_label(PERSON_LABEL)
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub fn coco_label(class_id: u32) -> &'static str {
  COCO_CLASSES
    .get(class_id as usize)
    .copied()
    .unwrap_or("unknown")
}

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

mod nms;
pub use self::nms::non_max_suppression;

#[cfg(feature = "model_yolo")]
mod yolo;
#[cfg(feature = "model_yolo")]
pub use self::yolo::{Yolo, YoloBuilder};
