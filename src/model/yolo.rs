// 该文件是 Kanmen （看门） 项目的一部分。
// src/model/yolo.rs - YOLO 目标检测模型（ONNX）
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
use tracing::{debug, info};
use tract_onnx::prelude::*;

use super::{DEFAULT_CONFIDENCE, DetectItem, DetectResult, Model, ModelError, non_max_suppression};

const YOLO_INPUT_W: u32 = 640;
const YOLO_INPUT_H: u32 = 640;
/// 每个候选框前 4 个值为 cx, cy, w, h
const YOLO_BOX_FIELDS: usize = 4;
const YOLO_NMS_THRESH: f32 = 0.45;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Ultralytics 导出的 YOLO 模型，输出形状 `[1, 4 + 类别数, 候选数]`
pub struct Yolo {
  model: Plan,
  confidence_threshold: f32,
  nms_threshold: f32,
}

pub struct YoloBuilder {
  model_path: PathBuf,
  confidence_threshold: f32,
  nms_threshold: f32,
}

impl YoloBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      confidence_threshold: DEFAULT_CONFIDENCE,
      nms_threshold: YOLO_NMS_THRESH,
    }
  }

  pub fn confidence(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<Yolo, ModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let load_error = |e: TractError| ModelError::Load {
      path: self.model_path.clone(),
      reason: format!("{:#}", e),
    };

    let model = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(load_error)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(
          f32::datum_type(),
          tvec!(1, 3, YOLO_INPUT_H as usize, YOLO_INPUT_W as usize),
        ),
      )
      .map_err(load_error)?
      .into_optimized()
      .map_err(load_error)?
      .into_runnable()
      .map_err(load_error)?;
    info!("模型加载完成");

    Ok(Yolo {
      model,
      confidence_threshold: self.confidence_threshold,
      nms_threshold: self.nms_threshold,
    })
  }
}

impl Yolo {
  /// 预处理图像：缩放到模型输入尺寸，转为 NCHW 浮点张量
  fn preprocess(&self, image: &RgbImage) -> Tensor {
    let resized = image::imageops::resize(
      image,
      YOLO_INPUT_W,
      YOLO_INPUT_H,
      image::imageops::FilterType::Triangle,
    );

    tract_ndarray::Array4::from_shape_fn(
      (1, 3, YOLO_INPUT_H as usize, YOLO_INPUT_W as usize),
      |(_, c, y, x)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    )
    .into_tensor()
  }

  fn postprocess(&self, output: &Tensor) -> Result<DetectResult, ModelError> {
    let view = output
      .to_array_view::<f32>()
      .map_err(|e| ModelError::Inference(format!("输出张量不是 f32: {}", e)))?;
    let view = view
      .into_dimensionality::<tract_ndarray::Ix3>()
      .map_err(|e| ModelError::Inference(format!("模型输出不是三维张量: {}", e)))?;
    decode_output(view, self.confidence_threshold, self.nms_threshold)
  }
}

/// 解码 `[1, 4 + 类别数, 候选数]` 输出
///
/// 每个候选取得分最高的类别，低于 `confidence` 的丢弃；
/// 框由输入像素下的 `cx, cy, w, h` 转为归一化的 `[x0, y0, x1, y1]`，最后做 NMS。
pub fn decode_output(
  view: tract_ndarray::ArrayView3<f32>,
  confidence: f32,
  nms_threshold: f32,
) -> Result<DetectResult, ModelError> {
  let shape = view.shape();
  if shape[0] != 1 || shape[1] <= YOLO_BOX_FIELDS {
    return Err(ModelError::Inference(format!(
      "模型输出形状不符合预期: {:?}",
      shape
    )));
  }
  let num_classes = shape[1] - YOLO_BOX_FIELDS;
  let candidates = shape[2];
  let (in_w, in_h) = (YOLO_INPUT_W as f32, YOLO_INPUT_H as f32);

  let mut items = Vec::new();
  for i in 0..candidates {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, view[[0, YOLO_BOX_FIELDS + c, i]]))
      .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score < confidence {
      continue;
    }

    let cx = view[[0, 0, i]];
    let cy = view[[0, 1, i]];
    let w = view[[0, 2, i]];
    let h = view[[0, 3, i]];

    items.push(DetectItem::new(
      class_id as u32,
      score,
      [
        (cx - w / 2.0) / in_w,
        (cy - h / 2.0) / in_h,
        (cx + w / 2.0) / in_w,
        (cy + h / 2.0) / in_h,
      ],
    ));
  }

  let items = non_max_suppression(items, nms_threshold);
  debug!("检测到 {} 个物体", items.len());
  Ok(DetectResult::from(items))
}

impl Model for Yolo {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.preprocess(input);
    let outputs = self
      .model
      .run(tvec!(tensor.into()))
      .map_err(|e| ModelError::Inference(format!("{:#}", e)))?;
    let output = outputs
      .first()
      .ok_or_else(|| ModelError::Inference("模型没有输出".to_string()))?;
    self.postprocess(output)
  }
}
