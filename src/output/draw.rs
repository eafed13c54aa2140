// 该文件是 Kanmen （看门） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::model::{DetectItem, DetectResult, PERSON_LABEL};

use super::OutputError;

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PERSON_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const OTHER_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

/// 在图像上绘制边框与 `类别 置信度` 标签
pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: FontRef<'static>,
}

impl Draw {
  pub fn new() -> Result<Self, OutputError> {
    let font = FontRef::try_from_slice(FONT_DATA)?;
    Ok(Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font,
    })
  }

  /// 返回带标注的新图像
  pub fn draw_detection(&self, frame: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut image = frame.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      let color = if item.label == PERSON_LABEL {
        PERSON_COLOR
      } else {
        OTHER_COLOR
      };
      self.draw_bbox_with_label(image, item, color);
    }
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem, color: [u8; 3]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }
    let bbox = &item.bbox;

    let x_min = ((bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
    let y_min = ((bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
    let x_max = ((bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
    let y_max = ((bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 绘制边框（加粗）
    for thickness in 0..BOX_THICKNESS {
      let x0 = (x_min + thickness).min(x_max);
      let y0 = (y_min + thickness).min(y_max);
      let x1 = (x_max - thickness).max(x0);
      let y1 = (y_max - thickness).max(y0);

      for x in x0..=x1 {
        image.put_pixel(x as u32, y0 as u32, Rgb(color));
        image.put_pixel(x as u32, y1 as u32, Rgb(color));
      }
      for y in y0..=y1 {
        image.put_pixel(x0 as u32, y as u32, Rgb(color));
        image.put_pixel(x1 as u32, y as u32, Rgb(color));
      }
    }

    let label = format!("{} {:.2}", item.label, item.score);

    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]); // 白色文本

    // 估算文本大小（粗略估计）
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签放在边框上方，空间不足时贴顶
    let label_x = x_min;
    let label_y = (y_min - text_height).max(0);

    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = text_height.min(h - label_y).max(0) as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, Rgb(color));

      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        &self.font,
        &label,
      );
    }
  }
}
