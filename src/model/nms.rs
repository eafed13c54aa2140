// 该文件是 Kanmen （看门） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use super::DetectItem;

/// 按类别做非极大值抑制，结果按置信度降序排列
pub fn non_max_suppression(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  // 按置信度降序排序
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<DetectItem> = Vec::new();
  for item in items {
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == item.class_id && iou(&kept.bbox, &item.bbox) >= iou_threshold);
    if !suppressed {
      result.push(item);
    }
  }
  result
}

/// 计算两个边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overlapping_boxes_of_same_class_collapse() {
    let items = vec![
      DetectItem::new(0, 0.6, [0.10, 0.10, 0.50, 0.50]),
      DetectItem::new(0, 0.9, [0.12, 0.12, 0.52, 0.52]),
      DetectItem::new(2, 0.7, [0.12, 0.12, 0.52, 0.52]),
      DetectItem::new(0, 0.5, [0.70, 0.70, 0.90, 0.90]),
    ];
    let kept = non_max_suppression(items, 0.45);
    let scores: Vec<f32> = kept.iter().map(|i| i.score).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.5]);
  }

  #[test]
  fn iou_of_disjoint_and_identical() {
    let a = [0.0, 0.0, 0.5, 0.5];
    assert_eq!(iou(&a, &[0.6, 0.6, 0.9, 0.9]), 0.0);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    assert_eq!(iou(&[0.2; 4], &[0.2; 4]), 0.0);
  }
}
