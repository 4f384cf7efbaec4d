// 该文件是 CardScan 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::{card, prediction::Prediction};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10;
const BOX_THICKNESS: i32 = 3;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 检测框与标签绘制。没有字体时只画框、不画标签。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  color: Rgb<u8>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      color: Rgb(BOX_COLOR),
    }
  }
}

/// 中心点 + 宽高换算出的整数边界框 (left, top, right, bottom)
///
/// 在 i64 上饱和计算，超出范围的坐标不会溢出。
pub fn box_corners(pred: &Prediction) -> (i64, i64, i64, i64) {
  let (x, y) = (pred.x as i64, pred.y as i64);
  let (w, h) = (pred.width as i64, pred.height as i64);
  let (half_w, half_h) = (w.div_euclid(2), h.div_euclid(2));
  (
    x.saturating_sub(half_w),
    y.saturating_sub(half_h),
    x.saturating_add(half_w),
    y.saturating_add(half_h),
  )
}

/// 把边界框裁剪到图像范围（向外留出线宽），完全在画面外时返回 `None`
fn clip_to_image(
  (left, top, right, bottom): (i64, i64, i64, i64),
  width: u32,
  height: u32,
) -> Option<(i32, i32, i32, i32)> {
  let (width, height) = (i64::from(width), i64::from(height));
  if right < 0 || bottom < 0 || left >= width || top >= height {
    return None;
  }
  let margin = i64::from(BOX_THICKNESS);
  let clamp_x = |v: i64| v.clamp(-margin, width + margin) as i32;
  let clamp_y = |v: i64| v.clamp(-margin, height + margin) as i32;
  Some((clamp_x(left), clamp_y(top), clamp_x(right), clamp_y(bottom)))
}

/// 叠加层标签，例如 `"King of Hearts (90%)"`
pub fn overlay_label(pred: &Prediction) -> String {
  format!(
    "{} ({:.0}%)",
    card::label_name(&pred.class_name),
    pred.confidence * 100.0
  )
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, FontError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(self.with_font(font))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn draw_box_with_label(&self, image: &mut RgbImage, pred: &Prediction) {
    let (left, top, right, bottom) = box_corners(pred);

    // 宽或高不为正时不画框
    if right <= left || bottom <= top {
      return;
    }
    let Some((left, top, right, bottom)) = clip_to_image(
      (left, top, right, bottom),
      image.width(),
      image.height(),
    ) else {
      return;
    };

    for t in 0..BOX_THICKNESS {
      let (w, h) = (right - left - 2 * t, bottom - top - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(left + t, top + t).of_size(w as u32 + 1, h as u32 + 1);
      draw_hollow_rect_mut(image, rect, self.color);
    }

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        self.color,
        left,
        top - LABEL_OFFSET - self.font_scale.y as i32,
        self.font_scale,
        font,
        &overlay_label(pred),
      );
    }
  }

  /// 在图像上原地绘制检测结果
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, predictions: &[Prediction]) {
    for pred in predictions {
      self.draw_box_with_label(image, pred);
    }
  }

  /// 返回绘制了检测结果的副本，不修改输入
  pub fn draw_overlays(&self, frame: &RgbImage, predictions: &[Prediction]) -> RgbImage {
    let mut image = frame.clone();
    self.draw_detections_on_image(&mut image, predictions);
    image
  }
}

pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  /// 每行一个检测：名称, 置信度, x, y, 宽, 高
  pub fn format(&self, predictions: &[Prediction]) -> String {
    predictions
      .iter()
      .map(|pred| {
        let name = if self.label_with_name {
          card::full_name(&pred.class_name)
        } else {
          pred.class_name.clone()
        };
        format!(
          "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
          name, pred.confidence, pred.x, pred.y, pred.width, pred.height
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record(&self, predictions: &[Prediction], path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(predictions))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GREEN: Rgb<u8> = Rgb(BOX_COLOR);

  fn card(x: f32, y: f32, w: f32, h: f32) -> Prediction {
    Prediction::new("KH", 0.9).at(x, y).with_size(w, h)
  }

  #[test]
  fn test_box_corners_truncate() {
    assert_eq!(box_corners(&card(100.7, 50.2, 41.9, 60.0)), (80, 20, 120, 80));
    assert_eq!(box_corners(&card(10.0, 10.0, 0.0, 0.0)), (10, 10, 10, 10));
    assert_eq!(box_corners(&card(10.0, 10.0, -5.0, 4.0)), (13, 8, 7, 12));
  }

  #[test]
  fn test_overlay_label() {
    assert_eq!(overlay_label(&card(0.0, 0.0, 1.0, 1.0)), "King of Hearts (90%)");
    let odd = Prediction::new("joker", 0.456);
    assert_eq!(overlay_label(&odd), "joker (46%)");
  }

  #[test]
  fn test_draws_box_edges_on_copy() {
    let frame = RgbImage::new(200, 200);
    let predictions = vec![card(100.0, 100.0, 40.0, 60.0)];

    let drawn = Draw::default().draw_overlays(&frame, &predictions);
    // 左上角 (80, 70)，右下角 (120, 130)
    assert_eq!(drawn.get_pixel(80, 70), &GREEN);
    assert_eq!(drawn.get_pixel(120, 130), &GREEN);
    assert_eq!(drawn.get_pixel(82, 100), &GREEN);
    assert_eq!(drawn.get_pixel(100, 100), &Rgb([0, 0, 0]));
    assert_eq!(drawn.get_pixel(84, 100), &Rgb([0, 0, 0]));

    // 输入帧与检测结果保持不变
    assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    assert_eq!(predictions[0], card(100.0, 100.0, 40.0, 60.0));
  }

  #[test]
  fn test_degenerate_and_offscreen_boxes() {
    let frame = RgbImage::new(50, 50);
    let predictions = vec![
      card(10.0, 10.0, 0.0, 30.0),
      card(10.0, 10.0, -20.0, -20.0),
      card(-500.0, -500.0, 40.0, 40.0),
      card(45.0, 45.0, 100.0, 100.0),
    ];

    let drawn = Draw::default().draw_overlays(&frame, &predictions);
    assert_eq!(drawn.dimensions(), (50, 50));
    assert_eq!(drawn.get_pixel(10, 10), &Rgb([0, 0, 0]));
  }

  #[test]
  fn test_out_of_range_geometry_does_not_overflow() {
    let far = card(3.0e9, 10.0, 100.0, 100.0);
    let (left, _, right, _) = box_corners(&far);
    assert!(right > left);

    let extreme = Prediction::new("KH", 0.9)
      .at(f32::MAX, f32::MIN)
      .with_size(f32::MAX, f32::MAX);
    box_corners(&extreme);

    let frame = RgbImage::new(64, 48);
    let drawn = Draw::default().draw_overlays(&frame, &[far, extreme]);
    assert!(drawn.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn test_huge_box_is_clipped_to_frame() {
    let frame = RgbImage::new(640, 480);
    let huge = card(320.0, 240.0, 2.0e9, 2.0e9);

    let started = std::time::Instant::now();
    let drawn = Draw::default().draw_overlays(&frame, &[huge]);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    // 边框全部落在画面外
    assert!(drawn.pixels().all(|p| *p == Rgb([0, 0, 0])));

    // 部分越界的框仍画出可见的边
    let partial = card(0.0, 240.0, 200.0, 100.0);
    let drawn = Draw::default().draw_overlays(&frame, &[partial]);
    assert_eq!(drawn.get_pixel(100, 240), &GREEN);
    assert_eq!(drawn.get_pixel(50, 190), &GREEN);
  }

  #[test]
  fn test_missing_font_file() {
    assert!(matches!(
      Draw::default().with_font_file("/no/such/font.ttf"),
      Err(FontError::IoError(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(
      Draw::default().with_font_file(&path),
      Err(FontError::InvalidFont(_))
    ));
  }

  #[test]
  fn test_record_format() {
    let predictions = vec![card(100.0, 50.0, 40.0, 60.0)];
    let by_name = Record { label_with_name: true }.format(&predictions);
    assert_eq!(by_name, "♥️ King of Hearts, 0.9000, 100.0, 50.0, 40.0, 60.0");
    let by_code = Record { label_with_name: false }.format(&predictions);
    assert!(by_code.starts_with("KH, 0.9000"));
  }
}
