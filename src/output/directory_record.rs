// 该文件是 CardScan 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, Record},
  },
  prediction::Prediction,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    predictions: &[Prediction],
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_overlays(&frame.image, predictions).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image.save(path)?;
        record.record(predictions, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      "record-id" => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      _ => DrawWrapper::Draw(Box::new(Draw::default())),
    }
  }
}

/// 按日期分目录保存帧：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
///
/// `folder:///path?record=name|id&always`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| if v == "id" { "record-id" } else { "record-name" })
      .unwrap_or("draw");

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_file_path(uri)),
      draw: DrawWrapper::with(kind),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  /// 只有绘制模式使用字体；记录模式不受影响
  pub fn with_draw(mut self, draw: Draw) -> Self {
    if let DrawWrapper::Draw(_) = self.draw {
      self.draw = DrawWrapper::Draw(Box::new(draw));
    }
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, predictions: &[Prediction]) -> Result<(), Self::Error> {
    if !self.always && predictions.is_empty() {
      return Ok(());
    }
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, predictions)?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use url::Url;

  fn saved_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          found.push(path);
        }
      }
    }
    found.sort();
    found
  }

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  #[test]
  fn test_skips_empty_frames_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::from(RgbImage::new(8, 8));

    output(dir.path(), "").render_result(&frame, &[]).unwrap();
    assert!(saved_files(dir.path()).is_empty());

    output(dir.path(), "?always").render_result(&frame, &[]).unwrap();
    let files = saved_files(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with("-0001.png"));
  }

  #[test]
  fn test_record_writes_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::from(RgbImage::new(8, 8));
    let predictions = vec![Prediction::new("10D", 0.75).at(4.0, 4.0).with_size(2.0, 2.0)];

    output(dir.path(), "?record=id")
      .render_result(&frame, &predictions)
      .unwrap();

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 2);
    let sidecar = files.iter().find(|p| p.extension().unwrap() == "txt").unwrap();
    let text = std::fs::read_to_string(sidecar).unwrap();
    assert!(text.starts_with("10D, 0.7500"));
  }
}
