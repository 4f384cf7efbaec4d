// 该文件是 CardScan 项目的一部分。
// src/input/image_directory.rs - 图像目录回放输入
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

//! 把一个目录里的 PNG/JPEG 图像按文件名顺序、以固定帧率回放，
//! 充当实时视频流。
//!
//! `folder:///path/to/frames?fps=15&loop`

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameClock},
  input::decode_image,
  url_file_path,
};

const DEFAULT_FPS: f64 = 15.0;
const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图像: {0}")]
  EmptyDirectory(String),
  #[error("帧率无效: {0}")]
  InvalidFps(String),
}

pub struct ImageDirectoryInput {
  files: Vec<PathBuf>,
  cursor: usize,
  looping: bool,
  period: Duration,
  next_due: Option<Instant>,
  clock: FrameClock,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemeMismatch);
    }

    let mut fps = DEFAULT_FPS;
    let mut looping = false;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "fps" => {
          fps = v
            .parse::<f64>()
            .ok()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .ok_or_else(|| ImageDirectoryInputError::InvalidFps(v.to_string()))?;
        }
        "loop" => looping = true,
        _ => {}
      }
    }

    Ok(Self::open(url_file_path(url), fps)?.looping(looping))
  }
}

impl ImageDirectoryInput {
  pub fn open(directory: impl AsRef<Path>, fps: f64) -> Result<Self, ImageDirectoryInputError> {
    let directory = directory.as_ref();
    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|entry| entry.path()))
      .filter(|path| path.is_file() && is_frame_file(path))
      .collect();
    files.sort();

    if files.is_empty() {
      return Err(ImageDirectoryInputError::EmptyDirectory(
        directory.display().to_string(),
      ));
    }

    info!(
      "图像目录输入: {}，共 {} 帧，{} fps",
      directory.display(),
      files.len(),
      fps
    );

    Ok(Self {
      files,
      cursor: 0,
      looping: false,
      period: Duration::from_secs_f64(1.0 / fps),
      next_due: None,
      clock: FrameClock::default(),
    })
  }

  pub fn looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  fn pace(&mut self) {
    let now = Instant::now();
    if let Some(due) = self.next_due
      && due > now
    {
      thread::sleep(due - now);
    }
    self.next_due = Some(self.next_due.unwrap_or(now).max(now) + self.period);
  }
}

fn is_frame_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

impl Iterator for ImageDirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 一整轮都解码失败时停止，避免循环模式下空转
    let mut failures = 0;
    while failures < self.files.len() {
      if self.cursor >= self.files.len() {
        if !self.looping {
          return None;
        }
        self.cursor = 0;
      }

      let path = &self.files[self.cursor];
      self.cursor += 1;
      match decode_image(path) {
        Ok(image) => {
          self.pace();
          return Some(self.clock.stamp(image));
        }
        Err(e) => {
          warn!("跳过无法读取的帧 {}: {}", path.display(), e);
          failures += 1;
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn frames_dir(count: u8) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..count {
      RgbImage::from_pixel(4, 4, Rgb([i, i, i]))
        .save(dir.path().join(format!("frame-{:03}.png", i)))
        .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"not a frame").unwrap();
    dir
  }

  #[test]
  fn test_replays_in_name_order() {
    let dir = frames_dir(3);
    let input = ImageDirectoryInput::open(dir.path(), 1000.0).unwrap();
    assert_eq!(input.len(), 3);

    let frames: Vec<Frame> = input.collect();
    assert_eq!(frames.len(), 3);
    for (i, frame) in frames.iter().enumerate() {
      assert_eq!(frame.index, i as u64);
      assert_eq!(frame.image.get_pixel(0, 0), &Rgb([i as u8; 3]));
    }
  }

  #[test]
  fn test_looping_and_broken_frames() {
    let dir = frames_dir(2);
    std::fs::write(dir.path().join("frame-999.png"), b"broken").unwrap();

    let input = ImageDirectoryInput::open(dir.path(), 1000.0)
      .unwrap()
      .looping(true);
    let frames: Vec<Frame> = input.take(5).collect();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[4].index, 4);
  }

  #[test]
  fn test_paces_frames() {
    let dir = frames_dir(3);
    let started = Instant::now();
    let count = ImageDirectoryInput::open(dir.path(), 50.0).unwrap().count();
    assert_eq!(count, 3);
    assert!(started.elapsed() >= Duration::from_millis(40));
  }

  #[test]
  fn test_from_url_options() {
    let dir = frames_dir(1);
    let url = Url::parse(&format!("folder://{}?fps=30&loop", dir.path().display())).unwrap();
    let mut input = ImageDirectoryInput::from_url(&url).unwrap();
    assert!(input.next().is_some());
    assert!(input.next().is_some());

    let url = Url::parse(&format!("folder://{}?fps=0", dir.path().display())).unwrap();
    assert!(matches!(
      ImageDirectoryInput::from_url(&url),
      Err(ImageDirectoryInputError::InvalidFps(_))
    ));
  }

  #[test]
  fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageDirectoryInput::open(dir.path(), 15.0),
      Err(ImageDirectoryInputError::EmptyDirectory(_))
    ));
  }
}
