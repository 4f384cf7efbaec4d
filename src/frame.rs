// 该文件是 CardScan 项目的一部分。
// src/frame.rs - 帧定义
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

use std::time::Instant;

use image::RgbImage;

/// 一帧 RGB 图像及其序号、相对时间戳
#[derive(Debug, Clone)]
pub struct Frame {
  pub index: u64,
  pub timestamp_ms: u64,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, timestamp_ms: u64, image: RgbImage) -> Self {
    Self {
      index,
      timestamp_ms,
      image,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 为输入源生成递增的帧序号与时间戳
#[derive(Debug)]
pub struct FrameClock {
  started: Instant,
  next_index: u64,
}

impl Default for FrameClock {
  fn default() -> Self {
    Self {
      started: Instant::now(),
      next_index: 0,
    }
  }
}

impl FrameClock {
  pub fn stamp(&mut self, image: RgbImage) -> Frame {
    let index = self.next_index;
    self.next_index += 1;
    let timestamp_ms = self.started.elapsed().as_millis() as u64;
    Frame::new(index, timestamp_ms, image)
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::new(0, 0, image)
  }
}
