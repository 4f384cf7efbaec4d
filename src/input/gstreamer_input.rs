// 该文件是 CardScan 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入（实时模式）
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

//! # GStreamer 视频输入模块
//!
//! 实时模式的帧来源，支持：
//! - 摄像头捕获（V4L2）：`gst://camera/dev/video0?width=1280&height=720&fps=30`
//! - 视频文件：`gst://file/path/to/video.mp4`
//!
//! 可选参数 `rotate=90|180|270` 翻转画面，摄像头可指定 `format` 与 `io-mode`。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 在 `Cargo.toml` 中启用 `gstreamer_input` 特性。

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameClock},
};

const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 15;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://camera/..." 或 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format")]
  UnsupportedFormat,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    format: String,
    width: u32,
    height: u32,
    fps: u32,
  },
  TargetFormat {
    format: String,
  },
  VideoFlip {
    method: u32,
    direction: u32,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        io_mode,
        format,
        width,
        height,
        fps,
      } => {
        let io_mode_str = if let Some(mode) = io_mode {
          format!(" io-mode={}", mode)
        } else {
          "".to_string()
        };
        format!(
          "v4l2src device={}{} ! video/x-raw,format={},width={},height={},framerate={}/1",
          camera, io_mode_str, format, width, height, fps
        )
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
      GStreamerInputBuilderItem::VideoFlip { method, direction } => {
        format!("videoflip method={} video-direction={}", method, direction)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl GStreamerInputPipelineBuilder {
  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let parse = |key: &str, default: u32| {
      query
        .get(key)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
    };

    let mut items = vec![GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      io_mode: query.get("io-mode").and_then(|v| v.parse::<u32>().ok()),
      format: query
        .get("format")
        .cloned()
        .unwrap_or_else(|| String::from("YUY2")),
      width: parse("width", DEFAULT_CAMERA_WIDTH),
      height: parse("height", DEFAULT_CAMERA_HEIGHT),
      fps: parse("fps", DEFAULT_CAMERA_FPS),
    }];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));

    GStreamerInputPipelineBuilder { items }
  }

  fn build_file_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let mut items = vec![GStreamerInputBuilderItem::FileSource(path.to_string())];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));

    GStreamerInputPipelineBuilder { items }
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let (method, direction) = match rotate? {
      "90" => (1, 1),
      "180" => (2, 2),
      "270" => (3, 3),
      other => {
        warn!("不支持的旋转角度 {}，保持原方向", other);
        return None;
      }
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method, direction })
  }

  pub fn describe(&self) -> String {
    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    )
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let full_pipeline = self.describe();
    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      clock: FrameClock::default(),
    })
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let path = crate::url_file_path(url);

    let mut builder = match url.host_str() {
      Some("camera") => Self::build_camera_pipeline(&path, &query),
      Some("file") => Self::build_file_pipeline(&path, &query),
      _ => {
        return Err(GStreamerInputError::SchemeMismatch);
      }
    };

    builder.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    });

    Ok(builder)
  }
}

/// GStreamer 视频输入，按帧迭代
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  clock: FrameClock,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  fn pull_sample(&self) -> Option<gst::Sample> {
    self
      .appsink
      .pull_sample()
      .map_err(|e| {
        error!("Failed to pull sample: {}", e);
        e
      })
      .ok()
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    convert_sample_to_rgb(sample)
      .map_err(|e| {
        error!("Failed to fetch sample: {}", e);
        e
      })
      .ok()
      .map(|image| self.clock.stamp(image))
  }
}

fn convert_sample_to_rgb(sample: gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * (height.saturating_sub(1)) + width * 3;
  if data.len() < expected_size {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  let swap = match video_info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    _ => return Err(GStreamerInputError::UnsupportedFormat),
  };

  // 行之间可能有填充，按 stride 逐行复制
  let mut pixels = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let line = &data[row * stride..row * stride + width * 3];
    if swap {
      for px in line.chunks_exact(3) {
        pixels.extend_from_slice(&[px[2], px[1], px[0]]);
      }
    } else {
      pixels.extend_from_slice(line);
    }
  }

  RgbImage::from_raw(width as u32, height as u32, pixels)
    .ok_or_else(|| GStreamerInputError::PipelineError("Failed to assemble frame".to_string()))
}
