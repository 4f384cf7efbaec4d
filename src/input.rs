// 该文件是 CardScan 项目的一部分。
// src/input.rs - 视频/图像输入
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

use image::{ImageFormat, ImageReader, RgbImage};
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod image_directory;
pub use self::image_directory::{ImageDirectoryInput, ImageDirectoryInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

/// 上传模式只接受的图像格式
pub const ACCEPTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Unsupported image format: {0}")]
  UnsupportedFormat(String),
}

/// 按内容识别格式并解码 PNG/JPEG 图像
pub fn decode_image(path: &Path) -> Result<RgbImage, DecodeError> {
  let reader = ImageReader::open(path)?.with_guessed_format()?;
  match reader.format() {
    Some(format) if ACCEPTED_FORMATS.contains(&format) => Ok(reader.decode()?.into_rgb8()),
    Some(format) => Err(DecodeError::UnsupportedFormat(format!("{:?}", format))),
    None => Err(DecodeError::UnsupportedFormat(path.display().to_string())),
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Image directory input error: {0}")]
  ImageDirectoryInputError(#[from] ImageDirectoryInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageDirectory(ImageDirectoryInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }

    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      ImageDirectoryInput::SCHEME => Ok(InputWrapper::ImageDirectory(
        ImageDirectoryInput::from_url(url)?,
      )),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::ImageDirectory(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn test_unknown_scheme() {
    let url = Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }

  #[test]
  fn test_decode_rejects_other_formats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.bmp");
    std::fs::write(&path, b"BM not really a bitmap").unwrap();
    assert!(matches!(
      decode_image(&path),
      Err(DecodeError::UnsupportedFormat(_))
    ));

    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"hello").unwrap();
    assert!(matches!(
      decode_image(&path),
      Err(DecodeError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn test_decode_png_and_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let image = RgbImage::from_pixel(6, 4, image::Rgb([10, 200, 30]));

    let png = dir.path().join("a.png");
    image.save(&png).unwrap();
    assert_eq!(decode_image(&png).unwrap().dimensions(), (6, 4));

    // 扩展名不可信，按内容识别
    let jpeg = dir.path().join("b.png.upload");
    image.save_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
    assert_eq!(decode_image(&jpeg).unwrap().dimensions(), (6, 4));
  }
}
