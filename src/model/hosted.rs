// 该文件是 CardScan 项目的一部分。
// src/model/hosted.rs - 托管检测服务客户端
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

//! 托管推理服务：帧编码为 PNG 后做 base64，作为表单请求体 POST 到
//! `<api_url>/<model_id>?api_key=<key>`，响应为 JSON。

use std::fmt;
use std::io::Cursor;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbImage};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::model::{Model, normalize_response};
use crate::prediction::Prediction;

pub const DEFAULT_API_URL: &str = "https://serverless.roboflow.com";
pub const DEFAULT_MODEL_ID: &str = "playing-cards-ow27d/4";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("图像编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("HTTP 请求错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("服务返回错误状态 {status}: {body}")]
  StatusError { status: u16, body: String },
  #[error("响应解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("API 地址无效: {0}")]
  InvalidUrl(String),
}

pub struct HostedModelBuilder {
  api_url: Url,
  model_id: String,
  api_key: String,
  timeout: Duration,
}

impl HostedModelBuilder {
  pub fn new(api_url: Url, model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      api_url,
      model_id: model_id.into(),
      api_key: api_key.into(),
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  fn endpoint(&self) -> Result<Url, InferenceError> {
    let mut endpoint = self.api_url.clone();
    endpoint
      .path_segments_mut()
      .map_err(|_| InferenceError::InvalidUrl(self.api_url.to_string()))?
      .pop_if_empty()
      .extend(self.model_id.split('/').filter(|s| !s.is_empty()));
    endpoint
      .query_pairs_mut()
      .append_pair("api_key", &self.api_key);
    Ok(endpoint)
  }

  pub fn build(self) -> Result<HostedModel, InferenceError> {
    let endpoint = self.endpoint()?;
    let client = Client::builder().timeout(self.timeout).build()?;

    info!(
      "托管模型: {} @ {} (超时 {:?})",
      self.model_id, self.api_url, self.timeout
    );

    Ok(HostedModel {
      client,
      endpoint,
      model_id: self.model_id,
    })
  }
}

pub struct HostedModel {
  client: Client,
  endpoint: Url,
  model_id: String,
}

// 端点里带着 api_key，不能打印出来
impl fmt::Debug for HostedModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HostedModel")
      .field("host", &self.endpoint.host_str())
      .field("model_id", &self.model_id)
      .finish_non_exhaustive()
  }
}

impl HostedModel {
  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  fn encode(image: &RgbImage) -> Result<String, InferenceError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(png))
  }
}

// reqwest 的错误信息带着完整请求地址，其中包含 api_key
fn redact(e: reqwest::Error) -> InferenceError {
  InferenceError::HttpError(e.without_url())
}

impl Model for HostedModel {
  type Input = RgbImage;
  type Output = Vec<Prediction>;
  type Error = InferenceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let now = Instant::now();
    let body = Self::encode(input)?;
    debug!("请求体大小: {:.1} KB", body.len() as f64 / 1024.0);

    let response = self
      .client
      .post(self.endpoint.clone())
      .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(body)
      .send()
      .map_err(redact)?;

    let status = response.status();
    let text = response.text().map_err(redact)?;
    if !status.is_success() {
      return Err(InferenceError::StatusError {
        status: status.as_u16(),
        body: text,
      });
    }

    let value: Value = serde_json::from_str(&text)?;
    let predictions = normalize_response(&value);
    debug!(
      "推理完成，耗时: {:.2?}，检测数: {}",
      now.elapsed(),
      predictions.len()
    );
    Ok(predictions)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_endpoint_layout() {
    let builder = HostedModelBuilder::new(
      Url::parse(DEFAULT_API_URL).unwrap(),
      DEFAULT_MODEL_ID,
      "secret key",
    );
    let endpoint = builder.endpoint().unwrap();
    assert_eq!(
      endpoint.as_str(),
      "https://serverless.roboflow.com/playing-cards-ow27d/4?api_key=secret+key"
    );
  }

  #[test]
  fn test_endpoint_keeps_base_path() {
    let builder = HostedModelBuilder::new(
      Url::parse("http://localhost:9001/infer/").unwrap(),
      "/cards/2",
      "k",
    );
    assert_eq!(
      builder.endpoint().unwrap().as_str(),
      "http://localhost:9001/infer/cards/2?api_key=k"
    );
  }

  #[test]
  fn test_endpoint_rejects_opaque_url() {
    let builder = HostedModelBuilder::new(Url::parse("mailto:cards@example.com").unwrap(), "m/1", "k");
    assert!(matches!(builder.endpoint(), Err(InferenceError::InvalidUrl(_))));
  }

  #[test]
  fn test_debug_hides_api_key() {
    let model = HostedModelBuilder::new(Url::parse(DEFAULT_API_URL).unwrap(), DEFAULT_MODEL_ID, "hunter2")
      .build()
      .unwrap();
    let text = format!("{:?}", model);
    assert!(!text.contains("hunter2"));
    assert!(text.contains("playing-cards-ow27d/4"));
  }

  #[test]
  fn test_unreachable_service_is_an_error() {
    let model = HostedModelBuilder::new(Url::parse("http://127.0.0.1:9/").unwrap(), "cards/1", "k")
      .timeout(Duration::from_millis(500))
      .build()
      .unwrap();
    let result = model.infer(&RgbImage::new(2, 2));
    assert!(matches!(result, Err(InferenceError::HttpError(_))));
  }

  #[test]
  fn test_transport_error_hides_api_key() {
    let model = HostedModelBuilder::new(
      Url::parse("http://127.0.0.1:9/").unwrap(),
      "cards/1",
      "TOPSECRET",
    )
    .timeout(Duration::from_millis(500))
    .build()
    .unwrap();

    let err = model.infer(&RgbImage::new(2, 2)).unwrap_err();
    let text = err.to_string();
    assert!(!text.contains("TOPSECRET"), "{}", text);
    assert!(!format!("{:?}", err).contains("TOPSECRET"));
  }
}
