// 该文件是 CardScan 项目的一部分。
// src/config.rs - 运行配置
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

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::{
  filter::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DUPLICATE_DISTANCE, PredictionFilter},
  model::{DEFAULT_API_URL, DEFAULT_MODEL_ID, HostedModel, HostedModelBuilder, InferenceError},
  output::draw::{Draw, FontError},
  report::TallyReporter,
  tally::ConfidencePolicy,
};

pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 0.5;
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// 检测相关的命令行参数，两个程序共用
#[derive(Args, Clone)]
pub struct DetectionArgs {
  /// 推理服务中的模型标识
  #[arg(long, env = "CARDSCAN_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
  pub model_id: String,

  /// 推理服务地址
  #[arg(long, env = "CARDSCAN_API_URL", default_value = DEFAULT_API_URL)]
  pub api_url: String,

  /// 推理服务密钥
  #[arg(long, env = "ROBOFLOW_API_KEY", hide_env_values = true)]
  pub api_key: Option<String>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence_threshold: f32,

  /// 同类检测视为同一张牌的中心距离（像素）
  #[arg(long, default_value_t = DEFAULT_DUPLICATE_DISTANCE, value_name = "PIXELS")]
  pub duplicate_distance: f32,

  /// 实时模式轮询间隔（秒）
  #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS, value_name = "SECONDS")]
  pub poll_interval: f64,

  /// 推理请求超时（秒）
  #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECONDS")]
  pub timeout: f64,

  /// 标签字体文件（TTF/OTF），不提供时只画检测框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 已计数的牌也跟踪最大置信度
  #[arg(long)]
  pub track_max_confidence: bool,

  /// 计数快照 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub tally_json: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("缺少推理服务密钥：请通过 --api-key 或环境变量 ROBOFLOW_API_KEY 提供")]
  MissingApiKey,
  #[error("模型标识不能为空（--model-id / CARDSCAN_MODEL_ID）")]
  EmptyModelId,
  #[error("推理服务地址无效 '{url}': {source}")]
  InvalidApiUrl {
    url: String,
    source: url::ParseError,
  },
  #[error("推理服务地址必须是 http(s) 地址: {0}")]
  UnsupportedApiUrl(String),
  #[error("置信度阈值必须在 0.0 到 1.0 之间，实际为 {0}")]
  ConfidenceOutOfRange(f32),
  #[error("去重距离必须是非负数，实际为 {0}")]
  InvalidDuplicateDistance(f32),
  #[error("轮询间隔必须是正数（秒），实际为 {0}")]
  InvalidPollInterval(f64),
  #[error("请求超时必须是正数（秒），实际为 {0}")]
  InvalidTimeout(f64),
  #[error("字体加载失败: {0}")]
  FontError(#[from] FontError),
}

fn positive_secs(secs: f64) -> Option<Duration> {
  (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

/// 校验后的运行配置
pub struct Config {
  api_url: Url,
  model_id: String,
  api_key: String,
  filter: PredictionFilter,
  poll_interval: Duration,
  timeout: Duration,
  font: Option<PathBuf>,
  policy: ConfidencePolicy,
  tally_json: Option<PathBuf>,
}

impl Config {
  pub fn from_args(args: &DetectionArgs) -> Result<Self, ConfigError> {
    let api_key = args
      .api_key
      .as_deref()
      .map(str::trim)
      .filter(|key| !key.is_empty())
      .ok_or(ConfigError::MissingApiKey)?
      .to_string();

    let model_id = args.model_id.trim().trim_matches('/').to_string();
    if model_id.is_empty() {
      return Err(ConfigError::EmptyModelId);
    }

    let api_url = Url::parse(&args.api_url).map_err(|source| ConfigError::InvalidApiUrl {
      url: args.api_url.clone(),
      source,
    })?;
    if !matches!(api_url.scheme(), "http" | "https") {
      return Err(ConfigError::UnsupportedApiUrl(args.api_url.clone()));
    }

    // NaN 不满足区间判断
    if !(0.0..=1.0).contains(&args.confidence_threshold) {
      return Err(ConfigError::ConfidenceOutOfRange(
        args.confidence_threshold,
      ));
    }
    if !(args.duplicate_distance.is_finite() && args.duplicate_distance >= 0.0) {
      return Err(ConfigError::InvalidDuplicateDistance(
        args.duplicate_distance,
      ));
    }

    let poll_interval =
      positive_secs(args.poll_interval).ok_or(ConfigError::InvalidPollInterval(args.poll_interval))?;
    let timeout = positive_secs(args.timeout).ok_or(ConfigError::InvalidTimeout(args.timeout))?;

    let policy = if args.track_max_confidence {
      ConfidencePolicy::TrackMax
    } else {
      ConfidencePolicy::FrozenAtInsert
    };

    Ok(Config {
      api_url,
      model_id,
      api_key,
      filter: PredictionFilter::new(args.confidence_threshold, args.duplicate_distance),
      poll_interval,
      timeout,
      font: args.font.clone(),
      policy,
      tally_json: args.tally_json.clone(),
    })
  }

  pub fn filter(&self) -> PredictionFilter {
    self.filter
  }

  pub fn poll_interval(&self) -> Duration {
    self.poll_interval
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn policy(&self) -> ConfidencePolicy {
    self.policy
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn api_url(&self) -> &Url {
    &self.api_url
  }

  pub fn hosted_model(&self) -> Result<HostedModel, InferenceError> {
    HostedModelBuilder::new(self.api_url.clone(), &self.model_id, &self.api_key)
      .timeout(self.timeout)
      .build()
  }

  pub fn draw(&self) -> Result<Draw, ConfigError> {
    match &self.font {
      Some(path) => {
        let draw = Draw::default().with_font_file(path)?;
        info!("标签字体: {}", path.display());
        Ok(draw)
      }
      None => {
        info!("未配置标签字体，只绘制检测框");
        Ok(Draw::default())
      }
    }
  }

  pub fn reporter(&self) -> TallyReporter {
    match &self.tally_json {
      Some(path) => TallyReporter::new().with_snapshot_path(path),
      None => TallyReporter::new(),
    }
  }

  /// 启动日志，不包含密钥
  pub fn log_summary(&self) {
    info!("模型: {} @ {}", self.model_id, self.api_url);
    info!(
      "置信度阈值: {}，去重距离: {} px",
      self.filter.confidence_threshold(),
      self.filter.duplicate_distance()
    );
    info!(
      "轮询间隔: {:?}，请求超时: {:?}",
      self.poll_interval, self.timeout
    );
  }
}

/// 安装日志订阅者，级别由 `RUST_LOG` 控制，默认 `info`
pub fn init_logging() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  // 重复安装（例如测试中）时忽略
  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .try_init();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args() -> DetectionArgs {
    DetectionArgs {
      model_id: DEFAULT_MODEL_ID.to_string(),
      api_url: DEFAULT_API_URL.to_string(),
      api_key: Some("secret".to_string()),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      duplicate_distance: DEFAULT_DUPLICATE_DISTANCE,
      poll_interval: DEFAULT_POLL_INTERVAL_SECS,
      timeout: DEFAULT_TIMEOUT_SECS,
      font: None,
      track_max_confidence: false,
      tally_json: None,
    }
  }

  #[test]
  fn test_defaults() {
    let config = Config::from_args(&args()).unwrap();
    assert_eq!(config.filter(), PredictionFilter::default());
    assert_eq!(config.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.timeout(), Duration::from_secs(10));
    assert_eq!(config.policy(), ConfidencePolicy::FrozenAtInsert);
    assert_eq!(config.model_id(), "playing-cards-ow27d/4");
    assert_eq!(config.api_url().host_str(), Some("serverless.roboflow.com"));
    assert!(config.reporter().snapshot_path().is_none());
    assert!(!config.draw().unwrap().has_font());
  }

  #[test]
  fn test_missing_api_key() {
    let mut missing = args();
    missing.api_key = None;
    assert!(matches!(
      Config::from_args(&missing),
      Err(ConfigError::MissingApiKey)
    ));

    missing.api_key = Some("   ".to_string());
    let err = Config::from_args(&missing).err().unwrap();
    assert!(err.to_string().contains("ROBOFLOW_API_KEY"));
  }

  #[test]
  fn test_rejects_out_of_range_values() {
    let mut bad = args();
    bad.confidence_threshold = 1.5;
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::ConfidenceOutOfRange(_))
    ));

    let mut bad = args();
    bad.confidence_threshold = f32::NAN;
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::ConfidenceOutOfRange(_))
    ));

    let mut bad = args();
    bad.duplicate_distance = -1.0;
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::InvalidDuplicateDistance(_))
    ));

    let mut bad = args();
    bad.poll_interval = 0.0;
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::InvalidPollInterval(_))
    ));

    let mut bad = args();
    bad.timeout = f64::INFINITY;
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::InvalidTimeout(_))
    ));
  }

  #[test]
  fn test_rejects_bad_urls() {
    let mut bad = args();
    bad.api_url = "not a url".to_string();
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::InvalidApiUrl { .. })
    ));

    bad.api_url = "ftp://example.com".to_string();
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::UnsupportedApiUrl(_))
    ));

    let mut bad = args();
    bad.model_id = " / ".to_string();
    assert!(matches!(
      Config::from_args(&bad),
      Err(ConfigError::EmptyModelId)
    ));
  }

  #[test]
  fn test_optional_settings() {
    let mut custom = args();
    custom.track_max_confidence = true;
    custom.tally_json = Some(PathBuf::from("/tmp/tally.json"));
    custom.font = Some(PathBuf::from("/no/such/font.ttf"));

    let config = Config::from_args(&custom).unwrap();
    assert_eq!(config.policy(), ConfidencePolicy::TrackMax);
    assert!(config.reporter().snapshot_path().is_some());
    assert!(matches!(config.draw(), Err(ConfigError::FontError(_))));
  }
}
