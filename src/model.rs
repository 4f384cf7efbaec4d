// 该文件是 CardScan 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use serde_json::Value;
use tracing::{debug, warn};

use crate::prediction::Prediction;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 以 RGB 图像为输入、输出原始检测列表的模型
pub trait CardModel: Model<Input = RgbImage, Output = Vec<Prediction>> {}

impl<M: Model<Input = RgbImage, Output = Vec<Prediction>>> CardModel for M {}

/// 调用模型并吞掉推理错误：任何失败都视为本帧没有检测结果
pub fn detect_cards<M>(model: &M, image: &RgbImage) -> Vec<Prediction>
where
  M: CardModel,
  M::Error: std::fmt::Display,
{
  match model.infer(image) {
    Ok(predictions) => predictions,
    Err(e) => {
      warn!("卡牌检测失败，本帧按无检测处理: {}", e);
      Vec::new()
    }
  }
}

/// 检测列表在响应中可能使用的字段名，按优先级排列
const PREDICTION_KEYS: [&str; 3] = ["predictions", "results", "detections"];

/// 把服务返回的 JSON 统一为检测列表。
///
/// - 顶层缺少 `predictions` 时依次尝试 `results`、`detections`
/// - 顶层是数组时视为 `{predictions: [...]}`
/// - 其它形状得到空列表；无法解析的条目被跳过
pub fn normalize_response(value: &Value) -> Vec<Prediction> {
  let entries = match value {
    Value::Array(items) => Some(items),
    Value::Object(object) => PREDICTION_KEYS
      .iter()
      .find_map(|key| object.get(*key).and_then(Value::as_array)),
    _ => None,
  };

  match entries {
    Some(items) => items.iter().filter_map(Prediction::from_value).collect(),
    None => {
      debug!("响应中没有检测列表字段");
      Vec::new()
    }
  }
}

mod hosted;
pub use self::hosted::{
  DEFAULT_API_URL, DEFAULT_MODEL_ID, DEFAULT_TIMEOUT, HostedModel, HostedModelBuilder,
  InferenceError,
};

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  struct FailingModel;

  impl Model for FailingModel {
    type Input = RgbImage;
    type Output = Vec<Prediction>;
    type Error = String;

    fn infer(&self, _input: &RgbImage) -> Result<Vec<Prediction>, String> {
      Err("connection reset".to_string())
    }
  }

  struct FixedModel(Vec<Prediction>);

  impl Model for FixedModel {
    type Input = RgbImage;
    type Output = Vec<Prediction>;
    type Error = String;

    fn infer(&self, _input: &RgbImage) -> Result<Vec<Prediction>, String> {
      Ok(self.0.clone())
    }
  }

  #[test]
  fn test_detect_cards_swallows_errors() {
    let image = RgbImage::new(8, 8);
    assert!(detect_cards(&FailingModel, &image).is_empty());

    let model = FixedModel(vec![Prediction::new("AH", 0.9)]);
    assert_eq!(detect_cards(&model, &image).len(), 1);
  }

  #[test]
  fn test_normalize_predictions_field() {
    let value = json!({
      "time": 0.05,
      "image": { "width": 640, "height": 480 },
      "predictions": [
        { "class": "KH", "confidence": 0.9, "x": 100, "y": 100, "width": 50, "height": 70 },
        { "class": "7S", "confidence": 0.6, "x": 500, "y": 500, "width": 50, "height": 70 }
      ]
    });

    let predictions = normalize_response(&value);
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].class_name, "KH");
    assert_eq!(predictions[1].x, 500.0);
  }

  #[test]
  fn test_normalize_aliases() {
    let results = json!({ "results": [{ "class": "AH", "confidence": 0.8 }] });
    assert_eq!(normalize_response(&results)[0].class_name, "AH");

    let detections = json!({ "detections": [{ "class": "2D", "confidence": 0.7 }] });
    assert_eq!(normalize_response(&detections)[0].class_name, "2D");

    let bare = json!([{ "class": "QC", "confidence": 0.6 }, "garbage", 3]);
    let predictions = normalize_response(&bare);
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].class_name, "QC");
  }

  #[test]
  fn test_normalize_prefers_predictions_over_aliases() {
    let value = json!({
      "predictions": [{ "class": "AH" }],
      "results": [{ "class": "KS" }, { "class": "KD" }]
    });
    let predictions = normalize_response(&value);
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].class_name, "AH");
  }

  #[test]
  fn test_normalize_unexpected_shapes() {
    assert!(normalize_response(&json!({ "error": "unauthorized" })).is_empty());
    assert!(normalize_response(&json!({ "predictions": "none" })).is_empty());
    assert!(normalize_response(&json!("ok")).is_empty());
    assert!(normalize_response(&Value::Null).is_empty());
  }
}
