// 该文件是 CardScan 项目的一部分。
// src/prediction.rs - 单个检测结果
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

use serde::Serialize;
use serde_json::Value;

/// 一次检测：类别（牌面代码）、置信度与中心点坐标的边界框（像素）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
  #[serde(rename = "class")]
  pub class_name: String,
  pub confidence: f32,
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Prediction {
  pub fn new(class_name: impl Into<String>, confidence: f32) -> Self {
    Self {
      class_name: class_name.into(),
      confidence,
      x: 0.0,
      y: 0.0,
      width: 0.0,
      height: 0.0,
    }
  }

  pub fn at(mut self, x: f32, y: f32) -> Self {
    self.x = x;
    self.y = y;
    self
  }

  pub fn with_size(mut self, width: f32, height: f32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  /// 从服务返回的 JSON 条目构造检测结果。
  ///
  /// 缺失或类型不对的数值字段取 `0.0`，缺失的类别取空串；
  /// 条目本身不是对象时返回 `None`。
  pub fn from_value(value: &Value) -> Option<Self> {
    let object = value.as_object()?;
    let number = |key: &str| {
      object
        .get(key)
        .and_then(|v| match v {
          Value::Number(n) => n.as_f64(),
          Value::String(s) => s.trim().parse::<f64>().ok(),
          _ => None,
        })
        .unwrap_or(0.0) as f32
    };

    let class_name = match object.get("class") {
      Some(Value::String(s)) => s.clone(),
      Some(Value::Number(n)) => n.to_string(),
      _ => String::new(),
    };

    Some(Self {
      class_name,
      confidence: number("confidence"),
      x: number("x"),
      y: number("y"),
      width: number("width"),
      height: number("height"),
    })
  }

  /// 两个检测框中心点之间的欧氏距离
  pub fn center_distance(&self, other: &Prediction) -> f32 {
    let dx = self.x - other.x;
    let dy = self.y - other.y;
    (dx * dx + dy * dy).sqrt()
  }
}
