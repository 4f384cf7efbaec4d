// 该文件是 CardScan 项目的一部分。
// src/filter.rs - 检测结果过滤（置信度与空间去重）
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

use tracing::debug;

use crate::prediction::Prediction;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_DUPLICATE_DISTANCE: f32 = 250.0;

/// 单帧检测结果过滤器
///
/// 先丢弃低置信度的检测，再按置信度从高到低贪心接受：
/// 与已接受结果同类且中心距离小于阈值的检测视为同一张牌。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionFilter {
  confidence_threshold: f32,
  duplicate_distance: f32,
}

impl Default for PredictionFilter {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      duplicate_distance: DEFAULT_DUPLICATE_DISTANCE,
    }
  }
}

impl PredictionFilter {
  pub fn new(confidence_threshold: f32, duplicate_distance: f32) -> Self {
    Self {
      confidence_threshold,
      duplicate_distance,
    }
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn duplicate_distance(&self) -> f32 {
    self.duplicate_distance
  }

  pub fn filter(&self, predictions: &[Prediction]) -> Vec<Prediction> {
    // NaN 的比较结果为 false，会在这里被丢弃
    let mut candidates: Vec<&Prediction> = predictions
      .iter()
      .filter(|p| p.confidence >= self.confidence_threshold)
      .collect();

    // sort_by 是稳定排序，同置信度保持原有顺序
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut result: Vec<Prediction> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
      let duplicated = result.iter().any(|accepted| {
        accepted.class_name == candidate.class_name
          && accepted.center_distance(candidate) < self.duplicate_distance
      });
      if !duplicated {
        result.push(candidate.clone());
      }
    }

    debug!("过滤检测结果: {} -> {}", predictions.len(), result.len());
    result
  }
}
