// 该文件是 CardScan 项目的一部分。
// src/tally.rs - 会话计数
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

//! # 会话计数
//!
//! 帧间的检测是有噪声且不完整的（遮挡、运动模糊）。
//! 某类牌的计数只会在单帧内同时看到更多张时才上升，
//! 近似于“同一时刻可见的该类实体牌数量的最大值”，
//! 避免因帧间闪烁重复计数。没有衰减，只能通过 [`SessionTally::reset`] 清空。

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::card;
use crate::prediction::Prediction;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TallyEntry {
  pub count: u32,
  pub confidence: f32,
}

/// 已存在条目的置信度如何更新
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfidencePolicy {
  /// 置信度固定为首次插入时的值，只有计数会上升
  #[default]
  FrozenAtInsert,
  /// 置信度跟踪会话内见过的最大值，上升时也视为变化
  TrackMax,
}

/// 单帧内按类别分组的计数：数量与最大置信度
pub fn frame_counts(predictions: &[Prediction]) -> BTreeMap<String, TallyEntry> {
  let mut counts: BTreeMap<String, TallyEntry> = BTreeMap::new();
  for pred in predictions {
    counts
      .entry(pred.class_name.clone())
      .and_modify(|entry| {
        entry.count += 1;
        entry.confidence = entry.confidence.max(pred.confidence);
      })
      .or_insert(TallyEntry {
        count: 1,
        confidence: pred.confidence,
      });
  }
  counts
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTally {
  entries: BTreeMap<String, TallyEntry>,
  policy: ConfidencePolicy,
}

impl SessionTally {
  pub fn new(policy: ConfidencePolicy) -> Self {
    Self {
      entries: BTreeMap::new(),
      policy,
    }
  }

  pub fn policy(&self) -> ConfidencePolicy {
    self.policy
  }

  /// 合并一帧的分组计数，返回计数表是否发生变化
  pub fn reconcile(&mut self, current: &BTreeMap<String, TallyEntry>) -> bool {
    let mut changed = false;
    for (code, seen) in current {
      match self.entries.get_mut(code) {
        None => {
          self.entries.insert(code.clone(), *seen);
          changed = true;
        }
        Some(entry) => {
          if seen.count > entry.count {
            entry.count = seen.count;
            changed = true;
          }
          if self.policy == ConfidencePolicy::TrackMax && seen.confidence > entry.confidence {
            entry.confidence = seen.confidence;
            changed = true;
          }
        }
      }
    }
    changed
  }

  /// 直接合并一帧（已过滤的）检测结果
  pub fn reconcile_predictions(&mut self, predictions: &[Prediction]) -> bool {
    self.reconcile(&frame_counts(predictions))
  }

  pub fn reset(&mut self) {
    self.entries.clear();
  }

  pub fn get(&self, code: &str) -> Option<&TallyEntry> {
    self.entries.get(code)
  }

  /// 按牌面代码排序遍历
  pub fn iter(&self) -> impl Iterator<Item = (&str, &TallyEntry)> {
    self.entries.iter().map(|(code, entry)| (code.as_str(), entry))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// 所有类别计数之和
  pub fn total(&self) -> u32 {
    self.entries.values().map(|entry| entry.count).sum()
  }
}

impl fmt::Display for SessionTally {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Cards Detected: {}", self.total())?;
    if self.is_empty() {
      return write!(f, "  No cards detected yet");
    }
    let mut lines = self.iter().peekable();
    while let Some((code, entry)) = lines.next() {
      let count = if entry.count > 1 {
        format!(" x{}", entry.count)
      } else {
        String::new()
      };
      write!(
        f,
        "  {}{} {:.0}%",
        card::full_name(code),
        count,
        entry.confidence * 100.0
      )?;
      if lines.peek().is_some() {
        writeln!(f)?;
      }
    }
    Ok(())
  }
}
