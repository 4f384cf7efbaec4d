// 该文件是 CardScan 项目的一部分。
// src/report.rs - 计数报告
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

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{card, tally::SessionTally};

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSnapshot {
  pub code: String,
  pub name: String,
  /// 花色族名，例如 `hearts`
  pub family: &'static str,
  pub count: u32,
  pub confidence: f32,
}

/// 写入 JSON 的计数快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallySnapshot {
  pub total: u32,
  pub cards: Vec<CardSnapshot>,
}

impl From<&SessionTally> for TallySnapshot {
  fn from(tally: &SessionTally) -> Self {
    let cards = tally
      .iter()
      .map(|(code, entry)| CardSnapshot {
        code: code.to_string(),
        name: card::full_name(code),
        family: card::suit_family(code),
        count: entry.count,
        confidence: entry.confidence,
      })
      .collect();
    TallySnapshot {
      total: tally.total(),
      cards,
    }
  }
}

/// 把会话计数输出到日志，可选地写入 JSON 快照文件
#[derive(Debug, Default, Clone)]
pub struct TallyReporter {
  snapshot_path: Option<PathBuf>,
}

impl TallyReporter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.snapshot_path = Some(path.into());
    self
  }

  pub fn snapshot_path(&self) -> Option<&Path> {
    self.snapshot_path.as_deref()
  }

  pub fn report(&self, tally: &SessionTally) -> Result<(), ReportError> {
    info!("\n{}", tally);

    if let Some(path) = &self.snapshot_path {
      if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
      {
        std::fs::create_dir_all(parent)?;
      }
      let json = serde_json::to_string_pretty(&TallySnapshot::from(tally))?;
      std::fs::write(path, json)?;
      debug!("计数快照已写入: {}", path.display());
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::prediction::Prediction;
  use crate::tally::ConfidencePolicy;
  use serde_json::{Value, json};

  fn sample_tally() -> SessionTally {
    let mut tally = SessionTally::new(ConfidencePolicy::FrozenAtInsert);
    tally.reconcile_predictions(&[
      Prediction::new("KH", 0.9).at(100.0, 100.0),
      Prediction::new("KH", 0.7).at(900.0, 100.0),
      Prediction::new("AS", 0.5).at(500.0, 500.0),
    ]);
    tally
  }

  #[test]
  fn test_snapshot_from_tally() {
    let snapshot = TallySnapshot::from(&sample_tally());
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.cards.len(), 2);
    assert_eq!(snapshot.cards[0].code, "AS");
    assert_eq!(snapshot.cards[0].name, "♠️ Ace of Spades");
    assert_eq!(snapshot.cards[0].family, "spades");
    assert_eq!(snapshot.cards[1].family, "hearts");
    assert_eq!(snapshot.cards[1].count, 2);
  }

  #[test]
  fn test_writes_json_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports/tally.json");
    let reporter = TallyReporter::new().with_snapshot_path(&path);

    reporter.report(&sample_tally()).unwrap();
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["total"], json!(3));
    assert_eq!(written["cards"][1]["code"], json!("KH"));
    assert_eq!(written["cards"][1]["name"], json!("♥️ King of Hearts"));
    assert_eq!(written["cards"][1]["family"], json!("hearts"));
    assert_eq!(written["cards"][1]["count"], json!(2));

    reporter.report(&SessionTally::default()).unwrap();
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, json!({ "total": 0, "cards": [] }));
  }

  #[test]
  fn test_log_only_reporter() {
    let reporter = TallyReporter::new();
    assert!(reporter.snapshot_path().is_none());
    assert!(reporter.report(&sample_tally()).is_ok());
  }
}
