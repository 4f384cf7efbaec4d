// 该文件是 CardScan 项目的一部分。
// src/session.rs - 会话上下文与用户控制
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

use std::fmt;

use tracing::info;

use crate::{
  prediction::Prediction,
  tally::{ConfidencePolicy, SessionTally},
};

/// 会话模式，启动时选定，会话期间不变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Upload,
  Live,
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mode::Upload => write!(f, "upload"),
      Mode::Live => write!(f, "live"),
    }
  }
}

/// 实时模式下的用户控制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  /// 清空会话计数
  Reset,
  /// 停止视频流
  Stop,
}

/// 解析标准输入中的一行控制命令
pub fn parse_control(line: &str) -> Option<Control> {
  match line.trim().to_ascii_lowercase().as_str() {
    "reset" => Some(Control::Reset),
    "stop" | "quit" => Some(Control::Stop),
    _ => None,
  }
}

#[derive(Debug, Clone)]
pub struct Session {
  mode: Mode,
  tally: SessionTally,
}

impl Session {
  pub fn new(mode: Mode, policy: ConfidencePolicy) -> Self {
    info!("新会话: 模式 {}，置信度策略 {:?}", mode, policy);
    Self {
      mode,
      tally: SessionTally::new(policy),
    }
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn tally(&self) -> &SessionTally {
    &self.tally
  }

  /// 合并一帧已过滤的检测结果，返回计数是否变化
  pub fn reconcile_predictions(&mut self, predictions: &[Prediction]) -> bool {
    self.tally.reconcile_predictions(predictions)
  }

  pub fn reset(&mut self) {
    info!("会话计数已清空");
    self.tally.reset();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_control() {
    assert_eq!(parse_control("reset"), Some(Control::Reset));
    assert_eq!(parse_control("  STOP \n"), Some(Control::Stop));
    assert_eq!(parse_control("quit"), Some(Control::Stop));
    assert_eq!(parse_control(""), None);
    assert_eq!(parse_control("restart"), None);
  }

  #[test]
  fn test_reset_clears_tally() {
    let mut session = Session::new(Mode::Live, ConfidencePolicy::default());
    assert!(session.reconcile_predictions(&[Prediction::new("QC", 0.8)]));
    assert!(!session.reconcile_predictions(&[Prediction::new("QC", 0.99)]));
    assert_eq!(session.tally().total(), 1);

    session.reset();
    assert!(session.tally().is_empty());
    assert_eq!(session.mode(), Mode::Live);
  }
}
