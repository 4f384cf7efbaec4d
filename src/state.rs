// 该文件是 CardScan 项目的一部分。
// src/state.rs - 实时模式下共享的检测状态
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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::prediction::Prediction;

/// 单个视频流的检测状态
///
/// 后台推理任务写入最近一次过滤后的检测结果，帧分发路径与轮询循环读取。
/// 锁只在复制或替换结果时持有，不跨越网络请求。
#[derive(Debug, Default)]
pub struct DetectionState {
  predictions: Mutex<Vec<Prediction>>,
  busy: AtomicBool,
}

/// 推理占用标记，drop 时释放（包括出错与 panic 的路径）
#[derive(Debug)]
pub struct BusyGuard {
  state: Arc<DetectionState>,
}

impl BusyGuard {
  pub fn state(&self) -> &DetectionState {
    &self.state
  }
}

impl Drop for BusyGuard {
  fn drop(&mut self) {
    self.state.busy.store(false, Ordering::Release);
  }
}

impl DetectionState {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Vec<Prediction>> {
    // 数据是普通值，锁中毒时直接沿用
    self
      .predictions
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// 尝试占用推理槽位；已有请求在途时返回 `None`
  pub fn try_begin(self: &Arc<Self>) -> Option<BusyGuard> {
    self
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| BusyGuard {
        state: Arc::clone(self),
      })
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }

  /// 用新的检测结果替换当前结果（后写者胜）
  pub fn publish(&self, predictions: Vec<Prediction>) {
    *self.lock() = predictions;
  }

  /// 当前检测结果的副本
  pub fn snapshot(&self) -> Vec<Prediction> {
    self.lock().clone()
  }
}
