// 该文件是 CardScan 项目的一部分。
// src/task.rs - 检测任务（上传模式与实时模式）
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

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::{
  config::DEFAULT_POLL_INTERVAL_SECS,
  filter::PredictionFilter,
  frame::Frame,
  model::{CardModel, detect_cards},
  output::Render,
  prediction::Prediction,
  report::TallyReporter,
  session::{Control, Session},
  state::DetectionState,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    model: M,
    output: O,
    session: &mut Session,
  ) -> Result<(), Self::Error>;
}

fn publish_report(reporter: &TallyReporter, session: &Session) {
  if let Err(e) = reporter.report(session.tally()) {
    warn!("计数报告输出失败: {}", e);
  }
}

/// 上传模式中单张图像的处理阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadState {
  #[default]
  Idle,
  ImageReceived,
  Detecting,
  Rendered,
}

/// 上传模式：每张图像同步走一遍 Idle → ImageReceived → Detecting → Rendered
#[derive(Debug, Default)]
pub struct UploadTask {
  filter: PredictionFilter,
  reporter: TallyReporter,
  state: UploadState,
}

impl UploadTask {
  pub fn new(filter: PredictionFilter) -> Self {
    Self {
      filter,
      ..Self::default()
    }
  }

  pub fn with_reporter(mut self, reporter: TallyReporter) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn state(&self) -> UploadState {
    self.state
  }

  fn transition(&mut self, next: UploadState) {
    debug!("上传状态: {:?} -> {:?}", self.state, next);
    self.state = next;
  }

  /// 处理一张图像，返回过滤后的检测结果
  pub fn process<M, O>(
    &mut self,
    frame: &Frame,
    model: &M,
    output: &O,
    session: &mut Session,
  ) -> anyhow::Result<Vec<Prediction>>
  where
    M: CardModel,
    M::Error: Display,
    O: Render,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    self.transition(UploadState::Idle);
    self.transition(UploadState::ImageReceived);
    info!(
      "收到第 {} 张图像 ({}x{})",
      frame.index + 1,
      frame.width(),
      frame.height()
    );

    self.transition(UploadState::Detecting);
    let now = Instant::now();
    let raw = detect_cards(model, &frame.image);
    let predictions = self.filter.filter(&raw);
    info!(
      "检测完成，耗时: {:.2?}，原始 {} 个，过滤后 {} 个",
      now.elapsed(),
      raw.len(),
      predictions.len()
    );

    output.render_result(frame, &predictions)?;
    session.reconcile_predictions(&predictions);
    publish_report(&self.reporter, session);
    self.transition(UploadState::Rendered);

    Ok(predictions)
  }
}

impl<I, M, O> Task<I, M, O> for UploadTask
where
  I: Iterator<Item = Frame>,
  M: CardModel,
  M::Error: Display,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    mut self,
    input: I,
    model: M,
    output: O,
    session: &mut Session,
  ) -> Result<(), Self::Error> {
    info!("开始上传任务...");
    let mut images = 0;
    for frame in input {
      self.process(&frame, &model, &output, session)?;
      images += 1;
    }

    if images == 0 {
      return Err(anyhow::anyhow!("没有输入图像"));
    }

    info!("上传任务完成，共处理 {} 张图像", images);
    Ok(())
  }
}

/// 实时模式：帧分发线程即时显示帧并提交推理，调用线程定期合并计数
pub struct LiveTask {
  filter: PredictionFilter,
  reporter: TallyReporter,
  poll_interval: Duration,
  control: Option<Receiver<Control>>,
}

impl Default for LiveTask {
  fn default() -> Self {
    Self {
      filter: PredictionFilter::default(),
      reporter: TallyReporter::default(),
      poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS),
      control: None,
    }
  }
}

impl LiveTask {
  pub fn new(filter: PredictionFilter) -> Self {
    Self {
      filter,
      ..Self::default()
    }
  }

  pub fn with_reporter(mut self, reporter: TallyReporter) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn with_control(mut self, control: Receiver<Control>) -> Self {
    self.control = Some(control);
    self
  }

  /// 等待一个轮询间隔，期间收到的控制命令立即返回
  fn wait_control(&mut self) -> Option<Control> {
    match &self.control {
      Some(rx) => match rx.recv_timeout(self.poll_interval) {
        Ok(control) => Some(control),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => {
          debug!("控制通道已关闭");
          self.control = None;
          None
        }
      },
      None => {
        thread::sleep(self.poll_interval);
        None
      }
    }
  }

  fn reconcile(&self, state: &DetectionState, session: &mut Session) {
    let predictions = state.snapshot();
    if session.reconcile_predictions(&predictions) {
      publish_report(&self.reporter, session);
    }
  }
}

/// 占用空闲的推理槽位并在后台线程中推理；槽位被占用时只显示不提交
fn submit_inference<M>(
  state: &Arc<DetectionState>,
  model: &Arc<M>,
  filter: PredictionFilter,
  frame: &Frame,
) -> bool
where
  M: CardModel + Send + Sync + 'static,
  M::Error: Display,
{
  let Some(guard) = state.try_begin() else {
    return false;
  };

  let model = Arc::clone(model);
  let image = frame.image.clone();
  let index = frame.index;
  // 不等待后台线程；停止时在途结果直接丢弃
  thread::spawn(move || {
    let raw = detect_cards(model.as_ref(), &image);
    let predictions = filter.filter(&raw);
    debug!("第 {} 帧推理完成: {} 个检测", index, predictions.len());
    guard.state().publish(predictions);
  });
  true
}

impl<I, M, O> Task<I, M, O> for LiveTask
where
  I: Iterator<Item = Frame> + Send,
  M: CardModel + Send + Sync + 'static,
  M::Error: Display,
  O: Render + Send,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(
    mut self,
    input: I,
    model: M,
    output: O,
    session: &mut Session,
  ) -> Result<(), Self::Error> {
    info!("开始实时任务，轮询间隔 {:?}", self.poll_interval);
    let state = Arc::new(DetectionState::new());
    let model = Arc::new(model);
    let stop = AtomicBool::new(false);
    let filter = self.filter;

    publish_report(&self.reporter, session);

    let frames = thread::scope(|s| {
      let (state_ref, model_ref, stop_ref) = (&state, &model, &stop);
      let delivery = s.spawn(move || {
        let mut frames = 0u64;
        let mut submitted = 0u64;
        for frame in input {
          if stop_ref.load(Ordering::Acquire) {
            break;
          }
          if submit_inference(state_ref, model_ref, filter, &frame) {
            submitted += 1;
          }
          let overlay = state_ref.snapshot();
          if let Err(e) = output.render_result(&frame, &overlay) {
            error!("第 {} 帧输出失败: {}", frame.index, e);
          }
          frames += 1;
        }
        info!("视频流结束: {} 帧，提交推理 {} 次", frames, submitted);
        frames
      });

      // 帧分发线程结束（流结束或异常）时退出轮询
      while !delivery.is_finished() {
        match self.wait_control() {
          Some(Control::Reset) => {
            session.reset();
            publish_report(&self.reporter, session);
          }
          Some(Control::Stop) => {
            info!("收到停止命令");
            stop.store(true, Ordering::Release);
            break;
          }
          None => self.reconcile(&state, session),
        }
      }

      delivery
        .join()
        .map_err(|_| anyhow::anyhow!("帧分发线程异常退出"))
    })?;

    self.reconcile(&state, session);
    info!(
      "实时任务结束，共 {} 帧，识别 {} 张牌",
      frames,
      session.tally().total()
    );
    Ok(())
  }
}
