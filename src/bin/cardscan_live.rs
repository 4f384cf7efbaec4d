// 该文件是 CardScan 项目的一部分。
// src/bin/cardscan_live.rs - 实时模式：持续识别视频流中的扑克牌
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

use std::io::BufRead;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use cardscan::{
  FromUrl,
  config::{Config, DetectionArgs, init_logging},
  input::InputWrapper,
  output::OutputWrapper,
  session::{Control, Mode, Session, parse_control},
  task::{LiveTask, Task},
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// CardScan 实时模式
///
/// 运行中可在标准输入键入 `reset` 清空计数，`stop` 或 `quit` 结束。
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 视频来源，例如 folder:///path/to/frames?fps=15 或 gst://camera/dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///tmp/live.png 或 folder:///tmp/records
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub detection: DetectionArgs,
}

fn spawn_stdin_controls(tx: Sender<Control>) {
  thread::spawn(move || {
    for line in std::io::stdin().lock().lines() {
      let Ok(line) = line else {
        break;
      };
      match parse_control(&line) {
        Some(control) => {
          if tx.send(control).is_err() {
            break;
          }
        }
        None if line.trim().is_empty() => {}
        None => warn!("未知命令: {}（可用: reset, stop, quit）", line.trim()),
      }
    }
  });
}

fn main() -> Result<()> {
  init_logging();

  let args = Args::parse();
  let config = Config::from_args(&args.detection)?;
  config.log_summary();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?.with_draw(config.draw()?);
  let model = config.hosted_model()?;
  let mut session = Session::new(Mode::Live, config.policy());

  let (tx, rx) = mpsc::channel();
  let interrupt = tx.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = interrupt.send(Control::Stop);
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  spawn_stdin_controls(tx);

  LiveTask::new(config.filter())
    .with_reporter(config.reporter())
    .with_poll_interval(config.poll_interval())
    .with_control(rx)
    .run_task(input, model, output, &mut session)?;

  Ok(())
}
