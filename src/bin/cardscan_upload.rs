// 该文件是 CardScan 项目的一部分。
// src/bin/cardscan_upload.rs - 上传模式：识别单张（或多张）图像中的扑克牌
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use cardscan::{
  FromUrl,
  config::{Config, DetectionArgs, init_logging},
  input::InputWrapper,
  output::OutputWrapper,
  session::{Mode, Session},
  task::{Task, UploadTask},
};

/// CardScan 上传模式
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///path/to/cards.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///path/to/result.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub detection: DetectionArgs,
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
  let mut session = Session::new(Mode::Upload, config.policy());

  UploadTask::new(config.filter())
    .with_reporter(config.reporter())
    .run_task(input, model, output, &mut session)?;

  Ok(())
}
