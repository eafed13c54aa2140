// 该文件是 Kanmen （看门） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use kanmen::{
  config::NotifyConfig,
  model::YoloBuilder,
  notify::NotificationDispatcher,
  output::{RunDirectory, RunLog, SnapshotOutput},
  scan::VideoScanner,
  task::BatchRunner,
};

#[cfg(feature = "ffmpeg_input")]
fn video_opener() -> kanmen::input::FfmpegOpener {
  kanmen::input::FfmpegOpener
}

#[cfg(not(feature = "ffmpeg_input"))]
fn video_opener() -> kanmen::input::FfmpegCliOpener {
  kanmen::input::FfmpegCliOpener::default()
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let config = args.run_config();

  info!("扫描目录: {}", config.input_dir.display());
  info!("模型: {} ({})", config.model_path().display(), config.variant);
  info!("抽帧步长: {}, 置信度阈值: {}", config.stride, config.confidence);

  // 凭据缺失时在创建任何输出前退出
  let notify = NotifyConfig::from_env(&args.notify_request())?;
  let dispatcher = NotificationDispatcher::from_config(&notify);

  info!("正在加载模型...");
  let model = YoloBuilder::new(config.model_path())
    .confidence(config.confidence)
    .build()?;
  info!("模型加载完成");

  let run_dir = RunDirectory::create(&config.output_root, &Local::now())
    .with_context(|| format!("无法在 {} 下创建运行目录", config.output_root.display()))?;
  info!("运行目录: {}", run_dir.path().display());

  let log = RunLog::create(run_dir.log_path())?;
  let snapshots = SnapshotOutput::new(run_dir.path())?;
  let scanner = VideoScanner::new(video_opener(), model, snapshots).with_stride(config.stride);

  let report = BatchRunner::new(run_dir.run_id(), scanner, log).run(&config.input_dir)?;

  if report.human_detected() {
    warn!(
      "{} 个视频检出人物，详见 {}",
      report.flagged_files().len(),
      report.log_path().display()
    );
    let summary = dispatcher.dispatch(&report);
    if !summary.failed.is_empty() {
      warn!("{} 个通知发送失败", summary.failed.len());
    }
  } else {
    info!("未检出人物");
  }

  Ok(())
}
