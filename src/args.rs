// 该文件是 Kanmen （看门） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::num::NonZeroU64;
use std::path::PathBuf;

use clap::Parser;

use kanmen::{
  config::{DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER, NotifyRequest, RunConfig},
  model::ModelVariant,
};

/// 扫描目录中的视频，发现人物时保存快照并发送告警
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待扫描的视频目录（递归）
  #[arg(short, long, value_name = "DIR")]
  pub directory: PathBuf,

  /// 检出人物时发送 Twilio 短信
  #[arg(long)]
  pub twilio: bool,

  /// 检出人物时发送邮件
  #[arg(long)]
  pub email: bool,

  /// 使用完整模型（更准但更慢）
  #[arg(long)]
  pub full_yolo: bool,

  /// 模型权重所在目录
  #[arg(long, default_value = "models", value_name = "DIR")]
  pub model_dir: PathBuf,

  /// 运行目录的父目录
  #[arg(long, default_value = ".", value_name = "DIR")]
  pub output_root: PathBuf,

  /// 抽帧步长
  #[arg(long, default_value = "3", value_name = "N")]
  pub stride: NonZeroU64,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.4", value_name = "THRESHOLD", value_parser = parse_confidence)]
  pub confidence: f32,

  /// SMTP 服务器
  #[arg(long, default_value = DEFAULT_SMTP_SERVER, value_name = "HOST")]
  pub smtp_server: String,

  /// SMTP 端口（隐式 TLS）
  #[arg(long, default_value_t = DEFAULT_SMTP_PORT, value_name = "PORT")]
  pub smtp_port: u16,
}

fn parse_confidence(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|e| format!("{}", e))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("置信度必须在 0.0 到 1.0 之间: {}", value))
  }
}

impl Args {
  pub fn variant(&self) -> ModelVariant {
    if self.full_yolo {
      ModelVariant::Accurate
    } else {
      ModelVariant::Fast
    }
  }

  pub fn run_config(&self) -> RunConfig {
    RunConfig {
      input_dir: self.directory.clone(),
      output_root: self.output_root.clone(),
      model_dir: self.model_dir.clone(),
      variant: self.variant(),
      stride: self.stride,
      confidence: self.confidence,
    }
  }

  pub fn notify_request(&self) -> NotifyRequest {
    NotifyRequest {
      sms: self.twilio,
      email: self.email,
      smtp_server: self.smtp_server.clone(),
      smtp_port: self.smtp_port,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::try_parse_from(["kanmen", "-d", "videos"]).unwrap();
    let config = args.run_config();
    assert_eq!(config.input_dir, PathBuf::from("videos"));
    assert_eq!(config.variant, ModelVariant::Fast);
    assert_eq!(config.stride.get(), 3);
    assert_eq!(config.confidence, 0.4);
    let request = args.notify_request();
    assert!(!request.sms && !request.email);
    assert_eq!(request.smtp_server, "smtp.gmail.com");
    assert_eq!(request.smtp_port, 465);
  }

  #[test]
  fn flags() {
    let args = Args::try_parse_from([
      "kanmen",
      "--directory",
      "v",
      "--twilio",
      "--email",
      "--full-yolo",
      "--stride",
      "5",
    ])
    .unwrap();
    assert_eq!(args.variant(), ModelVariant::Accurate);
    assert_eq!(args.stride.get(), 5);
    assert!(args.notify_request().sms);
    assert!(args.notify_request().email);
  }

  #[test]
  fn rejects_bad_values() {
    assert!(Args::try_parse_from(["kanmen"]).is_err());
    assert!(Args::try_parse_from(["kanmen", "-d", "v", "--stride", "0"]).is_err());
    assert!(Args::try_parse_from(["kanmen", "-d", "v", "--confidence", "1.5"]).is_err());
  }
}
