// 该文件是 Kanmen （看门） 项目的一部分。
// src/notify.rs - 检测结果通知
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

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use crate::{config::NotifyConfig, task::RunReport};

mod email;
pub use self::email::EmailTransport;

mod sms;
pub use self::sms::TwilioTransport;

/// 短信正文
pub const TERSE_MESSAGE: &str = "Human Detected. Check log files";

#[derive(Error, Debug)]
pub enum NotifyError {
  #[error("短信发送失败: {0}")]
  Sms(String),
  #[error("邮件地址无效: {0}")]
  Address(String),
  #[error("邮件构建失败: {0}")]
  Message(String),
  #[error("邮件发送失败: {0}")]
  Smtp(String),
}

/// 一次运行的告警内容
#[derive(Debug, Clone, Copy)]
pub struct Alert<'a> {
  flagged: &'a [&'a Path],
}

impl<'a> Alert<'a> {
  pub fn new(flagged: &'a [&'a Path]) -> Self {
    Self { flagged }
  }

  pub fn flagged(&self) -> &[&'a Path] {
    self.flagged
  }

  /// 简短固定文本
  pub fn terse_text(&self) -> &'static str {
    TERSE_MESSAGE
  }

  /// 每行一个检出人物的文件路径
  pub fn detailed_text(&self) -> String {
    self
      .flagged
      .iter()
      .map(|p| p.display().to_string())
      .collect::<Vec<_>>()
      .join("\n")
  }
}

/// 通知渠道，尽力投递，不重试
pub trait Transport {
  fn name(&self) -> &'static str;
  fn send(&self, alert: &Alert<'_>) -> Result<(), NotifyError>;
}

/// 每个渠道的发送结果
#[derive(Debug, Default)]
pub struct DispatchSummary {
  pub sent: Vec<&'static str>,
  pub failed: Vec<(&'static str, NotifyError)>,
}

impl DispatchSummary {
  pub fn attempted(&self) -> usize {
    self.sent.len() + self.failed.len()
  }
}

pub struct NotificationDispatcher {
  transports: Vec<Box<dyn Transport>>,
}

impl NotificationDispatcher {
  pub fn new(transports: Vec<Box<dyn Transport>>) -> Self {
    Self { transports }
  }

  pub fn from_config(config: &NotifyConfig) -> Self {
    let mut transports: Vec<Box<dyn Transport>> = Vec::new();
    if let Some(twilio) = &config.twilio {
      transports.push(Box::new(TwilioTransport::new(twilio.clone())));
    }
    if let Some(email) = &config.email {
      transports.push(Box::new(EmailTransport::new(email.clone())));
    }
    Self { transports }
  }

  pub fn is_empty(&self) -> bool {
    self.transports.is_empty()
  }

  /// 仅当有视频检出人物时，每个渠道发送一次；失败只记录，不影响已有结果
  pub fn dispatch(&self, report: &RunReport) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    if !report.human_detected() {
      return summary;
    }

    let flagged = report.flagged_files();
    let alert = Alert::new(&flagged);
    for transport in &self.transports {
      match transport.send(&alert) {
        Ok(()) => {
          info!("已通过 {} 发送通知", transport.name());
          summary.sent.push(transport.name());
        }
        Err(e) => {
          error!("通过 {} 发送通知失败: {}", transport.name(), e);
          summary.failed.push((transport.name(), e));
        }
      }
    }
    summary
  }
}
