// 该文件是 Kanmen （看门） 项目的一部分。
// src/config.rs - 运行配置与通知凭据
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

use thiserror::Error;

use crate::model::ModelVariant;

pub const TWILIO_TOKEN: &str = "TWILIO_TOKEN";
pub const TWILIO_SID: &str = "TWILIO_SID";
pub const TWILIO_FROM: &str = "TWILIO_FROM";
pub const TWILIO_TO: &str = "TWILIO_TO";

pub const ALERT_SENDER_EMAIL: &str = "ALERT_SENDER_EMAIL";
pub const ALERT_SENDER_PASS: &str = "ALERT_SENDER_PASS";
pub const ALERT_RECEIVER_EMAIL: &str = "ALERT_RECEIVER_EMAIL";

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("缺少通知所需的环境变量: {}", .0.join(", "))]
  MissingEnv(Vec<&'static str>),
}

/// 扫描参数
#[derive(Debug, Clone)]
pub struct RunConfig {
  pub input_dir: PathBuf,
  pub output_root: PathBuf,
  pub model_dir: PathBuf,
  pub variant: ModelVariant,
  pub stride: NonZeroU64,
  pub confidence: f32,
}

impl RunConfig {
  pub fn model_path(&self) -> PathBuf {
    self.variant.model_path(&self.model_dir)
  }
}

/// 命令行请求启用的通知方式
#[derive(Debug, Clone)]
pub struct NotifyRequest {
  pub sms: bool,
  pub email: bool,
  pub smtp_server: String,
  pub smtp_port: u16,
}

impl Default for NotifyRequest {
  fn default() -> Self {
    Self {
      sms: false,
      email: false,
      smtp_server: DEFAULT_SMTP_SERVER.to_string(),
      smtp_port: DEFAULT_SMTP_PORT,
    }
  }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TwilioConfig {
  pub auth_token: String,
  pub account_sid: String,
  pub from: String,
  pub to: String,
}

impl std::fmt::Debug for TwilioConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TwilioConfig")
      .field("auth_token", &"***")
      .field("account_sid", &self.account_sid)
      .field("from", &self.from)
      .field("to", &self.to)
      .finish()
  }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
  pub sender: String,
  pub password: String,
  pub receiver: String,
  pub smtp_server: String,
  pub smtp_port: u16,
}

impl std::fmt::Debug for EmailConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EmailConfig")
      .field("sender", &self.sender)
      .field("password", &"***")
      .field("receiver", &self.receiver)
      .field("smtp_server", &self.smtp_server)
      .field("smtp_port", &self.smtp_port)
      .finish()
  }
}

/// 启动时一次性读取并校验的通知配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
  pub twilio: Option<TwilioConfig>,
  pub email: Option<EmailConfig>,
}

impl NotifyConfig {
  /// 从进程环境变量读取
  pub fn from_env(request: &NotifyRequest) -> Result<Self, ConfigError> {
    Self::from_lookup(request, |key| std::env::var(key).ok())
  }

  /// 只读取已启用方式所需的变量，空字符串视为缺失；
  /// 缺失时一次性报告全部缺失的变量名
  pub fn from_lookup<F>(request: &NotifyRequest, lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut missing = Vec::new();
    let mut require = |key: &'static str| match lookup(key).filter(|v| !v.trim().is_empty()) {
      Some(value) => value,
      None => {
        missing.push(key);
        String::new()
      }
    };

    let twilio = request.sms.then(|| TwilioConfig {
      auth_token: require(TWILIO_TOKEN),
      account_sid: require(TWILIO_SID),
      from: require(TWILIO_FROM),
      to: require(TWILIO_TO),
    });

    let email = request.email.then(|| EmailConfig {
      sender: require(ALERT_SENDER_EMAIL),
      password: require(ALERT_SENDER_PASS),
      receiver: require(ALERT_RECEIVER_EMAIL),
      smtp_server: request.smtp_server.clone(),
      smtp_port: request.smtp_port,
    });

    if !missing.is_empty() {
      return Err(ConfigError::MissingEnv(missing));
    }

    Ok(Self { twilio, email })
  }

  pub fn is_empty(&self) -> bool {
    self.twilio.is_none() && self.email.is_none()
  }
}
