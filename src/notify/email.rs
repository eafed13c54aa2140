// 该文件是 Kanmen （看门） 项目的一部分。
// src/notify/email.rs - SMTP 邮件通知
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

use std::time::Duration;

use lettre::{
  Message, SmtpTransport, Transport as _,
  message::{Mailbox, header::ContentType},
  transport::smtp::authentication::Credentials,
};

use super::{Alert, NotifyError, Transport};
use crate::config::EmailConfig;

pub const SUBJECT: &str = "Human detected";

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct EmailTransport {
  config: EmailConfig,
}

impl EmailTransport {
  pub fn new(config: EmailConfig) -> Self {
    Self { config }
  }

  /// 正文为检出人物的文件列表，每行一个
  pub fn build_message(&self, alert: &Alert<'_>) -> Result<Message, NotifyError> {
    let from: Mailbox = self
      .config
      .sender
      .parse()
      .map_err(|e| NotifyError::Address(format!("{}: {}", self.config.sender, e)))?;
    let to: Mailbox = self
      .config
      .receiver
      .parse()
      .map_err(|e| NotifyError::Address(format!("{}: {}", self.config.receiver, e)))?;

    Message::builder()
      .from(from)
      .to(to)
      .subject(SUBJECT)
      .header(ContentType::TEXT_PLAIN)
      .body(alert.detailed_text())
      .map_err(|e| NotifyError::Message(e.to_string()))
  }
}

impl Transport for EmailTransport {
  fn name(&self) -> &'static str {
    "email"
  }

  fn send(&self, alert: &Alert<'_>) -> Result<(), NotifyError> {
    let message = self.build_message(alert)?;

    // relay 使用隐式 TLS 连接
    let mailer = SmtpTransport::relay(&self.config.smtp_server)
      .map_err(|e| NotifyError::Smtp(e.to_string()))?
      .port(self.config.smtp_port)
      .credentials(Credentials::new(
        self.config.sender.clone(),
        self.config.password.clone(),
      ))
      .timeout(Some(TIMEOUT))
      .build();

    mailer
      .send(&message)
      .map_err(|e| NotifyError::Smtp(e.to_string()))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  fn config(sender: &str) -> EmailConfig {
    EmailConfig {
      sender: sender.to_string(),
      password: "secret".to_string(),
      receiver: "guard@example.com".to_string(),
      smtp_server: "127.0.0.1".to_string(),
      smtp_port: 9,
    }
  }

  #[test]
  fn message_lists_flagged_files() {
    let transport = EmailTransport::new(config("cam@example.com"));
    let paths = [Path::new("videos/a.mp4"), Path::new("videos/b.mp4")];
    let message = transport.build_message(&Alert::new(&paths)).unwrap();

    let raw = String::from_utf8(message.formatted()).unwrap();
    assert!(raw.contains("Subject: Human detected"));
    assert!(raw.contains("To: guard@example.com"));
    assert!(raw.contains("videos/a.mp4\r\nvideos/b.mp4") || raw.contains("videos/a.mp4\nvideos/b.mp4"));
  }

  #[test]
  fn invalid_sender_is_rejected() {
    let transport = EmailTransport::new(config("not an address"));
    let paths = [Path::new("a.mp4")];
    let err = transport.build_message(&Alert::new(&paths)).unwrap_err();
    assert!(matches!(err, NotifyError::Address(_)));
  }

  #[test]
  fn unreachable_server_is_an_error() {
    let transport = EmailTransport::new(config("cam@example.com"));
    let paths = [Path::new("a.mp4")];
    assert!(transport.send(&Alert::new(&paths)).is_err());
  }
}
