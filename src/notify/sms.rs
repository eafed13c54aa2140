// 该文件是 Kanmen （看门） 项目的一部分。
// src/notify/sms.rs - Twilio 短信通知
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

use url::Url;

use super::{Alert, NotifyError, Transport};
use crate::config::TwilioConfig;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct TwilioTransport {
  config: TwilioConfig,
  api_base: String,
}

impl TwilioTransport {
  pub fn new(config: TwilioConfig) -> Self {
    Self {
      config,
      api_base: TWILIO_API_BASE.to_string(),
    }
  }

  pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
    self.api_base = api_base.into();
    self
  }

  /// 账户 SID 与令牌放在 userinfo 中，由 HTTP 客户端转成 Basic 认证
  pub fn messages_url(&self) -> Result<Url, NotifyError> {
    let mut url = Url::parse(&self.api_base)
      .and_then(|base| {
        base.join(&format!(
          "2010-04-01/Accounts/{}/Messages.json",
          self.config.account_sid
        ))
      })
      .map_err(|e| NotifyError::Sms(format!("无效的接口地址: {}", e)))?;
    url
      .set_username(&self.config.account_sid)
      .and_then(|_| url.set_password(Some(&self.config.auth_token)))
      .map_err(|_| NotifyError::Sms("接口地址不支持认证信息".to_string()))?;
    Ok(url)
  }
}

impl Transport for TwilioTransport {
  fn name(&self) -> &'static str {
    "sms"
  }

  fn send(&self, alert: &Alert<'_>) -> Result<(), NotifyError> {
    let url = self.messages_url()?;
    ureq::post(url.as_str())
      .timeout(TIMEOUT)
      .send_form(&[
        ("To", self.config.to.as_str()),
        ("From", self.config.from.as_str()),
        ("Body", alert.terse_text()),
      ])
      .map_err(|e| match e {
        ureq::Error::Status(code, _) => NotifyError::Sms(format!("接口返回状态码 {}", code)),
        other => NotifyError::Sms(other.to_string()),
      })?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn transport() -> TwilioTransport {
    TwilioTransport::new(TwilioConfig {
      auth_token: "token".to_string(),
      account_sid: "AC123".to_string(),
      from: "+15550001".to_string(),
      to: "+15550002".to_string(),
    })
  }

  #[test]
  fn messages_endpoint_carries_credentials() {
    let url = transport().messages_url().unwrap();
    assert_eq!(url.host_str(), Some("api.twilio.com"));
    assert_eq!(url.path(), "/2010-04-01/Accounts/AC123/Messages.json");
    assert_eq!(url.username(), "AC123");
    assert_eq!(url.password(), Some("token"));
  }

  #[test]
  fn unreachable_endpoint_is_an_error() {
    let transport = transport().with_api_base("http://127.0.0.1:9");
    let paths = [std::path::Path::new("a.mp4")];
    let err = transport.send(&Alert::new(&paths)).unwrap_err();
    assert!(matches!(err, NotifyError::Sms(_)));
  }
}
