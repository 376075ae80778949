// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/notify/slack.rs - Slack Web API 通知
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

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use tracing::{debug, info};

use crate::notify::{Notifier, NotifyError, check_files};

const SLACK_API_BASE: &str = "https://slack.com/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 所有 Web API 响应共有的状态字段
#[derive(Debug, Deserialize)]
struct ApiStatus {
  ok: bool,
  #[serde(default)]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTest {
  user: String,
  team: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrl {
  upload_url: String,
  file_id: String,
}

/// 先检查 `ok`，再按具体类型解析
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, NotifyError> {
  let status: ApiStatus = serde_json::from_str(body)?;
  if !status.ok {
    return Err(NotifyError::Api(
      status.error.unwrap_or_else(|| "unknown_error".to_string()),
    ));
  }
  Ok(serde_json::from_str(body)?)
}

fn read_body(result: Result<ureq::Response, ureq::Error>) -> Result<String, NotifyError> {
  match result {
    Ok(response) => Ok(response.into_string()?),
    Err(ureq::Error::Status(code, response)) => Err(NotifyError::Http(format!(
      "HTTP {} {}",
      code,
      response.status_text()
    ))),
    Err(e) => Err(NotifyError::Http(e.to_string())),
  }
}

/// 使用 Bot Token 调用 Slack Web API
///
/// 文件上传走 `files.getUploadURLExternal` -> 上传原始字节 -> `files.completeUploadExternal`
/// 三步流程，一批文件在频道中合并为一条消息。
pub struct SlackNotifier {
  agent: ureq::Agent,
  token: String,
  api_base: String,
}

impl SlackNotifier {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
      token: token.into(),
      api_base: SLACK_API_BASE.to_string(),
    }
  }

  pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
    self.api_base = api_base.into();
    self
  }

  fn endpoint(&self, method: &str) -> String {
    format!("{}/{}", self.api_base.trim_end_matches('/'), method)
  }

  fn authorization(&self) -> String {
    format!("Bearer {}", self.token)
  }

  fn post_form<T: DeserializeOwned>(
    &self,
    method: &str,
    form: &[(&str, &str)],
  ) -> Result<T, NotifyError> {
    debug!("调用 Slack 接口 {}", method);
    let result = self
      .agent
      .post(&self.endpoint(method))
      .set("Authorization", &self.authorization())
      .send_form(form);
    parse_response(&read_body(result)?)
  }

  fn post_json<T: DeserializeOwned>(
    &self,
    method: &str,
    body: &serde_json::Value,
  ) -> Result<T, NotifyError> {
    debug!("调用 Slack 接口 {}", method);
    let result = self
      .agent
      .post(&self.endpoint(method))
      .set("Authorization", &self.authorization())
      .set("Content-Type", "application/json; charset=utf-8")
      .send_string(&body.to_string());
    parse_response(&read_body(result)?)
  }

  /// 申请上传地址并推送文件内容，返回文件 ID
  fn upload_one(&self, path: &Path) -> Result<String, NotifyError> {
    let bytes = std::fs::read(path)?;
    let filename = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    let length = bytes.len().to_string();

    let target: UploadUrl = self.post_form(
      "files.getUploadURLExternal",
      &[("filename", filename.as_str()), ("length", length.as_str())],
    )?;

    let result = self
      .agent
      .post(&target.upload_url)
      .set("Authorization", &self.authorization())
      .set("Content-Type", "application/octet-stream")
      .send_bytes(&bytes);
    read_body(result)?;

    debug!("已上传 {} ({} 字节)", filename, bytes.len());
    Ok(target.file_id)
  }
}

impl Notifier for SlackNotifier {
  fn upload_files(
    &self,
    paths: &[PathBuf],
    channel: &str,
    caption: &str,
    title: &str,
  ) -> Result<(), NotifyError> {
    check_files(paths)?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
      let id = self.upload_one(path)?;
      files.push(json!({ "id": id, "title": title }));
    }

    let _: IgnoredAny = self.post_json(
      "files.completeUploadExternal",
      &json!({
        "files": files,
        "channel_id": channel,
        "initial_comment": caption,
      }),
    )?;

    info!("已上传 {} 个文件到 {}", paths.len(), channel);
    Ok(())
  }

  fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
    let _: IgnoredAny = self.post_json(
      "chat.postMessage",
      &json!({ "channel": channel, "text": text }),
    )?;
    info!("消息已发送到 {}", channel);
    Ok(())
  }

  fn test_connection(&self) -> Result<(), NotifyError> {
    let auth: AuthTest = self.post_form("auth.test", &[])?;
    info!("已连接 Slack: {} @ {}", auth.user, auth.team);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_successful_auth_test() {
    let auth: AuthTest =
      parse_response(r#"{"ok":true,"url":"https://x.slack.com/","team":"Home","user":"maoqiu"}"#)
        .unwrap();
    assert_eq!(auth.user, "maoqiu");
    assert_eq!(auth.team, "Home");
  }

  #[test]
  fn api_error_code_is_surfaced() {
    let result: Result<IgnoredAny, _> =
      parse_response(r#"{"ok":false,"error":"invalid_auth"}"#);
    match result {
      Err(NotifyError::Api(code)) => assert_eq!(code, "invalid_auth"),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn malformed_body_is_invalid_response() {
    let result: Result<UploadUrl, _> = parse_response("<html>");
    assert!(matches!(result, Err(NotifyError::InvalidResponse(_))));

    let result: Result<UploadUrl, _> = parse_response(r#"{"ok":true}"#);
    assert!(matches!(result, Err(NotifyError::InvalidResponse(_))));
  }

  #[test]
  fn upload_checks_files_before_any_request() {
    // 不可达的地址：若发出请求会得到 Http 错误而不是本地检查错误
    let notifier = SlackNotifier::new("xoxb-test").with_api_base("http://127.0.0.1:1");
    assert!(matches!(
      notifier.upload_files(&[], "#pet-monitoring", "caption", "title"),
      Err(NotifyError::NoFiles)
    ));
    assert!(matches!(
      notifier.upload_files(
        &[PathBuf::from("/nonexistent/pet.jpg")],
        "#pet-monitoring",
        "caption",
        "title"
      ),
      Err(NotifyError::FileNotFound(_))
    ));
  }

  #[test]
  fn endpoint_joins_base_and_method() {
    let notifier = SlackNotifier::new("t").with_api_base("http://localhost/api/");
    assert_eq!(notifier.endpoint("auth.test"), "http://localhost/api/auth.test");
  }
}
