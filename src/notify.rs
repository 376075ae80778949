// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/notify.rs - 通知
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

use thiserror::Error;

/// 抓拍结果的投递渠道
pub trait Notifier {
  /// 将一批文件作为一条消息上传
  fn upload_files(
    &self,
    paths: &[PathBuf],
    channel: &str,
    caption: &str,
    title: &str,
  ) -> Result<(), NotifyError>;

  fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifyError>;

  /// 校验凭据与网络连通性
  fn test_connection(&self) -> Result<(), NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
  fn upload_files(
    &self,
    paths: &[PathBuf],
    channel: &str,
    caption: &str,
    title: &str,
  ) -> Result<(), NotifyError> {
    (**self).upload_files(paths, channel, caption, title)
  }

  fn send_message(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
    (**self).send_message(channel, text)
  }

  fn test_connection(&self) -> Result<(), NotifyError> {
    (**self).test_connection()
  }
}

mod slack;
pub use self::slack::SlackNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
  #[error("没有需要上传的文件")]
  NoFiles,
  #[error("文件不存在: {0}")]
  FileNotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("HTTP 请求失败: {0}")]
  Http(String),
  #[error("接口返回错误: {0}")]
  Api(String),
  #[error("无法解析接口响应: {0}")]
  InvalidResponse(#[from] serde_json::Error),
}

/// 上传前的本地检查：列表非空且每个文件都存在
pub fn check_files(paths: &[PathBuf]) -> Result<(), NotifyError> {
  if paths.is_empty() {
    return Err(NotifyError::NoFiles);
  }
  if let Some(missing) = paths.iter().find(|p| !Path::new(p).is_file()) {
    return Err(NotifyError::FileNotFound(missing.clone()));
  }
  Ok(())
}
