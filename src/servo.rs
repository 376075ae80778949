// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/servo.rs - 舵机驱动
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

use thiserror::Error;
use url::Url;

use crate::FromUrl;

/// 舵机通道写入能力，角度单位为度，范围 [0, 180]
pub trait ServoDriver {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError>;
}

impl<T: ServoDriver + ?Sized> ServoDriver for Box<T> {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
    (**self).set_angle(channel, degrees)
  }
}

mod dummy;
pub use self::dummy::DummyServo;

#[cfg(target_os = "linux")]
mod pca9685;
#[cfg(target_os = "linux")]
pub use self::pca9685::Pca9685;

#[derive(Error, Debug)]
pub enum ServoError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的舵机通道: {0}")]
  InvalidChannel(u8),
  #[error("无效的舵机地址: {0}")]
  InvalidAddress(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum ServoWrapper {
  Dummy(DummyServo),
  #[cfg(target_os = "linux")]
  Pca9685(Pca9685),
}

impl FromUrl for ServoWrapper {
  type Error = ServoError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      DummyServo::SCHEME => Ok(ServoWrapper::Dummy(DummyServo::from_url(url)?)),
      #[cfg(target_os = "linux")]
      Pca9685::SCHEME => Ok(ServoWrapper::Pca9685(Pca9685::from_url(url)?)),
      _ => Err(ServoError::SchemeMismatch),
    }
  }
}

impl ServoDriver for ServoWrapper {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
    match self {
      ServoWrapper::Dummy(servo) => servo.set_angle(channel, degrees),
      #[cfg(target_os = "linux")]
      ServoWrapper::Pca9685(servo) => servo.set_angle(channel, degrees),
    }
  }
}
