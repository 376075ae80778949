// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/servo/dummy.rs - 仅记录日志的舵机
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

use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  servo::{ServoDriver, ServoError},
};

/// 不驱动任何硬件，只记录最后写入的角度，用于无云台环境的试运行
#[derive(Debug, Default, Clone)]
pub struct DummyServo {
  angles: [Option<f32>; 16],
}

impl DummyServo {
  pub fn angle(&self, channel: u8) -> Option<f32> {
    self.angles.get(channel as usize).copied().flatten()
  }
}

impl FromUrlWithScheme for DummyServo {
  const SCHEME: &'static str = "dummy";
}

impl FromUrl for DummyServo {
  type Error = ServoError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ServoError::SchemeMismatch);
    }
    Ok(DummyServo::default())
  }
}

impl ServoDriver for DummyServo {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
    let slot = self
      .angles
      .get_mut(channel as usize)
      .ok_or(ServoError::InvalidChannel(channel))?;
    *slot = Some(degrees);
    debug!("舵机通道 {} -> {:.1}°", channel, degrees);
    Ok(())
  }
}
