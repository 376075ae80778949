// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/servo/pca9685.rs - PCA9685 PWM 舵机驱动板
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

//! 通过 Linux `/dev/i2c-N` 字符设备直接写 PCA9685 寄存器。
//!
//! 地址形如 `pca9685:///dev/i2c-1?address=64`，`address` 支持十进制或 `0x` 十六进制，
//! 省略时为 `0x40`。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  servo::{ServoDriver, ServoError},
};

const I2C_SLAVE: u64 = 0x0703;
const DEFAULT_DEVICE: &str = "/dev/i2c-1";
const DEFAULT_ADDRESS: u16 = 0x40;

const REG_MODE1: u8 = 0x00;
const REG_PRESCALE: u8 = 0xFE;
const REG_LED0_ON_L: u8 = 0x06;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AUTO_INCREMENT: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;

const OSCILLATOR_HZ: f32 = 25_000_000.0;
const PWM_FREQUENCY_HZ: f32 = 50.0;
const PWM_RESOLUTION: f32 = 4096.0;
const CHANNELS: u8 = 16;

// 与常见 180° 舵机的默认脉宽一致
const MIN_PULSE_US: f32 = 750.0;
const MAX_PULSE_US: f32 = 2250.0;
const ACTUATION_RANGE: f32 = 180.0;

pub struct Pca9685 {
  device: File,
}

impl FromUrlWithScheme for Pca9685 {
  const SCHEME: &'static str = "pca9685";
}

impl FromUrl for Pca9685 {
  type Error = ServoError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ServoError::SchemeMismatch);
    }

    let path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE
    } else {
      url.path()
    };

    let address = match url.query_pairs().find(|(k, _)| k == "address") {
      Some((_, v)) => parse_address(&v)?,
      None => DEFAULT_ADDRESS,
    };

    Pca9685::open(path, address)
  }
}

impl Pca9685 {
  pub fn open(path: &str, address: u16) -> Result<Self, ServoError> {
    info!("打开 PCA9685: {} (地址 0x{:02X})", path, address);
    let device = OpenOptions::new().read(true).write(true).open(path)?;

    // SAFETY: fd 在 device 存活期间有效，I2C_SLAVE 只接收一个整数参数
    let ret = unsafe { libc::ioctl(device.as_raw_fd(), I2C_SLAVE as _, address as libc::c_ulong) };
    if ret < 0 {
      return Err(std::io::Error::last_os_error().into());
    }

    let mut driver = Pca9685 { device };
    driver.init()?;
    Ok(driver)
  }

  fn init(&mut self) -> Result<(), ServoError> {
    let prescale = (OSCILLATOR_HZ / (PWM_RESOLUTION * PWM_FREQUENCY_HZ)).round() as u8 - 1;
    debug!("PCA9685 预分频: {}", prescale);

    self.write_register(REG_MODE1, 0x00)?;
    self.write_register(REG_MODE1, MODE1_SLEEP)?;
    self.write_register(REG_PRESCALE, prescale)?;
    self.write_register(REG_MODE1, MODE1_AUTO_INCREMENT)?;
    std::thread::sleep(Duration::from_millis(5));
    self.write_register(REG_MODE1, MODE1_RESTART | MODE1_AUTO_INCREMENT)?;
    Ok(())
  }

  fn write_register(&mut self, register: u8, value: u8) -> Result<(), ServoError> {
    self.device.write_all(&[register, value])?;
    Ok(())
  }

  fn write_pwm(&mut self, channel: u8, off: u16) -> Result<(), ServoError> {
    let register = REG_LED0_ON_L + 4 * channel;
    let [off_l, off_h] = off.to_le_bytes();
    self.device.write_all(&[register, 0x00, 0x00, off_l, off_h])?;
    Ok(())
  }
}

impl ServoDriver for Pca9685 {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
    if channel >= CHANNELS {
      return Err(ServoError::InvalidChannel(channel));
    }
    let ticks = angle_to_ticks(degrees);
    debug!("PCA9685 通道 {} -> {:.1}° ({} ticks)", channel, degrees, ticks);
    self.write_pwm(channel, ticks)
  }
}

fn angle_to_ticks(degrees: f32) -> u16 {
  let degrees = degrees.clamp(0.0, ACTUATION_RANGE);
  let pulse_us = MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * degrees / ACTUATION_RANGE;
  let period_us = 1_000_000.0 / PWM_FREQUENCY_HZ;
  (pulse_us / period_us * PWM_RESOLUTION).round() as u16
}

fn parse_address(value: &str) -> Result<u16, ServoError> {
  let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
    Some(hex) => u16::from_str_radix(hex, 16),
    None => value.parse(),
  };
  parsed.map_err(|_| ServoError::InvalidAddress(value.to_string()))
}
