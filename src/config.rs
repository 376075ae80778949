// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/config.rs - 运行配置
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

//! 构造后不可变的配置。加载方式（命令行、环境变量）在二进制中完成，
//! 这里只负责默认值与校验。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("{name} 必须大于 0")]
  NotPositive { name: &'static str },
  #[error("{name} 必须为有限的非负数, 实际为 {value}")]
  InvalidGain { name: &'static str, value: f32 },
  #[error("JPEG 质量必须位于 0..=100, 实际为 {0}")]
  JpegQuality(u8),
  #[error("pan 与 tilt 不能使用同一个舵机通道 {0}")]
  SharedChannel(u8),
  #[error("{name} 必须为有限的非负秒数, 实际为 {value}")]
  InvalidDuration { name: &'static str, value: f64 },
  #[error("{name} 超出可表示的范围")]
  OutOfRange { name: &'static str },
}

/// 将以秒为单位的浮点参数转换为 `Duration`
///
/// 负数、NaN 以及超出 `Duration` 范围的值都视为配置错误。
pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
  Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

/// 将以分钟为单位的整数参数转换为 `Duration`
pub fn minutes(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
  value
    .checked_mul(60)
    .map(Duration::from_secs)
    .ok_or(ConfigError::OutOfRange { name })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
  pub pan_channel: u8,
  pub tilt_channel: u8,
  pub kp_pan: f32,
  pub kp_tilt: f32,
  /// 像素
  pub deadband: f32,
}

impl Default for MotionConfig {
  fn default() -> Self {
    Self {
      pan_channel: 0,
      tilt_channel: 1,
      kp_pan: 0.02,
      kp_tilt: 0.02,
      deadband: 10.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
  pub steps_pan: usize,
  pub steps_tilt: usize,
  pub pan_range: (f32, f32),
  pub tilt_range: (f32, f32),
  pub settle_pan: Duration,
  pub settle_tilt: Duration,
}

impl Default for ScanConfig {
  fn default() -> Self {
    Self {
      steps_pan: 9,
      steps_tilt: 5,
      pan_range: (0.0, 180.0),
      // 避开地板与天花板
      tilt_range: (30.0, 150.0),
      settle_pan: Duration::from_millis(200),
      settle_tilt: Duration::from_millis(300),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
  pub duration: Duration,
  pub fps: f32,
}

impl TrackingConfig {
  /// 每帧的时间预算，极小的帧率饱和为 `Duration::MAX`
  pub fn frame_budget(&self) -> Duration {
    Duration::try_from_secs_f64(1.0 / self.fps as f64).unwrap_or(Duration::MAX)
  }
}

impl Default for TrackingConfig {
  fn default() -> Self {
    Self {
      duration: Duration::from_secs(8),
      fps: 10.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
  pub save_dir: PathBuf,
  pub count: usize,
  pub long_edge: u32,
  pub jpeg_quality: u8,
  pub interval: Duration,
}

impl Default for CaptureConfig {
  fn default() -> Self {
    Self {
      save_dir: PathBuf::from("./captured_images"),
      count: 3,
      long_edge: 800,
      jpeg_quality: 70,
      interval: Duration::from_millis(500),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
  pub channel: String,
  pub title: String,
}

impl Default for NotifyConfig {
  fn default() -> Self {
    Self {
      channel: "#pet-monitoring".to_string(),
      title: "Pet Monitoring Alert".to_string(),
    }
  }
}

/// 单次扫描-跟踪-拍照会话所需的全部参数
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionConfig {
  pub scan: ScanConfig,
  pub tracking: TrackingConfig,
  pub capture: CaptureConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
  pub motion: MotionConfig,
  pub session: SessionConfig,
  pub notify: NotifyConfig,
  pub schedule_interval: Duration,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      motion: MotionConfig::default(),
      session: SessionConfig::default(),
      notify: NotifyConfig::default(),
      schedule_interval: Duration::from_secs(10 * 60),
    }
  }
}

impl MonitorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let motion = &self.motion;
    if motion.pan_channel == motion.tilt_channel {
      return Err(ConfigError::SharedChannel(motion.pan_channel));
    }
    for (name, value) in [
      ("kp_pan", motion.kp_pan),
      ("kp_tilt", motion.kp_tilt),
      ("deadband", motion.deadband),
    ] {
      if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidGain { name, value });
      }
    }

    let session = &self.session;
    if session.scan.steps_pan == 0 {
      return Err(ConfigError::NotPositive { name: "scan_steps_pan" });
    }
    if session.scan.steps_tilt == 0 {
      return Err(ConfigError::NotPositive { name: "scan_steps_tilt" });
    }
    if !(session.tracking.fps.is_finite() && session.tracking.fps > 0.0) {
      return Err(ConfigError::NotPositive { name: "tracking_fps" });
    }
    if Duration::try_from_secs_f64(1.0 / session.tracking.fps as f64).is_err() {
      return Err(ConfigError::OutOfRange { name: "tracking_fps" });
    }
    if session.capture.long_edge == 0 {
      return Err(ConfigError::NotPositive { name: "long_edge" });
    }
    if session.capture.jpeg_quality > 100 {
      return Err(ConfigError::JpegQuality(session.capture.jpeg_quality));
    }
    if self.schedule_interval.is_zero() {
      return Err(ConfigError::NotPositive { name: "schedule_interval" });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = MonitorConfig::default();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.session.tracking.frame_budget(), Duration::from_millis(100));
  }

  #[test]
  fn rejects_zero_scan_steps() {
    let mut config = MonitorConfig::default();
    config.session.scan.steps_tilt = 0;
    assert_eq!(
      config.validate(),
      Err(ConfigError::NotPositive { name: "scan_steps_tilt" })
    );
  }

  #[test]
  fn rejects_bad_gain_and_quality() {
    let mut config = MonitorConfig::default();
    config.motion.kp_pan = f32::NAN;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidGain { name: "kp_pan", .. })
    ));

    let mut config = MonitorConfig::default();
    config.session.capture.jpeg_quality = 101;
    assert_eq!(config.validate(), Err(ConfigError::JpegQuality(101)));
  }

  #[test]
  fn rejects_shared_channel() {
    let mut config = MonitorConfig::default();
    config.motion.tilt_channel = config.motion.pan_channel;
    assert_eq!(config.validate(), Err(ConfigError::SharedChannel(0)));
  }

  #[test]
  fn rejects_fps_whose_frame_budget_overflows() {
    let mut config = MonitorConfig::default();
    config.session.tracking.fps = 1e-20;
    assert_eq!(
      config.validate(),
      Err(ConfigError::OutOfRange { name: "tracking_fps" })
    );
    assert_eq!(config.session.tracking.frame_budget(), Duration::MAX);
  }

  #[test]
  fn seconds_rejects_negative_and_nan() {
    assert_eq!(seconds("capture_interval", 0.5), Ok(Duration::from_millis(500)));
    assert_eq!(seconds("capture_interval", 0.0), Ok(Duration::ZERO));
    assert_eq!(
      seconds("tracking_duration", -1.0),
      Err(ConfigError::InvalidDuration {
        name: "tracking_duration",
        value: -1.0
      })
    );
    assert!(matches!(
      seconds("tracking_duration", f64::NAN),
      Err(ConfigError::InvalidDuration { name: "tracking_duration", .. })
    ));
    assert!(seconds("tracking_duration", f64::INFINITY).is_err());
  }

  #[test]
  fn minutes_rejects_overflow() {
    assert_eq!(minutes("schedule_interval", 10), Ok(Duration::from_secs(600)));
    assert_eq!(
      minutes("schedule_interval", u64::MAX),
      Err(ConfigError::OutOfRange { name: "schedule_interval" })
    );
  }
}
