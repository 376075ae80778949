// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/motion.rs - 云台运动控制
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

use crate::config::MotionConfig;
use crate::servo::{ServoDriver, ServoError};

pub const MIN_ANGLE: f32 = 0.0;
pub const MAX_ANGLE: f32 = 180.0;
pub const CENTER_ANGLE: f32 = 90.0;

/// 云台角度，两个分量始终位于 [0, 180]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularPosition {
  pub pan: f32,
  pub tilt: f32,
}

impl AngularPosition {
  pub const CENTER: AngularPosition = AngularPosition {
    pan: CENTER_ANGLE,
    tilt: CENTER_ANGLE,
  };
}

impl Default for AngularPosition {
  fn default() -> Self {
    Self::CENTER
  }
}

/// 将角度限制到 [0, 180]；NaN 保持原值
fn clamp_angle(requested: f32, current: f32) -> f32 {
  if requested.is_nan() {
    current
  } else {
    requested.clamp(MIN_ANGLE, MAX_ANGLE)
  }
}

/// 比例控制云台
pub struct MotionController<S> {
  servo: S,
  pan_channel: u8,
  tilt_channel: u8,
  kp_pan: f32,
  kp_tilt: f32,
  deadband: f32,
  position: AngularPosition,
}

impl<S: ServoDriver> MotionController<S> {
  /// 创建控制器。不会写舵机，首次 `center()` 之前记录的角度为中位。
  pub fn new(servo: S, config: &MotionConfig) -> Self {
    Self {
      servo,
      pan_channel: config.pan_channel,
      tilt_channel: config.tilt_channel,
      kp_pan: config.kp_pan,
      kp_tilt: config.kp_tilt,
      deadband: config.deadband,
      position: AngularPosition::CENTER,
    }
  }

  pub fn position(&self) -> AngularPosition {
    self.position
  }

  pub fn servo(&self) -> &S {
    &self.servo
  }

  pub fn move_to(&mut self, pan: f32, tilt: f32) -> Result<(), ServoError> {
    let pan = clamp_angle(pan, self.position.pan);
    let tilt = clamp_angle(tilt, self.position.tilt);
    self.servo.set_angle(self.pan_channel, pan)?;
    self.position.pan = pan;
    self.servo.set_angle(self.tilt_channel, tilt)?;
    self.position.tilt = tilt;
    Ok(())
  }

  pub fn move_pan(&mut self, pan: f32) -> Result<(), ServoError> {
    let pan = clamp_angle(pan, self.position.pan);
    self.servo.set_angle(self.pan_channel, pan)?;
    self.position.pan = pan;
    Ok(())
  }

  pub fn move_tilt(&mut self, tilt: f32) -> Result<(), ServoError> {
    let tilt = clamp_angle(tilt, self.position.tilt);
    self.servo.set_angle(self.tilt_channel, tilt)?;
    self.position.tilt = tilt;
    Ok(())
  }

  pub fn center(&mut self) -> Result<(), ServoError> {
    self.move_to(CENTER_ANGLE, CENTER_ANGLE)
  }

  /// 一次比例控制更新
  ///
  /// 误差为目标中心减去画面中心（像素）。误差绝对值不超过死区的轴保持不动；
  /// 水平方向取反以匹配摄像头左右与舵机转向的约定。
  pub fn step(&mut self, error_x: f32, error_y: f32) -> Result<(), ServoError> {
    if error_x.abs() > self.deadband {
      let delta = -self.kp_pan * error_x;
      self.move_pan(self.position.pan + delta)?;
      debug!("pan 误差 {:.1}px, 调整 {:+.2}° -> {:.2}°", error_x, delta, self.position.pan);
    }

    if error_y.abs() > self.deadband {
      let delta = self.kp_tilt * error_y;
      self.move_tilt(self.position.tilt + delta)?;
      debug!("tilt 误差 {:.1}px, 调整 {:+.2}° -> {:.2}°", error_y, delta, self.position.tilt);
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct RecordingServo {
    writes: Vec<(u8, f32)>,
  }

  impl ServoDriver for RecordingServo {
    fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
      self.writes.push((channel, degrees));
      Ok(())
    }
  }

  fn controller() -> MotionController<RecordingServo> {
    let config = MotionConfig {
      pan_channel: 0,
      tilt_channel: 1,
      kp_pan: 0.02,
      kp_tilt: 0.02,
      deadband: 10.0,
    };
    MotionController::new(RecordingServo::default(), &config)
  }

  #[test]
  fn move_to_clamps_any_magnitude() {
    let mut motion = controller();
    for (pan, tilt) in [(-1e9, 1e9), (250.0, -3.0), (f32::MAX, f32::MIN), (45.5, 120.25)] {
      motion.move_to(pan, tilt).unwrap();
      let p = motion.position();
      assert!((MIN_ANGLE..=MAX_ANGLE).contains(&p.pan));
      assert!((MIN_ANGLE..=MAX_ANGLE).contains(&p.tilt));
    }
    assert_eq!(motion.position(), AngularPosition { pan: 45.5, tilt: 120.25 });
    for (_, degrees) in &motion.servo().writes {
      assert!((MIN_ANGLE..=MAX_ANGLE).contains(degrees));
    }
  }

  #[test]
  fn nan_request_keeps_axis() {
    let mut motion = controller();
    motion.move_to(30.0, 60.0).unwrap();
    motion.move_to(f32::NAN, 100.0).unwrap();
    assert_eq!(motion.position(), AngularPosition { pan: 30.0, tilt: 100.0 });
  }

  #[test]
  fn center_writes_both_channels() {
    let mut motion = controller();
    motion.move_to(10.0, 170.0).unwrap();
    motion.center().unwrap();
    assert_eq!(motion.position(), AngularPosition::CENTER);
    assert_eq!(&motion.servo().writes[2..], &[(0, 90.0), (1, 90.0)]);
  }

  #[test]
  fn error_within_deadband_is_ignored() {
    let mut motion = controller();
    motion.center().unwrap();
    let before = motion.position();
    let writes = motion.servo().writes.len();

    for (ex, ey) in [(0.0, 0.0), (10.0, -10.0), (-9.9, 4.0), (3.0, 10.0)] {
      motion.step(ex, ey).unwrap();
    }

    assert_eq!(motion.position(), before);
    assert_eq!(motion.servo().writes.len(), writes);
  }

  #[test]
  fn only_the_axis_outside_deadband_moves() {
    let mut motion = controller();
    motion.center().unwrap();
    motion.step(100.0, 5.0).unwrap();
    let p = motion.position();
    assert!((p.pan - 88.0).abs() < 1e-4);
    assert_eq!(p.tilt, 90.0);
    assert_eq!(motion.servo().writes.last(), Some(&(0, p.pan)));
  }

  #[test]
  fn positive_error_drives_pan_down_and_tilt_up_until_clamped() {
    let mut motion = controller();
    motion.center().unwrap();

    let mut last = motion.position();
    for _ in 0..200 {
      motion.step(100.0, 100.0).unwrap();
      let p = motion.position();
      assert!(p.pan <= last.pan);
      assert!(p.tilt >= last.tilt);
      last = p;
    }
    assert_eq!(last, AngularPosition { pan: 0.0, tilt: 180.0 });

    motion.step(100.0, 100.0).unwrap();
    assert_eq!(motion.position(), last);
  }

  #[test]
  fn negative_error_drives_pan_up_and_tilt_down() {
    let mut motion = controller();
    motion.center().unwrap();
    for _ in 0..200 {
      motion.step(-50.0, -50.0).unwrap();
    }
    assert_eq!(motion.position(), AngularPosition { pan: 180.0, tilt: 0.0 });
  }
}
