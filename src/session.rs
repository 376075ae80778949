// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/session.rs - 扫描、跟踪与抓拍会话
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

//! 一次会话分两段：`scan_and_track` 在网格上寻找宠物并跟踪一段时间，
//! `capture_images` 拍下若干张照片。两段各自占用一次摄像头，结束时必定释放。

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  clock::{Clock, StopFlag},
  config::{ScanConfig, SessionConfig, TrackingConfig},
  frame::{Frame, frame_center},
  input::{Camera, CameraError, CameraGuard},
  model::{DetectResult, Detection, Model},
  motion::{AngularPosition, MotionController},
  output::{JpegDirectoryOutput, OutputError},
  servo::{ServoDriver, ServoError},
};

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("摄像头错误: {0}")]
  Camera(#[from] CameraError),
  #[error("舵机错误: {0}")]
  Servo(#[from] ServoError),
  #[error("检测器错误: {0}")]
  Detector(Box<dyn std::error::Error + Send + Sync>),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
  #[error("会话被中断")]
  Cancelled,
}

/// 停止标志置位时中止当前阶段
fn check_stop(stop: Option<&StopFlag>) -> Result<(), SessionError> {
  if stop.is_some_and(StopFlag::is_raised) {
    warn!("收到停止请求, 中止会话");
    return Err(SessionError::Cancelled);
  }
  Ok(())
}

/// 扫描命中的网格位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanHit {
  pub tilt_index: usize,
  pub pan_index: usize,
  pub position: AngularPosition,
  pub detection: Detection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
  Detected(ScanHit),
  Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingReport {
  /// 成功读到的帧数
  pub ticks: usize,
  /// 其中检测到宠物并执行了一次控制更新的帧数
  pub corrections: usize,
  /// 因读帧失败而提前结束
  pub ended_early: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOutcome {
  pub scan: ScanOutcome,
  pub tracking: Option<TrackingReport>,
}

impl SessionOutcome {
  pub fn detected(&self) -> bool {
    matches!(self.scan, ScanOutcome::Detected(_))
  }

  pub fn tracking_attempted(&self) -> bool {
    self.tracking.is_some()
  }
}

/// 闭区间上的等分点，`steps == 1` 时只取起点
pub fn linspace(start: f32, end: f32, steps: usize) -> Vec<f32> {
  match steps {
    0 => Vec::new(),
    1 => vec![start],
    n => {
      let step = (end - start) / (n - 1) as f32;
      (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f32 })
        .collect()
    }
  }
}

pub struct Session<'a, C: ?Sized, M: ?Sized, S, K> {
  config: &'a SessionConfig,
  camera: &'a mut C,
  model: &'a M,
  motion: &'a mut MotionController<S>,
  clock: &'a K,
  stop: Option<&'a StopFlag>,
}

impl<'a, C, M, S, K> Session<'a, C, M, S, K>
where
  C: Camera + ?Sized,
  M: Model<Input = Frame, Output = DetectResult> + ?Sized,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: ServoDriver,
  K: Clock,
{
  pub fn new(
    config: &'a SessionConfig,
    camera: &'a mut C,
    model: &'a M,
    motion: &'a mut MotionController<S>,
    clock: &'a K,
  ) -> Self {
    Self {
      config,
      camera,
      model,
      motion,
      clock,
      stop: None,
    }
  }

  /// 每次等待之后与每帧开始前检查该标志，置位时返回 `SessionError::Cancelled`
  pub fn with_stop(mut self, stop: &'a StopFlag) -> Self {
    self.stop = Some(stop);
    self
  }

  /// 扫描网格，命中后进入跟踪阶段
  pub fn scan_and_track(&mut self) -> Result<SessionOutcome, SessionError> {
    let mut camera = CameraGuard::acquire(&mut *self.camera)?;

    let scan = scan(
      &self.config.scan,
      &mut *camera,
      self.model,
      self.motion,
      self.clock,
      self.stop,
    )?;
    let tracking = match scan {
      ScanOutcome::Detected(_) => Some(track(
        &self.config.tracking,
        &mut *camera,
        self.model,
        self.motion,
        self.clock,
        self.stop,
      )?),
      ScanOutcome::Exhausted => None,
    };

    Ok(SessionOutcome { scan, tracking })
  }

  /// 按间隔拍摄若干张照片，返回成功写入的路径（按拍摄顺序）
  ///
  /// 读帧失败的那一张直接跳过，不重试，因此结果可能为空。
  pub fn capture_images(&mut self) -> Result<Vec<PathBuf>, SessionError> {
    let capture = &self.config.capture;
    let output = JpegDirectoryOutput::from_config(capture);
    let mut camera = CameraGuard::acquire(&mut *self.camera)?;

    let mut paths = Vec::with_capacity(capture.count);
    for index in 1..=capture.count {
      if index > 1 {
        self.clock.sleep(capture.interval);
      }
      check_stop(self.stop)?;
      match camera.read_frame() {
        Some(frame) => paths.push(output.write(&frame, index)?.path),
        None => warn!("第 {} 张照片读帧失败, 跳过", index),
      }
    }

    info!("抓拍完成: {}/{} 张", paths.len(), capture.count);
    Ok(paths)
  }
}

fn detect_pet<M>(model: &M, frame: &Frame) -> Result<Option<Detection>, SessionError>
where
  M: Model<Input = Frame, Output = DetectResult> + ?Sized,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let result = model
    .infer(frame)
    .map_err(|e| SessionError::Detector(Box::new(e)))?;
  Ok(result.best_pet())
}

fn scan<C, M, S, K>(
  config: &ScanConfig,
  camera: &mut C,
  model: &M,
  motion: &mut MotionController<S>,
  clock: &K,
  stop: Option<&StopFlag>,
) -> Result<ScanOutcome, SessionError>
where
  C: Camera + ?Sized,
  M: Model<Input = Frame, Output = DetectResult> + ?Sized,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: ServoDriver,
  K: Clock,
{
  let tilts = linspace(config.tilt_range.0, config.tilt_range.1, config.steps_tilt);
  let pans = linspace(config.pan_range.0, config.pan_range.1, config.steps_pan);
  info!("开始扫描: {}x{} 网格", pans.len(), tilts.len());

  for (tilt_index, &tilt) in tilts.iter().enumerate() {
    motion.move_tilt(tilt)?;
    clock.sleep(config.settle_tilt);
    check_stop(stop)?;

    for (pan_index, &pan) in pans.iter().enumerate() {
      motion.move_pan(pan)?;
      clock.sleep(config.settle_pan);
      check_stop(stop)?;

      let Some(frame) = camera.read_frame() else {
        warn!("扫描位置 pan={:.1}° tilt={:.1}° 读帧失败, 跳过", pan, tilt);
        continue;
      };

      if let Some(detection) = detect_pet(model, &frame)? {
        let position = motion.position();
        info!(
          "在 pan={:.1}° tilt={:.1}° 发现宠物 (类别 {}, 置信度 {:.2})",
          position.pan, position.tilt, detection.class_id, detection.confidence
        );
        return Ok(ScanOutcome::Detected(ScanHit {
          tilt_index,
          pan_index,
          position,
          detection,
        }));
      }
    }
  }

  info!("扫描结束, 未发现宠物");
  Ok(ScanOutcome::Exhausted)
}

fn track<C, M, S, K>(
  config: &TrackingConfig,
  camera: &mut C,
  model: &M,
  motion: &mut MotionController<S>,
  clock: &K,
  stop: Option<&StopFlag>,
) -> Result<TrackingReport, SessionError>
where
  C: Camera + ?Sized,
  M: Model<Input = Frame, Output = DetectResult> + ?Sized,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: ServoDriver,
  K: Clock,
{
  let budget = config.frame_budget();
  let start = clock.now();
  let mut report = TrackingReport::default();
  info!("开始跟踪: {:.1?} @ {} fps", config.duration, config.fps);

  while clock.now().duration_since(start) < config.duration {
    check_stop(stop)?;
    let tick_start = clock.now();

    let Some(frame) = camera.read_frame() else {
      warn!("跟踪中读帧失败, 提前结束跟踪");
      report.ended_early = true;
      break;
    };
    report.ticks += 1;

    if let Some(detection) = detect_pet(model, &frame)? {
      let (cx, cy) = detection.center();
      let (fx, fy) = frame_center(&frame);
      motion.step(cx as f32 - fx, cy as f32 - fy)?;
      report.corrections += 1;
    } else {
      debug!("本帧未检测到宠物, 保持当前位置");
    }

    // 超时的帧不补偿
    let spent = clock.now().duration_since(tick_start);
    if let Some(rest) = budget.checked_sub(spent) {
      clock.sleep(rest);
    }
  }

  info!(
    "跟踪结束: {} 帧, {} 次校正, 位置 {:?}",
    report.ticks,
    report.corrections,
    motion.position()
  );
  Ok(report)
}
