// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/task.rs - 监控任务编排
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

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  clock::{Clock, StopFlag},
  config::MonitorConfig,
  frame::Frame,
  input::{Camera, CameraError, CameraGuard},
  model::{DetectResult, Model},
  motion::MotionController,
  notify::{Notifier, NotifyError},
  schedule::{Tick, TickSource},
  servo::{ServoDriver, ServoError},
  session::{Session, SessionError, SessionOutcome},
};

/// 启动回中后等待舵机到位
const STARTUP_SETTLE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum SelfTestError {
  #[error("通知渠道自检失败: {0}")]
  Notifier(#[from] NotifyError),
  #[error("摄像头自检失败: {0}")]
  Camera(#[from] CameraError),
  #[error("摄像头自检失败: 无法读取帧")]
  NoFrame,
  #[error("舵机自检失败: {0}")]
  Servo(#[from] ServoError),
}

/// 一个监控周期的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
  pub outcome: SessionOutcome,
  pub captured: Vec<PathBuf>,
  pub notified: bool,
}

impl CycleReport {
  pub fn detected(&self) -> bool {
    self.outcome.detected()
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub cycles: usize,
  pub detections: usize,
  pub failures: usize,
}

pub fn caption_now() -> String {
  format!("🐾 Pet detected at {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// 定时监控：每个周期执行一次扫描-跟踪-抓拍，并把照片发到通知渠道
///
/// 单个周期内的错误只记录日志并尝试回中，不会终止整个任务。
pub struct MonitorTask<C, M, S, N, K> {
  config: MonitorConfig,
  camera: C,
  model: M,
  motion: MotionController<S>,
  notifier: N,
  clock: K,
  stop: StopFlag,
}

impl<C, M, S, N, K> MonitorTask<C, M, S, N, K>
where
  C: Camera,
  M: Model<Input = Frame, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
  S: ServoDriver,
  N: Notifier,
  K: Clock,
{
  pub fn new(config: MonitorConfig, camera: C, model: M, servo: S, notifier: N, clock: K) -> Self {
    let motion = MotionController::new(servo, &config.motion);
    Self {
      config,
      camera,
      model,
      motion,
      notifier,
      clock,
      stop: StopFlag::new(),
    }
  }

  /// 共享停止标志：置位后正在进行的周期在下一个检查点中止，`run` 随即收尾
  pub fn with_stop(mut self, stop: StopFlag) -> Self {
    self.stop = stop;
    self
  }

  pub fn config(&self) -> &MonitorConfig {
    &self.config
  }

  pub fn camera(&self) -> &C {
    &self.camera
  }

  pub fn motion(&self) -> &MotionController<S> {
    &self.motion
  }

  pub fn notifier(&self) -> &N {
    &self.notifier
  }

  /// 启动自检：通知渠道、摄像头（打开、读一帧、关闭）、舵机回中
  pub fn self_test(&mut self) -> Result<(), SelfTestError> {
    info!("开始自检...");

    self.notifier.test_connection()?;
    info!("通知渠道正常");

    {
      let mut camera = CameraGuard::acquire(&mut self.camera)?;
      let frame = camera.read_frame().ok_or(SelfTestError::NoFrame)?;
      info!("摄像头正常, 分辨率 {}x{}", frame.width(), frame.height());
    }

    self.motion.center()?;
    info!("舵机正常");

    info!("自检通过");
    Ok(())
  }

  /// 回中并等待舵机稳定
  pub fn startup(&mut self) -> Result<(), ServoError> {
    self.motion.center()?;
    self.clock.sleep(STARTUP_SETTLE);
    Ok(())
  }

  /// 执行一个完整周期
  ///
  /// 成功时无论是否发现宠物都会回中；通知失败只记录日志，照片保留在磁盘上。
  pub fn run_cycle(&mut self) -> Result<CycleReport, SessionError> {
    let (outcome, captured) = {
      let mut session = Session::new(
        &self.config.session,
        &mut self.camera,
        &self.model,
        &mut self.motion,
        &self.clock,
      )
      .with_stop(&self.stop);
      let outcome = session.scan_and_track()?;
      let captured = if outcome.detected() {
        session.capture_images()?
      } else {
        Vec::new()
      };
      (outcome, captured)
    };

    let notified = if captured.is_empty() {
      if outcome.detected() {
        warn!("发现宠物但没有拍到照片");
      }
      false
    } else {
      self.notify(&captured)
    };

    self.motion.center()?;

    Ok(CycleReport {
      outcome,
      captured,
      notified,
    })
  }

  fn notify(&self, captured: &[PathBuf]) -> bool {
    let notify = &self.config.notify;
    match self
      .notifier
      .upload_files(captured, &notify.channel, &caption_now(), &notify.title)
    {
      Ok(()) => {
        info!("已通知 {} 张照片", captured.len());
        true
      }
      Err(e) => {
        error!("通知失败, 照片保留在本地: {}", e);
        false
      }
    }
  }

  /// 执行一个周期并吞掉错误：记录日志后尽力回中
  pub fn run_once(&mut self, tick: Tick) -> Option<CycleReport> {
    info!("==== 第 {} 个监控周期 ====", tick.index);
    match self.run_cycle() {
      Ok(report) => {
        info!(
          "周期结束: 发现宠物={}, 照片 {} 张, 已通知={}",
          report.detected(),
          report.captured.len(),
          report.notified
        );
        Some(report)
      }
      Err(SessionError::Cancelled) => {
        warn!("周期被中断");
        if let Err(e) = self.motion.center() {
          error!("回中失败: {}", e);
        }
        None
      }
      Err(e) => {
        error!("周期执行失败: {}", e);
        if let Err(e) = self.motion.center() {
          error!("回中失败: {}", e);
        }
        None
      }
    }
  }

  /// 按调度运行直到调度器结束，然后收尾
  pub fn run<T: TickSource + ?Sized>(&mut self, ticks: &mut T) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some(tick) = ticks.next_tick() {
      summary.cycles += 1;
      match self.run_once(tick) {
        Some(report) if report.detected() => summary.detections += 1,
        Some(_) => {}
        None if self.stop.is_raised() => break,
        None => summary.failures += 1,
      }
      if self.stop.is_raised() {
        break;
      }
    }

    info!(
      "监控结束: {} 个周期, {} 次发现, {} 次失败",
      summary.cycles, summary.detections, summary.failures
    );
    self.cleanup();
    summary
  }

  /// 释放摄像头并回中，错误只记录
  pub fn cleanup(&mut self) {
    info!("清理资源...");
    if self.camera.is_open() {
      self.camera.close();
    }
    if let Err(e) = self.motion.center() {
      error!("清理时回中失败: {}", e);
    }
  }
}
