// 该文件是 Maoqiu （毛球） 项目的一部分。
// tests/common/mod.rs - 集成测试用的替身组件
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

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use maoqiu::{
  clock::{ManualClock, StopFlag},
  config::{MonitorConfig, SessionConfig},
  frame::Frame,
  input::{Camera, CameraError},
  model::{CocoLabel, DetectResult, Detection, Model},
  notify::{Notifier, NotifyError},
  servo::{ServoDriver, ServoError},
};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

/// 计数打开、关闭与读帧次数的摄像头
#[derive(Default)]
pub struct FakeCamera {
  pub opens: usize,
  pub closes: usize,
  pub reads: usize,
  open: bool,
  fail_open: bool,
  /// 1 起计的读帧序号，命中时返回 None
  failing_reads: HashSet<usize>,
  /// 超过该次数后每次读帧都失败
  read_limit: Option<usize>,
}

impl FakeCamera {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_open(mut self) -> Self {
    self.fail_open = true;
    self
  }

  pub fn failing_reads(mut self, reads: &[usize]) -> Self {
    self.failing_reads.extend(reads.iter().copied());
    self
  }

  pub fn with_read_limit(mut self, limit: usize) -> Self {
    self.read_limit = Some(limit);
    self
  }
}

impl Camera for FakeCamera {
  fn open(&mut self) -> Result<(), CameraError> {
    if self.fail_open {
      return Err(CameraError::Empty("fake".to_string()));
    }
    self.opens += 1;
    self.open = true;
    Ok(())
  }

  fn is_open(&self) -> bool {
    self.open
  }

  fn read_frame(&mut self) -> Option<Frame> {
    if !self.open {
      return None;
    }
    self.reads += 1;
    if self.failing_reads.contains(&self.reads) || self.read_limit.is_some_and(|n| self.reads > n) {
      return None;
    }
    Some(Frame::new(WIDTH, HEIGHT))
  }

  fn close(&mut self) {
    self.closes += 1;
    self.open = false;
  }
}

#[derive(Debug, thiserror::Error)]
#[error("scripted detector failure")]
pub struct ScriptedError;

/// 按调用序号（1 起计）返回预设结果的检测器
#[derive(Default)]
pub struct ScriptedDetector {
  pub calls: Cell<usize>,
  hits: HashMap<usize, Detection>,
  hit_from: Option<(usize, Detection)>,
  fail_on: Option<usize>,
  raise_on: Option<(usize, StopFlag)>,
  /// 每次推理让时钟前进的时间
  latency: Option<(Rc<ManualClock>, Duration)>,
}

impl ScriptedDetector {
  pub fn never() -> Self {
    Self::default()
  }

  /// 第 `call` 次调用时检测到宠物
  pub fn hit_on(mut self, call: usize, detection: Detection) -> Self {
    self.hits.insert(call, detection);
    self
  }

  /// 从第 `call` 次调用起一直检测到宠物
  pub fn hit_from(mut self, call: usize, detection: Detection) -> Self {
    self.hit_from = Some((call, detection));
    self
  }

  pub fn failing_on(mut self, call: usize) -> Self {
    self.fail_on = Some(call);
    self
  }

  /// 第 `call` 次调用时置位停止标志，模拟运行中收到 Ctrl-C
  pub fn raising_on(mut self, call: usize, stop: StopFlag) -> Self {
    self.raise_on = Some((call, stop));
    self
  }

  pub fn with_latency(mut self, clock: Rc<ManualClock>, latency: Duration) -> Self {
    self.latency = Some((clock, latency));
    self
  }
}

impl Model for ScriptedDetector {
  type Input = Frame;
  type Output = DetectResult;
  type Error = ScriptedError;

  fn infer(&self, _input: &Frame) -> Result<DetectResult, ScriptedError> {
    let call = self.calls.get() + 1;
    self.calls.set(call);

    if let Some((clock, latency)) = &self.latency {
      clock.advance(*latency);
    }
    if let Some((at, stop)) = &self.raise_on
      && *at == call
    {
      stop.raise();
    }

    if self.fail_on == Some(call) {
      return Err(ScriptedError);
    }

    let mut items = Vec::new();
    if let Some(detection) = self.hits.get(&call) {
      items.push(*detection);
    }
    if let Some((from, detection)) = self.hit_from
      && call >= from
    {
      items.push(detection);
    }
    Ok(items.into())
  }
}

/// 以 (cx, cy) 为中心的猫
pub fn cat_at(cx: i32, cy: i32) -> Detection {
  Detection {
    x1: cx - 20,
    y1: cy - 20,
    x2: cx + 20,
    y2: cy + 20,
    confidence: 0.9,
    class_id: CocoLabel::CAT,
  }
}

pub fn cat_centered() -> Detection {
  cat_at(WIDTH as i32 / 2, HEIGHT as i32 / 2)
}

/// 记录所有写入的舵机，可共享句柄以便在移交所有权后检查
#[derive(Clone, Default)]
pub struct RecordingServo {
  pub writes: Rc<RefCell<Vec<(u8, f32)>>>,
  pub fail: Rc<Cell<bool>>,
}

impl RecordingServo {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn last_angle(&self, channel: u8) -> Option<f32> {
    self
      .writes
      .borrow()
      .iter()
      .rev()
      .find(|(c, _)| *c == channel)
      .map(|(_, a)| *a)
  }

  pub fn write_count(&self) -> usize {
    self.writes.borrow().len()
  }
}

impl ServoDriver for RecordingServo {
  fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), ServoError> {
    if self.fail.get() {
      return Err(ServoError::InvalidChannel(channel));
    }
    self.writes.borrow_mut().push((channel, degrees));
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
  pub paths: Vec<PathBuf>,
  pub channel: String,
  pub caption: String,
  pub title: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
  pub uploads: RefCell<Vec<Upload>>,
  pub fail_upload: bool,
  pub fail_connection: bool,
}

impl RecordingNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing_upload() -> Self {
    Self {
      fail_upload: true,
      ..Self::default()
    }
  }

  pub fn failing_connection() -> Self {
    Self {
      fail_connection: true,
      ..Self::default()
    }
  }
}

impl Notifier for RecordingNotifier {
  fn upload_files(
    &self,
    paths: &[PathBuf],
    channel: &str,
    caption: &str,
    title: &str,
  ) -> Result<(), NotifyError> {
    self.uploads.borrow_mut().push(Upload {
      paths: paths.to_vec(),
      channel: channel.to_string(),
      caption: caption.to_string(),
      title: title.to_string(),
    });
    if self.fail_upload {
      return Err(NotifyError::Api("channel_not_found".to_string()));
    }
    Ok(())
  }

  fn send_message(&self, _channel: &str, _text: &str) -> Result<(), NotifyError> {
    Ok(())
  }

  fn test_connection(&self) -> Result<(), NotifyError> {
    if self.fail_connection {
      return Err(NotifyError::Api("invalid_auth".to_string()));
    }
    Ok(())
  }
}

/// 默认会话参数，保存目录指向 `save_dir`，跟踪阶段为零时长
pub fn session_config(save_dir: PathBuf) -> SessionConfig {
  let mut config = SessionConfig::default();
  config.tracking.duration = Duration::ZERO;
  config.capture.save_dir = save_dir;
  config.capture.long_edge = 320;
  config
}

pub fn monitor_config(save_dir: PathBuf) -> MonitorConfig {
  MonitorConfig {
    session: session_config(save_dir),
    ..MonitorConfig::default()
  }
}
