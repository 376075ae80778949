// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/schedule.rs - 周期调度
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

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::{Clock, StopFlag};

/// 强制退出前留给当前周期收尾的时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
  /// 从 1 开始的周期序号
  pub index: usize,
  pub at: Instant,
}

/// 何时开始下一个监控周期
///
/// 返回 `None` 表示不再有下一个周期，编排器随即进入收尾。
pub trait TickSource {
  fn next_tick(&mut self) -> Option<Tick>;
}

/// 注册 Ctrl-C 处理：第一次中断置位停止标志，30 秒后仍未退出则强制结束进程
///
/// 返回的标志应同时交给调度器、时钟与编排器，使正在进行的周期尽快中止并收尾。
pub fn install_interrupt_handler() -> Result<StopFlag, ctrlc::Error> {
  let stop = StopFlag::new();
  let raised = stop.clone();

  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    raised.raise();
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  Ok(stop)
}

/// 固定间隔的调度器
///
/// 第一个周期立即开始；之后每次在上一周期结束（即再次调用 `next_tick`）后等待 `interval`。
/// 等待期间按 `poll` 粒度检查停止信号。
pub struct IntervalTicker<K> {
  clock: K,
  interval: Duration,
  poll: Duration,
  stop: Option<StopFlag>,
  max_cycles: Option<usize>,
  issued: usize,
  stopped: bool,
}

impl<K: Clock> IntervalTicker<K> {
  pub fn new(clock: K, interval: Duration) -> Self {
    Self {
      clock,
      interval,
      poll: DEFAULT_POLL,
      stop: None,
      max_cycles: None,
      issued: 0,
      stopped: false,
    }
  }

  pub fn with_stop_signal(mut self, stop: StopFlag) -> Self {
    self.stop = Some(stop);
    self
  }

  pub fn with_max_cycles(mut self, max_cycles: Option<usize>) -> Self {
    self.max_cycles = max_cycles;
    self
  }

  pub fn with_poll(mut self, poll: Duration) -> Self {
    self.poll = poll;
    self
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped
  }

  fn stop_requested(&mut self) -> bool {
    if !self.stopped && self.stop.as_ref().is_some_and(StopFlag::is_raised) {
      warn!("中断信号接收，停止调度");
      self.stopped = true;
    }
    self.stopped
  }

  fn issue(&mut self) -> Tick {
    self.issued += 1;
    Tick {
      index: self.issued,
      at: self.clock.now(),
    }
  }
}

impl<K: Clock> TickSource for IntervalTicker<K> {
  fn next_tick(&mut self) -> Option<Tick> {
    if self.max_cycles.is_some_and(|n| self.issued >= n) {
      info!("达到指定周期数 {}, 停止调度", self.issued);
      return None;
    }
    if self.stop_requested() {
      return None;
    }
    if self.issued == 0 {
      return Some(self.issue());
    }

    let due = self.clock.now() + self.interval;
    debug!("下一个周期将在 {:.0?} 后开始", self.interval);
    loop {
      let now = self.clock.now();
      if now >= due {
        break;
      }
      self.clock.sleep(self.poll.min(due - now));
      if self.stop_requested() {
        return None;
      }
    }

    Some(self.issue())
  }
}
