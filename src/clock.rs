// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/clock.rs - 时钟抽象
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

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 系统时钟可中断休眠的最小粒度
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// 单调时钟与阻塞等待
///
/// 扫描时的舵机稳定等待、跟踪循环的节拍以及拍照间隔都通过它完成，
/// 测试中可替换为不真正休眠的实现。
pub trait Clock {
  fn now(&self) -> Instant;
  fn sleep(&self, duration: Duration);
}

/// 进程级停止标志，由中断处理设置，调度器、会话与时钟共享
#[derive(Debug, Default, Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn raise(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_raised(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// 系统时钟
///
/// 绑定停止标志后，休眠会按 100ms 切片进行，标志一旦置位立即返回。
#[derive(Debug, Default, Clone)]
pub struct SystemClock {
  stop: Option<StopFlag>,
}

impl SystemClock {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_stop(mut self, stop: StopFlag) -> Self {
    self.stop = Some(stop);
    self
  }
}

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }

  fn sleep(&self, duration: Duration) {
    let Some(stop) = &self.stop else {
      if !duration.is_zero() {
        std::thread::sleep(duration);
      }
      return;
    };

    // 无法表示的截止时间视为一直等到停止
    let deadline = Instant::now().checked_add(duration);
    loop {
      if stop.is_raised() {
        return;
      }
      let slice = match deadline {
        Some(deadline) => {
          let now = Instant::now();
          if now >= deadline {
            return;
          }
          SLEEP_SLICE.min(deadline - now)
        }
        None => SLEEP_SLICE,
      };
      std::thread::sleep(slice);
    }
  }
}

/// 手动推进的时钟，只有 `sleep` 或 `advance` 会让时间前进
#[derive(Debug)]
pub struct ManualClock {
  origin: Instant,
  offset: Cell<Duration>,
  slept: Cell<Duration>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl ManualClock {
  pub fn new() -> Self {
    Self {
      origin: Instant::now(),
      offset: Cell::new(Duration::ZERO),
      slept: Cell::new(Duration::ZERO),
    }
  }

  /// 不计入休眠总时长地推进时间（模拟处理耗时）
  pub fn advance(&self, duration: Duration) {
    self.offset.set(self.offset.get() + duration);
  }

  /// 自创建以来累计的休眠时长
  pub fn total_slept(&self) -> Duration {
    self.slept.get()
  }

  pub fn elapsed(&self) -> Duration {
    self.offset.get()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    self.origin + self.offset.get()
  }

  fn sleep(&self, duration: Duration) {
    self.advance(duration);
    self.slept.set(self.slept.get() + duration);
  }
}

impl<T: Clock + ?Sized> Clock for &T {
  fn now(&self) -> Instant {
    (**self).now()
  }

  fn sleep(&self, duration: Duration) {
    (**self).sleep(duration)
  }
}
