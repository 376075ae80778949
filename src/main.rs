// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use maoqiu::{
  FromUrl,
  clock::SystemClock,
  input::{CameraWrapper, V4lCamera},
  model::Yolov8Builder,
  notify::SlackNotifier,
  schedule::{IntervalTicker, install_interrupt_handler},
  servo::{DummyServo, ServoWrapper},
  task::MonitorTask,
};

fn init_logging(log_file: Option<&Path>) -> Result<()> {
  match log_file {
    Some(path) => {
      let file = OpenOptions::new().create(true).append(true).open(path)?;
      tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(std::io::stdout.and(Mutex::new(file)))
        .init();
    }
    None => tracing_subscriber::fmt::init(),
  }
  Ok(())
}

fn main() -> Result<()> {
  let args = args::Args::parse();
  init_logging(args.log_file.as_deref())?;

  let config = args.monitor_config()?;
  config.validate()?;

  info!("Maoqiu 宠物监控");
  match &args.model_url {
    Some(url) => info!("模型 URL: {}", url),
    None => info!("模型文件路径: {}", args.model.display()),
  }
  info!("通知频道: {}", config.notify.channel);
  info!("监控周期: {} 分钟", args.schedule_interval);

  let camera = match &args.camera {
    Some(url) => CameraWrapper::from_url(url)?,
    None => CameraWrapper::V4l(V4lCamera::with_index(
      args.camera_index,
      args.frame_width,
      args.frame_height,
    )),
  };

  let servo = if args.dry_run {
    info!("试运行模式, 不驱动舵机");
    ServoWrapper::Dummy(DummyServo::default())
  } else {
    ServoWrapper::from_url(&args.servo)?
  };

  let model = match &args.model_url {
    Some(url) => Yolov8Builder::from_url(url)?,
    None => Yolov8Builder::new(&args.model)
      .confidence(args.confidence)
      .iou(args.nms_threshold),
  }
  .build()?;

  let notifier = SlackNotifier::new(&args.slack_token);

  let stop = install_interrupt_handler()?;
  let clock = SystemClock::new().with_stop(stop.clone());

  let interval = config.schedule_interval;
  let mut task =
    MonitorTask::new(config, camera, model, servo, notifier, clock.clone()).with_stop(stop.clone());

  if let Err(e) = task.self_test() {
    error!("{}", e);
    task.cleanup();
    std::process::exit(1);
  }
  if args.test_only {
    task.cleanup();
    return Ok(());
  }

  task.startup()?;

  let mut ticker = IntervalTicker::new(clock, interval)
    .with_stop_signal(stop)
    .with_max_cycles(args.max_cycles);
  task.run(&mut ticker);

  Ok(())
}
