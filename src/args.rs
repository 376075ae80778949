// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/args.rs - 命令行与环境变量参数
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

use clap::Parser;
use url::Url;

use maoqiu::config::{
  CaptureConfig, ConfigError, MonitorConfig, MotionConfig, NotifyConfig, ScanConfig,
  SessionConfig, TrackingConfig, minutes, seconds,
};

/// Maoqiu 定时宠物监控
///
/// 每个参数都可以通过同名的环境变量提供。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// Slack Bot Token（xoxb-...）
  #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
  pub slack_token: String,

  /// 通知频道
  #[arg(long, env = "SLACK_CHANNEL", default_value = "#pet-monitoring")]
  pub slack_channel: String,

  /// YOLOv8 ONNX 模型文件路径
  #[arg(long, env = "YOLO_MODEL_PATH", value_name = "FILE", default_value = "yolov8n.onnx")]
  pub model: PathBuf,

  /// 以 URL 指定模型及阈值，例如 yolov8:///models/yolov8n.onnx?conf=0.3&iou=0.5
  ///
  /// 指定后忽略 --model、--confidence 与 --nms-threshold。
  #[arg(long, env = "YOLO_MODEL_URL", value_name = "MODEL")]
  pub model_url: Option<Url>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 摄像头 URL，例如 v4l:///dev/video0?width=640&height=480 或 image:///path/to/stills
  ///
  /// 未指定时使用 /dev/video<camera-index>。
  #[arg(long, env = "CAMERA_URL", value_name = "SOURCE")]
  pub camera: Option<Url>,

  #[arg(long, env = "CAMERA_INDEX", default_value = "0")]
  pub camera_index: u32,

  #[arg(long, env = "FRAME_WIDTH", default_value = "640")]
  pub frame_width: u32,

  #[arg(long, env = "FRAME_HEIGHT", default_value = "480")]
  pub frame_height: u32,

  /// 舵机驱动 URL，例如 pca9685:///dev/i2c-1?address=64
  #[arg(long, env = "SERVO_URL", value_name = "SERVO", default_value = "pca9685:///dev/i2c-1")]
  pub servo: Url,

  #[arg(long, env = "PAN_CHANNEL", default_value = "0")]
  pub pan_channel: u8,

  #[arg(long, env = "TILT_CHANNEL", default_value = "1")]
  pub tilt_channel: u8,

  #[arg(long, env = "KP_PAN", default_value = "0.02")]
  pub kp_pan: f32,

  #[arg(long, env = "KP_TILT", default_value = "0.02")]
  pub kp_tilt: f32,

  /// 死区（像素）
  #[arg(long, env = "DEADBAND", default_value = "10")]
  pub deadband: f32,

  #[arg(long, env = "SCAN_STEPS_PAN", default_value = "9")]
  pub scan_steps_pan: usize,

  #[arg(long, env = "SCAN_STEPS_TILT", default_value = "5")]
  pub scan_steps_tilt: usize,

  /// 跟踪时长（秒）
  #[arg(long, env = "TRACKING_DURATION", default_value = "8.0")]
  pub tracking_duration: f64,

  #[arg(long, env = "TRACKING_FPS", default_value = "10.0")]
  pub tracking_fps: f32,

  #[arg(long, env = "IMAGE_SAVE_DIR", default_value = "./captured_images")]
  pub save_dir: PathBuf,

  #[arg(long, env = "CAPTURE_COUNT", default_value = "3")]
  pub capture_count: usize,

  /// 拍照间隔（秒）
  #[arg(long, env = "CAPTURE_INTERVAL", default_value = "0.5")]
  pub capture_interval: f64,

  #[arg(long, env = "IMAGE_LONG_EDGE", default_value = "800")]
  pub long_edge: u32,

  #[arg(long, env = "JPEG_QUALITY", default_value = "70")]
  pub jpeg_quality: u8,

  /// 监控周期（分钟）
  #[arg(long, env = "SCHEDULE_INTERVAL", default_value = "10")]
  pub schedule_interval: u64,

  /// 运行指定周期数后退出
  #[arg(long, value_name = "COUNT")]
  pub max_cycles: Option<usize>,

  /// 同时写入日志文件
  #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "pet_monitoring.log")]
  pub log_file: Option<PathBuf>,

  /// 只执行自检
  #[arg(long)]
  pub test_only: bool,

  /// 不驱动真实舵机
  #[arg(long)]
  pub dry_run: bool,
}

impl Args {
  pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
    Ok(MonitorConfig {
      motion: MotionConfig {
        pan_channel: self.pan_channel,
        tilt_channel: self.tilt_channel,
        kp_pan: self.kp_pan,
        kp_tilt: self.kp_tilt,
        deadband: self.deadband,
      },
      session: SessionConfig {
        scan: ScanConfig {
          steps_pan: self.scan_steps_pan,
          steps_tilt: self.scan_steps_tilt,
          ..ScanConfig::default()
        },
        tracking: TrackingConfig {
          duration: seconds("tracking_duration", self.tracking_duration)?,
          fps: self.tracking_fps,
        },
        capture: CaptureConfig {
          save_dir: self.save_dir.clone(),
          count: self.capture_count,
          long_edge: self.long_edge,
          jpeg_quality: self.jpeg_quality,
          interval: seconds("capture_interval", self.capture_interval)?,
        },
      },
      notify: NotifyConfig {
        channel: self.slack_channel.clone(),
        ..NotifyConfig::default()
      },
      schedule_interval: minutes("schedule_interval", self.schedule_interval)?,
    })
  }
}
