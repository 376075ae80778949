// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/input/v4l_input.rs - V4L2 摄像头输入
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

use image::RgbImage;
use tracing::{error, info, warn};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, yuyv_to_rgb},
  input::{Camera, CameraError},
};

const YUYV: &[u8; 4] = b"YUYV";
const MJPG: &[u8; 4] = b"MJPG";
const BUFFER_COUNT: u32 = 4;

/// 已打开的设备与捕获流
struct OpenDevice {
  // 先于 device 释放
  stream: Stream<'static>,
  _device: Device,
  width: u32,
  height: u32,
  fourcc: FourCC,
}

/// V4L2 摄像头
///
/// 分辨率请求只是建议，以设备实际协商出的格式为准。
pub struct V4lCamera {
  device_path: String,
  width: u32,
  height: u32,
  opened: Option<OpenDevice>,
}

impl FromUrlWithScheme for V4lCamera {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lCamera {
  type Error = CameraError;

  /// 形如 `v4l:///dev/video0?width=640&height=480`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CameraError::SchemeMismatch);
    }

    let device_path = if url.path().is_empty() || url.path() == "/" {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    let mut camera = V4lCamera::new(device_path, 640, 480);
    for (k, v) in url.query_pairs() {
      match (k.as_ref(), v.parse::<u32>()) {
        ("width", Ok(width)) => camera.width = width,
        ("height", Ok(height)) => camera.height = height,
        _ => warn!("忽略未知的摄像头参数: {}={}", k, v),
      }
    }
    Ok(camera)
  }
}

impl V4lCamera {
  pub fn new(device_path: impl Into<String>, width: u32, height: u32) -> Self {
    Self {
      device_path: device_path.into(),
      width,
      height,
      opened: None,
    }
  }

  /// 按设备序号创建，对应 `/dev/video<index>`
  pub fn with_index(index: u32, width: u32, height: u32) -> Self {
    Self::new(format!("/dev/video{}", index), width, height)
  }

  fn open_device(&self) -> std::io::Result<OpenDevice> {
    let device = Device::with_path(&self.device_path)?;

    let mut format = device.format()?;
    format.width = self.width;
    format.height = self.height;
    format.fourcc = FourCC::new(YUYV);
    let format = device.set_format(&format)?;

    if format.width != self.width || format.height != self.height {
      warn!(
        "摄像头未接受请求的分辨率 {}x{}, 实际为 {}x{}",
        self.width, self.height, format.width, format.height
      );
    }

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;

    Ok(OpenDevice {
      stream,
      _device: device,
      width: format.width,
      height: format.height,
      fourcc: format.fourcc,
    })
  }
}

impl Camera for V4lCamera {
  fn open(&mut self) -> Result<(), CameraError> {
    if self.opened.is_some() {
      return Ok(());
    }

    let opened = self.open_device().map_err(|source| CameraError::Open {
      device: self.device_path.clone(),
      source,
    })?;
    info!(
      "摄像头已打开: {} {}x{} {}",
      self.device_path, opened.width, opened.height, opened.fourcc
    );
    self.opened = Some(opened);
    Ok(())
  }

  fn is_open(&self) -> bool {
    self.opened.is_some()
  }

  fn read_frame(&mut self) -> Option<Frame> {
    let opened = self.opened.as_mut()?;
    let (width, height, fourcc) = (opened.width, opened.height, opened.fourcc);

    let buffer = match opened.stream.next() {
      Ok((buffer, _meta)) => buffer,
      Err(e) => {
        warn!("无法捕获帧: {}", e);
        return None;
      }
    };

    if fourcc == FourCC::new(MJPG) {
      return match image::load_from_memory(buffer) {
        Ok(image) => Some(image.to_rgb8()),
        Err(e) => {
          warn!("无法解码 MJPG 帧: {}", e);
          None
        }
      };
    }

    let rgb = yuyv_to_rgb(buffer, width, height);
    let frame = RgbImage::from_raw(width, height, rgb);
    if frame.is_none() {
      warn!("帧数据长度与 {}x{} 不匹配", width, height);
    }
    frame
  }

  fn close(&mut self) {
    if self.opened.take().is_some() {
      info!("摄像头已关闭: {}", self.device_path);
    }
  }
}
