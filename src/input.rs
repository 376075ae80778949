// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/input.rs - 摄像头输入
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

use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, frame::Frame};

/// 摄像头设备
///
/// `open` 失败是硬错误；`read_frame` 返回 `None` 表示读帧失败或流结束，由调用方决定如何处理。
pub trait Camera {
  fn open(&mut self) -> Result<(), CameraError>;
  fn is_open(&self) -> bool;
  fn read_frame(&mut self) -> Option<Frame>;
  fn close(&mut self);
}

impl<T: Camera + ?Sized> Camera for Box<T> {
  fn open(&mut self) -> Result<(), CameraError> {
    (**self).open()
  }

  fn is_open(&self) -> bool {
    (**self).is_open()
  }

  fn read_frame(&mut self) -> Option<Frame> {
    (**self).read_frame()
  }

  fn close(&mut self) {
    (**self).close()
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::ImageFileCamera;

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::V4lCamera;

#[derive(Error, Debug)]
pub enum CameraError {
  #[error("无法打开摄像头 {device}: {source}")]
  Open {
    device: String,
    #[source]
    source: std::io::Error,
  },
  #[error("输入源中没有可用的图像: {0}")]
  Empty(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 摄像头占用守卫
///
/// 获取时按需打开设备（已打开则直接复用），离开作用域时无条件关闭，
/// 包括提前返回与 panic 展开的路径。
pub struct CameraGuard<'a, C: Camera + ?Sized> {
  camera: &'a mut C,
}

impl<'a, C: Camera + ?Sized> CameraGuard<'a, C> {
  pub fn acquire(camera: &'a mut C) -> Result<Self, CameraError> {
    if camera.is_open() {
      debug!("摄像头已打开, 复用现有句柄");
    } else {
      camera.open()?;
    }
    Ok(Self { camera })
  }
}

impl<C: Camera + ?Sized> Deref for CameraGuard<'_, C> {
  type Target = C;

  fn deref(&self) -> &Self::Target {
    self.camera
  }
}

impl<C: Camera + ?Sized> DerefMut for CameraGuard<'_, C> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.camera
  }
}

impl<C: Camera + ?Sized> Drop for CameraGuard<'_, C> {
  fn drop(&mut self) {
    self.camera.close();
    debug!("摄像头已释放");
  }
}

pub enum CameraWrapper {
  #[cfg(feature = "v4l_input")]
  V4l(V4lCamera),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileCamera),
}

impl FromUrl for CameraWrapper {
  type Error = CameraError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lCamera::SCHEME {
        return Ok(CameraWrapper::V4l(V4lCamera::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileCamera::SCHEME {
        return Ok(CameraWrapper::ImageFile(ImageFileCamera::from_url(url)?));
      }
    }
    Err(CameraError::SchemeMismatch)
  }
}

impl Camera for CameraWrapper {
  fn open(&mut self) -> Result<(), CameraError> {
    match self {
      #[cfg(feature = "v4l_input")]
      CameraWrapper::V4l(camera) => camera.open(),
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.open(),
    }
  }

  fn is_open(&self) -> bool {
    match self {
      #[cfg(feature = "v4l_input")]
      CameraWrapper::V4l(camera) => camera.is_open(),
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.is_open(),
    }
  }

  fn read_frame(&mut self) -> Option<Frame> {
    match self {
      #[cfg(feature = "v4l_input")]
      CameraWrapper::V4l(camera) => camera.read_frame(),
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.read_frame(),
    }
  }

  fn close(&mut self) {
    match self {
      #[cfg(feature = "v4l_input")]
      CameraWrapper::V4l(camera) => camera.close(),
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.close(),
    }
  }
}
