// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/output.rs - 抓拍图像保存
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

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::info;

use crate::{
  config::CaptureConfig,
  frame::{Frame, resize_long_edge},
};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误 {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 一张已写入磁盘的抓拍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
  pub path: PathBuf,
  pub width: u32,
  pub height: u32,
}

/// 按长边缩放后以 JPEG 写入目录
///
/// 文件名为 `pet_<YYYYMMDD_HHMMSS_mmm>_<index>.jpg`，目录不存在时自动创建。
pub struct JpegDirectoryOutput {
  directory: PathBuf,
  long_edge: u32,
  quality: u8,
}

impl JpegDirectoryOutput {
  pub fn new(directory: impl Into<PathBuf>, long_edge: u32, quality: u8) -> Self {
    Self {
      directory: directory.into(),
      long_edge,
      // 编码器只接受 1..=100
      quality: quality.clamp(1, 100),
    }
  }

  pub fn from_config(config: &CaptureConfig) -> Self {
    Self::new(&config.save_dir, config.long_edge, config.jpeg_quality)
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn file_name(index: usize) -> String {
    format!("pet_{}_{}.jpg", Local::now().format("%Y%m%d_%H%M%S_%3f"), index)
  }

  pub fn write(&self, frame: &Frame, index: usize) -> Result<CapturedImage, OutputError> {
    std::fs::create_dir_all(&self.directory).map_err(|source| OutputError::IoError {
      path: self.directory.clone(),
      source,
    })?;

    let image = resize_long_edge(frame, self.long_edge);
    let path = self.directory.join(Self::file_name(index));

    let file = File::create(&path).map_err(|source| OutputError::IoError {
      path: path.clone(),
      source,
    })?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.quality);
    encoder.encode_image(&image)?;

    info!(
      "保存图像到文件: {} ({}x{})",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(CapturedImage {
      path,
      width: image.width(),
      height: image.height(),
    })
  }
}
