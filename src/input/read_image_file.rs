// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{Camera, CameraError},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 以静态图片代替摄像头，用于没有硬件时试运行
///
/// 路径可以是单个文件，也可以是目录（按文件名顺序依次读取）。
/// 带 `?loop` 参数时读到末尾后从头开始，否则读完即视为流结束。
pub struct ImageFileCamera {
  path: PathBuf,
  looping: bool,
  files: Vec<PathBuf>,
  cursor: usize,
  opened: bool,
}

impl FromUrlWithScheme for ImageFileCamera {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileCamera {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CameraError::SchemeMismatch);
    }

    let looping = url.query_pairs().any(|(k, _)| k == "loop");
    Ok(ImageFileCamera::new(url.path(), looping))
  }
}

impl ImageFileCamera {
  pub fn new(path: impl Into<PathBuf>, looping: bool) -> Self {
    Self {
      path: path.into(),
      looping,
      files: Vec::new(),
      cursor: 0,
      opened: false,
    }
  }

  fn list_files(&self) -> std::io::Result<Vec<PathBuf>> {
    if self.path.is_file() {
      return Ok(vec![self.path.clone()]);
    }

    let mut files = Vec::new();
    for entry in self.path.read_dir()? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if is_image {
        files.push(path);
      }
    }
    files.sort();
    Ok(files)
  }
}

impl Camera for ImageFileCamera {
  fn open(&mut self) -> Result<(), CameraError> {
    let files = self.list_files().map_err(|source| CameraError::Open {
      device: self.path.display().to_string(),
      source,
    })?;
    if files.is_empty() {
      return Err(CameraError::Empty(self.path.display().to_string()));
    }

    info!("图像输入已打开: {} ({} 个文件)", self.path.display(), files.len());
    self.files = files;
    self.cursor = 0;
    self.opened = true;
    Ok(())
  }

  fn is_open(&self) -> bool {
    self.opened
  }

  fn read_frame(&mut self) -> Option<Frame> {
    if !self.opened {
      return None;
    }
    if self.cursor >= self.files.len() {
      if !self.looping {
        return None;
      }
      self.cursor = 0;
    }

    let path = &self.files[self.cursor];
    self.cursor += 1;

    let decoded = ImageReader::open(path)
      .map_err(image::ImageError::IoError)
      .and_then(|reader| reader.decode());
    match decoded {
      Ok(image) => Some(image.to_rgb8()),
      Err(e) => {
        warn!("无法读取图片 {}: {}", path.display(), e);
        None
      }
    }
  }

  fn close(&mut self) {
    self.opened = false;
    self.files.clear();
    self.cursor = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_png(dir: &std::path::Path, name: &str, width: u32, height: u32) {
    Frame::new(width, height).save(dir.join(name)).unwrap();
  }

  #[test]
  fn replays_directory_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "b.png", 4, 2);
    write_png(dir.path(), "a.png", 2, 2);
    std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

    let mut camera = ImageFileCamera::new(dir.path(), false);
    assert!(camera.read_frame().is_none());
    camera.open().unwrap();

    assert_eq!(camera.read_frame().unwrap().dimensions(), (2, 2));
    assert_eq!(camera.read_frame().unwrap().dimensions(), (4, 2));
    assert!(camera.read_frame().is_none());

    camera.close();
    assert!(!camera.is_open());
  }

  #[test]
  fn looping_restarts_from_first_file() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "only.png", 3, 3);

    let url = Url::parse(&format!("image://{}?loop", dir.path().display())).unwrap();
    let mut camera = ImageFileCamera::from_url(&url).unwrap();
    camera.open().unwrap();
    for _ in 0..3 {
      assert!(camera.read_frame().is_some());
    }
  }

  #[test]
  fn empty_directory_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = ImageFileCamera::new(dir.path(), false);
    assert!(matches!(camera.open(), Err(CameraError::Empty(_))));
  }
}
