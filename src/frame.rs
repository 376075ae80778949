// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/frame.rs - 帧格式转换与缩放
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

use image::{RgbImage, imageops::FilterType};

/// 摄像头帧，统一为 RGB8
pub type Frame = RgbImage;

/// 画面中心（像素），用于计算跟踪误差
pub fn frame_center(frame: &Frame) -> (f32, f32) {
  (frame.width() as f32 / 2.0, frame.height() as f32 / 2.0)
}

/// 计算长边缩放到 `long_edge` 后的尺寸
///
/// 短边按 `short * long_edge / long` 截断取整，且至少为 1。宽高相等时按高为长边处理。
pub fn fit_long_edge(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
  let scale = |short: u32, long: u32| -> u32 {
    if long == 0 {
      return long_edge;
    }
    ((short as u64 * long_edge as u64) / long as u64).max(1) as u32
  };

  if width > height {
    (long_edge, scale(height, width))
  } else {
    (scale(width, height), long_edge)
  }
}

/// 按长边等比缩放
pub fn resize_long_edge(frame: &Frame, long_edge: u32) -> Frame {
  let (width, height) = fit_long_edge(frame.width(), frame.height(), long_edge);
  if (width, height) == frame.dimensions() {
    return frame.clone();
  }
  image::imageops::resize(frame, width, height, FilterType::Triangle)
}

/// 将 YUYV (YUV 4:2:2) 格式转换为 RGB
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}
