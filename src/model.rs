// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<T: Model + ?Sized> Model for Box<T> {
  type Input = T::Input;
  type Output = T::Output;
  type Error = T::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// COCO 80 类中的宠物类别
pub struct CocoLabel;

impl CocoLabel {
  pub const CAT: u32 = 15;
  pub const DOG: u32 = 16;
}

/// 跟踪目标类别
pub const PET_CLASSES: [u32; 2] = [CocoLabel::CAT, CocoLabel::DOG];

/// 单个检测框，像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
  pub confidence: f32,
  pub class_id: u32,
}

impl Detection {
  /// 检测框中心，按像素网格向下取整
  pub fn center(&self) -> (i32, i32) {
    (
      (self.x1 + self.x2).div_euclid(2),
      (self.y1 + self.y2).div_euclid(2),
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 在给定类别中挑选置信度最高的检测框
  ///
  /// 使用严格大于比较，置信度相同时保留先出现的。
  pub fn best_of(&self, classes: &[u32]) -> Option<Detection> {
    let mut best: Option<Detection> = None;
    for item in self.items.iter().filter(|d| classes.contains(&d.class_id)) {
      if best.is_none_or(|b| item.confidence > b.confidence) {
        best = Some(*item);
      }
    }
    best
  }

  pub fn best_pet(&self) -> Option<Detection> {
    self.best_of(&PET_CLASSES)
  }
}

#[cfg(feature = "model_yolov8")]
mod yolov8;
#[cfg(feature = "model_yolov8")]
pub use self::yolov8::{Yolov8, Yolov8Builder, Yolov8Error};
