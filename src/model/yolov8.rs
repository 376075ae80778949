// 该文件是 Maoqiu （毛球） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 检测模型
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection, Model},
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_CLASS_NUM: usize = 80;
const YOLOV8_BOX_ATTRS: usize = 4;
const YOLOV8_PAD_VALUE: f32 = 144.0 / 255.0;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("模型输出形状不符: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

pub struct Yolov8Builder {
  model_path: PathBuf,
  confidence: f32,
  iou: f32,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for Yolov8Builder {
  type Error = Yolov8Error;

  /// 形如 `yolov8:///models/yolov8n.onnx?conf=0.3&iou=0.5`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = Yolov8Builder::new(url.path());
    for (k, v) in url.query_pairs() {
      match (k.as_ref(), v.parse::<f32>()) {
        ("conf", Ok(conf)) => builder = builder.confidence(conf),
        ("iou", Ok(iou)) => builder = builder.iou(iou),
        _ => {
          return Err(Yolov8Error::ModelPathError(format!("无效的参数 {}={}", k, v)));
        }
      }
    }
    Ok(builder)
  }
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou;
    self
  }

  pub fn build(self) -> Result<Yolov8, Yolov8Error> {
    info!("加载模型文件: {}", self.model_path.display());
    let size = YOLOV8_INPUT_SIZE as usize;
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .and_then(|model| {
        model.with_input_fact(
          0,
          InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
        )
      })
      .and_then(|model| model.into_optimized())
      .and_then(|model| model.into_runnable())
      .map_err(|e| Yolov8Error::ModelLoadError(format!("{}: {}", self.model_path.display(), e)))?;
    info!("模型加载完成");

    Ok(Yolov8 {
      plan,
      confidence: self.confidence,
      iou: self.iou,
    })
  }
}

pub struct Yolov8 {
  plan: Plan,
  confidence: f32,
  iou: f32,
}

/// 左上对齐的等比缩放参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  ratio: f32,
  width: u32,
  height: u32,
}

impl Letterbox {
  fn new(width: u32, height: u32) -> Self {
    let size = YOLOV8_INPUT_SIZE as f32;
    let ratio = (size / width as f32).min(size / height as f32);
    Self {
      ratio,
      width: ((width as f32 * ratio).round() as u32).clamp(1, YOLOV8_INPUT_SIZE),
      height: ((height as f32 * ratio).round() as u32).clamp(1, YOLOV8_INPUT_SIZE),
    }
  }
}

impl Yolov8 {
  fn preprocess(&self, image: &RgbImage) -> (Tensor, Letterbox) {
    let letterbox = Letterbox::new(image.width(), image.height());
    let resized = image::imageops::resize(image, letterbox.width, letterbox.height, FilterType::Triangle);

    let size = YOLOV8_INPUT_SIZE as usize;
    let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
      if (x as u32) < letterbox.width && (y as u32) < letterbox.height {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
      } else {
        YOLOV8_PAD_VALUE
      }
    });

    (input.into_tensor(), letterbox)
  }

  /// 输出形状为 [1, 84, N]：每列为 cx, cy, w, h 与 80 个类别分数
  fn postprocess(
    &self,
    output: &[f32],
    anchors: usize,
    letterbox: Letterbox,
    image: &RgbImage,
  ) -> Vec<Detection> {
    let (img_w, img_h) = (image.width() as f32, image.height() as f32);
    let at = |row: usize, col: usize| output[row * anchors + col];

    let mut candidates = Vec::new();
    for col in 0..anchors {
      let (class_id, score) = (0..YOLOV8_CLASS_NUM)
        .map(|c| (c, at(YOLOV8_BOX_ATTRS + c, col)))
        .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });

      if score < self.confidence {
        continue;
      }

      let cx = at(0, col) / letterbox.ratio;
      let cy = at(1, col) / letterbox.ratio;
      let w = at(2, col) / letterbox.ratio;
      let h = at(3, col) / letterbox.ratio;
      candidates.push(Detection {
        x1: (cx - w / 2.0).clamp(0.0, img_w) as i32,
        y1: (cy - h / 2.0).clamp(0.0, img_h) as i32,
        x2: (cx + w / 2.0).clamp(0.0, img_w) as i32,
        y2: (cy + h / 2.0).clamp(0.0, img_h) as i32,
        confidence: score,
        class_id: class_id as u32,
      });
    }

    non_max_suppression(candidates, self.iou)
  }
}

impl Model for Yolov8 {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = Yolov8Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (tensor, letterbox) = self.preprocess(input);
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(|e| Yolov8Error::InferenceError(e.to_string()))?;

    let output = outputs[0]
      .to_array_view::<f32>()
      .map_err(|e| Yolov8Error::InferenceError(e.to_string()))?;
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 || shape[1] != YOLOV8_BOX_ATTRS + YOLOV8_CLASS_NUM {
      return Err(Yolov8Error::OutputShape(shape));
    }
    let data: Vec<f32> = output.iter().copied().collect();

    let detections = self.postprocess(&data, shape[2], letterbox, input);
    debug!("检测到 {} 个目标", detections.len());
    Ok(detections.into())
  }
}

fn iou(a: &Detection, b: &Detection) -> f32 {
  let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0) as f32;
  let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0) as f32;
  let inter = ix * iy;
  let area = |d: &Detection| ((d.x2 - d.x1).max(0) * (d.y2 - d.y1).max(0)) as f32;
  let union = area(a) + area(b) - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 同类别的非极大值抑制，结果按置信度降序
fn non_max_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<Detection> = Vec::with_capacity(boxes.len());
  for candidate in boxes {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}
