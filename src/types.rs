/// 播放/推理流水线数据结构定义
/// Data structures shared by the playback and inference pipeline
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

// ========== 枚举类型 ==========

/// 速率模式 (Rate mode)
///
/// - `Timed`:      按源帧率节流播放, 推理按顺序处理并在落后时追帧
/// - `Continuous`: 不节流, 推理只处理最新帧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    #[default]
    Timed,
    Continuous,
}

impl RateMode {
    pub fn name(&self) -> &'static str {
        match self {
            RateMode::Timed => "timed",
            RateMode::Continuous => "continuous",
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            RateMode::Timed => 0,
            RateMode::Continuous => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RateMode::Continuous,
            _ => RateMode::Timed,
        }
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timed" | "t" => Ok(RateMode::Timed),
            "continuous" | "c" => Ok(RateMode::Continuous),
            other => Err(format!("unknown rate mode: {other}")),
        }
    }
}

/// 播放状态 (Playback state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

// ========== 数据结构 ==========

/// 视频帧: 解码一次, 创建后不可变; 跨线程传递时各自持有副本
#[derive(Clone)]
pub struct Frame {
    pub index: i64,
    pub timestamp: f64, // 秒, index / fps
    pub image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage, index: i64, fps: f64) -> Self {
        let timestamp = if fps > 0.0 { index as f64 / fps } else { 0.0 };
        Self {
            index,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u32 {
        3
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("size", &format_args!("{}x{}", self.width(), self.height()))
            .finish()
    }
}

/// 流信息: 随每一帧回调一起下发
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub total_frames: i64, // 部分编码格式为 -1
    pub fps: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BBox {
    // a bounding box in frame pixel coordinates
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
}

impl BBox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0))
    }

    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., w, h)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 裁剪到画面范围内
    pub fn clamp(&self, frame_width: f32, frame_height: f32) -> Self {
        let x1 = self.xmin.clamp(0.0, frame_width);
        let y1 = self.ymin.clamp(0.0, frame_height);
        let x2 = self.xmax().clamp(0.0, frame_width);
        let y2 = self.ymax().clamp(0.0, frame_height);
        Self::from_xyxy(x1, y1, x2, y2)
    }

    pub fn intersection_area(&self, another: &BBox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &BBox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &BBox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}

/// 单个检测目标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// 检测结果 (推理线程 → 结果对账 → UI)
///
/// `frame_index` 是计算该结果所用的帧, 不是结果完成时正在显示的帧
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub frame_index: i64,
    pub detections: Vec<Detection>,
    pub mode: RateMode,
    pub inference_ms: f64,
}

impl DetectionResult {
    pub fn new(frame_index: i64, detections: Vec<Detection>, mode: RateMode) -> Self {
        Self {
            frame_index,
            detections,
            mode,
            inference_ms: 0.0,
        }
    }

    pub fn count(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
