#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod channel; // 有界帧队列
pub mod config; // 流水线配置参数
pub mod controller; // 速率模式切换
pub mod detector; // 检测器接口与YOLO实现
pub mod error;
pub mod inference; // 推理线程
pub mod overlay; // 叠加层渲染
pub mod player; // 视频播放状态机
pub mod reconciler; // 结果与显示帧对账
pub mod session; // 播放会话 (传输控制面)
pub mod source; // 视频输入后端
pub mod types;

pub use crate::channel::{BoundedChannel, FrameChannel};
pub use crate::config::{InferenceTuning, PipelineConfig};
pub use crate::controller::PlaybackModeController;
pub use crate::detector::{load_labels, share, Detector, DetectorHandle, YoloTask};
#[cfg(feature = "onnx")]
pub use crate::detector::{YoloConfig, YoloDetector};
pub use crate::error::{PlayerError, Result};
pub use crate::inference::{InferenceWorker, ResultSink};
pub use crate::overlay::OverlayRenderer;
pub use crate::player::{format_timestamp, VideoPlayer, VideoSummary};
pub use crate::reconciler::{OverlaySink, ResultCache, ResultReconciler};
pub use crate::session::{PlayerSession, UiEvent};
pub use crate::source::{open_source, FrameSource, ImageSequenceSource};
pub use crate::types::{
    BBox, Detection, DetectionResult, Frame, PlaybackState, RateMode, StreamInfo,
};
