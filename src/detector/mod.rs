/// 检测器接口 (Detector boundary)
///
/// 推理线程只通过 `Detector` trait 调用检测器:
/// - 输入一帧 RGB 图像, 输出帧坐标系下的检测框列表
/// - `DetectorHandle` 由调用方持有, 最后一个句柄释放时检测器随之释放
/// - 具体实现: `YoloDetector` (ONNX Runtime, feature = "onnx")
pub mod postprocess;
#[cfg(feature = "onnx")]
pub mod yolo;

pub use postprocess::{color_for, letterbox, non_max_suppression, DecodeParams, Letterbox, TaskHead};
#[cfg(feature = "onnx")]
pub use yolo::{YoloConfig, YoloDetector};

use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PlayerError, Result};
use crate::types::{Detection, Frame};

pub trait Detector: Send {
    /// 同步检测一帧; 耗时不定 (GPU预热/画面复杂度)
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    fn name(&self) -> &str;
}

/// 调用方持有的检测器句柄, 可在线程间克隆
pub type DetectorHandle = Arc<Mutex<Box<dyn Detector>>>;

pub fn share<D: Detector + 'static>(detector: D) -> DetectorHandle {
    Arc::new(Mutex::new(Box::new(detector)))
}

/// YOLO 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum YoloTask {
    #[default]
    Detect,
    Classify,
    Segment,
    Pose,
    Obb,
}

impl YoloTask {
    pub const ALL: [YoloTask; 5] = [
        YoloTask::Detect,
        YoloTask::Classify,
        YoloTask::Segment,
        YoloTask::Pose,
        YoloTask::Obb,
    ];

    pub fn model_file(&self) -> &'static str {
        match self {
            YoloTask::Detect => "yolo11m.onnx",
            YoloTask::Classify => "yolo11m-cls.onnx",
            YoloTask::Segment => "yolo11m-seg.onnx",
            YoloTask::Pose => "yolo11m-pose.onnx",
            YoloTask::Obb => "yolo11m-obb.onnx",
        }
    }

    pub fn labels_file(&self) -> &'static str {
        match self {
            YoloTask::Classify => "ImageNet.names",
            YoloTask::Obb => "Dota.names",
            _ => "coco.names",
        }
    }

    /// `<app_dir>/model/<model_file>`
    pub fn model_path(&self, app_dir: impl AsRef<Path>) -> PathBuf {
        app_dir.as_ref().join("model").join(self.model_file())
    }

    /// `<app_dir>/cfg/<labels_file>`
    pub fn labels_path(&self, app_dir: impl AsRef<Path>) -> PathBuf {
        app_dir.as_ref().join("cfg").join(self.labels_file())
    }
}

impl fmt::Display for YoloTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            YoloTask::Detect => "detect",
            YoloTask::Classify => "classify",
            YoloTask::Segment => "segment",
            YoloTask::Pose => "pose",
            YoloTask::Obb => "obb",
        };
        f.write_str(name)
    }
}

/// 读取类别名文件, 每行一个, 忽略空行
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        PlayerError::detector(format!("failed to read labels {}: {}", path.display(), e))
    })?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    log::info!("🏷️  加载 {} 个类别: {}", labels.len(), path.display());
    Ok(labels)
}

/// 类别名, 越界时退化为 "class N"
pub fn label_for(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class {}", class_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;
    use image::RgbImage;

    struct Fixed(Vec<Detection>);

    impl Detector for Fixed {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn task_paths_follow_app_layout() {
        let dir = Path::new("/opt/player");
        assert_eq!(
            YoloTask::Segment.model_path(dir),
            Path::new("/opt/player/model/yolo11m-seg.onnx")
        );
        assert_eq!(
            YoloTask::Classify.labels_path(dir),
            Path::new("/opt/player/cfg/ImageNet.names")
        );
        assert_eq!(YoloTask::Obb.labels_file(), "Dota.names");
        assert_eq!(YoloTask::Pose.labels_file(), "coco.names");
    }

    #[test]
    fn labels_skip_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coco.names");
        fs::write(&path, "person\n\n bicycle \ncar\n").unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["person", "bicycle", "car"]);
        assert_eq!(label_for(&labels, 2), "car");
        assert_eq!(label_for(&labels, 9), "class 9");
        assert!(load_labels(dir.path().join("missing.names")).is_err());
    }

    #[test]
    fn handle_is_shared_between_clones() {
        let det = Detection::new(BBox::new(1.0, 2.0, 3.0, 4.0), 0.9, 0);
        let handle = share(Fixed(vec![det.clone()]));
        let other = handle.clone();

        let frame = Frame::new(RgbImage::new(8, 8), 0, 30.0);
        assert_eq!(other.lock().detect(&frame).unwrap(), vec![det]);
        assert_eq!(handle.lock().name(), "fixed");
        assert_eq!(Arc::strong_count(&handle), 2);
    }
}
