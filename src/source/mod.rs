/// 视频输入系统 (Video Input System)
///
/// 解码后端抽象, 播放器只通过 `FrameSource` 的 读取/定位 原语访问视频:
/// - ImageSequenceSource: 图片序列目录 (纯Rust, image crate)
/// - VideoCaptureSource:  OpenCV VideoCapture 视频文件 (feature = "opencv")
pub mod image_sequence;
#[cfg(feature = "opencv")]
pub mod capture;

pub use image_sequence::ImageSequenceSource;
#[cfg(feature = "opencv")]
pub use capture::VideoCaptureSource;

use image::RgbImage;
use std::path::Path;

use crate::error::{PlayerError, Result};

/// 可定位的帧源
///
/// `position()` 与 OpenCV `CAP_PROP_POS_FRAMES` 语义一致: 下一次 `read()` 将返回的帧序号.
/// 读完一帧后 position 已经指向下一帧, 调用方需减 1 得到刚读到的帧序号.
pub trait FrameSource: Send {
    /// 读取下一帧; 流结束返回 `Ok(None)`
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// 定位到绝对帧序号
    fn seek(&mut self, index: i64) -> Result<()>;

    fn position(&self) -> i64;

    /// 源帧率, 未知时为 None
    fn fps(&self) -> Option<f64>;

    /// 总帧数, 未知时为 -1
    fn frame_count(&self) -> i64;

    fn describe(&self) -> String;
}

/// 根据路径选择解码后端
///
/// 目录 → 图片序列 (帧率取 `fallback_fps`); 文件 → OpenCV (需启用 feature)
pub fn open_source(path: &Path, fallback_fps: f64) -> Result<Box<dyn FrameSource>> {
    if !path.exists() {
        return Err(PlayerError::open(format!("{} not found", path.display())));
    }

    if path.is_dir() {
        let source = ImageSequenceSource::open(path, fallback_fps)?;
        return Ok(Box::new(source));
    }

    #[cfg(feature = "opencv")]
    {
        let source = VideoCaptureSource::open(path)?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "opencv"))]
    {
        Err(PlayerError::open(format!(
            "{}: video files need the `opencv` feature (image sequence directories are always supported)",
            path.display()
        )))
    }
}
