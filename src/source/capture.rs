//! OpenCV 视频文件帧源 (feature = "opencv")

use image::RgbImage;
use opencv::{
    core::{AlgorithmHint, Mat},
    imgproc::{cvt_color, COLOR_BGR2RGB},
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_POS_FRAMES},
};
use std::path::Path;

use super::FrameSource;
use crate::error::{PlayerError, Result};

pub struct VideoCaptureSource {
    cap: VideoCapture,
    path: String,
}

impl VideoCaptureSource {
    pub fn open(path: &Path) -> Result<Self> {
        let path = path.to_string_lossy().into_owned();
        let cap = VideoCapture::from_file(&path, CAP_ANY)
            .map_err(|e| PlayerError::open(format!("failed to open {}: {}", path, e)))?;

        let opened = cap
            .is_opened()
            .map_err(|e| PlayerError::open(format!("video check failed: {}", e)))?;
        if !opened {
            return Err(PlayerError::open(format!("{} is not readable", path)));
        }

        log::info!("🎬 视频文件已打开: {}", path);
        Ok(Self { cap, path })
    }
}

impl FrameSource for VideoCaptureSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let mut bgr = Mat::default();
        let ok = self
            .cap
            .read(&mut bgr)
            .map_err(|e| PlayerError::decode(e.to_string()))?;
        if !ok || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        cvt_color(&bgr, &mut rgb, COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)
            .map_err(|e| PlayerError::decode(format!("color conversion failed: {}", e)))?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb
            .data_bytes()
            .map_err(|e| PlayerError::decode(format!("failed to get image data: {}", e)))?
            .to_vec();
        RgbImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| PlayerError::decode("frame buffer size mismatch"))
    }

    fn seek(&mut self, index: i64) -> Result<()> {
        let ok = self
            .cap
            .set(CAP_PROP_POS_FRAMES, index as f64)
            .map_err(|_| PlayerError::Seek(index))?;
        if ok {
            Ok(())
        } else {
            Err(PlayerError::Seek(index))
        }
    }

    fn position(&self) -> i64 {
        self.cap.get(CAP_PROP_POS_FRAMES).unwrap_or(0.0) as i64
    }

    fn fps(&self) -> Option<f64> {
        self.cap
            .get(CAP_PROP_FPS)
            .ok()
            .filter(|fps| *fps > 1e-3)
    }

    fn frame_count(&self) -> i64 {
        match self.cap.get(CAP_PROP_FRAME_COUNT) {
            Ok(n) if n > 0.0 => n as i64,
            _ => -1,
        }
    }

    fn describe(&self) -> String {
        format!("video file {}", self.path)
    }
}
