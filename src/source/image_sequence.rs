//! 图片序列帧源 - 目录中的图片按文件名排序作为连续帧

use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::error::{PlayerError, Result};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    fps: f64,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PlayerError::open(format!(
                "{} contains no image frames",
                dir.display()
            )));
        }

        log::info!("🖼️  图片序列: {} ({} 帧)", dir.display(), files.len());
        Ok(Self {
            dir,
            files,
            next: 0,
            fps,
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let img = image::open(path)?.to_rgb8();
        self.next += 1;
        Ok(Some(img))
    }

    fn seek(&mut self, index: i64) -> Result<()> {
        if index < 0 || index as usize >= self.files.len() {
            return Err(PlayerError::Seek(index));
        }
        self.next = index as usize;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.next as i64
    }

    fn fps(&self) -> Option<f64> {
        (self.fps > 1e-3).then_some(self.fps)
    }

    fn frame_count(&self) -> i64 {
        self.files.len() as i64
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
