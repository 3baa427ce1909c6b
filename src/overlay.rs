/// 叠加层渲染 (Headless overlay renderer)
///
/// UI 线程的最小实现: 保存最新一帧和最新的叠加层, 合成时把检测框画在帧的副本上.
/// 指定输出目录时, 每一帧在被下一帧替换 (或 flush) 时保存为 `frame_{index:06}.png`
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::{color_for, label_for};
use crate::error::Result;
use crate::session::UiEvent;
use crate::types::{Detection, Frame, StreamInfo};

const BOX_THICKNESS: i32 = 2;

pub struct OverlayRenderer {
    labels: Vec<String>,
    output_dir: Option<PathBuf>,
    frame: Option<Frame>,
    info: Option<StreamInfo>,
    overlay: Option<(i64, Vec<Detection>)>,
    unsaved: bool,
    saved: usize,
}

impl OverlayRenderer {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            output_dir: None,
            frame: None,
            info: None,
            overlay: None,
            unsaved: false,
            saved: 0,
        }
    }

    /// 合成后的帧写入 `dir` (不存在时创建)
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        self.output_dir = Some(dir.as_ref().to_path_buf());
        Ok(self)
    }

    /// 处理一个 UI 事件; 新帧上屏时返回其序号, 调用方据此通知 `frame_displayed`
    pub fn handle(&mut self, event: UiEvent) -> Result<Option<i64>> {
        match event {
            UiEvent::Frame { frame, info } => {
                self.flush()?;
                let index = frame.index;
                self.frame = Some(frame);
                self.info = Some(info);
                self.unsaved = true;
                Ok(Some(index))
            }
            UiEvent::Overlay {
                frame_index,
                detections,
            } => {
                log::trace!("叠加层: 帧 {} | {} 个目标", frame_index, detections.len());
                self.overlay = Some((frame_index, detections));
                Ok(None)
            }
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    /// 当前叠加层 (来源帧序号, 检测框)
    pub fn overlay(&self) -> Option<(i64, &[Detection])> {
        self.overlay
            .as_ref()
            .map(|(index, detections)| (*index, detections.as_slice()))
    }

    pub fn detections(&self) -> &[Detection] {
        self.overlay().map(|(_, d)| d).unwrap_or(&[])
    }

    /// 当前帧 + 叠加层
    pub fn compose(&self) -> Option<RgbImage> {
        let frame = self.frame.as_ref()?;
        let mut img = frame.image.clone();
        for det in self.detections() {
            draw_detection(&mut img, det);
        }
        Some(img)
    }

    /// 保存尚未写出的当前帧
    pub fn flush(&mut self) -> Result<()> {
        if !self.unsaved {
            return Ok(());
        }
        self.unsaved = false;
        let (Some(dir), Some(frame)) = (self.output_dir.as_ref(), self.frame.as_ref()) else {
            return Ok(());
        };
        let path = dir.join(format!("frame_{:06}.png", frame.index));
        if let Some(img) = self.compose() {
            img.save(&path)?;
            self.saved += 1;
            log::debug!("💾 {}", path.display());
        }
        Ok(())
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    /// "person 0.87, car 0.55"
    pub fn describe(&self) -> String {
        self.detections()
            .iter()
            .map(|d| format!("{} {:.2}", label_for(&self.labels, d.class_id), d.confidence))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn draw_detection(img: &mut RgbImage, det: &Detection) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let bbox = det.bbox.clamp(w, h);
    if bbox.width() < 1.0 || bbox.height() < 1.0 {
        return;
    }
    draw_rect(
        img,
        bbox.xmin() as i32,
        bbox.ymin() as i32,
        bbox.width() as u32,
        bbox.height() as u32,
        color_for(det.class_id),
    );
}

/// 加粗边框: 向外逐像素扩展
fn draw_rect(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    for offset in 0..BOX_THICKNESS {
        let rect = Rect::at(x - offset, y - offset)
            .of_size(width + (offset * 2) as u32, height + (offset * 2) as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}
