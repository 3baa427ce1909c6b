#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::thread;
use std::time::{Duration, Instant};

use yolo_player::{
    BBox, Detection, Detector, Frame, FrameSource, PlayerError, PlayerSession, Result, UiEvent,
};

/// 内存帧源: 第 i 帧的像素值为 i
pub struct ScriptedSource {
    frames: i64,
    next: i64,
    fps: f64,
}

impl ScriptedSource {
    pub fn boxed(frames: i64, fps: f64) -> Box<dyn FrameSource> {
        Box::new(Self {
            frames,
            next: 0,
            fps,
        })
    }
}

impl FrameSource for ScriptedSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.next >= self.frames {
            return Ok(None);
        }
        let img = RgbImage::from_pixel(16, 12, Rgb([self.next as u8, 0, 0]));
        self.next += 1;
        Ok(Some(img))
    }

    fn seek(&mut self, index: i64) -> Result<()> {
        if index < 0 || index >= self.frames {
            return Err(PlayerError::Seek(index));
        }
        self.next = index;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.next
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn frame_count(&self) -> i64 {
        self.frames
    }

    fn describe(&self) -> String {
        format!("scripted({} frames)", self.frames)
    }
}

/// 第 i 帧返回 i % 3 个检测框, 每次调用耗时 `delay`
pub struct ScriptedDetector {
    pub delay: Duration,
}

pub fn expected_count(frame_index: i64) -> usize {
    (frame_index % 3) as usize
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        thread::sleep(self.delay);
        Ok((0..expected_count(frame.index))
            .map(|i| Detection::new(BBox::new(i as f32, 1.0, 4.0, 4.0), 0.9, i))
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// UI 线程模拟: 记录上屏帧与叠加层
#[derive(Default)]
pub struct Screen {
    pub shown: Vec<i64>,
    pub overlays: Vec<(i64, usize)>,
}

impl Screen {
    /// 处理事件直到 `quiet` 时间内没有新事件或超过 `limit`
    pub fn pump(&mut self, session: &PlayerSession, quiet: Duration, limit: Duration) {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            match session.events().recv_timeout(quiet) {
                Ok(UiEvent::Frame { frame, .. }) => {
                    self.shown.push(frame.index);
                    session.frame_displayed(frame.index);
                }
                Ok(UiEvent::Overlay {
                    frame_index,
                    detections,
                }) => self.overlays.push((frame_index, detections.len())),
                Err(_) => break,
            }
        }
    }
}

pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
