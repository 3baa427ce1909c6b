/// 视频播放器 (Video player)
///
/// 状态机: Stopped / Paused / Playing, 初始为 Stopped.
/// - 后台解码线程: Playing 时逐帧读取并回调; Timed 模式按源帧率节流, Continuous 模式不等待
/// - 同步操作 (open/stop/seek/next/prev): 在调用线程上最多解码一帧
/// - 解码器句柄由一把互斥锁保护, 回调在锁外执行
/// - 同步操作持有解码器锁时推进 epoch; 解码线程读到的帧若 epoch 已过期则丢弃并回退
use parking_lot::{Condvar, Mutex, MutexGuard, ReentrantMutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::source::{open_source, FrameSource};
use crate::types::{Frame, PlaybackState, RateMode, StreamInfo};

/// 帧回调: 在解码线程或调用同步操作的线程上执行, 需要自行投递到UI线程
pub type FrameCallback = Arc<dyn Fn(&Frame, StreamInfo) + Send + Sync>;

const DEFAULT_FPS: f64 = 30.0;

struct Shared {
    decoder: Mutex<Option<Box<dyn FrameSource>>>,
    state: Mutex<PlaybackState>,
    wake: Condvar,
    alive: AtomicBool,
    mode: AtomicU8,
    current: AtomicI64,
    total: AtomicI64,
    fps_bits: AtomicU64,
    callback: RwLock<Option<FrameCallback>>,
    // 下发顺序锁, 回调内可重入调用播放器操作
    delivery: ReentrantMutex<()>,
    epoch: AtomicU64, // 每次同步操作 +1
    seeks: AtomicU64, // 每次移动解码器位置 +1
}

type DecoderGuard<'a> = MutexGuard<'a, Option<Box<dyn FrameSource>>>;

/// 解码线程读到的一帧, 附带读取时的 epoch / seeks
struct Pending {
    frame: Option<Frame>,
    epoch: u64,
    seeks: u64,
}

impl Shared {
    fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Acquire))
    }

    fn mode(&self) -> RateMode {
        RateMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    fn set_state(&self, next: PlaybackState) {
        let mut state = self.state.lock();
        if *state != next {
            log::debug!("播放状态: {:?} → {:?}", *state, next);
            *state = next;
        }
        drop(state);
        self.wake.notify_all();
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            total_frames: self.total.load(Ordering::Acquire),
            fps: self.fps(),
        }
    }

    /// 读取一帧. 读完后解码器位置指向下一帧, 帧序号 = position - 1
    fn grab_locked(&self, source: &mut dyn FrameSource) -> Option<Frame> {
        match source.read() {
            Ok(Some(image)) => {
                let index = (source.position() - 1).max(0);
                Some(Frame::new(image, index, self.fps()))
            }
            Ok(None) => {
                log::debug!("📭 流结束 (position {})", source.position());
                None
            }
            Err(e) => {
                log::warn!("⚠️  解码失败: {}", e);
                None
            }
        }
    }

    fn grab(&self) -> Option<Frame> {
        let mut decoder = self.decoder.lock();
        let source = decoder.as_mut()?;
        self.grab_locked(&mut **source)
    }

    /// 同步操作入口: 持有解码器锁切换状态并推进 epoch, 解码线程手中尚未下发的帧随之作废
    fn take_over(&self, next: PlaybackState) -> DecoderGuard<'_> {
        let decoder = self.decoder.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.set_state(next);
        decoder
    }

    /// 定位后读取一帧, 两步在同一次加锁内完成
    fn seek_and_grab(
        &self,
        next: PlaybackState,
        target: impl FnOnce(&dyn FrameSource) -> i64,
    ) -> Option<Frame> {
        let mut decoder = self.take_over(next);
        let source = decoder.as_mut()?;
        let index = target(&**source);
        self.seeks.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = source.seek(index) {
            log::warn!("⚠️  定位到第 {} 帧失败: {}", index, e);
            return None;
        }
        self.grab_locked(&mut **source)
    }

    /// 单步: 读取已下发帧的下一帧; 解码器位置已被解码线程推进时先定位
    fn step(&self, next: PlaybackState) -> Option<Frame> {
        let mut decoder = self.take_over(next);
        let source = decoder.as_mut()?;
        self.seeks.fetch_add(1, Ordering::AcqRel);
        let target = self.current.load(Ordering::Acquire) + 1;
        if source.position() != target {
            if let Err(e) = source.seek(target) {
                log::debug!("定位到第 {} 帧失败: {}", target, e);
                return None;
            }
        }
        self.grab_locked(&mut **source)
    }

    /// 解码线程读取一帧; 非 Playing 时不读
    fn grab_playing(&self) -> Option<Pending> {
        let mut decoder = self.decoder.lock();
        if self.state() != PlaybackState::Playing {
            return None;
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        let seeks = self.seeks.load(Ordering::Acquire);
        let source = decoder.as_mut()?;
        Some(Pending {
            frame: self.grab_locked(&mut **source),
            epoch,
            seeks,
        })
    }

    /// 作废的帧: 解码器未被移动过则回退到该帧, 下次播放重新读取
    fn rewind(&self, frame: &Frame, seeks: u64) {
        let mut decoder = self.decoder.lock();
        if self.seeks.load(Ordering::Acquire) != seeks {
            return;
        }
        if let Some(source) = decoder.as_mut() {
            if let Err(e) = source.seek(frame.index) {
                log::warn!("⚠️  回退到第 {} 帧失败: {}", frame.index, e);
            }
        }
    }

    fn dispatch(&self, frame: &Frame) {
        self.current.store(frame.index, Ordering::Release);
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(frame, self.info());
        }
    }

    fn deliver(&self, frame: Option<Frame>) -> bool {
        match frame {
            Some(frame) => {
                let _order = self.delivery.lock();
                self.dispatch(&frame);
                true
            }
            None => false,
        }
    }

    /// 解码线程下发: epoch 未变化才下发, 与同步操作的下发互斥
    fn deliver_if_current(&self, frame: Frame, epoch: u64, seeks: u64) -> bool {
        let order = self.delivery.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            drop(order);
            log::trace!("丢弃过期帧 {}", frame.index);
            self.rewind(&frame, seeks);
            return false;
        }
        self.dispatch(&frame);
        true
    }

    /// Timed 模式的帧间等待; 暂停/停止/关闭时提前返回
    fn pace(&self, remaining: Duration) {
        let deadline = Instant::now() + remaining;
        let mut state = self.state.lock();
        self.wake.wait_while_until(
            &mut state,
            |s| *s == PlaybackState::Playing && self.alive.load(Ordering::Acquire),
            deadline,
        );
    }
}

fn run_loop(shared: Arc<Shared>) {
    log::info!("✅ 解码线程启动");

    while shared.alive.load(Ordering::Acquire) {
        {
            let mut state = shared.state.lock();
            if *state != PlaybackState::Playing {
                shared.wake.wait_while(&mut state, |s| {
                    *s != PlaybackState::Playing && shared.alive.load(Ordering::Acquire)
                });
                continue;
            }
        }

        let t0 = Instant::now();
        let Some(pending) = shared.grab_playing() else {
            continue;
        };
        let Some(frame) = pending.frame else {
            // 流结束: Playing → Paused (不覆盖期间发生的同步操作)
            let mut state = shared.state.lock();
            if *state == PlaybackState::Playing
                && shared.epoch.load(Ordering::Acquire) == pending.epoch
            {
                *state = PlaybackState::Paused;
                log::info!("⏸️  播放到结尾, 已暂停");
            }
            continue;
        };
        if !shared.deliver_if_current(frame, pending.epoch, pending.seeks) {
            continue;
        }

        if shared.mode() == RateMode::Timed {
            let frame_dur = Duration::from_secs_f64(1.0 / shared.fps().max(1.0));
            let elapsed = t0.elapsed();
            if elapsed < frame_dur {
                shared.pace(frame_dur - elapsed);
            }
        }
    }

    log::info!("✅ 解码线程退出");
}

pub struct VideoPlayer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    source_name: Option<String>,
    resolution: Option<(u32, u32)>,
    default_fps: f64,
}

impl VideoPlayer {
    pub fn new() -> Self {
        Self::with_default_fps(DEFAULT_FPS)
    }

    /// `default_fps`: 源未提供帧率时使用
    pub fn with_default_fps(default_fps: f64) -> Self {
        let default_fps = if default_fps > 1e-3 {
            default_fps
        } else {
            DEFAULT_FPS
        };
        Self {
            shared: Arc::new(Shared {
                decoder: Mutex::new(None),
                state: Mutex::new(PlaybackState::Stopped),
                wake: Condvar::new(),
                alive: AtomicBool::new(false),
                mode: AtomicU8::new(RateMode::Timed.as_u8()),
                current: AtomicI64::new(0),
                total: AtomicI64::new(-1),
                fps_bits: AtomicU64::new(0f64.to_bits()),
                callback: RwLock::new(None),
                delivery: ReentrantMutex::new(()),
                epoch: AtomicU64::new(0),
                seeks: AtomicU64::new(0),
            }),
            worker: None,
            source_name: None,
            resolution: None,
            default_fps,
        }
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&Frame, StreamInfo) + Send + Sync + 'static,
    {
        *self.shared.callback.write() = Some(Arc::new(callback));
    }

    pub fn set_rate_mode(&self, mode: RateMode) {
        self.shared.mode.store(mode.as_u8(), Ordering::Release);
    }

    pub fn rate_mode(&self) -> RateMode {
        self.shared.mode()
    }

    /// 打开路径 (目录 → 图片序列, 文件 → OpenCV)
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.close();
        let source = open_source(path.as_ref(), self.default_fps)?;
        self.open_with(source)
    }

    /// 使用已创建的帧源开始新会话: 下发第一帧, 进入 Paused, 启动解码线程
    pub fn open_with(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        self.close();

        let fps = source.fps().unwrap_or(self.default_fps);
        let total = source.frame_count();
        let name = source.describe();
        log::info!("📹 打开: {} | {} 帧 | {:.2} fps", name, total, fps);

        self.shared.fps_bits.store(fps.to_bits(), Ordering::Release);
        self.shared.total.store(total, Ordering::Release);
        self.shared
            .current
            .store(source.position().max(0), Ordering::Release);
        *self.shared.decoder.lock() = Some(source);
        self.source_name = Some(name);

        let first = self.shared.grab();
        match &first {
            Some(frame) => self.resolution = Some((frame.width(), frame.height())),
            None => log::warn!("⚠️  无法读取第一帧"),
        }
        self.shared.deliver(first);

        self.shared.set_state(PlaybackState::Paused);
        self.shared.alive.store(true, Ordering::Release);
        let shared = self.shared.clone();
        let worker = thread::Builder::new()
            .name("video-player".into())
            .spawn(move || run_loop(shared));
        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }

    /// 停止解码线程并释放解码器
    pub fn close(&mut self) {
        {
            let _state = self.shared.state.lock();
            self.shared.alive.store(false, Ordering::Release);
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("❌ 解码线程异常退出");
            }
        }
        if self.shared.decoder.lock().take().is_some() {
            log::info!("⏹️  已关闭: {}", self.source_name.as_deref().unwrap_or("?"));
        }
        *self.shared.state.lock() = PlaybackState::Stopped;
        self.shared.current.store(0, Ordering::Release);
        self.shared.total.store(-1, Ordering::Release);
        self.shared.fps_bits.store(0f64.to_bits(), Ordering::Release);
        self.source_name = None;
        self.resolution = None;
    }

    pub fn is_opened(&self) -> bool {
        self.shared.decoder.lock().is_some()
    }

    pub fn play(&self) -> bool {
        if !self.is_opened() {
            return false;
        }
        self.shared.set_state(PlaybackState::Playing);
        true
    }

    pub fn pause(&self) -> bool {
        if !self.is_opened() {
            return false;
        }
        drop(self.shared.take_over(PlaybackState::Paused));
        // 等待正在下发的帧完成
        drop(self.shared.delivery.lock());
        true
    }

    /// → Stopped, 回到第0帧并同步下发 (尽力而为)
    pub fn stop(&self) -> bool {
        if !self.is_opened() {
            return false;
        }
        let frame = self.shared.seek_and_grab(PlaybackState::Stopped, |_| 0);
        self.shared.deliver(frame)
    }

    /// 单步前进, 之后保持 Paused
    pub fn next_frame(&self) -> bool {
        if !self.is_opened() {
            return false;
        }
        let frame = self.shared.step(PlaybackState::Paused);
        self.shared.deliver(frame)
    }

    /// 单步后退, 之后保持 Paused
    pub fn prev_frame(&self) -> bool {
        if !self.is_opened() {
            return false;
        }
        // 以已下发的帧为准, 解码线程可能已多读一帧
        let target = (self.current_frame() - 1).max(0);
        let frame = self.shared.seek_and_grab(PlaybackState::Paused, |_| target);
        self.shared.deliver(frame)
    }

    /// 定位到绝对帧序号并同步下发, → Paused
    pub fn seek(&self, frame_index: i64) -> bool {
        if frame_index < 0 || !self.is_opened() {
            return false;
        }
        let frame = self.shared.seek_and_grab(PlaybackState::Paused, |_| frame_index);
        self.shared.deliver(frame)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn current_frame(&self) -> i64 {
        self.shared.current.load(Ordering::Acquire)
    }

    pub fn frame_count(&self) -> i64 {
        self.shared.total.load(Ordering::Acquire)
    }

    pub fn fps(&self) -> f64 {
        self.shared.fps()
    }

    pub fn total_time_str(&self) -> String {
        format_timestamp(self.frame_count().max(0), self.fps())
    }

    pub fn frame_time_str(&self) -> String {
        format_timestamp(self.current_frame(), self.fps())
    }

    pub fn summary(&self) -> Option<VideoSummary> {
        let source = self.source_name.clone()?;
        let (width, height) = self.resolution.unwrap_or((0, 0));
        Some(VideoSummary {
            source,
            frame_count: self.frame_count(),
            fps: self.fps(),
            duration: self.total_time_str(),
            width,
            height,
        })
    }
}

impl Default for VideoPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.close();
    }
}

/// 帧序号 → "HH:MM:SS.mmm"
pub fn format_timestamp(frame_index: i64, fps: f64) -> String {
    if fps <= 1e-3 || frame_index <= 0 {
        return "00:00:00.000".to_string();
    }
    let total_ms = (frame_index as f64 / fps * 1000.0).round() as i64;
    let (hours, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rem) = (rem / 60_000, rem % 60_000);
    let (seconds, millis) = (rem / 1000, rem % 1000);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// 视频概要信息
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub source: String,
    pub frame_count: i64,
    pub fps: f64,
    pub duration: String,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for VideoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}x{} | {} frames | {:.2} fps | {}",
            self.source, self.width, self.height, self.frame_count, self.fps, self.duration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use image::{Rgb, RgbImage};

    /// 内存帧源: 像素值 = 帧序号
    struct ScriptedSource {
        frames: i64,
        next: i64,
        fps: Option<f64>,
        read_delay: Duration,
    }

    impl ScriptedSource {
        fn boxed(frames: i64, fps: Option<f64>) -> Box<dyn FrameSource> {
            Box::new(Self {
                frames,
                next: 0,
                fps,
                read_delay: Duration::ZERO,
            })
        }

        /// 每次读取耗时 `read_delay`, 模拟慢解码
        fn slow(frames: i64, read_delay: Duration) -> Box<dyn FrameSource> {
            Box::new(Self {
                frames,
                next: 0,
                fps: Some(30.0),
                read_delay,
            })
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Option<RgbImage>> {
            if !self.read_delay.is_zero() {
                thread::sleep(self.read_delay);
            }
            if self.next >= self.frames {
                return Ok(None);
            }
            let img = RgbImage::from_pixel(2, 2, Rgb([self.next as u8, 0, 0]));
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
            self.fps
        }

        fn frame_count(&self) -> i64 {
            self.frames
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn recorder(player: &VideoPlayer) -> Arc<Mutex<Vec<(i64, u8, Instant)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        player.set_callback(move |frame, _info| {
            sink.lock()
                .push((frame.index, frame.image.get_pixel(0, 0).0[0], Instant::now()));
        });
        seen
    }

    fn indices(seen: &Mutex<Vec<(i64, u8, Instant)>>) -> Vec<i64> {
        seen.lock().iter().map(|(i, _, _)| *i).collect()
    }

    fn wait_for_state(player: &VideoPlayer, state: PlaybackState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while player.state() != state {
            assert!(Instant::now() < deadline, "timed out waiting for {state:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn open_delivers_first_frame_and_pauses() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(10, Some(25.0))).unwrap();

        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(indices(&seen), vec![0]);
        assert_eq!(player.frame_count(), 10);
        assert_eq!(player.fps(), 25.0);
        assert_eq!(player.summary().unwrap().width, 2);
    }

    #[test]
    fn missing_fps_falls_back_to_default() {
        let mut player = VideoPlayer::with_default_fps(12.0);
        player.open_with(ScriptedSource::boxed(3, None)).unwrap();
        assert_eq!(player.fps(), 12.0);
    }

    #[test]
    fn stepping_tracks_frame_index() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(10, Some(30.0))).unwrap();

        assert!(player.next_frame());
        assert!(player.next_frame());
        assert_eq!(player.current_frame(), 2);
        assert!(player.prev_frame());
        assert_eq!(player.current_frame(), 1);

        let seen = seen.lock();
        let pixels: Vec<_> = seen.iter().map(|(i, p, _)| (*i, *p as i64)).collect();
        assert_eq!(pixels, vec![(0, 0), (1, 1), (2, 2), (1, 1)]);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn prev_frame_at_start_stays_at_zero() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(5, Some(30.0))).unwrap();

        assert_eq!(player.current_frame(), 0);
        assert!(player.prev_frame());
        assert!(player.prev_frame());
        assert_eq!(player.current_frame(), 0);
        assert_eq!(indices(&seen), vec![0, 0, 0]);
    }

    #[test]
    fn seek_delivers_requested_frame() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(10, Some(30.0))).unwrap();
        player.play();

        assert!(player.seek(7));
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.current_frame(), 7);
        assert_eq!(seen.lock().last().map(|(i, p, _)| (*i, *p)), Some((7, 7)));

        assert!(!player.seek(-1));
        assert!(!player.seek(10));
    }

    #[test]
    fn stop_rewinds_to_first_frame() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(10, Some(30.0))).unwrap();
        player.seek(4);

        assert!(player.stop());
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.current_frame(), 0);
        assert_eq!(seen.lock().last().map(|(i, _, _)| *i), Some(0));
    }

    #[test]
    fn playing_to_end_of_stream_pauses() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.set_rate_mode(RateMode::Continuous);
        player.open_with(ScriptedSource::boxed(20, Some(30.0))).unwrap();

        assert!(player.play());
        wait_for_state(&player, PlaybackState::Paused);
        assert_eq!(indices(&seen), (0..20).collect::<Vec<_>>());
        assert_eq!(player.current_frame(), 19);
    }

    #[test]
    fn timed_mode_paces_at_source_rate() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(8, Some(30.0))).unwrap();

        player.play();
        wait_for_state(&player, PlaybackState::Paused);

        let seen = seen.lock();
        // 第0帧来自 open, 只统计播放线程下发的帧间隔
        let played: Vec<Instant> = seen.iter().skip(1).map(|(_, _, t)| *t).collect();
        assert_eq!(played.len(), 7);
        let span = played[played.len() - 1].duration_since(played[0]);
        let avg = span / (played.len() as u32 - 1);
        assert!(avg >= Duration::from_millis(28), "too fast: {avg:?}");
        assert!(avg <= Duration::from_millis(80), "too slow: {avg:?}");
    }

    #[test]
    fn continuous_mode_does_not_throttle() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.set_rate_mode(RateMode::Continuous);
        player.open_with(ScriptedSource::boxed(30, Some(30.0))).unwrap();

        let start = Instant::now();
        player.play();
        wait_for_state(&player, PlaybackState::Paused);
        // 30帧按30fps需要约1秒
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(seen.lock().len(), 30);
    }

    #[test]
    fn pause_holds_position() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.open_with(ScriptedSource::boxed(1000, Some(100.0))).unwrap();

        player.play();
        thread::sleep(Duration::from_millis(60));
        assert!(player.pause());
        thread::sleep(Duration::from_millis(30));
        let count = seen.lock().len();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(seen.lock().len(), count);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn stop_during_slow_decode_ends_on_first_frame() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.set_rate_mode(RateMode::Continuous);
        player.open_with(ScriptedSource::slow(100, Duration::from_millis(40))).unwrap();

        player.play();
        thread::sleep(Duration::from_millis(130));
        assert!(player.stop());
        thread::sleep(Duration::from_millis(150));

        assert_eq!(seen.lock().last().map(|(i, p, _)| (*i, *p)), Some((0, 0)));
        assert_eq!(player.current_frame(), 0);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn seek_during_slow_decode_is_not_overwritten() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.set_rate_mode(RateMode::Continuous);
        player.open_with(ScriptedSource::slow(100, Duration::from_millis(40))).unwrap();

        player.play();
        thread::sleep(Duration::from_millis(130));
        assert!(player.seek(50));
        thread::sleep(Duration::from_millis(150));

        assert_eq!(seen.lock().last().map(|(i, _, _)| *i), Some(50));
        assert_eq!(player.current_frame(), 50);
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn pause_during_slow_decode_resumes_without_skipping() {
        let mut player = VideoPlayer::new();
        let seen = recorder(&player);
        player.set_rate_mode(RateMode::Continuous);
        player.open_with(ScriptedSource::slow(100, Duration::from_millis(40))).unwrap();

        player.play();
        thread::sleep(Duration::from_millis(130));
        assert!(player.pause());
        let shown = player.current_frame();
        thread::sleep(Duration::from_millis(150));

        // 暂停后不再下发, 被丢弃的在途帧在单步时重新读取
        assert_eq!(seen.lock().last().map(|(i, _, _)| *i), Some(shown));
        assert_eq!(player.current_frame(), shown);
        assert!(player.next_frame());
        assert_eq!(player.current_frame(), shown + 1);
        assert_eq!(seen.lock().last().map(|(i, p, _)| (*i, *p as i64)), Some((shown + 1, shown + 1)));
        assert!(player.prev_frame());
        assert_eq!(player.current_frame(), shown);
    }

    #[test]
    fn operations_on_unopened_player_fail() {
        let player = VideoPlayer::new();
        assert!(!player.play());
        assert!(!player.pause());
        assert!(!player.stop());
        assert!(!player.next_frame());
        assert!(!player.prev_frame());
        assert!(!player.seek(0));
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(player.summary().is_none());
    }

    #[test]
    fn open_missing_path_fails_and_close_resets() {
        let mut player = VideoPlayer::new();
        assert!(player.open("/no/such/video.mp4").is_err());
        assert!(!player.is_opened());

        player.open_with(ScriptedSource::boxed(3, Some(30.0))).unwrap();
        player.close();
        assert!(!player.is_opened());
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.frame_count(), -1);
        assert_eq!(player.fps(), 0.0);
    }

    #[test]
    fn timestamps_are_formatted() {
        assert_eq!(format_timestamp(0, 30.0), "00:00:00.000");
        assert_eq!(format_timestamp(45, 30.0), "00:00:01.500");
        assert_eq!(format_timestamp(30 * 3725, 30.0), "01:02:05.000");
        assert_eq!(format_timestamp(10, 0.0), "00:00:00.000");
    }
}
