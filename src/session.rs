/// 播放会话 (Player session)
///
/// 把 播放器 / 帧队列 / 推理线程 / 结果对账 组装成一个传输控制面:
/// ```text
/// VideoPlayer ──回调──► 输入队列 ──► 推理线程 ──► ResultReconciler ──► UiEvent::Overlay
///      └──────────────────────────────────────────────────────────► UiEvent::Frame
/// ```
/// UI 线程从 `events()` 取事件, 每显示一帧调用 `frame_displayed`
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;
use std::sync::Arc;

use crate::channel::FrameChannel;
use crate::config::PipelineConfig;
use crate::controller::PlaybackModeController;
use crate::detector::DetectorHandle;
use crate::error::Result;
use crate::inference::WorkerStats;
use crate::player::{VideoPlayer, VideoSummary};
use crate::reconciler::{OverlaySink, ResultReconciler};
use crate::source::FrameSource;
use crate::types::{Detection, Frame, PlaybackState, RateMode, StreamInfo};

/// 投递给 UI 线程的事件
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// 新的一帧可以显示
    Frame { frame: Frame, info: StreamInfo },
    /// 替换当前叠加层; 列表为空表示清除
    Overlay {
        frame_index: i64,
        detections: Vec<Detection>,
    },
}

struct ChannelOverlaySink {
    tx: Sender<UiEvent>,
}

impl OverlaySink for ChannelOverlaySink {
    fn present_detections(&self, frame_index: i64, detections: &[Detection]) {
        let event = UiEvent::Overlay {
            frame_index,
            detections: detections.to_vec(),
        };
        if self.tx.send(event).is_err() {
            log::trace!("UI 已退出, 丢弃叠加层 {}", frame_index);
        }
    }
}

pub struct PlayerSession {
    config: PipelineConfig,
    player: VideoPlayer,
    controller: PlaybackModeController,
    reconciler: Arc<ResultReconciler>,
    input: Arc<FrameChannel>,
    output: Arc<FrameChannel>,
    events: Receiver<UiEvent>,
    detector_name: String,
}

impl PlayerSession {
    pub fn new(config: PipelineConfig, detector: DetectorHandle) -> Result<Self> {
        config.validate()?;
        let (tx, events) = unbounded();

        let input = Arc::new(FrameChannel::new(config.input_capacity));
        let output = Arc::new(FrameChannel::new(config.output_capacity));
        let reconciler = Arc::new(ResultReconciler::new(
            config.rate_mode,
            config.result_cache_capacity,
            Arc::new(ChannelOverlaySink { tx: tx.clone() }),
        ));

        let player = VideoPlayer::with_default_fps(config.default_fps);
        player.set_rate_mode(config.rate_mode);
        {
            let input = input.clone();
            player.set_callback(move |frame, info| {
                input.push(frame.clone(), true);
                let event = UiEvent::Frame {
                    frame: frame.clone(),
                    info,
                };
                if tx.send(event).is_err() {
                    log::trace!("UI 已退出, 丢弃帧 {}", frame.index);
                }
            });
        }

        let detector_name = detector.lock().name().to_string();
        let mut controller = PlaybackModeController::new(
            config.rate_mode,
            input.clone(),
            output.clone(),
            detector,
            reconciler.clone(),
            config.tuning(),
        );
        controller.start()?;
        log::info!("✅ 会话就绪 | 检测器: {} | 模式: {}", detector_name, config.rate_mode);

        Ok(Self {
            config,
            player,
            controller,
            reconciler,
            input,
            output,
            events,
            detector_name,
        })
    }

    /// 打开视频 (目录 → 图片序列, 文件 → OpenCV); 清空缓存并重置队列
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.prepare_open()?;
        self.player.open(path)
    }

    /// 使用已创建的帧源打开
    pub fn open_with(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        self.prepare_open()?;
        self.player.open_with(source)
    }

    fn prepare_open(&mut self) -> Result<()> {
        self.player.close();
        self.controller.restart()
    }

    pub fn play(&self) -> bool {
        self.player.play()
    }

    pub fn pause(&self) -> bool {
        self.player.pause()
    }

    /// → Stopped: 停止解码, 以空队列和空缓存重启推理, 再回到第0帧
    pub fn stop(&mut self) -> bool {
        if !self.player.is_opened() {
            return false;
        }
        self.player.pause();
        if let Err(e) = self.controller.restart() {
            log::error!("❌ 重启推理线程失败: {}", e);
        }
        self.player.stop()
    }

    pub fn next_frame(&self) -> bool {
        self.player.next_frame()
    }

    pub fn prev_frame(&self) -> bool {
        self.player.prev_frame()
    }

    pub fn seek(&self, frame_index: i64) -> bool {
        self.player.seek(frame_index)
    }

    /// 失败时保持原模式
    pub fn set_mode(&mut self, mode: RateMode) -> bool {
        match self.controller.set_mode(mode, &self.player) {
            Ok(_) => true,
            Err(e) => {
                log::error!("❌ 切换速率模式失败: {}", e);
                false
            }
        }
    }

    /// 关闭视频并停止推理线程
    pub fn close(&mut self) {
        self.player.close();
        self.controller.stop();
        self.output.shutdown();
        self.reconciler.clear();
    }

    pub fn state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn current_frame(&self) -> i64 {
        self.player.current_frame()
    }

    pub fn mode(&self) -> RateMode {
        self.controller.mode()
    }

    pub fn events(&self) -> &Receiver<UiEvent> {
        &self.events
    }

    /// UI 显示完一帧后调用
    pub fn frame_displayed(&self, frame_index: i64) {
        self.reconciler.on_frame_displayed(frame_index);
    }

    /// 取走推理线程已处理的帧, 返回数量 (用于吞吐统计)
    pub fn drain_processed(&self) -> usize {
        std::iter::from_fn(|| self.output.try_pop()).count()
    }

    pub fn pending_frames(&self) -> usize {
        self.input.len()
    }

    pub fn cached_results(&self) -> usize {
        self.reconciler.cached_len()
    }

    pub fn worker_stats(&self) -> &WorkerStats {
        self.controller.worker_stats()
    }

    pub fn player(&self) -> &VideoPlayer {
        &self.player
    }

    pub fn summary(&self) -> Option<VideoSummary> {
        self.player.summary()
    }

    pub fn detector_name(&self) -> &str {
        &self.detector_name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.close();
    }
}
