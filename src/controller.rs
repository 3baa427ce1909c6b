/// 速率模式控制 (Playback mode controller)
///
/// 切换模式时保证 播放器 / 推理线程 / 结果对账 三方一致:
/// 停止推理 → 重置两个队列 → 清空缓存 → 以新模式重启推理
use std::sync::Arc;

use crate::channel::FrameChannel;
use crate::config::InferenceTuning;
use crate::detector::DetectorHandle;
use crate::error::Result;
use crate::inference::{InferenceWorker, ResultSink, WorkerStats};
use crate::player::VideoPlayer;
use crate::reconciler::ResultReconciler;
use crate::types::RateMode;

pub struct PlaybackModeController {
    mode: RateMode,
    worker: InferenceWorker,
    input: Arc<FrameChannel>,
    output: Arc<FrameChannel>,
    detector: DetectorHandle,
    reconciler: Arc<ResultReconciler>,
    tuning: InferenceTuning,
}

impl PlaybackModeController {
    pub fn new(
        mode: RateMode,
        input: Arc<FrameChannel>,
        output: Arc<FrameChannel>,
        detector: DetectorHandle,
        reconciler: Arc<ResultReconciler>,
        tuning: InferenceTuning,
    ) -> Self {
        reconciler.set_mode(mode);
        Self {
            mode,
            worker: InferenceWorker::new(),
            input,
            output,
            detector,
            reconciler,
            tuning,
        }
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn worker_stats(&self) -> &WorkerStats {
        self.worker.stats()
    }

    /// 以当前模式启动推理线程 (已运行则先停止)
    pub fn start(&mut self) -> Result<()> {
        let reconciler = self.reconciler.clone();
        let sink: ResultSink = Arc::new(move |result| reconciler.on_result(result));
        self.worker.start(
            self.input.clone(),
            self.output.clone(),
            self.mode,
            self.detector.clone(),
            sink,
            self.tuning,
        )
    }

    pub fn stop(&mut self) {
        self.worker.stop();
    }

    /// 停止推理, 清空队列和缓存后重启; 用于打开新视频
    pub fn restart(&mut self) -> Result<()> {
        self.worker.stop();
        self.input.reset();
        self.output.reset();
        self.reconciler.clear();
        self.start()
    }

    /// 切换速率模式. 模式未变化时返回 `Ok(false)`;
    /// 重启失败时三方回退到原模式并尝试以原模式恢复推理
    pub fn set_mode(&mut self, mode: RateMode, player: &VideoPlayer) -> Result<bool> {
        if mode == self.mode {
            return Ok(false);
        }
        log::info!("🔄 速率模式: {} → {}", self.mode, mode);

        let previous = self.mode;
        self.apply_mode(mode, player);
        if let Err(e) = self.restart() {
            log::error!("❌ 以 {} 模式重启推理失败: {}, 回退到 {}", mode, e, previous);
            self.apply_mode(previous, player);
            if let Err(e) = self.start() {
                log::error!("❌ 恢复 {} 模式失败: {}", previous, e);
            }
            return Err(e);
        }
        Ok(true)
    }

    fn apply_mode(&mut self, mode: RateMode, player: &VideoPlayer) {
        self.mode = mode;
        player.set_rate_mode(mode);
        self.reconciler.set_mode(mode);
    }
}

impl Drop for PlaybackModeController {
    fn drop(&mut self) {
        self.worker.stop();
    }
}
