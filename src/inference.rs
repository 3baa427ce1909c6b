/// 推理线程 (Inference worker)
///
/// 职责: 从输入队列取帧 → 调用检测器 → 结果投递给回调 → 帧转发到输出队列
/// - Continuous: 清空输入队列只处理最新一帧
/// - Timed: 按顺序处理, 积压超过高水位时跳帧追到低水位
/// - 检测器错误/panic 只影响当前帧, 不会结束线程
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::channel::FrameChannel;
use crate::config::InferenceTuning;
use crate::detector::DetectorHandle;
use crate::error::Result;
use crate::types::{DetectionResult, Frame, RateMode};

/// 结果回调, 在推理线程上执行
pub type ResultSink = Arc<dyn Fn(DetectionResult) + Send + Sync>;

/// 推理统计
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub processed: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
}

pub struct InferenceWorker {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    input: Option<Arc<FrameChannel>>,
    stats: Arc<WorkerStats>,
}

impl InferenceWorker {
    pub fn new() -> Self {
        Self {
            handle: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            input: None,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// 启动推理线程; 已在运行时先停止旧线程
    pub fn start(
        &mut self,
        input: Arc<FrameChannel>,
        output: Arc<FrameChannel>,
        mode: RateMode,
        detector: DetectorHandle,
        sink: ResultSink,
        tuning: InferenceTuning,
    ) -> Result<()> {
        self.stop();
        tuning.validate()?;

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            input: input.clone(),
            output,
            mode,
            detector,
            sink,
            tuning,
            stop: stop.clone(),
            stats: self.stats.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("inference-{}", mode))
            .spawn(move || ctx.run())?;

        self.handle = Some(handle);
        self.stop_flag = stop;
        self.input = Some(input);
        log::info!("✅ 推理线程启动 (模式: {})", mode);
        Ok(())
    }

    /// 发出停止信号, 关闭输入队列唤醒阻塞的 pop, 等待线程退出
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop_flag.store(true, Ordering::Release);
        if let Some(input) = self.input.take() {
            input.shutdown();
        }
        if handle.join().is_err() {
            log::error!("❌ 推理线程异常退出");
        }
        log::info!("⏹️  推理线程已停止");
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

impl Default for InferenceWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    input: Arc<FrameChannel>,
    output: Arc<FrameChannel>,
    mode: RateMode,
    detector: DetectorHandle,
    sink: ResultSink,
    tuning: InferenceTuning,
    stop: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
}

impl LoopContext {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(self) {
        while !self.stopped() {
            let frame = match self.mode {
                RateMode::Continuous => self.select_latest(),
                RateMode::Timed => self.select_timed(),
            };

            let Some(frame) = frame else {
                if self.input.is_shutdown() && self.input.is_empty() {
                    break;
                }
                if self.mode == RateMode::Continuous {
                    thread::sleep(self.tuning.idle_sleep);
                }
                continue;
            };

            self.process(&frame);
            self.output.push(frame, true);
        }
        log::debug!("推理线程退出 (模式: {})", self.mode);
    }

    /// 取出队列中的全部帧, 只保留最新一帧
    fn select_latest(&self) -> Option<Frame> {
        let mut latest = None;
        while let Some(frame) = self.input.try_pop() {
            if latest.is_some() {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            }
            latest = Some(frame);
        }
        latest
    }

    /// 按顺序取帧; 积压超过高水位时丢弃中间帧直到低水位
    fn select_timed(&self) -> Option<Frame> {
        let mut frame = self.input.pop_timeout(self.tuning.pop_timeout)?;
        if self.input.len() > self.tuning.high_water {
            let mut skipped = 0u64;
            while self.input.len() > self.tuning.low_water {
                match self.input.try_pop() {
                    Some(next) => {
                        frame = next;
                        skipped += 1;
                    }
                    None => break,
                }
            }
            self.stats.skipped.fetch_add(skipped, Ordering::Relaxed);
            log::debug!("⏩ 追帧: 跳过 {} 帧, 处理第 {} 帧", skipped, frame.index);
        }
        Some(frame)
    }

    fn process(&self, frame: &Frame) {
        let t0 = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.detector.lock().detect(frame)));

        match outcome {
            Ok(Ok(detections)) => {
                let mut result = DetectionResult::new(frame.index, detections, self.mode);
                result.inference_ms = t0.elapsed().as_secs_f64() * 1000.0;
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                log::trace!(
                    "帧 {} → {} 个目标 ({:.1}ms)",
                    frame.index,
                    result.count(),
                    result.inference_ms
                );
                (self.sink)(result);
            }
            Ok(Err(e)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("⚠️  帧 {} 检测失败: {}", frame.index, e);
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("❌ 帧 {} 检测器 panic, 已跳过", frame.index);
            }
        }
    }
}
