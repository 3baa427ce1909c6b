/// 结果对账 (Result reconciler)
///
/// 推理结果到达时, 屏幕上显示的往往已经是后面的帧:
/// - Timed: 结果按帧序号缓存; 每显示一帧就查缓存, 命中则绘制, 未命中则清空叠加层
/// - Continuous: 结果到达即绘制, 不缓存也不匹配
///
/// 缓存与"当前显示帧"各用一把锁, 绘制在锁外进行
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::types::{Detection, DetectionResult, RateMode};

/// 叠加层输出 (UI 侧实现)
///
/// `detections` 为空表示清除当前帧上的所有框
pub trait OverlaySink: Send + Sync {
    fn present_detections(&self, frame_index: i64, detections: &[Detection]);
}

/// 帧序号 → 检测结果, 超出容量时按插入顺序淘汰最旧的条目
pub struct ResultCache {
    entries: HashMap<i64, Vec<Detection>>,
    order: VecDeque<i64>,
    capacity: usize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// 覆盖同序号的旧结果, 该序号移到最新位置
    pub fn insert(&mut self, frame_index: i64, detections: Vec<Detection>) {
        if self.entries.insert(frame_index, detections).is_some() {
            self.order.retain(|&i| i != frame_index);
        }
        self.order.push_back(frame_index);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn get(&self, frame_index: i64) -> Option<&[Detection]> {
        self.entries.get(&frame_index).map(Vec::as_slice)
    }

    pub fn contains(&self, frame_index: i64) -> bool {
        self.entries.contains_key(&frame_index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct ResultReconciler {
    cache: Mutex<ResultCache>,
    displayed: Mutex<Option<i64>>,
    mode: AtomicU8,
    sink: Arc<dyn OverlaySink>,
}

impl ResultReconciler {
    pub fn new(mode: RateMode, cache_capacity: usize, sink: Arc<dyn OverlaySink>) -> Self {
        Self {
            cache: Mutex::new(ResultCache::new(cache_capacity)),
            displayed: Mutex::new(None),
            mode: AtomicU8::new(mode.as_u8()),
            sink,
        }
    }

    pub fn mode(&self) -> RateMode {
        RateMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: RateMode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }

    /// 推理线程投递结果
    pub fn on_result(&self, result: DetectionResult) {
        let DetectionResult {
            frame_index,
            detections,
            ..
        } = result;

        match self.mode() {
            RateMode::Continuous => self.sink.present_detections(frame_index, &detections),
            RateMode::Timed => {
                self.cache.lock().insert(frame_index, detections.clone());
                // 先入缓存再比对: 与 on_frame_displayed 交错时至少一方会绘制.
                // 绘制期间持有 displayed 锁, 显示帧不会在比对之后被切换
                let displayed = self.displayed.lock();
                if *displayed == Some(frame_index) {
                    self.sink.present_detections(frame_index, &detections);
                } else {
                    log::trace!("结果 {} 已缓存 (当前显示 {:?})", frame_index, *displayed);
                }
            }
        }
    }

    /// UI 每显示一帧调用一次
    pub fn on_frame_displayed(&self, frame_index: i64) {
        let mut displayed = self.displayed.lock();
        *displayed = Some(frame_index);
        if self.mode() != RateMode::Timed {
            return;
        }

        // 锁顺序: displayed → cache
        let cached = self.cache.lock().get(frame_index).map(<[Detection]>::to_vec);
        match cached {
            Some(detections) => self.sink.present_detections(frame_index, &detections),
            None => self.sink.present_detections(frame_index, &[]),
        }
        drop(displayed);
    }

    pub fn displayed_frame(&self) -> Option<i64> {
        *self.displayed.lock()
    }

    /// 清空缓存 (切换模式/打开新视频)
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_cached(&self, frame_index: i64) -> bool {
        self.cache.lock().contains(frame_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    /// 记录每次绘制: (帧序号, 框数)
    #[derive(Default)]
    struct Recorder {
        drawn: Mutex<Vec<(i64, usize)>>,
    }

    impl OverlaySink for Recorder {
        fn present_detections(&self, frame_index: i64, detections: &[Detection]) {
            self.drawn.lock().push((frame_index, detections.len()));
        }
    }

    fn dets(n: usize) -> Vec<Detection> {
        (0..n)
            .map(|i| Detection::new(BBox::new(i as f32, 0.0, 4.0, 4.0), 0.8, i))
            .collect()
    }

    fn result(frame_index: i64, n: usize, mode: RateMode) -> DetectionResult {
        DetectionResult::new(frame_index, dets(n), mode)
    }

    fn reconciler(mode: RateMode, capacity: usize) -> (ResultReconciler, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        (ResultReconciler::new(mode, capacity, rec.clone()), rec)
    }

    #[test]
    fn cache_overwrites_and_evicts_oldest() {
        let mut cache = ResultCache::new(3);
        cache.insert(1, dets(1));
        cache.insert(2, dets(2));
        cache.insert(1, dets(5));
        cache.insert(3, dets(3));
        cache.insert(4, dets(4));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(2));
        assert_eq!(cache.get(1).map(<[Detection]>::len), Some(5));
        assert!(cache.contains(3) && cache.contains(4));
    }

    #[test]
    fn stale_result_never_replaces_newer_frame() {
        let (rc, rec) = reconciler(RateMode::Timed, 100);
        rc.on_result(result(5, 2, RateMode::Timed));

        rc.on_frame_displayed(5);
        rc.on_frame_displayed(6);
        rc.on_frame_displayed(7);
        // 第 6 帧的结果在第 7 帧显示后才到
        rc.on_result(result(6, 3, RateMode::Timed));

        assert_eq!(*rec.drawn.lock(), vec![(5, 2), (6, 0), (7, 0)]);
        assert!(rc.is_cached(6));
        assert_eq!(rc.displayed_frame(), Some(7));
    }

    #[test]
    fn late_result_for_displayed_frame_is_drawn() {
        let (rc, rec) = reconciler(RateMode::Timed, 100);
        rc.on_frame_displayed(3);
        rc.on_result(result(3, 1, RateMode::Timed));

        assert_eq!(*rec.drawn.lock(), vec![(3, 0), (3, 1)]);
    }

    #[test]
    fn empty_result_clears_current_overlay() {
        let (rc, rec) = reconciler(RateMode::Timed, 100);
        rc.on_frame_displayed(9);
        rc.on_result(result(9, 4, RateMode::Timed));
        rc.on_result(result(9, 0, RateMode::Timed));

        assert_eq!(rec.drawn.lock().last(), Some(&(9, 0)));
        // 回看该帧时使用覆盖后的空结果
        rc.on_frame_displayed(9);
        assert_eq!(rec.drawn.lock().last(), Some(&(9, 0)));
    }

    #[test]
    fn continuous_mode_draws_immediately_without_caching() {
        let (rc, rec) = reconciler(RateMode::Continuous, 100);
        rc.on_frame_displayed(10);
        rc.on_result(result(4, 1, RateMode::Continuous));
        rc.on_result(result(12, 0, RateMode::Continuous));

        assert_eq!(*rec.drawn.lock(), vec![(4, 1), (12, 0)]);
        assert_eq!(rc.cached_len(), 0);
    }

    /// 绘制非空结果时耗时 100ms
    #[derive(Default)]
    struct SlowRecorder {
        inner: Recorder,
    }

    impl OverlaySink for SlowRecorder {
        fn present_detections(&self, frame_index: i64, detections: &[Detection]) {
            if !detections.is_empty() {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            self.inner.present_detections(frame_index, detections);
        }
    }

    #[test]
    fn frame_switch_during_slow_draw_keeps_newest_overlay() {
        let rec = Arc::new(SlowRecorder::default());
        let rc = Arc::new(ResultReconciler::new(RateMode::Timed, 100, rec.clone()));
        rc.on_frame_displayed(6);

        let drawing = {
            let rc = rc.clone();
            std::thread::spawn(move || rc.on_result(result(6, 1, RateMode::Timed)))
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        rc.on_frame_displayed(7);
        drawing.join().unwrap();

        // 无论线程如何交错, 最后一次绘制都属于第 7 帧
        let drawn = rec.inner.drawn.lock();
        assert_eq!(drawn.last(), Some(&(7, 0)));
        assert_eq!(drawn.iter().filter(|(i, _)| *i == 7).count(), 1);
        assert_eq!(rc.displayed_frame(), Some(7));
    }

    #[test]
    fn clear_drops_cached_results() {
        let (rc, rec) = reconciler(RateMode::Timed, 100);
        rc.on_result(result(1, 2, RateMode::Timed));
        rc.clear();
        rc.on_frame_displayed(1);

        assert_eq!(rc.cached_len(), 0);
        assert_eq!(*rec.drawn.lock(), vec![(1, 0)]);
    }
}
