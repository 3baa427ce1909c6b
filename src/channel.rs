/// 有界帧队列 (Bounded frame channel)
///
/// 单生产者 → 单消费者, 一把互斥锁 + 一个条件变量:
/// - 满时由生产者选择: 拒绝 或 丢弃最旧的一帧
/// - shutdown 后拒绝写入, 已入队的帧仍可取完
/// - reset 清空并重新开放, 用于重启会话
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

use crate::types::Frame;

/// 解码 → 推理 / 推理 → 显示 使用的帧队列
pub type FrameChannel = BoundedChannel<Frame>;

struct Inner<T> {
    queue: VecDeque<T>,
    capacity: usize, // 0 = 不限
    shutdown: bool,
}

impl<T> Inner<T> {
    fn is_full(&self) -> bool {
        self.capacity > 0 && self.queue.len() >= self.capacity
    }
}

pub struct BoundedChannel<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

impl<T> BoundedChannel<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                capacity,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// 入队. 已关闭或 (已满且不允许丢弃) 时返回 false
    pub fn push(&self, item: T, drop_oldest_if_full: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return false;
        }
        if inner.is_full() {
            if !drop_oldest_if_full {
                return false;
            }
            inner.queue.pop_front();
        }
        inner.queue.push_back(item);
        drop(inner);
        self.cond.notify_one();
        true
    }

    /// 阻塞直到有数据; 仅在已关闭且队列为空时返回 None
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        self.cond
            .wait_while(&mut inner, |inner| inner.queue.is_empty() && !inner.shutdown);
        inner.queue.pop_front()
    }

    /// 非阻塞
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().queue.pop_front()
    }

    /// 最多等待 `timeout`; 超时、关闭且为空、或被虚假唤醒时返回 None
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut inner = self.inner.lock();
        self.cond.wait_while_for(
            &mut inner,
            |inner| inner.queue.is_empty() && !inner.shutdown,
            timeout,
        );
        inner.queue.pop_front()
    }

    /// 标记关闭并唤醒所有等待者
    pub fn shutdown(&self) {
        self.inner.lock().shutdown = true;
        self.cond.notify_all();
    }

    /// 清除关闭标记并清空队列
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.shutdown = false;
    }

    /// 0 = 不限; 新容量小于当前长度时立即丢弃最旧的帧
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = capacity;
        if capacity > 0 {
            while inner.queue.len() > capacity {
                inner.queue.pop_front();
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }
}

impl<T> Default for BoundedChannel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
