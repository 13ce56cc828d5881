//! 迭代器源驱动：把一个可重复迭代的源转换为发布者，按需求驱动快/慢两条路径。
//!
//! # 设计背景（Why）
//! Java 迭代器协议里 `hasNext()`/`next()` 是两个独立调用，允许出现"`hasNext()` 返回真之后 `next()`
//! 返回空值"的协议违规。Rust 的 [`Iterator::next`] 把这两步融合成一次 `Option<T>` 调用，`None`
//! 本身就无歧义地代表"没有更多元素"，因此结构上不存在对应的竞态。为了不丢失 spec 要求保留的"空值是
//! 协议违规"这条边界情形，本驱动要求源产出 `Option<T>`（而不是直接 `T`）：外层 `None` 表示迭代器
//! 耗尽（映射为正常完成），内层 `Some(None)` 才是"本应有值却给了空"的协议违规（映射为 `on_error`）。
//!
//! # 逻辑解析（How）
//! - 订阅时立刻探测一次（通过 `Peekable::peek`）：如果源从一开始就没有元素，直接投递 `on_complete`，
//!   不建立 `Subscription`（对应"complete-without-subscription"的边界情形）。
//! - 第一次把需求计数器从零拨到正的线程，依据它自己传入的 `n` 是否恰好等于
//!   [`DemandCounter::UNBOUNDED`] 来决定走快路径还是慢路径；这个决定只做一次。
//! - 快路径：不做预算记账，一直拉取直到耗尽或取消。
//! - 慢路径：维护一个本地已发射计数 `e`，每次发射后用 `Peekable::peek` 探测是否已到末尾——如果到了
//!   末尾就立即完成，不等待 `e` 追上已读取的需求快照；否则在 `e` 追上需求快照时，原子地从需求计数器
//!   扣除 `e`，如果扣除后为零则释放发射租约并返回，否则重新读取需求计数器继续消费（从而拾取并发到达
//!   的新增需求）。
use crate::reactive::demand::DemandCounter;
use crate::reactive::fusion::{null_element_error, QueueSubscription};
use crate::reactive::introspection::{DemandValue, Introspectable};
use crate::reactive::subscriber::Subscriber;
use crate::reactive::subscription::Subscription;
use crate::reactive::publisher::Publisher;
use alloc::sync::Arc;
use core::iter::Peekable;
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// 把任意可克隆、可重复迭代的源包装为 [`Publisher`]。每次 `subscribe` 都会对源重新调用
/// `clone().into_iter()`，对应 Java `Iterable::iterator()` 每次订阅都重新取一个迭代器的惯例。
pub struct IteratorPublisher<S> {
    source: S,
}

impl<S> IteratorPublisher<S>
where
    S: Clone,
    S::IntoIter: Iterator,
    S: IntoIterator,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

/// 从普通值序列构造：每个值自动包装为 `Some(v)`，因此不会触发空值协议违规路径。
pub fn from_values<T, I>(values: I) -> IteratorPublisher<alloc::vec::Vec<Option<T>>>
where
    I: IntoIterator<Item = T>,
{
    IteratorPublisher::new(values.into_iter().map(Some).collect())
}

impl<S, T> Publisher<T> for IteratorPublisher<S>
where
    S: Clone + IntoIterator<Item = Option<T>>,
    S::IntoIter: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let mut iter = self.source.clone().into_iter().peekable();
        if iter.peek().is_none() {
            subscriber.on_complete();
            return;
        }
        let subscription: Arc<SynchronousSubscription<T, S::IntoIter>> =
            Arc::new(SynchronousSubscription::new(iter, subscriber.clone()));
        subscriber.on_subscribe(subscription);
    }
}

/// 驱动状态机：一个订阅恰好对应一个迭代器实例与一个需求计数器。
pub struct SynchronousSubscription<T, I: Iterator<Item = Option<T>>> {
    iter: Mutex<Peekable<I>>,
    demand: DemandCounter,
    subscriber: Arc<dyn Subscriber<T>>,
    cancelled: AtomicBool,
    terminal: AtomicBool,
    /// A protocol error raised off the emission lease (e.g. from `request`), waiting for
    /// whichever thread next holds the lease to deliver it at a signal boundary.
    pending_error: Mutex<Option<crate::error::SparkError>>,
}

impl<T, I> SynchronousSubscription<T, I>
where
    I: Iterator<Item = Option<T>>,
{
    fn new(iter: Peekable<I>, subscriber: Arc<dyn Subscriber<T>>) -> Self {
        Self {
            iter: Mutex::new(iter),
            demand: DemandCounter::new(),
            subscriber,
            cancelled: AtomicBool::new(false),
            terminal: AtomicBool::new(false),
            pending_error: Mutex::new(None),
        }
    }

    fn is_halted(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.terminal.load(Ordering::Acquire)
    }

    /// Signal-boundary gate used inside the drive loops: besides the plain halted check, this
    /// delivers a pending asynchronous protocol error if one is waiting, so it only ever goes
    /// out through a thread that currently holds the emission lease.
    fn should_halt(&self) -> bool {
        if self.terminal.load(Ordering::Acquire) {
            return true;
        }
        if let Some(error) = self.pending_error.lock().take() {
            self.fail(error);
            return true;
        }
        self.cancelled.load(Ordering::Acquire)
    }

    fn complete(&self) {
        if !self.terminal.swap(true, Ordering::AcqRel) {
            self.subscriber.on_complete();
        }
    }

    fn fail(&self, error: crate::error::SparkError) {
        if !self.terminal.swap(true, Ordering::AcqRel) {
            self.subscriber.on_error(error);
        }
    }

    /// Queues the non-positive-`n` protocol violation for delivery via the emission lease
    /// instead of calling `on_error` inline, so it can never race a concurrent `on_next`.
    fn fail_protocol_request(&self, n: i64) {
        let error = crate::error::SparkError::protocol(
            crate::error::codes::PROTOCOL_NON_POSITIVE_REQUEST,
            alloc::format!("request({n}) violates the positive-n invariant"),
        );
        *self.pending_error.lock() = Some(error);
        // Reuse the same zero-to-positive transition real demand uses to acquire the lease.
        // If nobody else holds it, we become the holder and deliver at the first boundary
        // check; if somebody does, they'll observe `pending_error` at their next boundary.
        if self.demand.add(1) == 0 {
            self.drive_slow();
        }
    }

    fn drive(&self, fast: bool) {
        if fast {
            self.drive_fast();
        } else {
            self.drive_slow();
        }
    }

    fn drive_fast(&self) {
        loop {
            if self.should_halt() {
                return;
            }
            let item = self.iter.lock().next();
            if self.should_halt() {
                return;
            }
            match item {
                None => {
                    self.complete();
                    return;
                }
                Some(None) => {
                    self.fail(null_element_error());
                    return;
                }
                Some(Some(value)) => {
                    self.subscriber.on_next(value);
                    if self.should_halt() {
                        return;
                    }
                }
            }
        }
    }

    fn drive_slow(&self) {
        let mut emitted: u64 = 0;
        loop {
            let budget = self.demand.load();
            while emitted != budget {
                if self.should_halt() {
                    return;
                }
                let item = self.iter.lock().next();
                if self.should_halt() {
                    return;
                }
                let value = match item {
                    None => {
                        self.complete();
                        return;
                    }
                    Some(None) => {
                        self.fail(null_element_error());
                        return;
                    }
                    Some(Some(v)) => v,
                };
                let exhausted = self.iter.lock().peek().is_none();
                if self.should_halt() {
                    return;
                }
                self.subscriber.on_next(value);
                if self.should_halt() {
                    return;
                }
                if exhausted {
                    self.complete();
                    return;
                }
                emitted += 1;
            }
            let remaining = self.demand.produced(emitted);
            emitted = 0;
            if remaining == 0 {
                return;
            }
        }
    }
}

impl<T, I> Subscription for SynchronousSubscription<T, I>
where
    T: Send + Sync + 'static,
    I: Iterator<Item = Option<T>> + Send + Sync + 'static,
{
    fn request(&self, n: i64) {
        if self.is_halted() {
            return;
        }
        match DemandCounter::validate(n) {
            Err(()) => self.fail_protocol_request(n),
            Ok(amount) => {
                let prev = self.demand.add(amount);
                if prev == 0 {
                    self.drive(amount == DemandCounter::UNBOUNDED);
                }
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl<T, I> Introspectable for SynchronousSubscription<T, I>
where
    T: Send + Sync + 'static,
    I: Iterator<Item = Option<T>> + Send + Sync + 'static,
{
    fn scan_origin(&self) -> Option<&str> {
        Some("iteratorSource")
    }

    fn scan_requested(&self) -> Option<DemandValue> {
        let v = self.demand.load();
        Some(if v == DemandCounter::UNBOUNDED {
            DemandValue::Unbounded
        } else {
            DemandValue::Exact(v)
        })
    }

    fn scan_active(&self) -> Option<bool> {
        Some(!self.is_halted())
    }

    fn scan_terminated(&self) -> Option<bool> {
        Some(self.terminal.load(Ordering::Acquire))
    }

    fn scan_cancelled(&self) -> Option<bool> {
        Some(self.cancelled.load(Ordering::Acquire))
    }
}

impl<T, I> QueueSubscription<T> for SynchronousSubscription<T, I>
where
    T: Clone + Send + Sync + 'static,
    I: Iterator<Item = Option<T>> + Send + Sync + 'static,
{
    fn fusion_is_empty(&self) -> bool {
        self.iter.lock().peek().is_none()
    }

    fn fusion_peek(&self) -> Result<Option<T>, crate::error::SparkError> {
        match self.iter.lock().peek() {
            None => Ok(None),
            Some(None) => Err(null_element_error()),
            Some(Some(v)) => Ok(Some(v.clone())),
        }
    }

    fn fusion_poll(&self) -> Result<Option<T>, crate::error::SparkError> {
        match self.iter.lock().next() {
            None => Ok(None),
            Some(None) => Err(null_element_error()),
            Some(Some(v)) => Ok(Some(v)),
        }
    }

    fn fusion_drop(&self) {
        let _ = self.iter.lock().next();
    }

    fn fusion_clear(&self) {}

    fn fusion_size(&self) -> usize {
        usize::from(!self.fusion_is_empty())
    }
}
