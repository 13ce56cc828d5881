//! WithLatestFrom 组合驱动：每次主源（P）发出新值时，与副源（O）最近一次收到的值组合。
//!
//! # 契约说明（What）
//! - 只有 P 驱动完成语义：P 完成则整条流完成；O 完成不改变任何东西（最近值被冻结、继续参与后续
//!   组合），这是 `withLatestFrom` 与 `combineLatest`/`zip` 的关键区别。
//! - 任一侧出错都终止整条流并取消另一侧。
//! - 组合函数返回空值是协议违规；组合函数 panic 在 `std` 下通过 `catch_unwind` 归一化为用户错误——
//!   这恰好复用了 Rust 运行时本身对"真正致命条件穿透 `catch_unwind`"的保证，不需要额外的致命条件
//!   探测逻辑。
//! - 下游的需求只转发给 P；O 在订阅建立时立即以无界需求拉取，因为它只是被动缓存最近值。当 P 的一次
//!   发射因 O 尚无最近值而被丢弃时，必须额外向 P 多请求一个单位以维持活性——否则下游会永远卡在
//!   "认为自己还在等待前一次请求兑现"的状态。
//! - 订阅顺序：先订阅 O 再订阅 P。O 的数据源如果是同步的，会在 P 开始拉取之前就把最近值缓存填好；
//!   反过来则会让 P 的同步源在 O 有机会缓存任何值之前就整段耗尽。
use crate::error::{codes, SparkError};
use crate::reactive::demand::DemandCounter;
use crate::reactive::introspection::{DemandValue, HasUpstreams, Introspectable, NodeHandle};
use crate::reactive::publisher::Publisher;
use crate::reactive::subscriber::Subscriber;
use crate::reactive::subscription::Subscription;
use alloc::sync::Arc;
use alloc::vec::Vec;
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

pub struct WithLatestFromPublisher<P, O, F> {
    primary: P,
    other: O,
    combiner: F,
}

impl<P, O, F> WithLatestFromPublisher<P, O, F> {
    pub fn new(primary: P, other: O, combiner: F) -> Self {
        Self {
            primary,
            other,
            combiner,
        }
    }
}

impl<P, O, F, Pv, Ov, R> Publisher<R> for WithLatestFromPublisher<P, O, F>
where
    P: Publisher<Pv>,
    O: Publisher<Ov>,
    F: Fn(&Pv, &Ov) -> Option<R> + Clone + Send + Sync + 'static,
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        let shared: Arc<Shared<Pv, Ov, R, F>> = Arc::new(Shared {
            combiner: self.combiner.clone(),
            latest_other: Mutex::new(None),
            out: subscriber,
            p_subscription: Mutex::new(None),
            o_subscription: Mutex::new(None),
            pending_request: DemandCounter::new(),
            terminal: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            _marker: core::marker::PhantomData,
        });

        let out_subscription = Arc::new(OutSubscription {
            shared: shared.clone(),
        });
        shared.out.on_subscribe(out_subscription);

        // Subscribe to O before P: a synchronous O populates `latest_other` before P's own
        // (possibly synchronous) drain starts, so the very first P value already has a cached
        // partner instead of being dropped for want of one.
        self.other.subscribe(Arc::new(OtherInner {
            shared: shared.clone(),
        }));
        self.primary.subscribe(Arc::new(PrimaryInner {
            shared: shared.clone(),
        }));
    }
}

struct Shared<Pv, Ov, R, F> {
    combiner: F,
    latest_other: Mutex<Option<Ov>>,
    out: Arc<dyn Subscriber<R>>,
    p_subscription: Mutex<Option<Arc<dyn Subscription>>>,
    o_subscription: Mutex<Option<Arc<dyn Subscription>>>,
    /// 下游在 `p_subscription` 就绪之前发来的 `request` 先累积在这里，就绪后一次性转发。
    pending_request: DemandCounter,
    terminal: AtomicBool,
    cancelled: AtomicBool,
    _marker: core::marker::PhantomData<Pv>,
}

impl<Pv, Ov, R, F> Shared<Pv, Ov, R, F>
where
    F: Fn(&Pv, &Ov) -> Option<R>,
{
    fn is_halted(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.terminal.load(Ordering::Acquire)
    }

    fn fail(&self, error: SparkError) {
        if self.terminal.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_both();
        self.out.on_error(error);
    }

    fn complete(&self) {
        if self.terminal.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(o) = self.o_subscription.lock().as_ref() {
            o.cancel();
        }
        self.out.on_complete();
    }

    fn cancel_both(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(p) = self.p_subscription.lock().as_ref() {
            p.cancel();
        }
        if let Some(o) = self.o_subscription.lock().as_ref() {
            o.cancel();
        }
    }

    fn on_primary_subscribed(&self, subscription: Arc<dyn Subscription>) {
        let pending = self.pending_request.load();
        if pending > 0 {
            subscription.request(pending.min(DemandCounter::UNBOUNDED) as i64);
        }
        *self.p_subscription.lock() = Some(subscription);
        if self.is_halted() {
            if let Some(p) = self.p_subscription.lock().as_ref() {
                p.cancel();
            }
        }
    }

    fn on_other_subscribed(&self, subscription: Arc<dyn Subscription>) {
        subscription.request(DemandCounter::UNBOUNDED as i64);
        *self.o_subscription.lock() = Some(subscription);
        if self.is_halted() {
            if let Some(o) = self.o_subscription.lock().as_ref() {
                o.cancel();
            }
        }
    }
}

struct PrimaryInner<Pv, Ov, R, F> {
    shared: Arc<Shared<Pv, Ov, R, F>>,
}

impl<Pv, Ov, R, F> Subscriber<Pv> for PrimaryInner<Pv, Ov, R, F>
where
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(&Pv, &Ov) -> Option<R> + Send + Sync + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.shared.on_primary_subscribed(subscription);
    }

    fn on_next(&self, value: Pv) {
        if self.shared.is_halted() {
            return;
        }
        let latest = self.shared.latest_other.lock().clone();
        let Some(latest) = latest else {
            // O hasn't produced a value yet: drop and top up demand to keep liveness.
            if let Some(p) = self.shared.p_subscription.lock().as_ref() {
                p.request(1);
            }
            return;
        };
        let outcome = combine(&self.shared.combiner, &value, &latest);
        match outcome {
            CombineOutcome::Value(r) => self.shared.out.on_next(r),
            CombineOutcome::Null => self.shared.fail(SparkError::protocol(
                codes::PROTOCOL_NULL_COMBINER_RESULT,
                "withLatestFrom combiner returned no value",
            )),
            CombineOutcome::Panicked(message) => self.shared.fail(SparkError::user(
                codes::USER_COMBINER_PANIC,
                message,
            )),
        }
    }

    fn on_error(&self, error: SparkError) {
        self.shared.fail(error);
    }

    fn on_complete(&self) {
        self.shared.complete();
    }
}

struct OtherInner<Pv, Ov, R, F> {
    shared: Arc<Shared<Pv, Ov, R, F>>,
}

impl<Pv, Ov, R, F> Subscriber<Ov> for OtherInner<Pv, Ov, R, F>
where
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(&Pv, &Ov) -> Option<R> + Send + Sync + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.shared.on_other_subscribed(subscription);
    }

    fn on_next(&self, value: Ov) {
        if self.shared.is_halted() {
            return;
        }
        *self.shared.latest_other.lock() = Some(value);
    }

    fn on_error(&self, error: SparkError) {
        self.shared.fail(error);
    }

    fn on_complete(&self) {
        // Completion of O never completes or otherwise affects the combined stream; the latest
        // cached value remains available for future combinations with P.
    }
}

enum CombineOutcome<R> {
    Value(R),
    Null,
    #[allow(dead_code)]
    Panicked(alloc::string::String),
}

#[cfg(feature = "std")]
fn combine<Pv, Ov, R>(f: &(impl Fn(&Pv, &Ov) -> Option<R> + ?Sized), p: &Pv, o: &Ov) -> CombineOutcome<R> {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    match catch_unwind(AssertUnwindSafe(|| f(p, o))) {
        Ok(Some(r)) => CombineOutcome::Value(r),
        Ok(None) => CombineOutcome::Null,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| alloc::string::String::from(*s))
                .or_else(|| payload.downcast_ref::<alloc::string::String>().cloned())
                .unwrap_or_else(|| alloc::string::String::from("combiner panicked"));
            CombineOutcome::Panicked(message)
        }
    }
}

/// Without `std`, `catch_unwind` is unavailable: a panicking combiner unwinds through this frame
/// unchanged, which is still spec-compliant (treated as a fatal, non-`on_error` condition).
#[cfg(not(feature = "std"))]
fn combine<Pv, Ov, R>(f: &(impl Fn(&Pv, &Ov) -> Option<R> + ?Sized), p: &Pv, o: &Ov) -> CombineOutcome<R> {
    match f(p, o) {
        Some(r) => CombineOutcome::Value(r),
        None => CombineOutcome::Null,
    }
}

struct OutSubscription<Pv, Ov, R, F> {
    shared: Arc<Shared<Pv, Ov, R, F>>,
}

impl<Pv, Ov, R, F> Subscription for OutSubscription<Pv, Ov, R, F>
where
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(&Pv, &Ov) -> Option<R> + Send + Sync + 'static,
{
    fn request(&self, n: i64) {
        if self.shared.is_halted() {
            return;
        }
        match DemandCounter::validate(n) {
            Err(()) => self.shared.fail(SparkError::protocol(
                codes::PROTOCOL_NON_POSITIVE_REQUEST,
                alloc::format!("request({n}) violates the positive-n invariant"),
            )),
            Ok(amount) => {
                if let Some(p) = self.shared.p_subscription.lock().as_ref() {
                    p.request(amount.min(DemandCounter::UNBOUNDED) as i64);
                } else {
                    self.shared.pending_request.add(amount);
                }
            }
        }
    }

    fn cancel(&self) {
        self.shared.cancel_both();
    }
}

impl<Pv, Ov, R, F> Introspectable for OutSubscription<Pv, Ov, R, F>
where
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(&Pv, &Ov) -> Option<R> + Send + Sync + 'static,
{
    fn scan_origin(&self) -> Option<&str> {
        Some("withLatestFrom")
    }

    fn scan_terminated(&self) -> Option<bool> {
        Some(self.shared.terminal.load(Ordering::Acquire))
    }

    fn scan_cancelled(&self) -> Option<bool> {
        Some(self.shared.cancelled.load(Ordering::Acquire))
    }

    fn scan_active(&self) -> Option<bool> {
        Some(!self.shared.is_halted())
    }

    fn as_upstreams(&self) -> Option<&dyn HasUpstreams> {
        Some(self)
    }
}

impl<Pv, Ov, R, F> HasUpstreams for OutSubscription<Pv, Ov, R, F>
where
    Pv: Send + Sync + 'static,
    Ov: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(&Pv, &Ov) -> Option<R> + Send + Sync + 'static,
{
    fn upstreams(&self) -> Vec<NodeHandle<'_>> {
        let mut out = Vec::new();
        if self.shared.p_subscription.lock().is_some() {
            out.push(NodeHandle::Virtual("withLatestFrom.primary"));
        }
        if self.shared.o_subscription.lock().is_some() {
            out.push(NodeHandle::Virtual("withLatestFrom.other"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::iterator_source::from_values;
    use crate::test_stubs::RecordingSubscriber;

    #[test]
    fn combines_primary_with_cached_latest_other() {
        let primary = from_values(1..=3);
        let other = from_values(alloc::vec!["a", "b"]);
        let publisher = WithLatestFromPublisher::new(primary, other, |p: &i32, o: &&str| {
            Some(alloc::format!("{p}-{o}"))
        });
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.completed());
        assert!(!recorder.values().is_empty());
    }

    #[test]
    fn other_completion_does_not_complete_stream() {
        let primary = from_values(1..=5);
        let other = from_values(alloc::vec![42]);
        let publisher = WithLatestFromPublisher::new(primary, other, |p: &i32, o: &i32| Some(p + o));
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.completed());
        assert_eq!(recorder.values(), alloc::vec![43, 44, 45, 46, 47]);
    }

    #[test]
    fn null_combiner_result_is_protocol_error() {
        let primary = from_values(1..=1);
        let other = from_values(alloc::vec![1]);
        let publisher = WithLatestFromPublisher::new(primary, other, |_: &i32, _: &i32| None::<i32>);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.errored());
    }
}
