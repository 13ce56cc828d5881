//! 定时 Interval 源：按固定周期重复触发，每个 tick 独立核验需求，需求不足即上报"缺失背压"。
//!
//! # 契约说明（What）
//! 负初始延迟按惯例等同于使用 `period` 本身作为首次延迟——这一规整化在发布者构造时完成，定时器
//! 协作者接口本身只认识非负的 `Duration`，不需要知道这条语义糖。
use crate::error::{codes, SparkError};
use crate::reactive::demand::DemandCounter;
use crate::reactive::introspection::{DemandValue, Introspectable};
use crate::reactive::publisher::Publisher;
use crate::reactive::subscriber::Subscriber;
use crate::reactive::subscription::Subscription;
use crate::time::{TimerDriver, TimerTaskHandle};
use alloc::sync::Arc;
use core::time::Duration;
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::Mutex;

pub struct TimerIntervalPublisher<D: TimerDriver> {
    initial_delay: Duration,
    period: Duration,
    driver: Arc<D>,
}

impl<D: TimerDriver> TimerIntervalPublisher<D> {
    /// `initial_delay` of `None` means "use `period` as the first delay too", matching the
    /// conventional negative-initial-delay sentinel from the source protocol.
    pub fn new(initial_delay: Option<Duration>, period: Duration, driver: Arc<D>) -> Self {
        Self {
            initial_delay: initial_delay.unwrap_or(period),
            period,
            driver,
        }
    }
}

impl<D: TimerDriver + 'static> Publisher<u64> for TimerIntervalPublisher<D> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<u64>>) {
        let subscription = Arc::new(TimedPeriodicSubscription::new(subscriber.clone(), self.period));
        subscriber.on_subscribe(subscription.clone());

        let fire_target = subscription.clone();
        let handle = self.driver.schedule_periodic(
            self.initial_delay,
            self.period,
            Arc::new(move || fire_target.fire()),
        );
        subscription.attach_registration(handle);
    }
}

struct TimedPeriodicSubscription {
    demand: DemandCounter,
    subscriber: Arc<dyn Subscriber<u64>>,
    tick: AtomicU64,
    period: Duration,
    cancelled: AtomicBool,
    terminal: AtomicBool,
    registration: Mutex<Option<TimerTaskHandle>>,
}

impl TimedPeriodicSubscription {
    fn new(subscriber: Arc<dyn Subscriber<u64>>, period: Duration) -> Self {
        Self {
            demand: DemandCounter::new(),
            subscriber,
            tick: AtomicU64::new(0),
            period,
            cancelled: AtomicBool::new(false),
            terminal: AtomicBool::new(false),
            registration: Mutex::new(None),
        }
    }

    fn attach_registration(&self, handle: TimerTaskHandle) {
        if self.cancelled.load(Ordering::Acquire) {
            handle.cancel();
        }
        *self.registration.lock() = Some(handle);
    }

    fn is_halted(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.terminal.load(Ordering::Acquire)
    }

    fn fire(&self) {
        if self.is_halted() {
            return;
        }
        if !self.demand.try_take() {
            self.fail(SparkError::protocol(
                codes::PROTOCOL_MISSING_BACKPRESSURE,
                "periodic source ticked with no outstanding demand",
            ));
            return;
        }
        let index = self.tick.fetch_add(1, Ordering::AcqRel);
        if self.is_halted() {
            return;
        }
        self.subscriber.on_next(index);
    }

    fn fail(&self, error: SparkError) {
        if self.terminal.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.registration.lock().as_ref() {
            handle.cancel();
        }
        self.subscriber.on_error(error);
    }
}

impl Subscription for TimedPeriodicSubscription {
    fn request(&self, n: i64) {
        if self.is_halted() {
            return;
        }
        match DemandCounter::validate(n) {
            Err(()) => {
                self.cancelled.store(true, Ordering::Release);
                self.fail_direct(SparkError::protocol(
                    codes::PROTOCOL_NON_POSITIVE_REQUEST,
                    alloc::format!("request({n}) violates the positive-n invariant"),
                ));
            }
            Ok(amount) => {
                self.demand.add(amount);
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.registration.lock().as_ref() {
            handle.cancel();
        }
    }
}

impl TimedPeriodicSubscription {
    fn fail_direct(&self, error: SparkError) {
        if let Some(handle) = self.registration.lock().as_ref() {
            handle.cancel();
        }
        if !self.terminal.swap(true, Ordering::AcqRel) {
            self.subscriber.on_error(error);
        }
    }
}

impl Introspectable for TimedPeriodicSubscription {
    fn scan_origin(&self) -> Option<&str> {
        Some("timerIntervalSource")
    }

    fn scan_period(&self) -> Option<Duration> {
        Some(self.period)
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
