//! 定时 Single 源：延迟一次性触发，投递恰好一个值随后完成。
//!
//! # 设计背景（Why）
//! spec 把"定时触发是否等待需求"列为未决问题；这里采用"总是按时触发，如果此时没有可用需求则上报
//! 协议错误"的解法——定时器不应该因为下游迟迟不 `request` 而永远悬挂，迟到的需求应该被当成调用方的
//! 缺陷对待，而不是让源静默地拖延计时语义。该决定记录在设计台账中。
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
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

pub struct TimerSinglePublisher<D: TimerDriver> {
    delay: Duration,
    driver: Arc<D>,
}

impl<D: TimerDriver> TimerSinglePublisher<D> {
    pub fn new(delay: Duration, driver: Arc<D>) -> Self {
        Self { delay, driver }
    }
}

impl<D: TimerDriver + 'static> Publisher<u64> for TimerSinglePublisher<D> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<u64>>) {
        let subscription = Arc::new(TimedSingleSubscription::new(subscriber.clone()));
        subscriber.on_subscribe(subscription.clone());

        let fire_target = subscription.clone();
        let handle = self
            .driver
            .schedule_once(self.delay, Arc::new(move || fire_target.fire()));
        subscription.attach_registration(handle);
    }
}

struct TimedSingleSubscription {
    demand: DemandCounter,
    subscriber: Arc<dyn Subscriber<u64>>,
    cancelled: AtomicBool,
    terminal: AtomicBool,
    registration: Mutex<Option<TimerTaskHandle>>,
}

impl TimedSingleSubscription {
    fn new(subscriber: Arc<dyn Subscriber<u64>>) -> Self {
        Self {
            demand: DemandCounter::new(),
            subscriber,
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
                codes::PROTOCOL_TIMED_SINGLE_NO_DEMAND,
                "timed single source fired with no outstanding demand",
            ));
            return;
        }
        if self.terminal.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscriber.on_next(0);
        self.subscriber.on_complete();
    }

    fn fail(&self, error: SparkError) {
        if !self.terminal.swap(true, Ordering::AcqRel) {
            self.subscriber.on_error(error);
        }
    }
}

impl Subscription for TimedSingleSubscription {
    fn request(&self, n: i64) {
        if self.is_halted() {
            return;
        }
        match DemandCounter::validate(n) {
            Err(()) => {
                self.cancelled.store(true, Ordering::Release);
                self.fail(SparkError::protocol(
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

impl Introspectable for TimedSingleSubscription {
    fn scan_origin(&self) -> Option<&str> {
        Some("timerSingleSource")
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::RecordingSubscriber;
    use crate::time::ManualTimerDriver;

    #[test]
    fn fires_single_value_then_completes_when_demand_present() {
        let driver = Arc::new(ManualTimerDriver::new());
        let publisher = TimerSinglePublisher::new(Duration::from_secs(1), driver.clone());
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(1);
        driver.advance(Duration::from_secs(1));
        assert_eq!(recorder.values(), alloc::vec![0]);
        assert!(recorder.completed());
    }

    #[test]
    fn fires_without_demand_is_protocol_error() {
        let driver = Arc::new(ManualTimerDriver::new());
        let publisher = TimerSinglePublisher::new(Duration::from_secs(1), driver.clone());
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        driver.advance(Duration::from_secs(1));
        assert!(recorder.errored());
        assert!(recorder.values().is_empty());
    }

    #[test]
    fn cancel_before_fire_suppresses_delivery() {
        let driver = Arc::new(ManualTimerDriver::new());
        let publisher = TimerSinglePublisher::new(Duration::from_secs(1), driver.clone());
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(1);
        subscription.cancel();
        driver.advance(Duration::from_secs(1));
        assert!(recorder.values().is_empty());
        assert!(!recorder.completed());
        assert!(!recorder.errored());
    }
}
