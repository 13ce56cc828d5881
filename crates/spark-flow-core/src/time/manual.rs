//! 虚拟时钟定时器驱动：把"时间前进"变成一次显式、同步的方法调用，供确定性测试使用。
//!
//! # 设计背景（Why）
//! 直接对应教师仓库 `time::clock::MockClock`：真实的线程睡眠让定时源的测试变得缓慢且抖动，教师仓库
//! 用一个持有 `Mutex<ClockState>` 的虚拟时钟替代真实睡眠，测试通过显式调用 `advance(delta)`
//! 推进时间、按到期顺序同步唤醒等待者。这里把同样的手法应用到 [`crate::time::TimerDriver`] 协作者
//! 接口上。
//!
//! # 设计取舍（Trade-offs）
//! `advance` 每次调用对每个到期任务最多触发一次，并把周期任务的下一次截止时间顺延一个周期；如果
//! `delta` 跨越了多个周期，需要多次调用 `advance`（或在循环中调用）才能逐一观察到每一次 tick，
//! 而不是一次 `advance` 内"追赶"触发多次。这避免了在周期为极小值时单次 `advance` 内产生无界循环。
use crate::time::driver::{TimerDriver, TimerTaskHandle};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::time::Duration;
use spin::Mutex;

struct Entry {
    deadline: Duration,
    period: Option<Duration>,
    task: Arc<dyn Fn() + Send + Sync>,
    handle: TimerTaskHandle,
}

struct Inner {
    elapsed: Duration,
    entries: Vec<Entry>,
}

pub struct ManualTimerDriver {
    inner: Mutex<Inner>,
}

impl ManualTimerDriver {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                elapsed: Duration::ZERO,
                entries: Vec::new(),
            }),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }

    /// 把虚拟时钟向前推进 `delta`，同步触发所有截止时间落在新时刻之内的任务，按注册顺序触发。
    pub fn advance(&self, delta: Duration) {
        let due = {
            let mut inner = self.inner.lock();
            inner.elapsed += delta;
            let now = inner.elapsed;
            let mut fired = Vec::new();
            inner.entries.retain_mut(|entry| {
                if entry.handle.is_cancelled() {
                    return false;
                }
                if entry.deadline <= now {
                    fired.push(entry.task.clone());
                    match entry.period {
                        Some(period) => {
                            entry.deadline += period;
                            true
                        }
                        None => false,
                    }
                } else {
                    true
                }
            });
            fired
        };
        for task in due {
            task();
        }
    }
}

impl Default for ManualTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for ManualTimerDriver {
    fn schedule_once(&self, delay: Duration, task: Arc<dyn Fn() + Send + Sync>) -> TimerTaskHandle {
        let handle = TimerTaskHandle::new();
        let mut inner = self.inner.lock();
        let deadline = inner.elapsed + delay;
        inner.entries.push(Entry {
            deadline,
            period: None,
            task,
            handle: handle.clone(),
        });
        handle
    }

    fn schedule_periodic(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: Arc<dyn Fn() + Send + Sync>,
    ) -> TimerTaskHandle {
        let handle = TimerTaskHandle::new();
        let mut inner = self.inner.lock();
        let deadline = inner.elapsed + initial_delay;
        inner.entries.push(Entry {
            deadline,
            period: Some(period),
            task,
            handle: handle.clone(),
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_once_shot_exactly_at_deadline() {
        let driver = ManualTimerDriver::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        driver.schedule_once(Duration::from_secs(5), Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        driver.advance(Duration::from_secs(4));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        driver.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        driver.advance(Duration::from_secs(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn periodic_reschedules_after_each_fire() {
        let driver = ManualTimerDriver::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        driver.schedule_periodic(
            Duration::from_secs(1),
            Duration::from_secs(1),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        for expected in 1..=3 {
            driver.advance(Duration::from_secs(1));
            assert_eq!(count.load(Ordering::SeqCst), expected);
        }
    }

    #[test]
    fn cancelled_handle_stops_future_fires() {
        let driver = ManualTimerDriver::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = driver.schedule_periodic(
            Duration::ZERO,
            Duration::from_secs(1),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        driver.advance(Duration::ZERO);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.cancel();
        driver.advance(Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
