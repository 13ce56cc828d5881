//! 定时器协作者的形状：一次性调度与周期调度，外加一个可取消的注销句柄。
use alloc::sync::Arc;
use core::time::Duration;
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicBool, Ordering};

/// 对一次调度的句柄：调用 `cancel` 阻止任务被（再次）触发。
#[derive(Clone)]
pub struct TimerTaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerTaskHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for TimerTaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// 定时 Single/Interval 源的外部协作者接口：只负责"何时调用一次回调"，不关心需求记账。
pub trait TimerDriver: Send + Sync {
    /// 在 `delay` 之后调用一次 `task`，除非在此之前句柄被取消。
    fn schedule_once(&self, delay: Duration, task: Arc<dyn Fn() + Send + Sync>) -> TimerTaskHandle;

    /// 在 `initial_delay` 之后调用一次 `task`，此后每隔 `period` 再调用一次，直到句柄被取消。
    fn schedule_periodic(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: Arc<dyn Fn() + Send + Sync>,
    ) -> TimerTaskHandle;
}
