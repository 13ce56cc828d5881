//! 线程承载的生产级定时器驱动：为每次调度派生一个后台线程，阻塞式地 `thread::sleep`。
//!
//! # 设计背景（Why）
//! 直接复用教师仓库 `time::clock::ThreadSleep` 的手法：没有引入 `tokio` 定时器轮或任何异步运行时，
//! 用最朴素的"一个线程一个 sleep"换取实现上的简单性；这与教师仓库在没有异步运行时可用时的退路一致。
use crate::time::driver::{TimerDriver, TimerTaskHandle};
use alloc::sync::Arc;
use core::time::Duration;
use std::thread;

pub struct SystemTimerDriver;

impl SystemTimerDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for SystemTimerDriver {
    fn schedule_once(&self, delay: Duration, task: Arc<dyn Fn() + Send + Sync>) -> TimerTaskHandle {
        let handle = TimerTaskHandle::new();
        let returned = handle.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            if !handle.is_cancelled() {
                task();
            }
        });
        returned
    }

    fn schedule_periodic(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: Arc<dyn Fn() + Send + Sync>,
    ) -> TimerTaskHandle {
        let handle = TimerTaskHandle::new();
        let returned = handle.clone();
        thread::spawn(move || {
            thread::sleep(initial_delay);
            loop {
                if handle.is_cancelled() {
                    return;
                }
                task();
                if handle.is_cancelled() {
                    return;
                }
                thread::sleep(period);
            }
        });
        returned
    }
}
