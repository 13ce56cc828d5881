//! 测试替身：零成本的 no-op 日志器与一个记录所有收到信号的订阅者，供单元测试与契约测试复用。
//!
//! 直接对应教师仓库 `test_stubs::observability` 下 `NoopMetricsProvider`/`NoopCounter` 一类零大小
//! 替身的写法：不引入 mocking 框架，用最朴素的手写类型覆盖测试需要的最小表面。
use crate::error::SparkError;
use crate::observability::{LogRecord, Logger};
use crate::reactive::subscriber::Subscriber;
use crate::reactive::subscription::Subscription;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// 丢弃所有日志记录的零大小替身。
#[derive(Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: LogRecord<'_>) {}
}

/// 记录一次订阅中收到的所有信号，供测试断言。
pub struct RecordingSubscriber<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    subscription: Option<Arc<dyn Subscription>>,
    values: Vec<T>,
    completed: bool,
    error: Option<SparkError>,
}

impl<T> RecordingSubscriber<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                subscription: None,
                values: Vec::new(),
                completed: false,
                error: None,
            }),
        }
    }

    pub fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.state.lock().subscription.clone()
    }

    pub fn completed(&self) -> bool {
        self.state.lock().completed
    }

    pub fn errored(&self) -> bool {
        self.state.lock().error.is_some()
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.state.lock().error.as_ref().map(SparkError::code)
    }
}

impl<T: Clone> RecordingSubscriber<T> {
    pub fn values(&self) -> Vec<T> {
        self.state.lock().values.clone()
    }
}

impl<T> Default for RecordingSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.state.lock().subscription = Some(subscription);
    }

    fn on_next(&self, value: T) {
        self.state.lock().values.push(value);
    }

    fn on_error(&self, error: SparkError) {
        self.state.lock().error = Some(error);
    }

    fn on_complete(&self) {
        self.state.lock().completed = true;
    }
}
