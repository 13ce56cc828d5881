//! 订阅者契约：四个终态互斥的回调方法。
//!
//! # 契约说明（What）
//! - 方法取 `&self` 而非 `&mut self`：驱动以"发射租约"保证同一订阅者上的信号严格串行，但类型系统
//!   本身不需要（也无法）为跨线程调用强加互斥——这与 Reactive Streams 原始 Java 接口一致（`onNext`
//!   同样没有 `synchronized` 修饰）。需要内部可变状态的订阅者自行使用 `Cell`/`Mutex`。
//! - 恰好一个终态信号：`on_error` 与 `on_complete` 之后不得再有任何回调到达；这是驱动实现必须维护
//!   的不变式，而不是本 trait 能够静态强制的东西。
use crate::error::SparkError;
use crate::reactive::subscription::Subscription;
use alloc::sync::Arc;

pub trait Subscriber<T>: Send + Sync {
    /// 在 `subscribe` 成功后恰好调用一次，先于任何 `on_next`/`on_error`/`on_complete`。
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);
    fn on_next(&self, value: T);
    /// 终态信号，至多调用一次，且不会与 `on_complete` 同时出现。
    fn on_error(&self, error: SparkError);
    /// 终态信号，至多调用一次，且不会与 `on_error` 同时出现。
    fn on_complete(&self);
}
