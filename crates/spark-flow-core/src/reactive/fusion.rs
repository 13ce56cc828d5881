//! 融合协议：订阅者在已知自己与上游在同一执行上下文时，绕过 request/onNext 的异步协议，
//! 直接同步拉取缓冲中的值。
//!
//! # 设计背景（Why）
//! Java 版本用一个显式的四态状态机（`CallHasNext` → `HasNextNoValue`/`HasNextHasValue` → `NoNext`）
//! 描述"先探测是否有下一个元素，再决定是否消费"的语义。Rust 标准库的 [`core::iter::Peekable`] 恰好
//! 内建了同一状态机（`peek` 触发探测并缓存一次前瞻，`next` 消费缓存或重新探测），因此这里不重新发明
//! 状态机，而是直接把 `QueueSubscription` 的四个操作映射到 `Peekable` 的 `peek`/`next`。
//!
//! # 契约说明（What）
//! - `fusion_peek`/`fusion_poll` 区分"队列为空"（`Ok(None)`）与"下一个元素是协议违规的空值"
//!   （`Err`）——对应迭代器驱动里 `Some(None)` 代表的"hasNext 为真但 next 返回空"场景。
//! - `fusion_clear` 允许是 no-op（本实现确实是 no-op：清空职责落在上游完成/取消路径，不在融合层）。
use crate::error::{codes, SparkError};

pub trait QueueSubscription<T>: crate::reactive::subscription::Subscription {
    /// 不消费地探测队列是否为空。
    fn fusion_is_empty(&self) -> bool;

    /// 不消费地查看下一个值；`Ok(None)` 表示队列为空，`Err` 表示检测到协议违规的空值。
    fn fusion_peek(&self) -> Result<Option<T>, SparkError>;

    /// 消费并返回下一个值；语义同 [`Self::fusion_peek`] 但会前移队列。
    fn fusion_poll(&self) -> Result<Option<T>, SparkError>;

    /// 丢弃当前缓存的前瞻值（若有），不触发 `on_next`。
    fn fusion_drop(&self);

    /// 允许为 no-op：清空上游缓冲区是上游完成/取消路径的职责。
    fn fusion_clear(&self);

    /// 已知大小的队列中剩余元素数；对无法确定大小的源可返回 `0` 或 `1`（仅表达"是否非空"）。
    fn fusion_size(&self) -> usize;
}

pub(crate) fn null_element_error() -> SparkError {
    SparkError::protocol(
        codes::PROTOCOL_NULL_ELEMENT,
        "iterator produced a null element while reporting more elements were available",
    )
}
