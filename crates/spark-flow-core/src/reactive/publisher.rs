//! 发布者契约：每次 `subscribe` 建立一条独立的信令序列。
use crate::reactive::subscriber::Subscriber;
use alloc::sync::Arc;

pub trait Publisher<T> {
    /// 建立一条新的订阅。可以被多次调用，每次调用都必须产生一个独立、互不干扰的 `Subscription`。
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}
