//! 订阅契约：下游通过它表达需求与撤回兴趣，上游通过它兑现信号。
//!
//! # 设计背景（Why）
//! `Subscription` 额外以 [`Introspectable`] 作为父 trait：本内核把每一个订阅都当成图遍历器可以
//! 落脚的节点，而不是单独维护一套平行的"可内省包装类型"。调用方拿到 `Arc<dyn Subscription>` 时，
//! 借助 trait upcasting 即可把它当 `&dyn Introspectable` 使用，无需额外包装或向下转型。
use crate::reactive::introspection::Introspectable;

pub trait Subscription: Introspectable {
    /// 累加 `n` 个单位的需求；`n <= 0` 是协议违规，必须以 `on_error` 终止订阅而不是 panic 或忽略。
    fn request(&self, n: i64);

    /// 撤回订阅者的兴趣。幂等；调用后不保证没有更多信号已经在途，但保证不再有新的信号被排入队列。
    fn cancel(&self);
}
