//! `spark_flow_core`：最小化的 Reactive Streams 发布/订阅信令内核。
//!
//! # 设计背景（Why）
//! 本 crate 只实现信令协议本身——需求记账、快/慢路径源驱动、定时触发、一个组合算子、融合绕行协议
//! 与只读图内省——而不实现调度器、传输层、广泛的算子库或任何外部工具。这些边界都记录在仓库根目录的
//! 设计文档中；此处只强调一点会影响每一个模块的工程取舍：整个 crate 在 `alloc`-only 环境下也要能
//! 编译，`std` 只解锁线程承载的定时器驱动与 `std::error::Error` 互操作。
//!
//! # 契约说明（What）
//! - [`reactive::subscription::Subscription`] 额外以 [`reactive::introspection::Introspectable`]
//!   为父 trait：每一个订阅天然是图遍历器可以落脚的节点，不需要平行的包装类型。
//! - `#![deny(unsafe_code)]`：需要跨线程共享可变状态的地方一律用 `spin::Mutex`，不使用
//!   `UnsafeCell`/裸指针技巧。
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod observability;
pub mod prelude;
pub mod reactive;
pub mod time;

pub mod test_stubs;
