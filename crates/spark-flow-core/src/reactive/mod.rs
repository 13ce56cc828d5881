//! 信令内核：发布/订阅契约、需求记账、具体源驱动与图内省。
pub mod demand;
pub mod fusion;
pub mod introspection;
pub mod iterator_source;
pub mod publisher;
pub mod subscriber;
pub mod subscription;
pub mod timer_interval;
pub mod timer_single;
pub mod with_latest_from;
