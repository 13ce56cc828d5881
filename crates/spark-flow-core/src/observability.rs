//! 可观测性门面：对象安全的结构化日志接口，供驱动在协议违规与竞态发生时上报。
//!
//! # 设计背景（Why）
//! 教师仓库的 `observability::facade::ObservabilityFacade` 把 logger/metrics/ops_bus/health_checks
//! 打包成一个门面 trait，调用方只依赖 trait object，不依赖具体的可观测性后端。本内核没有指标、运维
//! 事件总线或健康检查的对应物（§2.3 已记录这一点），因此只保留 `Logger` 一项能力；`metrics`/`ops_bus`/
//! `health_checks` 的缺失是裁剪后的结果，而非遗漏。
use core::fmt;

/// 日志级别，与教师仓库保持一致的四级划分。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
}

/// 一个结构化字段：键固定为 `&'static str`，值延迟格式化以避免在关闭日志时产生分配。
#[derive(Clone, Copy)]
pub struct LogField<'a> {
    pub key: &'static str,
    pub value: &'a dyn fmt::Display,
}

/// 一条结构化日志记录。驱动代码永远不会把 `on_next` 负载放进 `fields`——`T` 未必实现 `Debug`。
pub struct LogRecord<'a> {
    pub severity: LogSeverity,
    pub target: &'static str,
    pub message: &'a str,
    pub fields: &'a [LogField<'a>],
}

/// 结构化日志门面。对象安全，可在 `no_std` 环境下以 `Arc<dyn Logger>` 形式注入。
pub trait Logger: Send + Sync {
    fn log(&self, record: LogRecord<'_>);
}

impl LogRecord<'_> {
    pub fn emit(self, logger: &dyn Logger) {
        logger.log(self);
    }
}
