//! 信令内核的错误类型：协议违规、用户回调异常与致命条件的统一表示。
//!
//! # 设计背景（Why）
//! - spec 第 7 节要求错误分三类：`ProtocolError`（如 `request(n<=0)`、上游空值、组合函数返回空、
//!   定时源缺失背压）、`UserError`（用户回调抛出）与 `Fatal`（不可恢复的运行时条件）。
//! - 框架沿用 `spark-core::error::CoreError` 的“稳定错误码 + 人类可读消息 + 可选根因”结构，但去掉了
//!   分布式上下文（`NodeId`、`TransportSocketAddr` 等）——本内核不跨进程传播错误，保留那些字段只会
//!   制造无意义的耦合。
//!
//! # 契约说明（What）
//! - `Fatal` 条件从不在本类型中具现：根据 spec「Fatal errors... propagate... unchanged」，致命条件
//!   必须以 Rust `panic` 的形式穿透订阅帧，而不是被装箱进 `on_error`。`ErrorCategory::Fatal` 仅用于
//!   标注“这是一个本应以 panic 形式出现”的错误码，供日志与分类查询使用，不代表本类型捕获了它。
use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt;

/// 稳定错误码集合，遵循 `<域>.<语义>` 命名惯例，与 `spark-core::error::codes` 的风格一致。
pub mod codes {
    /// `request(n)` 被调用时 `n <= 0`。
    pub const PROTOCOL_NON_POSITIVE_REQUEST: &str = "flow.protocol.non_positive_request";
    /// 上游迭代器在 `hasNext() == true` 之后产生了空值。
    pub const PROTOCOL_NULL_ELEMENT: &str = "flow.protocol.null_element";
    /// `withLatestFrom` 组合函数返回空值。
    pub const PROTOCOL_NULL_COMBINER_RESULT: &str = "flow.protocol.null_combiner_result";
    /// 定时 Interval 源在无可用需求时仍然到达一次 tick。
    pub const PROTOCOL_MISSING_BACKPRESSURE: &str = "flow.protocol.missing_backpressure";
    /// 定时 Single 源在触发时尚未收到任何 `request`。
    pub const PROTOCOL_TIMED_SINGLE_NO_DEMAND: &str = "flow.protocol.timed_single_no_demand";
    /// 用户提供的组合函数 panic，经 `catch_unwind` 转换为可观察错误。
    pub const USER_COMBINER_PANIC: &str = "flow.user.combiner_panic";
}

/// 错误分类，驱动调用方是否重试、是否记录告警等后续策略。
///
/// # 契约说明（What）
/// - `Protocol`：违反本契约规定的信令协议（§3 不变式），应视为调用方或上游实现的缺陷。
/// - `User`：用户提供的回调（组合函数等）主动抛出的错误，已被安全捕获并归一化。
/// - `Fatal`：标注性分类，真正的致命条件从不会以这个枚举成员的形式被构造并装箱；它仅用于文档
///   与错误码查表，帮助区分“这个错误码原本对应一个不可恢复条件”。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    Protocol,
    User,
    Fatal,
}

/// 信令内核统一错误类型。
///
/// # 设计取舍（Trade-offs）
/// - 未提供 `DomainError`/`ImplError` 的两层拆分（教师仓库在分布式场景中使用它们携带节点与实现层
///   上下文）；本内核没有对应的分布式语义，保留拆分只会制造无意义的样板代码。
#[derive(Debug)]
pub struct SparkError {
    code: &'static str,
    message: Cow<'static, str>,
    category: ErrorCategory,
    cause: Option<Box<dyn fmt::Display + Send + Sync>>,
}

impl SparkError {
    /// 构造一个协议错误：调用方或上游实现违反了本契约。
    pub fn protocol(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            category: ErrorCategory::Protocol,
            cause: None,
        }
    }

    /// 构造一个用户错误：用户回调主动抛出（通常经 `catch_unwind` 归一化而来）。
    pub fn user(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            category: ErrorCategory::User,
            cause: None,
        }
    }

    /// 附加底层原因，便于日志记录完整链路。
    pub fn with_cause(mut self, cause: impl fmt::Display + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

impl fmt::Display for SparkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.code, self.category, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " caused by: {cause}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SparkError {}

pub type Result<T, E = SparkError> = core::result::Result<T, E>;
