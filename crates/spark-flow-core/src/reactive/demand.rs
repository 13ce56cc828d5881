//! 需求计数器：无锁的饱和累加原子计数，以及"零到正"发射租约握手。
//!
//! # 设计背景（Why）
//! 这是整个信令内核并发模型的基石（对应不变式 §5/§9 中反复强调的"preserve this exactly"片段）：
//! 任意数量的线程可以并发调用 `request`，但在任意时刻只能有一个线程在向下游投递信号。实现方式不是
//! 互斥锁，而是把"谁把计数器从零拨到正"这件事本身当作排他锁的获取——第一个观察到旧值为零的线程
//! 独占发射权，直到它耗尽当前预算并把计数器重新降到零为止。
//!
//! # 逻辑解析（How）
//! `add` 用 `compare_exchange` 循环实现饱和加法：一旦达到 [`DemandCounter::UNBOUNDED`] 哨兵值，
//! 后续加法是粘性的（不会再减少，也不会溢出）。`produced` 则在非无界状态下做饱和减法；一旦进入无界
//! 状态，`produced` 永远是no-op——无界源不需要预算记账。
//!
//! `UNBOUNDED` 被定义为 `i64::MAX as u64`（而不是 `u64::MAX`），因为 `Subscription::request`
//! 对外暴露的是与 Reactive Streams 传统一致的 `i64`（Java 的 `long`）参数；`request(i64::MAX)`
//! 就是惯例上的"请求无穷"。
#[cfg(not(any(loom, spark_loom)))]
use core::sync::atomic::{AtomicU64, Ordering};
#[cfg(any(loom, spark_loom))]
use loom::sync::atomic::{AtomicU64, Ordering};

/// 原子需求计数器，支持饱和累加、饱和消耗与"零到正"的发射租约检测。
#[derive(Debug)]
pub struct DemandCounter {
    value: AtomicU64,
}

impl DemandCounter {
    /// 代表"无界请求"的哨兵值：对外以 `i64::MAX` 的惯例呈现。
    pub const UNBOUNDED: u64 = i64::MAX as u64;

    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// 校验一次 `request(n)` 调用：`n` 必须为正数，否则是协议违规。
    pub fn validate(n: i64) -> Result<u64, ()> {
        if n <= 0 {
            Err(())
        } else {
            Ok(n as u64)
        }
    }

    /// 当前计数器的快照值。
    pub fn load(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// 饱和累加 `amount`；一旦越过 [`Self::UNBOUNDED`] 即粘在该哨兵值上，不再增长也不再减少。
    /// 返回累加前的旧值，供调用方判断是否刚完成"零到正"的转换（即是否应当获取发射租约）。
    pub fn add(&self, amount: u64) -> u64 {
        loop {
            let current = self.value.load(Ordering::Acquire);
            if current == Self::UNBOUNDED {
                return current;
            }
            let next = current.saturating_add(amount).min(Self::UNBOUNDED);
            match self
                .value
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => return prev,
                Err(_) => continue,
            }
        }
    }

    /// 记录已投递 `emitted` 个信号，从计数器中扣除。无界状态下是no-op（返回哨兵值本身）。
    /// 返回扣除后的新值；调用方据此判断预算是否耗尽（`0` 则必须释放发射租约）。
    pub fn produced(&self, emitted: u64) -> u64 {
        loop {
            let current = self.value.load(Ordering::Acquire);
            if current == Self::UNBOUNDED {
                return current;
            }
            let next = current.saturating_sub(emitted);
            match self
                .value
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(_) => continue,
            }
        }
    }

    /// 原子地尝试消耗恰好一单位需求；在无界状态下总是成功且不改变计数器。
    /// 供定时 Interval 源使用：每次 tick 必须独立核验并消耗一单位需求，而不是批量记账。
    pub fn try_take(&self) -> bool {
        loop {
            let current = self.value.load(Ordering::Acquire);
            if current == Self::UNBOUNDED {
                return true;
            }
            if current == 0 {
                return false;
            }
            match self.value.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }
}

impl Default for DemandCounter {
    fn default() -> Self {
        Self::new()
    }
}
