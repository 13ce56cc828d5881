//! Loom 模型检查：穷尽调度探索需求计数器"零到正"发射租约握手的交织情形。
//!
//! 运行方式：`RUSTFLAGS="--cfg loom" cargo test --release --test loom_concurrency
//! --features loom-model`。非 loom 构建下这个文件整体被忽略（见下方 `cfg(loom)` 守卫），因为
//! `loom` 的 `Arc`/原子类型替身只有在 `--cfg loom` 下才会被 `spark-flow-core` 内部条件编译选中。
#![cfg(loom)]

use loom::sync::Arc;
use loom::thread;
use spark_flow_core::reactive::demand::DemandCounter;

/// 验证恰好一个线程会观察到"旧值为零"从而认为自己获得了发射租约，即便多个线程并发调用 `add`。
#[test]
fn exactly_one_thread_observes_zero_to_positive_transition() {
    loom::model(|| {
        let counter = Arc::new(DemandCounter::new());
        let leases = Arc::new(loom::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let counter = counter.clone();
                let leases = leases.clone();
                thread::spawn(move || {
                    let prev = counter.add(1);
                    if prev == 0 {
                        leases.fetch_add(1, loom::sync::atomic::Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(leases.load(loom::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(counter.load(), 2);
    });
}

/// 验证 `produced` 与并发 `add` 交织时，计数器永远不会变成"意外仍为零但还有在途请求未被看见"的状态：
/// 释放租约（`produced` 返回 0）之后，任何并发 `add` 都必须在其 `prev == 0` 分支被观察到，从而触发
/// 新一轮的发射租约获取。
#[test]
fn concurrent_add_after_drain_always_reacquires_lease() {
    loom::model(|| {
        let counter = Arc::new(DemandCounter::new());
        counter.add(1);
        assert_eq!(counter.produced(1), 0);

        let leases = Arc::new(loom::sync::atomic::AtomicUsize::new(0));
        let c = counter.clone();
        let l = leases.clone();
        let handle = thread::spawn(move || {
            let prev = c.add(1);
            if prev == 0 {
                l.fetch_add(1, loom::sync::atomic::Ordering::SeqCst);
            }
        });
        handle.join().unwrap();

        assert_eq!(leases.load(loom::sync::atomic::Ordering::SeqCst), 1);
    });
}
