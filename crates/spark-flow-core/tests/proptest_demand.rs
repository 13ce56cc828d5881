//! 需求计数器与迭代器源驱动的性质测试：不论 `request` 如何交错到达，关键不变式都必须成立。
use proptest::prelude::*;
use spark_flow_core::prelude::*;
use spark_flow_core::reactive::demand::DemandCounter;
use spark_flow_core::test_stubs::RecordingSubscriber;
use std::sync::Arc;

proptest! {
    #[test]
    fn add_never_exceeds_unbounded_sentinel(amounts in prop::collection::vec(1u64..=1_000_000, 0..50)) {
        let counter = DemandCounter::new();
        for amount in amounts {
            counter.add(amount);
            prop_assert!(counter.load() <= DemandCounter::UNBOUNDED);
        }
    }

    #[test]
    fn produced_never_underflows_below_zero(
        adds in prop::collection::vec(1u64..=1_000, 1..20),
        takes in prop::collection::vec(1u64..=1_000, 1..20),
    ) {
        let counter = DemandCounter::new();
        for amount in &adds {
            counter.add(*amount);
        }
        for amount in &takes {
            let before = counter.load();
            let after = counter.produced(*amount);
            prop_assert!(after <= before);
        }
    }

    #[test]
    fn cumulative_onnext_never_exceeds_cumulative_request(
        source_len in 0usize..200,
        requests in prop::collection::vec(1i64..=20, 0..40),
    ) {
        let publisher = from_values(0..source_len as i64);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());

        if let Some(subscription) = recorder.subscription() {
            let mut cumulative_requested: i64 = 0;
            for n in requests {
                subscription.request(n);
                cumulative_requested += n;
                let delivered = recorder.values().len() as i64;
                prop_assert!(delivered <= cumulative_requested);
                prop_assert!(delivered <= source_len as i64);
            }
        } else {
            // Source was empty at subscribe time: onComplete must already have fired.
            prop_assert!(recorder.completed());
            prop_assert_eq!(source_len, 0);
        }
    }
}
