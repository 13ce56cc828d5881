//! 契约测试：逐条对应规格第 8 节列出的编号场景与四条通用不变式。
use spark_flow_core::prelude::*;
use spark_flow_core::test_stubs::RecordingSubscriber;
use std::sync::Arc;
use std::time::Duration;

mod iterator_scenarios {
    use super::*;

    #[test]
    fn scenario_unbounded_request_drains_whole_source() {
        let publisher = from_values(1..=100i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert_eq!(recorder.values(), (1..=100).collect::<Vec<_>>());
        assert!(recorder.completed());
    }

    #[test]
    fn scenario_backpressured_request_delivers_exact_budget_then_more_on_demand() {
        let publisher = from_values(1..=5i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(2);
        assert_eq!(recorder.values(), vec![1, 2]);
        assert!(!recorder.completed());
        subscription.request(3);
        assert_eq!(recorder.values(), vec![1, 2, 3, 4, 5]);
        assert!(recorder.completed());
    }

    #[test]
    fn scenario_empty_source_completes_without_ever_receiving_a_subscription() {
        let publisher = from_values::<i32, _>(Vec::new());
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        assert!(recorder.completed());
        assert!(recorder.subscription().is_none());
    }
}

mod with_latest_from_scenarios {
    use super::*;

    #[test]
    fn scenario_normal_combination_uses_latest_cached_value() {
        let primary = from_values(1..=3i32);
        let other = from_values(vec![10]);
        let publisher = WithLatestFromPublisher::new(primary, other, |p: &i32, o: &i32| Some(p + o));
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert_eq!(recorder.values(), vec![11, 12, 13]);
        assert!(recorder.completed());
    }

    #[test]
    fn scenario_other_never_produced_drops_values_and_tops_up_demand() {
        let primary = from_values(1..=3i32);
        let other = from_values::<i32, _>(Vec::new());
        let publisher = WithLatestFromPublisher::new(primary, other, |p: &i32, o: &i32| Some(p + o));
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.values().is_empty());
        assert!(recorder.completed());
    }

    #[test]
    fn scenario_null_combiner_result_raises_protocol_error() {
        let primary = from_values(1..=1i32);
        let other = from_values(vec![1]);
        let publisher = WithLatestFromPublisher::new(primary, other, |_: &i32, _: &i32| None::<i32>);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.errored());
    }

    #[test]
    fn scenario_throwing_combiner_becomes_user_error() {
        let primary = from_values(1..=1i32);
        let other = from_values(vec![1]);
        let publisher = WithLatestFromPublisher::new(primary, other, |_: &i32, _: &i32| -> Option<i32> {
            panic!("combiner exploded")
        });
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(recorder.errored());
        assert_eq!(
            recorder.error_code(),
            Some(spark_flow_core::error::codes::USER_COMBINER_PANIC)
        );
    }
}

mod graph_scenarios {
    use super::*;
    use spark_flow_core::reactive::introspection::{GraphNode, HasUpstream, Introspectable, NodeHandle};

    struct Node {
        name: &'static str,
        upstream: Option<Box<Node>>,
    }
    impl Introspectable for Node {
        fn scan_name(&self) -> Option<&str> {
            Some(self.name)
        }
        fn as_upstream(&self) -> Option<&dyn HasUpstream> {
            Some(self)
        }
    }
    impl HasUpstream for Node {
        fn upstream(&self) -> Option<NodeHandle<'_>> {
            self.upstream.as_deref().map(NodeHandle::Live)
        }
    }

    struct CyclicNode {
        name: &'static str,
    }
    impl Introspectable for CyclicNode {
        fn scan_name(&self) -> Option<&str> {
            Some(self.name)
        }
        fn as_upstream(&self) -> Option<&dyn HasUpstream> {
            Some(self)
        }
    }
    impl HasUpstream for CyclicNode {
        fn upstream(&self) -> Option<NodeHandle<'_>> {
            Some(NodeHandle::Live(self))
        }
    }

    #[test]
    fn scenario_linear_chain_has_no_cycle() {
        let root = Node {
            name: "sink",
            upstream: Some(Box::new(Node {
                name: "source",
                upstream: None,
            })),
        };
        let snapshot = walk(&root, false);
        assert!(!snapshot.cyclic);
        assert_eq!(snapshot.stats().node_count, 2);
        let names: Vec<_> = snapshot
            .nodes
            .iter()
            .filter_map(|node: &GraphNode| node.name.as_deref())
            .collect();
        assert_eq!(names, vec!["sink", "source"]);
    }

    #[test]
    fn scenario_self_referencing_node_is_flagged_cyclic() {
        let node = CyclicNode { name: "loopy" };
        let snapshot = walk(&node, false);
        assert!(snapshot.cyclic);
    }
}

mod universal_invariants {
    use super::*;

    #[test]
    fn cumulative_onnext_never_exceeds_cumulative_request() {
        let publisher = from_values(1..=20i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        for _ in 0..20 {
            subscription.request(1);
        }
        assert!(recorder.values().len() <= 20);
    }

    #[test]
    fn only_one_terminal_signal_is_ever_observed() {
        let publisher = from_values(1..=3i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(i64::MAX);
        assert!(!(recorder.completed() && recorder.errored()));
        assert!(recorder.completed() || recorder.errored());
    }

    #[test]
    fn cancellation_is_idempotent() {
        let publisher = from_values(1..=3i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.cancel();
        subscription.cancel();
        subscription.request(1);
        assert!(recorder.values().is_empty());
    }

    #[test]
    fn non_positive_request_always_surfaces_protocol_error() {
        let publisher = from_values(1..=3i32);
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("subscription delivered");
        subscription.request(-5);
        assert!(recorder.errored());
        assert_eq!(
            recorder.error_code(),
            Some(spark_flow_core::error::codes::PROTOCOL_NON_POSITIVE_REQUEST)
        );
    }
}

mod timer_scenarios {
    use super::*;
    use spark_flow_core::time::ManualTimerDriver;

    #[test]
    fn scenario_periodic_tick_without_demand_is_missing_backpressure() {
        let driver = Arc::new(ManualTimerDriver::new());
        let publisher = TimerIntervalPublisher::new(None, Duration::from_millis(10), driver.clone());
        let recorder = Arc::new(RecordingSubscriber::new());
        publisher.subscribe(recorder.clone());
        driver.advance(Duration::from_millis(10));
        assert!(recorder.errored());
        assert_eq!(
            recorder.error_code(),
            Some(spark_flow_core::error::codes::PROTOCOL_MISSING_BACKPRESSURE)
        );
    }
}
