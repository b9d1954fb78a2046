use frota_core::ingest;
use frota_core::ledger::{displayed, total_elapsed};
use frota_core::lifecycle::{ClockSkewPolicy, transition};
use frota_core::lock::LockPolicy;
use frota_core::model::{Status, WorkOrder};
use frota_core::productivity::{ProductivityFilter, summarize};
use proptest::prelude::*;

#[path = "generators.rs"]
mod generators;
use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    // Σ displayed equals the order's age while open, and the age at closing
    // once terminal.
    #[test]
    fn total_elapsed_matches_age(start in arb_start(), steps in arb_walk(), extra in arb_gap(0..50_000)) {
        let (order, clock) = replay(start, &steps);
        let now = at_nanos(clock + extra);
        let expected = if order.status().is_terminal() {
            (order.last_status_change() - order.created_at).num_seconds()
        } else {
            (now - order.created_at).num_seconds()
        };
        prop_assert_eq!(total_elapsed(&order, now), expected);
    }

    #[test]
    fn displayed_is_monotonic_in_reader_time(
        start in arb_start(),
        steps in arb_walk(),
        a in arb_gap(0..100_000),
        b in arb_gap(0..100_000),
    ) {
        let (order, clock) = replay(start, &steps);
        let (early, late) = (a.min(b), a.max(b));
        for status in Status::ALL {
            prop_assert!(
                displayed(&order, status, at_nanos(clock + early)) <= displayed(&order, status, at_nanos(clock + late))
            );
        }
    }

    // Even with a clock that jumps backwards, no slot ever shrinks and no
    // slot ever goes negative.
    #[test]
    fn ledger_slots_never_decrease(steps in arb_skewed_walk()) {
        let mut order = WorkOrder::new("os-prop", "truck-1", "prop", at(0));
        let mut clock = 0_i64;
        for (to, gap) in steps {
            clock += gap;
            let before = *order.status_timers();
            if let Ok(next) = transition(&order, to, at_nanos(clock), "prop", None, ClockSkewPolicy::Clamp) {
                prop_assert_eq!(next.change.clamped, next.warning.is_some());
                order = next.order;
            }
            for status in Status::ALL {
                prop_assert!(order.status_timers().get(status) >= before.get(status));
                prop_assert!(order.status_timers().get(status) >= 0);
            }
        }
    }

    #[test]
    fn terminal_orders_accept_no_transition(
        start in arb_start(),
        steps in arb_walk(),
        to in arb_status(),
        gap in arb_gap(0..10_000),
    ) {
        let (order, clock) = replay(start, &steps);
        let result = transition(&order, to, at_nanos(clock + gap), "prop", None, ClockSkewPolicy::Clamp);
        if order.status().is_terminal() || order.status() == to {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn release_is_idempotent(
        holders in prop::collection::vec(prop::sample::select(vec!["ana", "bia", "caio"]), 0..8),
        releaser in prop::sample::select(vec!["ana", "bia", "caio"]),
    ) {
        let policy = LockPolicy::default();
        let mut order = WorkOrder::new("os-prop", "truck-1", "prop", at(0));
        for (i, holder) in holders.iter().enumerate() {
            let _ = policy.acquire(&mut order, holder, at(i64::try_from(i).unwrap_or(0) * 3_600));
        }

        policy.release(&mut order, releaser);
        let once = order.clone();
        prop_assert!(!policy.release(&mut order, releaser));
        prop_assert_eq!(order, once);
    }

    #[test]
    fn ingested_timers_are_never_negative(
        values in prop::collection::vec(
            prop_oneof![
                any::<i64>().prop_map(serde_json::Value::from),
                any::<f64>().prop_map(|f| serde_json::json!(f)),
                "[a-z0-9-]{0,6}".prop_map(serde_json::Value::from),
            ],
            5,
        ),
    ) {
        let mut timers = serde_json::Map::new();
        for (status, value) in Status::ALL.iter().zip(values) {
            timers.insert(status.as_str().to_string(), value);
        }
        let raw = serde_json::json!({ "id": "os-x", "status": "aguardando", "statusTimers": timers });
        let order = ingest::normalize(&raw, at(0)).expect("id and status are valid").order;
        for status in Status::ALL {
            prop_assert!(order.status_timers().get(status) >= 0);
        }
    }

    #[test]
    fn summary_groups_partition_the_events(events in prop::collection::vec(arb_event(), 0..40)) {
        let summary = summarize(&events, &ProductivityFilter::default());
        prop_assert_eq!(summary.count, events.len());
        prop_assert_eq!(summary.groups.iter().map(|g| g.count).sum::<usize>(), summary.count);
        prop_assert_eq!(
            summary.groups.iter().map(|g| g.total_seconds).sum::<i64>(),
            summary.total_seconds
        );
        prop_assert!(summary.groups.windows(2).all(|w| w[0].count >= w[1].count));
        prop_assert!(summary.average_seconds.is_finite());
    }
}
