#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use frota_core::lifecycle::{ClockSkewPolicy, transition};
use frota_core::model::{Status, WorkOrder};
use frota_core::productivity::AssignmentEvent;
use proptest::prelude::*;

pub const T0: i64 = 1_700_000_000;

pub const NANOS: i64 = 1_000_000_000;

pub fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0).single().expect("valid timestamp")
}

/// `T0` plus `offset` nanoseconds, for clocks that are not second-aligned.
pub fn at_nanos(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(T0 * NANOS + offset)
}

pub fn arb_status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

/// Mostly open statuses, so walks stay alive for a while.
pub fn arb_target() -> impl Strategy<Value = Status> {
    prop_oneof![
        6 => prop::sample::select(vec![
            Status::Aguardando,
            Status::EmExecucao,
            Status::AguardandoPecas,
        ]),
        1 => prop::sample::select(vec![Status::Finalizada, Status::Cancelada]),
    ]
}

/// A gap in nanoseconds: whole seconds in `secs` plus a sub-second part.
pub fn arb_gap(secs: std::ops::Range<i64>) -> impl Strategy<Value = i64> {
    (secs, 0_i64..NANOS).prop_map(|(s, n)| s * NANOS + n)
}

/// Creation offset inside the first second.
pub fn arb_start() -> impl Strategy<Value = i64> {
    0_i64..NANOS
}

/// `(target, gap nanoseconds)` steps with non-negative gaps.
pub fn arb_walk() -> impl Strategy<Value = Vec<(Status, i64)>> {
    prop::collection::vec((arb_target(), arb_gap(0..20_000)), 0..24)
}

/// Steps whose gaps may run the clock backwards.
pub fn arb_skewed_walk() -> impl Strategy<Value = Vec<(Status, i64)>> {
    prop::collection::vec((arb_target(), arb_gap(-5_000..20_000)), 0..24)
}

/// Replay a walk from a fresh order created at `at_nanos(start)`, skipping
/// rejected edges. Returns the final order and the nanosecond offset of the
/// last step.
pub fn replay(start: i64, steps: &[(Status, i64)]) -> (WorkOrder, i64) {
    let mut order = WorkOrder::new("os-prop", "truck-1", "prop", at_nanos(start));
    let mut clock = start;
    for (to, gap) in steps {
        clock += gap;
        if let Ok(next) = transition(&order, *to, at_nanos(clock), "prop", None, ClockSkewPolicy::Clamp) {
            order = next.order;
        }
    }
    (order, clock)
}

pub fn arb_event() -> impl Strategy<Value = AssignmentEvent> {
    (
        prop::sample::select(vec!["ana", "bruno", "carla", "davi"]),
        prop::option::of(prop::sample::select(vec!["motor", "freio", "eletrica"])),
        -1_000_i64..100_000,
        0_i64..1_000_000,
    )
        .prop_map(|(mechanic, category, seconds, offset)| AssignmentEvent {
            order_id: format!("os-{offset}"),
            previous_mechanic_id: None,
            new_mechanic_id: mechanic.to_string(),
            category: category.map(str::to_string),
            accumulated_seconds: seconds,
            recorded_at: at(offset),
        })
}
