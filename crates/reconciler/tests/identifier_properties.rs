//! Property-based tests for the identifier codec and capacity policy.
//!
//! Properties verified:
//! - Build then parse returns the same fields
//! - Any ID with a dropped, renamed or extra segment is rejected
//! - A capacity can never hold both modes, and crossover is always refused

use cosmosdb_mongo_reconciler::{
    AutoscaleSettings, Capacity, ErrorKind, MongoDatabaseId, capacity,
};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,20}[a-z0-9]"
}

fn database_id() -> impl Strategy<Value = MongoDatabaseId> {
    (segment(), segment(), segment(), segment())
        .prop_map(|(sub, rg, account, name)| MongoDatabaseId::new(sub, rg, account, name))
}

proptest! {
    /// Property: parse(build(fields)) == fields
    #[test]
    fn prop_build_then_parse_round_trips(id in database_id()) {
        let rendered = id.to_string();
        let parsed = MongoDatabaseId::parse(&rendered);
        prop_assert_eq!(parsed.ok(), Some(id));
    }

    /// Property: removing any one segment makes the ID malformed.
    #[test]
    fn prop_truncated_id_is_rejected(id in database_id(), drop in 0usize..10) {
        let rendered = id.to_string();
        let segments: Vec<&str> = rendered.trim_start_matches('/').split('/').collect();
        let kept: Vec<&str> = segments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != drop)
            .map(|(_, s)| *s)
            .collect();
        let mangled = format!("/{}", kept.join("/"));

        let parsed = MongoDatabaseId::parse(&mangled);
        prop_assert_eq!(parsed.err().map(|e| e.kind()), Some(ErrorKind::MalformedIdentifier));
    }

    /// Property: trailing key/value pairs are not tolerated.
    #[test]
    fn prop_extra_pair_is_rejected(id in database_id(), key in segment(), value in segment()) {
        let mangled = format!("{id}/{key}/{value}");
        prop_assert!(MongoDatabaseId::parse(&mangled).is_err());
    }

    /// Property: fixed and autoscale together never form a capacity.
    #[test]
    fn prop_capacity_modes_are_exclusive(
        throughput in 1i64..1_000_000,
        max in 1i64..1_000_000,
    ) {
        let result = Capacity::from_fields(
            "orders",
            "acct1",
            Some(throughput),
            Some(AutoscaleSettings::with_max_throughput(max)),
        );
        prop_assert_eq!(
            result.err().map(|e| e.kind()),
            Some(ErrorKind::ConflictingCapacityMode)
        );
    }

    /// Property: every manual/autoscale crossover is refused; same-mode
    /// changes are not.
    #[test]
    fn prop_crossover_always_refused(throughput in 400i64..100_000, max in 4000i64..1_000_000) {
        let fixed = Capacity::Fixed(throughput);
        let autoscale = Capacity::Autoscale(AutoscaleSettings::with_max_throughput(max));

        prop_assert!(capacity::check_mode_transition("orders", "acct1", &fixed, &autoscale).is_err());
        prop_assert!(capacity::check_mode_transition("orders", "acct1", &autoscale, &fixed).is_err());
        prop_assert!(
            capacity::check_mode_transition("orders", "acct1", &fixed, &Capacity::Fixed(throughput + 100)).is_ok()
        );
        prop_assert!(
            capacity::check_mode_transition("orders", "acct1", &Capacity::Unset, &autoscale).is_ok()
        );
    }
}
