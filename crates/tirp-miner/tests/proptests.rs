//! Property-based tests for the miner.
//!
//! Random small datasets are mined and checked against the brute-force
//! reference, and against support invariants that must hold for every
//! input.

mod common;

use proptest::prelude::*;
use tirp_miner::{
    IntervalStore, MaxGap, MinSupport, Miner, MinerConfig, MiningReport, RelationAlgebra,
    RelationMode, TimeInterval,
};

use common::{as_map, brute_force, closed_forms, without_position};

// ===== Strategies for generating test data =====

fn arb_interval() -> impl Strategy<Value = TimeInterval> {
    (1u32..=3, 0i64..12, 0i64..5).prop_map(|(symbol, start, len)| TimeInterval::new(symbol, start, start + len))
}

fn arb_store() -> impl Strategy<Value = IntervalStore> {
    prop::collection::vec(prop::collection::vec(arb_interval(), 0..6), 1..6).prop_map(|instances| {
        let mut builder = IntervalStore::builder();
        for (i, intervals) in instances.into_iter().enumerate() {
            builder.push_instance(format!("e{i}"), intervals);
        }
        builder.build().unwrap()
    })
}

fn arb_gap() -> impl Strategy<Value = MaxGap> {
    prop_oneof![(1i64..6).prop_map(MaxGap::Bounded), Just(MaxGap::Unbounded)]
}

fn arb_mode() -> impl Strategy<Value = RelationMode> {
    prop_oneof![Just(RelationMode::Allen), Just(RelationMode::Coarse)]
}

fn run(store: &IntervalStore, config: MinerConfig) -> MiningReport {
    Miner::new(store, config).run().unwrap()
}

// ===== Property Tests =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_agrees_with_brute_force(
        store in arb_store(),
        gap in arb_gap(),
        mode in arb_mode(),
        min_count in 1usize..3,
    ) {
        let config = MinerConfig::new(MinSupport::Count(min_count), gap)
            .with_relations(mode)
            .with_max_length(Some(3))
            .with_threads(2);
        let mined = as_map(&run(&store, config));
        prop_assert_eq!(mined, brute_force(&store, mode, gap, min_count, 3));
    }

    #[test]
    fn prop_sub_patterns_have_at_least_equal_support(store in arb_store(), gap in arb_gap()) {
        let algebra = RelationAlgebra::new(RelationMode::Allen);
        let report = run(&store, MinerConfig::new(MinSupport::Count(1), gap));
        let supports = as_map(&report);
        for m in report.patterns.iter().filter(|m| m.pattern.len() > 1) {
            for skip in 0..m.pattern.len() {
                let sub = without_position(&m.pattern, skip, &algebra);
                let sub_support = supports.get(&sub.to_string()).copied().unwrap_or(0);
                prop_assert!(sub_support >= m.support, "{} ⊂ {}", sub, m.pattern);
            }
        }
    }

    #[test]
    fn prop_widening_gap_never_lowers_support(store in arb_store(), gap in 1i64..4, widen in 1i64..4) {
        let narrow = as_map(&run(&store, MinerConfig::new(MinSupport::Count(1), MaxGap::Bounded(gap))));
        let wide = as_map(&run(&store, MinerConfig::new(MinSupport::Count(1), MaxGap::Bounded(gap + widen))));
        for (form, support) in &narrow {
            prop_assert!(wide.get(form).copied().unwrap_or(0) >= *support, "{}", form);
        }
    }

    #[test]
    fn prop_closed_output_matches_closed_subset(
        store in arb_store(),
        gap in arb_gap(),
        mode in arb_mode(),
        min_count in 1usize..3,
    ) {
        let config = MinerConfig::new(MinSupport::Count(min_count), gap).with_relations(mode);
        let full = run(&store, config.clone());
        let closed = as_map(&run(&store, config.with_closed_only(true)));
        prop_assert_eq!(closed, closed_forms(&full, mode));
    }

    #[test]
    fn prop_emitted_forms_are_unique(store in arb_store(), gap in arb_gap()) {
        let report = run(&store, MinerConfig::new(MinSupport::Count(1), gap));
        let mut forms: Vec<_> = report.patterns.iter().map(|m| m.pattern.canonicalize()).collect();
        let total = forms.len();
        forms.sort();
        forms.dedup();
        prop_assert_eq!(forms.len(), total);
    }
}
