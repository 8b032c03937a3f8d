//! Brute-force reference miner shared by the integration tests.

use std::collections::{BTreeMap, BTreeSet};

use tirp_miner::{IntervalStore, MaxGap, MiningReport, Pattern, RelationAlgebra, RelationMode};

/// Canonical pattern string → support, by enumerating every ordered subset
/// of up to `max_len` intervals of every instance.
pub fn brute_force(
    store: &IntervalStore,
    mode: RelationMode,
    max_gap: MaxGap,
    min_count: usize,
    max_len: usize,
) -> BTreeMap<String, usize> {
    let algebra = RelationAlgebra::new(mode);
    let mut support: BTreeMap<String, usize> = BTreeMap::new();

    for inst in store.instances() {
        let ivs = inst.intervals();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<Vec<usize>> = (0..ivs.len()).map(|i| vec![i]).collect();
        while let Some(positions) = stack.pop() {
            let picked: Vec<_> = positions.iter().map(|p| ivs[*p]).collect();
            let Some(pattern) = Pattern::from_intervals(&picked, &algebra, max_gap) else {
                continue;
            };
            seen.insert(pattern.to_string());
            if positions.len() < max_len {
                let last = positions[positions.len() - 1];
                for next in last + 1..ivs.len() {
                    let mut grown = positions.clone();
                    grown.push(next);
                    stack.push(grown);
                }
            }
        }
        for form in seen {
            *support.entry(form).or_default() += 1;
        }
    }

    support.retain(|_, s| *s >= min_count);
    support
}

pub fn as_map(report: &MiningReport) -> BTreeMap<String, usize> {
    report
        .patterns
        .iter()
        .map(|m| (m.pattern.to_string(), m.support))
        .collect()
}

/// Pattern with position `skip` removed.
pub fn without_position(pattern: &Pattern, skip: usize, algebra: &RelationAlgebra) -> Pattern {
    let k = pattern.len();
    let symbols: Vec<u32> = (0..k).filter(|i| *i != skip).map(|i| pattern.symbols()[i]).collect();
    let mut relations = Vec::new();
    for i in (0..k).filter(|i| *i != skip) {
        for j in (i + 1..k).filter(|j| *j != skip) {
            relations.push(pattern.relation(i, j));
        }
    }
    Pattern::from_parts(symbols, &relations, algebra).unwrap()
}

/// Closed subset of a complete, uncapped report: drop every pattern that
/// some one-longer pattern with equal support contains.
pub fn closed_forms(full: &MiningReport, mode: RelationMode) -> BTreeMap<String, usize> {
    let algebra = RelationAlgebra::new(mode);
    let all = as_map(full);
    let mut closed = all.clone();
    for m in full.patterns.iter().filter(|m| m.pattern.len() > 1) {
        for skip in 0..m.pattern.len() {
            let sub = without_position(&m.pattern, skip, &algebra).to_string();
            if all.get(&sub) == Some(&m.support) {
                closed.remove(&sub);
            }
        }
    }
    closed
}
