//! Occurrence Index: per-instance bindings of a pattern to concrete intervals.
//!
//! Bindings are stored flat, `arity` positions per binding, ascending within
//! each binding. Child indices are built only from the parent's bindings, so
//! the raw store is scanned once per symbol at seeding time and afterwards
//! only probed at the positions a parent binding can reach.

use std::collections::BTreeMap;

use fnv::{FnvHashMap, FnvHashSet};

use crate::pattern::Candidate;
use crate::relation::{RelationAlgebra, TemporalRelation};
use crate::store::{Instance, IntervalStore};
use crate::types::{InstanceId, MaxGap, Position, SymbolId, Time};

/// Bindings of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOccurrences {
    instance: InstanceId,
    flat: Vec<Position>,
}

impl InstanceOccurrences {
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn flat(&self) -> &[Position] {
        &self.flat
    }
}

/// Mapping from instance to the non-empty set of bindings of one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceIndex {
    arity: usize,
    entries: Vec<InstanceOccurrences>,
}

/// Upper bound on occurrence growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum bindings a single extension step may materialise.
    pub max_bindings: Option<usize>,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("occurrence index grew past {limit} bindings ({bindings})")]
pub struct ResourceExhausted {
    pub bindings: usize,
    pub limit: usize,
}

/// Everything an extension step reads besides the parent index.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionContext<'a> {
    pub store: &'a IntervalStore,
    pub algebra: RelationAlgebra,
    pub max_gap: MaxGap,
    pub min_count: usize,
    pub frequent_symbols: &'a FnvHashSet<SymbolId>,
    pub limits: ResourceLimits,
}

/// `(symbol, relation to last)` pair with at least one witness, and the
/// number of instances witnessing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Witnessed {
    pub symbol: SymbolId,
    pub relation: TemporalRelation,
    pub instances: usize,
}

/// Child indices of one candidate, keyed by the resolved relation column.
pub type ChildIndices = Vec<(Vec<TemporalRelation>, OccurrenceIndex)>;

fn min_end(instance: &Instance, binding: &[Position]) -> Time {
    binding
        .iter()
        .map(|p| instance.interval(*p).end)
        .min()
        .unwrap_or(Time::MAX)
}

fn beyond_gap(max_gap: MaxGap, start: Time, earliest_end: Time) -> bool {
    match max_gap {
        MaxGap::Bounded(g) => start.saturating_sub(earliest_end) > g,
        MaxGap::Unbounded => false,
    }
}

impl OccurrenceIndex {
    /// Size-1 index: every interval labelled `symbol`, per instance.
    pub fn seed(store: &IntervalStore, symbol: SymbolId) -> Self {
        let entries = store
            .instances()
            .iter()
            .filter_map(|inst| {
                let positions = inst.positions_of(symbol);
                (!positions.is_empty()).then(|| InstanceOccurrences {
                    instance: inst.id(),
                    flat: positions.to_vec(),
                })
            })
            .collect();
        Self { arity: 1, entries }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of supporting instances.
    pub fn support(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[InstanceOccurrences] {
        &self.entries
    }

    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.entries.iter().map(|e| e.instance)
    }

    /// Bindings of one entry, `arity` positions each.
    pub fn bindings<'e>(&self, entry: &'e InstanceOccurrences) -> std::slice::ChunksExact<'e, Position> {
        entry.flat.chunks_exact(self.arity)
    }

    /// Total number of bindings (horizontal support).
    pub fn total_bindings(&self) -> usize {
        self.entries.iter().map(|e| e.flat.len() / self.arity).sum()
    }

    /// Scan every binding for intervals that could be appended after its last
    /// position, collecting each `(symbol, relation to last)` pair together
    /// with how many instances witness it. Pairs below the minimum count are
    /// dropped: no extension through them can be frequent.
    pub fn candidate_witnesses(&self, ctx: &ExtensionContext<'_>) -> Vec<Witnessed> {
        let mut counts: FnvHashMap<(SymbolId, TemporalRelation), usize> = FnvHashMap::default();
        let mut seen: FnvHashSet<(SymbolId, TemporalRelation)> = FnvHashSet::default();

        for entry in &self.entries {
            let inst = ctx.store.instance(entry.instance);
            seen.clear();
            for binding in self.bindings(entry) {
                let last = binding[self.arity - 1];
                let last_iv = inst.interval(last);
                let earliest_end = min_end(inst, binding);
                for pos in last as usize + 1..inst.len() {
                    let c = &inst.intervals()[pos];
                    if beyond_gap(ctx.max_gap, c.start, earliest_end) {
                        break;
                    }
                    if !ctx.frequent_symbols.contains(&c.symbol) {
                        continue;
                    }
                    if let Ok(rel) = ctx.algebra.relate(last_iv, c, ctx.max_gap) {
                        seen.insert((c.symbol, rel));
                    }
                }
            }
            for key in &seen {
                *counts.entry(*key).or_default() += 1;
            }
        }

        let mut out: Vec<Witnessed> = counts
            .into_iter()
            .filter(|(_, n)| *n >= ctx.min_count)
            .map(|((symbol, relation), instances)| Witnessed {
                symbol,
                relation,
                instances,
            })
            .collect();
        out.sort();
        out
    }

    /// Extend every binding by one interval of the candidate's symbol that
    /// stands in the candidate's relation to the binding's last interval and
    /// satisfies every other pairwise relation and the gap constraint.
    ///
    /// Results are grouped by the concrete relation column to all parent
    /// positions; groups supported by fewer than `min_count` instances are
    /// dropped. Returns no groups as soon as the remaining instances cannot
    /// reach the minimum count.
    pub fn extend(
        &self,
        candidate: &Candidate<'_>,
        ctx: &ExtensionContext<'_>,
    ) -> Result<ChildIndices, ResourceExhausted> {
        let k = self.arity;
        let symbol = candidate.symbol();
        let relation = candidate.relation_to_last();

        let mut groups: BTreeMap<Vec<TemporalRelation>, Vec<InstanceOccurrences>> = BTreeMap::new();
        let mut local: BTreeMap<Vec<TemporalRelation>, Vec<Position>> = BTreeMap::new();
        let mut column = vec![relation; k];
        let mut supported = 0usize;
        let mut remaining = self.entries.len();
        let mut materialised = 0usize;

        for entry in &self.entries {
            if supported + remaining < ctx.min_count {
                return Ok(Vec::new());
            }
            remaining -= 1;

            let inst = ctx.store.instance(entry.instance);
            let positions = inst.positions_of(symbol);
            local.clear();

            for binding in self.bindings(entry) {
                let last = binding[k - 1];
                let last_iv = inst.interval(last);
                let earliest_end = min_end(inst, binding);
                let first = positions.partition_point(|p| *p <= last);

                for &pos in &positions[first..] {
                    let c = inst.interval(pos);
                    if beyond_gap(ctx.max_gap, c.start, earliest_end) {
                        break;
                    }
                    match ctx.algebra.relate(last_iv, c, ctx.max_gap) {
                        Ok(rel) if rel == relation => {}
                        _ => continue,
                    }
                    let consistent = (0..k - 1).all(|i| {
                        match ctx.algebra.relate(inst.interval(binding[i]), c, ctx.max_gap) {
                            Ok(rel) if candidate.allowed(i).contains(rel) => {
                                column[i] = rel;
                                true
                            }
                            _ => false,
                        }
                    });
                    if !consistent {
                        continue;
                    }

                    if let Some(flat) = local.get_mut(column.as_slice()) {
                        flat.extend_from_slice(binding);
                        flat.push(pos);
                    } else {
                        let mut flat = binding.to_vec();
                        flat.push(pos);
                        local.insert(column.clone(), flat);
                    }

                    materialised += 1;
                    if let Some(limit) = ctx.limits.max_bindings {
                        if materialised > limit {
                            return Err(ResourceExhausted {
                                bindings: materialised,
                                limit,
                            });
                        }
                    }
                }
            }

            if !local.is_empty() {
                supported += 1;
                for (col, flat) in std::mem::take(&mut local) {
                    groups.entry(col).or_default().push(InstanceOccurrences {
                        instance: entry.instance,
                        flat,
                    });
                }
            }
        }

        Ok(groups
            .into_iter()
            .filter(|(_, entries)| entries.len() >= ctx.min_count)
            .map(|(col, entries)| (col, OccurrenceIndex { arity: k + 1, entries }))
            .collect())
    }
}
