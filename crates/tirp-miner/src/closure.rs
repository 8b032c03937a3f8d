//! Closure checking for closed-pattern mining.
//!
//! A frequent pattern is closed when no pattern with exactly one more
//! interval, inserted at any position, has the same support. A super-pattern
//! with equal support must occur in every instance supporting the pattern,
//! so it suffices to intersect, across those instances, the canonical forms
//! of the one-interval insertions each instance witnesses.

use fnv::FnvHashSet;

use crate::occurrence::{ExtensionContext, OccurrenceIndex};
use crate::pattern::{CanonicalForm, Pattern};
use crate::types::{MaxGap, Position, TimeInterval};

/// Whether the pattern behind `index` is closed.
///
/// Callers that already know of an appended child with equal support should
/// skip this scan: such a child settles the question.
pub fn is_closed(index: &OccurrenceIndex, ctx: &ExtensionContext<'_>) -> bool {
    let mut common: Option<FnvHashSet<CanonicalForm>> = None;

    for entry in index.entries() {
        let inst = ctx.store.instance(entry.instance());
        let mut witnessed = FnvHashSet::default();
        let mut positions: Vec<Position> = Vec::with_capacity(index.arity() + 1);
        let mut intervals: Vec<TimeInterval> = Vec::with_capacity(index.arity() + 1);

        for binding in index.bindings(entry) {
            let earliest_end = binding
                .iter()
                .map(|p| inst.interval(*p).end)
                .min()
                .unwrap_or_default();
            let last = binding[binding.len() - 1];

            for (q, iv) in inst.intervals().iter().enumerate() {
                let q = q as Position;
                if q > last {
                    if let MaxGap::Bounded(g) = ctx.max_gap {
                        if iv.start.saturating_sub(earliest_end) > g {
                            break;
                        }
                    }
                }
                if binding.contains(&q) || !ctx.frequent_symbols.contains(&iv.symbol) {
                    continue;
                }

                positions.clear();
                positions.extend_from_slice(binding);
                let at = positions.partition_point(|p| *p < q);
                positions.insert(at, q);

                intervals.clear();
                intervals.extend(positions.iter().map(|p| *inst.interval(*p)));
                if let Some(sup) = Pattern::from_intervals(&intervals, &ctx.algebra, ctx.max_gap) {
                    let form = sup.canonicalize();
                    if common.as_ref().map_or(true, |c| c.contains(&form)) {
                        witnessed.insert(form);
                    }
                }
            }
        }

        if witnessed.is_empty() {
            return true;
        }
        common = Some(witnessed);
    }

    common.map_or(true, |c| c.is_empty())
}
