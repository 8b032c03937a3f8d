//! Relation Algebra: qualitative temporal relations between two intervals.
//!
//! Pairs are always related in instance order (start, then end), so only the
//! seven "forward" Allen relations can occur. Classification uses a fixed
//! priority so that boundary-equal pairs (including zero-length intervals)
//! map to exactly one relation:
//!
//! before, meets, equals, contains, starts, finished-by, overlaps.
//!
//! The composition table is derived from the classifier itself by exhaustive
//! enumeration of small interval triples, which keeps it consistent with the
//! priority rules for degenerate intervals as well as proper ones.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::types::{MaxGap, TimeInterval};

/// Relation of an earlier interval `a` to a later interval `b`.
///
/// Discriminant order is the canonical order used when comparing patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TemporalRelation {
    Before = 0,
    Meets = 1,
    Overlaps = 2,
    FinishedBy = 3,
    Contains = 4,
    Equals = 5,
    Starts = 6,
}

impl TemporalRelation {
    pub const ALL: [TemporalRelation; 7] = [
        TemporalRelation::Before,
        TemporalRelation::Meets,
        TemporalRelation::Overlaps,
        TemporalRelation::FinishedBy,
        TemporalRelation::Contains,
        TemporalRelation::Equals,
        TemporalRelation::Starts,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Single-character code used in text output.
    pub fn code(self) -> char {
        match self {
            TemporalRelation::Before => '<',
            TemporalRelation::Meets => 'm',
            TemporalRelation::Overlaps => 'o',
            TemporalRelation::FinishedBy => 'f',
            TemporalRelation::Contains => 'c',
            TemporalRelation::Equals => '=',
            TemporalRelation::Starts => 'S',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == c)
    }

    /// Relations whose validity depends on the maximal gap.
    pub fn is_gap_sensitive(self) -> bool {
        matches!(self, TemporalRelation::Before | TemporalRelation::Meets)
    }
}

impl std::fmt::Display for TemporalRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Bit set of temporal relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelationSet(u8);

impl RelationSet {
    pub const EMPTY: RelationSet = RelationSet(0);
    pub const FULL: RelationSet = RelationSet(0b0111_1111);

    pub fn single(r: TemporalRelation) -> Self {
        RelationSet(1 << r.index())
    }

    pub fn insert(&mut self, r: TemporalRelation) {
        self.0 |= 1 << r.index();
    }

    pub fn contains(&self, r: TemporalRelation) -> bool {
        self.0 & (1 << r.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn intersect(self, other: RelationSet) -> RelationSet {
        RelationSet(self.0 & other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = TemporalRelation> {
        TemporalRelation::ALL
            .into_iter()
            .filter(move |r| self.contains(*r))
    }
}

impl FromIterator<TemporalRelation> for RelationSet {
    fn from_iter<I: IntoIterator<Item = TemporalRelation>>(iter: I) -> Self {
        let mut set = RelationSet::EMPTY;
        for r in iter {
            set.insert(r);
        }
        set
    }
}

/// Which relation vocabulary patterns are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    /// The seven forward Allen relations.
    #[default]
    Allen,
    /// Three relations: before (absorbing meets), overlaps, and contains
    /// (absorbing finished-by, starts and equals).
    Coarse,
}

impl RelationMode {
    /// Map a fine relation onto this mode's vocabulary.
    pub fn project(self, r: TemporalRelation) -> TemporalRelation {
        match self {
            RelationMode::Allen => r,
            RelationMode::Coarse => match r {
                TemporalRelation::Before | TemporalRelation::Meets => TemporalRelation::Before,
                TemporalRelation::Overlaps => TemporalRelation::Overlaps,
                TemporalRelation::FinishedBy
                | TemporalRelation::Contains
                | TemporalRelation::Equals
                | TemporalRelation::Starts => TemporalRelation::Contains,
            },
        }
    }

    pub fn vocabulary(self) -> RelationSet {
        TemporalRelation::ALL.into_iter().map(|r| self.project(r)).collect()
    }
}

impl std::str::FromStr for RelationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allen" | "7" => Ok(RelationMode::Allen),
            "coarse" | "3" => Ok(RelationMode::Coarse),
            other => Err(format!("unknown relation mode '{other}' (expected allen or coarse)")),
        }
    }
}

/// Why a pair of intervals could not be related.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidPair {
    #[error("second interval precedes the first in instance order")]
    Unordered,

    #[error("gap of {gap} exceeds the maximal gap")]
    GapExceeded { gap: i64 },
}

/// Classify `a` against `b` ignoring the gap constraint.
///
/// Returns `None` when `b` precedes `a` in (start, end) order.
pub fn classify(a: &TimeInterval, b: &TimeInterval) -> Option<TemporalRelation> {
    if (a.start, a.end) > (b.start, b.end) {
        return None;
    }
    let rel = if a.end < b.start {
        TemporalRelation::Before
    } else if a.end == b.start {
        TemporalRelation::Meets
    } else if a.start == b.start && a.end == b.end {
        TemporalRelation::Equals
    } else if a.start < b.start && a.end > b.end {
        TemporalRelation::Contains
    } else if a.start == b.start {
        TemporalRelation::Starts
    } else if a.end == b.end {
        TemporalRelation::FinishedBy
    } else {
        TemporalRelation::Overlaps
    };
    Some(rel)
}

type CompositionTable = [[RelationSet; 7]; 7];

static ALLEN_TABLE: OnceLock<CompositionTable> = OnceLock::new();
static COARSE_TABLE: OnceLock<CompositionTable> = OnceLock::new();

fn derive_table(mode: RelationMode) -> CompositionTable {
    // Six distinct endpoint values realise every ordering of three intervals.
    const SPAN: i64 = 6;
    let mut intervals = Vec::new();
    for start in 0..SPAN {
        for end in start..SPAN {
            intervals.push(TimeInterval::new(0, start, end));
        }
    }

    let mut table = [[RelationSet::EMPTY; 7]; 7];
    for a in &intervals {
        for b in &intervals {
            let Some(ab) = classify(a, b) else { continue };
            for c in &intervals {
                let (Some(bc), Some(ac)) = (classify(b, c), classify(a, c)) else {
                    continue;
                };
                table[mode.project(ab).index()][mode.project(bc).index()].insert(mode.project(ac));
            }
        }
    }
    table
}

/// Mode-aware relation operations.
#[derive(Debug, Clone, Copy)]
pub struct RelationAlgebra {
    mode: RelationMode,
    table: &'static CompositionTable,
}

impl RelationAlgebra {
    pub fn new(mode: RelationMode) -> Self {
        let table = match mode {
            RelationMode::Allen => ALLEN_TABLE.get_or_init(|| derive_table(RelationMode::Allen)),
            RelationMode::Coarse => COARSE_TABLE.get_or_init(|| derive_table(RelationMode::Coarse)),
        };
        Self { mode, table }
    }

    pub fn mode(&self) -> RelationMode {
        self.mode
    }

    /// Relate `a` to the later interval `b` under the maximal gap.
    pub fn relate(
        &self,
        a: &TimeInterval,
        b: &TimeInterval,
        max_gap: MaxGap,
    ) -> Result<TemporalRelation, InvalidPair> {
        let rel = classify(a, b).ok_or(InvalidPair::Unordered)?;
        if rel.is_gap_sensitive() {
            let gap = b.start.saturating_sub(a.end);
            if !max_gap.admits(gap) {
                return Err(InvalidPair::GapExceeded { gap });
            }
        }
        Ok(self.mode.project(rel))
    }

    /// Possible relations of `a` to `c` given `a r1 b` and `b r2 c`.
    pub fn compose(&self, r1: TemporalRelation, r2: TemporalRelation) -> RelationSet {
        self.table[r1.index()][r2.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TemporalRelation::*;

    fn iv(start: i64, end: i64) -> TimeInterval {
        TimeInterval::new(1, start, end)
    }

    #[test]
    fn test_classify_all_relations() {
        assert_eq!(classify(&iv(0, 2), &iv(3, 5)), Some(Before));
        assert_eq!(classify(&iv(0, 3), &iv(3, 5)), Some(Meets));
        assert_eq!(classify(&iv(0, 4), &iv(3, 5)), Some(Overlaps));
        assert_eq!(classify(&iv(0, 5), &iv(3, 5)), Some(FinishedBy));
        assert_eq!(classify(&iv(0, 9), &iv(3, 5)), Some(Contains));
        assert_eq!(classify(&iv(3, 5), &iv(3, 5)), Some(Equals));
        assert_eq!(classify(&iv(3, 4), &iv(3, 5)), Some(Starts));
        assert_eq!(classify(&iv(3, 5), &iv(0, 2)), None);
    }

    #[test]
    fn test_point_intervals_resolve_by_priority() {
        assert_eq!(classify(&iv(3, 3), &iv(3, 5)), Some(Meets));
        assert_eq!(classify(&iv(3, 3), &iv(3, 3)), Some(Meets));
        assert_eq!(classify(&iv(0, 5), &iv(5, 5)), Some(Meets));
        assert_eq!(classify(&iv(0, 5), &iv(2, 2)), Some(Contains));
    }

    #[test]
    fn test_relate_respects_gap() {
        let algebra = RelationAlgebra::new(RelationMode::Allen);
        let a = iv(0, 2);
        assert_eq!(algebra.relate(&a, &iv(5, 6), MaxGap::Bounded(3)), Ok(Before));
        assert_eq!(
            algebra.relate(&a, &iv(6, 7), MaxGap::Bounded(3)),
            Err(InvalidPair::GapExceeded { gap: 4 })
        );
        assert_eq!(algebra.relate(&a, &iv(60, 70), MaxGap::Unbounded), Ok(Before));
        assert_eq!(algebra.relate(&iv(0, 9), &iv(1, 2), MaxGap::Bounded(1)), Ok(Contains));
    }

    #[test]
    fn test_relate_far_apart_endpoints() {
        let algebra = RelationAlgebra::new(RelationMode::Allen);
        let a = iv(-4_000_000_000_000_000_000, -4_000_000_000_000_000_000);
        let b = iv(6_000_000_000_000_000_000, 6_000_000_000_000_000_000);
        assert_eq!(algebra.relate(&a, &b, MaxGap::Unbounded), Ok(Before));
        assert_eq!(
            algebra.relate(&a, &b, MaxGap::Bounded(3)),
            Err(InvalidPair::GapExceeded { gap: i64::MAX })
        );
    }

    #[test]
    fn test_coarse_projection() {
        let algebra = RelationAlgebra::new(RelationMode::Coarse);
        assert_eq!(algebra.relate(&iv(0, 3), &iv(3, 5), MaxGap::Unbounded), Ok(Before));
        assert_eq!(algebra.relate(&iv(3, 4), &iv(3, 5), MaxGap::Unbounded), Ok(Contains));
        assert_eq!(RelationMode::Coarse.vocabulary().len(), 3);
    }

    #[test]
    fn test_compose_known_entries() {
        let algebra = RelationAlgebra::new(RelationMode::Allen);
        assert_eq!(algebra.compose(Before, Before), RelationSet::single(Before));
        assert_eq!(algebra.compose(Contains, Contains), RelationSet::single(Contains));
        for r in TemporalRelation::ALL {
            assert_eq!(algebra.compose(Equals, r), RelationSet::single(r));
        }
        let oo = algebra.compose(Overlaps, Overlaps);
        assert!(oo.contains(Before) && oo.contains(Meets) && oo.contains(Overlaps));
        assert!(!oo.contains(Contains));
        assert!(algebra.compose(Meets, Meets).contains(Before));
    }

    #[test]
    fn test_compose_never_empty_for_forward_relations() {
        for mode in [RelationMode::Allen, RelationMode::Coarse] {
            let algebra = RelationAlgebra::new(mode);
            for r1 in mode.vocabulary().iter() {
                for r2 in mode.vocabulary().iter() {
                    assert!(!algebra.compose(r1, r2).is_empty(), "{mode:?} {r1} {r2}");
                }
            }
        }
    }

    #[test]
    fn test_codes_roundtrip() {
        for r in TemporalRelation::ALL {
            assert_eq!(TemporalRelation::from_code(r.code()), Some(r));
            assert_eq!(TemporalRelation::from_index(r.index()), Some(r));
        }
    }
}
