//! Pattern Representation: symbol sequence plus its pairwise relation matrix.
//!
//! Symbols appear in instance order (start, end, symbol), so the relation of
//! position `i` to a later position `j` is always one of the forward
//! relations. The upper triangle is stored column by column: appending a
//! symbol appends one column, which is how patterns grow during search.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::relation::{RelationAlgebra, RelationSet, TemporalRelation};
use crate::types::{MaxGap, SymbolId, TimeInterval, TirpError, TirpResult};

/// Index of `(i, j)`, `i < j`, in the column-major upper triangle.
fn tri_index(i: usize, j: usize) -> usize {
    debug_assert!(i < j);
    j * (j - 1) / 2 + i
}

/// A Time-Intervals-Related Pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pattern {
    symbols: Vec<SymbolId>,
    relations: Vec<TemporalRelation>,
}

/// Stable, hashable encoding of a pattern: `[k, symbols.., relations..]`
/// with relations row-major. Ordering puts shorter patterns first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalForm(Box<[u32]>);

impl CanonicalForm {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl std::fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let k = self.0[0] as usize;
        let symbols: Vec<String> = self.0[1..=k].iter().map(|s| s.to_string()).collect();
        write!(f, "{k} {}", symbols.join("-"))?;
        if k > 1 {
            f.write_str(" ")?;
            for code in &self.0[k + 1..] {
                let rel = TemporalRelation::from_index(*code as usize).ok_or(std::fmt::Error)?;
                write!(f, "{rel}.")?;
            }
        }
        Ok(())
    }
}

/// No relation between the new symbol and some existing position survives
/// composition, so the extension can never be instantiated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no consistent relation between the new symbol and position {position}")]
pub struct InconsistentExtension {
    pub position: usize,
}

/// A one-symbol extension whose relation to the last position is fixed and
/// whose relations to earlier positions are narrowed to candidate sets.
#[derive(Debug, Clone)]
pub struct Candidate<'p> {
    parent: &'p Pattern,
    symbol: SymbolId,
    allowed: Vec<RelationSet>,
}

impl<'p> Candidate<'p> {
    pub fn parent(&self) -> &'p Pattern {
        self.parent
    }

    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    pub fn relation_to_last(&self) -> TemporalRelation {
        self.allowed[self.allowed.len() - 1]
            .iter()
            .next()
            .unwrap_or(TemporalRelation::Before)
    }

    /// Relations still admissible between position `i` and the new symbol.
    pub fn allowed(&self, i: usize) -> RelationSet {
        self.allowed[i]
    }

    /// Fix the new column to concrete relations, producing the child pattern.
    pub fn resolve(&self, column: &[TemporalRelation]) -> Pattern {
        debug_assert_eq!(column.len(), self.parent.len());
        debug_assert!(column.iter().enumerate().all(|(i, r)| self.allowed[i].contains(*r)));
        let mut symbols = self.parent.symbols.clone();
        symbols.push(self.symbol);
        let mut relations = Vec::with_capacity(self.parent.relations.len() + column.len());
        relations.extend_from_slice(&self.parent.relations);
        relations.extend_from_slice(column);
        Pattern { symbols, relations }
    }
}

impl Pattern {
    /// Size-1 pattern.
    pub fn singleton(symbol: SymbolId) -> Self {
        Self {
            symbols: vec![symbol],
            relations: Vec::new(),
        }
    }

    /// Build a pattern from symbols and a row-major relation list
    /// `(0,1), (0,2), .., (0,k-1), (1,2), ..`, validating it.
    pub fn from_parts(
        symbols: Vec<SymbolId>,
        row_major: &[TemporalRelation],
        algebra: &RelationAlgebra,
    ) -> TirpResult<Self> {
        let k = symbols.len();
        if k == 0 {
            return Err(TirpError::InvalidInput("pattern has no symbols".to_string()));
        }
        if row_major.len() != k * (k - 1) / 2 {
            return Err(TirpError::InvalidInput(format!(
                "pattern of {k} symbols needs {} relations, got {}",
                k * (k - 1) / 2,
                row_major.len()
            )));
        }

        let mut relations = vec![TemporalRelation::Before; row_major.len()];
        let mut it = row_major.iter();
        for i in 0..k {
            for j in i + 1..k {
                if let Some(r) = it.next() {
                    relations[tri_index(i, j)] = *r;
                }
            }
        }
        let pattern = Self { symbols, relations };

        let vocabulary = algebra.mode().vocabulary();
        for j in 1..k {
            for i in 0..j {
                let r = pattern.relation(i, j);
                if !vocabulary.contains(r) {
                    return Err(TirpError::InvalidInput(format!(
                        "relation {r} is outside the {:?} vocabulary",
                        algebra.mode()
                    )));
                }
                if r == TemporalRelation::Equals && pattern.symbols[i] > pattern.symbols[j] {
                    return Err(TirpError::InvalidInput(format!(
                        "equal intervals at {i} and {j} are not in symbol order"
                    )));
                }
            }
        }
        for i in 0..k {
            for j in i + 1..k {
                for l in j + 1..k {
                    let implied = algebra.compose(pattern.relation(i, j), pattern.relation(j, l));
                    if !implied.contains(pattern.relation(i, l)) {
                        return Err(TirpError::InvalidInput(format!(
                            "relation ({i},{l}) contradicts ({i},{j}) and ({j},{l})"
                        )));
                    }
                }
            }
        }
        Ok(pattern)
    }

    /// Pattern instantiated by intervals given in instance order, or `None`
    /// if they are out of order or some pair violates the maximal gap.
    pub fn from_intervals(
        intervals: &[TimeInterval],
        algebra: &RelationAlgebra,
        max_gap: MaxGap,
    ) -> Option<Self> {
        if intervals.is_empty()
            || intervals.windows(2).any(|w| w[0].order_key() > w[1].order_key())
        {
            return None;
        }
        let k = intervals.len();
        let mut relations = Vec::with_capacity(k * (k - 1) / 2);
        for j in 1..k {
            for i in 0..j {
                relations.push(algebra.relate(&intervals[i], &intervals[j], max_gap).ok()?);
            }
        }
        Some(Self {
            symbols: intervals.iter().map(|iv| iv.symbol).collect(),
            relations,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub fn last_symbol(&self) -> SymbolId {
        self.symbols[self.symbols.len() - 1]
    }

    /// Relation of position `i` to position `j`, `i < j`.
    pub fn relation(&self, i: usize, j: usize) -> TemporalRelation {
        self.relations[tri_index(i, j)]
    }

    /// Relations in row-major order, as printed.
    pub fn row_major_relations(&self) -> Vec<TemporalRelation> {
        let k = self.len();
        let mut out = Vec::with_capacity(self.relations.len());
        for i in 0..k {
            for j in i + 1..k {
                out.push(self.relation(i, j));
            }
        }
        out
    }

    /// Append `symbol` with `relation_to_last` to the current last position,
    /// narrowing the relations to every earlier position by composition.
    pub fn extend(
        &self,
        symbol: SymbolId,
        relation_to_last: TemporalRelation,
        algebra: &RelationAlgebra,
    ) -> Result<Candidate<'_>, InconsistentExtension> {
        let k = self.len();
        let vocabulary = algebra.mode().vocabulary();
        let mut allowed = vec![vocabulary; k];

        // Equal intervals are ordered by symbol.
        for (i, set) in allowed.iter_mut().enumerate() {
            if symbol < self.symbols[i] {
                *set = set.intersect(without(vocabulary, TemporalRelation::Equals));
            }
        }

        allowed[k - 1] = allowed[k - 1].intersect(RelationSet::single(relation_to_last));
        if allowed[k - 1].is_empty() {
            return Err(InconsistentExtension { position: k - 1 });
        }

        for i in (0..k - 1).rev() {
            let mut narrowed = allowed[i];
            for m in i + 1..k {
                let via_m: RelationSet = allowed[m]
                    .iter()
                    .flat_map(|r_m| algebra.compose(self.relation(i, m), r_m).iter())
                    .collect();
                narrowed = narrowed.intersect(via_m);
                if narrowed.is_empty() {
                    return Err(InconsistentExtension { position: i });
                }
            }
            allowed[i] = narrowed;
        }

        Ok(Candidate {
            parent: self,
            symbol,
            allowed,
        })
    }

    /// Stable encoding used for deduplication and ordering.
    pub fn canonicalize(&self) -> CanonicalForm {
        let k = self.len();
        let mut words = Vec::with_capacity(1 + k + self.relations.len());
        words.push(k as u32);
        words.extend_from_slice(&self.symbols);
        words.extend(self.row_major_relations().into_iter().map(|r| r.index() as u32));
        CanonicalForm(words.into_boxed_slice())
    }
}

fn without(set: RelationSet, r: TemporalRelation) -> RelationSet {
    set.iter().filter(|x| *x != r).collect()
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Pattern", 2)?;
        state.serialize_field("symbols", &self.symbols)?;
        state.serialize_field("relations", &self.row_major_relations())?;
        state.end()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonicalize())
    }
}
