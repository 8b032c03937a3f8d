//! Interval Store: immutable per-instance interval sequences.

use fnv::{FnvHashMap, FnvHashSet};

use crate::types::{InstanceId, Position, SymbolId, Time, TimeInterval, TirpError, TirpResult};

/// One entity's full interval sequence, ordered by start, end, then symbol.
#[derive(Debug, Clone)]
pub struct Instance {
    id: InstanceId,
    name: String,
    intervals: Vec<TimeInterval>,
    by_symbol: FnvHashMap<SymbolId, Vec<Position>>,
}

impl Instance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// External entity identifier as given in the input.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    pub fn interval(&self, pos: Position) -> &TimeInterval {
        &self.intervals[pos as usize]
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Ascending positions of every interval labelled `symbol`.
    pub fn positions_of(&self, symbol: SymbolId) -> &[Position] {
        self.by_symbol.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Read-only collection of instances shared by every mining task.
#[derive(Debug, Clone)]
pub struct IntervalStore {
    instances: Vec<Instance>,
    entity_count: usize,
    symbols: Vec<SymbolId>,
}

impl IntervalStore {
    pub fn builder() -> IntervalStoreBuilder {
        IntervalStoreBuilder::default()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id as usize]
    }

    /// Number of entities support ratios are computed against: the declared
    /// entity count when one was given, otherwise the number of instances.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Distinct symbols in ascending order.
    pub fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub fn interval_count(&self) -> usize {
        self.instances.iter().map(Instance::len).sum()
    }
}

/// Collects raw instances and validates them into an [`IntervalStore`].
#[derive(Debug, Default)]
pub struct IntervalStoreBuilder {
    raw: Vec<(String, Vec<TimeInterval>)>,
    declared_entities: Option<usize>,
    symbol_domain: Option<FnvHashSet<SymbolId>>,
    time_bounds: Option<(Time, Time)>,
}

impl IntervalStoreBuilder {
    /// Add one entity instance.
    pub fn instance(mut self, name: impl Into<String>, intervals: Vec<TimeInterval>) -> Self {
        self.raw.push((name.into(), intervals));
        self
    }

    pub fn push_instance(&mut self, name: impl Into<String>, intervals: Vec<TimeInterval>) {
        self.raw.push((name.into(), intervals));
    }

    /// Declare the dataset's entity count; it must cover every instance.
    pub fn declared_entities(mut self, count: usize) -> Self {
        self.declared_entities = Some(count);
        self
    }

    /// Restrict symbols to a declared vocabulary.
    pub fn symbol_domain(mut self, symbols: impl IntoIterator<Item = SymbolId>) -> Self {
        self.symbol_domain = Some(symbols.into_iter().collect());
        self
    }

    /// Restrict interval endpoints to `[lo, hi]`.
    pub fn time_bounds(mut self, lo: Time, hi: Time) -> Self {
        self.time_bounds = Some((lo, hi));
        self
    }

    /// Validate all intervals and freeze the store.
    pub fn build(self) -> TirpResult<IntervalStore> {
        if let Some(declared) = self.declared_entities {
            if declared < self.raw.len() {
                return Err(TirpError::InvalidInput(format!(
                    "declared {declared} entities but the dataset holds {} instances",
                    self.raw.len()
                )));
            }
        }

        let mut seen_names = FnvHashSet::default();
        let mut symbols = FnvHashSet::default();
        let mut instances = Vec::with_capacity(self.raw.len());

        for (idx, (name, mut intervals)) in self.raw.into_iter().enumerate() {
            if !seen_names.insert(name.clone()) {
                return Err(TirpError::InvalidInput(format!(
                    "duplicate entity id '{name}'"
                )));
            }

            for iv in &intervals {
                if iv.start > iv.end {
                    return Err(TirpError::InvalidInput(format!(
                        "entity '{name}': interval of symbol {} starts after it ends ({} > {})",
                        iv.symbol, iv.start, iv.end
                    )));
                }
                if let Some(domain) = &self.symbol_domain {
                    if !domain.contains(&iv.symbol) {
                        return Err(TirpError::InvalidInput(format!(
                            "entity '{name}': unknown symbol {}",
                            iv.symbol
                        )));
                    }
                }
                if let Some((lo, hi)) = self.time_bounds {
                    if iv.start < lo || iv.end > hi {
                        return Err(TirpError::InvalidInput(format!(
                            "entity '{name}': interval {iv} outside time bounds [{lo}, {hi}]"
                        )));
                    }
                }
                symbols.insert(iv.symbol);
            }

            intervals.sort_by_key(TimeInterval::order_key);

            let mut by_symbol: FnvHashMap<SymbolId, Vec<Position>> = FnvHashMap::default();
            for (pos, iv) in intervals.iter().enumerate() {
                by_symbol.entry(iv.symbol).or_default().push(pos as Position);
            }

            instances.push(Instance {
                id: idx as InstanceId,
                name,
                intervals,
                by_symbol,
            });
        }

        let mut symbols: Vec<SymbolId> = symbols.into_iter().collect();
        symbols.sort_unstable();

        let entity_count = self.declared_entities.unwrap_or(instances.len());

        tracing::debug!(
            "Built interval store: {} instances, {} symbols, {} entities",
            instances.len(),
            symbols.len(),
            entity_count
        );

        Ok(IntervalStore {
            instances,
            entity_count,
            symbols,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(symbol: SymbolId, start: Time, end: Time) -> TimeInterval {
        TimeInterval::new(symbol, start, end)
    }

    #[test]
    fn test_intervals_sorted_by_start_end_symbol() {
        let store = IntervalStore::builder()
            .instance("e1", vec![iv(2, 5, 9), iv(3, 0, 4), iv(1, 0, 4), iv(1, 0, 2)])
            .build()
            .unwrap();
        let keys: Vec<_> = store.instance(0).intervals().iter().map(|i| i.order_key()).collect();
        assert_eq!(keys, vec![(0, 2, 1), (0, 4, 1), (0, 4, 3), (5, 9, 2)]);
        assert_eq!(store.instance(0).positions_of(1), &[0, 1]);
        assert_eq!(store.instance(0).positions_of(7), &[] as &[Position]);
    }

    #[test]
    fn test_rejects_reversed_interval() {
        let err = IntervalStore::builder()
            .instance("e1", vec![iv(1, 5, 2)])
            .build()
            .unwrap_err();
        assert!(matches!(err, TirpError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_duplicate_entity() {
        let result = IntervalStore::builder()
            .instance("e1", vec![iv(1, 0, 1)])
            .instance("e1", vec![iv(1, 0, 1)])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_declared_entities() {
        let store = IntervalStore::builder()
            .instance("e1", vec![iv(1, 0, 1)])
            .declared_entities(4)
            .build()
            .unwrap();
        assert_eq!(store.entity_count(), 4);

        let too_few = IntervalStore::builder()
            .instance("e1", vec![iv(1, 0, 1)])
            .instance("e2", vec![iv(1, 0, 1)])
            .declared_entities(1)
            .build();
        assert!(too_few.is_err());
    }

    #[test]
    fn test_domain_checks() {
        let bad_symbol = IntervalStore::builder()
            .instance("e1", vec![iv(9, 0, 1)])
            .symbol_domain([1, 2])
            .build();
        assert!(bad_symbol.is_err());

        let bad_time = IntervalStore::builder()
            .instance("e1", vec![iv(1, -5, 1)])
            .time_bounds(0, 100)
            .build();
        assert!(bad_time.is_err());
    }

    #[test]
    fn test_symbols_distinct_sorted() {
        let store = IntervalStore::builder()
            .instance("e1", vec![iv(5, 0, 1), iv(2, 1, 3)])
            .instance("e2", vec![iv(2, 0, 1)])
            .build()
            .unwrap();
        assert_eq!(store.symbols(), &[2, 5]);
        assert_eq!(store.interval_count(), 3);
    }
}
