//! Result Collector: the single synchronisation point of a mining run.

use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::pattern::{CanonicalForm, Pattern};
use crate::types::TimeInterval;

/// One concrete occurrence of a pattern, for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Witness {
    pub entity: String,
    pub intervals: Vec<TimeInterval>,
}

/// A frequent pattern with its support figures.
#[derive(Debug, Clone, Serialize)]
pub struct MinedPattern {
    pub pattern: Pattern,
    /// Number of supporting instances.
    pub support: usize,
    pub support_ratio: f64,
    /// Total occurrences across supporting instances.
    pub occurrences: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub witnesses: Vec<Witness>,
}

impl MinedPattern {
    pub fn new(pattern: Pattern, support: usize, entity_count: usize) -> Self {
        let support_ratio = if entity_count == 0 {
            0.0
        } else {
            support as f64 / entity_count as f64
        };
        Self {
            pattern,
            support,
            support_ratio,
            occurrences: support,
            witnesses: Vec::new(),
        }
    }

    pub fn with_occurrences(mut self, occurrences: usize) -> Self {
        self.occurrences = occurrences;
        self
    }

    pub fn with_witnesses(mut self, witnesses: Vec<Witness>) -> Self {
        self.witnesses = witnesses;
        self
    }

    /// Mean occurrences per supporting instance.
    pub fn mean_horizontal_support(&self) -> f64 {
        if self.support == 0 {
            0.0
        } else {
            self.occurrences as f64 / self.support as f64
        }
    }
}

/// Accumulates emitted patterns keyed by canonical form.
#[derive(Debug, Default)]
pub struct ResultCollector {
    patterns: Mutex<FnvHashMap<CanonicalForm, MinedPattern>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pattern. Re-inserting a canonical form already present is a
    /// no-op; returns whether the pattern was new.
    pub fn insert(&self, mined: MinedPattern) -> bool {
        let key = mined.pattern.canonicalize();
        let mut patterns = self.patterns.lock();
        if patterns.contains_key(&key) {
            return false;
        }
        patterns.insert(key, mined);
        true
    }

    pub fn len(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.lock().is_empty()
    }

    /// Drain into descending support, then ascending canonical form.
    pub fn finalize(self) -> Vec<MinedPattern> {
        let mut entries: Vec<(CanonicalForm, MinedPattern)> =
            self.patterns.into_inner().into_iter().collect();
        entries.sort_by(|(ka, a), (kb, b)| b.support.cmp(&a.support).then_with(|| ka.cmp(kb)));
        entries.into_iter().map(|(_, mined)| mined).collect()
    }
}
