//! Search Engine: parallel depth-first pattern growth.
//!
//! Every node of the search tree owns its pattern and occurrence index. A
//! node builds all of its children's indices from its own, emits itself,
//! releases its index and only then schedules the children on the worker
//! pool. Patterns grow strictly by appending an interval that comes after
//! the last bound one in instance order, so each pattern has exactly one
//! generation path and the tree never revisits a node.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};

use crate::closure;
use crate::collector::{MinedPattern, ResultCollector, Witness};
use crate::occurrence::{ExtensionContext, OccurrenceIndex, ResourceExhausted, ResourceLimits};
use crate::pattern::Pattern;
use crate::relation::{RelationAlgebra, RelationMode};
use crate::store::IntervalStore;
use crate::types::{MaxGap, MinSupport, SymbolId, TirpError, TirpResult};

/// Mining parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    pub min_support: MinSupport,
    pub max_gap: MaxGap,
    pub relations: RelationMode,
    /// Emit only closed patterns.
    pub closed_only: bool,
    /// Longest pattern to expand. With `closed_only`, a pattern at this
    /// length is still judged against one-longer super-patterns, which are
    /// never reported, so it may be suppressed without a reported superset.
    pub max_length: Option<usize>,
    /// Worker threads; 0 uses every core.
    pub threads: usize,
    pub limits: ResourceLimits,
    /// Keep every occurrence's intervals for output.
    pub record_occurrences: bool,
}

impl MinerConfig {
    pub fn new(min_support: MinSupport, max_gap: MaxGap) -> Self {
        Self {
            min_support,
            max_gap,
            relations: RelationMode::default(),
            closed_only: false,
            max_length: None,
            threads: 0,
            limits: ResourceLimits::default(),
            record_occurrences: false,
        }
    }

    pub fn with_relations(mut self, relations: RelationMode) -> Self {
        self.relations = relations;
        self
    }

    pub fn with_closed_only(mut self, closed_only: bool) -> Self {
        self.closed_only = closed_only;
        self
    }

    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_record_occurrences(mut self, record: bool) -> Self {
        self.record_occurrences = record;
        self
    }

    /// Reject parameters no run could satisfy.
    pub fn validate(&self) -> TirpResult<()> {
        if let MaxGap::Bounded(g) = self.max_gap {
            if g <= 0 {
                return Err(TirpError::InvalidInput(format!(
                    "maximal gap must be positive, got {g}"
                )));
            }
        }
        if self.max_length == Some(0) {
            return Err(TirpError::InvalidInput(
                "maximal pattern length must be at least 1".to_string(),
            ));
        }
        if self.limits.max_bindings == Some(0) {
            return Err(TirpError::InvalidInput(
                "binding limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared flag that aborts a run at the next node checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also cancel once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Lifecycle of one search-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Seeded,
    Expanding,
    Exhausted,
}

/// Whether a report holds every frequent pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    Cancelled,
    Degraded { abandoned_branches: usize, reason: String },
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Completeness::Complete => None,
            Completeness::Cancelled => Some("cancelled".to_string()),
            Completeness::Degraded {
                abandoned_branches,
                reason,
            } => Some(format!(
                "degraded: {abandoned_branches} branches abandoned ({reason})"
            )),
        }
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiningStats {
    pub frequent_symbols: usize,
    pub nodes_expanded: usize,
    pub candidates_considered: usize,
    pub infrequent_candidates: usize,
    pub inconsistent_extensions: usize,
    pub abandoned_branches: usize,
    pub closure_suppressed: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    nodes_expanded: AtomicUsize,
    candidates_considered: AtomicUsize,
    infrequent_candidates: AtomicUsize,
    inconsistent_extensions: AtomicUsize,
    abandoned_branches: AtomicUsize,
    closure_suppressed: AtomicUsize,
}

impl AtomicStats {
    fn bump(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self, frequent_symbols: usize, elapsed: Duration) -> MiningStats {
        MiningStats {
            frequent_symbols,
            nodes_expanded: self.nodes_expanded.load(Ordering::Relaxed),
            candidates_considered: self.candidates_considered.load(Ordering::Relaxed),
            infrequent_candidates: self.infrequent_candidates.load(Ordering::Relaxed),
            inconsistent_extensions: self.inconsistent_extensions.load(Ordering::Relaxed),
            abandoned_branches: self.abandoned_branches.load(Ordering::Relaxed),
            closure_suppressed: self.closure_suppressed.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Outcome of a mining run.
#[derive(Debug, Clone, Serialize)]
pub struct MiningReport {
    pub completeness: Completeness,
    pub entity_count: usize,
    pub min_support_count: usize,
    pub config: MinerConfig,
    pub stats: MiningStats,
    pub patterns: Vec<MinedPattern>,
}

struct Node {
    pattern: Pattern,
    index: OccurrenceIndex,
}

struct Search<'s> {
    store: &'s IntervalStore,
    config: &'s MinerConfig,
    algebra: RelationAlgebra,
    min_count: usize,
    frequent: FnvHashSet<SymbolId>,
    collector: ResultCollector,
    stats: AtomicStats,
    cancel: &'s CancellationToken,
    cancelled: AtomicBool,
    exhausted: OnceLock<ResourceExhausted>,
}

impl<'s> Search<'s> {
    fn context(&self) -> ExtensionContext<'_> {
        ExtensionContext {
            store: self.store,
            algebra: self.algebra,
            max_gap: self.config.max_gap,
            min_count: self.min_count,
            frequent_symbols: &self.frequent,
            limits: self.config.limits,
        }
    }

    fn expand<'a>(&'a self, scope: &rayon::Scope<'a>, node: Node) {
        if self.cancel.is_cancelled() {
            self.cancelled.store(true, Ordering::Relaxed);
            return;
        }
        tracing::trace!(pattern = %node.pattern, state = ?NodeState::Expanding, "node");
        AtomicStats::bump(&self.stats.nodes_expanded, 1);

        let ctx = self.context();
        let support = node.index.support();
        let can_grow = self
            .config
            .max_length
            .map_or(true, |max| node.pattern.len() < max);

        let mut children = Vec::new();
        let mut equal_support_child = false;

        if can_grow {
            let witnessed = node.index.candidate_witnesses(&ctx);
            AtomicStats::bump(&self.stats.candidates_considered, witnessed.len());

            for w in witnessed {
                let candidate = match node.pattern.extend(w.symbol, w.relation, &self.algebra) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        tracing::trace!(pattern = %node.pattern, symbol = w.symbol, "{e}");
                        AtomicStats::bump(&self.stats.inconsistent_extensions, 1);
                        continue;
                    }
                };
                match node.index.extend(&candidate, &ctx) {
                    Ok(groups) if groups.is_empty() => {
                        AtomicStats::bump(&self.stats.infrequent_candidates, 1);
                    }
                    Ok(groups) => {
                        for (column, index) in groups {
                            equal_support_child |= index.support() == support;
                            children.push(Node {
                                pattern: candidate.resolve(&column),
                                index,
                            });
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            pattern = %node.pattern,
                            symbol = w.symbol,
                            relation = %w.relation,
                            "Abandoning branch: {e}"
                        );
                        AtomicStats::bump(&self.stats.abandoned_branches, 1);
                        let _ = self.exhausted.set(e);
                    }
                }
            }
        }

        let emit = !self.config.closed_only
            || (!equal_support_child && closure::is_closed(&node.index, &ctx));
        if emit {
            self.collector.insert(self.mined(&node));
        } else {
            AtomicStats::bump(&self.stats.closure_suppressed, 1);
        }

        let Node { pattern, index } = node;
        drop(index);
        tracing::trace!(%pattern, state = ?NodeState::Exhausted, children = children.len(), "node");

        for child in children {
            scope.spawn(move |s| self.expand(s, child));
        }
    }

    fn mined(&self, node: &Node) -> MinedPattern {
        let index = &node.index;
        let mined = MinedPattern::new(node.pattern.clone(), index.support(), self.store.entity_count())
            .with_occurrences(index.total_bindings());
        if !self.config.record_occurrences {
            return mined;
        }
        let mut witnesses = Vec::new();
        for entry in index.entries() {
            let inst = self.store.instance(entry.instance());
            for binding in index.bindings(entry) {
                witnesses.push(Witness {
                    entity: inst.name().to_string(),
                    intervals: binding.iter().map(|p| *inst.interval(*p)).collect(),
                });
            }
        }
        mined.with_witnesses(witnesses)
    }
}

/// Frequent TIRP miner over one interval store.
pub struct Miner<'s> {
    store: &'s IntervalStore,
    config: MinerConfig,
    cancel: CancellationToken,
}

impl<'s> Miner<'s> {
    pub fn new(store: &'s IntervalStore, config: MinerConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Mine every frequent pattern. Input problems fail before any search;
    /// cancellation and resource exhaustion yield a flagged partial report.
    pub fn run(&self) -> TirpResult<MiningReport> {
        self.config.validate()?;
        let started = Instant::now();
        let entity_count = self.store.entity_count();
        let min_count = self.config.min_support.required_count(entity_count)?;

        tracing::info!(
            "Mining {} entities: min support {} ({} instances), max gap {}, {:?} relations",
            entity_count,
            self.config.min_support,
            min_count,
            self.config.max_gap,
            self.config.relations
        );

        let mut seeds = Vec::new();
        for &symbol in self.store.symbols() {
            let index = OccurrenceIndex::seed(self.store, symbol);
            if index.support() >= min_count {
                tracing::debug!(symbol, support = index.support(), state = ?NodeState::Seeded, "node");
                seeds.push(Node {
                    pattern: Pattern::singleton(symbol),
                    index,
                });
            }
        }
        let frequent: FnvHashSet<SymbolId> = seeds.iter().map(|n| n.pattern.last_symbol()).collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| TirpError::WorkerPool(e.to_string()))?;

        let search = Search {
            store: self.store,
            config: &self.config,
            algebra: RelationAlgebra::new(self.config.relations),
            min_count,
            frequent,
            collector: ResultCollector::new(),
            stats: AtomicStats::default(),
            cancel: &self.cancel,
            cancelled: AtomicBool::new(false),
            exhausted: OnceLock::new(),
        };

        pool.install(|| {
            rayon::scope(|scope| {
                let search = &search;
                for node in seeds {
                    scope.spawn(move |s| search.expand(s, node));
                }
            })
        });

        let stats = search.stats.snapshot(search.frequent.len(), started.elapsed());
        let completeness = if search.cancelled.load(Ordering::Relaxed) {
            tracing::warn!("Mining cancelled; results are partial");
            Completeness::Cancelled
        } else if let Some(e) = search.exhausted.into_inner() {
            Completeness::Degraded {
                abandoned_branches: stats.abandoned_branches,
                reason: e.to_string(),
            }
        } else {
            Completeness::Complete
        };

        let patterns = search.collector.finalize();
        tracing::info!(
            "Mined {} patterns in {} ms ({:?})",
            patterns.len(),
            stats.elapsed_ms,
            completeness
        );

        Ok(MiningReport {
            completeness,
            entity_count,
            min_support_count: min_count,
            config: self.config.clone(),
            stats,
            patterns,
        })
    }
}
