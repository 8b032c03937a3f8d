//! Frequent Time-Intervals-Related Pattern (TIRP) mining over symbolic interval data.

pub mod closure;
pub mod collector;
pub mod engine;
pub mod format;
pub mod occurrence;
pub mod pattern;
pub mod relation;
pub mod store;
pub mod types;

pub use collector::{MinedPattern, ResultCollector, Witness};
pub use engine::{
    CancellationToken, Completeness, Miner, MinerConfig, MiningReport, MiningStats, NodeState,
};
pub use format::{DatasetReader, OutputFormat, TirpWriter};
pub use occurrence::{OccurrenceIndex, ResourceExhausted, ResourceLimits};
pub use pattern::{CanonicalForm, Candidate, InconsistentExtension, Pattern};
pub use relation::{classify, InvalidPair, RelationAlgebra, RelationMode, RelationSet, TemporalRelation};
pub use store::{Instance, IntervalStore, IntervalStoreBuilder};
pub use types::*;
