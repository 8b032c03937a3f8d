//! Core data types for symbolic time intervals and mining errors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Timestamp unit shared by interval endpoints and the maximal gap.
pub type Time = i64;

/// Symbol (interval type) identifier.
pub type SymbolId = u32;

/// Dense instance identifier: the position of the instance in the store.
pub type InstanceId = u32;

/// Position of an interval inside its instance's ordered interval list.
pub type Position = u32;

/// A symbolic time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub symbol: SymbolId,
    pub start: Time,
    pub end: Time,
}

impl TimeInterval {
    pub fn new(symbol: SymbolId, start: Time, end: Time) -> Self {
        Self { symbol, start, end }
    }

    /// Ordering key inside an instance: start, then end, then symbol.
    pub fn order_key(&self) -> (Time, Time, SymbolId) {
        (self.start, self.end, self.symbol)
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Upper bound on the distance allowed between an earlier interval's end and a
/// later interval's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MaxGap {
    Bounded(Time),
    Unbounded,
}

impl MaxGap {
    /// Whether a gap (later start minus earlier end) is admissible. Inclusive.
    pub fn admits(&self, gap: Time) -> bool {
        match self {
            MaxGap::Bounded(max) => gap <= *max,
            MaxGap::Unbounded => true,
        }
    }
}

impl std::fmt::Display for MaxGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxGap::Bounded(t) => write!(f, "{t}"),
            MaxGap::Unbounded => write!(f, "inf"),
        }
    }
}

impl std::str::FromStr for MaxGap {
    type Err = TirpError;

    fn from_str(s: &str) -> TirpResult<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "inf" | "unbounded" | "none" => Ok(MaxGap::Unbounded),
            _ => s
                .parse::<Time>()
                .map(MaxGap::Bounded)
                .map_err(|e| TirpError::InvalidInput(format!("invalid maximal gap '{s}': {e}"))),
        }
    }
}

/// Minimum support threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MinSupport {
    /// Fraction of entities in (0, 1]; rounded up to a count.
    Ratio(f64),
    /// Absolute number of supporting entities, at least 1.
    Count(usize),
}

/// Tolerance absorbed before rounding a ratio threshold up, so that
/// `0.1 * 30` resolves to 3 rather than 4.
const RATIO_EPSILON: f64 = 1e-9;

impl MinSupport {
    /// Resolve the threshold into an absolute instance count.
    pub fn required_count(&self, entity_count: usize) -> TirpResult<usize> {
        match *self {
            MinSupport::Ratio(ratio) => {
                if !(ratio > 0.0 && ratio <= 1.0) {
                    return Err(TirpError::InvalidInput(format!(
                        "minimum support ratio must be in (0, 1], got {ratio}"
                    )));
                }
                let raw = ratio * entity_count as f64 - RATIO_EPSILON;
                Ok((raw.ceil().max(0.0) as usize).max(1))
            }
            MinSupport::Count(0) => Err(TirpError::InvalidInput(
                "minimum support count must be at least 1".to_string(),
            )),
            MinSupport::Count(count) => Ok(count),
        }
    }
}

impl std::fmt::Display for MinSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MinSupport::Ratio(r) => write!(f, "{r}"),
            MinSupport::Count(c) => write!(f, "{c}"),
        }
    }
}

/// Errors that can occur while building a store, mining, or doing I/O.
#[derive(thiserror::Error, Debug)]
pub enum TirpError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Convenience result type.
pub type TirpResult<T> = Result<T, TirpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_rounds_up() {
        assert_eq!(MinSupport::Ratio(0.5).required_count(65).unwrap(), 33);
        assert_eq!(MinSupport::Ratio(0.1).required_count(30).unwrap(), 3);
        assert_eq!(MinSupport::Ratio(1.0).required_count(7).unwrap(), 7);
    }

    #[test]
    fn test_ratio_never_below_one() {
        assert_eq!(MinSupport::Ratio(0.01).required_count(3).unwrap(), 1);
        assert_eq!(MinSupport::Ratio(0.5).required_count(0).unwrap(), 1);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(MinSupport::Ratio(0.0).required_count(10).is_err());
        assert!(MinSupport::Ratio(1.5).required_count(10).is_err());
        assert!(MinSupport::Ratio(f64::NAN).required_count(10).is_err());
        assert!(MinSupport::Count(0).required_count(10).is_err());
    }

    #[test]
    fn test_max_gap_inclusive() {
        let gap = MaxGap::Bounded(3);
        assert!(gap.admits(3));
        assert!(!gap.admits(4));
        assert!(MaxGap::Unbounded.admits(Time::MAX));
    }

    #[test]
    fn test_max_gap_parse() {
        assert_eq!("30".parse::<MaxGap>().unwrap(), MaxGap::Bounded(30));
        assert_eq!("inf".parse::<MaxGap>().unwrap(), MaxGap::Unbounded);
        assert!("soon".parse::<MaxGap>().is_err());
    }
}
