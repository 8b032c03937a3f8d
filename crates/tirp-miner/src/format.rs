//! Dataset reader and result writers.
//!
//! Input is the symbolic-interval text format: a free-form preamble ending
//! with a `startToncepts` line, a `numberOfEntities[,n]` line, then one pair
//! of lines per entity:
//!
//! ```text
//! 17,1
//! 0,4,3;2,9,5;
//! ```
//!
//! The first line carries the entity id (further `,`/`;` fields ignored), the
//! second the entity's intervals as `start,end,symbol` triples. A blank line
//! or end of file ends the entity list.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::MiningReport;
use crate::store::{IntervalStore, IntervalStoreBuilder};
use crate::types::{SymbolId, Time, TimeInterval, TirpError, TirpResult};

const FILE_START: &str = "startToncepts";
const FILE_NUM: &str = "numberOfEntities";

/// Reader for symbolic-interval dataset files.
pub struct DatasetReader;

/// Writer for mined pattern reports.
pub struct TirpWriter;

/// Output encoding of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = TirpError;

    fn from_str(s: &str) -> TirpResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(TirpError::InvalidInput(format!(
                "unknown output format '{other}' (expected text or json)"
            ))),
        }
    }
}

fn format_error(line: usize, msg: impl std::fmt::Display) -> TirpError {
    TirpError::InvalidInput(format!("line {line}: {msg}"))
}

fn parse_interval(field: &str, line: usize) -> TirpResult<TimeInterval> {
    let parts: Vec<&str> = field.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(format_error(
            line,
            format!("expected start,end,symbol but got '{field}'"),
        ));
    }
    let time = |s: &str| {
        s.parse::<Time>()
            .map_err(|e| format_error(line, format!("invalid time '{s}': {e}")))
    };
    let symbol = parts[2]
        .parse::<SymbolId>()
        .map_err(|e| format_error(line, format!("invalid symbol '{}': {e}", parts[2])))?;
    Ok(TimeInterval::new(symbol, time(parts[0])?, time(parts[1])?))
}

impl DatasetReader {
    /// Read a dataset file into a store builder.
    pub fn read_from_file(path: &Path) -> TirpResult<IntervalStoreBuilder> {
        let file = std::fs::File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Read a dataset into a store builder. The declared entity count, when
    /// present, is carried over; validation happens on `build`.
    pub fn read_from<R: BufRead>(reader: R) -> TirpResult<IntervalStoreBuilder> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));

        loop {
            let Some((_, line)) = lines.next() else {
                return Err(TirpError::InvalidInput(format!(
                    "missing '{FILE_START}' marker"
                )));
            };
            if line?.starts_with(FILE_START) {
                break;
            }
        }

        let mut builder = IntervalStore::builder();
        match lines.next() {
            Some((no, line)) => {
                let line = line?;
                if !line.starts_with(FILE_NUM) {
                    return Err(format_error(no, format!("expected '{FILE_NUM}'")));
                }
                if let Some(value) = line.split(',').nth(1).map(str::trim).filter(|v| !v.is_empty()) {
                    let count = value
                        .parse::<usize>()
                        .map_err(|e| format_error(no, format!("invalid entity count '{value}': {e}")))?;
                    builder = builder.declared_entities(count);
                }
            }
            None => return Err(TirpError::InvalidInput(format!("missing '{FILE_NUM}' line"))),
        }

        let mut entities = 0usize;
        while let Some((no, line)) = lines.next() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let entity = line
                .split(';')
                .next()
                .and_then(|f| f.split(',').next())
                .map(str::trim)
                .unwrap_or_default();
            if entity.is_empty() {
                return Err(format_error(no, "missing entity id"));
            }

            let (no, intervals_line) = match lines.next() {
                Some((no, l)) => (no, l?),
                None => return Err(format_error(no, format!("entity '{entity}' has no interval line"))),
            };
            let intervals = intervals_line
                .split(';')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(|f| parse_interval(f, no))
                .collect::<TirpResult<Vec<_>>>()?;

            builder.push_instance(entity, intervals);
            entities += 1;
        }

        tracing::debug!("Read {} entities", entities);
        Ok(builder)
    }
}

fn text_line(mined: &crate::collector::MinedPattern) -> String {
    let pattern = &mined.pattern;
    let symbols: Vec<String> = pattern.symbols().iter().map(|s| s.to_string()).collect();
    let relations = if pattern.len() == 1 {
        "-.".to_string()
    } else {
        pattern
            .row_major_relations()
            .iter()
            .map(|r| format!("{r}."))
            .collect()
    };
    let mut line = format!(
        "{} {} {} {} {:.2}",
        pattern.len(),
        symbols.join("-"),
        relations,
        mined.support,
        mined.mean_horizontal_support()
    );
    for witness in &mined.witnesses {
        line.push(' ');
        line.push_str(&witness.entity);
        line.push(' ');
        for iv in &witness.intervals {
            line.push_str(&iv.to_string());
        }
    }
    line
}

impl TirpWriter {
    /// One line per pattern; partial reports start with an `# incomplete` line.
    pub fn write_text<W: Write>(report: &MiningReport, writer: &mut W) -> TirpResult<()> {
        if let Some(reason) = report.completeness.reason() {
            writeln!(writer, "# incomplete: {reason}")?;
        }
        for mined in &report.patterns {
            writeln!(writer, "{}", text_line(mined))?;
        }
        Ok(())
    }

    pub fn write_json<W: Write>(report: &MiningReport, writer: &mut W) -> TirpResult<()> {
        serde_json::to_writer_pretty(&mut *writer, report)
            .map_err(|e| TirpError::Serialization(format!("Serialization failed: {e}")))?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write a report to a new file, refusing to overwrite.
    pub fn write_to_file(report: &MiningReport, path: &Path, format: OutputFormat) -> TirpResult<()> {
        let mut file = create_new(path)?;
        match format {
            OutputFormat::Text => Self::write_text(report, &mut file),
            OutputFormat::Json => Self::write_json(report, &mut file),
        }
    }

    /// Run summary: runtime, completeness and counters.
    pub fn write_stats(report: &MiningReport, path: &Path) -> TirpResult<()> {
        let mut file = std::fs::File::create(path)?;
        let stats = &report.stats;
        writeln!(file, "runtime_sec: {:.3}", stats.elapsed_ms as f64 / 1000.0)?;
        writeln!(
            file,
            "completeness: {}",
            report.completeness.reason().unwrap_or_else(|| "complete".to_string())
        )?;
        writeln!(file, "entities: {}", report.entity_count)?;
        writeln!(file, "min_support_count: {}", report.min_support_count)?;
        writeln!(file, "patterns: {}", report.patterns.len())?;
        writeln!(file, "frequent_symbols: {}", stats.frequent_symbols)?;
        writeln!(file, "nodes_expanded: {}", stats.nodes_expanded)?;
        writeln!(file, "candidates_considered: {}", stats.candidates_considered)?;
        writeln!(file, "infrequent_candidates: {}", stats.infrequent_candidates)?;
        writeln!(file, "inconsistent_extensions: {}", stats.inconsistent_extensions)?;
        writeln!(file, "abandoned_branches: {}", stats.abandoned_branches)?;
        writeln!(file, "closure_suppressed: {}", stats.closure_suppressed)?;
        Ok(())
    }
}

fn create_new(path: &Path) -> TirpResult<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => TirpError::OutputExists(path.to_path_buf()),
            _ => TirpError::Io(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Miner, MinerConfig};
    use crate::types::{MaxGap, MinSupport};

    const DATASET: &str = "\
some header
startToncepts
numberOfEntities,2
1,x
0,2,1;3,5,2;
2
0,2,1;10,12,2;
";

    fn report(record: bool) -> MiningReport {
        let store = DatasetReader::read_from(DATASET.as_bytes()).unwrap().build().unwrap();
        let config = MinerConfig::new(MinSupport::Count(1), MaxGap::Bounded(3))
            .with_record_occurrences(record);
        Miner::new(&store, config).run().unwrap()
    }

    #[test]
    fn test_read_dataset() {
        let store = DatasetReader::read_from(DATASET.as_bytes()).unwrap().build().unwrap();
        assert_eq!(store.entity_count(), 2);
        assert_eq!(store.instance(0).name(), "1");
        assert_eq!(store.instance(1).intervals()[1], TimeInterval::new(2, 10, 12));
    }

    #[test]
    fn test_read_rejects_bad_structure() {
        assert!(DatasetReader::read_from("no marker\n".as_bytes()).is_err());
        assert!(DatasetReader::read_from("startToncepts\n1\n".as_bytes()).is_err());
        let bad_number = "startToncepts\nnumberOfEntities\n1\n0,x,1;\n";
        let err = DatasetReader::read_from(bad_number.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 4"));
        let missing = "startToncepts\nnumberOfEntities\n1\n";
        assert!(DatasetReader::read_from(missing.as_bytes()).is_err());
    }

    #[test]
    fn test_reversed_interval_fails_on_build() {
        let data = "startToncepts\nnumberOfEntities\n1\n5,2,1;\n";
        let builder = DatasetReader::read_from(data.as_bytes()).unwrap();
        assert!(matches!(builder.build(), Err(TirpError::InvalidInput(_))));
    }

    #[test]
    fn test_text_output() {
        let mut out = Vec::new();
        TirpWriter::write_text(&report(true), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1 1 -. 2 1.00 1 [0-2] 2 [0-2]");
        assert_eq!(lines[2], "2 1-2 <. 1 1.00 1 [0-2][3-5]");
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        TirpWriter::write_json(&report(false), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["completeness"]["status"], "complete");
        assert_eq!(value["patterns"][2]["pattern"]["relations"][0], "before");
        assert_eq!(value["min_support_count"], 1);
    }

    #[test]
    fn test_refuses_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let report = report(false);
        TirpWriter::write_to_file(&report, &path, OutputFormat::Text).unwrap();
        let err = TirpWriter::write_to_file(&report, &path, OutputFormat::Text).unwrap_err();
        assert!(matches!(err, TirpError::OutputExists(_)));
    }
}
