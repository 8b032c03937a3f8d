//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use tirp_miner::{MaxGap, MinSupport, OutputFormat};

/// Overrides the derived output path.
pub const OUTPUT_ENV: &str = "TIRP_OUTPUT";

/// Worker thread count when `--threads` is absent.
pub const THREADS_ENV: &str = "TIRP_THREADS";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot derive an output path from '{}'", .0.display())]
    NoFileStem(PathBuf),

    #[error("invalid {THREADS_ENV} value '{0}'")]
    InvalidThreads(String),
}

/// Resolve the output path: explicit flag > `TIRP_OUTPUT` > derived from input.
pub fn resolve_output_path(
    explicit: Option<&Path>,
    input: &Path,
    min_support: &MinSupport,
    max_gap: MaxGap,
    format: OutputFormat,
) -> Result<PathBuf, ConfigError> {
    let env = std::env::var(OUTPUT_ENV).ok();
    output_path_from(explicit, env.as_deref(), input, min_support, max_gap, format)
}

fn output_path_from(
    explicit: Option<&Path>,
    env: Option<&str>,
    input: &Path,
    min_support: &MinSupport,
    max_gap: MaxGap,
    format: OutputFormat,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    derived_output_path(input, min_support, max_gap, format)
}

/// `<input-stem>-support-<s>-gap-<g>.txt` next to the input file.
pub fn derived_output_path(
    input: &Path,
    min_support: &MinSupport,
    max_gap: MaxGap,
    format: OutputFormat,
) -> Result<PathBuf, ConfigError> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConfigError::NoFileStem(input.to_path_buf()))?;
    let ext = match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
    };
    Ok(input.with_file_name(format!("{stem}-support-{min_support}-gap-{max_gap}.{ext}")))
}

/// `<output-stem>_stats.txt` next to the output file.
pub fn stats_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tirps".to_string());
    output.with_file_name(format!("{stem}_stats.txt"))
}

/// Resolve worker threads: explicit flag > `TIRP_THREADS` > 0 (all cores).
pub fn resolve_threads(explicit: Option<usize>) -> Result<usize, ConfigError> {
    let env = std::env::var(THREADS_ENV).ok();
    threads_from(explicit, env.as_deref())
}

fn threads_from(explicit: Option<usize>, env: Option<&str>) -> Result<usize, ConfigError> {
    if let Some(n) = explicit {
        return Ok(n);
    }
    match env.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidThreads(v.to_string())),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_precedence() {
        let input = Path::new("data/asl.csv");
        let support = MinSupport::Ratio(0.5);
        let gap = MaxGap::Bounded(30);
        let text = OutputFormat::Text;

        let explicit = output_path_from(Some(Path::new("x.txt")), Some("y.txt"), input, &support, gap, text);
        assert_eq!(explicit.unwrap(), PathBuf::from("x.txt"));

        let env = output_path_from(None, Some("y.txt"), input, &support, gap, text);
        assert_eq!(env.unwrap(), PathBuf::from("y.txt"));

        let derived = output_path_from(None, None, input, &support, gap, text);
        assert_eq!(derived.unwrap(), PathBuf::from("data/asl-support-0.5-gap-30.txt"));
    }

    #[test]
    fn test_derived_path_for_json_and_unbounded() {
        let path = derived_output_path(
            Path::new("asl.csv"),
            &MinSupport::Count(3),
            MaxGap::Unbounded,
            OutputFormat::Json,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("asl-support-3-gap-inf.json"));
    }

    #[test]
    fn test_stats_path() {
        assert_eq!(
            stats_path(Path::new("out/asl-support-0.5-gap-30.txt")),
            PathBuf::from("out/asl-support-0.5-gap-30_stats.txt")
        );
    }

    #[test]
    fn test_threads_resolution() {
        assert_eq!(threads_from(Some(4), Some("8")).unwrap(), 4);
        assert_eq!(threads_from(None, Some("8")).unwrap(), 8);
        assert_eq!(threads_from(None, None).unwrap(), 0);
        assert!(threads_from(None, Some("many")).is_err());
    }
}
