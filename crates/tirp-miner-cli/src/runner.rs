//! Mining run: load, mine under cancellation, write results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tirp_miner::{
    CancellationToken, Completeness, DatasetReader, IntervalStore, Miner, MinerConfig,
    MiningReport, OutputFormat, TirpError, TirpWriter,
};

use crate::config::{resolve_output_path, stats_path, ConfigError};

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Complete,
    Failure,
    InvalidInput,
    Cancelled,
    Degraded,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Complete => 0,
            ExitStatus::Failure => 1,
            ExitStatus::InvalidInput => 2,
            ExitStatus::Cancelled => 3,
            ExitStatus::Degraded => 4,
        }
    }

    /// Classify a failed run.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<ConfigError>().is_some() {
            return ExitStatus::InvalidInput;
        }
        match err.downcast_ref::<TirpError>() {
            Some(TirpError::InvalidInput(_)) => ExitStatus::InvalidInput,
            _ => ExitStatus::Failure,
        }
    }
}

impl From<&Completeness> for ExitStatus {
    fn from(completeness: &Completeness) -> Self {
        match completeness {
            Completeness::Complete => ExitStatus::Complete,
            Completeness::Cancelled => ExitStatus::Cancelled,
            Completeness::Degraded { .. } => ExitStatus::Degraded,
        }
    }
}

/// Everything one mining invocation needs.
#[derive(Debug, Clone)]
pub struct MineRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub num_entities: Option<usize>,
    pub config: MinerConfig,
    pub format: OutputFormat,
    pub timeout: Option<Duration>,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub stats: PathBuf,
    pub patterns: usize,
    pub status: ExitStatus,
}

/// Load and validate a dataset, applying an entity-count override.
pub fn load_store(input: &Path, num_entities: Option<usize>) -> Result<IntervalStore, TirpError> {
    let mut builder = DatasetReader::read_from_file(input)?;
    if let Some(n) = num_entities {
        builder = builder.declared_entities(n);
    }
    builder.build()
}

/// Run one mining job. Ctrl-C and the timeout cancel the search; partial
/// results are still written, marked incomplete.
pub async fn mine(request: MineRequest) -> anyhow::Result<RunSummary> {
    let store = load_store(&request.input, request.num_entities)?;
    let output = resolve_output_path(
        request.output.as_deref(),
        &request.input,
        &request.config.min_support,
        request.config.max_gap,
        request.format,
    )?;
    if output.exists() {
        return Err(TirpError::OutputExists(output).into());
    }

    tracing::info!(
        "Running on {}: {} instances, {} intervals",
        request.input.display(),
        store.instances().len(),
        store.interval_count()
    );

    let token = CancellationToken::new();
    let report = run_cancellable(store, request.config, token, request.timeout).await?;

    TirpWriter::write_to_file(&report, &output, request.format)?;
    let stats = stats_path(&output);
    TirpWriter::write_stats(&report, &stats)?;

    tracing::info!("Wrote {} patterns to {}", report.patterns.len(), output.display());

    Ok(RunSummary {
        output,
        stats,
        patterns: report.patterns.len(),
        status: ExitStatus::from(&report.completeness),
    })
}

async fn run_cancellable(
    store: IntervalStore,
    config: MinerConfig,
    token: CancellationToken,
    timeout: Option<Duration>,
) -> anyhow::Result<MiningReport> {
    let miner_token = token.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        Miner::new(&store, config)
            .with_cancellation(miner_token)
            .run()
    });

    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let report = tokio::select! {
        joined = &mut handle => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping search");
            token.cancel();
            handle.await??
        }
        _ = &mut deadline => {
            tracing::warn!("Timeout reached, stopping search");
            token.cancel();
            handle.await??
        }
    };
    Ok(report)
}
