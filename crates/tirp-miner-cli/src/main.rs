//! TIRP miner entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use tirp_miner::{
    MaxGap, MinSupport, MinerConfig, OutputFormat, RelationMode, ResourceLimits, TirpError,
};
use tirp_miner_cli::config::resolve_threads;
use tirp_miner_cli::runner::{load_store, mine, ExitStatus, MineRequest};

#[derive(Parser)]
#[command(
    name = "tirp-miner",
    about = "Mine frequent Time-Intervals-Related Patterns from a symbolic interval dataset",
    version
)]
struct Cli {
    /// Number of entities support ratios are computed against.
    #[arg(short = 'n', long)]
    num_entities: Option<usize>,

    /// Minimum support as a fraction of entities, in (0, 1].
    #[arg(short = 's', long, conflicts_with = "min_count")]
    min_support: Option<f64>,

    /// Minimum support as an absolute number of entities.
    #[arg(long)]
    min_count: Option<usize>,

    /// Maximal gap between intervals in before/meets relations ("inf" for none).
    #[arg(short = 'g', long)]
    max_gap: Option<MaxGap>,

    /// Path to the dataset file.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output path. Also reads TIRP_OUTPUT.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit only closed patterns.
    #[arg(short, long)]
    closed: bool,

    /// Relation vocabulary (allen, coarse).
    #[arg(long, default_value = "allen")]
    relations: RelationMode,

    /// Maximal number of intervals per pattern.
    #[arg(long)]
    max_length: Option<usize>,

    /// Worker threads, 0 for all cores. Also reads TIRP_THREADS.
    #[arg(long)]
    threads: Option<usize>,

    /// Stop the search after this many seconds and write partial results.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Abandon branches that would materialise more occurrences than this.
    #[arg(long)]
    max_bindings: Option<usize>,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Include every occurrence's intervals in the output.
    #[arg(long)]
    with_occurrences: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset and print a summary without mining.
    Validate {
        /// Path to the dataset file.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of entities.
        #[arg(short = 'n', long)]
        num_entities: Option<usize>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   tirp-miner completions bash > ~/.local/share/bash-completion/completions/tirp-miner
    ///   tirp-miner completions zsh > ~/.zfunc/_tirp-miner
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn missing(what: &str) -> TirpError {
    TirpError::InvalidInput(format!("missing {what}"))
}

fn mine_request(cli: &Cli) -> anyhow::Result<MineRequest> {
    let input = cli.file.clone().ok_or_else(|| missing("dataset path (-f/--file)"))?;
    let max_gap = cli.max_gap.ok_or_else(|| missing("maximal gap (-g/--max-gap)"))?;
    let min_support = match (cli.min_support, cli.min_count) {
        (Some(ratio), _) => MinSupport::Ratio(ratio),
        (None, Some(count)) => MinSupport::Count(count),
        (None, None) => return Err(missing("minimum support (-s/--min-support or --min-count)").into()),
    };

    let config = MinerConfig::new(min_support, max_gap)
        .with_relations(cli.relations)
        .with_closed_only(cli.closed)
        .with_max_length(cli.max_length)
        .with_threads(resolve_threads(cli.threads)?)
        .with_limits(ResourceLimits {
            max_bindings: cli.max_bindings,
        })
        .with_record_occurrences(cli.with_occurrences);

    Ok(MineRequest {
        input,
        output: cli.output.clone(),
        num_entities: cli.num_entities,
        config,
        format: cli.format,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Validate {
            ref file,
            num_entities,
        }) => {
            let Some(path) = file.clone().or_else(|| cli.file.clone()) else {
                eprintln!("Error: missing dataset path (-f/--file)");
                std::process::exit(ExitStatus::InvalidInput.code());
            };
            match load_store(&path, num_entities.or(cli.num_entities)) {
                Ok(store) => {
                    println!("Valid dataset: {}", path.display());
                    println!("  Instances: {}", store.instances().len());
                    println!("  Entities: {}", store.entity_count());
                    println!("  Symbols: {}", store.symbols().len());
                    println!("  Intervals: {}", store.interval_count());
                }
                Err(e) => {
                    eprintln!("Invalid dataset: {e}");
                    let err = anyhow::Error::from(e);
                    std::process::exit(ExitStatus::from_error(&err).code());
                }
            }
        }

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tirp-miner", &mut std::io::stdout());
        }

        None => {
            let result = match mine_request(&cli) {
                Ok(request) => mine(request).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(summary) => {
                    println!(
                        "{} patterns written to {}",
                        summary.patterns,
                        summary.output.display()
                    );
                    if summary.status != ExitStatus::Complete {
                        eprintln!("Results are incomplete ({:?})", summary.status);
                        std::process::exit(summary.status.code());
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    std::process::exit(ExitStatus::from_error(&e).code());
                }
            }
        }
    }

    Ok(())
}
