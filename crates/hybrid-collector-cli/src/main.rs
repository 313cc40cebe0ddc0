//! Hybrid collector entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use hybrid_collector::Collector;
use hybrid_collector_cli::config::{fetch_policy, resolve_config_path};
use hybrid_collector_cli::runner::{check_sources, load_config, run_sources, RunOptions};

#[derive(Parser)]
#[command(
    name = "hybrid-collector",
    about = "Hybrid API + HTML collector. Merges JSON API and scraped page data into unified records",
    version
)]
struct Cli {
    /// Path to the sources YAML file.
    /// Falls back to HYBRID_COLLECTOR_CONFIG, then config/sources.yml, then config/sources.example.yml.
    #[arg(short, long)]
    config: Option<String>,

    /// Directory to write outputs.
    #[arg(long, default_value = "sample_output")]
    output_dir: PathBuf,

    /// Skip writing outputs.
    #[arg(long)]
    dry_run: bool,

    /// Also write unified_records.xlsx.
    #[arg(long)]
    xlsx: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Per-attempt request timeout in seconds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Attempts per request, including the first.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Base retry delay in milliseconds, doubled per retry. 0 retries at once.
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, validate and export every source (default).
    Run,

    /// Load the sources file and print a summary.
    Check,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   hybrid-collector completions bash > ~/.local/share/bash-completion/completions/hybrid-collector
    ///   hybrid-collector completions zsh > ~/.zfunc/_hybrid-collector
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
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

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let sources = load_config(&config_path).unwrap_or_else(|line| {
                eprintln!("{line}");
                std::process::exit(1);
            });
            tracing::info!("Config: {config_path} ({} sources)", sources.len());

            let policy = fetch_policy(cli.timeout_secs, cli.max_attempts, cli.backoff_ms);
            let collector = Collector::from_policy(policy)?;
            let options = RunOptions {
                output_dir: cli.output_dir,
                dry_run: cli.dry_run,
                xlsx: cli.xlsx,
            };
            run_sources(
                &collector,
                &sources,
                &options,
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;
        }

        Commands::Check => {
            let sources = load_config(&config_path).unwrap_or_else(|line| {
                eprintln!("{line}");
                std::process::exit(1);
            });
            check_sources(&config_path, &sources, &mut std::io::stdout())?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "hybrid-collector", &mut std::io::stdout());
        }
    }

    Ok(())
}
