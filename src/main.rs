use chrono::Utc;
use clap::{Parser, Subcommand};
use pagegate::config::{self, GateConfig};
use pagegate::decision_log::{self, FileSink};
use pagegate::gate::{Document, Gate};
use pagegate::output;
use pagegate::regression::{self, Snapshot};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "pagegate")]
#[command(about = "Publish-time content gate for generated static sites")]
#[command(long_about = "\
Publish-time content gate for generated static sites

Every generated page passes through the gate before it is written to the
site. Pages with defects that cannot be repaired safely are blocked; every
other defect is fixed in place and recorded in the decision log.

Blocking rules:
  Unresolved template placeholders     {{ x }}, {% x %}, {# x #}, {x} outside code
  Thin long-form content               fewer than rules.min_words words
  Incomplete Article structured data   missing headline, author, ...

Auto-fixes, in order:
  primary-heading, duplicate-ids, metadata, heading-hierarchy, alt-text,
  external-links, heading-links, link-paths, internal-links (advisory)

After a full build, `pagegate regress` compares site-wide counts (sitemap
URLs, feed items, published posts, required pages) against the previous
snapshot, or the configured baseline when no snapshot exists.

Run 'pagegate gen-config' to generate a documented pagegate.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Built site directory
    #[arg(long, default_value = "dist", global = true)]
    site: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a single document without writing it
    Check {
        /// HTML file to validate
        file: PathBuf,
        /// Destination identity under the site root, e.g. blog/my-post/index.html
        #[arg(long)]
        dest: String,
        /// Print the outcome as JSON, including the repaired content
        #[arg(long)]
        json: bool,
    },
    /// Validate every HTML file in a staging directory and write the publishable ones
    Publish {
        /// Staging directory; paths below it are destination identities
        staging: PathBuf,
        /// Exit non-zero when any document is blocked or skipped
        #[arg(long)]
        strict: bool,
    },
    /// Compare the built site against the previous snapshot or the baseline
    Regress {
        /// Snapshot file
        #[arg(long, default_value = "pagegate-snapshot.json")]
        snapshot: PathBuf,
        /// Compare against the configured baseline even if a snapshot exists
        #[arg(long)]
        baseline: bool,
        /// Replace the snapshot with the current metrics when the check passes
        #[arg(long)]
        save_snapshot: bool,
    },
    /// Record the built site's metrics as the new snapshot
    Snapshot {
        /// Snapshot file
        #[arg(long, default_value = "pagegate-snapshot.json")]
        snapshot: PathBuf,
    },
    /// Delete decision log partitions older than the retention window
    SweepLogs,
    /// Print a stock pagegate.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Check { file, dest, json } => {
            let sink = FileSink::new(&config.log.dir);
            let gate = Gate::new(&config, &sink);
            let outcome = gate.validate(&Document::load(&file, dest.as_str())?);
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                output::print_outcome(&dest, &outcome);
            }
            Ok(exit_code(!outcome.is_blocked()))
        }
        Command::Publish { staging, strict } => {
            init_thread_pool(&config.processing);
            let sink = FileSink::new(&config.log.dir);
            let summary = Gate::new(&config, &sink).run_batch(&staging, &cli.site)?;
            output::print_batch_summary(&summary);
            Ok(exit_code(!strict || summary.is_clean()))
        }
        Command::Regress {
            snapshot,
            baseline,
            save_snapshot,
        } => regress(&config, &cli.site, &snapshot, baseline, save_snapshot),
        Command::Snapshot { snapshot } => {
            let metrics = collect_metrics(&config, &cli.site)?;
            output::print_metrics(&metrics);
            Snapshot::from_metrics(&metrics).save(&snapshot)?;
            println!("Snapshot saved \u{2192} {}", snapshot.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::SweepLogs => {
            let removed = decision_log::sweep(
                &config.log.dir,
                config.log.retention_days,
                Utc::now().date_naive(),
            )?;
            output::print_sweep_output(&removed, config.log.retention_days);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

fn regress(
    config: &GateConfig,
    site: &Path,
    snapshot_path: &Path,
    force_baseline: bool,
    save_snapshot: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let metrics = collect_metrics(config, site)?;
    let previous = if force_baseline {
        None
    } else {
        Snapshot::load_optional(snapshot_path)?
    };
    let report = match &previous {
        Some(previous) => regression::check_snapshot(&metrics, previous),
        None => {
            info!("no snapshot to compare against; using configured baseline");
            regression::check_baseline(&metrics, &config.baseline)
        }
    };
    output::print_regression_report(&report);

    if save_snapshot && report.passed() {
        Snapshot::from_metrics(&metrics).save(snapshot_path)?;
        println!("Snapshot saved \u{2192} {}", snapshot_path.display());
    }
    Ok(exit_code(report.passed()))
}

fn collect_metrics(
    config: &GateConfig,
    site: &Path,
) -> Result<regression::SiteMetrics, regression::RegressionError> {
    info!(site = %site.display(), "collecting site metrics");
    regression::collect(site, &config.regression, &config.baseline.required_pages)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
