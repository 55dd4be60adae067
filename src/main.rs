use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod catalog;
mod export;
mod metrics;
mod mock;
mod models;
mod report;
mod routes;

use catalog::Catalog;
use export::{DatasetKind, ExportRequest, SnapshotInputs};
use metrics::AbTestPlan;
use report::{CampaignInputs, RenderContext};
use routes::Page;

#[derive(Parser)]
#[command(name = "lifecycle-dashboard")]
#[command(about = "Customer lifecycle analytics dashboard over mock e-commerce data", long_about = None)]
struct Cli {
    /// Seed for the mock data generators; omit for a fresh sample on every run
    #[arg(long, env = "LIFECYCLE_SEED", global = true)]
    seed: Option<u64>,
    /// JSON file overriding the reference catalog
    #[arg(long, env = "LIFECYCLE_CATALOG", global = true)]
    catalog: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single dashboard page by path
    Page {
        path: String,
        /// Trend window in days, at most ten years
        #[arg(
            long,
            default_value_t = mock::DEFAULT_TREND_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=mock::MAX_TREND_DAYS)
        )]
        days: i64,
    },
    /// Render every page into a markdown report
    Report {
        /// Trend window in days, at most ten years
        #[arg(
            long,
            default_value_t = mock::DEFAULT_TREND_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=mock::MAX_TREND_DAYS)
        )]
        days: i64,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Export one dataset as CSV
    Export {
        #[arg(long, value_enum)]
        dataset: DatasetKind,
        #[arg(long)]
        out: PathBuf,
        /// Trend window in days, at most ten years
        #[arg(
            long,
            default_value_t = mock::DEFAULT_TREND_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=mock::MAX_TREND_DAYS)
        )]
        days: i64,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Write a JSON snapshot of every dataset and derived metric
    Snapshot {
        #[arg(long, default_value = "snapshot.json")]
        out: PathBuf,
        /// Trend window in days, at most ten years
        #[arg(
            long,
            default_value_t = mock::DEFAULT_TREND_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=mock::MAX_TREND_DAYS)
        )]
        days: i64,
    },
    /// Size an A/B test from baseline conversion and minimum detectable effect
    SampleSize {
        /// Baseline conversion rate in percent
        #[arg(long, default_value_t = 15.0)]
        baseline: f64,
        /// Minimum detectable effect in percentage points
        #[arg(long, default_value_t = 2.0)]
        mde: f64,
        /// Statistical power in percent
        #[arg(long, default_value_t = 80.0)]
        power: f64,
        /// Two-sided significance level in percent
        #[arg(long, default_value_t = 5.0)]
        alpha: f64,
    },
    /// Simulate a promotion campaign
    Simulate {
        #[arg(long, default_value_t = 5000.0)]
        budget: f64,
        #[arg(long, default_value_t = 15)]
        discount: u32,
        #[arg(long, default_value = "At Risk")]
        segment: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(path: Option<&PathBuf>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => {
            let catalog = Catalog::from_path(path)
                .with_context(|| format!("failed to load catalog override {}", path.display()))?;
            info!(path = %path.display(), segments = catalog.segments.len(), "loaded catalog override");
            Ok(catalog)
        }
        None => Ok(Catalog::standard()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog = load_catalog(cli.catalog.as_ref())?;
    let mut rng = mock::rng_from_seed(cli.seed);
    let today = Utc::now().date_naive();
    debug!(seed = ?cli.seed, %today, "mock data source ready");

    match cli.command {
        Commands::Page { path, days } => {
            let page = Page::from_path(&path);
            if page == Page::NotFound {
                info!(%path, "no page registered for path");
            }
            let mut ctx = RenderContext::new(&catalog, today, &mut rng);
            ctx.days = days;
            print!("{}", report::render_with_fallback(page, &mut ctx));
        }
        Commands::Report { days, out } => {
            let mut ctx = RenderContext::new(&catalog, today, &mut rng);
            ctx.days = days;
            let output = report::build_report(&mut ctx);
            std::fs::write(&out, output)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            dataset,
            out,
            days,
            count,
        } => {
            let request = ExportRequest {
                kind: dataset,
                days,
                count,
                today,
            };
            let written = export::export_to_path(&out, &request, &catalog, &mut rng)?;
            println!(
                "Exported {written} {} rows to {}.",
                dataset.name(),
                out.display()
            );
        }
        Commands::Snapshot { out, days } => {
            let inputs = SnapshotInputs {
                seed: cli.seed,
                days,
                today,
                budget: CampaignInputs::default().budget,
                ab_test: AbTestPlan::default(),
            };
            let snapshot = export::build_snapshot(&inputs, &catalog, &mut rng)?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Snapshot {} written to {}.",
                snapshot.snapshot_id,
                out.display()
            );
        }
        Commands::SampleSize {
            baseline,
            mde,
            power,
            alpha,
        } => {
            let plan = AbTestPlan {
                baseline_rate: baseline,
                mde,
                power: power / 100.0,
                alpha: alpha / 100.0,
            };
            let required = plan.required_sample_size()?;
            println!("Required sample size per variant: {required}");
            match plan.powered_sample_size() {
                Ok(powered) => println!(
                    "At {power:.0}% power and {alpha:.1}% significance: {powered} per variant"
                ),
                Err(error) => println!("Power-adjusted size unavailable: {error}"),
            }
        }
        Commands::Simulate {
            budget,
            discount,
            segment,
        } => {
            let mut ctx = RenderContext::new(&catalog, today, &mut rng);
            ctx.campaign = CampaignInputs {
                segment,
                discount,
                budget,
            };
            let output = report::render_page(Page::StrategyEngine, &mut ctx)?;
            print!("{output}");
        }
    }

    Ok(())
}
