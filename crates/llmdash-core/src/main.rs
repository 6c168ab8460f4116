//! llmdash CLI
//!
//! Command-line interface for browsing resampled LLM usage metrics.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use tracing::{debug, info};

use llmdash::config::LoggingConfig;
use llmdash::events::{CompletionProbe, EventSender};
use llmdash::models::{
    parse_timestamp, Catalog, FilterSet, RangeSpec, ResampledSeries, SeriesSummary, TimeRange,
    WidthSpec,
};
use llmdash::source::HttpMetricsSource;
use llmdash::{Config, MetricsService};

/// llmdash - Usage, latency and cost metrics for LLM API calls
#[derive(Parser)]
#[command(name = "llmdash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "LLMDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// View resampled metrics
    Metrics {
        /// Model filter (repeatable, "<None>" for no filter)
        #[arg(long)]
        model: Vec<String>,

        /// Group id filter (repeatable, "<None>" for no filter)
        #[arg(long)]
        group: Vec<String>,

        /// Time range back from now (e.g., "1h", "24h", "7d")
        #[arg(long, conflicts_with_all = ["start", "end"])]
        last: Option<String>,

        /// Range start ("2024-05-01" or "2024-05-01 12:00:00")
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Range end, exclusive
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Bucket width ("auto", "5m", "1h", ...)
        #[arg(long)]
        width: Option<WidthSpec>,
    },

    /// List models and groups available for filtering
    Catalog,

    /// Send chat completions and emit an event for each
    Generate {
        /// Number of requests to process
        #[arg(long)]
        num_requests: Option<usize>,

        /// Model to use for the requests
        #[arg(long)]
        model: Option<String>,

        /// Group id for the events
        #[arg(long)]
        group_id: Option<String>,

        /// Events endpoint
        #[arg(long)]
        events_url: Option<String>,

        /// Chat-completion provider API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        provider_api_key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Pick up credentials from a local .env before anything reads the environment
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&config.logging, cli.verbose);
    debug!(config = ?cli.config, "Configuration loaded");

    // Execute command
    let result = match cli.command {
        Commands::Metrics {
            model,
            group,
            last,
            start,
            end,
            width,
        } => {
            let args = MetricsArgs {
                filters: FilterSet::from_selection(model, group),
                last,
                start,
                end,
                width,
            };
            run_metrics(config, args, cli.format).await
        }
        Commands::Catalog => run_catalog(config, cli.format).await,
        Commands::Generate {
            num_requests,
            model,
            group_id,
            events_url,
            provider_api_key,
        } => {
            let mut config = config;
            if let Some(n) = num_requests {
                config.events.num_requests = n;
            }
            if let Some(model) = model {
                config.events.model = model;
            }
            if let Some(group_id) = group_id {
                config.events.group_id = group_id;
            }
            if let Some(url) = events_url {
                config.events.events_url = url;
            }
            if let Some(key) = provider_api_key {
                config.events.provider_api_key = key;
            }
            run_generate(config).await
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct MetricsArgs {
    filters: FilterSet,
    last: Option<String>,
    start: Option<String>,
    end: Option<String>,
    width: Option<WidthSpec>,
}

impl MetricsArgs {
    fn range(&self, config: &Config) -> anyhow::Result<RangeSpec> {
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            let start = parse_timestamp(start)
                .with_context(|| format!("invalid start time '{start}'"))?;
            let end =
                parse_timestamp(end).with_context(|| format!("invalid end time '{end}'"))?;
            return Ok(TimeRange::new(start, end)?.into());
        }

        let last = match &self.last {
            Some(last) => humantime::parse_duration(last)
                .with_context(|| format!("invalid duration '{last}'"))?,
            None => config.query.default_range,
        };
        let last = chrono::Duration::from_std(last).context("duration out of range")?;
        Ok(RangeSpec::Last(last))
    }
}

#[derive(Serialize)]
struct MetricsOutput<'a> {
    series: &'a ResampledSeries,
    summary: SeriesSummary,
}

async fn run_metrics(config: Config, args: MetricsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let range = args.range(&config)?;
    let width = args.width.unwrap_or(config.query.default_width);

    let source = HttpMetricsSource::new(config.source)?;
    let service = MetricsService::new(source);

    info!(width = %width, "Fetching metrics");
    let series = service.get_metrics(range, &args.filters, width).await?;
    let summary = series.summary();

    match format {
        OutputFormat::Json => {
            let output = MetricsOutput {
                series: &series,
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => print_table(&series, &summary),
        OutputFormat::Text => print_text(&series, &summary),
    }

    Ok(())
}

fn print_text(series: &ResampledSeries, summary: &SeriesSummary) {
    println!(
        "{} {} ({} buckets of {})",
        style("Metrics").bold(),
        series.range,
        series.len(),
        series.width
    );
    for row in series {
        println!(
            "{}  requests={} p50={:.0}ms p95={:.0}ms tps_p50={:.1} tps_p95={:.1} cost=${:.4}",
            row.timestamp,
            row.request_count,
            row.generation_time_p50,
            row.generation_time_p95,
            row.tokens_per_sec_p50,
            row.tokens_per_sec_p95,
            row.total_cost,
        );
    }
    print_summary(summary);
}

fn print_table(series: &ResampledSeries, summary: &SeriesSummary) {
    println!(
        "{}",
        style(format!(
            "{:<20} {:>9} {:>10} {:>10} {:>9} {:>9} {:>12} {:>10}",
            "bucket", "requests", "gen p50", "gen p95", "tps p50", "tps p95", "tokens", "cost $"
        ))
        .bold()
    );
    for row in series {
        println!(
            "{:<20} {:>9} {:>10.1} {:>10.1} {:>9.1} {:>9.1} {:>12} {:>10.4}",
            row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.request_count,
            row.generation_time_p50,
            row.generation_time_p95,
            row.tokens_per_sec_p50,
            row.tokens_per_sec_p95,
            row.total_tokens(),
            row.total_cost,
        );
    }
    print_summary(summary);
}

fn print_summary(summary: &SeriesSummary) {
    println!();
    println!(
        "{} {} requests, {} tokens, ${:.4} total (${:.6}/request), {}/{} buckets active",
        style("Total:").bold(),
        summary.total_requests,
        summary.total_tokens(),
        summary.total_cost,
        summary.cost_per_request(),
        summary.active_buckets,
        summary.buckets,
    );
}

async fn run_catalog(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let source = HttpMetricsSource::new(config.source)?;
    let catalog: Catalog = MetricsService::new(source).catalog().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&catalog)?),
        OutputFormat::Text | OutputFormat::Table => {
            println!("{}", style("Models").bold());
            for model in &catalog.models {
                println!("  {model}");
            }
            println!("{}", style("Groups").bold());
            for group in &catalog.groups {
                println!("  {group}");
            }
        }
    }

    Ok(())
}

async fn run_generate(config: Config) -> anyhow::Result<()> {
    let events = config.events;
    anyhow::ensure!(
        !events.provider_api_key.is_empty(),
        "a provider API key is required (OPENAI_API_KEY or --provider-api-key)"
    );

    let probe = CompletionProbe::new(&events.provider_url, &events.provider_api_key)?;
    let sender = EventSender::new(&events.events_url, &events.api_key)?;

    let report = llmdash::events::generate(&probe, &sender, &events).await?;
    info!(
        processed = report.processed,
        sent = report.sent,
        failed = report.failed_sends,
        "Generation finished"
    );
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "llmdash", &mut io::stdout());
}
