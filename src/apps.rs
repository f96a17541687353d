use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, error::ErrorKind};
use tracing::warn;

use crate::config::{GbifClientConfig, StreamConfig};
use crate::constants::api::{DEFAULT_SEARCH_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use crate::counter::count_populations;
use crate::heuristics::{balanced_sample_budget, capped_population_total, normalized_weights};
use crate::metrics::stream_skew;
use crate::pipeline::build_stream;
use crate::source::OccurrenceApi;
use crate::splitter::split_query;

type DynApi = Arc<dyn OccurrenceApi>;

#[derive(Debug, Parser)]
#[command(
    name = "gbif-stream",
    disable_help_subcommand = true,
    about = "Stream media descriptors for occurrence queries",
    long_about = "Build the configured (optionally split and balanced) descriptor stream and print one JSON descriptor per line.",
    after_help = "Per-stream totals and skew are printed to stderr once the stream ends. Set RUST_LOG for progress logs."
)]
struct StreamCli {
    #[arg(long, value_name = "FILE", help = "JSON stream configuration")]
    config: PathBuf,
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_SEARCH_ENDPOINT,
        help = "Occurrence search endpoint"
    )]
    endpoint: String,
    #[arg(long, help = "Override the configured seed")]
    seed: Option<u64>,
    #[arg(long, help = "Memoize identical search requests")]
    cache: bool,
    #[arg(
        long = "timeout-secs",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "End-to-end timeout per request"
    )]
    timeout_secs: u64,
}

#[derive(Debug, Parser)]
#[command(
    name = "gbif-budget",
    disable_help_subcommand = true,
    about = "Metadata-only population and budget report",
    long_about = "Split the configured query, count each sub-query's population with zero-size searches, and report the balanced budget and draw weights (no paging)."
)]
struct BudgetCli {
    #[arg(long, value_name = "FILE", help = "JSON stream configuration")]
    config: PathBuf,
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_SEARCH_ENDPOINT,
        help = "Occurrence search endpoint"
    )]
    endpoint: String,
    #[arg(
        long = "timeout-secs",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "End-to-end timeout per request"
    )]
    timeout_secs: u64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `gbif-stream`: descriptors as JSON lines to `out`, summary to `diag`.
///
/// `build_api` receives the client settings resolved from the command line.
pub fn run_stream<I, Build>(
    args_iter: I,
    build_api: Build,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
    Build: FnOnce(GbifClientConfig) -> DynApi,
{
    init_tracing();

    let Some(cli) =
        parse_cli::<StreamCli, _>(std::iter::once("gbif-stream".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = StreamConfig::load(&cli.config)?;
    config.seed = cli.seed.unwrap_or(config.seed);
    config.cache_requests |= cli.cache;
    let api = build_api(GbifClientConfig {
        endpoint: cli.endpoint,
        timeout: Duration::from_secs(cli.timeout_secs),
        cache_requests: config.cache_requests,
    });

    let mut stream = build_stream(&config, api)?;
    let mut skipped = 0u64;
    for item in stream.by_ref() {
        match item {
            Ok(descriptor) => {
                serde_json::to_writer(&mut *out, &descriptor)?;
                writeln!(out)?;
            }
            Err(err) if err.is_record_level() => {
                skipped += 1;
                warn!(error = %err, "skipping record");
            }
            Err(err) => return Err(err.into()),
        }
    }
    out.flush()?;

    let counts = stream.emitted_per_stream();
    writeln!(diag, "=== stream summary ===")?;
    let mut ids: Vec<_> = counts.keys().collect();
    ids.sort();
    for id in ids {
        writeln!(diag, "  {id}: {}", counts[id])?;
    }
    writeln!(diag, "skipped records: {skipped}")?;
    if let Some(skew) = stream_skew(counts.iter().map(|(id, count)| (id.as_str(), *count))) {
        writeln!(
            diag,
            "total: {} | streams: {} | min: {} | max: {} | max share: {:.3} | ratio: {:.3}",
            skew.total, skew.streams, skew.min, skew.max, skew.max_share, skew.ratio
        )?;
    }
    Ok(())
}

/// Run `gbif-budget`: a metadata-only report written to `out`.
pub fn run_budget<I, Build>(
    args_iter: I,
    build_api: Build,
    out: &mut dyn Write,
) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
    Build: FnOnce(GbifClientConfig) -> DynApi,
{
    init_tracing();

    let Some(cli) =
        parse_cli::<BudgetCli, _>(std::iter::once("gbif-budget".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let config = StreamConfig::load(&cli.config)?;
    let limits = config.validate()?;
    let api = build_api(GbifClientConfig {
        endpoint: cli.endpoint,
        timeout: Duration::from_secs(cli.timeout_secs),
        cache_requests: config.cache_requests,
    });

    let sub_queries = split_query(&config.queries, &limits.split_fields)?;
    let populations = count_populations(api.as_ref(), &sub_queries, config.mediatype)?;
    let weights = normalized_weights(&populations);

    writeln!(out, "=== population budget (count-only) ===")?;
    writeln!(out, "mode: metadata-only (zero-size searches, no paging)")?;
    writeln!(out, "mediatype: {}", config.mediatype)?;
    writeln!(out)?;
    writeln!(out, "[STREAMS]")?;
    for (idx, (sub_query, population)) in sub_queries.iter().zip(&populations).enumerate() {
        let weight = weights
            .as_ref()
            .map(|weights| format!("{:.4}", weights[idx]))
            .unwrap_or_else(|| "n/a".to_string());
        writeln!(
            out,
            "  {}: population {} | weight {}",
            sub_query.id, population, weight
        )?;
    }
    writeln!(out)?;
    writeln!(out, "[TOTALS]")?;
    writeln!(out, "  streams: {}", sub_queries.len())?;
    writeln!(out, "  population: {}", populations.iter().sum::<u64>())?;
    writeln!(
        out,
        "  reachable with per-stream cap: {}",
        capped_population_total(&populations, limits.per_stream_cap)
    )?;
    writeln!(
        out,
        "  balanced budget: {}",
        balanced_sample_budget(&populations)
    )?;
    Ok(())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
