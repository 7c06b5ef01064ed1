//! Run a rebuild against seeded in-memory content and print job snapshots.
//!
//! Uses the Postgres registry when `DATABASE_URL` is set, the in-memory one
//! otherwise.
//!
//! Usage:
//!   quire-sim --sources 50 --notes 20 --insights 10 --fail-every 7 --mode all

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use quire_core::{ItemCategory, JobRegistry, RebuildMode, RebuildRequest};
use quire_jobs::mock::{MockContentStore, MockEmbedder, MockPodcastGenerator, MockSourceIngestor};
use quire_jobs::{
    AggregatorConfig, CommandFacade, ItemEnumerator, ItemTimeouts, MemoryJobRegistry, Providers,
    WorkerBuilder, WorkerConfig,
};

#[derive(Debug)]
struct Args {
    sources: u64,
    notes: u64,
    insights: u64,
    fail_every: Option<u64>,
    mode: RebuildMode,
    concurrency: Option<usize>,
    latency_ms: u64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            sources: 20,
            notes: 10,
            insights: 5,
            fail_every: None,
            mode: RebuildMode::All,
            concurrency: None,
            latency_ms: 20,
        }
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    parse_args_from(&args)
}

/// Parse a numeric flag value, warning and keeping the default when it is
/// missing or malformed.
fn number<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Option<T> {
    match value.map(|v| (v, v.parse::<T>())) {
        Some((_, Ok(n))) => Some(n),
        Some((raw, Err(_))) => {
            eprintln!("Invalid value for {}: {:?}. Using default.", flag, raw);
            None
        }
        None => {
            eprintln!("Missing value for {}. Using default.", flag);
            None
        }
    }
}

fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let next = args.get(i + 1);
        match flag {
            "--sources" => {
                if let Some(n) = number(flag, next) {
                    result.sources = n;
                }
                i += 1;
            }
            "--notes" => {
                if let Some(n) = number(flag, next) {
                    result.notes = n;
                }
                i += 1;
            }
            "--insights" => {
                if let Some(n) = number(flag, next) {
                    result.insights = n;
                }
                i += 1;
            }
            "--fail-every" => {
                result.fail_every = number(flag, next).filter(|n: &u64| *n > 0);
                i += 1;
            }
            "--mode" => {
                result.mode = match next.map(|v| v.to_lowercase()).as_deref() {
                    Some("existing") => RebuildMode::Existing,
                    Some("all") => RebuildMode::All,
                    other => {
                        eprintln!("Unknown mode: {:?}. Using all.", other);
                        RebuildMode::All
                    }
                };
                i += 1;
            }
            "--concurrency" | "-c" => {
                result.concurrency = number(flag, next);
                i += 1;
            }
            "--latency-ms" => {
                if let Some(n) = number(flag, next) {
                    result.latency_ms = n;
                }
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    result
}

fn print_help() {
    println!(
        r#"quire-sim: rebuild embeddings over seeded content

USAGE:
    quire-sim [OPTIONS]

OPTIONS:
    --sources <N>        Sources to seed (default: 20)
    --notes <N>          Notes to seed (default: 10)
    --insights <N>       Insights to seed (default: 5)
    --fail-every <N>     Make every Nth item of each category fail
    --mode <MODE>        all | existing (default: all)
    -c, --concurrency <N> Item pool size per job
    --latency-ms <MS>    Simulated embedding latency (default: 20)
    -h, --help           Print help

ENVIRONMENT:
    DATABASE_URL         Use the Postgres registry instead of memory
    LOG_FORMAT           json | text (default: text)
    LOG_FILE             Also write logs to this file, rotated daily
    RUST_LOG             Log filter (default: quire_jobs=info)"#
    );
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = env::var("LOG_FILE").ok();
    let log_ansi = env::var("LOG_ANSI").ok().map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quire_jobs=info,quire_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_file {
        Some(ref path) => {
            let path = std::path::Path::new(path);
            let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("quire-sim.log");
            let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            if log_format == "json" {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(non_blocking)
                            .with_ansi(log_ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            if log_format == "json" {
                registry.with(tracing_subscriber::fmt::layer().json()).init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    }
}

fn failing_ids(category: ItemCategory, count: u64, every: Option<u64>) -> Vec<String> {
    match every {
        Some(every) => (1..=count)
            .filter(|n| n % every == 0)
            .map(|n| format!("{}:{}", category, n))
            .collect(),
        None => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let args = parse_args();

    let (registry, notify): (Arc<dyn JobRegistry>, Arc<Notify>) = match env::var("DATABASE_URL") {
        Ok(url) => {
            let db = quire_db::Database::connect(&url).await?;
            db.migrate().await?;
            info!("Using Postgres job registry");
            let notify = db.jobs.job_notify();
            let registry: Arc<dyn JobRegistry> = Arc::new(db.jobs);
            (registry, notify)
        }
        Err(_) => {
            let memory = Arc::new(MemoryJobRegistry::new());
            let notify = memory.job_notify();
            let registry: Arc<dyn JobRegistry> = memory;
            (registry, notify)
        }
    };

    let store = Arc::new(MockContentStore::new());
    store.seed(ItemCategory::Source, args.sources, true).await;
    store.seed(ItemCategory::Note, args.notes, true).await;
    store.seed(ItemCategory::Insight, args.insights, true).await;

    let failing = [
        (ItemCategory::Source, args.sources),
        (ItemCategory::Note, args.notes),
        (ItemCategory::Insight, args.insights),
    ]
    .into_iter()
    .flat_map(|(category, count)| failing_ids(category, count, args.fail_every));
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_failing(failing)
            .with_latency(Duration::from_millis(args.latency_ms)),
    );

    let mut aggregator = AggregatorConfig::from_env();
    if let Some(n) = args.concurrency {
        aggregator = aggregator.with_item_concurrency(n);
    }

    let providers = Providers {
        store: store.clone(),
        embedder,
        podcast: Arc::new(MockPodcastGenerator::new()),
        ingestor: Arc::new(MockSourceIngestor::new()),
    };
    let handle = WorkerBuilder::new(registry.clone())
        .with_config(WorkerConfig::from_env())
        .with_notify(notify)
        .with_providers(providers, aggregator, ItemTimeouts::from_env())
        .build()
        .start();

    let facade = CommandFacade::new(registry, handle.backend())
        .with_enumerator(ItemEnumerator::new(store));
    let submission = facade.submit_rebuild(RebuildRequest::new(args.mode)).await?;
    println!("{}", serde_json::to_string(&submission)?);

    let job_id = submission.job_id.to_string();
    loop {
        let snapshot = facade.get_status(&job_id).await?;
        println!("{}", serde_json::to_string(&snapshot)?);
        if snapshot.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    handle.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("quire-sim")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parses_flags() {
        let args = parse_args_from(&argv(&[
            "--sources", "3", "--mode", "existing", "-c", "6", "--fail-every", "2",
        ]));
        assert_eq!(args.sources, 3);
        assert_eq!(args.mode, RebuildMode::Existing);
        assert_eq!(args.concurrency, Some(6));
        assert_eq!(args.fail_every, Some(2));
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let args = parse_args_from(&argv(&["--notes", "many", "--latency-ms", "-5", "--sources"]));
        let defaults = Args::default();
        assert_eq!(args.notes, defaults.notes);
        assert_eq!(args.latency_ms, defaults.latency_ms);
        assert_eq!(args.sources, defaults.sources);
    }

    #[test]
    fn test_zero_fail_every_disables_failures() {
        let args = parse_args_from(&argv(&["--fail-every", "0"]));
        assert_eq!(args.fail_every, None);
        assert_eq!(failing_ids(ItemCategory::Note, 4, Some(2)), vec!["note:2", "note:4"]);
    }
}
