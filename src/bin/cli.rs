//! CLI binary for seo-monitor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use seo_monitor::catalog::{self, parse_keyword_lines};
use seo_monitor::model::{EngineId, KeywordId, RecordOrder, SiteId};
use seo_monitor::store::sqlite::{NewEngine, NewSite};
use seo_monitor::store::{KeywordStore, RankingHistoryStore};
use seo_monitor::{KeywordFilter, MonitorConfig, MonitorError, RankResolver, SqliteStore};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// seo-monitor: track a site's organic search engine positions over time.
#[derive(Parser)]
#[command(name = "seo-monitor", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the rank database path.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Print listings as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage search engines.
    #[command(subcommand)]
    Engine(EngineCommand),

    /// Manage monitored sites and their keywords.
    #[command(subcommand)]
    Site(SiteCommand),

    /// Inspect tracked keywords.
    #[command(subcommand)]
    Keyword(KeywordCommand),

    /// Resolve and record the current rank of one keyword.
    Resolve { keyword_id: KeywordId },

    /// Resolve every keyword not yet checked today.
    RunDue,

    /// Show the rank history of a keyword.
    History {
        keyword_id: KeywordId,
        #[arg(long)]
        limit: Option<usize>,
        /// Oldest entries first.
        #[arg(long)]
        oldest_first: bool,
    },

    /// Show the most recent event log entries.
    Logs {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum EngineCommand {
    /// Register a search engine.
    Add {
        #[arg(long)]
        name: String,
        /// e.g. https://www.google.co.uk
        #[arg(long)]
        base_url: String,
        /// Strategy key; derived from the base URL when omitted.
        #[arg(long)]
        short_name: Option<String>,
        #[arg(long)]
        group: Option<String>,
    },
    List,
    /// Delete an engine no site uses any more.
    Remove { id: EngineId },
}

#[derive(Subcommand)]
enum SiteCommand {
    /// Register a site.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Country code, or `all`.
        #[arg(long, default_value = "all")]
        location: String,
        #[arg(long, default_value = "en")]
        language: String,
    },
    List,
    /// Replace a site's engines and keyword list.
    Sync(SyncArgs),
    /// Delete a site with its keywords and rank history.
    Remove { id: SiteId },
}

#[derive(Args)]
struct SyncArgs {
    site_id: SiteId,
    /// Engine ids the site is ranked on (repeatable).
    #[arg(long = "engine", required = true)]
    engines: Vec<EngineId>,
    /// Keyword text (repeatable).
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    /// File with one keyword per line.
    #[arg(long)]
    keywords_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum KeywordCommand {
    List {
        #[arg(long)]
        site: Option<SiteId>,
        #[arg(long)]
        engine: Option<EngineId>,
        /// Case-insensitive substring of the keyword text.
        #[arg(long)]
        search: Option<String>,
        /// Only keywords due for a check today.
        #[arg(long)]
        due: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(MonitorConfig::default_config_path);
    let mut config = MonitorConfig::load_or_default(&config_path)?;
    if let Some(ref database) = cli.database {
        config.storage.database_path = Some(database.clone());
    }
    config.validate()?;

    let _log_guard = init_tracing(&config);

    let db_path = config.storage.resolved_database_path();
    let store = Arc::new(SqliteStore::open(&db_path)?);
    info!(path = %db_path.display(), "rank store ready");

    match cli.command {
        Command::Engine(cmd) => engine_command(&store, cmd, cli.json),
        Command::Site(cmd) => site_command(&store, cmd, cli.json),
        Command::Keyword(cmd) => keyword_command(&store, cmd, cli.json),
        Command::Resolve { keyword_id } => {
            let resolver = RankResolver::from_config(&config, store)?;
            resolve(&resolver, keyword_id).await
        }
        Command::RunDue => {
            let resolver = RankResolver::from_config(&config, store)?;
            let summary = resolver.resolve_all_due_keywords().await?;
            print_json_or(cli.json, &summary, || {
                println!(
                    "attempted {}  succeeded {}  failed {}  captcha {}",
                    summary.attempted, summary.succeeded, summary.failed, summary.captcha_blocked
                );
            })
        }
        Command::History {
            keyword_id,
            limit,
            oldest_first,
        } => {
            let order = if oldest_first {
                RecordOrder::OldestFirst
            } else {
                RecordOrder::NewestFirst
            };
            let records = store.list_records(keyword_id, order, limit)?;
            print_json_or(cli.json, &records, || {
                for r in &records {
                    println!("{}  {:>4}  {}", r.observed_at, r.rank, r.rank_link);
                }
            })
        }
        Command::Logs { limit } => {
            let events = store.list_events(limit)?;
            print_json_or(cli.json, &events, || {
                for e in &events {
                    println!("{}  {:<5}  {:<6}  {}", e.logged_at, e.severity, e.category, e.message);
                }
            })
        }
    }
}

/// Install the stderr subscriber, plus a daily log file when configured.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &MonitorConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let (file_layer, guard) = match config.logging.directory {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "seo-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn engine_command(store: &SqliteStore, cmd: EngineCommand, json: bool) -> anyhow::Result<()> {
    match cmd {
        EngineCommand::Add {
            name,
            base_url,
            short_name,
            group,
        } => {
            let engine = store.add_engine(NewEngine {
                name: &name,
                base_url: &base_url,
                short_name: short_name.as_deref(),
                group: group.as_deref(),
            })?;
            println!("engine {} ({}) registered", engine.id, engine.short_name);
        }
        EngineCommand::List => {
            let engines = store.list_engines()?;
            print_json_or(json, &engines, || {
                for e in &engines {
                    println!(
                        "{:>4}  {:<10}  {:<24}  {}  {}",
                        e.id,
                        e.short_name,
                        e.name,
                        e.base_url,
                        e.group.as_deref().unwrap_or("")
                    );
                }
            })?;
        }
        EngineCommand::Remove { id } => {
            catalog::remove_engine(store, id)?;
            println!("engine {id} removed");
        }
    }
    Ok(())
}

fn site_command(store: &SqliteStore, cmd: SiteCommand, json: bool) -> anyhow::Result<()> {
    match cmd {
        SiteCommand::Add {
            name,
            url,
            location,
            language,
        } => {
            let site = store.add_site(NewSite {
                name: &name,
                url: &url,
                location: &location,
                language: &language,
            })?;
            println!("site {} registered", site.id);
        }
        SiteCommand::List => {
            let sites = store.list_sites()?;
            print_json_or(json, &sites, || {
                for s in &sites {
                    let engines: Vec<String> = s.engine_ids.iter().map(|e| e.to_string()).collect();
                    println!(
                        "{:>4}  {:<24}  {}  [{} / {}]  engines: {}",
                        s.id,
                        s.name,
                        s.url,
                        s.location,
                        s.language,
                        engines.join(",")
                    );
                }
            })?;
        }
        SiteCommand::Sync(args) => {
            let mut texts = args.keywords;
            if let Some(ref path) = args.keywords_file {
                texts.extend(read_keyword_file(path)?);
            }
            let report = catalog::sync_site_keywords(store, args.site_id, &args.engines, &texts)?;
            println!(
                "site {}: {} keyword(s) added, {} removed",
                args.site_id, report.added, report.removed
            );
        }
        SiteCommand::Remove { id } => {
            catalog::remove_site(store, id)?;
            println!("site {id} removed");
        }
    }
    Ok(())
}

fn keyword_command(store: &SqliteStore, cmd: KeywordCommand, json: bool) -> anyhow::Result<()> {
    let KeywordCommand::List {
        site,
        engine,
        search,
        due,
    } = cmd;
    let mut filter = if due {
        KeywordFilter::due_on(chrono::Local::now().date_naive())
    } else {
        KeywordFilter::all()
    };
    filter.site_id = site;
    filter.engine_id = engine;
    filter.text = search;

    let keywords = store.list_keywords(&filter)?;
    print_json_or(json, &keywords, || {
        for k in &keywords {
            let checked = k
                .last_check
                .map_or_else(|| "never".to_string(), |t| t.to_string());
            println!(
                "{:>5}  site {:<3} engine {:<3} rank {:>3} (prev {:>3}, top {:>3})  {:<19}  {}",
                k.id, k.site_id, k.engine_id, k.rank, k.previous, k.top_rank, checked, k.text
            );
        }
    })
}

async fn resolve(resolver: &RankResolver, keyword_id: KeywordId) -> anyhow::Result<()> {
    match resolver.resolve_keyword_rank(keyword_id).await {
        Ok(outcome) if outcome.is_ranked() => {
            println!("rank {}  {}", outcome.rank, outcome.url);
            Ok(())
        }
        Ok(outcome) => {
            println!(
                "not ranked: {}",
                outcome.message.as_deref().unwrap_or("site not found")
            );
            Ok(())
        }
        Err(MonitorError::RecordFailed { outcome, reason }) => {
            println!("rank {}  {}  (NOT STORED)", outcome.rank, outcome.url);
            anyhow::bail!("rank could not be stored: {reason}")
        }
        Err(e) if e.is_captcha() => {
            anyhow::bail!("search engine answered with a captcha, rank unknown: {e}")
        }
        Err(e) => Err(e.into()),
    }
}

fn read_keyword_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_keyword_lines(&content))
}

fn print_json_or<T: Serialize>(json: bool, value: &T, plain: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain();
    }
    Ok(())
}
