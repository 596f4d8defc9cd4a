//! Command-line interface for the news signal pipeline

use anyhow::Context;
use clap::{Parser, Subcommand};
use signal_analysis::{AnalyzerConfig, MemoryStore, NewsAnalyzer, NewsItem, YahooPriceSource};
use signal_llm::providers::OpenAIProvider;
use signal_universe::{ChromaBackend, ConnectionState, StockRegistry, StockUniverse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_UNIVERSE_CSV: &str = "data/stock_universe.csv";

#[derive(Parser, Debug)]
#[command(name = "signal-cli")]
#[command(about = "Turn financial news into trading signals", long_about = None)]
struct Args {
    /// Path to the stock universe CSV (overrides STOCK_UNIVERSE_CSV)
    #[arg(long)]
    universe: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the semantic stock index unless it already exists
    Ingest,

    /// Analyze a JSON file of news items and persist the resulting signals
    Analyze {
        /// Path to a JSON array of news items
        file: PathBuf,
    },

    /// Look up a stock by its symbol
    Lookup {
        /// Symbol, with or without market suffix (RELIANCE or RELIANCE.NS)
        symbol: String,
    },

    /// Match free-form company names against the universe
    Match {
        /// Company names as they appear in text
        names: Vec<String>,

        /// Restrict matches to these industries
        #[arg(long)]
        industry: Vec<String>,
    },
}

/// Initialize tracing subscriber with default configuration
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn universe_csv_path(args: &Args) -> PathBuf {
    args.universe.clone().unwrap_or_else(|| {
        std::env::var("STOCK_UNIVERSE_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UNIVERSE_CSV))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let csv_path = universe_csv_path(&args);
    let registry = Arc::new(
        StockRegistry::load(&csv_path)
            .with_context(|| format!("loading stock universe from {}", csv_path.display()))?,
    );
    info!("Loaded {} stocks from {}", registry.len(), csv_path.display());

    let backend = Arc::new(ChromaBackend::from_env().context("configuring Chroma backend")?);
    let universe = Arc::new(StockUniverse::new(registry, backend));

    match args.command {
        Command::Ingest => ingest(&universe).await,
        Command::Analyze { file } => analyze(universe, &file).await,
        Command::Lookup { symbol } => lookup(&universe, &symbol),
        Command::Match { names, industry } => match_names(&universe, names, industry),
    }
}

async fn ingest(universe: &StockUniverse) -> anyhow::Result<()> {
    match universe.connect().await {
        ConnectionState::Connected(_) => {}
        state => anyhow::bail!("index backend unavailable ({state:?})"),
    }

    let built = universe.build_if_absent().await?;
    if built {
        println!("Index built for {} stocks", universe.registry().len());
    } else {
        println!("Index already present, nothing to do");
    }
    Ok(())
}

async fn analyze(universe: Arc<StockUniverse>, file: &Path) -> anyhow::Result<()> {
    if universe.connect().await == ConnectionState::Failed {
        warn!("Index backend unavailable; retrieval degrades to the full universe");
    }

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading news from {}", file.display()))?;
    let items: Vec<NewsItem> =
        serde_json::from_str(&raw).context("news file is not a JSON array of news items")?;
    info!("Analyzing {} news item(s)", items.len());

    let provider = Arc::new(OpenAIProvider::from_env().context("configuring OpenAI provider")?);
    let config = AnalyzerConfig::default().with_env_model();
    config.validate()?;
    let prices = Arc::new(YahooPriceSource::with_cache_ttl(
        &config.market_suffix,
        config.price_cache_ttl,
    ));
    let store = Arc::new(MemoryStore::new());

    let analyzer = NewsAnalyzer::new(provider, universe, prices, store.clone(), config);
    let report = analyzer.run(&items).await?;

    println!(
        "Persisted {} signal(s) and {} news record(s)",
        report.signals_persisted, report.news_persisted
    );
    println!("{}", serde_json::to_string_pretty(&store.signals().await)?);
    Ok(())
}

fn lookup(universe: &StockUniverse, symbol: &str) -> anyhow::Result<()> {
    match universe.stock_by_symbol(symbol) {
        Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
        None => anyhow::bail!("{symbol} is not in the stock universe"),
    }
    Ok(())
}

fn match_names(
    universe: &StockUniverse,
    names: Vec<String>,
    industries: Vec<String>,
) -> anyhow::Result<()> {
    let industries = (!industries.is_empty()).then_some(industries.as_slice());
    let matches = universe.find_matching_stocks(&names, industries);

    if matches.is_empty() {
        println!("No matches");
    } else {
        println!("{}", serde_json::to_string_pretty(&matches)?);
    }
    Ok(())
}
