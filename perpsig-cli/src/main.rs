//! perpsig CLI: signal engine for USDT-margined perpetual futures.
//!
//! Commands:
//! - `run`: start the polling loop (advisory or live, per config)
//! - `optimize`: grid-search thresholds per symbol and write the parameter book
//! - `signal`: evaluate one symbol now and print the result as JSON
//! - `check-config`: load and validate a config file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use perpsig_core::domain::MarketSeries;
use perpsig_core::exchange::{BitgetClient, Credentials};
use perpsig_core::notify::{notifier_from_env, Notifier};
use perpsig_core::pacing::ThreadPacer;
use perpsig_core::strategy::create_strategy;
use perpsig_runner::{
    fingerprint, load_symbol, BookEntry, BookError, Collaborators, EngineConfig, HealthServer,
    Optimizer, ParameterBook, Scheduler,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "perpsig",
    about = "perpsig: technical-indicator signal engine for perpetual futures"
)]
struct Cli {
    /// Path to the TOML config. Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the polling loop until Ctrl-C.
    Run,
    /// Grid-search strategy thresholds and write the parameter book.
    Optimize {
        /// Read `{dir}/{SYMBOL}.csv` instead of fetching from the exchange.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Symbols to optimize. Defaults to the configured universe.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Output path. Defaults to `optimizer.param_book` from the config.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evaluate one symbol against live candles and print JSON.
    Signal {
        symbol: String,

        /// Size the signal against this equity.
        #[arg(long)]
        equity: Option<f64>,
    },
    /// Load and validate the config, then print the resolved values.
    CheckConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => run_loop(config),
        Commands::Optimize {
            csv_dir,
            symbols,
            output,
        } => run_optimize(config, csv_dir, symbols, output),
        Commands::Signal { symbol, equity } => run_signal(config, &symbol, equity),
        Commands::CheckConfig => run_check_config(config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_book(path: &Path) -> Result<Option<ParameterBook>> {
    match ParameterBook::load(path) {
        Ok(book) => Ok(Some(book)),
        Err(BookError::Io { .. }) if !path.exists() => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading parameter book {}", path.display())),
    }
}

fn run_loop(config: EngineConfig) -> Result<()> {
    let Some(credentials) = Credentials::from_env() else {
        bail!(
            "exchange credentials missing: set BITGET_API_KEY, BITGET_API_SECRET and BITGET_API_PASSPHRASE"
        );
    };
    let client = Arc::new(
        BitgetClient::new(config.exchange.clone(), Some(credentials))
            .context("building exchange client")?,
    );
    let notifier: Arc<dyn Notifier> = Arc::from(notifier_from_env(config.notify.timeout()));

    let book = load_book(&config.optimizer.param_book)?;
    match &book {
        Some(book) if book.strategy != config.strategy.kind => warn!(
            book = %book.strategy,
            configured = %config.strategy.kind,
            "parameter book tuned for another strategy, ignoring it"
        ),
        Some(book) => info!(entries = book.entries.len(), "parameter book loaded"),
        None => info!("no parameter book, using configured parameters"),
    }

    let stop = Arc::new(AtomicBool::new(false));
    let ready = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("stop requested, finishing current cycle");
            stop.store(true, Ordering::Relaxed);
        })
        .context("installing Ctrl-C handler")?;
    }

    let health = if config.health.enabled {
        Some(HealthServer::spawn(&config.health.bind, ready.clone(), stop.clone())?)
    } else {
        None
    };

    let mut scheduler = Scheduler::new(
        config,
        Collaborators {
            market: client.clone(),
            exchange: client,
            notifier,
            pacer: Arc::new(ThreadPacer),
        },
        book.as_ref(),
    );
    scheduler.run(&stop, &ready);

    if let Some(health) = health {
        health.join();
    }
    Ok(())
}

fn run_optimize(
    config: EngineConfig,
    csv_dir: Option<PathBuf>,
    symbols: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let symbols = if symbols.is_empty() {
        config.universe.symbols.clone()
    } else {
        symbols
    };
    let output = output.unwrap_or_else(|| config.optimizer.param_book.clone());
    let opt = &config.optimizer;
    let kind = config.strategy.kind;

    let client = match csv_dir {
        Some(_) => None,
        None => Some(
            BitgetClient::new(config.exchange.clone(), None).context("building exchange client")?,
        ),
    };

    // Extend an existing book for the same strategy rather than replacing it.
    let mut book = match load_book(&output)? {
        Some(book) if book.strategy == kind && book.timeframe == opt.timeframe => book,
        _ => ParameterBook::new(kind, opt.timeframe),
    };

    let optimizer = Optimizer::new(kind, opt.grid_for(kind), opt.max_evaluations);
    let mut failures = 0usize;
    for symbol in &symbols {
        let candles = match (&csv_dir, &client) {
            (Some(dir), _) => load_symbol(dir, symbol)
                .with_context(|| format!("loading {symbol} history"))?,
            (None, Some(client)) => client
                .candles(symbol, opt.timeframe, opt.history_limit)
                .with_context(|| format!("fetching {symbol} history"))?,
            (None, None) => bail!("no candle source"),
        };

        let base = config.params_for(symbol, None);
        match optimizer.optimize(symbol, &candles, &base) {
            Ok(result) => {
                println!(
                    "{symbol}: win rate {:.4} over {} trades ({} combinations, {} candles)",
                    result.score.win_rate, result.score.trades, result.evaluated, result.candle_count
                );
                let print = fingerprint(kind, &candles, optimizer.grid());
                book.entries
                    .insert(symbol.clone(), BookEntry::from_optimization(&result, print));
            }
            Err(e) => {
                failures += 1;
                warn!(symbol = %symbol, error = %e, "optimization failed");
            }
        }
    }

    book.created_at = chrono::Utc::now();
    book.save(&output)
        .with_context(|| format!("writing parameter book {}", output.display()))?;
    println!("wrote {} entries to {}", book.entries.len(), output.display());
    if failures == symbols.len() {
        bail!("no symbol could be optimized");
    }
    Ok(())
}

fn run_signal(config: EngineConfig, symbol: &str, equity: Option<f64>) -> Result<()> {
    let client =
        BitgetClient::new(config.exchange.clone(), None).context("building exchange client")?;
    let book = load_book(&config.optimizer.param_book)?;
    let params = config.params_for(symbol, book.as_ref());
    let strategy = create_strategy(config.strategy.kind);

    let tf = &config.timeframes;
    let fast = client
        .candles(symbol, tf.fast, tf.fast_limit)
        .with_context(|| format!("fetching {symbol} {}", tf.fast))?;
    let slow = if strategy.required_len(&params).slow > 0 {
        client
            .candles(symbol, tf.slow, tf.slow_limit)
            .with_context(|| format!("fetching {symbol} {}", tf.slow))?
    } else {
        fast.clone()
    };

    let (signal, snapshot) = strategy.assess(symbol, MarketSeries::new(&fast, &slow), &params);
    let plan = match (equity, snapshot.atr) {
        (Some(equity), Some(atr)) => config.risk.size(&signal, signal.reference_price, equity, atr),
        _ => None,
    };

    let out = serde_json::json!({
        "strategy": config.strategy.kind,
        "timeframes": [tf.fast, tf.slow],
        "signal": signal,
        "snapshot": snapshot,
        "plan": plan,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_check_config(config: EngineConfig) -> Result<()> {
    println!("config OK");
    println!("  mode:       {}", config.execution.mode);
    println!("  strategy:   {}", config.strategy.kind);
    println!(
        "  timeframes: {} x{} / {} x{}",
        config.timeframes.fast,
        config.timeframes.fast_limit,
        config.timeframes.slow,
        config.timeframes.slow_limit
    );
    println!("  universe:   {}", config.universe.symbols.join(", "));
    println!(
        "  optimizer:  {} combinations on {} x{}",
        config.optimizer.grid_for(config.strategy.kind).size(),
        config.optimizer.timeframe,
        config.optimizer.history_limit
    );
    if !config.params.is_empty() {
        let symbols: Vec<&str> = config.params.keys().map(String::as_str).collect();
        println!("  overrides:  {}", symbols.join(", "));
    }
    for (name, present) in [
        ("exchange credentials", Credentials::from_env().is_some()),
        (
            "telegram",
            std::env::var("TELEGRAM_BOT_TOKEN").is_ok() && std::env::var("TELEGRAM_CHAT_ID").is_ok(),
        ),
    ] {
        println!("  {name}: {}", if present { "set" } else { "not set" });
    }
    Ok(())
}
