use anyhow::Result;
use colored::Colorize;
use nse_signal::api_server_axum::{self, AppState};
use nse_signal::{
    AppConfig, ChainSource, Mode, NSEClient, RunControl, Signal, SignalWorker, StateStore,
    YahooTrend, logging, models, processor, rules,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Run the background worker and the HTTP accessors until Ctrl-C
async fn run_server(config: AppConfig) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "NSE Signal Server".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!("{} Symbol: {}", "→".cyan(), config.symbol.yellow());
    println!("{} State file: {}", "→".cyan(), config.data_file().display());
    println!("{} Port: {}", "→".cyan(), config.port);
    println!();

    let store = Arc::new(StateStore::open(config.data_file(), config.audit_file()));
    let control = RunControl::new();
    if config.autostart {
        control.start();
    }

    let source = Arc::new(NSEClient::new(&config.symbol)?);
    let trend = Arc::new(YahooTrend::new(&config.trend_ticker)?);
    let worker = SignalWorker::new(
        source,
        trend,
        Arc::clone(&store),
        control.watcher(),
        config.params,
        config.timing,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let served = api_server_axum::start_server(config.port, AppState::new(store, control), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received");
    })
    .await;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    served
}

/// Run a single fetch/decide cycle and print the outcome (no files written)
async fn run_once(config: AppConfig) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "NSE Signal - Single Cycle".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let client = NSEClient::new(&config.symbol)?;
    let trend = YahooTrend::new(&config.trend_ticker)?;

    println!("{} Fetching option chain for {}...", "→".cyan(), config.symbol.yellow());
    let chain = client.fetch_chain().await?;
    let rows = processor::normalize(&chain);
    println!("{} {} rows normalized", "✓".green(), rows.len());

    let verdict = rules::decide(&rows, &config.params, &trend).await;
    let state = verdict.into_state(models::now_hms());

    let signal = match state.signal {
        Signal::BuyCe | Signal::BuyPe => state.signal.as_str().green().bold(),
        Signal::NoTrade => state.signal.as_str().yellow().bold(),
        _ => state.signal.as_str().red().bold(),
    };

    println!();
    println!("{}", "=".repeat(60).blue());
    println!("{} Signal: {}", "ℹ".blue(), signal);
    println!("{} Votes: CE {} / PE {}", "ℹ".blue(), state.ce_votes, state.pe_votes);
    for reason in &state.reasons {
        println!("  {} {}", "•".cyan(), reason);
    }
    println!("{}", "=".repeat(60).blue());
    println!();
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    logging::init_logging(&config.log_dir)?;

    info!(mode = ?config.mode, symbol = %config.symbol, "Configuration loaded");

    match config.mode {
        Mode::Server => run_server(config).await,
        Mode::Once => run_once(config).await,
    }
}
