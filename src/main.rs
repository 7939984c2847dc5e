use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confluence_scanner_lib::config::{parse_watchlist, ScannerConfig};
use confluence_scanner_lib::services::{DisplayRow, IngestService, MatrixStatus, ScannerService, UnitOutcome};
use confluence_scanner_lib::state::AppState;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "confluence-scanner")]
#[command(about = "Multi-timeframe confluence scanner for a stock watchlist")]
#[command(version)]
struct Cli {
    /// JSON config file (defaults to ./confluence.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// DuckDB file, overrides the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars, compute indicators and upsert them into the store
    Ingest {
        /// Comma-separated instruments to ingest instead of the watchlist
        #[arg(long)]
        only: Option<String>,
    },
    /// Print the classified matrix
    Scan {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print stored row counts per instrument and timeframe
    Counts,
    /// Run the refresh scheduler and the HTTP API
    Serve {
        /// Port to listen on, overrides the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Run one ingest before serving
        #[arg(long)]
        ingest: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    confluence_scanner_lib::init_tracing();
    let cli = Cli::parse();

    let mut config = ScannerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Commands::Ingest { only: Some(list) } = &cli.command {
        config.watchlist = parse_watchlist(list);
        config.validate().context("Invalid --only list")?;
    }
    if let Commands::Serve { port: Some(port), .. } = &cli.command {
        config.http.port = *port;
    }

    let db_path = config.db_path.clone();
    let state = Arc::new(
        AppState::new(config).with_context(|| format!("Failed to open store at {}", db_path.display()))?,
    );

    match cli.command {
        Commands::Ingest { .. } => ingest(&state).await,
        Commands::Scan { json } => scan(&state, json),
        Commands::Counts => counts(&state),
        Commands::Serve { ingest: run_ingest, .. } => {
            if run_ingest {
                ingest(&state).await?;
            }
            confluence_scanner_lib::serve(state).await.context("Server failed")
        }
    }
}

async fn ingest(state: &Arc<AppState>) -> Result<()> {
    let report = IngestService::run(state).await;

    println!("{:<8} {:<4} RESULT", "TICKER", "TF");
    for unit in &report.units {
        let result = match &unit.outcome {
            UnitOutcome::Stored { rows } => format!("stored {} rows", rows),
            UnitOutcome::Skipped { reason } => format!("skipped: {}", reason),
            UnitOutcome::Failed { error } => format!("FAILED: {}", error),
        };
        println!("{:<8} {:<4} {}", unit.instrument, unit.timeframe, result);
    }
    println!(
        "\n{} stored, {} skipped, {} failed in {:.1}s",
        report.stored(),
        report.skipped(),
        report.failed(),
        report.duration_ms as f64 / 1000.0
    );

    counts(state)
}

fn scan(state: &AppState, json: bool) -> Result<()> {
    let view = ScannerService::get_matrix(state);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    match view.status {
        MatrixStatus::Ok => {
            println!(
                "{:<7} {:<17} {:>9} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8}  {}",
                "TICKER", "STATUS", "PRICE", "ADX 1D", "RSI 1H", "BBW", "MIN20", "MACD", "SIGNAL", "UPDATED"
            );
            for row in &view.rows {
                print_row(row);
            }
        }
        MatrixStatus::NoData | MatrixStatus::RefreshFailed => {
            println!("{}", view.message.unwrap_or_default());
        }
    }
    Ok(())
}

fn print_row(row: &DisplayRow) {
    println!(
        "{:<7} {:<17} {:>9.2} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8}  {}",
        row.ticker,
        row.status,
        row.current_price,
        cell(row.daily_adx),
        cell(row.hourly_rsi),
        cell(row.hourly_bb_width),
        cell(row.hourly_min_bb_width_20),
        cell(row.hourly_macd_line),
        cell(row.hourly_macd_signal),
        row.last_updated
    );
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string())
}

fn counts(state: &AppState) -> Result<()> {
    let counts = state.store.row_counts().context("Failed to read row counts")?;

    println!("{:<8} {:<4} {:>8}", "TICKER", "TF", "ROWS");
    for c in counts {
        println!("{:<8} {:<4} {:>8}", c.instrument, c.timeframe, c.count);
    }
    Ok(())
}
