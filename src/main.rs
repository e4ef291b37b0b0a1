use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pozole::prelude::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pozole")]
#[command(about = "A Rust-based macro-release event trading and backtesting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //replay historical releases against second-resolution price history
    Backtest {
        //path to the price history csv (timestamp,open,high,low,close,volume)
        #[arg(long)]
        prices: PathBuf,

        //path to the event dataset json
        #[arg(long)]
        events: PathBuf,

        //configuration json (built-in defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        //output path for the trade results json
        #[arg(long, default_value = "results.json")]
        output: PathBuf,

        //optional output path for a trades csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,
    },

    //aggregate a backtest result set into summary statistics
    Stats {
        //path to a trade results json produced by the backtest
        #[arg(long)]
        results: PathBuf,

        //optional output path for the statistics json
        #[arg(long)]
        output: Option<PathBuf>,
    },

    //write the built-in default configuration to a json file
    InitConfig {
        //output path for the configuration json
        #[arg(long, default_value = "pozole.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            prices,
            events,
            config,
            output,
            output_trades_csv,
        } => {
            run_backtest(prices, events, config, output, output_trades_csv)?;
        }
        Commands::Stats { results, output } => {
            run_stats(results, output)?;
        }
        Commands::InitConfig { output } => {
            Config::default()
                .to_json_file(&output)
                .context("Failed to write default configuration")?;
            println!("Default configuration written to {:?}", output);
        }
    }

    Ok(())
}

fn run_backtest(
    prices_path: PathBuf,
    events_path: PathBuf,
    config_path: Option<PathBuf>,
    output: PathBuf,
    output_trades_csv: Option<PathBuf>,
) -> Result<()> {
    println!("Pozole Macro Event Backtester");
    println!("=============================\n");

    let config = match config_path {
        Some(path) => Config::from_json_file(&path)
            .context(format!("Failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };

    println!("Loading events from {:?}...", events_path);
    let events = load_events(&events_path)
        .context(format!("Failed to load events from {:?}", events_path))?;

    if events.is_empty() {
        anyhow::bail!("Event dataset {:?} is empty", events_path);
    }

    println!("Loaded {} events", events.len());
    println!(
        "Date range: {} to {}\n",
        events.first().unwrap().release_time,
        events.last().unwrap().release_time
    );

    println!("Base amount: ${:.2}", config.trade.base_amount);
    println!("Max position size: ${:.2}", config.trade.max_position_size);
    println!("Max leverage: {}x\n", config.trade.max_leverage());

    println!("Running backtest...\n");
    let runner = BacktestRunner::new(config, &prices_path);
    let report = runner.run(&events).context("Backtest run failed")?;

    println!(
        "\n{} trades from {} events ({} skipped)",
        report.trades.len(),
        report.events_total,
        report.events_skipped
    );

    save_results_json(&report.trades, &output)?;
    println!("Results saved to {:?}", output);

    if let Some(trades_path) = output_trades_csv {
        save_trades_csv(&report.trades, &trades_path)?;
        println!("Trades saved to {:?}", trades_path);
    }

    Ok(())
}

fn run_stats(results_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    println!("Pozole Backtest Statistics");
    println!("==========================\n");

    let contents = std::fs::read_to_string(&results_path)
        .context(format!("Failed to read results from {:?}", results_path))?;
    let trades: Vec<TradeResult> = serde_json::from_str(&contents)
        .context(format!("Failed to parse results from {:?}", results_path))?;

    println!("Loaded {} trades\n", trades.len());

    let stats = StatsReport::from_trades(&trades);
    stats.pretty_print_table();

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(&path, json)
            .context(format!("Failed to write statistics to {:?}", path))?;
        println!("\nStatistics saved to {:?}", path);
    }

    Ok(())
}

fn save_results_json(trades: &[TradeResult], path: &PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(trades)?;
    std::fs::write(path, json).context(format!("Failed to write results to {:?}", path))?;
    Ok(())
}

fn save_trades_csv(trades: &[TradeResult], path: &PathBuf) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    writeln!(
        file,
        "event,entry_time,exit_time,action,entry_price,exit_price,profit_or_loss,position_size_base"
    )?;

    for trade in trades {
        writeln!(
            file,
            "{},{},{},{:?},{},{},{},{}",
            trade.event,
            trade.entry_time.to_rfc3339(),
            trade.exit_time.to_rfc3339(),
            trade.action,
            trade.entry_price,
            trade.exit_price,
            trade.profit_or_loss,
            trade.position_size_base
        )?;
    }

    Ok(())
}
