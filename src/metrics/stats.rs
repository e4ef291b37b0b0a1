use crate::engine::simulator::TradeResult;
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//per-indicator release outcomes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    //share of this indicator's trades that won / lost
    pub success_probability: f64,
    pub failure_probability: f64,
    //share of trades where the release moved the price at all (nonzero pnl)
    pub impact_probability: f64,
    pub avg_profit_or_loss: f64,
}

//aggregate statistics over a backtest's trade records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub flat_trades: usize,
    pub win_rate: f64,
    pub total_profit_or_loss: f64,
    pub avg_profit_or_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub no_movement_exits: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    //keyed by indicator, in first-seen order
    pub per_event: IndexMap<String, EventStats>,
}

impl StatsReport {
    //aggregates a trade record set
    pub fn from_trades(trades: &[TradeResult]) -> Self {
        let total_trades = trades.len();

        let winning_trades = trades.iter().filter(|t| t.profit_or_loss > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.profit_or_loss < 0.0).count();
        let flat_trades = total_trades - winning_trades - losing_trades;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let total_profit_or_loss: f64 = trades.iter().map(|t| t.profit_or_loss).sum();
        let avg_profit_or_loss = if total_trades > 0 {
            total_profit_or_loss / total_trades as f64
        } else {
            0.0
        };

        let largest_win = trades
            .iter()
            .map(|t| t.profit_or_loss)
            .fold(0.0f64, f64::max);
        let largest_loss = trades
            .iter()
            .map(|t| t.profit_or_loss)
            .fold(0.0f64, f64::min);

        let no_movement_exits = trades.iter().filter(|t| t.is_no_movement_exit()).count();

        //fractional per-trade returns on position notional
        let returns: Vec<f64> = trades.iter().map(trade_return).collect();
        let sharpe_ratio = calculate_sharpe_ratio(&returns);
        let sortino_ratio = calculate_sortino_ratio(&returns);

        let per_event = calculate_event_stats(trades);

        StatsReport {
            total_trades,
            winning_trades,
            losing_trades,
            flat_trades,
            win_rate,
            total_profit_or_loss,
            avg_profit_or_loss,
            largest_win,
            largest_loss,
            no_movement_exits,
            sharpe_ratio,
            sortino_ratio,
            per_event,
        }
    }

    //prints the report as formatted tables
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        table.add_row(Row::new(vec![
            Cell::new("Total Trades"),
            Cell::new(&format!("{}", self.total_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Winning Trades"),
            Cell::new(&format!("{}", self.winning_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Losing Trades"),
            Cell::new(&format!("{}", self.losing_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Win Rate"),
            Cell::new(&format!("{:.2}%", self.win_rate * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Total PnL"),
            Cell::new(&format!("${:.2}", self.total_profit_or_loss)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Avg PnL"),
            Cell::new(&format!("${:.2}", self.avg_profit_or_loss)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Largest Win"),
            Cell::new(&format!("${:.2}", self.largest_win)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Largest Loss"),
            Cell::new(&format!("${:.2}", self.largest_loss)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("No-Movement Exits"),
            Cell::new(&format!("{}", self.no_movement_exits)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&format!("{:.3}", self.sharpe_ratio)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sortino Ratio"),
            Cell::new(&format!("{:.3}", self.sortino_ratio)),
        ]));

        table.printstd();

        if self.per_event.is_empty() {
            return;
        }

        let mut by_event = Table::new();
        by_event.add_row(Row::new(vec![
            Cell::new("Event"),
            Cell::new("Trades"),
            Cell::new("Success"),
            Cell::new("Failure"),
            Cell::new("Impact"),
            Cell::new("Avg PnL"),
        ]));

        for (event, stats) in &self.per_event {
            by_event.add_row(Row::new(vec![
                Cell::new(event),
                Cell::new(&format!("{}", stats.trades)),
                Cell::new(&format!("{:.2}%", stats.success_probability * 100.0)),
                Cell::new(&format!("{:.2}%", stats.failure_probability * 100.0)),
                Cell::new(&format!("{:.2}%", stats.impact_probability * 100.0)),
                Cell::new(&format!("${:.2}", stats.avg_profit_or_loss)),
            ]));
        }

        by_event.printstd();
    }
}

//per-trade fractional return on the position's notional at entry
fn trade_return(trade: &TradeResult) -> f64 {
    let notional = trade.position_size_base * trade.entry_price;
    if notional == 0.0 {
        return 0.0;
    }
    trade.profit_or_loss / notional
}

fn calculate_event_stats(trades: &[TradeResult]) -> IndexMap<String, EventStats> {
    let mut grouped: IndexMap<String, Vec<&TradeResult>> = IndexMap::new();
    for trade in trades {
        grouped.entry(trade.event.clone()).or_default().push(trade);
    }

    grouped
        .into_iter()
        .map(|(event, trades)| {
            let count = trades.len();
            let wins = trades.iter().filter(|t| t.profit_or_loss > 0.0).count();
            let losses = trades.iter().filter(|t| t.profit_or_loss < 0.0).count();
            let total: f64 = trades.iter().map(|t| t.profit_or_loss).sum();

            let stats = EventStats {
                trades: count,
                wins,
                losses,
                success_probability: wins as f64 / count as f64,
                failure_probability: losses as f64 / count as f64,
                impact_probability: (wins + losses) as f64 / count as f64,
                avg_profit_or_loss: total / count as f64,
            };
            (event, stats)
        })
        .collect()
}

//event trades have no daily cadence, so the ratios are left unannualized
fn calculate_sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if std_dev == 0.0 || std_dev.is_nan() {
        return 0.0;
    }

    mean / std_dev
}

fn calculate_sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.mean();

    //downside deviation over negative returns only
    let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();

    if negative_returns.is_empty() {
        return if mean > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_dev = negative_returns.std_dev();

    if downside_dev == 0.0 || downside_dev.is_nan() {
        return 0.0;
    }

    mean / downside_dev
}
