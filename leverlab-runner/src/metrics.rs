//! Risk metrics: pure functions over an equity curve, plus the analyzer that
//! bundles them into a report.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Returns are per bar; `periods_per_year` must match the bar interval of the
//! curve (8760 for hourly bars, 365 for daily crypto bars).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use leverlab_core::{EngineError, PriceSeries, RunResult, Trade};

/// Runs of consecutive falling bars counted as crash events.
///
/// A bar "falls" when its close is at least `drop_pct` below the previous
/// close. Every `min_bars` falling bars in a row count as one event and the
/// run counter restarts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashStreakRule {
    pub min_bars: usize,
    pub drop_pct: f64,
}

impl Default for CrashStreakRule {
    fn default() -> Self {
        Self {
            min_bars: 10,
            drop_pct: 0.01,
        }
    }
}

/// Summary statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Signed, <= 0 (e.g. -0.15 = 15% drawdown).
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub total_fees: f64,
    pub liquidation_count: usize,
    pub crash_streaks: usize,
    /// Crash events per bar.
    pub crash_streak_rate: f64,
}

impl RiskReport {
    /// Flat `name -> value` table, sorted by name.
    pub fn to_table(&self) -> BTreeMap<String, f64> {
        [
            ("total_return", self.total_return),
            ("annualized_return", self.annualized_return),
            ("volatility", self.volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("final_equity", self.final_equity),
            ("trade_count", self.trade_count as f64),
            ("win_rate", self.win_rate),
            ("total_fees", self.total_fees),
            ("liquidation_count", self.liquidation_count as f64),
            ("crash_streaks", self.crash_streaks as f64),
            ("crash_streak_rate", self.crash_streak_rate),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Turns equity curves into `RiskReport`s at a fixed annualization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalyzer {
    periods_per_year: f64,
    #[serde(default)]
    crash_rule: CrashStreakRule,
}

impl RiskAnalyzer {
    pub fn new(periods_per_year: f64) -> Result<Self, EngineError> {
        if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
            return Err(EngineError::invalid(
                "periods_per_year",
                format!("must be > 0, got {periods_per_year}"),
            ));
        }
        Ok(Self {
            periods_per_year,
            crash_rule: CrashStreakRule::default(),
        })
    }

    pub fn with_crash_rule(mut self, rule: CrashStreakRule) -> Self {
        self.crash_rule = rule;
        self
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Curve-only metrics. Trade, fee and crash fields stay 0.
    pub fn analyze_curve(&self, equity: &[f64]) -> RiskReport {
        let final_equity = equity.last().copied().unwrap_or(0.0);
        if equity.len() < 2 {
            return RiskReport {
                final_equity,
                ..RiskReport::default()
            };
        }
        let ppy = self.periods_per_year;
        RiskReport {
            total_return: total_return(equity),
            annualized_return: annualized_return(equity, ppy),
            volatility: volatility(equity, ppy),
            sharpe: sharpe_ratio(equity, ppy),
            sortino: sortino_ratio(equity, ppy),
            calmar: calmar_ratio(equity, ppy),
            max_drawdown: max_drawdown(equity),
            final_equity,
            ..RiskReport::default()
        }
    }

    /// Full report for an engine run over `series`.
    pub fn analyze(&self, result: &RunResult, series: &PriceSeries) -> RiskReport {
        let equity = result.equity_values();
        let closes = series.closes();
        let crash_streaks = crash_streaks(&closes, self.crash_rule);
        RiskReport {
            final_equity: result.final_equity,
            trade_count: result.trades.len(),
            win_rate: win_rate(&result.trades),
            total_fees: result.total_fees(),
            liquidation_count: result.liquidations.len(),
            crash_streaks,
            crash_streak_rate: if closes.is_empty() {
                0.0
            } else {
                crash_streaks as f64 / closes.len() as f64
            },
            ..self.analyze_curve(&equity)
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: final / initial - 1.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    final_eq / initial - 1.0
}

/// Compounded return scaled to one year: `(1 + tr)^(ppy / n_returns) - 1`.
///
/// A wiped-out account (`1 + tr <= 0`) annualizes to -1.
pub fn annualized_return(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let growth = 1.0 + total_return(equity_curve);
    if growth <= 0.0 {
        return -1.0;
    }
    let n_returns = (equity_curve.len() - 1) as f64;
    growth.powf(periods_per_year / n_returns) - 1.0
}

/// Annualized standard deviation of per-bar returns.
pub fn volatility(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    std_dev(&period_returns(equity_curve)) * periods_per_year.sqrt()
}

/// Annualized Sharpe ratio (zero risk-free rate).
///
/// Sharpe = mean(returns) / std(returns) * sqrt(ppy).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio.
///
/// Sortino = mean(returns) / std(negative returns) * sqrt(ppy).
/// Returns 0.0 when fewer than two returns are negative or they don't vary.
pub fn sortino_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_std = std_dev(&downside);
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * periods_per_year.sqrt()
}

/// Calmar ratio: annualized return / |max_drawdown|.
///
/// Returns 0.0 if there is no drawdown or the annualized return is non-positive.
pub fn calmar_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let ann = annualized_return(equity_curve, periods_per_year);
    let dd = max_drawdown(equity_curve);
    if dd >= 0.0 || ann <= 0.0 {
        return 0.0;
    }
    ann / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = eq / peak - 1.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of closing trades (sells) with positive realized PnL.
pub fn win_rate(trades: &[Trade]) -> f64 {
    let closes: Vec<&Trade> = trades.iter().filter(|t| t.is_close()).collect();
    if closes.is_empty() {
        return 0.0;
    }
    let winners = closes.iter().filter(|t| t.realized_pnl > 0.0).count();
    winners as f64 / closes.len() as f64
}

/// Number of crash events in a close series under `rule`.
pub fn crash_streaks(closes: &[f64], rule: CrashStreakRule) -> usize {
    if rule.min_bars == 0 {
        return 0;
    }
    let mut events = 0;
    let mut run = 0;
    for w in closes.windows(2) {
        let change = (w[1] - w[0]) / w[0];
        if change <= -rule.drop_pct {
            run += 1;
        } else {
            run = 0;
        }
        if run >= rule.min_bars {
            events += 1;
            run = 0;
        }
    }
    events
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple per-bar returns from an equity curve.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
