//! Sweep objective: configurable metric selector for ranking parameter sets.

use serde::{Deserialize, Serialize};

use crate::metrics::RiskReport;

/// Which metric the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    FinalEquity,
    TotalReturn,
    AnnualizedReturn,
    Sharpe,
    Sortino,
    Calmar,
    MaxDrawdown,
}

impl Objective {
    /// Extract the relevant metric value from a report.
    pub fn extract(&self, report: &RiskReport) -> f64 {
        match self {
            Self::FinalEquity => report.final_equity,
            Self::TotalReturn => report.total_return,
            Self::AnnualizedReturn => report.annualized_return,
            Self::Sharpe => report.sharpe,
            Self::Sortino => report.sortino,
            Self::Calmar => report.calmar,
            Self::MaxDrawdown => report.max_drawdown,
        }
    }

    /// Returns true if `a` strictly beats `b`.
    ///
    /// Every objective is maximized; drawdown is signed, so -0.05 beats
    /// -0.20. NaN never beats anything and anything beats a NaN incumbent.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if a.is_nan() {
            return false;
        }
        b.is_nan() || a > b
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinalEquity => "final_equity",
            Self::TotalReturn => "total_return",
            Self::AnnualizedReturn => "annualized_return",
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::Calmar => "calmar",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}
