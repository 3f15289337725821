//! Grid search over engine and strategy parameters.
//!
//! Every combination runs on its own fresh engine against the same read-only
//! series, so runs are independent and can execute in parallel. Results are
//! always reported in enumeration order, whatever order they finished in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use leverlab_core::{EngineError, EngineStatus, PriceSeries, RunResult};

use crate::fitness::Objective;
use crate::metrics::{RiskAnalyzer, RiskReport};
use crate::runner::{BacktestSpec, RunId};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unknown parameter '{name}' for strategy '{strategy}'")]
    UnknownParameter { name: String, strategy: String },
    #[error("parameter grid is empty")]
    EmptyGrid,
    #[error("parameter '{0}' has no candidate values")]
    NoCandidates(String),
    #[error("window must be a whole number, got {0}")]
    NonIntegerWindow(f64),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Candidate values per parameter name.
///
/// Names iterate in lexicographic order; the first name varies slowest and
/// each name's candidates are tried in the order given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<f64>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of combinations (0 for an empty grid).
    pub fn size(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.values().map(Vec::len).product()
        }
    }

    /// Cartesian product of all candidates, in enumeration order.
    pub fn combinations(&self) -> Result<Vec<BTreeMap<String, f64>>, SweepError> {
        if self.0.is_empty() {
            return Err(SweepError::EmptyGrid);
        }
        if let Some((name, _)) = self.0.iter().find(|(_, values)| values.is_empty()) {
            return Err(SweepError::NoCandidates(name.clone()));
        }

        let mut combos = vec![BTreeMap::new()];
        for (name, values) in &self.0 {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |&v| {
                        let mut next = combo.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }
}

impl From<BTreeMap<String, Vec<f64>>> for ParamGrid {
    fn from(map: BTreeMap<String, Vec<f64>>) -> Self {
        Self(map)
    }
}

/// One evaluated combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    /// Position in enumeration order.
    pub index: usize,
    pub run_id: RunId,
    pub params: BTreeMap<String, f64>,
    pub status: EngineStatus,
    pub score: f64,
    pub report: RiskReport,
}

/// All evaluated rows plus the winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub symbol: String,
    pub objective: Objective,
    pub rows: Vec<SweepRow>,
    /// Index into `rows` of the best combination.
    pub best: Option<usize>,
    /// Trade log and equity curve of the best combination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_run: Option<RunResult>,
    pub combinations: usize,
    /// True if the cancel flag stopped the sweep before every combination ran.
    pub cancelled: bool,
}

impl SweepOutcome {
    pub fn best(&self) -> Option<&SweepRow> {
        self.best.and_then(|i| self.rows.get(i))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted by score, best first. NaN scores sort last; ties keep
    /// enumeration order.
    pub fn top_n(&self, n: usize) -> Vec<&SweepRow> {
        let mut sorted: Vec<&SweepRow> = self.rows.iter().collect();
        sorted.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => b.score.total_cmp(&a.score),
        });
        sorted.truncate(n);
        sorted
    }
}

/// Exhaustive grid optimizer.
#[derive(Debug, Clone)]
pub struct Optimizer {
    objective: Objective,
    analyzer: RiskAnalyzer,
    parallel: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl Optimizer {
    pub fn new(objective: Objective, analyzer: RiskAnalyzer) -> Self {
        Self {
            objective,
            analyzer,
            parallel: true,
            cancel: None,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Raise the flag to skip combinations that have not started yet and
    /// stop running ones at the next bar.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Evaluate every combination of `grid` applied onto `template`.
    ///
    /// All combinations are built and validated before the first run, so a
    /// bad name or value fails the sweep without running anything.
    pub fn run(
        &self,
        template: &BacktestSpec,
        grid: &ParamGrid,
        series: &PriceSeries,
    ) -> Result<SweepOutcome, SweepError> {
        let combos = grid.combinations()?;
        let specs = combos
            .into_iter()
            .map(|params| {
                let spec = template.with_params(&params)?;
                spec.validate()?;
                Ok((params, spec))
            })
            .collect::<Result<Vec<_>, SweepError>>()?;

        info!(
            combinations = specs.len(),
            objective = self.objective.as_str(),
            parallel = self.parallel,
            "starting sweep"
        );

        let evaluated: Vec<Option<SweepRow>> = if self.parallel {
            specs
                .par_iter()
                .enumerate()
                .map(|(i, (params, spec))| self.evaluate(i, params, spec, series))
                .collect::<Result<_, _>>()?
        } else {
            specs
                .iter()
                .enumerate()
                .map(|(i, (params, spec))| self.evaluate(i, params, spec, series))
                .collect::<Result<_, _>>()?
        };

        let rows: Vec<SweepRow> = evaluated.into_iter().flatten().collect();
        let best = self.pick_best(&rows);
        let best_run = match best {
            Some(i) => self.replay(&specs[rows[i].index].1, series)?,
            None => None,
        };
        let outcome = SweepOutcome {
            symbol: series.symbol().to_string(),
            objective: self.objective,
            cancelled: rows.len() < specs.len(),
            combinations: specs.len(),
            rows,
            best,
            best_run,
        };

        if let Some(row) = outcome.best() {
            info!(
                evaluated = outcome.len(),
                symbol = %outcome.symbol,
                best_index = row.index,
                best_score = row.score,
                "sweep finished"
            );
        } else {
            info!(evaluated = outcome.len(), "sweep finished without a winner");
        }
        Ok(outcome)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// `None` when the combination was skipped or cut short by cancellation.
    fn evaluate(
        &self,
        index: usize,
        params: &BTreeMap<String, f64>,
        spec: &BacktestSpec,
        series: &PriceSeries,
    ) -> Result<Option<SweepRow>, SweepError> {
        if self.is_cancelled() {
            return Ok(None);
        }
        let result = spec.run(series, self.cancel.as_deref())?;
        if result.status == EngineStatus::Cancelled {
            return Ok(None);
        }
        let report = self.analyzer.analyze(&result, series);
        let score = self.objective.extract(&report);
        debug!(index, ?params, score, status = %result.status, "combination evaluated");
        Ok(Some(SweepRow {
            index,
            run_id: spec.run_id(),
            params: params.clone(),
            status: result.status,
            score,
            report,
        }))
    }

    /// Re-run the winning spec for its trade log and equity curve. `None`
    /// once the cancel flag is up.
    fn replay(
        &self,
        spec: &BacktestSpec,
        series: &PriceSeries,
    ) -> Result<Option<RunResult>, SweepError> {
        if self.is_cancelled() {
            return Ok(None);
        }
        let result = spec.run(series, self.cancel.as_deref())?;
        Ok((result.status != EngineStatus::Cancelled).then_some(result))
    }

    /// First strictly greatest score; NaN never wins.
    fn pick_best(&self, rows: &[SweepRow]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, row) in rows.iter().enumerate() {
            if row.score.is_nan() {
                continue;
            }
            match best {
                Some(b) if !self.objective.is_better(row.score, rows[b].score) => {}
                _ => best = Some(i),
            }
        }
        best
    }
}
