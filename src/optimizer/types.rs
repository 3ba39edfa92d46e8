use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OptimizerKind;
use crate::error::SetupError;

/// A variable the driver may move, with inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignVariable {
    pub path: String,
    pub low: f64,
    pub high: f64,
}

impl DesignVariable {
    pub fn new(path: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            path: path.into(),
            low,
            high,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        // also rejects NaN bounds
        if !(self.low <= self.high) {
            return Err(SetupError::InvalidBounds {
                path: self.path.clone(),
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

impl Sense {
    /// Multiplier that turns the objective into a minimization target.
    pub fn sign(self) -> f64 {
        match self {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub path: String,
    #[serde(default)]
    pub sense: Sense,
}

impl Objective {
    pub fn minimize(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sense: Sense::Minimize,
        }
    }

    pub fn maximize(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sense: Sense::Maximize,
        }
    }
}

/// One evaluated point of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub point: Vec<f64>,
    /// `None` when the evaluation failed
    pub objective: Option<f64>,
    /// Constraint values in declaration order; empty on failure
    pub constraints: Vec<f64>,
    /// Summed constraint violation; infinite on failure
    pub violation: f64,
    pub feasible: bool,
    pub error: Option<String>,
}

impl IterationRecord {
    pub fn failed(&self) -> bool {
        self.objective.is_none()
    }
}

/// Every evaluated point, plus the scoring used to rank them.
#[derive(Debug, Clone, Serialize)]
pub struct History {
    records: Vec<IterationRecord>,
    sense: Sense,
    penalty: f64,
}

impl History {
    pub fn new(sense: Sense, penalty: f64) -> Self {
        Self {
            records: Vec::new(),
            sense,
            penalty,
        }
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.records.push(record);
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact-penalty merit of a record; lower is better, failures rank last.
    pub fn merit(&self, record: &IterationRecord) -> f64 {
        match record.objective {
            Some(obj) if record.violation.is_finite() => {
                self.sense.sign() * obj + self.penalty * record.violation
            }
            _ => f64::INFINITY,
        }
    }

    /// Best feasible point by objective; otherwise the least violated one.
    pub fn best(&self) -> Option<&IterationRecord> {
        let sign = self.sense.sign();
        let feasible = self
            .records
            .iter()
            .filter(|r| r.feasible)
            .filter_map(|r| r.objective.map(|o| (r, sign * o)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r);

        feasible.or_else(|| {
            self.records
                .iter()
                .filter(|r| !r.failed())
                .min_by(|a, b| a.violation.total_cmp(&b.violation))
        })
    }
}

/// A derivative-free search step generator.
///
/// The driver evaluates every proposed point and appends it to the history
/// before asking for the next one, so a strategy only ever sees its own
/// proposals, in order.
pub trait OptimizationStrategy: Send {
    /// Next point to evaluate; the driver clips it to the bounds.
    fn propose(&mut self, history: &History, bounds: &[DesignVariable]) -> Vec<f64>;

    /// Current search scale in design-variable units; the run cannot
    /// converge while this exceeds the tolerance.
    fn radius(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DriverStatus {
    Converged,
    NotConverged,
}

/// Outcome of a completed optimization run.
///
/// The problem is left holding the values of the best point.
#[derive(Debug, Clone, Serialize)]
pub struct DriverResult {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub optimizer: OptimizerKind,
    pub status: DriverStatus,
    pub iterations: u32,
    pub desvars: BTreeMap<String, f64>,
    pub objective: Option<f64>,
    pub constraints: BTreeMap<String, f64>,
    pub violation: f64,
    pub feasible: bool,
    pub history: History,
}

impl DriverResult {
    pub fn converged(&self) -> bool {
        self.status == DriverStatus::Converged
    }

    pub fn desvar(&self, path: &str) -> Option<f64> {
        self.desvars.get(path).copied()
    }
}
