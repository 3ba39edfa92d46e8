use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::{
    Constraint, DesignVariable, DriverResult, DriverStatus, History, IterationRecord, Objective,
};
use crate::config::DriverConfig;
use crate::error::{DriverError, EvalError, SetupError, SetupErrors};
use crate::problem::Problem;
use crate::registry::SlotId;

/// Handles resolved once before the loop starts.
struct Bound {
    desvars: Vec<(DesignVariable, SlotId)>,
    constraints: Vec<(Constraint, SlotId)>,
    objective: (Objective, SlotId),
}

/// Values read back after one pass.
struct Reading {
    objective: f64,
    constraints: Vec<f64>,
}

/// Iterative derivative-free search over a set-up [`Problem`].
///
/// Not re-entrant: `run` borrows the problem mutably for the whole loop.
pub struct Driver {
    config: DriverConfig,
    desvars: Vec<DesignVariable>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            desvars: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    pub fn add_desvar(&mut self, path: &str, low: f64, high: f64) -> &mut Self {
        self.desvars.push(DesignVariable::new(path, low, high));
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    /// Replaces any previously declared objective.
    pub fn add_objective(&mut self, objective: Objective) -> &mut Self {
        self.objective = Some(objective);
        self
    }

    fn bind(&self, problem: &Problem) -> Result<Bound, SetupErrors> {
        let mut errors = Vec::new();
        let resolve = |path: &str, errors: &mut Vec<SetupError>| {
            let slot = problem.registry().lookup(path);
            if slot.is_none() {
                errors.push(SetupError::UnknownVariable {
                    scope: "<root>".to_string(),
                    path: path.to_string(),
                });
            }
            slot
        };

        if self.desvars.is_empty() {
            errors.push(SetupError::NoDesignVariables);
        }
        let mut desvars = Vec::new();
        for d in &self.desvars {
            if let Err(e) = d.validate() {
                errors.push(e);
                continue;
            }
            if let Some(slot) = resolve(&d.path, &mut errors) {
                if problem.registry().slot(slot).is_settable() {
                    desvars.push((d.clone(), slot));
                } else {
                    errors.push(SetupError::InvalidDesignVariable(d.path.clone()));
                }
            }
        }

        let mut constraints = Vec::new();
        for c in &self.constraints {
            if let Err(e) = c.validate() {
                errors.push(e);
                continue;
            }
            if let Some(slot) = resolve(&c.path, &mut errors) {
                constraints.push((c.clone(), slot));
            }
        }

        let objective = match &self.objective {
            None => {
                errors.push(SetupError::NoObjective);
                None
            }
            Some(o) => resolve(&o.path, &mut errors).map(|slot| (o.clone(), slot)),
        };

        match objective {
            Some(objective) if errors.is_empty() => Ok(Bound {
                desvars,
                constraints,
                objective,
            }),
            _ => Err(SetupErrors(errors)),
        }
    }

    fn evaluate(
        problem: &mut Problem,
        bound: &Bound,
        point: &[f64],
    ) -> Result<Reading, EvalError> {
        for ((_, slot), value) in bound.desvars.iter().zip(point) {
            problem.assign(*slot, *value);
        }
        problem.run_once()?;

        let read = |path: &str, slot: SlotId| {
            problem
                .value(slot)
                .ok_or_else(|| EvalError::UnresolvedParameter(path.to_string()))
        };
        let constraints = bound
            .constraints
            .iter()
            .map(|(c, slot)| read(&c.path, *slot))
            .collect::<Result<Vec<_>, _>>()?;
        let objective = read(&bound.objective.0.path, bound.objective.1)?;
        Ok(Reading {
            objective,
            constraints,
        })
    }

    /// Run the search until convergence or the iteration cap.
    ///
    /// Compute failures at a point are recorded and the search continues;
    /// only a run longer than `max_consecutive_failures` is fatal. On return
    /// the problem holds the values of the reported point, unless no point
    /// evaluated at all.
    pub fn run(&mut self, problem: &mut Problem) -> Result<DriverResult, DriverError> {
        let bound = self.bind(problem)?;
        let config = &self.config;
        let started_at = Utc::now();
        let id = Uuid::new_v4();
        let _span = info_span!("optimize", %id, optimizer = %config.optimizer).entered();

        let bounds: Vec<DesignVariable> = bound.desvars.iter().map(|(d, _)| d.clone()).collect();
        let mut strategy = config.optimizer.build(config);
        let mut history = History::new(bound.objective.0.sense, config.penalty);

        info!(
            desvars = bounds.len(),
            constraints = bound.constraints.len(),
            max_iterations = config.max_iterations,
            "optimization started"
        );

        let mut point: Vec<f64> = bounds
            .iter()
            .zip(&bound.desvars)
            .map(|(d, (_, slot))| match problem.value(*slot) {
                Some(v) if v.is_finite() => d.clip(v),
                _ => d.low + 0.5 * d.range(),
            })
            .collect();

        let mut status = DriverStatus::NotConverged;
        let mut previous_feasible: Option<f64> = None;
        let mut failures = 0u32;

        for iteration in 0..config.max_iterations {
            let record = match Self::evaluate(problem, &bound, &point) {
                Ok(reading) => {
                    failures = 0;
                    let violations: Vec<f64> = bound
                        .constraints
                        .iter()
                        .zip(&reading.constraints)
                        .map(|((c, _), v)| c.violation(*v))
                        .collect();
                    let feasible = reading.objective.is_finite()
                        && violations.iter().all(|v| *v <= config.tolerance);
                    IterationRecord {
                        iteration,
                        point: point.clone(),
                        objective: Some(reading.objective),
                        constraints: reading.constraints,
                        violation: violations.iter().sum(),
                        feasible,
                        error: None,
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(iteration, error = %e, "evaluation failed; point marked infeasible");
                    if failures > config.max_consecutive_failures {
                        return Err(DriverError::Fatal { failures, last: e });
                    }
                    IterationRecord {
                        iteration,
                        point: point.clone(),
                        objective: None,
                        constraints: Vec::new(),
                        violation: f64::INFINITY,
                        feasible: false,
                        error: Some(e.to_string()),
                    }
                }
            };

            debug!(
                iteration,
                point = ?record.point,
                objective = ?record.objective,
                violation = record.violation,
                feasible = record.feasible,
                "evaluated"
            );

            let mut converged = false;
            if let (true, Some(obj)) = (record.feasible, record.objective) {
                if let Some(prev) = previous_feasible {
                    converged = (obj - prev).abs() <= config.tolerance
                        && strategy.radius() <= config.tolerance;
                }
                previous_feasible = Some(obj);
            }
            history.push(record);

            if converged {
                status = DriverStatus::Converged;
                break;
            }
            if iteration + 1 == config.max_iterations {
                break;
            }

            point = strategy
                .propose(&history, &bounds)
                .iter()
                .zip(&bounds)
                .map(|(v, d)| d.clip(*v))
                .collect();
        }

        let Some(best_point) = history.best().map(|r| r.point.clone()) else {
            // Every point failed; nothing to re-apply.
            let last_point = history.last().map(|r| r.point.clone()).unwrap_or(point);
            warn!(iterations = history.len(), "no point evaluated successfully");
            return Ok(DriverResult {
                id,
                started_at,
                optimizer: config.optimizer,
                status,
                iterations: history.len() as u32,
                desvars: bounds
                    .iter()
                    .zip(&last_point)
                    .map(|(d, v)| (d.path.clone(), *v))
                    .collect(),
                objective: None,
                constraints: BTreeMap::new(),
                violation: f64::INFINITY,
                feasible: false,
                history,
            });
        };
        let reading = Self::evaluate(problem, &bound, &best_point)?;

        let violations: Vec<f64> = bound
            .constraints
            .iter()
            .zip(&reading.constraints)
            .map(|((c, _), v)| c.violation(*v))
            .collect();
        let feasible = violations.iter().all(|v| *v <= config.tolerance);

        let result = DriverResult {
            id,
            started_at,
            optimizer: config.optimizer,
            status,
            iterations: history.len() as u32,
            desvars: bounds
                .iter()
                .zip(&best_point)
                .map(|(d, v)| (d.path.clone(), *v))
                .collect::<BTreeMap<_, _>>(),
            objective: Some(reading.objective),
            constraints: bound
                .constraints
                .iter()
                .zip(&reading.constraints)
                .map(|((c, _), v)| (c.path.clone(), *v))
                .collect(),
            violation: violations.iter().sum(),
            feasible,
            history,
        };

        info!(
            status = %result.status,
            iterations = result.iterations,
            objective = ?result.objective,
            violation = result.violation,
            "optimization finished"
        );
        Ok(result)
    }
}
