use serde::Serialize;
use tracing::{debug, debug_span, info, info_span};

use crate::config::DriverConfig;
use crate::error::{DriverError, EvalError, ProblemError, SetupErrors};
use crate::evaluator::{self, Evaluation};
use crate::graph::{self, Model, Schedule};
use crate::model::{Group, Node, Role};
use crate::optimizer::{Constraint, DesignVariable, Driver, DriverResult, Objective};
use crate::registry::{Registry, SlotId};

/// Read-only view of one declared variable, for reporting layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableView {
    pub path: String,
    pub role: Role,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub description: String,
}

/// A set-up model: frozen tree, resolved handles and a valid schedule.
///
/// Values may be read or written only between passes; all mutation goes
/// through `&mut self`, so a pass can never overlap another.
pub struct Problem {
    model: Model,
    schedule: Schedule,
    passes: u64,
}

impl Problem {
    /// Validate promotions and connections, then resolve the execution order.
    ///
    /// Consumes the tree; it cannot change once set up.
    pub fn setup(root: Group) -> Result<Self, SetupErrors> {
        let _span = info_span!("setup").entered();

        let model = graph::flatten(Node::Group(root))?;
        let schedule = graph::resolve(&model)?;

        info!(
            components = schedule.components.len(),
            variables = model.registry.variables().count(),
            slots = model.registry.slot_count(),
            "model set up"
        );
        Ok(Self {
            model,
            schedule,
            passes: 0,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.model.registry
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Component paths in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.schedule
            .components
            .iter()
            .map(|c| self.model.components[c.0].path.as_str())
            .collect()
    }

    /// Logical variables in dependency order, by display name.
    pub fn variable_order(&self) -> Vec<&str> {
        self.schedule
            .variables
            .iter()
            .map(|s| self.model.registry.label(*s))
            .collect()
    }

    /// Resolve a path once into a stable handle.
    pub fn handle(&self, path: &str) -> Result<SlotId, ProblemError> {
        self.model
            .registry
            .lookup(path)
            .ok_or_else(|| ProblemError::UnknownVariable(path.to_string()))
    }

    pub fn get(&self, path: &str) -> Result<f64, ProblemError> {
        let slot = self.handle(path)?;
        self.model
            .registry
            .value(slot)
            .ok_or_else(|| ProblemError::Unset(path.to_string()))
    }

    /// Set an externally settable variable: an unconnected parameter or an
    /// independent output. Aliases and connected parameters follow.
    pub fn set(&mut self, path: &str, value: f64) -> Result<(), ProblemError> {
        let slot = self.handle(path)?;
        if !self.model.registry.slot(slot).is_settable() {
            return Err(ProblemError::NotSettable(path.to_string()));
        }
        self.model.registry.write(slot, value);
        Ok(())
    }

    pub fn value(&self, slot: SlotId) -> Option<f64> {
        self.model.registry.value(slot)
    }

    pub(crate) fn assign(&mut self, slot: SlotId, value: f64) {
        self.model.registry.write(slot, value);
    }

    /// One full evaluation pass with the current values.
    pub fn run_once(&mut self) -> Result<Evaluation, EvalError> {
        self.passes += 1;
        let _span = debug_span!("run_once", pass = self.passes).entered();

        let components = evaluator::run_pass(&mut self.model, &self.schedule)?;
        debug!(components, "pass complete");
        Ok(Evaluation {
            pass: self.passes,
            components,
        })
    }

    /// Drive the model with a derivative-free search.
    pub fn run_optimization(
        &mut self,
        desvars: &[DesignVariable],
        constraints: &[Constraint],
        objective: &Objective,
        config: &DriverConfig,
    ) -> Result<DriverResult, DriverError> {
        let mut driver = Driver::new(config.clone());
        for d in desvars {
            driver.add_desvar(&d.path, d.low, d.high);
        }
        for c in constraints {
            driver.add_constraint(c.clone());
        }
        driver.add_objective(objective.clone());
        driver.run(self)
    }

    /// Every declared variable with its current value.
    pub fn variables(&self) -> Vec<VariableView> {
        let registry = &self.model.registry;
        registry
            .variables()
            .map(|v| VariableView {
                path: v.path.clone(),
                role: v.meta.role,
                unit: v.meta.unit.clone(),
                value: registry.value(v.slot),
                description: v.meta.description.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ComputeError, SetupError};
    use crate::model::{Component, ExecComp, IndepVarComp, Interface, Outputs, Params};

    struct Scale {
        factor: f64,
    }

    impl Component for Scale {
        fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
            io.declare("x", 1.0, Some("m"), "input")?;
            io.declare_output("y", 0.0, Some("m"), "scaled input")
        }

        fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
            outputs.set("y", self.factor * params.get("x")?)
        }
    }

    struct Needs;

    impl Component for Needs {
        fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
            io.declare_required("area", None, "")?;
            io.declare_output("half", 0.0, None, "")
        }

        fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
            outputs.set_at(0, params[0] / 2.0)
        }
    }

    struct Forgetful;

    impl Component for Forgetful {
        fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
            io.declare_output("a", 0.0, None, "")?;
            io.declare_output("b", 0.0, None, "")
        }

        fn compute(&self, _params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
            outputs.set("a", 1.0)
        }
    }

    #[test]
    fn test_chain_evaluates_in_dependency_order() {
        let mut root = Group::new();
        // declared downstream-first on purpose
        root.add("second", Scale { factor: 3.0 }, &[]).unwrap();
        root.add("first", Scale { factor: 2.0 }, &[]).unwrap();
        root.connect("first.y", "second.x");

        let mut p = Problem::setup(root).unwrap();
        assert_eq!(p.execution_order(), vec!["first", "second"]);

        p.set("first.x", 5.0).unwrap();
        let eval = p.run_once().unwrap();
        assert_eq!(eval.components, 2);
        assert_eq!(p.get("first.y").unwrap(), 10.0);
        assert_eq!(p.get("second.x").unwrap(), 10.0);
        assert_eq!(p.get("second.y").unwrap(), 30.0);
    }

    #[test]
    fn test_connected_parameter_is_not_settable() {
        let mut root = Group::new();
        root.add("a", Scale { factor: 1.0 }, &[]).unwrap();
        root.add("b", Scale { factor: 1.0 }, &[]).unwrap();
        root.connect("a.y", "b.x");
        let mut p = Problem::setup(root).unwrap();

        assert_eq!(
            p.set("b.x", 1.0),
            Err(ProblemError::NotSettable("b.x".to_string()))
        );
        assert_eq!(
            p.set("a.y", 1.0),
            Err(ProblemError::NotSettable("a.y".to_string()))
        );
        assert_eq!(
            p.get("nope"),
            Err(ProblemError::UnknownVariable("nope".to_string()))
        );
    }

    #[test]
    fn test_required_parameter_unresolved_until_set() {
        let mut root = Group::new();
        root.add("n", Needs, &[]).unwrap();
        let mut p = Problem::setup(root).unwrap();

        assert_eq!(
            p.run_once().unwrap_err(),
            EvalError::UnresolvedParameter("n.area".to_string())
        );
        assert_eq!(p.get("n.area"), Err(ProblemError::Unset("n.area".to_string())));

        p.set("n.area", 3.0).unwrap();
        p.run_once().unwrap();
        assert_eq!(p.get("n.half").unwrap(), 1.5);
    }

    #[test]
    fn test_missing_output_aborts_pass() {
        let mut root = Group::new();
        root.add("f", Forgetful, &[]).unwrap();
        let mut p = Problem::setup(root).unwrap();
        assert_eq!(
            p.run_once().unwrap_err(),
            EvalError::MissingOutput {
                component: "f".to_string(),
                output: "b".to_string()
            }
        );
    }

    #[test]
    fn test_compute_error_propagates_from_run_once() {
        let mut root = Group::new();
        root.add("ratio", ExecComp::new("r = a / b").unwrap(), &["*"])
            .unwrap();
        let mut p = Problem::setup(root).unwrap();
        p.set("a", 1.0).unwrap();

        let err = p.run_once().unwrap_err();
        assert!(matches!(err, EvalError::Compute { ref component, .. } if component == "ratio"));

        p.set("b", 4.0).unwrap();
        p.run_once().unwrap();
        assert_eq!(p.get("r").unwrap(), 0.25);
    }

    #[test]
    fn test_independent_output_feeds_connection() {
        let mut root = Group::new();
        root.add("des", IndepVarComp::new("x", 2.0), &[]).unwrap();
        root.add("s", Scale { factor: 4.0 }, &[]).unwrap();
        root.connect("des.x", "s.x");
        let mut p = Problem::setup(root).unwrap();

        p.run_once().unwrap();
        assert_eq!(p.get("s.y").unwrap(), 8.0);

        p.set("des.x", 0.5).unwrap();
        p.run_once().unwrap();
        assert_eq!(p.get("s.y").unwrap(), 2.0);
    }

    #[test]
    fn test_variables_view_lists_every_declaration() {
        let mut root = Group::new();
        root.add("s", Scale { factor: 1.0 }, &[]).unwrap();
        let p = Problem::setup(root).unwrap();
        let views = p.variables();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].path, "s.x");
        assert_eq!(views[0].unit.as_deref(), Some("m"));
        assert_eq!(views[1].role, Role::Output);
    }
}
