//! Compositional dataflow engine with a derivative-free constrained driver.
//!
//! Components declare parameters and outputs, groups compose them with
//! promotion and explicit connections, [`Problem::setup`] flattens and
//! orders the tree, and [`Driver`] searches over bounded inputs.

pub mod config;
pub mod error;
mod evaluator;
pub mod expr;
mod graph;
pub mod model;
pub mod optimizer;
pub mod problem;
pub mod registry;
pub mod telemetry;

pub use config::DriverConfig;
pub use error::{ComputeError, DriverError, EvalError, ProblemError, SetupError, SetupErrors};
pub use evaluator::Evaluation;
pub use graph::Schedule;
pub use model::{
    Component, Connection, ExecComp, Group, IndepVarComp, Interface, Node, Outputs, Params,
    Promotion, Role, VarMeta,
};
pub use optimizer::{
    Constraint, DesignVariable, Driver, DriverResult, DriverStatus, History, IterationRecord,
    Objective, OptimizationStrategy, OptimizerKind, Sense,
};
pub use problem::{Problem, VariableView};
pub use registry::{CompId, Registry, SlotId, VarId};
