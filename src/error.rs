use std::fmt;

use thiserror::Error;

/// Structural errors raised while building or validating a model.
///
/// These are fatal and surface before any evaluation pass runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("variable '{name}' declared twice on component '{component}'")]
    DuplicateDeclaration { component: String, name: String },

    #[error("group already has a child named '{0}'")]
    DuplicateChildName(String),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("unknown variable '{path}' in scope '{scope}'")]
    UnknownVariable { scope: String, path: String },

    #[error("role mismatch on '{path}': expected {expected}")]
    RoleMismatch { path: String, expected: &'static str },

    #[error("'{target}' already has an incoming connection from '{existing}'")]
    DuplicateConnection { target: String, existing: String },

    #[error("promotion '{name}' in scope '{scope}' unifies more than one output: {outputs:?}")]
    AmbiguousPromotion {
        scope: String,
        name: String,
        outputs: Vec<String>,
    },

    #[error("dependency cycle through {}", .cycle.join(" -> "))]
    CyclicGraphError { cycle: Vec<String> },

    #[error("invalid bounds on '{path}': low {low} > high {high}")]
    InvalidBounds { path: String, low: f64, high: f64 },

    #[error("'{0}' is not an externally settable variable")]
    InvalidDesignVariable(String),

    #[error("invalid expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("no objective declared")]
    NoObjective,

    #[error("no design variables declared")]
    NoDesignVariables,
}

/// Every structural problem found by a single `setup` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupErrors(pub Vec<SetupError>);

impl SetupErrors {
    pub fn iter(&self) -> impl Iterator<Item = &SetupError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first cycle error, if resolution got that far.
    pub fn cycle(&self) -> Option<&[String]> {
        self.0.iter().find_map(|e| match e {
            SetupError::CyclicGraphError { cycle } => Some(cycle.as_slice()),
            _ => None,
        })
    }
}

impl fmt::Display for SetupErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} setup error(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "; {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for SetupErrors {}

impl From<SetupError> for SetupErrors {
    fn from(error: SetupError) -> Self {
        SetupErrors(vec![error])
    }
}

/// Failure raised by a component's `compute`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("domain error: {0}")]
    Domain(String),

    #[error("non-finite value for '{0}'")]
    NonFinite(String),

    #[error("unknown variable '{0}'")]
    Unknown(String),
}

/// Errors that abort a single evaluation pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("parameter '{0}' has no value")]
    UnresolvedParameter(String),

    #[error("component '{component}' did not set output '{output}'")]
    MissingOutput { component: String, output: String },

    #[error("component '{component}' failed: {source}")]
    Compute {
        component: String,
        #[source]
        source: ComputeError,
    },
}

/// Errors from direct registry access on a set-up problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProblemError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("'{0}' is driven by the model and cannot be set")]
    NotSettable(String),

    #[error("'{0}' has no value yet")]
    Unset(String),
}

/// Errors that stop an optimization run before it reports a result.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Setup(#[from] SetupErrors),

    #[error("aborted after {failures} consecutive failed evaluations: {last}")]
    Fatal { failures: u32, last: EvalError },

    #[error(transparent)]
    Eval(#[from] EvalError),
}
