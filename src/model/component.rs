use crate::error::{ComputeError, SetupError};
use crate::expr::{self, Assignment};

use super::variable::{Interface, VarMeta};

/// A leaf computational unit.
///
/// `declare` is called once during setup; `compute` is called once per
/// evaluation pass with the resolved parameter values. `compute` must be
/// deterministic and must set every declared (non-independent) output.
pub trait Component: Send + Sync {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError>;

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError>;
}

/// Resolved parameter values handed to [`Component::compute`].
pub struct Params<'a> {
    meta: &'a [VarMeta],
    values: &'a [f64],
}

impl<'a> Params<'a> {
    pub fn new(meta: &'a [VarMeta], values: &'a [f64]) -> Self {
        Self { meta, values }
    }

    pub fn get(&self, name: &str) -> Result<f64, ComputeError> {
        self.meta
            .iter()
            .position(|m| m.name == name)
            .map(|i| self.values[i])
            .ok_or_else(|| ComputeError::Unknown(name.to_string()))
    }

    /// Values in declaration order.
    pub fn values(&self) -> &[f64] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::ops::Index<usize> for Params<'_> {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

/// Output buffer written by [`Component::compute`].
pub struct Outputs<'a> {
    meta: &'a [VarMeta],
    values: &'a mut [Option<f64>],
}

impl<'a> Outputs<'a> {
    pub fn new(meta: &'a [VarMeta], values: &'a mut [Option<f64>]) -> Self {
        Self { meta, values }
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ComputeError> {
        let index = self
            .meta
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| ComputeError::Unknown(name.to_string()))?;
        self.set_at(index, value)
    }

    pub fn set_at(&mut self, index: usize, value: f64) -> Result<(), ComputeError> {
        let (Some(meta), Some(slot)) = (self.meta.get(index), self.values.get_mut(index)) else {
            return Err(ComputeError::Unknown(format!("output #{}", index)));
        };
        if !value.is_finite() {
            return Err(ComputeError::NonFinite(meta.name.clone()));
        }
        *slot = Some(value);
        Ok(())
    }

    /// Current value; independent outputs arrive pre-filled.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.meta
            .iter()
            .position(|m| m.name == name)
            .and_then(|i| self.values[i])
    }
}

/// Holds externally set values that feed the rest of the model.
///
/// The usual home of design variables: each value is an independent output
/// that other components connect to or share through promotion.
#[derive(Debug, Clone)]
pub struct IndepVarComp {
    values: Vec<(String, f64, Option<String>)>,
}

impl IndepVarComp {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            values: vec![(name.into(), value, None)],
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.push((name.into(), value, None));
        self
    }

    pub fn with_unit(mut self, name: impl Into<String>, value: f64, unit: &str) -> Self {
        self.values.push((name.into(), value, Some(unit.to_string())));
        self
    }
}

impl Component for IndepVarComp {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        for (name, value, unit) in &self.values {
            io.declare_independent(name, *value, unit.as_deref(), "")?;
        }
        Ok(())
    }

    fn compute(&self, _params: &Params<'_>, _outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        Ok(())
    }
}

/// Component defined by a single arithmetic assignment, e.g.
/// `c = ((area * 0.00065) - bypass_area) / bypass_area`.
///
/// Every free identifier on the right-hand side becomes a parameter.
#[derive(Debug, Clone)]
pub struct ExecComp {
    source: String,
    assignment: Assignment,
    defaults: Vec<f64>,
    units: Vec<Option<String>>,
    output_unit: Option<String>,
}

impl ExecComp {
    pub fn new(source: &str) -> Result<Self, SetupError> {
        let assignment =
            expr::parse_assignment(source).map_err(|e| SetupError::InvalidExpression {
                expr: source.to_string(),
                reason: e.to_string(),
            })?;
        let n = assignment.inputs.len();
        Ok(Self {
            source: source.to_string(),
            assignment,
            defaults: vec![0.0; n],
            units: vec![None; n],
            output_unit: None,
        })
    }

    fn input_index(&self, name: &str) -> Result<usize, SetupError> {
        self.assignment
            .inputs
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| SetupError::InvalidExpression {
                expr: self.source.clone(),
                reason: format!("'{}' is not an input", name),
            })
    }

    pub fn with_default(mut self, name: &str, value: f64) -> Result<Self, SetupError> {
        let i = self.input_index(name)?;
        self.defaults[i] = value;
        Ok(self)
    }

    /// Attach a unit to an input, or to the output when `name` is the target.
    pub fn with_unit(mut self, name: &str, unit: &str) -> Result<Self, SetupError> {
        if name == self.assignment.target {
            self.output_unit = Some(unit.to_string());
        } else {
            let i = self.input_index(name)?;
            self.units[i] = Some(unit.to_string());
        }
        Ok(self)
    }

    pub fn target(&self) -> &str {
        &self.assignment.target
    }

    pub fn inputs(&self) -> &[String] {
        &self.assignment.inputs
    }
}

impl Component for ExecComp {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        for (i, name) in self.assignment.inputs.iter().enumerate() {
            io.declare(name, self.defaults[i], self.units[i].as_deref(), "")?;
        }
        io.declare_output(
            &self.assignment.target,
            0.0,
            self.output_unit.as_deref(),
            &self.source,
        )
    }

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        let value = self.assignment.expr.eval(params.values());
        outputs.set_at(0, value)
    }
}
