use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Whether a variable is read or written by its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Parameter,
    Output,
}

/// Declared metadata of a single variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarMeta {
    pub name: String,
    pub role: Role,
    /// `None` only for required parameters
    pub default: Option<f64>,
    pub unit: Option<String>,
    pub description: String,
    /// Output that holds an externally set value instead of a computed one
    pub independent: bool,
}

impl VarMeta {
    pub fn is_computed_output(&self) -> bool {
        self.role == Role::Output && !self.independent
    }
}

/// Checks that `name` is a single path segment.
pub(crate) fn check_name(name: &str) -> Result<(), SetupError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(SetupError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// The parameters and outputs a component declares, in declaration order.
///
/// Positions in [`Interface::params`] and [`Interface::outputs`] are the
/// indices a component sees in [`crate::Params`] and [`crate::Outputs`].
#[derive(Debug, Clone, Default)]
pub struct Interface {
    component: String,
    params: Vec<VarMeta>,
    outputs: Vec<VarMeta>,
}

impl Interface {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    /// Path of the component this interface belongs to.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Declare a parameter with a default value.
    pub fn declare(
        &mut self,
        name: &str,
        default: f64,
        unit: Option<&str>,
        description: &str,
    ) -> Result<(), SetupError> {
        self.push(name, Role::Parameter, Some(default), unit, description, false)
    }

    /// Declare a parameter that must be fed by a connection or set explicitly.
    pub fn declare_required(
        &mut self,
        name: &str,
        unit: Option<&str>,
        description: &str,
    ) -> Result<(), SetupError> {
        self.push(name, Role::Parameter, None, unit, description, false)
    }

    /// Declare an output computed by the component.
    pub fn declare_output(
        &mut self,
        name: &str,
        default: f64,
        unit: Option<&str>,
        description: &str,
    ) -> Result<(), SetupError> {
        self.push(name, Role::Output, Some(default), unit, description, false)
    }

    /// Declare an output that only holds a value set from outside.
    pub fn declare_independent(
        &mut self,
        name: &str,
        value: f64,
        unit: Option<&str>,
        description: &str,
    ) -> Result<(), SetupError> {
        self.push(name, Role::Output, Some(value), unit, description, true)
    }

    fn push(
        &mut self,
        name: &str,
        role: Role,
        default: Option<f64>,
        unit: Option<&str>,
        description: &str,
        independent: bool,
    ) -> Result<(), SetupError> {
        check_name(name)?;
        if self.get(name).is_some() {
            return Err(SetupError::DuplicateDeclaration {
                component: self.component.clone(),
                name: name.to_string(),
            });
        }
        let meta = VarMeta {
            name: name.to_string(),
            role,
            default,
            unit: unit.map(str::to_string),
            description: description.to_string(),
            independent,
        };
        match role {
            Role::Parameter => self.params.push(meta),
            Role::Output => self.outputs.push(meta),
        }
        Ok(())
    }

    pub fn params(&self) -> &[VarMeta] {
        &self.params
    }

    pub fn outputs(&self) -> &[VarMeta] {
        &self.outputs
    }

    /// Parameters first, then outputs.
    pub fn iter(&self) -> impl Iterator<Item = &VarMeta> {
        self.params.iter().chain(self.outputs.iter())
    }

    pub fn get(&self, name: &str) -> Option<&VarMeta> {
        self.iter().find(|v| v.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.outputs.is_empty()
    }
}
