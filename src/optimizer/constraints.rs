use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Bound on a model variable, usually an output.
///
/// At least one side is set; `equals` sets both to the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub path: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Constraint {
    pub fn upper(path: impl Into<String>, upper: f64) -> Self {
        Self {
            path: path.into(),
            lower: None,
            upper: Some(upper),
        }
    }

    pub fn lower(path: impl Into<String>, lower: f64) -> Self {
        Self {
            path: path.into(),
            lower: Some(lower),
            upper: None,
        }
    }

    pub fn between(path: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            path: path.into(),
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn equals(path: impl Into<String>, value: f64) -> Self {
        Self::between(path, value, value)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = || SetupError::InvalidBounds {
            path: self.path.clone(),
            low: self.lower.unwrap_or(f64::NEG_INFINITY),
            high: self.upper.unwrap_or(f64::INFINITY),
        };
        match (self.lower, self.upper) {
            (None, None) => Err(invalid()),
            (Some(l), Some(u)) if !(l <= u) => Err(invalid()),
            (Some(l), None) if l.is_nan() => Err(invalid()),
            (None, Some(u)) if u.is_nan() => Err(invalid()),
            _ => Ok(()),
        }
    }

    /// How far `value` lies outside the bounds; zero when satisfied.
    pub fn violation(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return f64::INFINITY;
        }
        let below = self.lower.map_or(0.0, |l| (l - value).max(0.0));
        let above = self.upper.map_or(0.0, |u| (value - u).max(0.0));
        below + above
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation() {
        let c = Constraint::upper("y", 16.0);
        assert_eq!(c.violation(10.0), 0.0);
        assert_eq!(c.violation(16.0), 0.0);
        assert_eq!(c.violation(20.0), 4.0);

        let c = Constraint::between("y", 1.0, 2.0);
        assert_eq!(c.violation(0.5), 0.5);
        assert_eq!(c.violation(2.5), 0.5);

        let c = Constraint::equals("y", 3.0);
        assert_eq!(c.violation(3.0), 0.0);
        assert_eq!(c.violation(1.0), 2.0);
        assert_eq!(c.violation(f64::NAN), f64::INFINITY);
    }

    #[test]
    fn test_validate() {
        assert!(Constraint::lower("y", 0.0).validate().is_ok());
        assert!(Constraint::between("y", 2.0, 1.0).validate().is_err());
        let open = Constraint {
            path: "y".into(),
            lower: None,
            upper: None,
        };
        assert!(open.validate().is_err());
    }
}
