//! Derivative-free proposal strategies
//!
//! - Compass: coordinate pattern search on an exact-penalty merit
//! - Nelder-Mead: simplex search on the same merit

pub mod compass;
pub mod nelder_mead;

pub use compass::CompassSearch;
pub use nelder_mead::NelderMead;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::OptimizationStrategy;
use crate::config::DriverConfig;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    #[serde(alias = "cobyla")]
    #[strum(to_string = "compass", serialize = "cobyla")]
    Compass,
    NelderMead,
}

impl OptimizerKind {
    pub fn build(self, config: &DriverConfig) -> Box<dyn OptimizationStrategy> {
        match self {
            OptimizerKind::Compass => Box::new(CompassSearch::new(config.initial_step)),
            OptimizerKind::NelderMead => Box::new(NelderMead::new(config.initial_step)),
        }
    }
}
