use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::optimizer::OptimizerKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DriverConfig {
    pub optimizer: OptimizerKind,
    /// Convergence and feasibility threshold
    #[validate(range(exclusive_min = 0.0))]
    pub tolerance: f64,
    #[validate(range(min = 1))]
    pub max_iterations: u32,
    /// Failed evaluations tolerated in a row; one more aborts the run
    #[validate(range(min = 1))]
    pub max_consecutive_failures: u32,
    /// Weight of constraint violation in the merit function
    #[validate(range(exclusive_min = 0.0))]
    pub penalty: f64,
    /// Initial step as a fraction of each design variable's range
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub initial_step: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Compass,
            tolerance: 1e-6,
            max_iterations: 200,
            max_consecutive_failures: 5,
            penalty: 1e3,
            initial_step: 0.1,
        }
    }
}

impl DriverConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(DriverConfig::default()))
            .merge(Toml::file("config/driver.toml"))
            .merge(Env::prefixed("HLS__").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: DriverConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }
}
