#![allow(dead_code)]

use hyperloop_sim::{Component, ComputeError, Interface, Outputs, Params, SetupError};

/// `y = factor * x`
pub struct Scale(pub f64);

impl Component for Scale {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        io.declare("x", 1.0, None, "input")?;
        io.declare_output("y", 0.0, None, "scaled input")
    }

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        outputs.set("y", self.0 * params.get("x")?)
    }
}

/// Pod Mach number from speed and tube air temperature.
pub struct PodMach;

impl Component for PodMach {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        io.declare("speed", 300.0, Some("m/s"), "pod speed")?;
        io.declare("tube_temp", 292.0, Some("K"), "tube air temperature")?;
        io.declare_output("mach", 0.0, None, "pod Mach number")
    }

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        let t = params.get("tube_temp")?;
        if t <= 0.0 {
            return Err(ComputeError::Domain(format!("tube_temp must be positive, got {}", t)));
        }
        let sound = (1.4 * 287.0 * t).sqrt();
        outputs.set("mach", params.get("speed")? / sound)
    }
}

/// Heat radiated by the tube wall, linear in the air temperature rise.
pub struct TubeWall;

impl Component for TubeWall {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        io.declare("tube_temp", 292.0, Some("K"), "tube air temperature")?;
        io.declare("ambient_temp", 305.6, Some("K"), "ambient temperature")?;
        io.declare_output("q_rad", 0.0, Some("W"), "radiated heat")
    }

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        let dt = params.get("tube_temp")? - params.get("ambient_temp")?;
        outputs.set("q_rad", 12.5 * dt)
    }
}

/// Fails whenever its input is negative.
pub struct Fragile;

impl Component for Fragile {
    fn declare(&self, io: &mut Interface) -> Result<(), SetupError> {
        io.declare("x", 0.0, None, "")?;
        io.declare_output("y", 0.0, None, "")
    }

    fn compute(&self, params: &Params<'_>, outputs: &mut Outputs<'_>) -> Result<(), ComputeError> {
        let x = params[0];
        if x < 0.0 {
            return Err(ComputeError::Domain(format!("negative input {}", x)));
        }
        outputs.set_at(0, x.sqrt())
    }
}
