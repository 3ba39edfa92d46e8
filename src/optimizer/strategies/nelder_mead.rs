use ordered_float::OrderedFloat;

use crate::optimizer::{DesignVariable, History, OptimizationStrategy};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Which point the last proposal was, so its result can be placed.
#[derive(Debug, Clone)]
enum Phase {
    Start,
    /// Evaluating initial vertex `next + 1`
    Init { next: usize },
    Reflect,
    Expand { xr: Vec<f64>, fr: f64 },
    ContractOutside { fr: f64 },
    ContractInside,
    /// Re-evaluating shrunk vertex `next`
    Shrink { next: usize },
}

/// Nelder-Mead simplex search on the penalty merit.
///
/// Driven one evaluation at a time: every call to `propose` consumes the
/// merit of the previous proposal and advances the simplex step.
pub struct NelderMead {
    step: f64,
    simplex: Vec<(Vec<f64>, f64)>,
    phase: Phase,
}

impl NelderMead {
    pub fn new(initial_step: f64) -> Self {
        Self {
            step: initial_step,
            simplex: Vec::new(),
            phase: Phase::Start,
        }
    }

    /// Initial vertex `i`: the start point moved along coordinate `i`,
    /// backwards if the forward move leaves the bounds.
    fn initial_vertex(&self, i: usize, bounds: &[DesignVariable]) -> Vec<f64> {
        let mut point = self.simplex[0].0.clone();
        let delta = self.step * bounds[i].range();
        point[i] = if point[i] + delta <= bounds[i].high {
            point[i] + delta
        } else {
            bounds[i].clip(point[i] - delta)
        };
        point
    }

    fn centroid(&self) -> Vec<f64> {
        let n = self.simplex.len() - 1;
        let mut c = vec![0.0; n];
        for (x, _) in &self.simplex[..n] {
            for (ci, xi) in c.iter_mut().zip(x) {
                *ci += xi / n as f64;
            }
        }
        c
    }

    /// `c + t * (x - c)`, clipped.
    fn along(c: &[f64], x: &[f64], t: f64, bounds: &[DesignVariable]) -> Vec<f64> {
        c.iter()
            .zip(x)
            .zip(bounds)
            .map(|((ci, xi), b)| b.clip(ci + t * (xi - ci)))
            .collect()
    }

    fn worst(&self) -> &[f64] {
        &self.simplex[self.simplex.len() - 1].0
    }

    fn replace_worst(&mut self, x: Vec<f64>, f: f64) {
        let n = self.simplex.len() - 1;
        self.simplex[n] = (x, f);
    }

    /// Sort the simplex and propose the reflection of its worst vertex.
    fn iterate(&mut self, bounds: &[DesignVariable]) -> Vec<f64> {
        self.simplex.sort_by_key(|(_, f)| OrderedFloat(*f));
        let c = self.centroid();
        self.phase = Phase::Reflect;
        Self::along(&c, self.worst(), -REFLECT, bounds)
    }

    /// Pull every vertex halfway to the best one and start re-evaluating.
    fn shrink(&mut self, bounds: &[DesignVariable]) -> Vec<f64> {
        let best = self.simplex[0].0.clone();
        for (x, f) in self.simplex.iter_mut().skip(1) {
            *x = Self::along(&best, x, SHRINK, bounds);
            *f = f64::INFINITY;
        }
        self.phase = Phase::Shrink { next: 1 };
        self.simplex[1].0.clone()
    }
}

impl OptimizationStrategy for NelderMead {
    fn propose(&mut self, history: &History, bounds: &[DesignVariable]) -> Vec<f64> {
        let Some(last) = history.last() else {
            return bounds.iter().map(|b| b.low + 0.5 * b.range()).collect();
        };
        let x = last.point.clone();
        let f = history.merit(last);
        let n = bounds.len();

        match std::mem::replace(&mut self.phase, Phase::Start) {
            Phase::Start => {
                self.simplex = vec![(x, f)];
                self.phase = Phase::Init { next: 0 };
                self.initial_vertex(0, bounds)
            }
            Phase::Init { next } => {
                self.simplex.push((x, f));
                if next + 1 < n {
                    self.phase = Phase::Init { next: next + 1 };
                    self.initial_vertex(next + 1, bounds)
                } else {
                    self.iterate(bounds)
                }
            }
            Phase::Reflect => {
                let best = self.simplex[0].1;
                let second_worst = self.simplex[n - 1].1;
                let worst = self.simplex[n].1;
                let c = self.centroid();
                if f < best {
                    self.phase = Phase::Expand {
                        xr: x.clone(),
                        fr: f,
                    };
                    Self::along(&c, &x, EXPAND, bounds)
                } else if f < second_worst {
                    self.replace_worst(x, f);
                    self.iterate(bounds)
                } else if f < worst {
                    self.phase = Phase::ContractOutside { fr: f };
                    Self::along(&c, &x, CONTRACT, bounds)
                } else {
                    self.phase = Phase::ContractInside;
                    Self::along(&c, self.worst(), CONTRACT, bounds)
                }
            }
            Phase::Expand { xr, fr } => {
                if f < fr {
                    self.replace_worst(x, f);
                } else {
                    self.replace_worst(xr, fr);
                }
                self.iterate(bounds)
            }
            Phase::ContractOutside { fr } => {
                if f <= fr {
                    self.replace_worst(x, f);
                    self.iterate(bounds)
                } else {
                    self.shrink(bounds)
                }
            }
            Phase::ContractInside => {
                if f < self.simplex[n].1 {
                    self.replace_worst(x, f);
                    self.iterate(bounds)
                } else {
                    self.shrink(bounds)
                }
            }
            Phase::Shrink { next } => {
                self.simplex[next] = (x, f);
                if next < n {
                    self.phase = Phase::Shrink { next: next + 1 };
                    self.simplex[next + 1].0.clone()
                } else {
                    self.iterate(bounds)
                }
            }
        }
    }

    fn radius(&self) -> f64 {
        if matches!(self.phase, Phase::Start | Phase::Init { .. }) || self.simplex.len() < 2 {
            return f64::INFINITY;
        }
        let origin = &self.simplex[0].0;
        self.simplex[1..]
            .iter()
            .flat_map(|(x, _)| x.iter().zip(origin).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max)
    }
}
