use crate::optimizer::{DesignVariable, History, OptimizationStrategy};

/// Coordinate pattern search.
///
/// Polls `+e_i` and `-e_i` around the incumbent with a step of
/// `scale * range_i`. A poll point replaces the incumbent only if it strictly
/// lowers the merit; once all `2n` directions fail the scale is halved.
pub struct CompassSearch {
    /// Step as a fraction of each variable's range
    scale: f64,
    /// Best point so far and its merit
    incumbent: Option<(Vec<f64>, f64)>,
    /// Direction of the point currently under evaluation
    poll: usize,
    ranges: Vec<f64>,
}

impl CompassSearch {
    pub fn new(initial_step: f64) -> Self {
        Self {
            scale: initial_step,
            incumbent: None,
            poll: 0,
            ranges: Vec::new(),
        }
    }

    fn advance(&mut self) {
        self.poll += 1;
        if self.poll == 2 * self.ranges.len() {
            self.poll = 0;
            self.scale *= 0.5;
        }
    }

    fn candidate(&self, base: &[f64], bounds: &[DesignVariable]) -> Vec<f64> {
        let i = self.poll / 2;
        let sign = if self.poll % 2 == 0 { 1.0 } else { -1.0 };
        let mut point = base.to_vec();
        point[i] = bounds[i].clip(base[i] + sign * self.scale * self.ranges[i]);
        point
    }
}

impl OptimizationStrategy for CompassSearch {
    fn propose(&mut self, history: &History, bounds: &[DesignVariable]) -> Vec<f64> {
        if self.ranges.is_empty() {
            self.ranges = bounds.iter().map(DesignVariable::range).collect();
        }
        let Some(last) = history.last() else {
            return bounds.iter().map(|b| b.low + 0.5 * b.range()).collect();
        };
        let merit = history.merit(last);

        match &self.incumbent {
            None => {
                self.incumbent = Some((last.point.clone(), merit));
                self.poll = 0;
            }
            Some((_, best)) if merit < *best => {
                self.incumbent = Some((last.point.clone(), merit));
                self.poll = 0;
            }
            Some(_) => self.advance(),
        }

        let base = match &self.incumbent {
            Some((point, _)) => point.clone(),
            None => last.point.clone(),
        };

        // directions clipped back onto the incumbent are skipped
        for _ in 0..2 * self.ranges.len() * 64 {
            let point = self.candidate(&base, bounds);
            if point != base {
                return point;
            }
            self.advance();
        }
        base
    }

    fn radius(&self) -> f64 {
        if self.ranges.is_empty() {
            return f64::INFINITY;
        }
        self.scale * self.ranges.iter().copied().fold(0.0, f64::max)
    }
}
