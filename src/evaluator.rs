use serde::Serialize;
use tracing::trace;

use crate::error::EvalError;
use crate::graph::{Model, Schedule};
use crate::model::{Outputs, Params};

/// Summary of one completed evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// 1-based count of passes run on this problem
    pub pass: u64,
    pub components: usize,
}

/// Run every component once in schedule order.
///
/// Parameter values are read from their slots (already written upstream, by
/// default, or by `set`); outputs are written back and forwarded along
/// connections before the next component runs. The first failure aborts
/// the pass.
pub(crate) fn run_pass(model: &mut Model, schedule: &Schedule) -> Result<usize, EvalError> {
    let mut params: Vec<f64> = Vec::new();
    let mut outputs: Vec<Option<f64>> = Vec::new();

    for &comp in &schedule.components {
        let entry = &model.components[comp.0];

        params.clear();
        for (meta, slot) in entry.interface.params().iter().zip(&entry.params) {
            let value = model.registry.value(*slot).ok_or_else(|| {
                EvalError::UnresolvedParameter(format!("{}.{}", entry.path, meta.name))
            })?;
            params.push(value);
        }

        outputs.clear();
        outputs.extend(
            entry
                .interface
                .outputs()
                .iter()
                .zip(&entry.outputs)
                .map(|(meta, slot)| {
                    if meta.independent {
                        model.registry.value(*slot)
                    } else {
                        None
                    }
                }),
        );

        entry
            .component
            .compute(
                &Params::new(entry.interface.params(), &params),
                &mut Outputs::new(entry.interface.outputs(), &mut outputs),
            )
            .map_err(|source| EvalError::Compute {
                component: entry.path.clone(),
                source,
            })?;

        for ((meta, slot), value) in entry
            .interface
            .outputs()
            .iter()
            .zip(&entry.outputs)
            .zip(&outputs)
        {
            let value = value.ok_or_else(|| EvalError::MissingOutput {
                component: entry.path.clone(),
                output: meta.name.clone(),
            })?;
            model.registry.write(*slot, value);
        }
        trace!(component = %entry.path, "computed");
    }

    Ok(schedule.components.len())
}
