use crate::context::{OwnedFieldState, QuadraturePointContext, ShapeFunction, StepInfo};
use crate::error::ensure_exact_len;
use crate::history::HistoryStore;
use crate::kernel::{evaluate, CalcMode, ElementKernel, PointInputs, PointOutputs};
use crate::local::{LocalSystem, ProjectionStore};
use crate::materials::MaterialBundle;
use crate::Real;
use log::debug;
use nalgebra::{Scalar, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything needed to evaluate a kernel at one integration point, already interpolated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSnapshot<T: Scalar> {
    pub coords: Vector3<T>,
    pub u: OwnedFieldState<T>,
    pub v: OwnedFieldState<T>,
    pub test: ShapeFunction<T>,
    pub trial: ShapeFunction<T>,
    pub materials: MaterialBundle<T>,
}

/// Evaluates `kernel` in the given mode at every point in parallel.
///
/// Point `i` reads `points[i]` and exclusively owns history point `i`, projection row `i` and
/// `locals[i]`. Store sizes must match the number of points. The first failing point aborts
/// the batch; points evaluated concurrently may already have written their outputs.
pub fn evaluate_points_par<T, K>(
    kernel: &K,
    mode: CalcMode,
    step: &StepInfo<T>,
    points: &[PointSnapshot<T>],
    history: &mut HistoryStore<T>,
    projection: &mut ProjectionStore<T>,
    locals: &mut [LocalSystem<T>],
) -> eyre::Result<()>
where
    T: Real,
    K: ElementKernel<T> + ?Sized,
{
    let n = points.len();
    ensure_exact_len("history points", n, history.num_points())?;
    ensure_exact_len("projection points", n, projection.num_points())?;
    ensure_exact_len("local systems", n, locals.len())?;

    debug!("Evaluating {} at {} points of {} kernel", mode, n, kernel.name());
    points
        .par_iter()
        .zip(history.par_points_mut())
        .zip(projection.par_rows_mut())
        .zip(locals.par_iter_mut())
        .try_for_each(|(((point, history), projection), local)| {
            let context = QuadraturePointContext::from_step(step, point.coords, point.u.view(), point.v.view());
            let inputs = PointInputs {
                context: &context,
                test: &point.test,
                trial: &point.trial,
                materials: &point.materials,
            };
            let mut outputs = PointOutputs {
                history,
                projection,
                local,
            };
            evaluate(kernel, mode, &inputs, &mut outputs)
        })
}
