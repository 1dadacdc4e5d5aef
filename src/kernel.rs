//! The element kernel contract and calculation-mode dispatch.
//!
//! A physical model is a type implementing [`ElementKernel`]. The single entry point
//! [`evaluate`] routes a [`CalcMode`] to the matching kernel method after validating the
//! caller-supplied buffers, so one model definition is the only source of its residual, its
//! Jacobian, its history transitions and its projected quantities.
use crate::context::{QuadraturePointContext, ShapeFunction};
use crate::dof::DofMap;
use crate::error::{ensure_len, KernelError};
use crate::history::HistoryPoint;
use crate::local::LocalSystem;
use crate::materials::{MaterialBundle, MaterialRequirements};
use crate::Real;
use nalgebra::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

mod cahn_hilliard;

pub use cahn_hilliard::*;

/// The closed set of calculation modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcMode {
    ComputeResidual,
    ComputeJacobian,
    InitHistoryVariable,
    UpdateHistoryVariable,
    Projection,
}

impl CalcMode {
    pub const ALL: [CalcMode; 5] = [
        CalcMode::ComputeResidual,
        CalcMode::ComputeJacobian,
        CalcMode::InitHistoryVariable,
        CalcMode::UpdateHistoryVariable,
        CalcMode::Projection,
    ];

    /// Integer code of the mode, matching declaration order.
    pub fn code(self) -> i32 {
        match self {
            CalcMode::ComputeResidual => 0,
            CalcMode::ComputeJacobian => 1,
            CalcMode::InitHistoryVariable => 2,
            CalcMode::UpdateHistoryVariable => 3,
            CalcMode::Projection => 4,
        }
    }
}

impl Display for CalcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl TryFrom<i32> for CalcMode {
    type Error = eyre::Report;

    fn try_from(code: i32) -> eyre::Result<Self> {
        CalcMode::ALL
            .into_iter()
            .find(|mode| mode.code() == code)
            .ok_or_else(|| KernelError::UnknownMode(code.to_string()).fatal())
    }
}

impl FromStr for CalcMode {
    type Err = eyre::Report;

    /// Accepts the variant names as well as short aliases, ignoring case.
    fn from_str(s: &str) -> eyre::Result<Self> {
        let mode = match s.to_ascii_lowercase().as_str() {
            "computeresidual" | "residual" => CalcMode::ComputeResidual,
            "computejacobian" | "jacobian" => CalcMode::ComputeJacobian,
            "inithistoryvariable" | "inithistory" => CalcMode::InitHistoryVariable,
            "updatehistoryvariable" | "updatehistory" => CalcMode::UpdateHistoryVariable,
            "projection" | "project" => CalcMode::Projection,
            _ => return Err(KernelError::UnknownMode(s.to_string()).fatal()),
        };
        Ok(mode)
    }
}

/// The weak form of one physical model, evaluated at a single integration point.
///
/// Implementations are pure functions of their arguments: they perform no I/O, never block
/// and keep no state between calls, so one kernel instance can be shared by all workers.
/// Kernels are not called directly by assembly code but through [`evaluate`], which validates
/// sizes beforehand. Methods may therefore index fields by the DoFs declared in
/// [`ElementKernel::dofs`] without further checks.
pub trait ElementKernel<T: Real>: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Fixed DoF-index-to-field mapping of the model.
    fn dofs(&self) -> &DofMap;

    /// Material properties dereferenced by residual and Jacobian evaluation.
    fn material_requirements(&self) -> MaterialRequirements;

    /// Number of history slots per integration point.
    fn history_slots(&self) -> usize {
        0
    }

    /// Names of the projected quantities, in output order.
    fn projection_names(&self) -> &[&'static str] {
        &[]
    }

    fn supports(&self, _mode: CalcMode) -> bool {
        true
    }

    /// Sets the residual entries of the model's DoFs for the given test function.
    fn compute_residual(
        &self,
        context: &QuadraturePointContext<T>,
        test: &ShapeFunction<T>,
        materials: &MaterialBundle<T>,
        history: &mut [T],
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<()>;

    /// Sets the Jacobian entries of the model's DoF block for the given test/trial pair.
    fn compute_jacobian(
        &self,
        context: &QuadraturePointContext<T>,
        test: &ShapeFunction<T>,
        trial: &ShapeFunction<T>,
        materials: &MaterialBundle<T>,
        history: &mut [T],
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<()>;

    /// Writes initial history values. The slots are zeroed beforehand.
    fn init_history(&self, _context: &QuadraturePointContext<T>, _history: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    /// Writes the projected quantities from the current field values and gradients.
    fn project(&self, _context: &QuadraturePointContext<T>, _projection: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }
}

/// Read-only inputs of one kernel evaluation.
#[derive(Debug, Copy, Clone)]
pub struct PointInputs<'a, T: Scalar> {
    pub context: &'a QuadraturePointContext<'a, T>,
    pub test: &'a ShapeFunction<T>,
    pub trial: &'a ShapeFunction<T>,
    pub materials: &'a MaterialBundle<T>,
}

/// Mutable outputs of one kernel evaluation, exclusively owned by the evaluating worker.
#[derive(Debug)]
pub struct PointOutputs<'a, T: Scalar> {
    pub history: HistoryPoint<'a, T>,
    pub projection: &'a mut [T],
    pub local: &'a mut LocalSystem<T>,
}

/// Evaluates `kernel` in the given mode.
///
/// Each mode touches a disjoint part of the outputs:
///
/// - `ComputeResidual` / `ComputeJacobian` set the model's entries of `outputs.local`,
/// - `InitHistoryVariable` writes only the current history values,
/// - `UpdateHistoryVariable` copies current history into old history,
/// - `Projection` writes only `outputs.projection`.
///
/// Every contract violation (unsupported mode, missing material, undersized buffers, history
/// used before initialization) is returned as a fatal [`KernelError`] before anything is
/// written, except for missing materials, which kernels look up before computing any entry.
pub fn evaluate<T, K>(
    kernel: &K,
    mode: CalcMode,
    inputs: &PointInputs<T>,
    outputs: &mut PointOutputs<T>,
) -> eyre::Result<()>
where
    T: Real,
    K: ElementKernel<T> + ?Sized,
{
    if !kernel.supports(mode) {
        return Err(KernelError::UnsupportedMode {
            model: kernel.name().to_string(),
            mode,
        }
        .fatal());
    }

    let dofs = kernel.dofs();
    let slots = kernel.history_slots();
    match mode {
        CalcMode::ComputeResidual => {
            inputs.context.validate(dofs)?;
            outputs.local.ensure_holds(dofs)?;
            ensure_history_ready(&outputs.history, slots)?;
            kernel.compute_residual(
                inputs.context,
                inputs.test,
                inputs.materials,
                outputs.history.current_mut(),
                outputs.local,
            )
        }
        CalcMode::ComputeJacobian => {
            inputs.context.validate(dofs)?;
            outputs.local.ensure_holds(dofs)?;
            ensure_history_ready(&outputs.history, slots)?;
            kernel.compute_jacobian(
                inputs.context,
                inputs.test,
                inputs.trial,
                inputs.materials,
                outputs.history.current_mut(),
                outputs.local,
            )
        }
        CalcMode::InitHistoryVariable => {
            outputs.history.ensure_slots(slots)?;
            let context = inputs.context;
            outputs
                .history
                .initialize_with(|current| kernel.init_history(context, current))
        }
        CalcMode::UpdateHistoryVariable => {
            outputs.history.ensure_slots(slots)?;
            outputs.history.commit()
        }
        CalcMode::Projection => {
            inputs.context.validate(dofs)?;
            ensure_len("projection buffer", kernel.projection_names().len(), outputs.projection.len())?;
            kernel.project(inputs.context, outputs.projection)
        }
    }
}

/// Same as [`evaluate`], but takes a raw integer mode code as it arrives from outside the
/// type system. Unknown codes are fatal and nothing is evaluated.
pub fn evaluate_code<T, K>(
    kernel: &K,
    code: i32,
    inputs: &PointInputs<T>,
    outputs: &mut PointOutputs<T>,
) -> eyre::Result<()>
where
    T: Real,
    K: ElementKernel<T> + ?Sized,
{
    let mode = CalcMode::try_from(code)?;
    evaluate(kernel, mode, inputs, outputs)
}

fn ensure_history_ready<T: Real>(history: &HistoryPoint<T>, slots: usize) -> eyre::Result<()> {
    history.ensure_slots(slots)?;
    if slots > 0 {
        history.ensure_initialized()?;
    }
    Ok(())
}
