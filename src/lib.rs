//! Per-quadrature-point element kernels for coupled, nonlinear finite element solvers.
//!
//! An [`ElementKernel`](kernel::ElementKernel) encodes the weak form of one physical model. Given the
//! local solution state at a single integration point it produces, depending on the requested
//! [`CalcMode`](kernel::CalcMode), the residual contribution of the current test function, the
//! consistent Jacobian entry for a (test, trial) pair, a history-variable transition or a set of
//! projected post-processing quantities. Assembly over elements, quadrature rules, shape
//! functions and solvers are left to the caller; the [`assembly`] module only provides the
//! element-local loop that drives a kernel over the quadrature points of a single element.
use nalgebra::RealField;

pub mod assembly;
pub mod config;
pub mod constitutive;
pub mod context;
pub mod dof;
pub mod error;
pub mod history;
pub mod kernel;
pub mod local;
pub mod materials;
pub mod registry;

pub(crate) mod workspace;

pub mod optimize {
    pub use fekernel_optimize::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;

/// Real scalar type used throughout `fekernel`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
