use crate::calculus::DifferentiableVectorFunction;
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    pub tolerance: T,
}

/// Summary of a converged Newton solve.
#[derive(Debug, Clone)]
pub struct NewtonReport<T>
where
    T: Scalar,
{
    pub iterations: usize,
    /// Euclidean norm of the residual before each iteration, followed by the final norm.
    pub residual_norms: Vec<T>,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(Box<dyn Error + Send + Sync>),
    /// The residual became NaN or infinite.
    NonFiniteResidual(usize),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            NewtonError::JacobianError(err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            NewtonError::NonFiniteResidual(iter) => {
                write!(f, "Residual became non-finite at iteration {}.", iter)
            }
        }
    }
}

impl Error for NewtonError {}

/// Attempts to solve the non-linear equation F(x) = 0 with full Newton steps.
///
/// The solution is said to have converged if ```|F(x)|_2 <= tolerance```. Upon success,
/// `x` holds the solution and the returned report records the residual norm history, which
/// makes it possible to inspect the convergence rate.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn newton<T, F>(mut function: F, x: &mut DVector<T>, settings: NewtonSettings<T>) -> Result<NewtonReport<T>, NewtonError>
where
    T: RealField + Copy,
    F: DifferentiableVectorFunction<T>,
{
    let n = function.dimension();
    assert_eq!(x.len(), n, "Initial guess must match function dimension");

    let mut f = DVector::zeros(n);
    let mut minus_dx = DVector::zeros(n);
    let mut residual_norms = Vec::new();

    function.eval_into(DVectorViewMut::from(&mut f), DVectorView::from(&*x));
    let mut iter = 0;

    loop {
        let f_norm = f.norm();
        if !f_norm.is_finite() {
            return Err(NewtonError::NonFiniteResidual(iter));
        }
        residual_norms.push(f_norm);
        debug!("Newton residual norm at iter {}: {}", iter, f_norm);

        if f_norm <= settings.tolerance {
            return Ok(NewtonReport {
                iterations: iter,
                residual_norms,
            });
        }

        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            return Err(NewtonError::MaximumIterationsReached(iter));
        }

        // Solve J (-dx) = f, then x <- x - (-dx)
        function
            .solve_jacobian_system(DVectorViewMut::from(&mut minus_dx), DVectorView::from(&*x), DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;
        x.axpy(-1.0, &minus_dx, 1.0);
        function.eval_into(DVectorViewMut::from(&mut f), DVectorView::from(&*x));
        iter += 1;
    }
}
