use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

/// A function $f: \mathbb{R}^n \rightarrow \mathbb{R}^n$ whose evaluation may reuse internal buffers.
pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;

    fn eval_into(&mut self, f: DVectorViewMut<T>, x: DVectorView<T>);
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: DVectorViewMut<T>, x: DVectorView<T>) {
        X::eval_into(self, f, x)
    }
}

/// A vector function that can solve linear systems with its own Jacobian.
pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    /// Solve `J(x) sol = rhs` for `sol`.
    fn solve_jacobian_system(
        &mut self,
        sol: DVectorViewMut<T>,
        x: DVectorView<T>,
        rhs: DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: DVectorViewMut<T>,
        x: DVectorView<T>,
        rhs: DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        X::solve_jacobian_system(self, sol, x, rhs)
    }
}

/// A [`DifferentiableVectorFunction`] assembled from two closures.
///
/// Convenient for tests and small drivers where defining a dedicated type is overkill.
#[derive(Debug, Clone)]
pub struct ClosureVectorFunction<F, J> {
    dimension: usize,
    function: F,
    jacobian_solver: J,
}

impl<F, J> ClosureVectorFunction<F, J> {
    pub fn new(dimension: usize, function: F, jacobian_solver: J) -> Self {
        Self {
            dimension,
            function,
            jacobian_solver,
        }
    }
}

impl<F, J, T> VectorFunction<T> for ClosureVectorFunction<F, J>
where
    T: Scalar,
    F: FnMut(DVectorViewMut<T>, DVectorView<T>),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn eval_into(&mut self, f: DVectorViewMut<T>, x: DVectorView<T>) {
        (self.function)(f, x)
    }
}

impl<F, J, T> DifferentiableVectorFunction<T> for ClosureVectorFunction<F, J>
where
    T: Scalar,
    F: FnMut(DVectorViewMut<T>, DVectorView<T>),
    J: FnMut(DVectorViewMut<T>, DVectorView<T>, DVectorView<T>) -> Result<(), Box<dyn Error + Send + Sync>>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: DVectorViewMut<T>,
        x: DVectorView<T>,
        rhs: DVectorView<T>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        (self.jacobian_solver)(sol, x, rhs)
    }
}

/// Approximates the derivative of the scalar function `f: R -> R` at `x` with central differences.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn approximate_derivative_fd<T>(mut f: impl FnMut(T) -> T, x: T, h: T) -> T
where
    T: RealField + Copy,
{
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Approximates the gradient of the function `f: R^n -> R` with central differences.
///
/// The vector `x` is used as scratch space while perturbing entries, but its content is
/// restored before returning.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn approximate_gradient_fd<T>(mut f: impl FnMut(DVectorView<T>) -> T, x: &mut DVector<T>, h: T) -> DVector<T>
where
    T: RealField + Copy,
{
    let mut gradient = DVector::zeros(x.len());
    for i in 0..x.len() {
        let x_i = x[i];
        x[i] = x_i + h;
        let f_plus = f(DVectorView::from(&*x));
        x[i] = x_i - h;
        let f_minus = f(DVectorView::from(&*x));
        x[i] = x_i;
        gradient[i] = (f_plus - f_minus) / (2.0 * h);
    }
    gradient
}

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with central finite differences.
///
/// The Jacobian matrix is the $m \times n$ matrix whose entries are given by
/// $$ J_{ij} := \pd{f_i}{x_j}.$$
///
/// The vector `x` is perturbed in place one entry at a time and restored afterwards.
pub fn approximate_jacobian_fd<T>(
    m: usize,
    f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: &mut DVector<T>,
    h: T,
) -> DMatrix<T>
where
    T: RealField + Copy,
{
    let mut jacobian = DMatrix::zeros(m, x.len());
    approximate_jacobian_fd_into(DMatrixViewMut::from(&mut jacobian), f, x, h);
    jacobian
}

/// Same as [`approximate_jacobian_fd`], but stores the result in the provided output matrix.
///
/// # Panics
///
/// Panics if the number of columns of `jacobian` does not match the length of `x`.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn approximate_jacobian_fd_into<T>(
    mut jacobian: DMatrixViewMut<T>,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: &mut DVector<T>,
    h: T,
) where
    T: RealField + Copy,
{
    let m = jacobian.nrows();
    let n = x.len();
    assert_eq!(n, jacobian.ncols(), "Jacobian column count must match input dimension");

    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    for j in 0..n {
        // df/dx_j ~ (f(x + h e_j) - f(x - h e_j)) / (2 h)
        let x_j = x[j];
        x[j] = x_j + h;
        f(DVectorView::from(&*x), DVectorViewMut::from(&mut f_plus));
        x[j] = x_j - h;
        f(DVectorView::from(&*x), DVectorViewMut::from(&mut f_minus));
        x[j] = x_j;

        let mut column = jacobian.column_mut(j);
        column.copy_from(&f_plus);
        column -= &f_minus;
        column /= 2.0 * h;
    }
}
