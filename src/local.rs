//! Caller-owned local accumulators written by kernels.
use crate::dof::{DofIndex, DofMap};
use crate::error::ensure_len;
use crate::Real;
use nalgebra::{DMatrix, DVector, Scalar};
use rayon::prelude::*;

/// Dense local residual vector and Jacobian matrix for one (test, trial) node pair.
///
/// Both are indexed by [`DofIndex`]; index 0 is reserved, so a system for `num_dofs` DoFs holds
/// `num_dofs + 1` rows. A kernel sets exactly the entries belonging to its own DoFs and leaves
/// every other entry untouched. The buffer is exclusively owned by the worker evaluating the
/// current integration point.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSystem<T: Scalar> {
    residual: DVector<T>,
    jacobian: DMatrix<T>,
}

impl<T: Real> LocalSystem<T> {
    pub fn zeros(num_dofs: usize) -> Self {
        Self::from_element(num_dofs, T::zero())
    }

    /// A system whose every entry, including the reserved index 0, equals `value`.
    pub fn from_element(num_dofs: usize, value: T) -> Self {
        Self {
            residual: DVector::from_element(num_dofs + 1, value),
            jacobian: DMatrix::from_element(num_dofs + 1, num_dofs + 1, value),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.residual.len() - 1
    }

    pub fn residual(&self, dof: DofIndex) -> T {
        self.residual[dof.get()]
    }

    pub fn set_residual(&mut self, dof: DofIndex, value: T) {
        self.residual[dof.get()] = value;
    }

    pub fn jacobian(&self, row: DofIndex, col: DofIndex) -> T {
        self.jacobian[(row.get(), col.get())]
    }

    pub fn set_jacobian(&mut self, row: DofIndex, col: DofIndex, value: T) {
        self.jacobian[(row.get(), col.get())] = value;
    }

    pub fn residual_vector(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn jacobian_matrix(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    pub fn fill(&mut self, value: T) {
        self.residual.fill(value);
        self.jacobian.fill(value);
    }

    /// Checks that every DoF of `dofs` has a slot in this system.
    pub fn ensure_holds(&self, dofs: &DofMap) -> eyre::Result<()> {
        ensure_len("local system DoFs", dofs.num_dofs(), self.num_dofs())
    }
}

/// Projected post-processing values for a set of integration points.
///
/// Each point owns a row with one entry per exported quantity. Rows carry no state between
/// evaluations and have no influence on the nonlinear solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionStore<T: Scalar> {
    quantities: usize,
    values: Vec<T>,
}

impl<T: Real> ProjectionStore<T> {
    pub fn new(num_points: usize, quantities: usize) -> Self {
        Self {
            quantities,
            values: vec![T::zero(); num_points * quantities.max(1)],
        }
    }

    fn stride(&self) -> usize {
        self.quantities.max(1)
    }

    pub fn num_points(&self) -> usize {
        self.values.len() / self.stride()
    }

    pub fn quantities(&self) -> usize {
        self.quantities
    }

    pub fn row(&self, point: usize) -> &[T] {
        let begin = point * self.stride();
        &self.values[begin..begin + self.quantities]
    }

    pub fn row_mut(&mut self, point: usize) -> &mut [T] {
        let begin = point * self.stride();
        let quantities = self.quantities;
        &mut self.values[begin..begin + quantities]
    }

    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [T]> {
        let quantities = self.quantities;
        let stride = self.stride();
        self.values
            .par_chunks_mut(stride)
            .map(move |row| &mut row[..quantities])
    }
}
