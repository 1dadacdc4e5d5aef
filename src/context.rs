//! Immutable snapshots of everything known at one integration point.
use crate::dof::{DofIndex, DofMap};
use crate::error::{ensure_len, KernelError};
use crate::Real;
use nalgebra::{Scalar, Vector3};
use serde::{Deserialize, Serialize};

/// Value and spatial gradient of one shape function at an integration point.
///
/// During residual evaluation this is the test function of the row being assembled; during
/// Jacobian evaluation there is an additional trial function for the column.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeFunction<T: Scalar> {
    pub value: T,
    pub gradient: Vector3<T>,
}

impl<T: Scalar> ShapeFunction<T> {
    pub fn new(value: T, gradient: Vector3<T>) -> Self {
        Self { value, gradient }
    }
}

/// Borrowed field values and gradients, indexed by [`DofIndex`].
///
/// Index 0 of both slices is reserved, so their length is at least `num_dofs + 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldState<'a, T: Scalar> {
    pub values: &'a [T],
    pub gradients: &'a [Vector3<T>],
}

impl<'a, T: Real> FieldState<'a, T> {
    pub fn new(values: &'a [T], gradients: &'a [Vector3<T>]) -> Self {
        Self { values, gradients }
    }

    /// # Panics
    ///
    /// Panics if `dof` is out of bounds. Kernels only read validated contexts.
    pub fn value(&self, dof: DofIndex) -> T {
        self.values[dof.get()]
    }

    /// # Panics
    ///
    /// Panics if `dof` is out of bounds. Kernels only read validated contexts.
    pub fn gradient(&self, dof: DofIndex) -> &'a Vector3<T> {
        &self.gradients[dof.get()]
    }

    fn validate(&self, which: FieldKind, num_dofs: usize) -> eyre::Result<()> {
        let (values, gradients) = match which {
            FieldKind::Current => ("current field values", "current field gradients"),
            FieldKind::Rate => ("field rate values", "field rate gradients"),
        };
        ensure_len(values, num_dofs + 1, self.values.len())?;
        ensure_len(gradients, num_dofs + 1, self.gradients.len())
    }
}

#[derive(Debug, Copy, Clone)]
enum FieldKind {
    Current,
    Rate,
}

/// Owned counterpart of [`FieldState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedFieldState<T: Scalar> {
    pub values: Vec<T>,
    pub gradients: Vec<Vector3<T>>,
}

impl<T: Real> OwnedFieldState<T> {
    /// Zero values and gradients for `num_dofs` fields, plus the reserved index 0.
    pub fn zeros(num_dofs: usize) -> Self {
        Self {
            values: vec![T::zero(); num_dofs + 1],
            gradients: vec![Vector3::zeros(); num_dofs + 1],
        }
    }

    pub fn set(&mut self, dof: DofIndex, value: T, gradient: Vector3<T>) {
        self.values[dof.get()] = value;
        self.gradients[dof.get()] = gradient;
    }

    pub fn view(&self) -> FieldState<'_, T> {
        FieldState::new(&self.values, &self.gradients)
    }
}

/// Time-stepping information shared by all integration points of one nonlinear iteration.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo<T: Scalar> {
    pub dim: usize,
    pub num_nodes: usize,
    pub num_dofs: usize,
    pub time: T,
    pub dt: T,
    /// Linearization coefficients: `ctan[0]` is the derivative weight of a field with respect
    /// to its nodal value, `ctan[1]` the weight of its time derivative.
    pub ctan: [T; 2],
}

/// Everything a kernel may read at one integration point, apart from shape functions and
/// materials.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadraturePointContext<'a, T: Scalar> {
    pub dim: usize,
    pub num_nodes: usize,
    pub num_dofs: usize,
    pub time: T,
    pub dt: T,
    pub ctan: [T; 2],
    pub coords: Vector3<T>,
    /// Current iterate.
    pub u: FieldState<'a, T>,
    /// Current time derivative.
    pub v: FieldState<'a, T>,
}

impl<'a, T: Real> QuadraturePointContext<'a, T> {
    pub fn from_step(step: &StepInfo<T>, coords: Vector3<T>, u: FieldState<'a, T>, v: FieldState<'a, T>) -> Self {
        Self {
            dim: step.dim,
            num_nodes: step.num_nodes,
            num_dofs: step.num_dofs,
            time: step.time,
            dt: step.dt,
            ctan: step.ctan,
            coords,
            u,
            v,
        }
    }

    /// Checks that the context can serve a model with the given DoF map without any
    /// out-of-bounds access.
    pub fn validate(&self, dofs: &DofMap) -> eyre::Result<()> {
        if !(1..=3).contains(&self.dim) {
            return Err(KernelError::InvalidDimension(self.dim).fatal());
        }
        ensure_len("element DoFs per node", dofs.num_dofs(), self.num_dofs)?;
        self.u.validate(FieldKind::Current, self.num_dofs)?;
        self.v.validate(FieldKind::Rate, self.num_dofs)
    }
}
