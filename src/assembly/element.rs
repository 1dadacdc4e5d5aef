use crate::config::ProblemSetup;
use crate::constitutive::ConstitutiveModel;
use crate::context::{OwnedFieldState, QuadraturePointContext, ShapeFunction, StepInfo};
use crate::error::ensure_exact_len;
use crate::history::HistoryStore;
use crate::kernel::{evaluate, CalcMode, ElementKernel, PointInputs, PointOutputs};
use crate::local::LocalSystem;
use crate::materials::MaterialBundle;
use crate::workspace::{with_thread_local_workspace, Workspace};
use crate::Real;
use itertools::izip;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Scalar, Vector3};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Shape function data of one element at one quadrature point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraturePointShape<T: Scalar> {
    /// Quadrature weight times the Jacobian determinant of the element map.
    pub weight: T,
    pub coords: Vector3<T>,
    /// Shape function values, one per element node.
    pub values: Vec<T>,
    /// Shape function gradients in physical coordinates, one per element node.
    pub gradients: Vec<Vector3<T>>,
}

impl<T: Real> QuadraturePointShape<T> {
    pub fn num_nodes(&self) -> usize {
        self.values.len()
    }

    pub fn shape_function(&self, node: usize) -> ShapeFunction<T> {
        ShapeFunction::new(self.values[node], self.gradients[node])
    }
}

/// Shape function data of one element at all of its quadrature points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementShapeData<T: Scalar> {
    pub dim: usize,
    pub points: Vec<QuadraturePointShape<T>>,
}

impl<T: Real> ElementShapeData<T> {
    pub fn num_nodes(&self) -> usize {
        self.points
            .first()
            .map(QuadraturePointShape::num_nodes)
            .unwrap_or(0)
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

/// Nodal unknowns of one element.
///
/// `u` and `v` are node-major: the value of DoF `i` at element node `a` is stored at
/// [`DofIndex::element_offset`](crate::dof::DofIndex::element_offset)`(a, num_dofs)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ElementState<'a, T: Scalar> {
    pub num_dofs: usize,
    pub u: &'a [T],
    pub v: &'a [T],
    pub time: T,
    pub dt: T,
    pub ctan: [T; 2],
}

impl<'a, T: Real> ElementState<'a, T> {
    fn step_info(&self, shape: &ElementShapeData<T>) -> StepInfo<T> {
        StepInfo {
            dim: shape.dim,
            num_nodes: shape.num_nodes(),
            num_dofs: self.num_dofs,
            time: self.time,
            dt: self.dt,
            ctan: self.ctan,
        }
    }
}

/// Copies the node-major values of the given global nodes into `local`.
pub fn gather_global_to_local<T: Scalar + Copy>(global: &[T], local: &mut [T], nodes: &[usize], num_dofs: usize) {
    for (a, &node) in nodes.iter().enumerate() {
        local[a * num_dofs..(a + 1) * num_dofs].copy_from_slice(&global[node * num_dofs..(node + 1) * num_dofs]);
    }
}

#[derive(Debug)]
struct ElementWorkspace<T: Scalar> {
    u: OwnedFieldState<T>,
    v: OwnedFieldState<T>,
    materials: MaterialBundle<T>,
}

impl<T: Real> Default for ElementWorkspace<T> {
    fn default() -> Self {
        Self {
            u: OwnedFieldState::zeros(0),
            v: OwnedFieldState::zeros(0),
            materials: MaterialBundle::new(),
        }
    }
}

thread_local! { static WORKSPACE: RefCell<Workspace> = RefCell::new(Workspace::default()) }

fn interpolate_into<T: Real>(
    field: &mut OwnedFieldState<T>,
    nodal: &[T],
    num_dofs: usize,
    point: &QuadraturePointShape<T>,
) {
    field.values.clear();
    field.values.resize(num_dofs + 1, T::zero());
    field.gradients.clear();
    field
        .gradients
        .resize(num_dofs + 1, Vector3::zeros());
    for (a, (&phi, grad_phi)) in izip!(&point.values, &point.gradients).enumerate() {
        for i in 1..=num_dofs {
            let u_ai = nodal[a * num_dofs + i - 1];
            field.values[i] += phi * u_ai;
            field.gradients[i] += grad_phi * u_ai;
        }
    }
}

/// Evaluates a kernel over the quadrature points of single elements.
///
/// Materials at each point are the constant bundle, overwritten by whatever the optional
/// constitutive model evaluates at that point. Quadrature point `q` of an element uses history
/// point `first_point + q` of the given store.
pub struct ElementAssembler<'a, T: Real> {
    kernel: &'a dyn ElementKernel<T>,
    materials: &'a MaterialBundle<T>,
    constitutive: Option<&'a dyn ConstitutiveModel<T>>,
}

impl<'a, T: Real> ElementAssembler<'a, T> {
    pub fn new(kernel: &'a dyn ElementKernel<T>, materials: &'a MaterialBundle<T>) -> Self {
        Self {
            kernel,
            materials,
            constitutive: None,
        }
    }

    pub fn with_constitutive(self, constitutive: &'a dyn ConstitutiveModel<T>) -> Self {
        Self {
            constitutive: Some(constitutive),
            ..self
        }
    }

    pub fn from_setup(setup: &'a ProblemSetup<T>) -> Self {
        Self {
            kernel: setup.kernel.kernel(),
            materials: &setup.materials,
            constitutive: setup.constitutive_model(),
        }
    }

    pub fn kernel(&self) -> &dyn ElementKernel<T> {
        self.kernel
    }

    fn validate(&self, shape: &ElementShapeData<T>, state: &ElementState<T>) -> eyre::Result<()> {
        let n = shape.num_nodes();
        for point in &shape.points {
            ensure_exact_len("shape function values", n, point.values.len())?;
            ensure_exact_len("shape function gradients", n, point.gradients.len())?;
        }
        ensure_exact_len("element DoFs per node", self.kernel.dofs().num_dofs(), state.num_dofs)?;
        ensure_exact_len("element unknowns", n * state.num_dofs, state.u.len())?;
        ensure_exact_len("element rates", n * state.num_dofs, state.v.len())
    }

    /// Calls `visit` for every quadrature point with the interpolated context and the materials
    /// at that point.
    fn visit_points<F>(&self, shape: &ElementShapeData<T>, state: &ElementState<T>, mut visit: F) -> eyre::Result<()>
    where
        F: FnMut(usize, &QuadraturePointShape<T>, &QuadraturePointContext<T>, &MaterialBundle<T>) -> eyre::Result<()>,
    {
        self.validate(shape, state)?;
        let step = state.step_info(shape);
        with_thread_local_workspace(&WORKSPACE, |ws: &mut ElementWorkspace<T>| -> eyre::Result<()> {
            let ElementWorkspace { u, v, materials } = ws;
            for (q, point) in shape.points.iter().enumerate() {
                interpolate_into(u, state.u, state.num_dofs, point);
                interpolate_into(v, state.v, state.num_dofs, point);
                let context = QuadraturePointContext::from_step(&step, point.coords, u.view(), v.view());
                materials.clear();
                materials.extend_from(self.materials);
                if let Some(constitutive) = self.constitutive {
                    constitutive.evaluate(&context, materials)?;
                }
                visit(q, point, &context, materials)?;
            }
            Ok(())
        })
    }

    /// Runs a history transition (`InitHistoryVariable` or `UpdateHistoryVariable`) on every
    /// quadrature point of the element.
    fn history_pass(
        &self,
        mode: CalcMode,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        let mut local = LocalSystem::zeros(state.num_dofs);
        let null = ShapeFunction::new(T::zero(), Vector3::zeros());
        self.visit_points(shape, state, |q, _, context, materials| {
            let inputs = PointInputs {
                context,
                test: &null,
                trial: &null,
                materials,
            };
            let mut outputs = PointOutputs {
                history: history.point_mut(first_point + q)?,
                projection: &mut [],
                local: &mut local,
            };
            evaluate(self.kernel, mode, &inputs, &mut outputs)
        })
    }

    pub fn init_history(
        &self,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        self.history_pass(CalcMode::InitHistoryVariable, shape, state, history, first_point)
    }

    pub fn update_history(
        &self,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        self.history_pass(CalcMode::UpdateHistoryVariable, shape, state, history, first_point)
    }

    /// Computes the element residual vector, ordered node-major.
    pub fn assemble_residual_into(
        &self,
        mut output: DVectorViewMut<T>,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        let (n, nd) = (shape.num_nodes(), state.num_dofs);
        ensure_exact_len("element residual", n * nd, output.len())?;
        output.fill(T::zero());

        let dofs = self.kernel.dofs();
        let mut local = LocalSystem::zeros(nd);
        self.visit_points(shape, state, |q, point, context, materials| {
            for a in 0..n {
                let test = point.shape_function(a);
                local.fill(T::zero());
                let inputs = PointInputs {
                    context,
                    test: &test,
                    trial: &test,
                    materials,
                };
                let mut outputs = PointOutputs {
                    history: history.point_mut(first_point + q)?,
                    projection: &mut [],
                    local: &mut local,
                };
                evaluate(self.kernel, CalcMode::ComputeResidual, &inputs, &mut outputs)?;
                for i in dofs.iter() {
                    output[i.element_offset(a, nd)] += point.weight * local.residual(i);
                }
            }
            Ok(())
        })
    }

    pub fn assemble_residual(
        &self,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<DVector<T>> {
        let mut output = DVector::zeros(shape.num_nodes() * state.num_dofs);
        self.assemble_residual_into(DVectorViewMut::from(&mut output), shape, state, history, first_point)?;
        Ok(output)
    }

    /// Computes the element Jacobian with respect to the nodal unknowns, ordered node-major
    /// in both rows and columns.
    pub fn assemble_jacobian_into(
        &self,
        mut output: DMatrixViewMut<T>,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        let (n, nd) = (shape.num_nodes(), state.num_dofs);
        ensure_exact_len("element Jacobian rows", n * nd, output.nrows())?;
        ensure_exact_len("element Jacobian columns", n * nd, output.ncols())?;
        output.fill(T::zero());

        let dofs = self.kernel.dofs();
        let mut local = LocalSystem::zeros(nd);
        self.visit_points(shape, state, |q, point, context, materials| {
            for a in 0..n {
                let test = point.shape_function(a);
                for b in 0..n {
                    let trial = point.shape_function(b);
                    local.fill(T::zero());
                    let inputs = PointInputs {
                        context,
                        test: &test,
                        trial: &trial,
                        materials,
                    };
                    let mut outputs = PointOutputs {
                        history: history.point_mut(first_point + q)?,
                        projection: &mut [],
                        local: &mut local,
                    };
                    evaluate(self.kernel, CalcMode::ComputeJacobian, &inputs, &mut outputs)?;
                    for i in dofs.iter() {
                        for j in dofs.iter() {
                            let (row, col) = (i.element_offset(a, nd), j.element_offset(b, nd));
                            output[(row, col)] += point.weight * local.jacobian(i, j);
                        }
                    }
                }
            }
            Ok(())
        })
    }

    pub fn assemble_jacobian(
        &self,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<DMatrix<T>> {
        let size = shape.num_nodes() * state.num_dofs;
        let mut output = DMatrix::zeros(size, size);
        self.assemble_jacobian_into(DMatrixViewMut::from(&mut output), shape, state, history, first_point)?;
        Ok(output)
    }

    /// Writes the projected quantities of every quadrature point into the columns of `output`,
    /// which has one row per quantity named by the kernel.
    pub fn project_into(
        &self,
        mut output: DMatrixViewMut<T>,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<()> {
        let quantities = self.kernel.projection_names().len();
        ensure_exact_len("projection rows", quantities, output.nrows())?;
        ensure_exact_len("projection columns", shape.num_points(), output.ncols())?;

        let mut local = LocalSystem::zeros(state.num_dofs);
        let mut row = vec![T::zero(); quantities];
        let null = ShapeFunction::new(T::zero(), Vector3::zeros());
        self.visit_points(shape, state, |q, _, context, materials| {
            let inputs = PointInputs {
                context,
                test: &null,
                trial: &null,
                materials,
            };
            let mut outputs = PointOutputs {
                history: history.point_mut(first_point + q)?,
                projection: &mut row,
                local: &mut local,
            };
            evaluate(self.kernel, CalcMode::Projection, &inputs, &mut outputs)?;
            output.column_mut(q).copy_from_slice(&row);
            Ok(())
        })
    }

    pub fn project(
        &self,
        shape: &ElementShapeData<T>,
        state: &ElementState<T>,
        history: &mut HistoryStore<T>,
        first_point: usize,
    ) -> eyre::Result<DMatrix<T>> {
        let mut output = DMatrix::zeros(self.kernel.projection_names().len(), shape.num_points());
        self.project_into(DMatrixViewMut::from(&mut output), shape, state, history, first_point)?;
        Ok(output)
    }
}
