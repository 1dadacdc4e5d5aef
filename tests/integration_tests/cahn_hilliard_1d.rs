//! Backward Euler time stepping of the Cahn-Hilliard equations on the unit interval with zero-flux
//! boundaries, solved with Newton's method on a dense global system.
use fekernel::assembly::{gather_global_to_local, ElementAssembler, ElementShapeData, ElementState, QuadraturePointShape};
use fekernel::config::{KernelSetup, ProblemSetup};
use fekernel::constitutive::{CahnHilliardMaterial, FreeEnergy, Mobility};
use fekernel::history::{HistoryState, HistoryStore};
use fekernel::kernel::{CHEMICAL_POTENTIAL, CONCENTRATION};
use fekernel::materials::MaterialBundle;
use fekernel::optimize::calculus::ClosureVectorFunction;
use fekernel::optimize::newton::{newton, NewtonSettings};
use fekernel::registry::KernelRegistry;
use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Vector3};
use std::cell::RefCell;
use std::error::Error;
use std::f64::consts::PI;

type SolveResult = Result<(), Box<dyn Error + Send + Sync>>;

const NUM_DOFS: usize = 2;

fn segment(x0: f64, x1: f64) -> ElementShapeData<f64> {
    let h = x1 - x0;
    let xi = 1.0 / 3.0_f64.sqrt();
    let points = [-xi, xi]
        .iter()
        .map(|&xi| QuadraturePointShape {
            weight: 0.5 * h,
            coords: Vector3::new(x0 + 0.5 * (1.0 + xi) * h, 0.0, 0.0),
            values: vec![0.5 * (1.0 - xi), 0.5 * (1.0 + xi)],
            gradients: vec![Vector3::new(-1.0 / h, 0.0, 0.0), Vector3::new(1.0 / h, 0.0, 0.0)],
        })
        .collect();
    ElementShapeData { dim: 1, points }
}

struct CahnHilliard1d {
    shapes: Vec<ElementShapeData<f64>>,
    problem: ProblemSetup<f64>,
    history: RefCell<HistoryStore<f64>>,
    u_old: DVector<f64>,
    dt: f64,
}

impl CahnHilliard1d {
    fn new(num_elements: usize, dt: f64, setup: &KernelSetup<f64>) -> Self {
        let h = 1.0 / num_elements as f64;
        let shapes: Vec<_> = (0..num_elements)
            .map(|e| segment(e as f64 * h, (e + 1) as f64 * h))
            .collect();
        let problem = setup
            .resolve(&KernelRegistry::with_builtin_kernels())
            .unwrap();
        let num_points = shapes.iter().map(ElementShapeData::num_points).sum();
        let history = problem.kernel.new_history_store(num_points);

        let num_nodes = num_elements + 1;
        let mut u_old = DVector::zeros(NUM_DOFS * num_nodes);
        for node in 0..num_nodes {
            let x = node as f64 * h;
            u_old[CONCENTRATION.element_offset(node, NUM_DOFS)] = 0.5 + 0.05 * (PI * x).cos();
        }

        Self {
            shapes,
            problem,
            history: RefCell::new(history),
            u_old,
            dt,
        }
    }

    fn assembler(&self) -> ElementAssembler<f64> {
        ElementAssembler::from_setup(&self.problem)
    }

    /// Calls `f` with the global node indices, state and first history point of every element.
    fn for_each_element(
        &self,
        u: &[f64],
        mut f: impl FnMut([usize; 2], &ElementShapeData<f64>, &ElementState<f64>, usize) -> eyre::Result<()>,
    ) -> eyre::Result<()> {
        let mut first_point = 0;
        let mut u_element = [0.0; 2 * NUM_DOFS];
        let mut u_old_element = [0.0; 2 * NUM_DOFS];
        for (e, shape) in self.shapes.iter().enumerate() {
            let nodes = [e, e + 1];
            gather_global_to_local(u, &mut u_element, &nodes, NUM_DOFS);
            gather_global_to_local(self.u_old.as_slice(), &mut u_old_element, &nodes, NUM_DOFS);
            let mut v_element = [0.0; 2 * NUM_DOFS];
            for i in 0..v_element.len() {
                v_element[i] = (u_element[i] - u_old_element[i]) / self.dt;
            }
            let state = ElementState {
                num_dofs: NUM_DOFS,
                u: &u_element,
                v: &v_element,
                time: 0.0,
                dt: self.dt,
                ctan: [1.0, 1.0 / self.dt],
            };
            f(nodes, shape, &state, first_point)?;
            first_point += shape.num_points();
        }
        Ok(())
    }

    fn residual(&self, u: &[f64]) -> eyre::Result<DVector<f64>> {
        let assembler = self.assembler();
        let mut history = self.history.borrow_mut();
        let mut residual = DVector::zeros(u.len());
        self.for_each_element(u, |nodes, shape, state, first_point| {
            let r = assembler.assemble_residual(shape, state, &mut history, first_point)?;
            for (a, &node) in nodes.iter().enumerate() {
                for i in 0..NUM_DOFS {
                    residual[node * NUM_DOFS + i] += r[a * NUM_DOFS + i];
                }
            }
            Ok(())
        })?;
        Ok(residual)
    }

    fn jacobian(&self, u: &[f64]) -> eyre::Result<DMatrix<f64>> {
        let assembler = self.assembler();
        let mut history = self.history.borrow_mut();
        let mut jacobian = DMatrix::zeros(u.len(), u.len());
        self.for_each_element(u, |nodes, shape, state, first_point| {
            let k = assembler.assemble_jacobian(shape, state, &mut history, first_point)?;
            for (a, &node_a) in nodes.iter().enumerate() {
                for (b, &node_b) in nodes.iter().enumerate() {
                    for i in 0..NUM_DOFS {
                        for j in 0..NUM_DOFS {
                            jacobian[(node_a * NUM_DOFS + i, node_b * NUM_DOFS + j)] +=
                                k[(a * NUM_DOFS + i, b * NUM_DOFS + j)];
                        }
                    }
                }
            }
            Ok(())
        })?;
        Ok(jacobian)
    }

    fn init_history(&self) -> eyre::Result<()> {
        let assembler = self.assembler();
        let mut history = self.history.borrow_mut();
        self.for_each_element(self.u_old.as_slice(), |_, shape, state, first_point| {
            assembler.init_history(shape, state, &mut history, first_point)
        })
    }

    fn commit(&mut self, u: &DVector<f64>) -> eyre::Result<()> {
        {
            let assembler = self.assembler();
            let mut history = self.history.borrow_mut();
            self.for_each_element(u.as_slice(), |_, shape, state, first_point| {
                assembler.update_history(shape, state, &mut history, first_point)
            })?;
        }
        self.u_old.copy_from(u);
        Ok(())
    }

    /// Integral of the concentration, computed from the projected quadrature point values.
    fn mass(&self, u: &[f64]) -> eyre::Result<f64> {
        let assembler = self.assembler();
        let mut history = self.history.borrow_mut();
        let mut mass = 0.0;
        self.for_each_element(u, |_, shape, state, first_point| {
            let projection = assembler.project(shape, state, &mut history, first_point)?;
            for (q, point) in shape.points.iter().enumerate() {
                mass += point.weight * projection[(0, q)];
            }
            Ok(())
        })?;
        Ok(mass)
    }

    fn step(&mut self) -> eyre::Result<usize> {
        let mut x = self.u_old.clone();
        let n = x.len();
        let this = &*self;
        let function = ClosureVectorFunction::new(
            n,
            |mut f: DVectorViewMut<f64>, x: DVectorView<f64>| {
                let r = this
                    .residual(x.as_slice())
                    .expect("residual assembly must succeed");
                f.copy_from(&r);
            },
            |mut sol: DVectorViewMut<f64>, x: DVectorView<f64>, rhs: DVectorView<f64>| -> SolveResult {
                let jacobian = this.jacobian(x.as_slice())?;
                let solution = jacobian.lu().solve(&rhs).ok_or("singular Jacobian")?;
                sol.copy_from(&solution);
                Ok(())
            },
        );
        let settings = NewtonSettings {
            max_iterations: Some(10),
            tolerance: 1e-10,
        };
        let report = newton(function, &mut x, settings)?;
        self.commit(&x)?;
        Ok(report.iterations)
    }
}

fn double_well_setup() -> KernelSetup<f64> {
    KernelSetup {
        model: "cahnhilliard".to_string(),
        materials: MaterialBundle::new(),
        constitutive: Some(CahnHilliardMaterial {
            free_energy: FreeEnergy::DoubleWell,
            mobility: Mobility::Constant { m0: 1.0 },
            kappa: 1e-3,
        }),
    }
}

#[test]
fn backward_euler_conserves_mass_in_few_newton_iterations() {
    let mut problem = CahnHilliard1d::new(20, 1e-3, &double_well_setup());
    problem.init_history().unwrap();
    let initial_mass = problem.mass(problem.u_old.as_slice()).unwrap();
    assert_scalar_eq!(initial_mass, 0.5, comp = abs, tol = 1e-3);

    for _ in 0..5 {
        let iterations = problem.step().unwrap();
        assert!(iterations <= 6, "Newton took {} iterations", iterations);

        let mass = problem.mass(problem.u_old.as_slice()).unwrap();
        assert_scalar_eq!(mass, initial_mass, comp = abs, tol = 1e-9);
    }

    let history = problem.history.borrow();
    assert!((0..history.num_points()).all(|i| history.state(i).unwrap() == HistoryState::Committed));

    // Concentration stays bounded and the chemical potential is no longer trivial
    let u = &problem.u_old;
    for node in 0..21 {
        let c = u[CONCENTRATION.element_offset(node, NUM_DOFS)];
        assert!(c > 0.0 && c < 1.0);
    }
    assert!((0..21).any(|node| u[CHEMICAL_POTENTIAL.element_offset(node, NUM_DOFS)].abs() > 1e-6));
}
