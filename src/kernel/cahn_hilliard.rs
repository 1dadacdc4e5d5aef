use crate::context::{QuadraturePointContext, ShapeFunction};
use crate::dof::{DofIndex, DofMap};
use crate::kernel::ElementKernel;
use crate::local::LocalSystem;
use crate::materials::{MaterialBundle, MaterialRequirements};
use crate::Real;

/// DoF index of the concentration $c$.
pub const CONCENTRATION: DofIndex = DofIndex::from_one_based(1);
/// DoF index of the chemical potential $\mu$.
pub const CHEMICAL_POTENTIAL: DofIndex = DofIndex::from_one_based(2);

pub(crate) static CAHN_HILLIARD_DOFS: DofMap = DofMap::new(&[(CONCENTRATION, "c"), (CHEMICAL_POTENTIAL, "mu")]);

/// Names of the scalar material properties read by [`CahnHilliardKernel`].
pub mod properties {
    /// Mobility $M$.
    pub const MOBILITY: &str = "M";
    /// $\partial M / \partial c$.
    pub const MOBILITY_DERIVATIVE: &str = "dMdc";
    /// Chemical free energy derivative $\partial F / \partial c$.
    pub const FREE_ENERGY_DERIVATIVE: &str = "dFdc";
    /// $\partial^2 F / \partial c^2$.
    pub const FREE_ENERGY_SECOND_DERIVATIVE: &str = "d2Fdc2";
    /// Gradient energy coefficient $\kappa$.
    pub const GRADIENT_COEFFICIENT: &str = "Kappa";
}

use properties::*;

/// The mixed Cahn-Hilliard model
/// $$
/// \dot c = \nabla \cdot (M \nabla \mu), \qquad \mu = \frac{\partial F}{\partial c} - \kappa \Delta c,
/// $$
/// with concentration $c$ (DoF 1) and chemical potential $\mu$ (DoF 2).
///
/// For a test function $v$ the residual is
/// $$
/// R_c = \dot c \\, v + M \nabla \mu \cdot \nabla v, \qquad
/// R_\mu = \mu \\, v - \frac{\partial F}{\partial c} v - \kappa \nabla c \cdot \nabla v.
/// $$
/// The model keeps a single history slot, which is zeroed on initialization and never read.
/// The projected quantities are $c$ and the three components of $\nabla c$.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CahnHilliardKernel;

impl<T: Real> ElementKernel<T> for CahnHilliardKernel {
    fn name(&self) -> &str {
        "Cahn-Hilliard"
    }

    fn dofs(&self) -> &DofMap {
        &CAHN_HILLIARD_DOFS
    }

    fn material_requirements(&self) -> MaterialRequirements {
        MaterialRequirements::scalars(&[
            MOBILITY,
            MOBILITY_DERIVATIVE,
            FREE_ENERGY_DERIVATIVE,
            FREE_ENERGY_SECOND_DERIVATIVE,
            GRADIENT_COEFFICIENT,
        ])
    }

    fn history_slots(&self) -> usize {
        1
    }

    fn projection_names(&self) -> &[&'static str] {
        &["c", "dcdx", "dcdy", "dcdz"]
    }

    fn compute_residual(
        &self,
        context: &QuadraturePointContext<T>,
        test: &ShapeFunction<T>,
        materials: &MaterialBundle<T>,
        _history: &mut [T],
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<()> {
        let (c, mu) = (CONCENTRATION, CHEMICAL_POTENTIAL);
        let m = materials.scalar(MOBILITY)?;
        let dfdc = materials.scalar(FREE_ENERGY_DERIVATIVE)?;
        let kappa = materials.scalar(GRADIENT_COEFFICIENT)?;
        let (u, v) = (&context.u, &context.v);

        let r_c = v.value(c) * test.value + m * u.gradient(mu).dot(&test.gradient);
        let r_mu = u.value(mu) * test.value - dfdc * test.value - kappa * u.gradient(c).dot(&test.gradient);

        local.set_residual(c, r_c);
        local.set_residual(mu, r_mu);
        Ok(())
    }

    fn compute_jacobian(
        &self,
        context: &QuadraturePointContext<T>,
        test: &ShapeFunction<T>,
        trial: &ShapeFunction<T>,
        materials: &MaterialBundle<T>,
        _history: &mut [T],
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<()> {
        let (c, mu) = (CONCENTRATION, CHEMICAL_POTENTIAL);
        let m = materials.scalar(MOBILITY)?;
        let dmdc = materials.scalar(MOBILITY_DERIVATIVE)?;
        let d2fdc2 = materials.scalar(FREE_ENERGY_SECOND_DERIVATIVE)?;
        let kappa = materials.scalar(GRADIENT_COEFFICIENT)?;
        let [ctan_u, ctan_v] = context.ctan;

        let phi_phi = trial.value * test.value;
        let grad_grad = trial.gradient.dot(&test.gradient);
        let grad_mu_test = context.u.gradient(mu).dot(&test.gradient);

        let k_cc = phi_phi * ctan_v + dmdc * trial.value * grad_mu_test * ctan_u;
        let k_cmu = m * grad_grad;
        let k_muc = -d2fdc2 * phi_phi * ctan_u - kappa * grad_grad * ctan_u;
        let k_mumu = phi_phi * ctan_u;

        local.set_jacobian(c, c, k_cc);
        local.set_jacobian(c, mu, k_cmu);
        local.set_jacobian(mu, c, k_muc);
        local.set_jacobian(mu, mu, k_mumu);
        Ok(())
    }

    fn project(&self, context: &QuadraturePointContext<T>, projection: &mut [T]) -> eyre::Result<()> {
        let c = CONCENTRATION;
        let grad_c = context.u.gradient(c);
        projection[0] = context.u.value(c);
        projection[1] = grad_c.x;
        projection[2] = grad_c.y;
        projection[3] = grad_c.z;
        Ok(())
    }
}
