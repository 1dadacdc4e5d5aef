//! Material-property evaluators feeding element kernels.
//!
//! A [`ConstitutiveModel`] turns the field state at an integration point into the named
//! properties of a [`MaterialBundle`]. Evaluators guarantee that every property they write is
//! finite.
use crate::context::QuadraturePointContext;
use crate::dof::DofMap;
use crate::error::KernelError;
use crate::kernel::properties::*;
use crate::kernel::{CAHN_HILLIARD_DOFS, CONCENTRATION};
use crate::materials::{MaterialBundle, MaterialRequirements};
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

pub trait ConstitutiveModel<T: Real>: Send + Sync {
    /// The properties written by [`ConstitutiveModel::evaluate`].
    fn provides(&self) -> MaterialRequirements;

    /// DoFs read from the context.
    fn dofs(&self) -> &DofMap;

    /// Writes the properties at the given integration point into `materials`, leaving
    /// unrelated entries in place.
    fn evaluate(&self, context: &QuadraturePointContext<T>, materials: &mut MaterialBundle<T>) -> eyre::Result<()>;
}

/// Chemical free energy density $F(c)$.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FreeEnergy<T> {
    /// $F(c) = c^2 (1 - c)^2$.
    DoubleWell,
    /// $F(c) = c \ln c + (1 - c) \ln (1 - c) + \chi c (1 - c)$, defined for $0 < c < 1$.
    FloryHuggins { chi: T },
}

impl<T: Real> FreeEnergy<T> {
    /// Returns $(\partial F / \partial c, \partial^2 F / \partial c^2)$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn derivatives(&self, c: T) -> (T, T) {
        match *self {
            FreeEnergy::DoubleWell => {
                let dfdc = 2.0 * c * (1.0 - c) * (1.0 - 2.0 * c);
                let d2fdc2 = 2.0 * (1.0 - 6.0 * c + 6.0 * c * c);
                (dfdc, d2fdc2)
            }
            FreeEnergy::FloryHuggins { chi } => {
                let dfdc = (c / (1.0 - c)).ln() + chi * (1.0 - 2.0 * c);
                let d2fdc2 = 1.0 / (c * (1.0 - c)) - 2.0 * chi;
                (dfdc, d2fdc2)
            }
        }
    }
}

/// Mobility $M(c)$.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mobility<T> {
    /// $M = M_0$.
    Constant { m0: T },
    /// $M = D c (1 - c)$, vanishing in the pure phases.
    Degenerate { d: T },
}

impl<T: Real> Mobility<T> {
    /// Returns $(M, \partial M / \partial c)$.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    pub fn evaluate(&self, c: T) -> (T, T) {
        match *self {
            Mobility::Constant { m0 } => (m0, 0.0),
            Mobility::Degenerate { d } => (d * c * (1.0 - c), d * (1.0 - 2.0 * c)),
        }
    }
}

/// Material evaluator for [`CahnHilliardKernel`](crate::kernel::CahnHilliardKernel).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CahnHilliardMaterial<T> {
    pub free_energy: FreeEnergy<T>,
    pub mobility: Mobility<T>,
    pub kappa: T,
}

impl<T: Real> ConstitutiveModel<T> for CahnHilliardMaterial<T> {
    fn provides(&self) -> MaterialRequirements {
        MaterialRequirements::scalars(&[
            MOBILITY,
            MOBILITY_DERIVATIVE,
            FREE_ENERGY_DERIVATIVE,
            FREE_ENERGY_SECOND_DERIVATIVE,
            GRADIENT_COEFFICIENT,
        ])
    }

    fn dofs(&self) -> &DofMap {
        &CAHN_HILLIARD_DOFS
    }

    fn evaluate(&self, context: &QuadraturePointContext<T>, materials: &mut MaterialBundle<T>) -> eyre::Result<()> {
        context.validate(ConstitutiveModel::dofs(self))?;
        let c = context.u.value(CONCENTRATION);
        let (m, dmdc) = self.mobility.evaluate(c);
        let (dfdc, d2fdc2) = self.free_energy.derivatives(c);

        let values = [
            (MOBILITY, m),
            (MOBILITY_DERIVATIVE, dmdc),
            (FREE_ENERGY_DERIVATIVE, dfdc),
            (FREE_ENERGY_SECOND_DERIVATIVE, d2fdc2),
            (GRADIENT_COEFFICIENT, self.kappa),
        ];
        if let Some((name, _)) = values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(KernelError::NonFiniteMaterial { name: name.to_string() }.fatal());
        }
        for (name, value) in values {
            materials.set_scalar(name, value);
        }
        Ok(())
    }
}
