//! Serializable description of which model runs with which materials.
use crate::constitutive::{CahnHilliardMaterial, ConstitutiveModel};
use crate::context::QuadraturePointContext;
use crate::materials::MaterialBundle;
use crate::registry::{KernelRegistry, ResolvedKernel};
use crate::Real;
use nalgebra::Scalar;
use serde::{Deserialize, Serialize};

/// Model selection as read from an input file.
///
/// ```json
/// {
///     "model": "cahnhilliard",
///     "constitutive": {
///         "free_energy": { "type": "double_well" },
///         "mobility": { "type": "constant", "m0": 1.0 },
///         "kappa": 0.001
///     }
/// }
/// ```
///
/// Properties in `materials` are constant over the domain. Properties written by the
/// constitutive model are re-evaluated at every integration point and take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSetup<T: Scalar> {
    pub model: String,
    #[serde(default)]
    pub materials: MaterialBundle<T>,
    #[serde(default)]
    pub constitutive: Option<CahnHilliardMaterial<T>>,
}

impl<T: Real> KernelSetup<T> {
    /// Resolves the model and checks that constant and evaluated materials together cover
    /// everything the kernel reads.
    pub fn resolve(&self, registry: &KernelRegistry<T>) -> eyre::Result<ProblemSetup<T>> {
        self.materials.ensure_finite()?;
        let kernel = match &self.constitutive {
            Some(constitutive) => registry.resolve(&self.model, &(&self.materials, constitutive.provides()))?,
            None => registry.resolve(&self.model, &self.materials)?,
        };
        Ok(ProblemSetup {
            kernel,
            materials: self.materials.clone(),
            constitutive: self.constitutive,
        })
    }
}

/// A resolved [`KernelSetup`].
#[derive(Debug)]
pub struct ProblemSetup<T: Real> {
    pub kernel: ResolvedKernel<T>,
    pub materials: MaterialBundle<T>,
    pub constitutive: Option<CahnHilliardMaterial<T>>,
}

impl<T: Real> ProblemSetup<T> {
    /// The constitutive model, if any, as a trait object for assembly.
    pub fn constitutive_model(&self) -> Option<&dyn ConstitutiveModel<T>> {
        self.constitutive
            .as_ref()
            .map(|model| model as &dyn ConstitutiveModel<T>)
    }

    /// Overwrites `materials` with the properties at the given integration point.
    pub fn materials_at_into(
        &self,
        context: &QuadraturePointContext<T>,
        materials: &mut MaterialBundle<T>,
    ) -> eyre::Result<()> {
        materials.clear();
        materials.extend_from(&self.materials);
        if let Some(constitutive) = &self.constitutive {
            constitutive.evaluate(context, materials)?;
        }
        Ok(())
    }

    pub fn materials_at(&self, context: &QuadraturePointContext<T>) -> eyre::Result<MaterialBundle<T>> {
        let mut materials = MaterialBundle::new();
        self.materials_at_into(context, &mut materials)?;
        Ok(materials)
    }
}
