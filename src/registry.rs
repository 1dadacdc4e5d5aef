//! Lookup of element kernels by model name.
//!
//! Setup code names models with strings taken from input files. The registry turns such a name
//! into a boxed kernel once, checks the material names the kernel will read, and hands out a
//! [`ResolvedKernel`] that sizes the per-point stores consistently with the kernel.
use crate::error::KernelError;
use crate::history::HistoryStore;
use crate::kernel::{evaluate, evaluate_code, CahnHilliardKernel, CalcMode, ElementKernel, PointInputs, PointOutputs};
use crate::local::{LocalSystem, ProjectionStore};
use crate::materials::MaterialKeys;
use crate::Real;
use log::info;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fmt::Debug;

type KernelConstructor<T> = fn() -> Box<dyn ElementKernel<T>>;

pub struct KernelRegistry<T: Real> {
    constructors: FxHashMap<String, KernelConstructor<T>>,
}

impl<T: Real> Debug for KernelRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("KernelRegistry").field("models", &names).finish()
    }
}

impl<T: Real> Default for KernelRegistry<T> {
    fn default() -> Self {
        Self::with_builtin_kernels()
    }
}

impl<T: Real> KernelRegistry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: FxHashMap::default(),
        }
    }

    /// A registry with every model shipped by this crate.
    pub fn with_builtin_kernels() -> Self {
        let mut registry = Self::new();
        for name in ["cahnhilliard", "cahn-hilliard", "ch"] {
            registry.register(name, || Box::new(CahnHilliardKernel) as Box<dyn ElementKernel<T>>);
        }
        registry
    }

    /// Registers a constructor under `name`, replacing any previous registration.
    /// Names are matched case-insensitively.
    pub fn register(&mut self, name: &str, constructor: KernelConstructor<T>) {
        self.constructors
            .insert(name.to_ascii_lowercase(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiates the kernel registered under `name` and checks that `materials` will provide
    /// every property it reads.
    pub fn resolve(&self, name: &str, materials: &impl MaterialKeys) -> eyre::Result<ResolvedKernel<T>> {
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| KernelError::UnknownModel(name.to_string()).fatal())?;
        let kernel = constructor();
        kernel.material_requirements().check(materials)?;
        info!(
            "Resolved model '{}' to {} kernel ({} DoFs, {} history slots, {} projected quantities)",
            name,
            kernel.name(),
            kernel.dofs().num_dofs(),
            kernel.history_slots(),
            kernel.projection_names().len()
        );
        Ok(ResolvedKernel { kernel })
    }
}

/// A kernel whose material requirements have been checked.
pub struct ResolvedKernel<T: Real> {
    kernel: Box<dyn ElementKernel<T>>,
}

impl<T: Real> Debug for ResolvedKernel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKernel")
            .field("name", &self.kernel.name())
            .finish()
    }
}

impl<T: Real> ResolvedKernel<T> {
    pub fn kernel(&self) -> &dyn ElementKernel<T> {
        self.kernel.as_ref()
    }

    pub fn name(&self) -> &str {
        self.kernel.name()
    }

    pub fn evaluate(&self, mode: CalcMode, inputs: &PointInputs<T>, outputs: &mut PointOutputs<T>) -> eyre::Result<()> {
        evaluate(self.kernel(), mode, inputs, outputs)
    }

    pub fn evaluate_code(&self, code: i32, inputs: &PointInputs<T>, outputs: &mut PointOutputs<T>) -> eyre::Result<()> {
        evaluate_code(self.kernel(), code, inputs, outputs)
    }

    /// History storage with the kernel's slot count.
    pub fn new_history_store(&self, num_points: usize) -> HistoryStore<T> {
        HistoryStore::new(num_points, self.kernel.history_slots())
    }

    /// A zeroed local system covering the kernel's DoFs.
    pub fn new_local_system(&self) -> LocalSystem<T> {
        LocalSystem::zeros(self.kernel.dofs().num_dofs())
    }

    /// Projection storage with the kernel's quantity count.
    pub fn new_projection_store(&self, num_points: usize) -> ProjectionStore<T> {
        ProjectionStore::new(num_points, self.kernel.projection_names().len())
    }
}
