//! Degree-of-freedom indexing within a single node.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// One-based index of a physical unknown within a node.
///
/// Index 0 is reserved in field value vectors and local accumulators, so physical fields of an
/// `N`-field model occupy indices `1..=N`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DofIndex(usize);

impl DofIndex {
    /// Returns `None` for the reserved index 0.
    pub const fn new(index: usize) -> Option<Self> {
        if index == 0 {
            None
        } else {
            Some(Self(index))
        }
    }

    /// Constructs a DoF index for use in constants.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0. In const context this is a compile-time error.
    pub const fn from_one_based(index: usize) -> Self {
        assert!(index > 0, "DoF index 0 is reserved");
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Position of this DoF in a node-major element vector with `num_dofs` DoFs per node.
    pub const fn element_offset(self, node: usize, num_dofs: usize) -> usize {
        node * num_dofs + self.0 - 1
    }
}

impl Display for DofIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed mapping from DoF indices to physical meaning for one model.
///
/// Indices are contiguous and start at 1. Residual and Jacobian code paths of a kernel must
/// address their slots through the same map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DofMap {
    entries: &'static [(DofIndex, &'static str)],
}

impl DofMap {
    /// # Panics
    ///
    /// Panics if the entries are not numbered `1, 2, ..., N` in order.
    pub const fn new(entries: &'static [(DofIndex, &'static str)]) -> Self {
        let mut i = 0;
        while i < entries.len() {
            assert!(entries[i].0.get() == i + 1, "DoF indices must be contiguous and start at 1");
            i += 1;
        }
        Self { entries }
    }

    pub fn num_dofs(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = DofIndex> + '_ {
        self.entries.iter().map(|(dof, _)| *dof)
    }

    pub fn index_of(&self, name: &str) -> Option<DofIndex> {
        self.entries
            .iter()
            .find(|(_, dof_name)| *dof_name == name)
            .map(|(dof, _)| *dof)
    }

    pub fn name_of(&self, dof: DofIndex) -> Option<&'static str> {
        self.entries
            .get(dof.get() - 1)
            .map(|(_, name)| *name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(_, name)| *name)
    }
}
