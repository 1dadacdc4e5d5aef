//! Named material property bundles consumed by element kernels.
//!
//! Bundles are produced upstream by a constitutive model (see [`crate::constitutive`]) and are
//! read-only to kernels. Kernels look properties up by name; the set of names a kernel
//! dereferences is declared through [`MaterialRequirements`] and validated once at setup.
use crate::error::KernelError;
use crate::Real;
use nalgebra::{Matrix3, SMatrix, Scalar, Vector3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    Scalar,
    Vector,
    Rank2,
    Rank4,
}

impl Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaterialKind::Scalar => "scalar",
            MaterialKind::Vector => "vector",
            MaterialKind::Rank2 => "rank-2",
            MaterialKind::Rank4 => "rank-4",
        };
        write!(f, "{}", name)
    }
}

/// A fourth-order tensor $\mathbb{C}_{ijkl}$ in three dimensions.
///
/// Stored as a $9 \times 9$ matrix whose row is $3i + j$ and column $3k + l$.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank4Tensor<T: Scalar> {
    components: SMatrix<T, 9, 9>,
}

impl<T: Real> Rank4Tensor<T> {
    pub fn zeros() -> Self {
        Self {
            components: SMatrix::zeros(),
        }
    }

    /// The identity $\mathbb{I}_{ijkl} = \delta_{ik} \delta_{jl}$, satisfying $\mathbb{I} : \vec A = \vec A$.
    pub fn identity() -> Self {
        Self {
            components: SMatrix::identity(),
        }
    }

    pub fn from_matrix(components: SMatrix<T, 9, 9>) -> Self {
        Self { components }
    }

    pub fn as_matrix(&self) -> &SMatrix<T, 9, 9> {
        &self.components
    }

    pub fn get(&self, i: usize, j: usize, k: usize, l: usize) -> T {
        self.components[(3 * i + j, 3 * k + l)]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, l: usize, value: T) {
        self.components[(3 * i + j, 3 * k + l)] = value;
    }

    /// Computes the double contraction $(\mathbb{C} : \vec A)_{ij} = C_{ijkl} A_{kl}$.
    pub fn double_dot(&self, a: &Matrix3<T>) -> Matrix3<T> {
        Matrix3::from_fn(|i, j| {
            let mut sum = T::zero();
            for k in 0..3 {
                for l in 0..3 {
                    sum += self.get(i, j, k, l) * a[(k, l)];
                }
            }
            sum
        })
    }
}

/// Material properties at one integration point, looked up by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Scalar + Deserialize<'de>"))]
pub struct MaterialBundle<T: Scalar> {
    #[serde(default)]
    scalars: FxHashMap<String, T>,
    #[serde(default)]
    vectors: FxHashMap<String, Vector3<T>>,
    #[serde(default)]
    rank2: FxHashMap<String, Matrix3<T>>,
    #[serde(default)]
    rank4: FxHashMap<String, Rank4Tensor<T>>,
}

impl<T: Scalar> Default for MaterialBundle<T> {
    fn default() -> Self {
        Self {
            scalars: FxHashMap::default(),
            vectors: FxHashMap::default(),
            rank2: FxHashMap::default(),
            rank4: FxHashMap::default(),
        }
    }
}

fn lookup<'a, V>(map: &'a FxHashMap<String, V>, kind: MaterialKind, name: &str) -> eyre::Result<&'a V> {
    map.get(name).ok_or_else(|| {
        KernelError::MissingMaterial {
            kind,
            name: name.to_string(),
        }
        .fatal()
    })
}

// Avoids allocating a new key when a property is overwritten, which is the common case when
// a bundle is reused across integration points.
fn insert_or_assign<V>(map: &mut FxHashMap<String, V>, name: &str, value: V) {
    match map.get_mut(name) {
        Some(existing) => *existing = value,
        None => {
            map.insert(name.to_string(), value);
        }
    }
}

impl<T: Real> MaterialBundle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, name: &str, value: T) -> Self {
        self.set_scalar(name, value);
        self
    }

    pub fn with_vector(mut self, name: &str, value: Vector3<T>) -> Self {
        self.set_vector(name, value);
        self
    }

    pub fn with_rank2(mut self, name: &str, value: Matrix3<T>) -> Self {
        self.set_rank2(name, value);
        self
    }

    pub fn with_rank4(mut self, name: &str, value: Rank4Tensor<T>) -> Self {
        self.set_rank4(name, value);
        self
    }

    pub fn set_scalar(&mut self, name: &str, value: T) {
        insert_or_assign(&mut self.scalars, name, value);
    }

    pub fn set_vector(&mut self, name: &str, value: Vector3<T>) {
        insert_or_assign(&mut self.vectors, name, value);
    }

    pub fn set_rank2(&mut self, name: &str, value: Matrix3<T>) {
        insert_or_assign(&mut self.rank2, name, value);
    }

    pub fn set_rank4(&mut self, name: &str, value: Rank4Tensor<T>) {
        insert_or_assign(&mut self.rank4, name, value);
    }

    /// Looks up a scalar property. A missing name is a fatal [`KernelError::MissingMaterial`].
    pub fn scalar(&self, name: &str) -> eyre::Result<T> {
        lookup(&self.scalars, MaterialKind::Scalar, name).copied()
    }

    pub fn vector(&self, name: &str) -> eyre::Result<&Vector3<T>> {
        lookup(&self.vectors, MaterialKind::Vector, name)
    }

    pub fn rank2(&self, name: &str) -> eyre::Result<&Matrix3<T>> {
        lookup(&self.rank2, MaterialKind::Rank2, name)
    }

    pub fn rank4(&self, name: &str) -> eyre::Result<&Rank4Tensor<T>> {
        lookup(&self.rank4, MaterialKind::Rank4, name)
    }

    /// Removes all properties, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.scalars.clear();
        self.vectors.clear();
        self.rank2.clear();
        self.rank4.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.vectors.is_empty() && self.rank2.is_empty() && self.rank4.is_empty()
    }

    /// Copies every property of `other` into `self`, overwriting properties with the same name.
    pub fn extend_from(&mut self, other: &MaterialBundle<T>) {
        self.scalars
            .extend(other.scalars.iter().map(|(k, v)| (k.clone(), *v)));
        self.vectors
            .extend(other.vectors.iter().map(|(k, v)| (k.clone(), *v)));
        self.rank2
            .extend(other.rank2.iter().map(|(k, v)| (k.clone(), *v)));
        self.rank4
            .extend(other.rank4.iter().map(|(k, v)| (k.clone(), *v)));
    }

    /// Fails with [`KernelError::NonFiniteMaterial`] for the first property containing NaN or
    /// infinity.
    pub fn ensure_finite(&self) -> eyre::Result<()> {
        let non_finite = self
            .scalars
            .iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(k, _)| k)
            .or_else(|| {
                self.vectors
                    .iter()
                    .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
                    .map(|(k, _)| k)
            })
            .or_else(|| {
                self.rank2
                    .iter()
                    .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
                    .map(|(k, _)| k)
            })
            .or_else(|| {
                self.rank4
                    .iter()
                    .find(|(_, v)| v.as_matrix().iter().any(|x| !x.is_finite()))
                    .map(|(k, _)| k)
            });

        match non_finite {
            Some(name) => Err(KernelError::NonFiniteMaterial { name: name.clone() }.fatal()),
            None => Ok(()),
        }
    }
}

/// Anything that can answer whether a named material property will be available.
pub trait MaterialKeys {
    fn has_key(&self, kind: MaterialKind, name: &str) -> bool;
}

impl<T: Scalar> MaterialKeys for MaterialBundle<T> {
    fn has_key(&self, kind: MaterialKind, name: &str) -> bool {
        match kind {
            MaterialKind::Scalar => self.scalars.contains_key(name),
            MaterialKind::Vector => self.vectors.contains_key(name),
            MaterialKind::Rank2 => self.rank2.contains_key(name),
            MaterialKind::Rank4 => self.rank4.contains_key(name),
        }
    }
}

impl<K: MaterialKeys + ?Sized> MaterialKeys for &K {
    fn has_key(&self, kind: MaterialKind, name: &str) -> bool {
        K::has_key(self, kind, name)
    }
}

/// Keys are available if either source provides them.
impl<A: MaterialKeys, B: MaterialKeys> MaterialKeys for (A, B) {
    fn has_key(&self, kind: MaterialKind, name: &str) -> bool {
        self.0.has_key(kind, name) || self.1.has_key(kind, name)
    }
}

/// The fixed set of material names a model reads (or a constitutive model writes).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MaterialRequirements {
    pub scalars: &'static [&'static str],
    pub vectors: &'static [&'static str],
    pub rank2: &'static [&'static str],
    pub rank4: &'static [&'static str],
}

impl MaterialRequirements {
    pub const fn scalars(scalars: &'static [&'static str]) -> Self {
        Self {
            scalars,
            vectors: &[],
            rank2: &[],
            rank4: &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialKind, &'static str)> + '_ {
        let tag = |kind: MaterialKind| move |name: &&'static str| (kind, *name);
        self.scalars
            .iter()
            .map(tag(MaterialKind::Scalar))
            .chain(self.vectors.iter().map(tag(MaterialKind::Vector)))
            .chain(self.rank2.iter().map(tag(MaterialKind::Rank2)))
            .chain(self.rank4.iter().map(tag(MaterialKind::Rank4)))
    }

    /// Fails with [`KernelError::MissingMaterial`] for the first required key not provided by
    /// `keys`.
    pub fn check(&self, keys: &impl MaterialKeys) -> eyre::Result<()> {
        match self.iter().find(|(kind, name)| !keys.has_key(*kind, name)) {
            Some((kind, name)) => Err(KernelError::MissingMaterial {
                kind,
                name: name.to_string(),
            }
            .fatal()),
            None => Ok(()),
        }
    }
}

impl MaterialKeys for MaterialRequirements {
    fn has_key(&self, kind: MaterialKind, name: &str) -> bool {
        self.iter().any(|(k, n)| k == kind && n == name)
    }
}
