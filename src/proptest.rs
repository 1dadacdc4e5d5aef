//! Strategies for property-based testing of kernels.
use crate::constitutive::{CahnHilliardMaterial, FreeEnergy, Mobility};
use crate::context::{OwnedFieldState, ShapeFunction};
use crate::dof::DofIndex;
use ::proptest::prelude::*;
use nalgebra::Vector3;

pub fn vector3() -> impl Strategy<Value = Vector3<f64>> {
    // Keep magnitudes moderate so that finite difference checks stay well conditioned
    let range = -2.0..2.0;
    [range.clone(), range.clone(), range].prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

pub fn shape_function() -> impl Strategy<Value = ShapeFunction<f64>> {
    (0.0..1.0, vector3()).prop_map(|(value, gradient)| ShapeFunction::new(value, gradient))
}

/// Field state for `num_dofs` fields. The first field stays inside `(0.1, 0.9)`, so that it is
/// a valid concentration for every free energy in this crate.
pub fn field_state(num_dofs: usize) -> impl Strategy<Value = OwnedFieldState<f64>> {
    let values = ::proptest::collection::vec(-1.0..1.0, num_dofs);
    let gradients = ::proptest::collection::vec(vector3(), num_dofs);
    (0.1..0.9, values, gradients).prop_map(move |(first, values, gradients)| {
        let mut state = OwnedFieldState::zeros(num_dofs);
        for (i, (value, gradient)) in values.into_iter().zip(gradients).enumerate() {
            let dof = DofIndex::from_one_based(i + 1);
            let value = if i == 0 { first } else { value };
            state.set(dof, value, gradient);
        }
        state
    })
}

pub fn free_energy() -> impl Strategy<Value = FreeEnergy<f64>> {
    prop_oneof![
        Just(FreeEnergy::DoubleWell),
        (0.0..3.0).prop_map(|chi| FreeEnergy::FloryHuggins { chi }),
    ]
}

pub fn mobility() -> impl Strategy<Value = Mobility<f64>> {
    prop_oneof![
        (0.1..2.0).prop_map(|m0| Mobility::Constant { m0 }),
        (0.1..2.0).prop_map(|d| Mobility::Degenerate { d }),
    ]
}

impl Arbitrary for CahnHilliardMaterial<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (free_energy(), mobility(), 1e-3..1.0)
            .prop_map(|(free_energy, mobility, kappa)| CahnHilliardMaterial {
                free_energy,
                mobility,
                kappa,
            })
            .boxed()
    }
}
