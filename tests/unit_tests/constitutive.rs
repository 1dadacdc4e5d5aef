use crate::unit_tests::{cahn_hilliard_state, step_info};
use fekernel::constitutive::{CahnHilliardMaterial, ConstitutiveModel, FreeEnergy, Mobility};
use fekernel::context::{OwnedFieldState, QuadraturePointContext};
use fekernel::error::KernelError;
use fekernel::kernel::properties::*;
use fekernel::kernel::CahnHilliardKernel;
use fekernel::kernel::ElementKernel;
use fekernel::materials::MaterialBundle;
use fekernel::optimize::calculus::approximate_derivative_fd;
use matrixcompare::assert_scalar_eq;
use nalgebra::Vector3;
use proptest::prelude::*;

fn evaluate_at(material: &CahnHilliardMaterial<f64>, c: f64) -> eyre::Result<MaterialBundle<f64>> {
    let u = cahn_hilliard_state(c, Vector3::zeros(), 0.0, Vector3::zeros());
    let v = OwnedFieldState::zeros(2);
    let step = step_info(2, [1.0, 1.0]);
    let context = QuadraturePointContext::from_step(&step, Vector3::zeros(), u.view(), v.view());
    let mut materials = MaterialBundle::new();
    material.evaluate(&context, &mut materials)?;
    Ok(materials)
}

#[test]
fn double_well_with_constant_mobility() {
    let material = CahnHilliardMaterial {
        free_energy: FreeEnergy::DoubleWell,
        mobility: Mobility::Constant { m0: 2.0 },
        kappa: 0.5,
    };
    let materials = evaluate_at(&material, 0.25).unwrap();
    assert_eq!(materials.scalar(MOBILITY).unwrap(), 2.0);
    assert_eq!(materials.scalar(MOBILITY_DERIVATIVE).unwrap(), 0.0);
    // F'(c) = 2c(1 - c)(1 - 2c), F''(c) = 2(1 - 6c + 6c^2)
    assert_scalar_eq!(materials.scalar(FREE_ENERGY_DERIVATIVE).unwrap(), 0.1875, comp = abs, tol = 1e-14);
    assert_scalar_eq!(
        materials.scalar(FREE_ENERGY_SECOND_DERIVATIVE).unwrap(),
        -0.25,
        comp = abs,
        tol = 1e-14
    );
    assert_eq!(materials.scalar(GRADIENT_COEFFICIENT).unwrap(), 0.5);
}

#[test]
fn evaluated_properties_satisfy_kernel_requirements() {
    let material = CahnHilliardMaterial {
        free_energy: FreeEnergy::FloryHuggins { chi: 2.5 },
        mobility: Mobility::Degenerate { d: 1.0 },
        kappa: 1e-3,
    };
    let materials = evaluate_at(&material, 0.3).unwrap();
    let requirements = ElementKernel::<f64>::material_requirements(&CahnHilliardKernel);
    requirements.check(&materials).unwrap();
    requirements.check(&material.provides()).unwrap();
}

#[test]
fn flory_huggins_outside_unit_interval_is_fatal() {
    let material = CahnHilliardMaterial {
        free_energy: FreeEnergy::FloryHuggins { chi: 2.0 },
        mobility: Mobility::Constant { m0: 1.0 },
        kappa: 1.0,
    };
    let err = evaluate_at(&material, 1.0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KernelError>(),
        Some(KernelError::NonFiniteMaterial { .. })
    ));
}

#[test]
fn evaluation_keeps_unrelated_properties() {
    let material = CahnHilliardMaterial {
        free_energy: FreeEnergy::DoubleWell,
        mobility: Mobility::Constant { m0: 1.0 },
        kappa: 1.0,
    };
    let u = cahn_hilliard_state(0.5, Vector3::zeros(), 0.0, Vector3::zeros());
    let v = OwnedFieldState::zeros(2);
    let step = step_info(2, [1.0, 1.0]);
    let context = QuadraturePointContext::from_step(&step, Vector3::zeros(), u.view(), v.view());
    let mut materials = MaterialBundle::new().with_scalar("T", 300.0);
    material.evaluate(&context, &mut materials).unwrap();
    assert_eq!(materials.scalar("T").unwrap(), 300.0);
}

proptest! {
    #[test]
    fn analytic_derivatives_match_finite_differences(
        material in any::<CahnHilliardMaterial<f64>>(),
        c in 0.1 .. 0.9,
    ) {
        let h = 1e-6;
        let dfdc = |c| material.free_energy.derivatives(c).0;
        let d2fdc2 = material.free_energy.derivatives(c).1;
        let fd = approximate_derivative_fd(dfdc, c, h);
        prop_assert!((fd - d2fdc2).abs() <= 1e-5 * (1.0 + d2fdc2.abs()));

        let m = |c| material.mobility.evaluate(c).0;
        let dmdc = material.mobility.evaluate(c).1;
        let fd = approximate_derivative_fd(m, c, h);
        prop_assert!((fd - dmdc).abs() <= 1e-5 * (1.0 + dmdc.abs()));
    }
}
