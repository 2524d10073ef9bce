//! Force and energy properties of springs, beams and target points on a
//! single process.
//!
//! Every test builds a tiny structure on level 0 with the serial layout
//! (Lagrangian index = global index = local row), evaluates it, and checks
//! closed-form results.

mod common;

use approx::assert_relative_eq;
use ariadne::config::ForceGenConfig;
use ariadne::field::LagrangianField;
use ariadne::force_gen::StandardForceGen;
use ariadne::index_map::LevelLayout;
use ariadne::registry::SpringForceLaw;
use ariadne::structure::{LevelStructure, StructureTopology};
use ariadne::types::*;
use common::{serial_chain_structure, serial_field};
use nalgebra::Vector3;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn serial_engine(structure: LevelStructure) -> StandardForceGen {
    let topology = StructureTopology::new().with_level(0, structure);
    let mut gen = StandardForceGen::default();
    gen.initialize_level_data(0, 0.0, true, &topology).unwrap();
    gen
}

fn force_of(gen: &StandardForceGen, x: &LagrangianField, u: Option<&LagrangianField>) -> LagrangianField {
    let mut f = gen.create_ghosted_field(0, NDIM).unwrap();
    gen.compute_force(&mut f, x, u, 0, 0.0).unwrap();
    f
}

/// T = 2k (R − L): twice as stiff as the default law.
fn doubled_linear_tension(r: f64, p: &SpringParameters, _m: usize, _s: usize) -> f64 {
    2.0 * p.stiffness() * (r - p.rest_length())
}

/// Linear tension, registered without a closed-form energy.
fn plain_linear_tension(r: f64, p: &SpringParameters, _m: usize, _s: usize) -> f64 {
    p.stiffness() * (r - p.rest_length())
}

// ─────────────────────────────────────────────────────────────
//  Springs
// ─────────────────────────────────────────────────────────────

/// Single linear spring, rest length 0:
///
///     E = ½ k |X1 − X0|²,   F0 = k (X1 − X0),   F1 = −k (X1 − X0)
#[test]
fn linear_spring_energy_and_force() {
    let k = 3.0;
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(2)).with_springs([SpringSpec::linear(0, 1, k, 0.0)]),
    );
    let x = serial_field(&[[0.5, -1.0, 2.0], [1.5, 1.0, 4.0]]);
    let d = Vector3::new(1.0, 2.0, 2.0);

    let energy = gen.compute_energy(&x, None, 0, 0.0).unwrap();
    assert_relative_eq!(energy, 0.5 * k * d.norm_squared(), epsilon = 1e-12);

    let f = force_of(&gen, &x, None);
    let f0 = f.vector(0);
    let f1 = f.vector(1);
    for i in 0..3 {
        assert_relative_eq!(f0[i], k * d[i], epsilon = 1e-12);
        assert_relative_eq!(f1[i], -k * d[i], epsilon = 1e-12);
    }
}

#[test]
fn zero_stiffness_spring_contributes_nothing() {
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(3)).with_springs([
            SpringSpec::linear(0, 1, 0.0, 0.25),
            SpringSpec::linear(1, 2, 0.0, 4.0),
        ]),
    );
    let x = serial_field(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-2.0, 0.5, 1.0]]);

    let f = force_of(&gen, &x, None);
    assert!(f.values().iter().all(|&v| v == 0.0));
    assert_eq!(gen.compute_energy(&x, None, 0, 0.0).unwrap(), 0.0);
}

#[test]
fn springs_are_canonicalized() {
    let a = SpringSpec::linear(5, 2, 1.0, 0.5);
    let b = SpringSpec::linear(2, 5, 1.0, 0.5);
    assert_eq!((a.master, a.slave), (2, 5));
    assert_eq!(a, b);

    // A hand-built spec with endpoints swapped is stored canonically.
    let swapped = SpringSpec {
        master: 2,
        slave: 0,
        force_key: DEFAULT_SPRING_FORCE_KEY,
        params: SpringParameters::new(1.0, 0.5),
    };
    let gen = serial_engine(LevelStructure::new(LevelLayout::serial(3)).with_springs([swapped]));
    let springs = &gen.level_data(0).unwrap().springs;
    assert_eq!(springs.spec(0), SpringSpec::linear(0, 2, 1.0, 0.5));
}

#[test]
fn compute_force_accumulates() {
    let n = 6;
    let gen = serial_engine(serial_chain_structure(n));
    let x = LagrangianField::serial(common::chain_perturbed_positions(n));

    let once = force_of(&gen, &x, None);
    let mut twice = force_of(&gen, &x, None);
    gen.compute_force(&mut twice, &x, None, 0, 0.0).unwrap();

    for (a, b) in once.values().iter().zip(twice.values().iter()) {
        assert_relative_eq!(2.0 * a, *b, epsilon = 1e-12, max_relative = 1e-12);
    }
}

#[test]
fn repeated_evaluation_is_bit_identical() {
    let n = 9;
    let gen = serial_engine(serial_chain_structure(n));
    let x = LagrangianField::serial(common::chain_perturbed_positions(n));

    let a = force_of(&gen, &x, None);
    let b = force_of(&gen, &x, None);
    assert_eq!(a.values(), b.values());
    assert_eq!(
        gen.compute_energy(&x, None, 0, 0.0).unwrap().to_bits(),
        gen.compute_energy(&x, None, 0, 0.0).unwrap().to_bits()
    );
}

#[test]
fn internal_forces_sum_to_zero() {
    // Springs and beams exchange momentum only between their own markers.
    let n = 7;
    let structure = LevelStructure::new(LevelLayout::serial(n))
        .with_springs(common::chain_springs(n))
        .with_beams(common::chain_beams(n));
    let gen = serial_engine(structure);
    let x = LagrangianField::serial(common::chain_perturbed_positions(n));

    let f = force_of(&gen, &x, None);
    let total = (0..n).fold(Vector3::zeros(), |acc, i| acc + f.vector(i));
    assert_relative_eq!(total.norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn zero_length_spring_is_skipped() {
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(2)).with_springs([SpringSpec::linear(0, 1, 5.0, 1.0)]),
    );
    let x = serial_field(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
    let f = force_of(&gen, &x, None);
    assert!(f.values().iter().all(|&v| v == 0.0));
}

#[test]
fn overriding_the_default_law_changes_the_force() {
    let structure =
        LevelStructure::new(LevelLayout::serial(2)).with_springs([SpringSpec::linear(0, 1, 1.5, 0.5)]);
    let x = serial_field(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);

    let gen = serial_engine(structure.clone());
    let before = force_of(&gen, &x, None);

    let mut gen = serial_engine(structure);
    gen.register_spring_force_function(DEFAULT_SPRING_FORCE_KEY, doubled_linear_tension, None);
    let after = force_of(&gen, &x, None);

    assert_relative_eq!(before.vector(0)[0], 1.5 * 1.5, epsilon = 1e-12);
    assert_relative_eq!(after.vector(0)[0], 2.0 * before.vector(0)[0], epsilon = 1e-12);
}

#[test]
fn energy_falls_back_to_integrated_tension() {
    // Simpson's rule is exact for a linear tension.
    let key = 3;
    let (k, rest) = (2.5, 0.75);
    let mut gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(2))
            .with_springs([SpringSpec::new(0, 1, key, SpringParameters::new(k, rest))]),
    );
    gen.register_spring_force_function(key, plain_linear_tension, None);
    assert!(gen.registry().get(key).unwrap().energy.is_none());

    for r in [0.2, 0.75, 1.9] {
        let x = serial_field(&[[0.0, 0.0, 0.0], [0.0, r, 0.0]]);
        let energy = gen.compute_energy(&x, None, 0, 0.0).unwrap();
        assert_relative_eq!(energy, 0.5 * k * (r - rest) * (r - rest), epsilon = 1e-12);
    }
}

#[test]
fn registered_energy_is_used_when_present() {
    fn constant_energy(_r: f64, _p: &SpringParameters, _m: usize, _s: usize) -> f64 {
        42.0
    }
    let key = 9;
    let mut gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(2))
            .with_springs([SpringSpec::new(0, 1, key, SpringParameters::new(1.0, 0.0))]),
    );
    gen.register_spring_force_law(key, SpringForceLaw::new(plain_linear_tension).with_energy(constant_energy));

    let x = serial_field(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
    assert_eq!(gen.compute_energy(&x, None, 0, 0.0).unwrap(), 42.0);
}

// ─────────────────────────────────────────────────────────────
//  Beams
// ─────────────────────────────────────────────────────────────

/// Bent beam (p, m, n) = (0,0,0), (1,1,0), (2,0,0) with K = 2, c = 0:
///
///     X_n + X_p − 2 X_m = (0, −2, 0)   →   B = (0, −4, 0)
///     F_m = 2B = (0, −8, 0),   F_p = F_n = −B = (0, 4, 0)
#[test]
fn bent_beam_force() {
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(3)).with_beams([BeamSpec::new(0, 1, 2, 2.0)]),
    );
    let x = serial_field(&[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 0.0, 0.0]]);
    let f = force_of(&gen, &x, None);

    assert_relative_eq!(f.vector(1)[1], -8.0, epsilon = 1e-12);
    assert_relative_eq!(f.vector(0)[1], 4.0, epsilon = 1e-12);
    assert_relative_eq!(f.vector(2)[1], 4.0, epsilon = 1e-12);
    assert_relative_eq!(gen.compute_energy(&x, None, 0, 0.0).unwrap(), 0.5 * 2.0 * 4.0, epsilon = 1e-12);
}

#[test]
fn beam_at_target_curvature_is_relaxed() {
    let curvature = Vector3::new(0.0, -2.0, 0.0);
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(3))
            .with_beams([BeamSpec::new(0, 1, 2, 2.0).with_curvature(curvature)]),
    );
    let x = serial_field(&[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 0.0, 0.0]]);
    let f = force_of(&gen, &x, None);
    assert!(f.values().iter().all(|v| v.abs() < 1e-14));
}

#[test]
fn zero_rigidity_beam_contributes_nothing() {
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(3)).with_beams([BeamSpec::new(0, 1, 2, 0.0)]),
    );
    let x = serial_field(&[[0.0, 0.0, 0.0], [1.0, 3.0, 0.0], [2.0, 0.0, -1.0]]);
    let f = force_of(&gen, &x, None);
    assert!(f.values().iter().all(|&v| v == 0.0));
    assert_eq!(gen.compute_energy(&x, None, 0, 0.0).unwrap(), 0.0);
}

// ─────────────────────────────────────────────────────────────
//  Target points
// ─────────────────────────────────────────────────────────────

#[test]
fn undamped_target_point_ignores_velocity() {
    let kappa = 4.0;
    let target = Vector3::new(1.0, 2.0, 3.0);
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(1))
            .with_target_points([TargetPointSpec::new(0, kappa, 0.0, target)]),
    );
    let x = serial_field(&[[1.5, 1.0, 3.25]]);
    let u = serial_field(&[[10.0, -20.0, 30.0]]);

    let with_u = force_of(&gen, &x, Some(&u));
    let without_u = force_of(&gen, &x, None);
    let expected = -kappa * (x.vector(0) - target);
    for i in 0..3 {
        assert_eq!(with_u.vector(0)[i], expected[i]);
        assert_eq!(without_u.vector(0)[i], expected[i]);
    }
}

#[test]
fn damped_target_point_uses_velocity_when_available() {
    let (kappa, eta) = (2.0, 0.5);
    let target = Vector3::zeros();
    let gen = serial_engine(
        LevelStructure::new(LevelLayout::serial(1))
            .with_target_points([TargetPointSpec::new(0, kappa, eta, target)]),
    );
    let x = serial_field(&[[1.0, 0.0, 0.0]]);
    let u = serial_field(&[[0.0, 4.0, 0.0]]);

    let f = force_of(&gen, &x, Some(&u));
    assert_relative_eq!(f.vector(0)[0], -2.0, epsilon = 1e-12);
    assert_relative_eq!(f.vector(0)[1], -2.0, epsilon = 1e-12);

    // No velocity field: damping term is zero.
    let f = force_of(&gen, &x, None);
    assert_relative_eq!(f.vector(0)[1], 0.0, epsilon = 1e-12);

    // Energy only sees the position penalty.
    assert_relative_eq!(gen.compute_energy(&x, Some(&u), 0, 0.0).unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn displacement_logging_does_not_change_forces() {
    let n = 5;
    let config = ForceGenConfig {
        log_target_point_displacements: true,
        ..ForceGenConfig::default()
    };
    let topology = StructureTopology::new().with_level(0, serial_chain_structure(n));
    let mut logged = StandardForceGen::new(config).unwrap();
    logged.initialize_level_data(0, 0.0, true, &topology).unwrap();
    let plain = serial_engine(serial_chain_structure(n));

    let x = LagrangianField::serial(common::chain_perturbed_positions(n));
    assert_eq!(force_of(&logged, &x, None).values(), force_of(&plain, &x, None).values());
}
