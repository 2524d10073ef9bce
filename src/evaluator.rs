//! Force and energy kernels for springs, beams and target points.
//!
//! All force kernels *add* into the output field.  Specs are visited in
//! declaration order, so repeated calls with identical input produce
//! bit-identical output.

use crate::field::LagrangianField;
use crate::level_data::{BeamData, SpringData, TargetPointData};
use crate::registry::{ForceLawRegistry, SpringForceLaw};
use crate::types::{ForceGenError, Result};

// ─────────────────────────────────────────────────────────────
//  Force-law resolution
// ─────────────────────────────────────────────────────────────

/// Look up the force law of every spring, failing on the first
/// unregistered key before any output is touched.
pub fn resolve_spring_laws(
    registry: &ForceLawRegistry,
    springs: &SpringData,
    level: usize,
) -> Result<Vec<SpringForceLaw>> {
    springs
        .force_keys
        .iter()
        .enumerate()
        .map(|(spring, &key)| {
            registry
                .get(key)
                .copied()
                .ok_or(ForceGenError::UnregisteredForceLaw { level, spring, key })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────
//  Springs
// ─────────────────────────────────────────────────────────────

/// F_master += T(R) D / R,  F_slave −= T(R) D / R,  with D = X_slave − X_master.
///
/// Springs with zero stiffness, or shorter than `zero_length_tolerance`,
/// contribute nothing.
pub fn compute_spring_force(
    f: &mut LagrangianField,
    x: &LagrangianField,
    springs: &SpringData,
    laws: &[SpringForceLaw],
    zero_length_tolerance: f64,
) {
    for k in 0..springs.len() {
        let params = &springs.parameters[k];
        if params.stiffness() == 0.0 {
            continue;
        }
        let m = springs.local_master[k];
        let s = springs.local_slave[k];

        let d = x.vector(s) - x.vector(m);
        let r = d.norm();
        if r <= zero_length_tolerance {
            continue;
        }

        let tension = (laws[k].force)(
            r,
            params,
            springs.lagrangian_master[k],
            springs.lagrangian_slave[k],
        );
        let f_master = d * (tension / r);
        f.add_vector(m, &f_master);
        f.add_vector(s, &(-f_master));
    }
}

pub fn compute_spring_energy(
    x: &LagrangianField,
    springs: &SpringData,
    laws: &[SpringForceLaw],
    quadrature_intervals: usize,
) -> f64 {
    let mut energy = 0.0;
    for k in 0..springs.len() {
        let params = &springs.parameters[k];
        if params.stiffness() == 0.0 {
            continue;
        }
        let r = (x.vector(springs.local_slave[k]) - x.vector(springs.local_master[k])).norm();
        energy += laws[k].potential(
            r,
            params,
            springs.lagrangian_master[k],
            springs.lagrangian_slave[k],
            quadrature_intervals,
        );
    }
    energy
}

// ─────────────────────────────────────────────────────────────
//  Beams
// ─────────────────────────────────────────────────────────────

/// With B = K (X_next + X_prev − 2 X_master − c):
///   F_master += 2B,  F_prev −= B,  F_next −= B.
pub fn compute_beam_force(f: &mut LagrangianField, x: &LagrangianField, beams: &BeamData) {
    for k in 0..beams.len() {
        let rigidity = beams.rigidities[k];
        if rigidity == 0.0 {
            continue;
        }
        let p = beams.local_prev[k];
        let m = beams.local_master[k];
        let n = beams.local_next[k];

        let d2x = x.vector(n) + x.vector(p) - 2.0 * x.vector(m) - beams.curvatures[k];
        let b = rigidity * d2x;
        f.add_vector(m, &(2.0 * b));
        f.add_vector(p, &(-b));
        f.add_vector(n, &(-b));
    }
}

pub fn compute_beam_energy(x: &LagrangianField, beams: &BeamData) -> f64 {
    let mut energy = 0.0;
    for k in 0..beams.len() {
        let rigidity = beams.rigidities[k];
        if rigidity == 0.0 {
            continue;
        }
        let d2x = x.vector(beams.local_next[k]) + x.vector(beams.local_prev[k])
            - 2.0 * x.vector(beams.local_master[k])
            - beams.curvatures[k];
        energy += 0.5 * rigidity * d2x.norm_squared();
    }
    energy
}

// ─────────────────────────────────────────────────────────────
//  Target points
// ─────────────────────────────────────────────────────────────

/// F += −κ (X − X₀) − η U.  The η term is dropped when `u` is `None`.
///
/// Returns the largest displacement |X − X₀| over the target points.
pub fn compute_target_point_force(
    f: &mut LagrangianField,
    x: &LagrangianField,
    u: Option<&LagrangianField>,
    targets: &TargetPointData,
) -> f64 {
    let mut max_displacement = 0.0_f64;
    for k in 0..targets.len() {
        let l = targets.local[k];
        let displacement = x.vector(l) - targets.targets[k];
        max_displacement = max_displacement.max(displacement.norm());

        let kappa = targets.stiffness[k];
        let eta = targets.damping[k];
        if kappa == 0.0 && eta == 0.0 {
            continue;
        }

        let mut force = -kappa * displacement;
        if eta != 0.0 {
            if let Some(u) = u {
                force -= eta * u.vector(l);
            }
        }
        f.add_vector(l, &force);
    }
    max_displacement
}

pub fn compute_target_point_energy(x: &LagrangianField, targets: &TargetPointData) -> f64 {
    let mut energy = 0.0;
    for k in 0..targets.len() {
        let kappa = targets.stiffness[k];
        if kappa == 0.0 {
            continue;
        }
        let displacement = x.vector(targets.local[k]) - targets.targets[k];
        energy += 0.5 * kappa * displacement.norm_squared();
    }
    energy
}
