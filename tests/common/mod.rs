//! Shared fixtures: chain structures, partitioned layouts and an in-process
//! ghost exchange standing in for the parallel one.
#![allow(dead_code)]

use ariadne::field::LagrangianField;
use ariadne::index_map::LevelLayout;
use ariadne::structure::LevelStructure;
use ariadne::types::{BeamSpec, SpringSpec, TargetPointSpec};
use nalgebra::Vector3;
use ndarray::Array2;
use std::ops::Range;

// ─────────────────────────────────────────────────────────────
//  Fields
// ─────────────────────────────────────────────────────────────

pub fn positions(points: &[[f64; 3]]) -> Array2<f64> {
    let mut a = Array2::zeros((points.len(), 3));
    for (i, p) in points.iter().enumerate() {
        for d in 0..3 {
            a[[i, d]] = p[d];
        }
    }
    a
}

pub fn serial_field(points: &[[f64; 3]]) -> LagrangianField {
    LagrangianField::serial(positions(points))
}

pub fn row(values: &Array2<f64>, i: usize) -> Vector3<f64> {
    Vector3::new(values[[i, 0]], values[[i, 1]], values[[i, 2]])
}

// ─────────────────────────────────────────────────────────────
//  Chain fixture
// ─────────────────────────────────────────────────────────────

/// Rest shape of an `n`-marker chain along x with a gentle wave.
///
///     0 ── 1 ── 2 ── … ── n−1        springs between neighbours,
///     └─── beam (i−1, i, i+1) ──┘    target points on both ends
pub fn chain_rest_positions(n: usize) -> Array2<f64> {
    let mut x = Array2::zeros((n, 3));
    for i in 0..n {
        let s = i as f64;
        x[[i, 0]] = s;
        x[[i, 1]] = 0.1 * (0.7 * s).sin();
        x[[i, 2]] = 0.05 * (1.3 * s).cos();
    }
    x
}

/// Rest shape perturbed off equilibrium, deterministically.
pub fn chain_perturbed_positions(n: usize) -> Array2<f64> {
    let mut x = chain_rest_positions(n);
    for i in 0..n {
        let s = i as f64;
        x[[i, 0]] += 0.03 * (2.1 * s).sin();
        x[[i, 1]] += 0.02 * (1.7 * s + 0.3).cos();
        x[[i, 2]] -= 0.04 * (0.9 * s).sin();
    }
    x
}

pub fn chain_springs(n: usize) -> Vec<SpringSpec> {
    (0..n - 1)
        .map(|i| SpringSpec::linear(i, i + 1, 1.0 + 0.1 * i as f64, 0.9))
        .collect()
}

pub fn chain_beams(n: usize) -> Vec<BeamSpec> {
    (1..n - 1)
        .map(|i| {
            BeamSpec::new(i - 1, i, i + 1, 0.5)
                .with_curvature(Vector3::new(0.0, 0.01 * i as f64, 0.0))
        })
        .collect()
}

pub fn chain_target_points(n: usize) -> Vec<TargetPointSpec> {
    let x = chain_rest_positions(n);
    vec![
        TargetPointSpec::new(0, 10.0, 0.5, row(&x, 0)),
        TargetPointSpec::new(n - 1, 10.0, 0.5, row(&x, n - 1)),
    ]
}

pub fn serial_chain_structure(n: usize) -> LevelStructure {
    LevelStructure::new(LevelLayout::serial(n))
        .with_springs(chain_springs(n))
        .with_beams(chain_beams(n))
        .with_target_points(chain_target_points(n))
}

// ─────────────────────────────────────────────────────────────
//  Partitioning
// ─────────────────────────────────────────────────────────────

/// Global index of Lagrangian marker `lag`: the chain is numbered backwards
/// so that the two index spaces differ.
pub fn global_of(n: usize, lag: usize) -> usize {
    n - 1 - lag
}

/// Contiguous block of global indices owned by `rank`.
pub fn owned_block(n: usize, rank: usize, num_ranks: usize) -> Range<usize> {
    let base = n / num_ranks;
    let extra = n % num_ranks;
    let start = rank * base + rank.min(extra);
    let len = base + usize::from(rank < extra);
    start..start + len
}

/// The chain as seen by `rank`: every spec goes to the rank owning its
/// master marker (the marker itself for target points).
pub fn partitioned_chain_structure(n: usize, rank: usize, num_ranks: usize) -> LevelStructure {
    let owned = owned_block(n, rank, num_ranks);
    let markers = (0..n).map(|lag| (lag, global_of(n, lag))).collect();
    let mine = |lag: usize| owned.contains(&global_of(n, lag));

    LevelStructure::new(LevelLayout::new(owned.clone(), n, markers))
        .with_springs(chain_springs(n).into_iter().filter(|s| mine(s.master)))
        .with_beams(chain_beams(n).into_iter().filter(|b| mine(b.master)))
        .with_target_points(chain_target_points(n).into_iter().filter(|t| mine(t.marker)))
}

/// Lagrangian-ordered values rearranged into global order.
pub fn to_global_order(n: usize, lagrangian_values: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(lagrangian_values.raw_dim());
    for lag in 0..n {
        let g = global_of(n, lag);
        for d in 0..lagrangian_values.ncols() {
            out[[g, d]] = lagrangian_values[[lag, d]];
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────
//  Ghost exchange  (single address space)
// ─────────────────────────────────────────────────────────────

/// Fill owned and ghost rows of `field` from a global-order array.
pub fn gather(field: &mut LagrangianField, global: &Array2<f64>) {
    for local in 0..field.num_local() {
        let g = field.global_index(local);
        for d in 0..field.depth() {
            field.values_mut()[[local, d]] = global[[g, d]];
        }
    }
}

/// Sum owned and ghost rows of `field` into a global-order array.
pub fn scatter_add(field: &LagrangianField, global: &mut Array2<f64>) {
    for local in 0..field.num_local() {
        let g = field.global_index(local);
        for d in 0..field.depth() {
            global[[g, d]] += field.values()[[local, d]];
        }
    }
}
