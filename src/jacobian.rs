//! Force Jacobian: nonzero structure and block assembly.
//!
//! The Jacobian is stored in 3×3 blocks indexed by global marker index.
//! Every spec couples each of its markers to every other one, plus the
//! self block on each marker's own row:
//!
//! ```text
//!   spring (m, s)        beam (p, m, n)          target point (t)
//!   ┌ mm  ms ┐          ┌ pp  pm  pn ┐          ┌ tt ┐
//!   └ sm  ss ┘          │ mp  mm  mn │          └    ┘
//!                        └ np  nm  nn ┘
//! ```
//!
//! Assembly follows a two-phase protocol.  Contributions may be flushed any
//! number of times (several generators writing into one matrix) before a
//! final assembly makes the matrix usable:
//!
//! ```text
//!   Unbuilt ──structure──▶ StructureKnown ──final──▶ ValuesAssembled
//!      ▲                      │   ▲ flush                  │
//!      └──── reinitialise ────┴───┴───────── assemble ─────┘
//! ```

use crate::field::LagrangianField;
use crate::level_data::{BeamData, LevelForceData, SpringData, TargetPointData};
use crate::registry::{SpringForceFn, SpringForceLaw};
use crate::types::{ForceGenError, Result, SpringParameters, NDIM};
use nalgebra::{Matrix3, Vector3};
use sprs::{CsMat, TriMat};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::warn;

// ─────────────────────────────────────────────────────────────
//  Assembly protocol
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianState {
    Unbuilt,
    StructureKnown,
    ValuesAssembled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Intermediate flush; more contributions will follow.
    Flush,
    /// Last contribution; the matrix is ready for use afterwards.
    Final,
}

/// Destination of Jacobian blocks.  Blocks are *added*; rows owned by
/// another process are expected to be forwarded by the implementation.
pub trait JacobianSink {
    fn add_block(&mut self, row: usize, col: usize, block: &Matrix3<f64>);

    fn assemble(&mut self, mode: AssemblyMode);
}

// ─────────────────────────────────────────────────────────────
//  Nonzero structure
// ─────────────────────────────────────────────────────────────

/// Per owned block row: couplings to other owned markers (`diagonal`) and to
/// markers owned elsewhere (`off_diagonal`).  A row's own block is not
/// counted; it is always present.  Counts are upper bounds: repeated
/// couplings are counted once per spec.
///
/// Specs evaluated here also write blocks into rows owned by other
/// processes (the slave row of a spring whose slave is remote).  Those
/// couplings are kept in `remote` as global row → global columns, and the
/// owner folds them in with [`NonzeroStructure::absorb_remote`] after the
/// exchange, the same way ghost force rows are summed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonzeroStructure {
    pub owned: Range<usize>,
    pub diagonal: Vec<usize>,
    pub off_diagonal: Vec<usize>,
    pub remote: BTreeMap<usize, Vec<usize>>,
}

impl NonzeroStructure {
    pub fn num_rows(&self) -> usize {
        self.diagonal.len()
    }

    /// Σ (diagonal + off-diagonal) over owned rows.
    pub fn total(&self) -> usize {
        self.diagonal.iter().sum::<usize>() + self.off_diagonal.iter().sum::<usize>()
    }

    /// Couplings recorded for rows owned elsewhere.
    pub fn remote_total(&self) -> usize {
        self.remote.values().map(Vec::len).sum()
    }

    /// Blocks to preallocate, own blocks included.
    pub fn block_capacity(&self) -> usize {
        self.total() + self.num_rows()
    }

    /// Fold another process's remote couplings into the owned rows.  Rows
    /// outside `owned` are ignored.
    pub fn absorb_remote(&mut self, remote: &BTreeMap<usize, Vec<usize>>) {
        for (row, cols) in remote.range(self.owned.clone()) {
            let r = row - self.owned.start;
            for col in cols {
                if self.owned.contains(col) {
                    self.diagonal[r] += 1;
                } else {
                    self.off_diagonal[r] += 1;
                }
            }
        }
    }
}

pub fn compute_nonzero_structure(data: &LevelForceData) -> NonzeroStructure {
    let map = &data.index_map;
    let n_owned = map.num_owned();
    let mut structure = NonzeroStructure {
        owned: map.owned(),
        diagonal: vec![0; n_owned],
        off_diagonal: vec![0; n_owned],
        remote: BTreeMap::new(),
    };

    let mut couple = |row: usize, col: usize| {
        if !map.is_owned(row) {
            structure.remote.entry(row).or_default().push(col);
            return;
        }
        let r = row - map.owned().start;
        if map.is_owned(col) {
            structure.diagonal[r] += 1;
        } else {
            structure.off_diagonal[r] += 1;
        }
    };

    let springs = &data.springs;
    for k in 0..springs.len() {
        couple(springs.global_master[k], springs.global_slave[k]);
        couple(springs.global_slave[k], springs.global_master[k]);
    }

    let beams = &data.beams;
    for k in 0..beams.len() {
        let nodes = [beams.global_prev[k], beams.global_master[k], beams.global_next[k]];
        for (i, &row) in nodes.iter().enumerate() {
            for (j, &col) in nodes.iter().enumerate() {
                if i != j {
                    couple(row, col);
                }
            }
        }
    }

    structure
}

// ─────────────────────────────────────────────────────────────
//  Block kernels
// ─────────────────────────────────────────────────────────────

/// Derivative function of every spring, failing on the first law without
/// one before any block is written.  Springs with zero stiffness never
/// need one.
pub fn require_spring_derivatives(
    springs: &SpringData,
    laws: &[SpringForceLaw],
    level: usize,
) -> Result<Vec<SpringForceFn>> {
    laws.iter()
        .enumerate()
        .map(|(spring, law)| match law.derivative {
            Some(derivative) => Ok(derivative),
            // Zero-stiffness springs are skipped during assembly.
            None if springs.parameters[spring].stiffness() == 0.0 => {
                Ok(zero_derivative as SpringForceFn)
            }
            None => Err(ForceGenError::MissingDerivative {
                level,
                spring,
                key: springs.force_keys[spring],
            }),
        })
        .collect()
}

fn zero_derivative(_length: f64, _params: &SpringParameters, _master: usize, _slave: usize) -> f64 {
    0.0
}

/// With K = (T/R) I + (dT/dR − T/R) D Dᵀ / R²:
///   (m,s), (s,m) += X_coef K;   (m,m), (s,s) −= X_coef K.
pub fn assemble_spring_jacobian(
    sink: &mut dyn JacobianSink,
    x_coef: f64,
    x: &LagrangianField,
    springs: &SpringData,
    laws: &[SpringForceLaw],
    derivatives: &[SpringForceFn],
    zero_length_tolerance: f64,
    level: usize,
) {
    for k in 0..springs.len() {
        let params = &springs.parameters[k];
        if params.stiffness() == 0.0 {
            continue;
        }
        let d = x.vector(springs.local_slave[k]) - x.vector(springs.local_master[k]);
        let r = d.norm();
        if r <= zero_length_tolerance {
            warn!(level, spring = k, length = r, "skipping zero-length spring in Jacobian");
            continue;
        }

        let lag_m = springs.lagrangian_master[k];
        let lag_s = springs.lagrangian_slave[k];
        let tension = (laws[k].force)(r, params, lag_m, lag_s);
        let stiffness = (derivatives[k])(r, params, lag_m, lag_s);

        let block = x_coef * spring_block(&d, r, tension, stiffness);
        let (m, s) = (springs.global_master[k], springs.global_slave[k]);
        sink.add_block(m, s, &block);
        sink.add_block(s, m, &block);
        sink.add_block(m, m, &(-block));
        sink.add_block(s, s, &(-block));
    }
}

/// ∂F_master / ∂X_slave for a central spring with tension T and dT/dR.
#[inline]
fn spring_block(d: &Vector3<f64>, r: f64, tension: f64, stiffness: f64) -> Matrix3<f64> {
    let t_over_r = tension / r;
    Matrix3::identity() * t_over_r + (d * d.transpose()) * ((stiffness - t_over_r) / (r * r))
}

/// Stencil c = (1, −2, 1) on (prev, master, next):  block (i,j) = −X_coef K cᵢ cⱼ I.
pub fn assemble_beam_jacobian(sink: &mut dyn JacobianSink, x_coef: f64, beams: &BeamData) {
    const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];
    for k in 0..beams.len() {
        let rigidity = beams.rigidities[k];
        if rigidity == 0.0 {
            continue;
        }
        let nodes = [beams.global_prev[k], beams.global_master[k], beams.global_next[k]];
        for (i, &row) in nodes.iter().enumerate() {
            for (j, &col) in nodes.iter().enumerate() {
                let scale = -x_coef * rigidity * STENCIL[i] * STENCIL[j];
                sink.add_block(row, col, &(Matrix3::identity() * scale));
            }
        }
    }
}

/// Self block −(X_coef κ + U_coef η) I.
pub fn assemble_target_point_jacobian(
    sink: &mut dyn JacobianSink,
    x_coef: f64,
    u_coef: f64,
    targets: &TargetPointData,
) {
    for k in 0..targets.len() {
        let scale = -(x_coef * targets.stiffness[k] + u_coef * targets.damping[k]);
        if scale == 0.0 {
            continue;
        }
        let t = targets.global[k];
        sink.add_block(t, t, &(Matrix3::identity() * scale));
    }
}

// ─────────────────────────────────────────────────────────────
//  Reference sink:  sprs triplets → CSR
// ─────────────────────────────────────────────────────────────

/// Block Jacobian over `num_markers` markers, assembled into a scalar CSR
/// matrix of size (3 num_markers)².  Duplicate entries are summed on final
/// assembly.
#[derive(Debug)]
pub struct BlockJacobian {
    num_markers: usize,
    triplets: TriMat<f64>,
    assembled: Option<CsMat<f64>>,
}

impl BlockJacobian {
    pub fn new(num_markers: usize) -> Self {
        let dim = num_markers * NDIM;
        Self {
            num_markers,
            triplets: TriMat::new((dim, dim)),
            assembled: None,
        }
    }

    /// Preallocate room for the blocks described by `structure`.
    pub fn with_structure(num_markers: usize, structure: &NonzeroStructure) -> Self {
        let dim = num_markers * NDIM;
        let capacity = structure.block_capacity() * NDIM * NDIM;
        Self {
            num_markers,
            triplets: TriMat::with_capacity((dim, dim), capacity),
            assembled: None,
        }
    }

    pub fn num_markers(&self) -> usize {
        self.num_markers
    }

    pub fn dim(&self) -> usize {
        self.num_markers * NDIM
    }

    /// Scalar entries added so far (duplicates not merged).
    pub fn num_entries(&self) -> usize {
        self.triplets.nnz()
    }

    /// The assembled matrix; `None` until a final assembly, or after new
    /// blocks were added since the last one.
    pub fn matrix(&self) -> Option<&CsMat<f64>> {
        self.assembled.as_ref()
    }

    /// Drop all values, keeping the dimension.
    pub fn zero_entries(&mut self) {
        let dim = self.dim();
        self.triplets = TriMat::new((dim, dim));
        self.assembled = None;
    }
}

impl JacobianSink for BlockJacobian {
    fn add_block(&mut self, row: usize, col: usize, block: &Matrix3<f64>) {
        for a in 0..NDIM {
            for b in 0..NDIM {
                self.triplets
                    .add_triplet(row * NDIM + a, col * NDIM + b, block[(a, b)]);
            }
        }
        self.assembled = None;
    }

    fn assemble(&mut self, mode: AssemblyMode) {
        if mode == AssemblyMode::Final {
            self.assembled = Some(self.triplets.to_csr());
        }
    }
}
