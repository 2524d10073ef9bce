//! Kirchhoff rod force and torque generator.
//!
//! Each marker carries a position X and an orthonormal director triad
//! (D1, D2, D3), stored as a depth-9 field `[D1 | D2 | D3]`.  A rod segment
//! joins `current` to `next`; internal force and moment are evaluated at the
//! segment midpoint using the triad rotated halfway between the two ends:
//!
//! ```text
//!   A      = Σᵢ Dᵢ(next) Dᵢ(curr)ᵀ          rotation curr → next
//!   Dᵢʰ    = A^½ Dᵢ(curr)
//!   X'     = (X_next − X_curr) / ds
//!   Dᵢ'    = (Dᵢ(next) − Dᵢ(curr)) / ds
//!
//!   Fʰ = b1 (D1ʰ·X') D1ʰ + b2 (D2ʰ·X') D2ʰ + b3 (D3ʰ·X' − 1) D3ʰ
//!   Nʰ = a1 (D2'·D3ʰ − κ1) D1ʰ + a2 (D3'·D1ʰ − κ2) D2ʰ + a3 (D1'·D2ʰ − τ) D3ʰ
//! ```
//!
//! Force and torque are added into the output fields:
//!
//! ```text
//!   F_curr += Fʰ                          F_next −= Fʰ
//!   N_curr += Nʰ + ½ (X_next − X_curr) × Fʰ
//!   N_next += −Nʰ + ½ (X_next − X_curr) × Fʰ
//! ```

use crate::field::LagrangianField;
use crate::index_map::{IndexMap, IndexMapBuilder};
use crate::level_data::{localize, malformed};
use crate::structure::StructureProvider;
use crate::types::{
    ForceGenError, Result, RodMaterialParameters, RodSpec, SpecKind, DIRECTOR_DEPTH, NDIM,
};
use nalgebra::{Matrix3, Rotation3, Vector3};
use std::collections::BTreeMap;
use tracing::debug;

// ─────────────────────────────────────────────────────────────
//  Level data
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RodData {
    pub lagrangian_current: Vec<usize>,
    pub lagrangian_next: Vec<usize>,
    pub global_current: Vec<usize>,
    pub global_next: Vec<usize>,
    pub local_current: Vec<usize>,
    pub local_next: Vec<usize>,
    pub parameters: Vec<RodMaterialParameters>,
}

impl RodData {
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    fn localize(&mut self, map: &IndexMap) -> Result<()> {
        self.local_current = localize(map, &self.global_current, &self.lagrangian_current)?;
        self.local_next = localize(map, &self.global_next, &self.lagrangian_next)?;
        Ok(())
    }
}

pub fn initialize_rod_level_data(map: &mut IndexMapBuilder, rods: &[RodSpec]) -> Result<RodData> {
    let level = map.level();
    let mut data = RodData::default();

    for (k, spec) in rods.iter().enumerate() {
        if spec.current == spec.next {
            return Err(malformed(level, SpecKind::Rod, k, format!(
                "both ends are marker {}", spec.current
            )));
        }
        if spec.params.0.iter().any(|p| !p.is_finite()) {
            return Err(malformed(level, SpecKind::Rod, k, "non-finite material parameter"));
        }
        if spec.params.ds() <= 0.0 {
            return Err(malformed(level, SpecKind::Rod, k, format!(
                "segment length ds = {} must be positive", spec.params.ds()
            )));
        }

        data.global_current.push(map.require(spec.current)?);
        data.global_next.push(map.require(spec.next)?);
        data.lagrangian_current.push(spec.current);
        data.lagrangian_next.push(spec.next);
        data.parameters.push(spec.params);
    }

    Ok(data)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RodLevelData {
    pub level: usize,
    pub init_time: f64,
    pub index_map: IndexMap,
    pub rods: RodData,
}

impl RodLevelData {
    pub fn build(
        level: usize,
        init_time: f64,
        initial_time: bool,
        provider: &dyn StructureProvider,
    ) -> Result<Self> {
        let layout = provider
            .layout(level)
            .ok_or(ForceGenError::LevelNotManaged { level })?;
        let mut builder = IndexMapBuilder::new(level, layout)?;
        let mut rods = initialize_rod_level_data(&mut builder, provider.rods(level))?;
        let index_map = builder.finish();
        rods.localize(&index_map)?;

        debug!(
            level,
            init_time,
            initial_time,
            rods = rods.len(),
            owned = index_map.num_owned(),
            nonlocal = index_map.num_ghosts(),
            "initialized rod level data"
        );

        Ok(Self {
            level,
            init_time,
            index_map,
            rods,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Generator
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct KirchhoffRodForceGen {
    levels: BTreeMap<usize, RodLevelData>,
}

impl KirchhoffRodForceGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize_level_data(
        &mut self,
        level: usize,
        init_time: f64,
        initial_time: bool,
        provider: &dyn StructureProvider,
    ) -> Result<()> {
        self.levels.remove(&level);
        let data = RodLevelData::build(level, init_time, initial_time, provider)?;
        self.levels.insert(level, data);
        Ok(())
    }

    pub fn invalidate_level(&mut self, level: usize) {
        if self.levels.remove(&level).is_some() {
            debug!(level, "invalidated rod level data");
        }
    }

    pub fn is_initialized(&self, level: usize) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn level_data(&self, level: usize) -> Result<&RodLevelData> {
        self.levels
            .get(&level)
            .ok_or(ForceGenError::NotInitialized { level })
    }

    pub fn nonlocal_indices(&self, level: usize) -> Result<&[usize]> {
        Ok(self.level_data(level)?.index_map.nonlocal_indices())
    }

    pub fn create_ghosted_field(&self, level: usize, depth: usize) -> Result<LagrangianField> {
        Ok(self.level_data(level)?.index_map.create_field(depth))
    }

    /// Add rod forces into `f` and torques into `n` given positions `x` and
    /// directors `d`.
    pub fn compute_force_and_torque(
        &self,
        f: &mut LagrangianField,
        n: &mut LagrangianField,
        x: &LagrangianField,
        d: &LagrangianField,
        level: usize,
        _time: f64,
    ) -> Result<()> {
        let data = self.level_data(level)?;
        let map = &data.index_map;
        map.check_field("force", f, NDIM)?;
        map.check_field("torque", n, NDIM)?;
        map.check_field("position", x, NDIM)?;
        map.check_field("director", d, DIRECTOR_DEPTH)?;

        let rods = &data.rods;
        for k in 0..rods.len() {
            let c = rods.local_current[k];
            let nx = rods.local_next[k];
            let (f_half, n_half) = rod_midpoint_loads(
                &x.vector(c),
                &x.vector(nx),
                &directors(d, c),
                &directors(d, nx),
                &rods.parameters[k],
            );

            let moment_arm = 0.5 * (x.vector(nx) - x.vector(c));
            let couple = moment_arm.cross(&f_half);
            f.add_vector(c, &f_half);
            f.add_vector(nx, &(-f_half));
            n.add_vector(c, &(n_half + couple));
            n.add_vector(nx, &(-n_half + couple));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Kernel
// ─────────────────────────────────────────────────────────────

#[inline]
fn directors(d: &LagrangianField, local: usize) -> [Vector3<f64>; 3] {
    [d.vector_at(local, 0), d.vector_at(local, 3), d.vector_at(local, 6)]
}

/// Internal force Fʰ and moment Nʰ at the midpoint of one segment.
pub fn rod_midpoint_loads(
    x_curr: &Vector3<f64>,
    x_next: &Vector3<f64>,
    d_curr: &[Vector3<f64>; 3],
    d_next: &[Vector3<f64>; 3],
    params: &RodMaterialParameters,
) -> (Vector3<f64>, Vector3<f64>) {
    let ds = params.ds();
    let [a1, a2, a3] = params.a();
    let [b1, b2, b3] = params.b();
    let [kappa1, kappa2, tau] = params.intrinsic();

    let mut a = Matrix3::zeros();
    for i in 0..3 {
        a += d_next[i] * d_curr[i].transpose();
    }
    let half = Rotation3::from_matrix_unchecked(a).powf(0.5);
    let dh = [half * d_curr[0], half * d_curr[1], half * d_curr[2]];

    let dx_ds = (x_next - x_curr) / ds;
    let dd_ds = [
        (d_next[0] - d_curr[0]) / ds,
        (d_next[1] - d_curr[1]) / ds,
        (d_next[2] - d_curr[2]) / ds,
    ];

    let f_half = b1 * dh[0].dot(&dx_ds) * dh[0]
        + b2 * dh[1].dot(&dx_ds) * dh[1]
        + b3 * (dh[2].dot(&dx_ds) - 1.0) * dh[2];
    let n_half = a1 * (dd_ds[1].dot(&dh[2]) - kappa1) * dh[0]
        + a2 * (dd_ds[2].dot(&dh[0]) - kappa2) * dh[1]
        + a3 * (dd_ds[0].dot(&dh[1]) - tau) * dh[2];

    (f_half, n_half)
}
