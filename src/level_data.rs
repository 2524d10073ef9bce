//! Per-level force data built from the structure provider.
//!
//! Built once per grid configuration; replaced wholesale after a regrid.
//! Spec order from the provider is preserved so that force summation order
//! (and therefore the floating-point result) is reproducible.
//!
//! Each spec family is stored as parallel arrays, one entry per spec:
//! Lagrangian indices, global indices, local-form indices and the
//! parameters copied by value.

use crate::index_map::{IndexMap, IndexMapBuilder};
use crate::jacobian::JacobianState;
use crate::structure::StructureProvider;
use crate::types::{
    BeamSpec, ForceGenError, Result, SpecKind, SpringParameters, SpringSpec, TargetPointSpec,
};
use nalgebra::Vector3;
use tracing::debug;

/// Map every global index in `globals` to its local-form row.
pub(crate) fn localize(map: &IndexMap, globals: &[usize], lagrangian: &[usize]) -> Result<Vec<usize>> {
    globals
        .iter()
        .zip(lagrangian)
        .map(|(&global, &lag)| {
            map.local_index(global).ok_or(ForceGenError::UnresolvedMarker {
                level: map.level(),
                lagrangian: lag,
            })
        })
        .collect()
}

pub(crate) fn malformed(level: usize, kind: SpecKind, index: usize, reason: impl Into<String>) -> ForceGenError {
    ForceGenError::MalformedSpec {
        level,
        kind,
        index,
        reason: reason.into(),
    }
}

// ─────────────────────────────────────────────────────────────
//  Springs
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpringData {
    pub lagrangian_master: Vec<usize>,
    pub lagrangian_slave: Vec<usize>,
    pub global_master: Vec<usize>,
    pub global_slave: Vec<usize>,
    pub local_master: Vec<usize>,
    pub local_slave: Vec<usize>,
    pub force_keys: Vec<i32>,
    pub parameters: Vec<SpringParameters>,
}

impl SpringData {
    pub fn len(&self) -> usize {
        self.force_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.force_keys.is_empty()
    }

    /// Spec `k` as stored (canonical endpoint order).
    pub fn spec(&self, k: usize) -> SpringSpec {
        SpringSpec {
            master: self.lagrangian_master[k],
            slave: self.lagrangian_slave[k],
            force_key: self.force_keys[k],
            params: self.parameters[k],
        }
    }

    fn localize(&mut self, map: &IndexMap) -> Result<()> {
        self.local_master = localize(map, &self.global_master, &self.lagrangian_master)?;
        self.local_slave = localize(map, &self.global_slave, &self.lagrangian_slave)?;
        Ok(())
    }
}

/// Canonicalise and resolve the springs of a level.  Force-law keys are not
/// checked here; an unregistered key fails at evaluation time.
pub fn initialize_spring_level_data(map: &mut IndexMapBuilder, springs: &[SpringSpec]) -> Result<SpringData> {
    let level = map.level();
    let mut data = SpringData::default();

    for (k, raw) in springs.iter().enumerate() {
        let spec = raw.canonicalized();
        if spec.master == spec.slave {
            return Err(malformed(level, SpecKind::Spring, k, format!(
                "both endpoints are marker {}", spec.master
            )));
        }
        if spec.params.0.iter().any(|p| !p.is_finite()) {
            return Err(malformed(level, SpecKind::Spring, k, "non-finite parameter"));
        }

        let global_master = map.require(spec.master)?;
        let global_slave = map.require(spec.slave)?;

        data.lagrangian_master.push(spec.master);
        data.lagrangian_slave.push(spec.slave);
        data.global_master.push(global_master);
        data.global_slave.push(global_slave);
        data.force_keys.push(spec.force_key);
        data.parameters.push(spec.params);
    }

    Ok(data)
}

// ─────────────────────────────────────────────────────────────
//  Beams
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeamData {
    pub lagrangian_prev: Vec<usize>,
    pub lagrangian_master: Vec<usize>,
    pub lagrangian_next: Vec<usize>,
    pub global_prev: Vec<usize>,
    pub global_master: Vec<usize>,
    pub global_next: Vec<usize>,
    pub local_prev: Vec<usize>,
    pub local_master: Vec<usize>,
    pub local_next: Vec<usize>,
    pub rigidities: Vec<f64>,
    pub curvatures: Vec<Vector3<f64>>,
}

impl BeamData {
    pub fn len(&self) -> usize {
        self.rigidities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigidities.is_empty()
    }

    fn localize(&mut self, map: &IndexMap) -> Result<()> {
        self.local_prev = localize(map, &self.global_prev, &self.lagrangian_prev)?;
        self.local_master = localize(map, &self.global_master, &self.lagrangian_master)?;
        self.local_next = localize(map, &self.global_next, &self.lagrangian_next)?;
        Ok(())
    }
}

pub fn initialize_beam_level_data(map: &mut IndexMapBuilder, beams: &[BeamSpec]) -> Result<BeamData> {
    let level = map.level();
    let mut data = BeamData::default();

    for (k, spec) in beams.iter().enumerate() {
        if spec.prev == spec.master || spec.next == spec.master || spec.prev == spec.next {
            return Err(malformed(level, SpecKind::Beam, k, format!(
                "markers ({}, {}, {}) are not distinct",
                spec.prev, spec.master, spec.next
            )));
        }
        if !spec.rigidity.is_finite() || spec.curvature.iter().any(|c| !c.is_finite()) {
            return Err(malformed(level, SpecKind::Beam, k, "non-finite rigidity or curvature"));
        }

        data.global_prev.push(map.require(spec.prev)?);
        data.global_master.push(map.require(spec.master)?);
        data.global_next.push(map.require(spec.next)?);
        data.lagrangian_prev.push(spec.prev);
        data.lagrangian_master.push(spec.master);
        data.lagrangian_next.push(spec.next);
        data.rigidities.push(spec.rigidity);
        data.curvatures.push(spec.curvature);
    }

    Ok(data)
}

// ─────────────────────────────────────────────────────────────
//  Target points
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetPointData {
    pub lagrangian: Vec<usize>,
    pub global: Vec<usize>,
    pub local: Vec<usize>,
    pub stiffness: Vec<f64>,
    pub damping: Vec<f64>,
    pub targets: Vec<Vector3<f64>>,
}

impl TargetPointData {
    pub fn len(&self) -> usize {
        self.stiffness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stiffness.is_empty()
    }

    fn localize(&mut self, map: &IndexMap) -> Result<()> {
        self.local = localize(map, &self.global, &self.lagrangian)?;
        Ok(())
    }
}

pub fn initialize_target_point_level_data(
    map: &mut IndexMapBuilder,
    targets: &[TargetPointSpec],
) -> Result<TargetPointData> {
    let level = map.level();
    let mut data = TargetPointData::default();

    for (k, spec) in targets.iter().enumerate() {
        let finite = spec.stiffness.is_finite()
            && spec.damping.is_finite()
            && spec.target.iter().all(|x| x.is_finite());
        if !finite {
            return Err(malformed(level, SpecKind::TargetPoint, k, "non-finite coefficient or target"));
        }
        if spec.stiffness < 0.0 || spec.damping < 0.0 {
            return Err(malformed(level, SpecKind::TargetPoint, k, format!(
                "negative penalty (kappa = {}, eta = {})",
                spec.stiffness, spec.damping
            )));
        }

        data.global.push(map.require(spec.marker)?);
        data.lagrangian.push(spec.marker);
        data.stiffness.push(spec.stiffness);
        data.damping.push(spec.damping);
        data.targets.push(spec.target);
    }

    Ok(data)
}

// ─────────────────────────────────────────────────────────────
//  Level force data
// ─────────────────────────────────────────────────────────────

/// Everything the evaluator and Jacobian assembler need for one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelForceData {
    pub level: usize,
    pub init_time: f64,
    pub index_map: IndexMap,
    pub springs: SpringData,
    pub beams: BeamData,
    pub target_points: TargetPointData,
    pub(crate) jacobian_state: JacobianState,
}

impl LevelForceData {
    /// Resolve every spring, beam and target point of `level` against one
    /// shared index map, so all three families contribute to a single
    /// nonlocal set.
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

        let mut springs = initialize_spring_level_data(&mut builder, provider.springs(level))?;
        let mut beams = initialize_beam_level_data(&mut builder, provider.beams(level))?;
        let mut target_points =
            initialize_target_point_level_data(&mut builder, provider.target_points(level))?;

        let index_map = builder.finish();
        springs.localize(&index_map)?;
        beams.localize(&index_map)?;
        target_points.localize(&index_map)?;

        debug!(
            level,
            init_time,
            initial_time,
            springs = springs.len(),
            beams = beams.len(),
            target_points = target_points.len(),
            owned = index_map.num_owned(),
            nonlocal = index_map.num_ghosts(),
            "initialized level force data"
        );

        Ok(Self {
            level,
            init_time,
            index_map,
            springs,
            beams,
            target_points,
            jacobian_state: JacobianState::Unbuilt,
        })
    }

    pub fn nonlocal_indices(&self) -> &[usize] {
        self.index_map.nonlocal_indices()
    }

    pub fn jacobian_state(&self) -> JacobianState {
        self.jacobian_state
    }
}
