//! Standard force generator: springs, beams and target points.
//!
//! [`StandardForceGen`] owns one [`LevelForceData`] per initialised level and
//! exposes the operations a time integrator or Newton solver calls:
//!
//! ```text
//!   register_spring_force_function ─┐
//!                                    ▼
//!   initialize_level_data ──▶ LevelForceData ──▶ compute_force / compute_energy
//!          ▲                        │
//!          │                        └──▶ compute_jacobian_nonzero_structure
//!   invalidate_level (regrid)                  └──▶ compute_jacobian
//! ```
//!
//! Ghost rows of every input field must be current before a call; ghost rows
//! of output fields receive contributions that the caller sums back into the
//! owning process.

use crate::config::ForceGenConfig;
use crate::evaluator::{
    compute_beam_energy, compute_beam_force, compute_spring_energy, compute_spring_force,
    compute_target_point_energy, compute_target_point_force, resolve_spring_laws,
};
use crate::field::LagrangianField;
use crate::jacobian::{
    assemble_beam_jacobian, assemble_spring_jacobian, assemble_target_point_jacobian,
    compute_nonzero_structure, require_spring_derivatives, AssemblyMode, JacobianSink,
    JacobianState, NonzeroStructure,
};
use crate::level_data::LevelForceData;
use crate::registry::{ForceLawRegistry, SpringForceFn, SpringForceLaw};
use crate::structure::StructureProvider;
use crate::types::{ForceGenError, Result, NDIM};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct StandardForceGen {
    config: ForceGenConfig,
    registry: ForceLawRegistry,
    levels: BTreeMap<usize, LevelForceData>,
}

impl StandardForceGen {
    pub fn new(config: ForceGenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: ForceLawRegistry::default(),
            levels: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &ForceGenConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────
    //  Force laws
    // ─────────────────────────────────────────────────────────────

    /// Register `force` (and optionally `derivative`) under `key`, replacing
    /// any previous law.  Takes effect on the next evaluation; level data
    /// does not need rebuilding.
    pub fn register_spring_force_function(
        &mut self,
        key: i32,
        force: SpringForceFn,
        derivative: Option<SpringForceFn>,
    ) {
        self.registry.register(key, force, derivative);
    }

    /// Register a law with a closed-form energy as well.
    pub fn register_spring_force_law(&mut self, key: i32, law: SpringForceLaw) {
        self.registry.register_law(key, law);
    }

    pub fn registry(&self) -> &ForceLawRegistry {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────
    //  Level lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Build (or rebuild) the force data of `level` from `provider`.
    ///
    /// On success any previous data for the level is replaced and the
    /// Jacobian state returns to `Unbuilt`.  On failure the level is left
    /// uninitialised.
    pub fn initialize_level_data(
        &mut self,
        level: usize,
        init_time: f64,
        initial_time: bool,
        provider: &dyn StructureProvider,
    ) -> Result<()> {
        self.levels.remove(&level);
        let data = LevelForceData::build(level, init_time, initial_time, provider)?;
        self.levels.insert(level, data);
        Ok(())
    }

    /// Mark `level` stale after a regrid or topology change.
    pub fn invalidate_level(&mut self, level: usize) {
        if self.levels.remove(&level).is_some() {
            debug!(level, "invalidated level force data");
        }
    }

    pub fn is_initialized(&self, level: usize) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn level_data(&self, level: usize) -> Result<&LevelForceData> {
        self.levels
            .get(&level)
            .ok_or(ForceGenError::NotInitialized { level })
    }

    /// Global indices whose values must be fetched before evaluating `level`.
    pub fn nonlocal_indices(&self, level: usize) -> Result<&[usize]> {
        Ok(self.level_data(level)?.nonlocal_indices())
    }

    /// A zeroed field in the local form of `level`.
    pub fn create_ghosted_field(&self, level: usize, depth: usize) -> Result<LagrangianField> {
        Ok(self.level_data(level)?.index_map.create_field(depth))
    }

    pub fn jacobian_state(&self, level: usize) -> Result<JacobianState> {
        Ok(self.level_data(level)?.jacobian_state())
    }

    // ─────────────────────────────────────────────────────────────
    //  Forces and energy
    // ─────────────────────────────────────────────────────────────

    /// Add the spring, beam and target-point forces of `level` into `f`.
    ///
    /// `u` supplies velocities for target-point damping; without it the
    /// damping term is zero.
    pub fn compute_force(
        &self,
        f: &mut LagrangianField,
        x: &LagrangianField,
        u: Option<&LagrangianField>,
        level: usize,
        time: f64,
    ) -> Result<()> {
        let data = self.level_data(level)?;

        // 1. Validate inputs before touching the output
        data.index_map.check_field("force", f, NDIM)?;
        data.index_map.check_field("position", x, NDIM)?;
        if let Some(u) = u {
            data.index_map.check_field("velocity", u, NDIM)?;
        }
        let laws = resolve_spring_laws(&self.registry, &data.springs, level)?;

        // 2. Accumulate
        compute_spring_force(f, x, &data.springs, &laws, self.config.zero_length_tolerance);
        compute_beam_force(f, x, &data.beams);
        let max_displacement = compute_target_point_force(f, x, u, &data.target_points);

        // 3. Report
        if self.config.log_target_point_displacements && !data.target_points.is_empty() {
            info!(
                level,
                time,
                max_displacement,
                "maximum target point displacement"
            );
        }
        Ok(())
    }

    /// Potential energy of the springs, beams and target points of `level`.
    /// Velocity does not enter the energy; `u` is only layout-checked.
    pub fn compute_energy(
        &self,
        x: &LagrangianField,
        u: Option<&LagrangianField>,
        level: usize,
        _time: f64,
    ) -> Result<f64> {
        let data = self.level_data(level)?;
        data.index_map.check_field("position", x, NDIM)?;
        if let Some(u) = u {
            data.index_map.check_field("velocity", u, NDIM)?;
        }
        let laws = resolve_spring_laws(&self.registry, &data.springs, level)?;

        let energy = compute_spring_energy(
            x,
            &data.springs,
            &laws,
            self.config.energy_quadrature_intervals,
        ) + compute_beam_energy(x, &data.beams)
            + compute_target_point_energy(x, &data.target_points);
        Ok(energy)
    }

    // ─────────────────────────────────────────────────────────────
    //  Jacobian
    // ─────────────────────────────────────────────────────────────

    /// Per owned block row, how many other blocks `level` couples to.
    pub fn compute_jacobian_nonzero_structure(&mut self, level: usize) -> Result<NonzeroStructure> {
        let data = self
            .levels
            .get_mut(&level)
            .ok_or(ForceGenError::NotInitialized { level })?;
        let structure = compute_nonzero_structure(data);
        data.jacobian_state = JacobianState::StructureKnown;
        Ok(structure)
    }

    /// Add `x_coef ∂F/∂X + u_coef ∂F/∂U` for `level` into `sink`, then pass
    /// `mode` on to the sink.
    ///
    /// Fails before writing anything if the nonzero structure is unknown or
    /// a spring's force law has no derivative.
    pub fn compute_jacobian(
        &mut self,
        sink: &mut dyn JacobianSink,
        x_coef: f64,
        x: &LagrangianField,
        u_coef: f64,
        u: Option<&LagrangianField>,
        level: usize,
        _time: f64,
        mode: AssemblyMode,
    ) -> Result<()> {
        let data = self
            .levels
            .get_mut(&level)
            .ok_or(ForceGenError::NotInitialized { level })?;

        // 1. Preconditions
        if data.jacobian_state == JacobianState::Unbuilt {
            return Err(ForceGenError::JacobianStructureUnknown { level });
        }
        data.index_map.check_field("position", x, NDIM)?;
        if let Some(u) = u {
            data.index_map.check_field("velocity", u, NDIM)?;
        }
        let laws = resolve_spring_laws(&self.registry, &data.springs, level)?;
        let derivatives = require_spring_derivatives(&data.springs, &laws, level)?;

        // 2. Blocks
        assemble_spring_jacobian(
            sink,
            x_coef,
            x,
            &data.springs,
            &laws,
            &derivatives,
            self.config.zero_length_tolerance,
            level,
        );
        assemble_beam_jacobian(sink, x_coef, &data.beams);
        assemble_target_point_jacobian(sink, x_coef, u_coef, &data.target_points);

        // 3. Flush or finalise
        sink.assemble(mode);
        data.jacobian_state = match mode {
            AssemblyMode::Flush => JacobianState::StructureKnown,
            AssemblyMode::Final => JacobianState::ValuesAssembled,
        };
        Ok(())
    }
}
