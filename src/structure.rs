//! Structure topology supplied to the force generators.
//!
//! The force generators never own topology.  They ask a
//! [`StructureProvider`] for the specs and marker layout of a level whenever
//! that level is (re)initialised.  [`StructureTopology`] is a plain
//! in-memory provider.

use crate::index_map::LevelLayout;
use crate::types::{BeamSpec, RodSpec, SpringSpec, TargetPointSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-level topology source.  Specs use Lagrangian marker indices and are
/// the ones this process is responsible for evaluating.
pub trait StructureProvider {
    /// Marker layout of `level`, or `None` if the provider has no markers there.
    fn layout(&self, level: usize) -> Option<&LevelLayout>;

    fn springs(&self, level: usize) -> &[SpringSpec];

    fn beams(&self, level: usize) -> &[BeamSpec];

    fn target_points(&self, level: usize) -> &[TargetPointSpec];

    fn rods(&self, _level: usize) -> &[RodSpec] {
        &[]
    }
}

// ─────────────────────────────────────────────────────────────
//  In-memory provider
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStructure {
    pub layout: LevelLayout,
    #[serde(default)]
    pub springs: Vec<SpringSpec>,
    #[serde(default)]
    pub beams: Vec<BeamSpec>,
    #[serde(default)]
    pub target_points: Vec<TargetPointSpec>,
    #[serde(default)]
    pub rods: Vec<RodSpec>,
}

impl LevelStructure {
    pub fn new(layout: LevelLayout) -> Self {
        Self {
            layout,
            springs: Vec::new(),
            beams: Vec::new(),
            target_points: Vec::new(),
            rods: Vec::new(),
        }
    }

    pub fn with_springs(mut self, springs: impl IntoIterator<Item = SpringSpec>) -> Self {
        self.springs.extend(springs);
        self
    }

    pub fn with_beams(mut self, beams: impl IntoIterator<Item = BeamSpec>) -> Self {
        self.beams.extend(beams);
        self
    }

    pub fn with_target_points(mut self, targets: impl IntoIterator<Item = TargetPointSpec>) -> Self {
        self.target_points.extend(targets);
        self
    }

    pub fn with_rods(mut self, rods: impl IntoIterator<Item = RodSpec>) -> Self {
        self.rods.extend(rods);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureTopology {
    levels: BTreeMap<usize, LevelStructure>,
}

impl StructureTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: usize, structure: LevelStructure) -> Self {
        self.insert_level(level, structure);
        self
    }

    /// Replace the topology of `level` wholesale.
    pub fn insert_level(&mut self, level: usize, structure: LevelStructure) -> Option<LevelStructure> {
        self.levels.insert(level, structure)
    }

    pub fn remove_level(&mut self, level: usize) -> Option<LevelStructure> {
        self.levels.remove(&level)
    }

    pub fn level(&self, level: usize) -> Option<&LevelStructure> {
        self.levels.get(&level)
    }

    pub fn level_mut(&mut self, level: usize) -> Option<&mut LevelStructure> {
        self.levels.get_mut(&level)
    }

    pub fn levels(&self) -> impl Iterator<Item = usize> + '_ {
        self.levels.keys().copied()
    }
}

impl StructureProvider for StructureTopology {
    fn layout(&self, level: usize) -> Option<&LevelLayout> {
        self.levels.get(&level).map(|s| &s.layout)
    }

    fn springs(&self, level: usize) -> &[SpringSpec] {
        self.levels.get(&level).map(|s| s.springs.as_slice()).unwrap_or(&[])
    }

    fn beams(&self, level: usize) -> &[BeamSpec] {
        self.levels.get(&level).map(|s| s.beams.as_slice()).unwrap_or(&[])
    }

    fn target_points(&self, level: usize) -> &[TargetPointSpec] {
        self.levels.get(&level).map(|s| s.target_points.as_slice()).unwrap_or(&[])
    }

    fn rods(&self, level: usize) -> &[RodSpec] {
        self.levels.get(&level).map(|s| s.rods.as_slice()).unwrap_or(&[])
    }
}
