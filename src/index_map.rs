//! Distributed index map: Lagrangian marker indices → global parallel
//! indices → positions in the ghosted local form.
//!
//! Each process owns a contiguous block of global indices on a level.  The
//! local form of a field stores the owned markers first, followed by one row
//! per *nonlocal* (ghost) marker in ascending global order:
//!
//! ```text
//!   local row   0 .. n_owned            global  owned.start .. owned.end
//!   local row   n_owned + k             global  ghosts[k]   (sorted)
//! ```
//!
//! The ghost set is whatever the level's specs reference but this process
//! does not own.  It is only *declared* here; filling the ghost rows is the
//! caller's job.

use crate::field::LagrangianField;
use crate::types::{FieldShape, ForceGenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

// ─────────────────────────────────────────────────────────────
//  Level layout  (supplied by the structure provider)
// ─────────────────────────────────────────────────────────────

/// Marker layout of one level as seen from this process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    /// Global indices owned by this process.
    pub owned: Range<usize>,
    /// Total number of markers on the level across all processes.
    pub num_global: usize,
    /// (lagrangian, global) pairs for every marker this process may reference.
    pub markers: Vec<(usize, usize)>,
}

impl LevelLayout {
    pub fn new(owned: Range<usize>, num_global: usize, markers: Vec<(usize, usize)>) -> Self {
        Self {
            owned,
            num_global,
            markers,
        }
    }

    /// Single-process layout in which Lagrangian and global indices coincide.
    pub fn serial(num_markers: usize) -> Self {
        Self {
            owned: 0..num_markers,
            num_global: num_markers,
            markers: (0..num_markers).map(|i| (i, i)).collect(),
        }
    }

    pub fn num_owned(&self) -> usize {
        self.owned.len()
    }
}

/// One marker referenced by a spec, resolved on a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerRef {
    pub lagrangian: usize,
    pub global: usize,
    pub local: usize,
}

// ─────────────────────────────────────────────────────────────
//  Builder  (collects the nonlocal set)
// ─────────────────────────────────────────────────────────────

/// Mutable phase of the index map: resolves markers and records every
/// referenced global index that this process does not own.
#[derive(Debug)]
pub struct IndexMapBuilder {
    level: usize,
    owned: Range<usize>,
    num_global: usize,
    lagrangian_to_global: HashMap<usize, usize>,
    nonlocal: BTreeSet<usize>,
}

impl IndexMapBuilder {
    /// Validate `layout` and start collecting references.
    pub fn new(level: usize, layout: &LevelLayout) -> Result<Self> {
        let invalid = |reason: String| ForceGenError::InvalidLayout { level, reason };

        if layout.owned.start > layout.owned.end || layout.owned.end > layout.num_global {
            return Err(invalid(format!(
                "owned range {:?} does not fit in {} global markers",
                layout.owned, layout.num_global
            )));
        }

        let mut lagrangian_to_global = HashMap::with_capacity(layout.markers.len());
        let mut seen_global = HashMap::with_capacity(layout.markers.len());
        for &(lagrangian, global) in &layout.markers {
            if global >= layout.num_global {
                return Err(invalid(format!(
                    "marker {lagrangian} maps to global index {global} ≥ {}",
                    layout.num_global
                )));
            }
            if let Some(previous) = lagrangian_to_global.insert(lagrangian, global) {
                if previous != global {
                    return Err(invalid(format!(
                        "marker {lagrangian} maps to both {previous} and {global}"
                    )));
                }
            }
            if let Some(other) = seen_global.insert(global, lagrangian) {
                if other != lagrangian {
                    return Err(invalid(format!(
                        "markers {other} and {lagrangian} share global index {global}"
                    )));
                }
            }
        }

        Ok(Self {
            level,
            owned: layout.owned.clone(),
            num_global: layout.num_global,
            lagrangian_to_global,
            nonlocal: BTreeSet::new(),
        })
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Resolve a marker to its global index, recording it as nonlocal when
    /// it is owned elsewhere.
    pub fn require(&mut self, lagrangian: usize) -> Result<usize> {
        let global = *self
            .lagrangian_to_global
            .get(&lagrangian)
            .ok_or(ForceGenError::UnresolvedMarker {
                level: self.level,
                lagrangian,
            })?;
        if !self.owned.contains(&global) {
            self.nonlocal.insert(global);
        }
        Ok(global)
    }

    /// Freeze the nonlocal set.
    pub fn finish(self) -> IndexMap {
        IndexMap {
            level: self.level,
            owned: self.owned,
            num_global: self.num_global,
            lagrangian_to_global: self.lagrangian_to_global,
            ghosts: self.nonlocal.into_iter().collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Frozen map
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IndexMap {
    level: usize,
    owned: Range<usize>,
    num_global: usize,
    lagrangian_to_global: HashMap<usize, usize>,
    /// Sorted nonlocal global indices; row order of the ghost block.
    ghosts: Vec<usize>,
}

impl PartialEq for IndexMap {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.owned == other.owned
            && self.num_global == other.num_global
            && self.ghosts == other.ghosts
            && self.lagrangian_to_global == other.lagrangian_to_global
    }
}

impl IndexMap {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn owned(&self) -> Range<usize> {
        self.owned.clone()
    }

    pub fn num_global(&self) -> usize {
        self.num_global
    }

    pub fn num_owned(&self) -> usize {
        self.owned.len()
    }

    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Rows of the local form: owned followed by ghosts.
    pub fn num_local(&self) -> usize {
        self.num_owned() + self.num_ghosts()
    }

    /// Global indices that must be fetched before evaluation.
    pub fn nonlocal_indices(&self) -> &[usize] {
        &self.ghosts
    }

    pub fn is_owned(&self, global: usize) -> bool {
        self.owned.contains(&global)
    }

    /// Row of `global` in the local form, if it is owned or a ghost.
    pub fn local_index(&self, global: usize) -> Option<usize> {
        if self.owned.contains(&global) {
            Some(global - self.owned.start)
        } else {
            self.ghosts
                .binary_search(&global)
                .ok()
                .map(|k| self.num_owned() + k)
        }
    }

    /// Global index of a local-form row.
    pub fn global_index(&self, local: usize) -> Option<usize> {
        let n_owned = self.num_owned();
        if local < n_owned {
            Some(self.owned.start + local)
        } else {
            self.ghosts.get(local - n_owned).copied()
        }
    }

    /// Resolve a Lagrangian index that was declared during the build phase.
    pub fn marker(&self, lagrangian: usize) -> Result<MarkerRef> {
        let unresolved = || ForceGenError::UnresolvedMarker {
            level: self.level,
            lagrangian,
        };
        let global = *self.lagrangian_to_global.get(&lagrangian).ok_or_else(unresolved)?;
        let local = self.local_index(global).ok_or_else(unresolved)?;
        Ok(MarkerRef {
            lagrangian,
            global,
            local,
        })
    }

    pub fn shape(&self, depth: usize) -> FieldShape {
        FieldShape {
            owned: self.num_owned(),
            ghosts: self.num_ghosts(),
            depth,
        }
    }

    /// Fail unless `field` has exactly this map's local form and `depth`.
    pub fn check_field(&self, name: &'static str, field: &LagrangianField, depth: usize) -> Result<()> {
        let matches = field.depth() == depth
            && field.owned_offset() == self.owned.start
            && field.num_owned() == self.num_owned()
            && field.ghost_indices() == self.ghosts.as_slice();
        if matches {
            Ok(())
        } else {
            Err(ForceGenError::FieldLayoutMismatch {
                level: self.level,
                field: name,
                expected: self.shape(depth),
                found: field.shape(),
            })
        }
    }

    /// A zeroed field with this map's local form.
    pub fn create_field(&self, depth: usize) -> LagrangianField {
        LagrangianField::zeros(self.owned.start, self.num_owned(), self.ghosts.clone(), depth)
    }
}
