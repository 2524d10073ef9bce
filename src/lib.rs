//! **Ariadne**: Lagrangian force generation for immersed elastic structures.
//!
//! Markers of a massless immersed structure interact through springs, beams,
//! target-point anchors and Kirchhoff rods.  This crate evaluates the forces
//! (and rod torques) of those interactions on a partitioned, multi-level
//! marker set, along with energies and Jacobians for implicit solves:
//!
//! 1. **Registry** (`registry`): integer-keyed spring force laws.
//! 2. **Index map** (`index_map`): Lagrangian → global → local-form indices and
//!    the nonlocal (ghost) set of each level.
//! 3. **Level data** (`level_data`): per-level spec arrays built from a
//!    [`StructureProvider`](structure::StructureProvider).
//! 4. **Evaluator** (`evaluator`): additive force and energy kernels.
//! 5. **Jacobian** (`jacobian`): nonzero structure and two-phase block assembly.
//! 6. **Generators** (`force_gen`, `rod`): the engines a simulation driver calls.
//!
//! Ghost exchange is the caller's job: query `nonlocal_indices`, fill the
//! ghost rows of the input fields, evaluate, then sum the ghost rows of the
//! output fields back into their owners.

pub mod types;
pub mod config;
pub mod registry;
pub mod index_map;
pub mod field;
pub mod structure;
pub mod level_data;
pub mod evaluator;
pub mod jacobian;
pub mod force_gen;
pub mod rod;

pub use config::{ConfigError, ForceGenConfig};
pub use field::LagrangianField;
pub use force_gen::StandardForceGen;
pub use index_map::LevelLayout;
pub use jacobian::{AssemblyMode, BlockJacobian, JacobianSink, JacobianState, NonzeroStructure};
pub use rod::KirchhoffRodForceGen;
pub use structure::{LevelStructure, StructureProvider, StructureTopology};
pub use types::{ForceGenError, Result};
