use crate::config::ConfigError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Every public operation returns `Result<T, ForceGenError>` instead of
/// panicking.  Nothing is retried or absorbed: the failing call returns
/// immediately and output fields may hold a partial accumulation.
#[derive(Debug, Error)]
pub enum ForceGenError {
    /// A public operation was called for a level that was never initialised
    /// or whose data was invalidated by a regrid.
    #[error("level {level} is not initialized (call initialize_level_data first)")]
    NotInitialized { level: usize },

    /// The structure provider has no data for the requested level.
    #[error("structure provider does not manage level {level}")]
    LevelNotManaged { level: usize },

    /// The (lagrangian, global) marker layout of a level is inconsistent.
    #[error("level {level}: invalid marker layout: {reason}")]
    InvalidLayout { level: usize, reason: String },

    /// A spec references a marker that is absent from the level layout.
    #[error("level {level}: marker with Lagrangian index {lagrangian} is not in the level layout")]
    UnresolvedMarker { level: usize, lagrangian: usize },

    /// A spec is structurally invalid (repeated markers, non-finite params, …).
    #[error("level {level}: malformed {kind} spec {index}: {reason}")]
    MalformedSpec {
        level: usize,
        kind: SpecKind,
        index: usize,
        reason: String,
    },

    /// A spring refers to a force-law key that was never registered.
    #[error("level {level}: spring {spring} uses unregistered force law {key}")]
    UnregisteredForceLaw { level: usize, spring: usize, key: i32 },

    /// Jacobian assembly needs a derivative the force law does not provide.
    #[error("level {level}: spring {spring} uses force law {key}, which has no registered derivative")]
    MissingDerivative { level: usize, spring: usize, key: i32 },

    /// An input or output field does not have the level's local-form layout.
    #[error(
        "level {level}: {field} field has layout {found}, expected {expected}"
    )]
    FieldLayoutMismatch {
        level: usize,
        field: &'static str,
        expected: FieldShape,
        found: FieldShape,
    },

    /// A field was constructed from inconsistent parts.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// `compute_jacobian` was called before the nonzero structure was known.
    #[error("level {level}: Jacobian nonzero structure must be computed before assembly")]
    JacobianStructureUnknown { level: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ForceGenError>;

/// Spec family, used to identify the offending record in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    Spring,
    Beam,
    TargetPoint,
    Rod,
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spring => write!(f, "spring"),
            Self::Beam => write!(f, "beam"),
            Self::TargetPoint => write!(f, "target point"),
            Self::Rod => write!(f, "rod"),
        }
    }
}

/// Local-form shape of a field: owned rows, ghost rows and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    pub owned: usize,
    pub ghosts: usize,
    pub depth: usize,
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} owned + {} ghost) × {}", self.owned, self.ghosts, self.depth)
    }
}

// ─────────────────────────────────────────────────────────────
//  Constants
// ─────────────────────────────────────────────────────────────

/// Spatial dimension of positions, velocities, forces and torques.
pub const NDIM: usize = 3;

/// Depth of a director field: three unit vectors per marker.
pub const DIRECTOR_DEPTH: usize = 9;

/// Number of per-spring parameter slots stored by value in each spec.
pub const MAX_SPRING_PARAMETERS: usize = 4;

/// Force-law key used by springs that do not name one.
pub const DEFAULT_SPRING_FORCE_KEY: i32 = 0;

/// ds, a1, a2, a3, b1, b2, b3, kappa1, kappa2, tau.
pub const NUM_ROD_MATERIAL_PARAMETERS: usize = 10;

// ─────────────────────────────────────────────────────────────
//  Spring specs
// ─────────────────────────────────────────────────────────────

/// Fixed-size spring parameter vector.  Slot 0 is the stiffness and slot 1
/// the rest length; remaining slots are free for custom force laws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParameters(pub [f64; MAX_SPRING_PARAMETERS]);

impl SpringParameters {
    pub fn new(stiffness: f64, rest_length: f64) -> Self {
        let mut values = [0.0; MAX_SPRING_PARAMETERS];
        values[0] = stiffness;
        values[1] = rest_length;
        Self(values)
    }

    #[inline]
    pub fn stiffness(&self) -> f64 {
        self.0[0]
    }

    #[inline]
    pub fn rest_length(&self) -> f64 {
        self.0[1]
    }

    /// Slot `slot`, or `None` past `MAX_SPRING_PARAMETERS`.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<f64> {
        self.0.get(slot).copied()
    }
}

/// A spring between two markers, identified by structure-local (Lagrangian)
/// indices.  `master < slave` after canonicalisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringSpec {
    pub master: usize,
    pub slave: usize,
    pub force_key: i32,
    pub params: SpringParameters,
}

impl SpringSpec {
    /// Build a spring spec, storing the smaller marker index first.
    pub fn new(a: usize, b: usize, force_key: i32, params: SpringParameters) -> Self {
        Self {
            master: a.min(b),
            slave: a.max(b),
            force_key,
            params,
        }
    }

    /// Linear spring using the default force law.
    pub fn linear(a: usize, b: usize, stiffness: f64, rest_length: f64) -> Self {
        Self::new(
            a,
            b,
            DEFAULT_SPRING_FORCE_KEY,
            SpringParameters::new(stiffness, rest_length),
        )
    }

    /// Same spring with endpoints in canonical order.
    pub fn canonicalized(&self) -> Self {
        Self::new(self.master, self.slave, self.force_key, self.params)
    }
}

// ─────────────────────────────────────────────────────────────
//  Beam specs
// ─────────────────────────────────────────────────────────────

/// Three consecutive markers penalising deviation of the discrete second
/// difference `X_next + X_prev − 2 X_master` from `curvature`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSpec {
    pub prev: usize,
    pub master: usize,
    pub next: usize,
    pub rigidity: f64,
    pub curvature: Vector3<f64>,
}

impl BeamSpec {
    pub fn new(prev: usize, master: usize, next: usize, rigidity: f64) -> Self {
        Self {
            prev,
            master,
            next,
            rigidity,
            curvature: Vector3::zeros(),
        }
    }

    pub fn with_curvature(mut self, curvature: Vector3<f64>) -> Self {
        self.curvature = curvature;
        self
    }
}

// ─────────────────────────────────────────────────────────────
//  Target point specs
// ─────────────────────────────────────────────────────────────

/// Soft anchor  F = κ (X₀ − X) − η U  on a single marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPointSpec {
    pub marker: usize,
    /// Position penalty κ.
    pub stiffness: f64,
    /// Velocity penalty η.
    pub damping: f64,
    /// Prescribed position X₀.
    pub target: Vector3<f64>,
}

impl TargetPointSpec {
    pub fn new(marker: usize, stiffness: f64, damping: f64, target: Vector3<f64>) -> Self {
        Self {
            marker,
            stiffness,
            damping,
            target,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Rod specs
// ─────────────────────────────────────────────────────────────

/// Kirchhoff rod material parameters, stored by value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RodMaterialParameters(pub [f64; NUM_ROD_MATERIAL_PARAMETERS]);

impl RodMaterialParameters {
    /// Parameters in the conventional order: segment length, bending and
    /// twisting moduli, shear and stretch moduli, intrinsic curvatures and
    /// twist.
    pub fn new(
        ds: f64,
        a: [f64; 3],
        b: [f64; 3],
        kappa1: f64,
        kappa2: f64,
        tau: f64,
    ) -> Self {
        Self([ds, a[0], a[1], a[2], b[0], b[1], b[2], kappa1, kappa2, tau])
    }

    #[inline]
    pub fn ds(&self) -> f64 {
        self.0[0]
    }

    /// Bending (a1, a2) and twisting (a3) moduli.
    #[inline]
    pub fn a(&self) -> [f64; 3] {
        [self.0[1], self.0[2], self.0[3]]
    }

    /// Shear (b1, b2) and stretching (b3) moduli.
    #[inline]
    pub fn b(&self) -> [f64; 3] {
        [self.0[4], self.0[5], self.0[6]]
    }

    /// Intrinsic curvatures κ₁, κ₂ and twist τ.
    #[inline]
    pub fn intrinsic(&self) -> [f64; 3] {
        [self.0[7], self.0[8], self.0[9]]
    }
}

/// One rod segment from `current` to `next`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RodSpec {
    pub current: usize,
    pub next: usize,
    pub params: RodMaterialParameters,
}

impl RodSpec {
    pub fn new(current: usize, next: usize, params: RodMaterialParameters) -> Self {
        Self {
            current,
            next,
            params,
        }
    }
}
