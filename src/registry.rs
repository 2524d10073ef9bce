//! Spring force-law registry.
//!
//! Force laws are addressed by a small integer key stored in each
//! [`SpringSpec`](crate::types::SpringSpec).  A law is a tagged set of pure
//! functions of the current spring length:
//!
//! - `force`:      tension T(R)  (positive pulls the endpoints together)
//! - `derivative`: dT/dR, needed only for Jacobian assembly
//! - `energy`:     potential E(R), optional; integrated from T otherwise
//!
//! Keys are resolved when forces are evaluated, not when level data is
//! built, so a spec may name a key that is registered later.

use crate::types::{SpringParameters, DEFAULT_SPRING_FORCE_KEY};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// `fn(length, params, master_lagrangian, slave_lagrangian) -> value`
pub type SpringForceFn = fn(f64, &SpringParameters, usize, usize) -> f64;

// ─────────────────────────────────────────────────────────────
//  Default law
// ─────────────────────────────────────────────────────────────

/// T = k (R − L)
pub fn default_linear_spring_force(
    length: f64,
    params: &SpringParameters,
    _master: usize,
    _slave: usize,
) -> f64 {
    params.stiffness() * (length - params.rest_length())
}

/// dT/dR = k
pub fn default_linear_spring_force_derivative(
    _length: f64,
    params: &SpringParameters,
    _master: usize,
    _slave: usize,
) -> f64 {
    params.stiffness()
}

/// E = ½ k (R − L)²
pub fn default_linear_spring_energy(
    length: f64,
    params: &SpringParameters,
    _master: usize,
    _slave: usize,
) -> f64 {
    let stretch = length - params.rest_length();
    0.5 * params.stiffness() * stretch * stretch
}

// ─────────────────────────────────────────────────────────────
//  Force law
// ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct SpringForceLaw {
    pub force: SpringForceFn,
    pub derivative: Option<SpringForceFn>,
    pub energy: Option<SpringForceFn>,
}

impl fmt::Debug for SpringForceLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpringForceLaw")
            .field("derivative", &self.derivative.is_some())
            .field("energy", &self.energy.is_some())
            .finish()
    }
}

impl SpringForceLaw {
    pub fn new(force: SpringForceFn) -> Self {
        Self {
            force,
            derivative: None,
            energy: None,
        }
    }

    pub fn with_derivative(mut self, derivative: SpringForceFn) -> Self {
        self.derivative = Some(derivative);
        self
    }

    pub fn with_energy(mut self, energy: SpringForceFn) -> Self {
        self.energy = Some(energy);
        self
    }

    /// The default linear spring with closed-form derivative and energy.
    pub fn linear() -> Self {
        Self::new(default_linear_spring_force)
            .with_derivative(default_linear_spring_force_derivative)
            .with_energy(default_linear_spring_energy)
    }

    /// Potential energy stored at `length`.
    ///
    /// Without a closed form this is ∫_L^R T(r) dr with composite Simpson's
    /// rule over `intervals` (even) sub-intervals, L being the rest length.
    pub fn potential(
        &self,
        length: f64,
        params: &SpringParameters,
        master: usize,
        slave: usize,
        intervals: usize,
    ) -> f64 {
        if let Some(energy) = self.energy {
            return energy(length, params, master, slave);
        }
        let a = params.rest_length();
        let h = (length - a) / intervals as f64;
        if h == 0.0 {
            return 0.0;
        }
        let t = |r: f64| (self.force)(r, params, master, slave);
        let mut sum = t(a) + t(length);
        for i in 1..intervals {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * t(a + i as f64 * h);
        }
        sum * h / 3.0
    }
}

// ─────────────────────────────────────────────────────────────
//  Registry
// ─────────────────────────────────────────────────────────────

/// Key → force law.  Key [`DEFAULT_SPRING_FORCE_KEY`] holds the linear
/// spring from construction and may be overridden like any other key.
#[derive(Debug, Clone)]
pub struct ForceLawRegistry {
    laws: BTreeMap<i32, SpringForceLaw>,
}

impl Default for ForceLawRegistry {
    fn default() -> Self {
        let mut laws = BTreeMap::new();
        laws.insert(DEFAULT_SPRING_FORCE_KEY, SpringForceLaw::linear());
        Self { laws }
    }
}

impl ForceLawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `force` (and optionally its derivative) with `key`,
    /// replacing whatever was registered there.
    pub fn register(&mut self, key: i32, force: SpringForceFn, derivative: Option<SpringForceFn>) {
        let mut law = SpringForceLaw::new(force);
        law.derivative = derivative;
        self.register_law(key, law);
    }

    pub fn register_law(&mut self, key: i32, law: SpringForceLaw) {
        if self.laws.insert(key, law).is_some() {
            debug!(key, "replacing registered spring force law");
        }
    }

    pub fn get(&self, key: i32) -> Option<&SpringForceLaw> {
        self.laws.get(&key)
    }

    pub fn contains(&self, key: i32) -> bool {
        self.laws.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = i32> + '_ {
        self.laws.keys().copied()
    }
}
