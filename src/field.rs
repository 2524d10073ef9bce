//! Ghosted Lagrangian data vectors (positions, velocities, forces, …).
//!
//! A [`LagrangianField`] is the local form of a distributed vector: `depth`
//! values per marker, owned rows first, then ghost rows whose global
//! indices are listed in ascending order.  Ghost rows of inputs must be
//! current before a force generator reads them; ghost rows of outputs hold
//! contributions that the caller sums back into the owning process.

use crate::types::{FieldShape, ForceGenError, Result};
use nalgebra::Vector3;
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct LagrangianField {
    owned_offset: usize,
    num_owned: usize,
    ghosts: Vec<usize>,
    values: Array2<f64>,
}

impl LagrangianField {
    pub fn zeros(owned_offset: usize, num_owned: usize, ghosts: Vec<usize>, depth: usize) -> Self {
        let rows = num_owned + ghosts.len();
        Self {
            owned_offset,
            num_owned,
            ghosts,
            values: Array2::zeros((rows, depth)),
        }
    }

    /// Wrap existing values.  `values` must have `num_owned + ghosts.len()`
    /// rows and `ghosts` must be strictly increasing.
    pub fn from_values(
        owned_offset: usize,
        num_owned: usize,
        ghosts: Vec<usize>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if values.nrows() != num_owned + ghosts.len() {
            return Err(ForceGenError::InvalidField(format!(
                "{} rows given for {} owned and {} ghost markers",
                values.nrows(),
                num_owned,
                ghosts.len()
            )));
        }
        if ghosts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForceGenError::InvalidField(
                "ghost indices must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            owned_offset,
            num_owned,
            ghosts,
            values,
        })
    }

    /// Unpartitioned field: every row owned, no ghosts.
    pub fn serial(values: Array2<f64>) -> Self {
        Self {
            owned_offset: 0,
            num_owned: values.nrows(),
            ghosts: Vec::new(),
            values,
        }
    }

    pub fn depth(&self) -> usize {
        self.values.ncols()
    }

    pub fn owned_offset(&self) -> usize {
        self.owned_offset
    }

    pub fn num_owned(&self) -> usize {
        self.num_owned
    }

    pub fn num_local(&self) -> usize {
        self.values.nrows()
    }

    pub fn ghost_indices(&self) -> &[usize] {
        &self.ghosts
    }

    pub fn shape(&self) -> FieldShape {
        FieldShape {
            owned: self.num_owned,
            ghosts: self.ghosts.len(),
            depth: self.depth(),
        }
    }

    /// Global index stored in local row `local`.
    pub fn global_index(&self, local: usize) -> usize {
        if local < self.num_owned {
            self.owned_offset + local
        } else {
            self.ghosts[local - self.num_owned]
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array2<f64> {
        &mut self.values
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// Three components starting at column `offset` of row `local`.
    #[inline]
    pub fn vector_at(&self, local: usize, offset: usize) -> Vector3<f64> {
        Vector3::new(
            self.values[[local, offset]],
            self.values[[local, offset + 1]],
            self.values[[local, offset + 2]],
        )
    }

    #[inline]
    pub fn vector(&self, local: usize) -> Vector3<f64> {
        self.vector_at(local, 0)
    }

    /// Add `v` to row `local`.
    #[inline]
    pub fn add_vector(&mut self, local: usize, v: &Vector3<f64>) {
        for d in 0..3 {
            self.values[[local, d]] += v[d];
        }
    }
}
