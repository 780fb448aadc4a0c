use rayon::prelude::*;
use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Missing value indicator used for every field held in memory
pub const MV: f32 = -9999.0;

/// True if the value is finite and not the missing value indicator
#[inline]
pub fn is_valid(value: f32) -> bool {
    value.is_finite() && value != MV
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Cannot create field of size [{n_lat},{n_lon},{n_ens}]")]
    InvalidDimensions {
        n_lat: usize,
        n_lon: usize,
        n_ens: usize,
    },

    #[error("Field buffer has {found} values, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },
}

/// Values of one variable at one timestep, laid out [lat, lon, ensemble member]
///
/// The buffer is contiguous with the ensemble axis innermost, so all members
/// of a grid point sit next to each other and one latitude row is one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    n_lat: usize,
    n_lon: usize,
    n_ens: usize,
    values: Vec<f32>,
}

impl Field {
    /// Create a field with every cell set to `fill`
    pub fn new(n_lat: usize, n_lon: usize, n_ens: usize, fill: f32) -> Result<Self, FieldError> {
        let size = Self::checked_size(n_lat, n_lon, n_ens)?;
        Ok(Self {
            n_lat,
            n_lon,
            n_ens,
            values: vec![fill; size],
        })
    }

    /// Wrap an existing buffer in [lat, lon, ens] order
    pub fn from_values(
        n_lat: usize,
        n_lon: usize,
        n_ens: usize,
        values: Vec<f32>,
    ) -> Result<Self, FieldError> {
        let size = Self::checked_size(n_lat, n_lon, n_ens)?;
        if values.len() != size {
            return Err(FieldError::SizeMismatch {
                expected: size,
                found: values.len(),
            });
        }
        Ok(Self {
            n_lat,
            n_lon,
            n_ens,
            values,
        })
    }

    fn checked_size(n_lat: usize, n_lon: usize, n_ens: usize) -> Result<usize, FieldError> {
        n_lat
            .checked_mul(n_lon)
            .and_then(|n| n.checked_mul(n_ens))
            .ok_or(FieldError::InvalidDimensions { n_lat, n_lon, n_ens })
    }

    pub fn n_lat(&self) -> usize {
        self.n_lat
    }

    pub fn n_lon(&self) -> usize {
        self.n_lon
    }

    pub fn n_ens(&self) -> usize {
        self.n_ens
    }

    /// (n_lat, n_lon, n_ens)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_lat, self.n_lon, self.n_ens)
    }

    #[inline]
    fn index_of(&self, i: usize, j: usize, e: usize) -> usize {
        assert!(
            i < self.n_lat && j < self.n_lon && e < self.n_ens,
            "index ({}, {}, {}) out of bounds for field of size [{}, {}, {}]",
            i,
            j,
            e,
            self.n_lat,
            self.n_lon,
            self.n_ens
        );
        (i * self.n_lon + j) * self.n_ens + e
    }

    /// Checked access, `None` outside the field
    pub fn get(&self, i: usize, j: usize, e: usize) -> Option<f32> {
        if i < self.n_lat && j < self.n_lon && e < self.n_ens {
            Some(self.values[(i * self.n_lon + j) * self.n_ens + e])
        } else {
            None
        }
    }

    /// All ensemble members at one grid point
    pub fn ensemble(&self, i: usize, j: usize) -> &[f32] {
        assert!(
            i < self.n_lat && j < self.n_lon,
            "grid point ({}, {}) out of bounds for field of size [{}, {}, {}]",
            i,
            j,
            self.n_lat,
            self.n_lon,
            self.n_ens
        );
        let start = (i * self.n_lon + j) * self.n_ens;
        &self.values[start..start + self.n_ens]
    }

    /// Raw buffer in [lat, lon, ens] order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn fill(&mut self, value: f32) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    /// Latitude rows in parallel, each row is `n_lon * n_ens` values
    ///
    /// Index into a row with `j * n_ens + e`.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [f32])> {
        let row_len = (self.n_lon * self.n_ens).max(1);
        self.values.par_chunks_mut(row_len).enumerate()
    }
}

impl Index<(usize, usize, usize)> for Field {
    type Output = f32;

    fn index(&self, (i, j, e): (usize, usize, usize)) -> &f32 {
        let idx = self.index_of(i, j, e);
        &self.values[idx]
    }
}

impl IndexMut<(usize, usize, usize)> for Field {
    fn index_mut(&mut self, (i, j, e): (usize, usize, usize)) -> &mut f32 {
        let idx = self.index_of(i, j, e);
        &mut self.values[idx]
    }
}
