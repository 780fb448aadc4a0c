use crate::field::{Field, FieldError, MV};
use crate::variable::Variable;
use ndarray::Array2;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf;

pub use memory::MemoryGridFile;
#[cfg(feature = "netcdf")]
pub use self::netcdf::NetcdfGridFile;

/// Errors raised by grid file implementations
#[derive(Error, Debug)]
pub enum GridFileError {
    #[error("NetCDF error: {0}")]
    Netcdf(String),

    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    #[error("Dimension not found: {0}")]
    MissingDimension(String),

    #[error("Variable not found: {0}")]
    MissingVariable(String),

    #[error("Field for {variable} has shape {found:?}, file expects {expected:?}")]
    ShapeMismatch {
        variable: Variable,
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Time index {time} out of range, file has {num_time} times")]
    TimeOutOfRange { time: usize, num_time: usize },

    #[error("Coordinate '{name}' has shape {found:?}, expected {expected:?}")]
    CoordinateShape {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Gridded forecast data, one `Field` per (variable, time)
///
/// Calibrators only see files through this trait. Y is the latitude axis of
/// a field and X the longitude axis.
pub trait GridFile {
    fn num_time(&self) -> usize;
    fn num_y(&self) -> usize;
    fn num_x(&self) -> usize;
    fn num_ens(&self) -> usize;

    /// Latitude of each grid point, shape (Y, X)
    fn lats(&self) -> &Array2<f32>;
    /// Longitude of each grid point, shape (Y, X)
    fn lons(&self) -> &Array2<f32>;
    /// Elevation (m) of each grid point, shape (Y, X)
    fn elevs(&self) -> &Array2<f32>;

    /// Whether the file holds any data for the variable
    fn has_variable(&self, variable: Variable) -> bool;

    /// Field for a variable and time; an all-missing field if there is no data
    fn get_field(&mut self, variable: Variable, time: usize) -> Result<Field, GridFileError>;

    /// Store a field, replacing any existing one for (variable, time)
    fn add_field(
        &mut self,
        field: Field,
        variable: Variable,
        time: usize,
    ) -> Result<(), GridFileError>;

    /// Missing-valued field with this file's dimensions
    fn empty_field(&self) -> Result<Field, FieldError> {
        Field::new(self.num_y(), self.num_x(), self.num_ens(), MV)
    }
}
