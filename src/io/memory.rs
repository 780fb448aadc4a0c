use super::{GridFile, GridFileError};
use crate::field::Field;
use crate::variable::Variable;
use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};

/// Grid file held entirely in memory
///
/// Serves as the field store behind file adapters and as a standalone file
/// for pipelines built in code.
#[derive(Debug, Clone)]
pub struct MemoryGridFile {
    num_time: usize,
    num_y: usize,
    num_x: usize,
    num_ens: usize,
    lats: Array2<f32>,
    lons: Array2<f32>,
    elevs: Array2<f32>,
    fields: HashMap<(Variable, usize), Field>,
}

impl MemoryGridFile {
    /// Empty file with all coordinates set to zero
    pub fn new(num_time: usize, num_y: usize, num_x: usize, num_ens: usize) -> Self {
        Self {
            num_time,
            num_y,
            num_x,
            num_ens,
            lats: Array2::zeros((num_y, num_x)),
            lons: Array2::zeros((num_y, num_x)),
            elevs: Array2::zeros((num_y, num_x)),
            fields: HashMap::new(),
        }
    }

    /// Set coordinate grids; each must have shape (Y, X)
    pub fn with_coordinates(
        mut self,
        lats: Array2<f32>,
        lons: Array2<f32>,
        elevs: Array2<f32>,
    ) -> Result<Self, GridFileError> {
        let expected = (self.num_y, self.num_x);
        for (name, grid) in [("latitude", &lats), ("longitude", &lons), ("altitude", &elevs)] {
            if grid.dim() != expected {
                return Err(GridFileError::CoordinateShape {
                    name,
                    expected,
                    found: grid.dim(),
                });
            }
        }
        self.lats = lats;
        self.lons = lons;
        self.elevs = elevs;
        Ok(self)
    }

    /// Variables with at least one stored field, in order
    pub fn variables(&self) -> Vec<Variable> {
        let variables: BTreeSet<Variable> = self.fields.keys().map(|&(v, _)| v).collect();
        variables.into_iter().collect()
    }

    /// Borrow a stored field without copying
    pub fn field(&self, variable: Variable, time: usize) -> Option<&Field> {
        self.fields.get(&(variable, time))
    }

    fn check_time(&self, time: usize) -> Result<(), GridFileError> {
        if time >= self.num_time {
            return Err(GridFileError::TimeOutOfRange {
                time,
                num_time: self.num_time,
            });
        }
        Ok(())
    }
}

impl GridFile for MemoryGridFile {
    fn num_time(&self) -> usize {
        self.num_time
    }

    fn num_y(&self) -> usize {
        self.num_y
    }

    fn num_x(&self) -> usize {
        self.num_x
    }

    fn num_ens(&self) -> usize {
        self.num_ens
    }

    fn lats(&self) -> &Array2<f32> {
        &self.lats
    }

    fn lons(&self) -> &Array2<f32> {
        &self.lons
    }

    fn elevs(&self) -> &Array2<f32> {
        &self.elevs
    }

    fn has_variable(&self, variable: Variable) -> bool {
        self.fields.keys().any(|&(v, _)| v == variable)
    }

    fn get_field(&mut self, variable: Variable, time: usize) -> Result<Field, GridFileError> {
        self.check_time(time)?;
        match self.fields.get(&(variable, time)) {
            Some(field) => Ok(field.clone()),
            None => Ok(self.empty_field()?),
        }
    }

    fn add_field(
        &mut self,
        field: Field,
        variable: Variable,
        time: usize,
    ) -> Result<(), GridFileError> {
        self.check_time(time)?;
        let expected = (self.num_y, self.num_x, self.num_ens);
        if field.shape() != expected {
            return Err(GridFileError::ShapeMismatch {
                variable,
                expected,
                found: field.shape(),
            });
        }
        self.fields.insert((variable, time), field);
        Ok(())
    }
}
