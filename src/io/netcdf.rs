use super::{GridFile, GridFileError, MemoryGridFile};
use crate::field::{is_valid, Field, MV};
use crate::variable::Variable;
use chrono::Utc;
use ndarray::Array2;
use netcdf::AttributeValue;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIME_DIM: &str = "time";
const Y_DIM: &str = "y";
const X_DIM: &str = "x";
const ENS_DIM: &str = "ensemble_member";

/// Name of a variable inside NetCDF files
pub fn native_name(variable: Variable) -> &'static str {
    match variable {
        Variable::T => "air_temperature_2m",
        Variable::TMin => "air_temperature_2m_min",
        Variable::TMax => "air_temperature_2m_max",
        Variable::Precip => "precipitation_amount",
        Variable::Cloud => "cloud_area_fraction",
        Variable::U => "x_wind_10m",
        Variable::V => "y_wind_10m",
        Variable::W => "windspeed_10m",
        Variable::RH => "relative_humidity_2m",
        Variable::P => "surface_air_pressure",
        Variable::MSLP => "air_pressure_at_sea_level",
        Variable::Phase => "precipitation_phase",
        Variable::Pop => "probability_of_precipitation",
    }
}

/// Variable stored under a NetCDF name
pub fn variable_from_native(name: &str) -> Option<Variable> {
    Variable::ALL.iter().copied().find(|&v| native_name(v) == name)
}

fn nc_error(error: netcdf::Error) -> GridFileError {
    GridFileError::Netcdf(error.to_string())
}

/// Where the ensemble axis sits in a variable, after the time axis
#[derive(Debug, Clone, Copy, PartialEq)]
enum Layout {
    /// (time, y, x) or (time, level, y, x) with a single level
    NoEnsemble,
    /// (time, ensemble_member, y, x)
    EnsembleFirst,
    /// (time, y, x, ensemble_member)
    EnsembleLast,
}

impl Layout {
    fn from_dimensions(name: &str, dims: &[String]) -> Result<Self, GridFileError> {
        match (dims.len(), dims.iter().position(|d| d == ENS_DIM)) {
            (3, None) | (4, None) => Ok(Layout::NoEnsemble),
            (4, Some(1)) => Ok(Layout::EnsembleFirst),
            (4, Some(3)) => Ok(Layout::EnsembleLast),
            _ => Err(GridFileError::Netcdf(format!(
                "Variable '{}' has unsupported dimensions {:?}",
                name, dims
            ))),
        }
    }

    fn raw_len(self, ny: usize, nx: usize, ne: usize) -> usize {
        match self {
            Layout::NoEnsemble => ny * nx,
            Layout::EnsembleFirst | Layout::EnsembleLast => ny * nx * ne,
        }
    }

    fn raw_index(self, i: usize, j: usize, e: usize, ny: usize, nx: usize, ne: usize) -> usize {
        match self {
            Layout::NoEnsemble => i * nx + j,
            Layout::EnsembleFirst => (e * ny + i) * nx + j,
            Layout::EnsembleLast => (i * nx + j) * ne + e,
        }
    }
}

/// Packing attributes of a variable
#[derive(Debug, Clone, Copy)]
struct Encoding {
    fill_value: Option<f32>,
    scale: f32,
    offset: f32,
}

impl Encoding {
    fn read(var: &netcdf::Variable<'_>) -> Self {
        Self {
            fill_value: attribute_f32(var, "_FillValue"),
            scale: attribute_f32(var, "scale_factor").unwrap_or(1.0),
            offset: attribute_f32(var, "add_offset").unwrap_or(0.0),
        }
    }

    fn decode(&self, raw: f32) -> f32 {
        if self.fill_value == Some(raw) || !raw.is_finite() {
            MV
        } else {
            self.scale * raw + self.offset
        }
    }

    fn encode(&self, value: f32) -> f32 {
        if is_valid(value) {
            (value - self.offset) / self.scale
        } else {
            self.fill_value.unwrap_or(MV)
        }
    }
}

fn attribute_f32(var: &netcdf::Variable<'_>, name: &str) -> Option<f32> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Float(v) => Some(v),
        AttributeValue::Double(v) => Some(v as f32),
        AttributeValue::Short(v) => Some(v as f32),
        AttributeValue::Int(v) => Some(v as f32),
        AttributeValue::Floats(v) => v.first().copied(),
        AttributeValue::Doubles(v) => v.first().map(|&x| x as f32),
        _ => None,
    }
}

/// Grid file backed by a NetCDF file
///
/// Fields are read lazily into an in-memory store through the handle opened
/// by `open`; `write` puts every modified variable back into the file.
pub struct NetcdfGridFile {
    path: PathBuf,
    reader: Option<netcdf::File>,
    store: MemoryGridFile,
    on_disk: BTreeSet<Variable>,
    modified: BTreeSet<Variable>,
    has_ensemble_dim: bool,
}

impl NetcdfGridFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GridFileError> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path).map_err(nc_error)?;

        let dim_len = |name: &str| file.dimension(name).map(|d| d.len());
        let required = |name: &str| {
            dim_len(name).ok_or_else(|| GridFileError::MissingDimension(name.to_string()))
        };
        let num_time = required(TIME_DIM)?;
        let num_y = required(Y_DIM)?;
        let num_x = required(X_DIM)?;
        let has_ensemble_dim = dim_len(ENS_DIM).is_some();
        let num_ens = dim_len(ENS_DIM).unwrap_or(1);

        let lats = read_grid(&file, "latitude", num_y, num_x)?
            .ok_or_else(|| GridFileError::MissingVariable("latitude".to_string()))?;
        let lons = read_grid(&file, "longitude", num_y, num_x)?
            .ok_or_else(|| GridFileError::MissingVariable("longitude".to_string()))?;
        let elevs = read_grid(&file, "altitude", num_y, num_x)?
            .unwrap_or_else(|| Array2::zeros((num_y, num_x)));

        let on_disk: BTreeSet<Variable> = Variable::ALL
            .iter()
            .copied()
            .filter(|&v| file.variable(native_name(v)).is_some())
            .collect();

        info!(
            "File '{}' has dimensions time={} y={} x={} ensemble_member={}",
            path.display(),
            num_time,
            num_y,
            num_x,
            num_ens
        );

        let store = MemoryGridFile::new(num_time, num_y, num_x, num_ens)
            .with_coordinates(lats, lons, elevs)?;

        Ok(Self {
            path,
            reader: Some(file),
            store,
            on_disk,
            modified: BTreeSet::new(),
            has_ensemble_dim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read handle, reopened after `write` closed it
    fn reader(&mut self) -> Result<&netcdf::File, GridFileError> {
        let file = match self.reader.take() {
            Some(file) => file,
            None => {
                debug!("Reopening '{}'", self.path.display());
                netcdf::open(&self.path).map_err(nc_error)?
            }
        };
        Ok(self.reader.insert(file))
    }

    fn read_field(&mut self, variable: Variable, time: usize) -> Result<Field, GridFileError> {
        let name = native_name(variable);
        let (ny, nx, ne) = (self.num_y(), self.num_x(), self.num_ens());
        let mut field = self.store.empty_field()?;

        let file = self.reader()?;
        let var = file
            .variable(name)
            .ok_or_else(|| GridFileError::MissingVariable(name.to_string()))?;
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let layout = Layout::from_dimensions(name, &dims)?;
        let encoding = Encoding::read(&var);

        let raw: Vec<f32> = if dims.len() == 3 {
            var.get_values((time, .., ..)).map_err(nc_error)?
        } else {
            var.get_values((time, .., .., ..)).map_err(nc_error)?
        };

        if raw.len() != layout.raw_len(ny, nx, ne) {
            return Err(GridFileError::Netcdf(format!(
                "Variable '{}' has {} values per time, expected {}",
                name,
                raw.len(),
                layout.raw_len(ny, nx, ne)
            )));
        }

        for i in 0..ny {
            for j in 0..nx {
                for e in 0..ne {
                    field[(i, j, e)] = encoding.decode(raw[layout.raw_index(i, j, e, ny, nx, ne)]);
                }
            }
        }
        debug!("Read {} at time {}", name, time);
        Ok(field)
    }

    /// Store all modified variables in the file, creating them if needed
    pub fn write(&mut self) -> Result<(), GridFileError> {
        if self.modified.is_empty() {
            return Ok(());
        }
        // the read handle must be closed before the file is opened for writing
        self.reader = None;
        let mut file = netcdf::append(&self.path).map_err(nc_error)?;
        let (ny, nx, ne) = (self.num_y(), self.num_x(), self.num_ens());

        for &variable in &self.modified {
            let name = native_name(variable);
            if file.variable(name).is_none() {
                let dims: &[&str] = if self.has_ensemble_dim {
                    &[TIME_DIM, ENS_DIM, Y_DIM, X_DIM]
                } else {
                    &[TIME_DIM, Y_DIM, X_DIM]
                };
                let mut var = file.add_variable::<f32>(name, dims).map_err(nc_error)?;
                var.put_attribute("_FillValue", MV).map_err(nc_error)?;
                var.put_attribute("units", variable.units())
                    .map_err(nc_error)?;
            }

            let mut var = file
                .variable_mut(name)
                .ok_or_else(|| GridFileError::MissingVariable(name.to_string()))?;
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let layout = Layout::from_dimensions(name, &dims)?;
            let encoding = Encoding::read(&var);

            for time in 0..self.store.num_time() {
                let Some(field) = self.store.field(variable, time) else {
                    continue;
                };
                let mut raw = vec![encoding.encode(MV); layout.raw_len(ny, nx, ne)];
                for i in 0..ny {
                    for j in 0..nx {
                        for e in 0..ne {
                            let index = layout.raw_index(i, j, e, ny, nx, ne);
                            // deterministic layouts keep the first member
                            if layout != Layout::NoEnsemble || e == 0 {
                                raw[index] = encoding.encode(field[(i, j, e)]);
                            }
                        }
                    }
                }
                if dims.len() == 3 {
                    var.put_values(&raw, (time, .., ..)).map_err(nc_error)?;
                } else {
                    var.put_values(&raw, (time, .., .., ..)).map_err(nc_error)?;
                }
            }
            info!("Wrote {} to '{}'", name, self.path.display());
        }

        let previous = match file.attribute("history").and_then(|a| a.value().ok()) {
            Some(AttributeValue::Str(text)) => format!("{}\n", text),
            _ => String::new(),
        };
        let entry = format!(
            "{}{}: calibrated {}",
            previous,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.modified
                .iter()
                .map(|v| v.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        file.add_attribute("history", entry).map_err(nc_error)?;

        self.on_disk.extend(self.modified.iter().copied());
        self.modified.clear();
        Ok(())
    }
}

fn read_grid(
    file: &netcdf::File,
    name: &'static str,
    num_y: usize,
    num_x: usize,
) -> Result<Option<Array2<f32>>, GridFileError> {
    let Some(var) = file.variable(name) else {
        return Ok(None);
    };
    let values: Vec<f32> = var.get_values(..).map_err(nc_error)?;
    let grid = if values.len() == num_y * num_x {
        Array2::from_shape_vec((num_y, num_x), values)
            .map_err(|e| GridFileError::Netcdf(e.to_string()))?
    } else if values.len() == num_y && name == "latitude" {
        Array2::from_shape_fn((num_y, num_x), |(i, _)| values[i])
    } else if values.len() == num_x && name == "longitude" {
        Array2::from_shape_fn((num_y, num_x), |(_, j)| values[j])
    } else {
        return Err(GridFileError::CoordinateShape {
            name,
            expected: (num_y, num_x),
            found: (values.len(), 1),
        });
    };
    Ok(Some(grid))
}

impl GridFile for NetcdfGridFile {
    fn num_time(&self) -> usize {
        self.store.num_time()
    }

    fn num_y(&self) -> usize {
        self.store.num_y()
    }

    fn num_x(&self) -> usize {
        self.store.num_x()
    }

    fn num_ens(&self) -> usize {
        self.store.num_ens()
    }

    fn lats(&self) -> &Array2<f32> {
        self.store.lats()
    }

    fn lons(&self) -> &Array2<f32> {
        self.store.lons()
    }

    fn elevs(&self) -> &Array2<f32> {
        self.store.elevs()
    }

    fn has_variable(&self, variable: Variable) -> bool {
        self.on_disk.contains(&variable) || self.store.has_variable(variable)
    }

    fn get_field(&mut self, variable: Variable, time: usize) -> Result<Field, GridFileError> {
        let cached = self.store.field(variable, time).is_some();
        if !cached && self.on_disk.contains(&variable) && time < self.num_time() {
            let field = self.read_field(variable, time)?;
            self.store.add_field(field, variable, time)?;
        }
        self.store.get_field(variable, time)
    }

    fn add_field(
        &mut self,
        field: Field,
        variable: Variable,
        time: usize,
    ) -> Result<(), GridFileError> {
        self.store.add_field(field, variable, time)?;
        self.modified.insert(variable);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One row of two points, two timesteps of T and Precip
    fn create_file(path: &Path) {
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension(TIME_DIM, 2).unwrap();
        file.add_dimension(Y_DIM, 1).unwrap();
        file.add_dimension(X_DIM, 2).unwrap();
        let mut var = file.add_variable::<f32>("latitude", &[Y_DIM, X_DIM]).unwrap();
        var.put_values(&[60.0f32, 60.0], ..).unwrap();
        let mut var = file.add_variable::<f32>("longitude", &[Y_DIM, X_DIM]).unwrap();
        var.put_values(&[10.0f32, 11.0], ..).unwrap();
        let mut var = file
            .add_variable::<f32>(native_name(Variable::T), &[TIME_DIM, Y_DIM, X_DIM])
            .unwrap();
        var.put_values(&[270.0f32, 271.0, 272.0, 273.0], ..).unwrap();
        let mut var = file
            .add_variable::<f32>(native_name(Variable::Precip), &[TIME_DIM, Y_DIM, X_DIM])
            .unwrap();
        var.put_values(&[0.0f32, 1.0, 2.0, 3.0], ..).unwrap();
    }

    #[test]
    fn test_reads_reuse_open_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.nc");
        create_file(&path);

        let mut file = NetcdfGridFile::open(&path).unwrap();
        assert!(file.reader.is_some());
        assert_eq!(file.get_field(Variable::T, 0).unwrap().values(), &[270.0, 271.0]);
        assert_eq!(file.get_field(Variable::T, 1).unwrap().values(), &[272.0, 273.0]);
        assert!(file.reader.is_some());

        let mut field = file.get_field(Variable::T, 1).unwrap();
        field[(0, 0, 0)] = 280.0;
        file.add_field(field, Variable::T, 1).unwrap();
        file.write().unwrap();
        assert!(file.reader.is_none());

        // fields not yet cached are read through a new handle
        assert_eq!(file.get_field(Variable::Precip, 1).unwrap().values(), &[2.0, 3.0]);
        assert!(file.reader.is_some());
        drop(file);

        let mut reopened = NetcdfGridFile::open(&path).unwrap();
        assert_eq!(reopened.get_field(Variable::T, 1).unwrap()[(0, 0, 0)], 280.0);
        assert_eq!(reopened.get_field(Variable::T, 0).unwrap()[(0, 0, 0)], 270.0);
    }

    #[test]
    fn test_native_names_round_trip() {
        for variable in Variable::ALL {
            assert_eq!(variable_from_native(native_name(variable)), Some(variable));
        }
        assert_eq!(variable_from_native("unknown"), None);
    }

    #[test]
    fn test_layout_indices() {
        let dims = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let layout = Layout::from_dimensions("v", &dims(&["time", "ensemble_member", "y", "x"])).unwrap();
        assert_eq!(layout, Layout::EnsembleFirst);
        assert_eq!(layout.raw_index(1, 2, 1, 2, 3, 2), 6 + 3 + 2);
        let layout = Layout::from_dimensions("v", &dims(&["time", "y", "x"])).unwrap();
        assert_eq!(layout, Layout::NoEnsemble);
        assert!(Layout::from_dimensions("v", &dims(&["time", "x"])).is_err());
    }

    #[test]
    fn test_encoding() {
        let encoding = Encoding {
            fill_value: Some(-32767.0),
            scale: 0.5,
            offset: 10.0,
        };
        assert_eq!(encoding.decode(-32767.0), MV);
        assert_eq!(encoding.decode(4.0), 12.0);
        assert_eq!(encoding.encode(12.0), 4.0);
        assert_eq!(encoding.encode(MV), -32767.0);
    }
}
