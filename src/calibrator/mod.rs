pub mod cloud;
pub mod neighbourhood;
pub mod phase;
pub mod window;

pub use cloud::CloudCalibrator;
pub use neighbourhood::NeighbourhoodCalibrator;
pub use phase::{PhaseCalibrator, PrecipitationPhase};
pub use window::WindowCalibrator;

use crate::config::{ConfigError, Options};
use crate::field::FieldError;
use crate::io::{GridFile, GridFileError};
use crate::math::StatType;
use crate::parameters::ParameterSource;
use crate::variable::Variable;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Grid file error: {0}")]
    GridFile(#[from] GridFileError),

    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    #[error("Calibrator '{0}' requires a parameter file")]
    MissingParameterFile(String),

    #[error("Calibrator '{calibrator}': parameter file '{source_name}' has {found} parameters per entry, expected {expected}")]
    ParameterCount {
        calibrator: String,
        source_name: String,
        expected: usize,
        found: usize,
    },

    #[error("Calibrator '{calibrator}' needs {variable}, which is not in the file")]
    MissingField {
        calibrator: String,
        variable: Variable,
    },
}

/// Capability shared by every calibrator
pub trait Calibrate {
    fn name(&self) -> &'static str;

    /// Variable whose fields are written
    fn variable(&self) -> Variable;

    fn requires_parameter_file(&self) -> bool {
        false
    }

    /// Transform every timestep of the file. Callers go through
    /// [`Calibrator::calibrate`], which checks the parameter requirement first.
    fn calibrate_core(
        &self,
        file: &mut dyn GridFile,
        parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError>;
}

/// Closed set of calibration methods
#[derive(Debug, Clone, PartialEq)]
pub enum Calibrator {
    Window(WindowCalibrator),
    Phase(PhaseCalibrator),
    Cloud(CloudCalibrator),
    Neighbourhood(NeighbourhoodCalibrator),
}

impl Calibrator {
    pub const NAMES: [&'static str; 4] = [
        window::NAME,
        phase::NAME,
        cloud::NAME,
        neighbourhood::NAME,
    ];

    /// Build a calibrator from its name and options
    pub fn from_name(
        name: &str,
        variable: Variable,
        options: &Options,
    ) -> Result<Self, ConfigError> {
        match name {
            window::NAME => Ok(Calibrator::Window(WindowCalibrator::from_options(variable, options)?)),
            phase::NAME => Ok(Calibrator::Phase(PhaseCalibrator::from_options(variable, options)?)),
            cloud::NAME => Ok(Calibrator::Cloud(CloudCalibrator::from_options(variable, options)?)),
            neighbourhood::NAME => Ok(Calibrator::Neighbourhood(
                NeighbourhoodCalibrator::from_options(variable, options)?,
            )),
            _ => Err(ConfigError::UnknownCalibrator(name.to_string())),
        }
    }

    fn inner(&self) -> &dyn Calibrate {
        match self {
            Calibrator::Window(c) => c,
            Calibrator::Phase(c) => c,
            Calibrator::Cloud(c) => c,
            Calibrator::Neighbourhood(c) => c,
        }
    }

    /// Run the calibrator over the whole file
    pub fn calibrate(
        &self,
        file: &mut dyn GridFile,
        parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError> {
        if self.requires_parameter_file() && parameters.is_none() {
            return Err(CalibrationError::MissingParameterFile(self.name().to_string()));
        }

        info!("Calibrating {} using {}", self.variable(), self.name());
        let start = Instant::now();
        self.calibrate_core(file, parameters)?;
        info!(
            "Finished {} on {} ({} timesteps) in {:.2?}",
            self.name(),
            self.variable(),
            file.num_time(),
            start.elapsed()
        );
        Ok(())
    }

    /// Usage text for one calibrator
    pub fn description(name: &str, full: bool) -> Result<String, ConfigError> {
        match name {
            window::NAME => Ok(WindowCalibrator::description(full)),
            phase::NAME => Ok(PhaseCalibrator::description(full)),
            cloud::NAME => Ok(CloudCalibrator::description(full)),
            neighbourhood::NAME => Ok(NeighbourhoodCalibrator::description(full)),
            _ => Err(ConfigError::UnknownCalibrator(name.to_string())),
        }
    }

    /// Usage text for all calibrators
    pub fn describe_all(full: bool) -> String {
        let mut text = String::new();
        for name in Self::NAMES {
            if let Ok(description) = Self::description(name, full) {
                text.push_str(&description);
            }
        }
        text
    }
}

impl Calibrate for Calibrator {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn variable(&self) -> Variable {
        self.inner().variable()
    }

    fn requires_parameter_file(&self) -> bool {
        self.inner().requires_parameter_file()
    }

    fn calibrate_core(
        &self,
        file: &mut dyn GridFile,
        parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError> {
        self.inner().calibrate_core(file, parameters)
    }
}

/// What to write where a window or neighbourhood is cut by the domain edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// Use the part that lies inside the domain
    #[default]
    Compute,
    /// Write the missing value
    Missing,
}

impl FromStr for EdgePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compute" => Ok(EdgePolicy::Compute),
            "missing" => Ok(EdgePolicy::Missing),
            _ => Err("expected 'compute' or 'missing'".to_string()),
        }
    }
}

impl fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgePolicy::Compute => write!(f, "compute"),
            EdgePolicy::Missing => write!(f, "missing"),
        }
    }
}

/// Read `stat` and `quantile` as used by the window and neighbourhood calibrators
pub(crate) fn parse_stat(options: &Options) -> Result<StatType, ConfigError> {
    let stat = options.raw("stat").unwrap_or("mean");
    let quantile: Option<f32> = options.get("quantile")?;
    if quantile.is_some() && stat != "quantile" {
        return Err(ConfigError::invalid_value(
            "quantile",
            options.raw("quantile").unwrap_or_default(),
            "only used with stat=quantile",
        ));
    }
    match stat {
        "mean" => Ok(StatType::Mean),
        "std" => Ok(StatType::Std),
        "min" => Ok(StatType::Quantile(0.0)),
        "median" => Ok(StatType::Quantile(0.5)),
        "max" => Ok(StatType::Quantile(1.0)),
        "quantile" => {
            let q: f32 = options.get_required("quantile")?;
            if !(0.0..=1.0).contains(&q) {
                return Err(ConfigError::invalid_value("quantile", q, "must be in [0, 1]"));
            }
            Ok(StatType::Quantile(q))
        }
        other => Err(ConfigError::invalid_value(
            "stat",
            other,
            "expected mean, std, min, max, median or quantile",
        )),
    }
}

pub(crate) fn require_variable(
    file: &dyn GridFile,
    calibrator: &str,
    variable: Variable,
) -> Result<(), CalibrationError> {
    if !file.has_variable(variable) {
        return Err(CalibrationError::MissingField {
            calibrator: calibrator.to_string(),
            variable,
        });
    }
    Ok(())
}

/// One option line in a calibrator description
pub(crate) fn format_option(key: &str, help: &str) -> String {
    format!("      {:<26}{}\n", key, help)
}
