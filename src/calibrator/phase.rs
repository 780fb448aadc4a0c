use super::{format_option, require_variable, Calibrate, CalibrationError};
use crate::config::{ConfigError, Options};
use crate::field::{is_valid, Field, MV};
use crate::io::GridFile;
use crate::math::physics::{standard_pressure, wetbulb};
use crate::parameters::{Location, ParameterSource, Parameters};
use crate::variable::Variable;
use rayon::prelude::*;
use tracing::{debug, warn};

pub const NAME: &str = "phase";
const OPTIONS: [&str; 6] = [
    "temperatureVariable",
    "precipitationVariable",
    "rhVariable",
    "pressureVariable",
    "estimatePressure",
    "minPrecip",
];
/// Coefficients per entry: snow/sleet threshold, sleet/rain threshold
const NUM_PARAMETERS: usize = 2;

/// Precipitation phase codes written to the output field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecipitationPhase {
    None = 0,
    Rain = 1,
    Sleet = 2,
    Snow = 3,
}

impl PrecipitationPhase {
    pub fn code(self) -> f32 {
        self as i32 as f32
    }
}

/// Classifies precipitation into rain, sleet or snow using two temperature
/// thresholds from a parameter file
///
/// The classification temperature is the wetbulb temperature when relative
/// humidity and pressure are available, otherwise the dry-bulb temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCalibrator {
    variable: Variable,
    temperature: Variable,
    precipitation: Variable,
    rh: Option<Variable>,
    pressure: Option<Variable>,
    estimate_pressure: bool,
    min_precip: f32,
}

impl PhaseCalibrator {
    pub fn from_options(variable: Variable, options: &Options) -> Result<Self, ConfigError> {
        options.check_known(NAME, &OPTIONS)?;
        let calibrator = Self {
            variable,
            temperature: options.get_required("temperatureVariable")?,
            precipitation: options.get_required("precipitationVariable")?,
            rh: options.get("rhVariable")?,
            pressure: options.get("pressureVariable")?,
            estimate_pressure: options.get_bool("estimatePressure", false)?,
            min_precip: options.get_or("minPrecip", 0.2)?,
        };
        if calibrator.inputs().any(|input| input == variable) {
            return Err(ConfigError::Invalid(format!(
                "Calibrator '{}' cannot write {}, which is one of its inputs",
                NAME, variable
            )));
        }
        Ok(calibrator)
    }

    fn inputs(&self) -> impl Iterator<Item = Variable> + '_ {
        [self.temperature, self.precipitation]
            .into_iter()
            .chain(self.rh)
            .chain(self.pressure)
    }

    fn uses_wetbulb(&self) -> bool {
        self.rh.is_some() && (self.pressure.is_some() || self.estimate_pressure)
    }

    /// Phase code for one cell
    fn classify(
        &self,
        precip: f32,
        temperature: f32,
        wetbulb_inputs: Option<(f32, f32)>,
        thresholds: Option<&Parameters>,
    ) -> f32 {
        if !is_valid(precip) {
            return MV;
        }
        if precip <= self.min_precip {
            return PrecipitationPhase::None.code();
        }
        let (snow_sleet, sleet_rain) = match thresholds.map(Parameters::values) {
            Some(&[a, b]) if is_valid(a) && is_valid(b) => (a, b),
            _ => return MV,
        };

        let temperature = match wetbulb_inputs {
            Some((pressure, rh)) if is_valid(temperature) && is_valid(pressure) && is_valid(rh) => {
                wetbulb(temperature, pressure, rh)
            }
            _ => temperature,
        };
        if !is_valid(temperature) {
            return MV;
        }

        let phase = if temperature <= snow_sleet {
            PrecipitationPhase::Snow
        } else if temperature <= sleet_rain {
            PrecipitationPhase::Sleet
        } else {
            PrecipitationPhase::Rain
        };
        phase.code()
    }

    pub fn description(full: bool) -> String {
        let mut text = format!(
            "{:<16}Diagnoses precipitation phase (0 none, 1 rain, 2 sleet, 3 snow) from temperature\n",
            NAME
        );
        if full {
            text.push_str(&format_option("temperatureVariable=required", "Dry-bulb temperature variable (K)"));
            text.push_str(&format_option("precipitationVariable=required", "Precipitation variable"));
            text.push_str(&format_option("rhVariable=undef", "Relative humidity variable; enables wetbulb"));
            text.push_str(&format_option("pressureVariable=undef", "Surface pressure variable (Pa)"));
            text.push_str(&format_option(
                "estimatePressure=0",
                "1 to derive pressure from elevation when no pressure variable is given",
            ));
            text.push_str(&format_option("minPrecip=0.2", "Precipitation at or below this has no phase"));
            text.push_str(&format_option(
                "parameters",
                "Two per entry: snow/sleet threshold, sleet/rain threshold",
            ));
        }
        text
    }
}

impl Calibrate for PhaseCalibrator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn variable(&self) -> Variable {
        self.variable
    }

    fn requires_parameter_file(&self) -> bool {
        true
    }

    fn calibrate_core(
        &self,
        file: &mut dyn GridFile,
        parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError> {
        let parameters =
            parameters.ok_or_else(|| CalibrationError::MissingParameterFile(NAME.to_string()))?;
        match parameters.num_parameters() {
            Some(found) if found != NUM_PARAMETERS => {
                return Err(CalibrationError::ParameterCount {
                    calibrator: NAME.to_string(),
                    source_name: parameters.name().to_string(),
                    expected: NUM_PARAMETERS,
                    found,
                });
            }
            Some(_) => {}
            None => warn!(
                "Parameter file '{}' is empty, phase will be missing everywhere",
                parameters.name()
            ),
        }

        require_variable(file, NAME, self.temperature)?;
        require_variable(file, NAME, self.precipitation)?;
        let use_wetbulb = self.uses_wetbulb();
        if use_wetbulb {
            for variable in self.rh.iter().chain(self.pressure.iter()) {
                require_variable(file, NAME, *variable)?;
            }
        }

        let lats = file.lats().clone();
        let lons = file.lons().clone();
        let elevs = file.elevs().clone();
        let location_dependent = parameters.is_location_dependent();

        for t in 0..file.num_time() {
            debug!("Computing phase for time {}", t);
            let temperature = file.get_field(self.temperature, t)?;
            let precip = file.get_field(self.precipitation, t)?;
            let (rh, pressure): (Option<Field>, Option<Field>) = match (self.rh, use_wetbulb) {
                (Some(rh), true) => (
                    Some(file.get_field(rh, t)?),
                    self.pressure.map(|p| file.get_field(p, t)).transpose()?,
                ),
                _ => (None, None),
            };
            let fixed = if location_dependent {
                None
            } else {
                parameters.parameters(t)
            };

            let mut output = file.empty_field()?;
            let (n_lon, n_ens) = (output.n_lon(), output.n_ens());
            output.par_rows_mut().for_each(|(i, row)| {
                for j in 0..n_lon {
                    let elev = elevs[[i, j]];
                    let thresholds = if location_dependent {
                        parameters.parameters_at(t, &Location::new(lats[[i, j]], lons[[i, j]], elev))
                    } else {
                        fixed
                    };
                    for e in 0..n_ens {
                        let wetbulb_inputs = rh.as_ref().map(|rh| {
                            let p = match &pressure {
                                Some(pressure) => pressure[(i, j, e)],
                                None => standard_pressure(elev),
                            };
                            (p, rh[(i, j, e)])
                        });
                        row[j * n_ens + e] = self.classify(
                            precip[(i, j, e)],
                            temperature[(i, j, e)],
                            wetbulb_inputs,
                            thresholds,
                        );
                    }
                }
            });
            file.add_field(output, self.variable, t)?;
        }
        Ok(())
    }
}
