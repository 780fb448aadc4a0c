use super::{require_variable, Calibrate, CalibrationError};
use crate::config::{ConfigError, Options};
use crate::field::is_valid;
use crate::io::GridFile;
use crate::parameters::ParameterSource;
use crate::variable::Variable;
use rayon::prelude::*;
use tracing::debug;

pub const NAME: &str = "cloud";

/// Sets cloud cover to full wherever it precipitates
#[derive(Debug, Clone, PartialEq)]
pub struct CloudCalibrator {
    variable: Variable,
}

impl CloudCalibrator {
    pub fn new(variable: Variable) -> Self {
        Self { variable }
    }

    pub fn from_options(variable: Variable, options: &Options) -> Result<Self, ConfigError> {
        options.check_known(NAME, &[])?;
        if variable == Variable::Precip {
            return Err(ConfigError::Invalid(format!(
                "Calibrator '{}' reads {} and cannot write it",
                NAME, variable
            )));
        }
        Ok(Self::new(variable))
    }

    pub fn description(_full: bool) -> String {
        format!(
            "{:<16}Sets cloud cover to 1 where there is precipitation; no options\n",
            NAME
        )
    }
}

impl Calibrate for CloudCalibrator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn variable(&self) -> Variable {
        self.variable
    }

    fn calibrate_core(
        &self,
        file: &mut dyn GridFile,
        _parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError> {
        require_variable(file, NAME, Variable::Precip)?;
        require_variable(file, NAME, self.variable)?;

        for t in 0..file.num_time() {
            let precip = file.get_field(Variable::Precip, t)?;
            let mut cloud = file.get_field(self.variable, t)?;
            let (n_lon, n_ens) = (cloud.n_lon(), cloud.n_ens());

            let changed: usize = cloud
                .par_rows_mut()
                .map(|(i, row)| {
                    let mut changed = 0;
                    for j in 0..n_lon {
                        let members = precip.ensemble(i, j);
                        for (e, &p) in members.iter().enumerate() {
                            let c = &mut row[j * n_ens + e];
                            if is_valid(p) && p > 0.0 && is_valid(*c) && *c < 1.0 {
                                *c = 1.0;
                                changed += 1;
                            }
                        }
                    }
                    changed
                })
                .sum();
            debug!("Time {}: raised cloud cover in {} cells", t, changed);

            file.add_field(cloud, self.variable, t)?;
        }
        Ok(())
    }
}
