use crate::calibrator::{Calibrate, CalibrationError, Calibrator};
use crate::config::{Config, ConfigError};
use crate::io::GridFile;
use crate::parameters::ParameterSource;
use std::time::Instant;
use tracing::info;

/// Ordered calibrators applied one after another to the same file
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    calibrators: Vec<Calibrator>,
}

impl Pipeline {
    pub fn new(calibrators: Vec<Calibrator>) -> Self {
        Self { calibrators }
    }

    /// Build every step of a command line configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let calibrators = config
            .steps
            .iter()
            .map(|step| Calibrator::from_name(&step.calibrator, step.variable, &step.options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(calibrators))
    }

    pub fn push(&mut self, calibrator: Calibrator) {
        self.calibrators.push(calibrator);
    }

    pub fn calibrators(&self) -> &[Calibrator] {
        &self.calibrators
    }

    pub fn len(&self) -> usize {
        self.calibrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calibrators.is_empty()
    }

    pub fn requires_parameter_file(&self) -> bool {
        self.calibrators.iter().any(|c| c.requires_parameter_file())
    }

    /// Check every step's requirements without touching any file
    pub fn validate(&self, parameters: Option<&dyn ParameterSource>) -> Result<(), CalibrationError> {
        if parameters.is_some() {
            return Ok(());
        }
        match self.calibrators.iter().find(|c| c.requires_parameter_file()) {
            Some(calibrator) => Err(CalibrationError::MissingParameterFile(
                calibrator.name().to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Apply all calibrators in order. Stops at the first failure; steps
    /// already applied stay applied.
    pub fn run(
        &self,
        file: &mut dyn GridFile,
        parameters: Option<&dyn ParameterSource>,
    ) -> Result<(), CalibrationError> {
        self.validate(parameters)?;

        let start = Instant::now();
        for (index, calibrator) in self.calibrators.iter().enumerate() {
            info!(
                "Step {}/{}: {}",
                index + 1,
                self.calibrators.len(),
                calibrator.name()
            );
            calibrator.calibrate(file, parameters)?;
        }
        info!(
            "Pipeline of {} steps finished in {:.2?}",
            self.calibrators.len(),
            start.elapsed()
        );
        Ok(())
    }
}
