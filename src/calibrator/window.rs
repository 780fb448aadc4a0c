use super::{format_option, parse_stat, require_variable, Calibrate, CalibrationError, EdgePolicy};
use crate::config::{ConfigError, Options};
use crate::field::Field;
use crate::io::GridFile;
use crate::math::{calculate_stat, StatType};
use crate::parameters::ParameterSource;
use crate::variable::Variable;
use rayon::prelude::*;
use tracing::debug;

pub const NAME: &str = "window";
const OPTIONS: [&str; 5] = ["length", "before", "stat", "quantile", "edgePolicy"];

/// Temporal smoothing: each timestep is replaced by a statistic over a window
/// of neighbouring timesteps at the same grid point and member
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCalibrator {
    variable: Variable,
    length: usize,
    before: bool,
    stat: StatType,
    edge_policy: EdgePolicy,
}

impl WindowCalibrator {
    pub fn new(
        variable: Variable,
        length: usize,
        before: bool,
        stat: StatType,
        edge_policy: EdgePolicy,
    ) -> Result<Self, ConfigError> {
        if length == 0 {
            return Err(ConfigError::invalid_value("length", length, "must be at least 1"));
        }
        if !before && length % 2 == 0 {
            return Err(ConfigError::invalid_value(
                "length",
                length,
                "a centered window must have odd length",
            ));
        }
        Ok(Self {
            variable,
            length,
            before,
            stat,
            edge_policy,
        })
    }

    pub fn from_options(variable: Variable, options: &Options) -> Result<Self, ConfigError> {
        options.check_known(NAME, &OPTIONS)?;
        Self::new(
            variable,
            options.get_or("length", 7)?,
            options.get_bool("before", false)?,
            parse_stat(options)?,
            options.get_or("edgePolicy", EdgePolicy::Compute)?,
        )
    }

    /// Inclusive window `[start, end]` for timestep `t`, clipped to the time
    /// axis, and whether clipping happened
    fn bounds(&self, t: usize, num_time: usize) -> (usize, usize, bool) {
        let (back, forward) = if self.before {
            (self.length - 1, 0)
        } else {
            let half = (self.length - 1) / 2;
            (half, half)
        };
        let start = t.saturating_sub(back);
        let end = (t + forward).min(num_time - 1);
        let clipped = t < back || t + forward > num_time - 1;
        (start, end, clipped)
    }

    pub fn description(full: bool) -> String {
        let mut text = format!("{:<16}Applies a statistic over a window of timesteps\n", NAME);
        if full {
            text.push_str(&format_option("length=7", "Window length in timesteps; odd when centered"));
            text.push_str(&format_option("before=0", "1 for a trailing window ending at the current time"));
            text.push_str(&format_option(
                "stat=mean",
                "One of mean, std, min, max, median, quantile",
            ));
            text.push_str(&format_option("quantile=undef", "Quantile in [0, 1] when stat=quantile"));
            text.push_str(&format_option(
                "edgePolicy=compute",
                "compute: use the part of the window inside the run; missing: write missing values",
            ));
        }
        text
    }
}

impl Calibrate for WindowCalibrator {
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
        require_variable(file, NAME, self.variable)?;
        let num_time = file.num_time();

        // Every input is read before the first output is stored
        let inputs = (0..num_time)
            .map(|t| file.get_field(self.variable, t))
            .collect::<Result<Vec<Field>, _>>()?;

        for t in 0..num_time {
            let (start, end, clipped) = self.bounds(t, num_time);
            let mut output = file.empty_field()?;
            if clipped && self.edge_policy == EdgePolicy::Missing {
                debug!("Window for time {} is clipped, writing missing values", t);
            } else {
                debug!("Computing {} window [{}, {}] for time {}", NAME, start, end, t);
                self.compute(&inputs[start..=end], &mut output);
            }
            file.add_field(output, self.variable, t)?;
        }
        Ok(())
    }
}

impl WindowCalibrator {
    fn compute(&self, window: &[Field], output: &mut Field) {
        let (n_lon, n_ens) = (output.n_lon(), output.n_ens());
        let stat = self.stat;
        output.par_rows_mut().for_each(|(i, row)| {
            let mut values = Vec::with_capacity(window.len());
            for j in 0..n_lon {
                for e in 0..n_ens {
                    values.clear();
                    values.extend(window.iter().map(|field| field[(i, j, e)]));
                    row[j * n_ens + e] = calculate_stat(&mut values, stat);
                }
            }
        });
    }
}
