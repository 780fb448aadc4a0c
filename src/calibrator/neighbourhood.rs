use super::{format_option, parse_stat, require_variable, Calibrate, CalibrationError, EdgePolicy};
use crate::config::{ConfigError, Options};
use crate::field::{Field, MV};
use crate::io::GridFile;
use crate::math::{calculate_stat, StatType};
use crate::parameters::ParameterSource;
use crate::variable::Variable;
use rayon::prelude::*;
use tracing::debug;

pub const NAME: &str = "neighbourhood";
const OPTIONS: [&str; 4] = ["radius", "stat", "quantile", "edgePolicy"];

/// Spatial smoothing: each cell becomes a statistic over the square box of
/// cells within `radius` grid points, separately for each member
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourhoodCalibrator {
    variable: Variable,
    radius: usize,
    stat: StatType,
    edge_policy: EdgePolicy,
}

impl NeighbourhoodCalibrator {
    pub fn new(variable: Variable, radius: usize, stat: StatType, edge_policy: EdgePolicy) -> Self {
        Self {
            variable,
            radius,
            stat,
            edge_policy,
        }
    }

    pub fn from_options(variable: Variable, options: &Options) -> Result<Self, ConfigError> {
        options.check_known(NAME, &OPTIONS)?;
        Ok(Self::new(
            variable,
            options.get_or("radius", 3)?,
            parse_stat(options)?,
            options.get_or("edgePolicy", EdgePolicy::Compute)?,
        ))
    }

    pub fn description(full: bool) -> String {
        let mut text = format!(
            "{:<16}Applies a statistic over a square neighbourhood of grid points\n",
            NAME
        );
        if full {
            text.push_str(&format_option("radius=3", "Half width of the box in grid points"));
            text.push_str(&format_option(
                "stat=mean",
                "One of mean, std, min, max, median, quantile",
            ));
            text.push_str(&format_option("quantile=undef", "Quantile in [0, 1] when stat=quantile"));
            text.push_str(&format_option(
                "edgePolicy=compute",
                "compute: use the part of the box inside the grid; missing: write missing values",
            ));
        }
        text
    }

    fn compute(&self, input: &Field, output: &mut Field) {
        let (n_lat, n_lon, n_ens) = input.shape();
        let r = self.radius;
        let side = 2 * r + 1;
        output.par_rows_mut().for_each(|(i, row)| {
            let i_start = i.saturating_sub(r);
            let i_end = (i + r).min(n_lat - 1);
            let mut values = Vec::with_capacity(side * side);
            for j in 0..n_lon {
                let j_start = j.saturating_sub(r);
                let j_end = (j + r).min(n_lon - 1);
                let clipped = i < r || j < r || i + r >= n_lat || j + r >= n_lon;
                for e in 0..n_ens {
                    row[j * n_ens + e] = if clipped && self.edge_policy == EdgePolicy::Missing {
                        MV
                    } else {
                        values.clear();
                        for ii in i_start..=i_end {
                            values.extend((j_start..=j_end).map(|jj| input[(ii, jj, e)]));
                        }
                        calculate_stat(&mut values, self.stat)
                    };
                }
            }
        });
    }
}

impl Calibrate for NeighbourhoodCalibrator {
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
        for t in 0..file.num_time() {
            debug!("Computing {} statistic for time {}", NAME, t);
            let input = file.get_field(self.variable, t)?;
            let mut output = file.empty_field()?;
            self.compute(&input, &mut output);
            file.add_field(output, self.variable, t)?;
        }
        Ok(())
    }
}
