use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Meteorological variables a calibrator can read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    /// 2m temperature (K)
    T,
    /// Minimum 2m temperature (K)
    TMin,
    /// Maximum 2m temperature (K)
    TMax,
    /// Accumulated precipitation (mm)
    Precip,
    /// Cloud area fraction (1)
    Cloud,
    /// Eastward wind (m/s)
    U,
    /// Northward wind (m/s)
    V,
    /// Wind speed (m/s)
    W,
    /// Relative humidity (1)
    RH,
    /// Surface air pressure (Pa)
    P,
    /// Mean sea level pressure (Pa)
    MSLP,
    /// Precipitation phase code
    Phase,
    /// Probability of precipitation (1)
    Pop,
}

impl Variable {
    pub const ALL: [Variable; 13] = [
        Variable::T,
        Variable::TMin,
        Variable::TMax,
        Variable::Precip,
        Variable::Cloud,
        Variable::U,
        Variable::V,
        Variable::W,
        Variable::RH,
        Variable::P,
        Variable::MSLP,
        Variable::Phase,
        Variable::Pop,
    ];

    /// Canonical name, as accepted on the command line and in options
    pub fn name(self) -> &'static str {
        match self {
            Variable::T => "T",
            Variable::TMin => "TMin",
            Variable::TMax => "TMax",
            Variable::Precip => "Precip",
            Variable::Cloud => "Cloud",
            Variable::U => "U",
            Variable::V => "V",
            Variable::W => "W",
            Variable::RH => "RH",
            Variable::P => "P",
            Variable::MSLP => "MSLP",
            Variable::Phase => "Phase",
            Variable::Pop => "Pop",
        }
    }

    /// SI units of the variable
    pub fn units(self) -> &'static str {
        match self {
            Variable::T | Variable::TMin | Variable::TMax => "K",
            Variable::Precip => "mm",
            Variable::Cloud | Variable::RH | Variable::Pop => "1",
            Variable::U | Variable::V | Variable::W => "m/s",
            Variable::P | Variable::MSLP => "Pa",
            Variable::Phase => "",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown variable '{0}'")]
pub struct UnknownVariable(pub String);

impl FromStr for Variable {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownVariable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_name_round_trip() {
        for variable in Variable::ALL {
            assert_eq!(variable.name().parse::<Variable>(), Ok(variable));
        }
    }

    #[test]
    fn test_names_unique() {
        let names: HashSet<_> = Variable::ALL.iter().map(|v| v.name()).collect();
        assert_eq!(names.len(), Variable::ALL.len());
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            "Temperature".parse::<Variable>(),
            Err(UnknownVariable("Temperature".to_string()))
        );
        // names are case-sensitive
        assert!("precip".parse::<Variable>().is_err());
    }
}
