use crate::variable::{UnknownVariable, Variable};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cannot parse option '{0}', expected key=value")]
    Malformed(String),

    #[error("Option '{0}' is required")]
    MissingOption(String),

    #[error("Invalid value '{value}' for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown option '{key}' for {context}")]
    UnknownOption { context: String, key: String },

    #[error("Unknown calibrator '{0}'")]
    UnknownCalibrator(String),

    #[error(transparent)]
    UnknownVariable(#[from] UnknownVariable),

    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid_value(key: &str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// `key=value` settings for one calibrator
///
/// Values are kept as strings and converted on access, so each calibrator
/// decides the type of its own options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse whitespace separated `key=value` tokens
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut options = Options::new();
        for token in text.split_whitespace() {
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => options.set(key, value),
                _ => return Err(ConfigError::Malformed(token.to_string())),
            }
        }
        Ok(options)
    }

    /// Add or replace an option
    pub fn set(&mut self, key: &str, value: impl fmt::Display) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Typed value of an option, `None` if absent
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::invalid_value(key, value, e.to_string())),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn get_required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)?
            .ok_or_else(|| ConfigError::MissingOption(key.to_string()))
    }

    /// Boolean option accepting 0/1/true/false
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            None => Ok(default),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(other) => Err(ConfigError::invalid_value(key, other, "expected 0, 1, true or false")),
        }
    }

    /// Reject options not in `allowed`
    pub fn check_known(&self, context: &str, allowed: &[&str]) -> Result<(), ConfigError> {
        match self.values.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(ConfigError::UnknownOption {
                context: context.to_string(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl FromStr for Options {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Options::parse(s)
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        f.write_str(&tokens.join(" "))
    }
}

/// One calibration step as given on the command line, e.g. `window length=3`,
/// with the variable it writes
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub calibrator: String,
    pub variable: Variable,
    pub options: Options,
}

impl StepSpec {
    /// Parse `<calibrator> key=value...` for a step writing `variable`
    pub fn parse(variable: Variable, spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let (calibrator, rest) = spec.split_once(char::is_whitespace).unwrap_or((spec, ""));
        if calibrator.is_empty() {
            return Err(ConfigError::Invalid("Empty calibrator specification".to_string()));
        }
        Ok(Self {
            calibrator: calibrator.to_string(),
            variable,
            options: Options::parse(rest)?,
        })
    }
}

/// Configuration of a calibration run
#[derive(Clone, Debug)]
pub struct Config {
    /// Grid file calibrated in place
    pub input_path: PathBuf,
    /// Calibrators in the order they are applied
    pub steps: Vec<StepSpec>,
    /// Parameter file for calibrators that need one
    pub parameter_file: Option<PathBuf>,
    /// Worker threads, rayon's default when unset
    pub num_threads: Option<usize>,
}

impl Config {
    /// Command line definition
    pub fn command() -> Command {
        Command::new("gridcal")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Statistical calibration of gridded weather forecasts")
            .subcommand_required(true)
            .subcommand(
                Command::new("run")
                    .about("Calibrate a file in place")
                    .arg(
                        Arg::new("file")
                            .value_name("FILE")
                            .help("Grid file to calibrate")
                            .required(true),
                    )
                    .arg(
                        Arg::new("variable")
                            .short('v')
                            .long("variable")
                            .value_name("VARIABLE")
                            .help("Variable written by the calibrators that follow (T, Precip, Cloud, Phase, ...)")
                            .action(ArgAction::Append)
                            .required(true),
                    )
                    .arg(
                        Arg::new("calibrator")
                            .short('c')
                            .long("calibrator")
                            .value_name("SPEC")
                            .help("Calibrator and its options, e.g. \"window length=3 stat=max\". Applies to the preceding -v; repeat for a pipeline")
                            .action(ArgAction::Append)
                            .required(true),
                    )
                    .arg(
                        Arg::new("parameters")
                            .short('p')
                            .long("parameters")
                            .value_name("FILE")
                            .help("Text parameter file"),
                    )
                    .arg(
                        Arg::new("threads")
                            .short('j')
                            .long("threads")
                            .value_name("COUNT")
                            .help("Number of worker threads")
                            .value_parser(clap::value_parser!(usize)),
                    ),
            )
            .subcommand(
                Command::new("describe")
                    .about("List calibrators and their options")
                    .arg(
                        Arg::new("full")
                            .long("full")
                            .help("Include every option")
                            .action(ArgAction::SetTrue),
                    ),
            )
    }

    /// Build the configuration from `run` subcommand matches
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let input_path = matches
            .get_one::<String>("file")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingOption("file".to_string()))?;
        let variables = matches
            .get_many::<String>("variable")
            .into_iter()
            .flatten()
            .map(|name| name.parse::<Variable>())
            .collect::<Result<Vec<_>, _>>()?;
        let variable_indices: Vec<usize> = matches.indices_of("variable").into_iter().flatten().collect();

        // Each calibrator writes the variable given most recently before it
        let specs = matches.get_many::<String>("calibrator").into_iter().flatten();
        let spec_indices = matches.indices_of("calibrator").into_iter().flatten();
        let mut steps = Vec::new();
        for (spec, index) in specs.zip(spec_indices) {
            let variable = variable_indices
                .iter()
                .zip(&variables)
                .rev()
                .find(|(variable_index, _)| **variable_index < index)
                .map(|(_, variable)| *variable)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!("Calibrator '{}' is given before any variable", spec))
                })?;
            steps.push(StepSpec::parse(variable, spec)?);
        }
        let parameter_file = matches.get_one::<String>("parameters").map(PathBuf::from);
        let num_threads = matches.get_one::<usize>("threads").copied();

        let config = Self {
            input_path,
            steps,
            parameter_file,
            num_threads,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::Invalid("No calibrators given".to_string()));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::invalid_value("threads", 0, "must be at least 1"));
        }
        if !self.input_path.exists() {
            return Err(ConfigError::Invalid(format!(
                "Input file does not exist: {}",
                self.input_path.display()
            )));
        }
        if let Some(path) = &self.parameter_file {
            if !path.is_file() {
                return Err(ConfigError::Invalid(format!(
                    "Parameter file does not exist: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
