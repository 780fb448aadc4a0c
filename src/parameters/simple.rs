use super::{Location, ParameterSource, Parameters};

/// One fixed set of parameters used for every time and location
#[derive(Debug, Clone)]
pub struct SimpleParameters {
    parameters: Parameters,
}

impl SimpleParameters {
    pub fn new(parameters: impl Into<Parameters>) -> Self {
        Self {
            parameters: parameters.into(),
        }
    }
}

impl ParameterSource for SimpleParameters {
    fn name(&self) -> &str {
        "simple"
    }

    fn parameters(&self, _time: usize) -> Option<&Parameters> {
        Some(&self.parameters)
    }

    fn parameters_at(&self, _time: usize, _location: &Location) -> Option<&Parameters> {
        Some(&self.parameters)
    }

    fn is_location_dependent(&self) -> bool {
        false
    }

    fn num_parameters(&self) -> Option<usize> {
        Some(self.parameters.len())
    }

    fn times(&self) -> Vec<usize> {
        vec![0]
    }
}
