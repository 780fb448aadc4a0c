pub mod simple;
pub mod text;

pub use simple::SimpleParameters;
pub use text::TextParameterFile;

use crate::math::physics::{haversine_distance, EARTH_RADIUS};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("Cannot open parameter file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parameter file '{path}' line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Parameter vector has {found} values, expected {expected}")]
    InconsistentLength { expected: usize, found: usize },

    #[error("Cannot write parameters to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Point used to key location-dependent parameters
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub lat: f32,
    pub lon: f32,
    pub elev: f32,
}

impl Location {
    pub fn new(lat: f32, lon: f32, elev: f32) -> Self {
        Self { lat, lon, elev }
    }

    /// Great-circle distance in meters, elevation ignored
    pub fn distance(&self, other: &Location) -> f64 {
        haversine_distance(
            self.lat as f64,
            self.lon as f64,
            other.lat as f64,
            other.lon as f64,
            EARTH_RADIUS,
        )
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lat
            .total_cmp(&other.lat)
            .then(self.lon.total_cmp(&other.lon))
            .then(self.elev.total_cmp(&other.elev))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Location {}

/// Ordered coefficient vector, e.g. `[a, b]` for a two-threshold classifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<f32>);

impl Parameters {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

impl Index<usize> for Parameters {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

impl From<Vec<f32>> for Parameters {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Read-only lookup of calibration coefficients by time and location
pub trait ParameterSource: Send + Sync {
    /// Label used in messages, usually the file name
    fn name(&self) -> &str;

    /// Parameters for a time when the source is location-independent.
    /// `None` if the time has no data or the source is location-dependent.
    fn parameters(&self, time: usize) -> Option<&Parameters>;

    /// Parameters stored at the location nearest to `location`
    fn parameters_at(&self, time: usize, location: &Location) -> Option<&Parameters>;

    /// More than one distinct location is stored
    fn is_location_dependent(&self) -> bool;

    /// Length of every coefficient vector, `None` if nothing is stored
    fn num_parameters(&self) -> Option<usize>;

    /// Sorted distinct times with data
    fn times(&self) -> Vec<usize>;
}

/// Parameters keyed by location, then by time
///
/// Every stored vector has the same length. Lookups by location resolve to
/// the nearest stored location (haversine distance on lat/lon, ties broken
/// by elevation difference). A time-independent set holds one vector per
/// location and returns it for every time.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    values: BTreeMap<Location, BTreeMap<usize, Parameters>>,
    num_parameters: Option<usize>,
    time_dependent: bool,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            num_parameters: None,
            time_dependent: true,
        }
    }
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whose parameters apply to all times
    pub fn time_independent() -> Self {
        Self {
            time_dependent: false,
            ..Self::default()
        }
    }

    pub fn is_time_dependent(&self) -> bool {
        self.time_dependent
    }

    /// Store parameters, replacing any existing entry for (time, location)
    pub fn set(
        &mut self,
        time: usize,
        location: Location,
        parameters: Parameters,
    ) -> Result<(), ParameterError> {
        match self.num_parameters {
            Some(expected) if expected != parameters.len() => {
                return Err(ParameterError::InconsistentLength {
                    expected,
                    found: parameters.len(),
                });
            }
            Some(_) => {}
            None => self.num_parameters = Some(parameters.len()),
        }
        self.values.entry(location).or_default().insert(time, parameters);
        Ok(())
    }

    pub fn is_location_dependent(&self) -> bool {
        self.values.len() > 1
    }

    pub fn num_parameters(&self) -> Option<usize> {
        self.num_parameters
    }

    /// Number of (location, time) entries
    pub fn len(&self) -> usize {
        self.values.values().map(|times| times.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.values.keys()
    }

    pub fn times(&self) -> Vec<usize> {
        let times: BTreeSet<usize> = self
            .values
            .values()
            .flat_map(|times| times.keys().copied())
            .collect();
        times.into_iter().collect()
    }

    /// All entries ordered by location, then time
    pub fn iter(&self) -> impl Iterator<Item = (&Location, usize, &Parameters)> {
        self.values.iter().flat_map(|(location, times)| {
            times
                .iter()
                .map(move |(&time, parameters)| (location, time, parameters))
        })
    }

    pub fn get(&self, time: usize) -> Option<&Parameters> {
        if self.is_location_dependent() {
            return None;
        }
        self.lookup(self.values.values().next()?, time)
    }

    pub fn get_at(&self, time: usize, location: &Location) -> Option<&Parameters> {
        let nearest = self.nearest_location(location)?;
        self.lookup(self.values.get(nearest)?, time)
    }

    fn lookup<'a>(&self, times: &'a BTreeMap<usize, Parameters>, time: usize) -> Option<&'a Parameters> {
        if self.time_dependent {
            times.get(&time)
        } else {
            times.values().next()
        }
    }

    /// Stored location closest to `location`
    pub fn nearest_location(&self, location: &Location) -> Option<&Location> {
        if !self.is_location_dependent() {
            return self.values.keys().next();
        }
        let mut best: Option<(&Location, f64, f32)> = None;
        for candidate in self.values.keys() {
            let distance = candidate.distance(location);
            let elev_diff = (candidate.elev - location.elev).abs();
            let closer = match best {
                None => true,
                Some((_, best_distance, best_elev_diff)) => {
                    distance < best_distance
                        || (distance == best_distance && elev_diff < best_elev_diff)
                }
            };
            if closer {
                best = Some((candidate, distance, elev_diff));
            }
        }
        best.map(|(candidate, _, _)| candidate)
    }
}
