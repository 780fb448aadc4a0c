use crate::field::{is_valid, MV};

/// Offset between Kelvin and Celsius
pub const KELVIN_OFFSET: f32 = 273.15;
/// Standard sea level pressure (Pa)
pub const STANDARD_PRESSURE: f32 = 101325.0;
/// Exponential pressure decay with height in the standard atmosphere (1/m)
pub const PRESSURE_DECAY: f32 = -1.21e-4;
/// Mean Earth radius (m)
pub const EARTH_RADIUS: f64 = 6371000.0;

/// Wetbulb temperature (K) from temperature (K), pressure (Pa) and relative
/// humidity (fraction). Returns `MV` when any input is missing or the
/// formula is undefined.
pub fn wetbulb(temperature: f32, pressure: f32, relative_humidity: f32) -> f32 {
    if !is_valid(temperature) {
        return MV;
    }
    match wetbulb_celsius(temperature - KELVIN_OFFSET, pressure, relative_humidity) {
        Some(tw) => tw + KELVIN_OFFSET,
        None => MV,
    }
}

/// Wetbulb temperature in Celsius from a Celsius temperature
///
/// Dewpoint from the Magnus approximation, then the psychrometric weighting
/// of temperature and dewpoint.
pub fn wetbulb_celsius(temperature_c: f32, pressure: f32, relative_humidity: f32) -> Option<f32> {
    // ln(e) below is singular at these bounds
    if temperature_c <= -243.04 || relative_humidity <= 0.0 {
        return None;
    }
    if !is_valid(temperature_c) || !is_valid(pressure) || !is_valid(relative_humidity) {
        return None;
    }

    let e = relative_humidity * 0.611 * ((17.63 * temperature_c) / (temperature_c + 243.04)).exp();
    let td = (116.9 + 243.04 * e.ln()) / (16.78 - e.ln());
    let gamma = 0.00066 * pressure / 1000.0;
    let delta = (4098.0 * e) / (td + 243.04).powi(2);
    if gamma + delta == 0.0 {
        return None;
    }
    let tw = (gamma * temperature_c + delta * td) / (gamma + delta);
    tw.is_finite().then_some(tw)
}

/// Pressure at `elevation` from a reference pressure at `reference_elevation`,
/// using an exponential standard atmosphere
pub fn pressure_at_elevation(reference_elevation: f32, reference_pressure: f32, elevation: f32) -> f32 {
    if !is_valid(reference_elevation) || !is_valid(reference_pressure) || !is_valid(elevation) {
        return MV;
    }
    reference_pressure * (PRESSURE_DECAY * (elevation - reference_elevation)).exp()
}

/// Standard atmosphere surface pressure (Pa) at an elevation (m)
pub fn standard_pressure(elevation: f32) -> f32 {
    pressure_at_elevation(0.0, STANDARD_PRESSURE, elevation)
}

/// Calculate distance between two geographic points (Haversine formula)
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64, earth_radius: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();

    let a =
        (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    earth_radius * c
}
