use super::physics::*;
use crate::field::MV;

#[test]
fn test_wetbulb_saturated_equals_temperature() {
    // At 100% humidity the wetbulb temperature is close to the dry temperature
    let t = 283.15;
    let tw = wetbulb(t, 100000.0, 1.0);
    assert!((tw - t).abs() < 0.5, "wetbulb {} too far from {}", tw, t);
}

#[test]
fn test_wetbulb_below_temperature_when_dry() {
    let t = 293.15;
    let tw = wetbulb(t, 100000.0, 0.4);
    assert!(tw < t);
    assert!(tw > t - 15.0);
}

#[test]
fn test_wetbulb_guards() {
    assert_eq!(wetbulb_celsius(-243.04, 100000.0, 0.5), None);
    assert_eq!(wetbulb_celsius(-250.0, 100000.0, 0.5), None);
    assert_eq!(wetbulb_celsius(10.0, 100000.0, 0.0), None);
    assert_eq!(wetbulb(283.15, 100000.0, 0.0), MV);
    assert_eq!(wetbulb(0.0, 100000.0, 0.5), MV);
    assert_eq!(wetbulb(MV, 100000.0, 0.5), MV);
    assert_eq!(wetbulb(283.15, MV, 0.5), MV);
}

#[test]
fn test_standard_pressure() {
    assert_eq!(standard_pressure(0.0), STANDARD_PRESSURE);
    let p = standard_pressure(1000.0);
    assert!(p < STANDARD_PRESSURE);
    assert!((p - 89778.0).abs() < 50.0);
    assert_eq!(standard_pressure(MV), MV);
}

#[test]
fn test_haversine_distance() {
    let dist = haversine_distance(0.0, 0.0, 0.0, 90.0, 6371000.0);
    assert!((dist - 10007557.0).abs() < 1000.0);
    assert_eq!(haversine_distance(60.0, 10.0, 60.0, 10.0, EARTH_RADIUS), 0.0);
}
