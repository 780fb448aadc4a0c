use gridcal::calibrator::{Calibrate, CalibrationError, Calibrator};
use gridcal::config::Options;
use gridcal::parameters::SimpleParameters;
use gridcal::{Field, GridFile, MemoryGridFile, Variable, MV};
use ndarray::Array2;

fn build(name: &str, variable: Variable, options: &str) -> Calibrator {
    Calibrator::from_name(name, variable, &Options::parse(options).unwrap()).unwrap()
}

fn time_series(variable: Variable, values: &[f32]) -> MemoryGridFile {
    let mut file = MemoryGridFile::new(values.len(), 1, 1, 1);
    for (t, &value) in values.iter().enumerate() {
        file.add_field(Field::new(1, 1, 1, value).unwrap(), variable, t)
            .unwrap();
    }
    file
}

fn series_of(file: &mut MemoryGridFile, variable: Variable) -> Vec<f32> {
    (0..file.num_time())
        .map(|t| file.get_field(variable, t).unwrap()[(0, 0, 0)])
        .collect()
}

#[test]
fn test_window_centered_mean() {
    let mut file = time_series(Variable::T, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    build("window", Variable::T, "stat=mean length=3 edgePolicy=compute")
        .calibrate(&mut file, None)
        .unwrap();
    assert_eq!(series_of(&mut file, Variable::T), vec![1.5, 2.0, 3.0, 4.0, 4.5]);
}

#[test]
fn test_window_missing_edges() {
    let mut file = time_series(Variable::T, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    build("window", Variable::T, "length=3 edgePolicy=missing")
        .calibrate(&mut file, None)
        .unwrap();
    assert_eq!(series_of(&mut file, Variable::T), vec![MV, 2.0, 3.0, 4.0, MV]);
}

#[test]
fn test_window_minimum_skips_missing() {
    let mut file = time_series(Variable::T, &[1.0, MV, 3.0]);
    build("window", Variable::T, "length=3 stat=quantile quantile=0")
        .calibrate(&mut file, None)
        .unwrap();
    assert_eq!(series_of(&mut file, Variable::T)[1], 1.0);
}

#[test]
fn test_phase_boundaries() {
    let source = SimpleParameters::new(vec![273.0, 275.0]);
    let phase = build(
        "phase",
        Variable::Phase,
        "temperatureVariable=T precipitationVariable=Precip",
    );
    assert!(phase.requires_parameter_file());

    // (temperature, precipitation, expected phase)
    let cases = [(273.0, 1.0, 3.0), (275.0, 1.0, 2.0), (275.1, 1.0, 1.0), (MV, 0.2, 0.0)];
    for (temperature, precip, expected) in cases {
        let mut file = time_series(Variable::T, &[temperature]);
        file.add_field(Field::new(1, 1, 1, precip).unwrap(), Variable::Precip, 0)
            .unwrap();
        phase.calibrate(&mut file, Some(&source)).unwrap();
        assert_eq!(series_of(&mut file, Variable::Phase), vec![expected]);
    }
}

#[test]
fn test_phase_only_writes_target_variable() {
    let source = SimpleParameters::new(vec![273.0, 275.0]);
    let mut file = time_series(Variable::T, &[280.0, 270.0]);
    for t in 0..2 {
        file.add_field(Field::new(1, 1, 1, 3.0).unwrap(), Variable::Precip, t)
            .unwrap();
    }
    build("phase", Variable::Phase, "temperatureVariable=T precipitationVariable=Precip")
        .calibrate(&mut file, Some(&source))
        .unwrap();
    assert_eq!(series_of(&mut file, Variable::Phase), vec![1.0, 3.0]);
    assert_eq!(series_of(&mut file, Variable::T), vec![280.0, 270.0]);
    assert_eq!(series_of(&mut file, Variable::Precip), vec![3.0, 3.0]);
}

#[test]
fn test_cloud_follows_precipitation() {
    let mut file = MemoryGridFile::new(1, 2, 2, 1);
    file.add_field(
        Field::from_values(2, 2, 1, vec![0.4, 0.0, MV, 2.0]).unwrap(),
        Variable::Precip,
        0,
    )
    .unwrap();
    file.add_field(
        Field::from_values(2, 2, 1, vec![0.2, 0.2, 0.2, 1.0]).unwrap(),
        Variable::Cloud,
        0,
    )
    .unwrap();
    build("cloud", Variable::Cloud, "")
        .calibrate(&mut file, None)
        .unwrap();
    let cloud = file.get_field(Variable::Cloud, 0).unwrap();
    assert_eq!(cloud.values(), &[1.0, 0.2, 0.2, 1.0]);
}

#[test]
fn test_neighbourhood_on_coordinate_grid() {
    let lats = Array2::from_shape_fn((4, 4), |(i, _)| 60.0 + i as f32);
    let lons = Array2::from_shape_fn((4, 4), |(_, j)| 10.0 + j as f32);
    let mut file = MemoryGridFile::new(1, 4, 4, 1)
        .with_coordinates(lats, lons, Array2::zeros((4, 4)))
        .unwrap();
    let mut field = Field::new(4, 4, 1, 0.0).unwrap();
    field[(2, 2, 0)] = 9.0;
    file.add_field(field, Variable::Precip, 0).unwrap();

    build("neighbourhood", Variable::Precip, "radius=1 stat=max")
        .calibrate(&mut file, None)
        .unwrap();
    let smoothed = file.get_field(Variable::Precip, 0).unwrap();
    assert_eq!(smoothed[(1, 1, 0)], 9.0);
    assert_eq!(smoothed[(3, 3, 0)], 9.0);
    assert_eq!(smoothed[(0, 0, 0)], 0.0);
    assert_eq!(smoothed[(2, 0, 0)], 0.0);
}

#[test]
fn test_missing_input_field_is_reported() {
    let mut file = MemoryGridFile::new(1, 1, 1, 1);
    let result = build("cloud", Variable::Cloud, "").calibrate(&mut file, None);
    assert!(matches!(
        result,
        Err(CalibrationError::MissingField {
            variable: Variable::Precip,
            ..
        })
    ));
}
