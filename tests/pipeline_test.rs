use gridcal::calibrator::CalibrationError;
use gridcal::config::{Config, StepSpec};
use gridcal::parameters::{ParameterSource, TextParameterFile};
use gridcal::{Field, GridFile, MemoryGridFile, Pipeline, Variable, MV};
use std::io::Cursor;
use std::path::PathBuf;

fn config(steps: &[(Variable, &str)]) -> Config {
    Config {
        input_path: PathBuf::from("forecast.nc"),
        steps: steps
            .iter()
            .map(|(variable, spec)| StepSpec::parse(*variable, spec).unwrap())
            .collect(),
        parameter_file: None,
        num_threads: None,
    }
}

/// Two timesteps on a 2x2 grid with two members
fn forecast() -> MemoryGridFile {
    let mut file = MemoryGridFile::new(2, 2, 2, 2);
    for t in 0..2 {
        let temperature = (0..8).map(|k| 270.0 + k as f32 + t as f32).collect();
        file.add_field(Field::from_values(2, 2, 2, temperature).unwrap(), Variable::T, t)
            .unwrap();
        let precip = vec![0.0, 1.0, 1.0, 1.0, MV, 1.0, 0.1, 5.0];
        file.add_field(Field::from_values(2, 2, 2, precip).unwrap(), Variable::Precip, t)
            .unwrap();
    }
    file
}

#[test]
fn test_pipeline_from_config() {
    let config = config(&[
        (Variable::T, "window length=3"),
        (Variable::T, "neighbourhood radius=1 stat=max"),
    ]);
    let pipeline = Pipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.len(), 2);
    assert!(!pipeline.requires_parameter_file());

    let mut file = forecast();
    pipeline.run(&mut file, None).unwrap();
    // window mean over both times adds 0.5, the maximum over the grid is the last cell per member
    let field = file.get_field(Variable::T, 0).unwrap();
    assert_eq!(field[(0, 0, 0)], 276.5);
    assert_eq!(field[(0, 0, 1)], 277.5);
}

#[test]
fn test_steps_write_their_own_variables() {
    let config = config(&[
        (Variable::Precip, "window length=3 stat=max"),
        (Variable::Cloud, "cloud"),
    ]);
    let pipeline = Pipeline::from_config(&config).unwrap();

    let mut file = forecast();
    for t in 0..2 {
        file.add_field(Field::new(2, 2, 2, 0.5).unwrap(), Variable::Cloud, t)
            .unwrap();
    }
    pipeline.run(&mut file, None).unwrap();

    let precip = file.get_field(Variable::Precip, 0).unwrap();
    assert_eq!(precip.values(), &[0.0, 1.0, 1.0, 1.0, MV, 1.0, 0.1, 5.0]);
    let cloud = file.get_field(Variable::Cloud, 1).unwrap();
    assert_eq!(cloud.values(), &[0.5, 1.0, 1.0, 1.0, 0.5, 1.0, 1.0, 1.0]);
    // temperature is not touched by either step
    assert_eq!(file.get_field(Variable::T, 0).unwrap()[(0, 0, 0)], 270.0);
}

#[test]
fn test_phase_cannot_overwrite_its_input() {
    let config = config(&[(
        Variable::T,
        "phase temperatureVariable=T precipitationVariable=Precip",
    )]);
    assert!(Pipeline::from_config(&config).is_err());
}

#[test]
fn test_unknown_calibrator_in_config() {
    let config = config(&[(Variable::T, "window"), (Variable::T, "smooth radius=1")]);
    assert!(Pipeline::from_config(&config).is_err());
}

#[test]
fn test_phase_pipeline_with_parameter_file() {
    let source = TextParameterFile::from_reader(
        "phase.txt",
        Cursor::new("# time a b\n0 272 274\n1 272 274\n"),
    )
    .unwrap();
    let config = config(&[(
        Variable::Phase,
        "phase temperatureVariable=T precipitationVariable=Precip minPrecip=0.2",
    )]);
    let pipeline = Pipeline::from_config(&config).unwrap();
    assert!(pipeline.requires_parameter_file());

    let mut file = forecast();
    pipeline
        .run(&mut file, Some(&source as &dyn ParameterSource))
        .unwrap();
    let phase = file.get_field(Variable::Phase, 0).unwrap();
    // temperatures 270..277, thresholds 272 and 274
    assert_eq!(
        phase.values(),
        &[0.0, 3.0, 3.0, 2.0, MV, 1.0, 0.0, 1.0]
    );
}

#[test]
fn test_missing_parameter_file_leaves_file_unchanged() {
    let config = config(&[
        (Variable::T, "window length=3"),
        (Variable::Phase, "phase temperatureVariable=T precipitationVariable=Precip"),
    ]);
    let pipeline = Pipeline::from_config(&config).unwrap();
    let mut file = forecast();
    let before = file.get_field(Variable::T, 0).unwrap();

    let result = pipeline.run(&mut file, None);
    assert!(matches!(result, Err(CalibrationError::MissingParameterFile(_))));
    assert_eq!(file.get_field(Variable::T, 0).unwrap(), before);
}
