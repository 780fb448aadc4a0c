use gridcal::parameters::{Location, ParameterError, ParameterSource, TextParameterFile};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_location_dependent_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parameters.txt");

    let entries = [
        (0, Location::new(60.0, 10.0, 120.5), vec![272.85, 274.15]),
        (1, Location::new(60.0, 10.0, 120.5), vec![272.95, 274.05]),
        (0, Location::new(59.25, 11.125, 3.0), vec![273.1, 0.1]),
        (6, Location::new(-33.9, 151.2, 40.0), vec![-1.0e-3, 1.0e6]),
    ];
    let mut written = TextParameterFile::new(&path);
    for (time, location, values) in &entries {
        written
            .set_parameters(*time, *location, values.clone().into())
            .unwrap();
    }
    written.write().unwrap();

    let read = TextParameterFile::open(&path).unwrap();
    assert!(read.is_location_dependent());
    assert_eq!(read.num_parameters(), Some(2));
    assert_eq!(read.times(), vec![0, 1, 6]);
    for (time, location, values) in &entries {
        assert_eq!(
            read.parameters_at(*time, location).map(|p| p.values().to_vec()),
            Some(values.clone()),
            "time {} at {:?}",
            time,
            location
        );
        assert_eq!(
            read.parameters_at(*time, location),
            written.parameters_at(*time, location)
        );
    }
}

#[test]
fn test_location_independent_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("simple.txt");
    let mut written = TextParameterFile::new(&path);
    written
        .set_parameters(0, Location::default(), vec![0.5, 1.5, 2.5].into())
        .unwrap();
    written
        .set_parameters(3, Location::default(), vec![3.5, 4.5, 5.5].into())
        .unwrap();
    written.write().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# time param0 param1 param2\n"));

    let read = TextParameterFile::open(&path).unwrap();
    assert!(!read.is_location_dependent());
    assert_eq!(read.parameters(3).unwrap().values(), &[3.5, 4.5, 5.5]);
    assert_eq!(read.parameters(1), None);
}

#[test]
fn test_inconsistent_columns_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.txt");
    fs::write(&path, "time lat lon elev a b\n0 60 10 0 1 2\n0 61 10 0 1\n").unwrap();

    match TextParameterFile::open(&path) {
        Err(ParameterError::Parse { line, path: reported, .. }) => {
            assert_eq!(line, 3);
            assert_eq!(reported, path);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_unreadable_file() {
    let dir = TempDir::new().unwrap();
    let result = TextParameterFile::open(dir.path().join("does_not_exist.txt"));
    assert!(matches!(result, Err(ParameterError::Io { .. })));
}
