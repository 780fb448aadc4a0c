use super::{Location, ParameterError, ParameterSet, ParameterSource, Parameters};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Column positions found in the header line
#[derive(Debug, Default)]
struct Header {
    time: Option<usize>,
    lat: Option<usize>,
    lon: Option<usize>,
    elev: Option<usize>,
}

impl Header {
    fn parse(tokens: &[&str], path: &Path, line: usize) -> Result<Self, ParameterError> {
        let mut header = Header::default();
        for (column, &token) in tokens.iter().enumerate() {
            let slot = match token {
                "time" => &mut header.time,
                "lat" => &mut header.lat,
                "lon" => &mut header.lon,
                "elev" => &mut header.elev,
                _ => continue,
            };
            if slot.is_some() {
                return Err(parse_error(path, line, format!("column '{}' appears twice in header", token)));
            }
            *slot = Some(column);
        }
        Ok(header)
    }

    fn has_location(&self) -> bool {
        self.lat.is_some() && self.lon.is_some() && self.elev.is_some()
    }
}

fn parse_error(path: &Path, line: usize, message: String) -> ParameterError {
    ParameterError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    }
}

/// Whitespace separated parameter table
///
/// ```text
/// # time lat lon elev param0 param1
/// 0 60 10 120 273.15 275.15
/// 1 60 10 120 273.05 275.25
/// ```
///
/// Reserved columns `time`, `lat`, `lon` and `elev` may appear in any order;
/// all other columns are coefficients in header order. Without lat/lon/elev
/// the parameters apply everywhere, without time they apply to all times.
#[derive(Debug, Clone)]
pub struct TextParameterFile {
    path: PathBuf,
    name: String,
    set: ParameterSet,
}

impl TextParameterFile {
    /// Empty parameter file, to be filled and written
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.to_string_lossy().to_string(),
            path,
            set: ParameterSet::new(),
        }
    }

    /// Read an existing parameter file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParameterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, BufReader::new(file))
    }

    /// Parse a parameter table; `path` is only used for naming and errors
    pub fn from_reader<R: BufRead>(path: impl AsRef<Path>, reader: R) -> Result<Self, ParameterError> {
        let path = path.as_ref();
        let mut set = ParameterSet::new();
        let mut header: Option<Header> = None;

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|source| ParameterError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            if let Some(commented) = line.strip_prefix('#') {
                // A commented header is only accepted on the first line
                let tokens: Vec<&str> = commented.split_whitespace().collect();
                if line_number == 1 && tokens.first() == Some(&"time") {
                    header = Some(Header::parse(&tokens, path, line_number)?);
                }
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            if header.is_none() {
                let columns = Header::parse(&tokens, path, line_number)?;
                if columns.time.is_none() {
                    set = ParameterSet::time_independent();
                }
                header = Some(columns);
                continue;
            }
            if let Some(columns) = &header {
                let (time, location, parameters) =
                    Self::parse_row(columns, &tokens, path, line_number)?;
                if let Some(expected) = set.num_parameters() {
                    if expected != parameters.len() {
                        return Err(parse_error(
                            path,
                            line_number,
                            format!(
                                "file is corrupt, because it does not have the same number of columns on each line \
                                 (expected {} values, found {})",
                                expected,
                                parameters.len()
                            ),
                        ));
                    }
                }
                set.set(time, location, parameters)?;
            }
        }

        info!(
            "Reading {}. Found {} parameter sets.",
            path.display(),
            set.len()
        );

        Ok(Self {
            name: path.to_string_lossy().to_string(),
            path: path.to_path_buf(),
            set,
        })
    }

    fn parse_row(
        header: &Header,
        tokens: &[&str],
        path: &Path,
        line: usize,
    ) -> Result<(usize, Location, Parameters), ParameterError> {
        let mut time = 0;
        let (mut lat, mut lon, mut elev) = (None, None, None);
        let mut values = Vec::new();

        let parse_float = |token: &str, what: &str| {
            token
                .parse::<f32>()
                .map_err(|_| parse_error(path, line, format!("could not read {} from '{}'", what, token)))
        };

        for (column, &token) in tokens.iter().enumerate() {
            let column = Some(column);
            if column == header.time {
                time = token.parse::<usize>().map_err(|_| {
                    parse_error(path, line, format!("could not read time from '{}'", token))
                })?;
            } else if column == header.lat {
                lat = Some(parse_float(token, "lat")?);
            } else if column == header.lon {
                lon = Some(parse_float(token, "lon")?);
            } else if column == header.elev {
                elev = Some(parse_float(token, "elev")?);
            } else {
                values.push(parse_float(token, "value")?);
            }
        }

        let location = if header.has_location() {
            match (lat, lon, elev) {
                (Some(lat), Some(lon), Some(elev)) => Location::new(lat, lon, elev),
                _ => {
                    return Err(parse_error(
                        path,
                        line,
                        "row is missing lat, lon or elev".to_string(),
                    ))
                }
            }
        } else {
            Location::default()
        };

        Ok((time, location, Parameters::new(values)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parameter_set(&self) -> &ParameterSet {
        &self.set
    }

    pub fn set_parameters(
        &mut self,
        time: usize,
        location: Location,
        parameters: Parameters,
    ) -> Result<(), ParameterError> {
        self.set.set(time, location, parameters)
    }

    /// Write back to the file this was created from
    pub fn write(&self) -> Result<(), ParameterError> {
        self.write_to(&self.path)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ParameterError> {
        let path = path.as_ref();
        let write_error = |source| ParameterError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_error)?;
        let mut out = BufWriter::new(file);
        self.write_table(&mut out).map_err(write_error)?;
        out.flush().map_err(write_error)
    }

    fn write_table<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let with_location = self.set.is_location_dependent();
        let with_time = self.set.is_time_dependent();

        // Without a time column the header cannot be commented, since only
        // a `# time` first line is read back as a header
        let mut columns = Vec::new();
        if with_time {
            columns.push("time".to_string());
        }
        if with_location {
            columns.extend(["lat", "lon", "elev"].map(String::from));
        }
        columns.extend((0..self.set.num_parameters().unwrap_or(0)).map(|i| format!("param{}", i)));
        if with_time {
            writeln!(out, "# {}", columns.join(" "))?;
        } else {
            writeln!(out, "{}", columns.join(" "))?;
        }

        for (location, time, parameters) in self.set.iter() {
            if parameters.is_empty() {
                continue;
            }
            let mut fields = Vec::new();
            if with_time {
                fields.push(time.to_string());
            }
            if with_location {
                fields.extend([location.lat, location.lon, location.elev].map(|v| v.to_string()));
            }
            fields.extend(parameters.values().iter().map(|v| v.to_string()));
            writeln!(out, "{}", fields.join(" "))?;
        }
        Ok(())
    }
}

impl ParameterSource for TextParameterFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self, time: usize) -> Option<&Parameters> {
        self.set.get(time)
    }

    fn parameters_at(&self, time: usize, location: &Location) -> Option<&Parameters> {
        self.set.get_at(time, location)
    }

    fn is_location_dependent(&self) -> bool {
        self.set.is_location_dependent()
    }

    fn num_parameters(&self) -> Option<usize> {
        self.set.num_parameters()
    }

    fn times(&self) -> Vec<usize> {
        self.set.times()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(content: &str) -> Result<TextParameterFile, ParameterError> {
        TextParameterFile::from_reader("test.txt", Cursor::new(content))
    }

    #[test]
    fn test_location_independent_table() {
        let file = parse("time a b\n0 273 275\n1 272.5 274.5\n").unwrap();
        assert!(!file.is_location_dependent());
        assert_eq!(file.num_parameters(), Some(2));
        assert_eq!(file.times(), vec![0, 1]);
        assert_eq!(file.parameters(1).unwrap().values(), &[272.5, 274.5]);
    }

    #[test]
    fn test_reserved_columns_any_position() {
        let file = parse("a lon time elev lat b\n1 10 3 100 60 2\n5 5 3 0 50 6\n").unwrap();
        assert!(file.is_location_dependent());
        assert_eq!(file.times(), vec![3]);
        let location = Location::new(60.0, 10.0, 100.0);
        assert_eq!(file.parameters_at(3, &location).unwrap().values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_comments_skipped() {
        let file = parse("# produced by hand\ntime a\n# note\n\n0 1\n").unwrap();
        assert_eq!(file.parameters(0).unwrap().values(), &[1.0]);
    }

    #[test]
    fn test_no_time_column_applies_to_all_times() {
        let file = parse("a b\n273 275\n").unwrap();
        assert_eq!(file.times(), vec![0]);
        assert!(!file.parameter_set().is_time_dependent());
        for time in [0, 1, 12] {
            assert_eq!(file.parameters(time).unwrap().values(), &[273.0, 275.0]);
        }
        let anywhere = Location::new(60.0, 10.0, 0.0);
        assert_eq!(file.parameters_at(5, &anywhere).unwrap().values(), &[273.0, 275.0]);
    }

    #[test]
    fn test_time_independent_write_keeps_all_times() {
        let file = parse("lat lon elev a\n60 10 0 1\n50 5 0 2\n").unwrap();
        let mut buffer = Vec::new();
        file.write_table(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "lat lon elev param0\n50 5 0 2\n60 10 0 1\n");

        let read = parse(&text).unwrap();
        assert!(!read.parameter_set().is_time_dependent());
        let query = Location::new(59.0, 10.0, 0.0);
        assert_eq!(read.parameters_at(3, &query).unwrap().values(), &[1.0]);
    }

    #[test]
    fn test_bad_time_reports_line() {
        match parse("time a\n0 1\nx 2\n") {
            Err(ParameterError::Parse { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("time"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_inconsistent_columns_rejected() {
        match parse("time a b\n0 1 2\n1 1\n") {
            Err(ParameterError::Parse { line, path, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(path, PathBuf::from("test.txt"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_reserved_column_rejected() {
        assert!(matches!(
            parse("time time a\n0 0 1\n"),
            Err(ParameterError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_written_header_is_read_back() {
        let mut file = TextParameterFile::new("mem.txt");
        file.set_parameters(0, Location::default(), vec![1.5, 2.5].into())
            .unwrap();
        let mut buffer = Vec::new();
        file.write_table(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "# time param0 param1\n0 1.5 2.5\n");

        let read = parse(&text).unwrap();
        assert_eq!(read.parameters(0).unwrap().values(), &[1.5, 2.5]);
    }
}
