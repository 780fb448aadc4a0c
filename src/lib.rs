pub mod calibrator;
pub mod config;
pub mod field;
pub mod io;
pub mod math;
pub mod parameters;
pub mod pipeline;
pub mod variable;

pub use calibrator::{Calibrate, CalibrationError, Calibrator};
pub use field::{is_valid, Field, FieldError, MV};
pub use io::{GridFile, GridFileError, MemoryGridFile};
pub use parameters::{Location, ParameterSource, Parameters};
pub use pipeline::Pipeline;
pub use variable::Variable;
