use clap::ArgMatches;
use gridcal::{
    calibrator::Calibrator,
    config::Config,
    parameters::{ParameterSource, TextParameterFile},
    pipeline::Pipeline,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gridcal=info".into()))
        .with(fmt::layer())
        .init();

    let matches = Config::command().get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => {
            if let Err(e) = run_calibration(sub_matches) {
                eprintln!("Calibration error: {}", e);
                std::process::exit(1);
            }
        }
        Some(("describe", sub_matches)) => {
            print!("{}", Calibrator::describe_all(sub_matches.get_flag("full")));
        }
        _ => {
            eprintln!("Please specify a subcommand. Use --help for more information.");
            std::process::exit(1);
        }
    }
}

fn run_calibration(matches: &ArgMatches) -> Result<(), String> {
    let config = Config::from_matches(matches).map_err(|e| e.to_string())?;

    if let Some(threads) = config.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| format!("Failed to set up thread pool: {}", e))?;
    }

    // Everything is validated before the input file is opened
    let pipeline = Pipeline::from_config(&config).map_err(|e| e.to_string())?;
    let parameters = config
        .parameter_file
        .as_ref()
        .map(TextParameterFile::open)
        .transpose()
        .map_err(|e| e.to_string())?;
    let parameters = parameters.as_ref().map(|p| p as &dyn ParameterSource);
    pipeline.validate(parameters).map_err(|e| e.to_string())?;

    info!(
        "Calibrating {} with {} steps",
        config.input_path.display(),
        pipeline.len()
    );
    calibrate_file(&config, &pipeline, parameters)
}

#[cfg(feature = "netcdf")]
fn calibrate_file(
    config: &Config,
    pipeline: &Pipeline,
    parameters: Option<&dyn ParameterSource>,
) -> Result<(), String> {
    use gridcal::io::NetcdfGridFile;

    let mut file = NetcdfGridFile::open(&config.input_path).map_err(|e| e.to_string())?;
    pipeline
        .run(&mut file, parameters)
        .map_err(|e| e.to_string())?;
    // Only written once every step has succeeded
    file.write().map_err(|e| e.to_string())?;
    info!("Wrote {}", config.input_path.display());
    Ok(())
}

#[cfg(not(feature = "netcdf"))]
fn calibrate_file(
    config: &Config,
    _pipeline: &Pipeline,
    _parameters: Option<&dyn ParameterSource>,
) -> Result<(), String> {
    Err(format!(
        "Cannot open {}: gridcal was built without NetCDF support, rebuild with --features netcdf",
        config.input_path.display()
    ))
}
