use anyhow::{bail, Context};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use particle_hydro::{
    scene::SceneConfig,
    simulation_parameters::SimulationParams,
    sph_kernels::{CubicSpline, DimensionUtils, DimensionUtils1d, DimensionUtils2d, KernelType, SphKernel, WendlandC2},
    FluidSimulation,
};

const CARGO_PKG_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn main() -> anyhow::Result<()> {
    let matches = App::new("Particle Hydrodynamics")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Build the cell grid and solve smoothing lengths for the given scene")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("PRINT_PARTICLES")
                        .long("print-particles")
                        .short("p")
                        .takes_value(false)
                        .help("Print the particle table after the run"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)?;
    }

    Ok(())
}

fn run(run_matches: &ArgMatches) -> anyhow::Result<()> {
    let parameter_file = run_matches
        .value_of("SIMULATION_CONFIG")
        .context("missing simulation config")?;
    let params_yaml = std::fs::read_to_string(parameter_file)
        .with_context(|| format!("failed reading parameter file {}", parameter_file))?;
    let simulation_params = SimulationParams::from_yaml_str(&params_yaml)?;
    log::debug!("{:?}", simulation_params);

    let scene_file_path = run_matches.value_of("SCENE_CONFIG").context("missing scene config")?;
    let scene_yaml = std::fs::read_to_string(scene_file_path)
        .with_context(|| format!("failed reading scene file {}", scene_file_path))?;
    let scene_config = SceneConfig::from_yaml_str(&scene_yaml)?;
    log::debug!("{:?}", scene_config);

    let print_particles = run_matches.is_present("PRINT_PARTICLES");

    match (scene_config.ndim, simulation_params.kernel) {
        (1, KernelType::CubicSpline) => {
            run_simulation::<CubicSpline, DimensionUtils1d, 1>(&simulation_params, &scene_config, print_particles)
        }
        (1, KernelType::WendlandC2) => {
            run_simulation::<WendlandC2, DimensionUtils1d, 1>(&simulation_params, &scene_config, print_particles)
        }
        (2, KernelType::CubicSpline) => {
            run_simulation::<CubicSpline, DimensionUtils2d, 2>(&simulation_params, &scene_config, print_particles)
        }
        (2, KernelType::WendlandC2) => {
            run_simulation::<WendlandC2, DimensionUtils2d, 2>(&simulation_params, &scene_config, print_particles)
        }
        (ndim, _) => bail!("only 1 and 2 dimensions are supported, scene has {}", ndim),
    }
}

fn run_simulation<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize>(
    simulation_params: &SimulationParams,
    scene_config: &SceneConfig,
    print_particles: bool,
) -> anyhow::Result<()> {
    let particles = scene_config.generate::<D>(simulation_params.boxlen)?;
    let mut fluid_simulation = FluidSimulation::<K, DU, D>::new(simulation_params, particles)?;

    let grid = fluid_simulation.build_grid()?;
    log::info!("Grid: nx={} dx={:.4} cells={}", grid.nx(), grid.dx(), grid.num_cells());

    fluid_simulation.compute_smoothing_lengths()?;

    if let Some(statistics) = fluid_simulation.statistics() {
        for line in statistics.to_string().lines() {
            log::info!("{}", line);
        }
    }
    log::debug!("Timings:\n{}", fluid_simulation.pcounters);

    if print_particles {
        print!("{}", fluid_simulation.particles().table());
    }

    Ok(())
}
