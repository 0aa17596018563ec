//! temsim command-line interface.
//!
//! Run batch CTEM simulations from TOML configuration files and prepare
//! the structure models they consume:
//! ```sh
//! temsim simulate job.toml
//! temsim validate job.toml
//! temsim init-prm job.toml --out prm
//! temsim expand model.cel
//! temsim rotate PtNP_CeO2.cel --a-tilts 0,2,4
//! temsim convert-xyz particle.xyz particle.cel
//! temsim preview image.dat --nx 512 --ny 512
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use temsim_structure::tilt::{TiltSeries, BURIED_THRESHOLD_B};

#[derive(Parser)]
#[command(name = "temsim")]
#[command(about = "temsim: batch multislice TEM image simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate every structure in the job's input directory.
    Simulate {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Noise seed (overrides the config file setting).
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a configuration file without running the simulation.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Build the job's parameter bundles and save them for reuse.
    InitPrm {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Directory for the saved bundles.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Enlarge the cell of a `.cel` model around the centred model.
    Expand {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Scale factor for every lattice length.
        #[arg(long, default_value_t = 1.2)]
        factor: f64,
        /// Lower bound for every lattice length (nm).
        #[arg(long, default_value_t = 1.5)]
        min_dimension: f64,
    },
    /// Write a tilt series of a supported particle.
    Rotate {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Element of the particle.
        #[arg(long, default_value = "Pt")]
        element: String,
        /// Tilts about a (degrees).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0")]
        a_tilts: Vec<i32>,
        /// Tilts about b (degrees).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0")]
        b_tilts: Vec<i32>,
        /// Tilts about c (degrees).
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0")]
        c_tilts: Vec<i32>,
        /// Keep particle atoms that end up inside the support.
        #[arg(long)]
        keep_buried: bool,
        /// Fractional b below which particle atoms count as buried.
        #[arg(long, default_value_t = BURIED_THRESHOLD_B)]
        threshold: f64,
    },
    /// Box an `.xyz` particle (e.g. a Wulff construction) into a `.cel` model.
    ConvertXyz {
        input: PathBuf,
        output: PathBuf,
        /// Vacuum on every side (nm).
        #[arg(long, default_value_t = 1.0)]
        padding: f64,
    },
    /// Render a raw image-formation raster as PNG.
    Preview {
        input: PathBuf,
        #[arg(long, default_value_t = 512)]
        nx: usize,
        #[arg(long, default_value_t = 512)]
        ny: usize,
        #[arg(long, default_value_t = 0.8)]
        vmin: f32,
        #[arg(long, default_value_t = 1.2)]
        vmax: f32,
        /// Output PNG (default: input with `.png` extension).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { config, seed } => {
            println!("temsim batch simulation");
            println!("=======================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let report = runner::run_simulation(&job, seed)?;
            println!(
                "Simulation complete: {} structures, {} clean and {} noisy images.",
                report.structures.len(),
                report.clean_image_count(),
                report.noisy_image_count()
            );
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let constants = runner::validate(&job)?;
            println!("Configuration is valid: {}", config.display());
            println!(
                "  {} kV, {}x{}x{}, {} defoci, {} vacuum levels",
                constants.high_tension_kv,
                constants.nx,
                constants.ny,
                constants.nz,
                constants.defoci_nm.len(),
                constants.vacuum_levels.len()
            );
            Ok(())
        }
        Commands::InitPrm { config, out } => {
            let job = config::load_config(&config)?;
            let (msa, wavimg) = runner::init_prm(&job, &out)?;
            println!("Saved {} and {}", msa.display(), wavimg.display());
            Ok(())
        }
        Commands::Expand {
            input,
            out_dir,
            factor,
            min_dimension,
        } => {
            runner::expand(&input, &out_dir, factor, min_dimension)?;
            Ok(())
        }
        Commands::Rotate {
            input,
            out_dir,
            element,
            a_tilts,
            b_tilts,
            c_tilts,
            keep_buried,
            threshold,
        } => {
            let series = TiltSeries {
                a_tilts,
                b_tilts,
                c_tilts,
                remove_buried: !keep_buried,
                buried_threshold: threshold,
                ..TiltSeries::new(element)
            };
            println!("Writing {} tilted models", series.len());
            runner::rotate(&input, &out_dir, &series)?;
            Ok(())
        }
        Commands::ConvertXyz {
            input,
            output,
            padding,
        } => {
            runner::convert_xyz(&input, &output, padding)?;
            Ok(())
        }
        Commands::Preview {
            input,
            nx,
            ny,
            vmin,
            vmax,
            out,
        } => {
            let out = out.unwrap_or_else(|| input.with_extension("png"));
            runner::preview(&input, nx, ny, vmin, vmax, &out)
        }
    }
}
