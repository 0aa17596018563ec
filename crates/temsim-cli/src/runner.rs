//! Job runner: ties together configuration, bundles, backend and pipeline,
//! plus the structure-preparation and preview commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use temsim_core::bundles::ParameterBundles;
use temsim_core::image_io::save_preview;
use temsim_core::naming::structure_name;
use temsim_core::raster::read_raw;
use temsim_core::{BatchReport, CellDimensions, Pipeline, SimulationConstants, SimulationDirs};
use temsim_drprobe::{DrProbeBackend, SimulationBackend};
use temsim_structure::expand::{expand_supercell, expanded_name};
use temsim_structure::parsers::{read_points, read_structure, write_structure};
use temsim_structure::tilt::TiltSeries;
use temsim_structure::Structure;

use crate::config::{JobConfig, ParametersConfig};

/// File name of the batch report in the output directory.
pub const BATCH_SUMMARY: &str = "batch_summary.json";

/// Run a full batch from a parsed job configuration.
pub fn run_simulation(job: &JobConfig, seed: Option<u64>) -> Result<BatchReport> {
    let mut constants = job.constants();
    if seed.is_some() {
        constants.noise_seed = seed;
    }
    let dirs = job.dirs();

    std::fs::create_dir_all(&dirs.output)
        .with_context(|| format!("Cannot create output directory '{}'", dirs.output.display()))?;
    let bundles = resolve_bundles(job, &constants, &dirs)?;

    let backend = create_backend(job, &constants);
    let info = backend.info();
    match &info.location {
        Some(dir) => println!("Backend: {} ({})", info.name, dir.display()),
        None => println!("Backend: {}", info.name),
    }
    println!(
        "Grid: {}x{}x{}, defoci: {:?} nm, vacuum levels: {:?}",
        constants.nx, constants.ny, constants.nz, constants.defoci_nm, constants.vacuum_levels
    );

    let mut pipeline = Pipeline::new(&constants, &dirs, &bundles, &backend);
    let report = pipeline.run_batch()?;

    for s in &report.structures {
        println!(
            "  {}: {} clean, {} noisy",
            s.name,
            s.clean_images.len(),
            s.noisy_images.len()
        );
    }
    for warning in report.warnings() {
        eprintln!("Warning: {}", warning);
    }

    let summary = dirs.output.join(BATCH_SUMMARY);
    report.write_json(&summary)?;
    println!("Summary written to: {}", summary.display());
    Ok(report)
}

/// Load the bundles named in the job, or build them from constants and
/// save them next to the per-structure trees.
fn resolve_bundles(
    job: &JobConfig,
    constants: &SimulationConstants,
    dirs: &SimulationDirs,
) -> Result<ParameterBundles> {
    if let Some(parameters) = &job.parameters {
        println!(
            "Parameters: {} / {}",
            parameters.msa.display(),
            parameters.wavimg.display()
        );
        return load_saved_bundles(parameters);
    }

    let bundles = build_bundles(job, constants, dirs)?;
    let (msa, wavimg) = bundles.save(&dirs.output)?;
    println!("Parameters: {} / {}", msa.display(), wavimg.display());
    Ok(bundles)
}

fn load_saved_bundles(parameters: &ParametersConfig) -> Result<ParameterBundles> {
    log::debug!(
        "Loading parameter bundles {} and {}",
        parameters.msa.display(),
        parameters.wavimg.display()
    );
    ParameterBundles::load(&parameters.msa, &parameters.wavimg)
        .context("Cannot load saved parameter bundles")
}

fn build_bundles(
    job: &JobConfig,
    constants: &SimulationConstants,
    dirs: &SimulationDirs,
) -> Result<ParameterBundles> {
    let reference = match &job.directories.reference_cell {
        Some(path) => path.clone(),
        None => first_structure(&dirs.input)?,
    };
    log::debug!("Reading reference cell from {}", reference.display());
    let cell = CellDimensions::from_structure_file(&reference)
        .with_context(|| format!("Cannot read reference cell '{}'", reference.display()))?;
    println!(
        "Reference cell: {} ({:.4} x {:.4} nm)",
        reference.display(),
        cell.a,
        cell.b
    );
    Ok(ParameterBundles::from_constants(constants, cell))
}

fn first_structure(input: &Path) -> Result<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("Cannot list input directory '{}'", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
        .into_iter()
        .next()
        .with_context(|| format!("No structure files in '{}'", input.display()))
}

fn create_backend(job: &JobConfig, constants: &SimulationConstants) -> DrProbeBackend {
    let backend = match &job.drprobe.bin_dir {
        Some(dir) => DrProbeBackend::with_bin_dir(dir),
        None => DrProbeBackend::new(),
    };
    backend.verbose(constants.verbose)
}

/// Check a job without running it: the sampling grid and defocus list are
/// usable, the input directory exists, and the parameter bundles can be
/// loaded or built from the reference cell.
pub fn validate(job: &JobConfig) -> Result<SimulationConstants> {
    let constants = job.constants();
    let dirs = job.dirs();

    if constants.nx == 0 || constants.ny == 0 || constants.nz == 0 {
        anyhow::bail!(
            "Sampling grid must be non-zero, got {}x{}x{}",
            constants.nx,
            constants.ny,
            constants.nz
        );
    }
    if constants.defoci_nm.is_empty() {
        anyhow::bail!("At least one defocus value is required");
    }
    if !dirs.input.is_dir() {
        anyhow::bail!("Input directory '{}' does not exist", dirs.input.display());
    }

    match &job.parameters {
        Some(parameters) => {
            load_saved_bundles(parameters)?;
        }
        None => {
            build_bundles(job, &constants, &dirs)?;
        }
    }
    log::info!("Validated job with input {}", dirs.input.display());
    Ok(constants)
}

/// Build the bundles of a job and save them into `out_dir`.
pub fn init_prm(job: &JobConfig, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let constants = job.constants();
    let dirs = job.dirs();
    let bundles = build_bundles(job, &constants, &dirs)?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create '{}'", out_dir.display()))?;
    Ok(bundles.save(out_dir)?)
}

/// Write an expanded copy of a `.cel` model into `out_dir`.
pub fn expand(input: &Path, out_dir: &Path, factor: f64, min_dimension: f64) -> Result<PathBuf> {
    let structure = read_structure(input)?;
    let expanded = expand_supercell(&structure, factor, min_dimension)
        .with_context(|| format!("Cannot expand '{}'", input.display()))?;

    let out = out_dir.join(format!("{}.cel", expanded_name(&structure_name(input))));
    write_structure(&out, &expanded)?;
    println!(
        "Expanded {} -> {} ({:.4} x {:.4} x {:.4} nm)",
        input.display(),
        out.display(),
        expanded.cell.a,
        expanded.cell.b,
        expanded.cell.c
    );
    Ok(out)
}

/// Write every member of a tilt series of a `.cel` model into `out_dir`.
pub fn rotate(input: &Path, out_dir: &Path, series: &TiltSeries) -> Result<Vec<PathBuf>> {
    let base = read_structure(input)?;
    if base.indices_of(&series.element).is_empty() {
        anyhow::bail!("No {} sites in '{}'", series.element, input.display());
    }

    let tilted = series
        .generate(&base, &structure_name(input))
        .with_context(|| format!("Cannot rotate '{}'", input.display()))?;

    let mut written = Vec::with_capacity(tilted.len());
    for (i, member) in tilted.iter().enumerate() {
        let out = out_dir.join(format!("{}.cel", member.name));
        write_structure(&out, &member.structure)?;
        println!(
            "  [{}/{}] {} ({} sites, {} removed)",
            i + 1,
            tilted.len(),
            out.display(),
            member.structure.len(),
            member.removed
        );
        written.push(out);
    }
    Ok(written)
}

/// Box an `.xyz` particle with vacuum padding and write it as `.cel`.
pub fn convert_xyz(input: &Path, out: &Path, padding: f64) -> Result<Structure> {
    let points = read_points(input)?;
    let structure = Structure::boxed(&points, padding, &structure_name(input))
        .with_context(|| format!("Cannot box '{}'", input.display()))?;
    write_structure(out, &structure)?;
    println!(
        "Converted {} atoms -> {} ({:.4} x {:.4} x {:.4} nm)",
        structure.len(),
        out.display(),
        structure.cell.a,
        structure.cell.b,
        structure.cell.c
    );
    Ok(structure)
}

/// Render a raw raster as a windowed PNG.
pub fn preview(raw: &Path, nx: usize, ny: usize, vmin: f32, vmax: f32, out: &Path) -> Result<()> {
    let raster = read_raw(raw, nx, ny)?;
    save_preview(out, &raster, vmin, vmax)?;
    println!("Preview written to: {}", out.display());
    Ok(())
}
