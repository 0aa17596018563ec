//! TOML configuration deserialisation for simulation jobs.
//!
//! ```toml
//! [directories]
//! input = "structures"
//! output = "output"
//! clean_images = "images/clean"
//! noisy_images = "images/noisy"
//! reference_cell = "structures/RhCeO2_seq0000.cel"
//!
//! [imaging]
//! defoci = [8.0]
//! vacuum_levels = [1, 4, 16]
//! ```
//!
//! Every other section and key is optional and defaults to the standard
//! 300 kV, 512 x 512, 300-slice setup.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use temsim_core::types::electron_wavelength_nm;
use temsim_core::{SimulationConstants, SimulationDirs};

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub microscope: MicroscopeConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub slicing: SlicingConfig,
    #[serde(default)]
    pub imaging: ImagingConfig,
    /// Saved parameter bundles; when absent they are built from constants.
    pub parameters: Option<ParametersConfig>,
    #[serde(default)]
    pub drprobe: DrProbeConfig,
}

/// Input and output locations.
#[derive(Debug, Deserialize)]
pub struct DirectoriesConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub clean_images: PathBuf,
    pub noisy_images: PathBuf,
    /// Structure whose lattice lengths set the scan frame and wave
    /// sampling. Defaults to the first structure in `input` by name.
    pub reference_cell: Option<PathBuf>,
}

/// Electron-optical settings.
#[derive(Debug, Deserialize)]
pub struct MicroscopeConfig {
    /// Accelerating voltage in kV (default: 300).
    #[serde(default = "default_high_tension")]
    pub high_tension: f64,
    /// Electron wavelength in nm (default: derived from `high_tension`).
    pub wavelength: Option<f64>,
    /// Cs in nm (default: -9000).
    #[serde(default = "default_cs")]
    pub cs: f64,
    /// C5 in nm (default: 5e6).
    #[serde(default = "default_c5")]
    pub c5: f64,
    /// Object tilt about x and y in degrees (default: [2, -1]).
    #[serde(default = "default_tilt")]
    pub tilt: [f64; 2],
    #[serde(default = "default_focus_spread")]
    pub focus_spread: f64,
    #[serde(default = "default_semi_divergence")]
    pub semi_divergence: f64,
    #[serde(default = "default_vibration")]
    pub vibration: f64,
    #[serde(default = "default_objective_aperture")]
    pub objective_aperture: f64,
    pub mtf_file: Option<PathBuf>,
    #[serde(default = "default_mtf_scale")]
    pub mtf_scale: f64,
}

impl Default for MicroscopeConfig {
    fn default() -> Self {
        Self {
            high_tension: default_high_tension(),
            wavelength: None,
            cs: default_cs(),
            c5: default_c5(),
            tilt: default_tilt(),
            focus_spread: default_focus_spread(),
            semi_divergence: default_semi_divergence(),
            vibration: default_vibration(),
            objective_aperture: default_objective_aperture(),
            mtf_file: None,
            mtf_scale: default_mtf_scale(),
        }
    }
}

fn default_high_tension() -> f64 {
    300.0
}
fn default_cs() -> f64 {
    -9000.0
}
fn default_c5() -> f64 {
    5_000_000.0
}
fn default_tilt() -> [f64; 2] {
    [2.0, -1.0]
}
fn default_focus_spread() -> f64 {
    4.0
}
fn default_semi_divergence() -> f64 {
    0.2
}
fn default_vibration() -> f64 {
    0.05
}
fn default_objective_aperture() -> f64 {
    250.0
}
fn default_mtf_scale() -> f64 {
    1.0
}

/// Pixel grid of slices, waves and images.
#[derive(Debug, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_grid")]
    pub nx: u32,
    #[serde(default = "default_grid")]
    pub ny: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            nx: default_grid(),
            ny: default_grid(),
        }
    }
}

fn default_grid() -> u32 {
    512
}

/// Slice generation.
#[derive(Debug, Deserialize)]
pub struct SlicingConfig {
    #[serde(default = "default_nz")]
    pub nz: u32,
    #[serde(default = "default_true")]
    pub absorptive: bool,
    #[serde(default = "default_true")]
    pub debye_waller: bool,
    /// Isotropic B in nm² (default: 0.005).
    #[serde(default = "default_biso")]
    pub biso: f64,
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self {
            nz: default_nz(),
            absorptive: true,
            debye_waller: true,
            biso: default_biso(),
        }
    }
}

fn default_nz() -> u32 {
    300
}
fn default_biso() -> f64 {
    0.005
}
fn default_true() -> bool {
    true
}

/// Image formation and noise.
#[derive(Debug, Deserialize)]
pub struct ImagingConfig {
    /// Defocus values in nm (default: [8]).
    #[serde(default = "default_defoci")]
    pub defoci: Vec<f64>,
    /// Vacuum intensity levels in counts (default: [1, 4, 16]).
    #[serde(default = "default_vacuum_levels")]
    pub vacuum_levels: Vec<u32>,
    /// Noise seed; unseeded runs differ every time.
    pub seed: Option<u64>,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            defoci: default_defoci(),
            vacuum_levels: default_vacuum_levels(),
            seed: None,
        }
    }
}

fn default_defoci() -> Vec<f64> {
    vec![8.0]
}
fn default_vacuum_levels() -> Vec<u32> {
    vec![1, 4, 16]
}

/// Previously saved parameter bundles.
#[derive(Debug, Deserialize)]
pub struct ParametersConfig {
    pub msa: PathBuf,
    pub wavimg: PathBuf,
}

/// Location and console behaviour of the Dr. Probe programs.
#[derive(Debug, Deserialize)]
pub struct DrProbeConfig {
    /// Directory holding `celslc`, `msa` and `wavimg` (default: `PATH`).
    pub bin_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verbose: bool,
}

impl Default for DrProbeConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            verbose: true,
        }
    }
}

impl JobConfig {
    /// The immutable constants of this job.
    pub fn constants(&self) -> SimulationConstants {
        let m = &self.microscope;
        SimulationConstants {
            high_tension_kv: m.high_tension,
            wavelength_nm: m
                .wavelength
                .unwrap_or_else(|| electron_wavelength_nm(m.high_tension)),
            nx: self.sampling.nx,
            ny: self.sampling.ny,
            nz: self.slicing.nz,
            debye_waller: self.slicing.debye_waller,
            biso_nm2: self.slicing.biso,
            absorptive: self.slicing.absorptive,
            cs_nm: m.cs,
            c5_nm: m.c5,
            tilt_deg: (m.tilt[0], m.tilt[1]),
            focus_spread_nm: m.focus_spread,
            semi_divergence_mrad: m.semi_divergence,
            vibration_nm: m.vibration,
            objective_aperture_mrad: m.objective_aperture,
            mtf_file: m.mtf_file.clone(),
            mtf_scale: m.mtf_scale,
            defoci_nm: self.imaging.defoci.clone(),
            vacuum_levels: self.imaging.vacuum_levels.clone(),
            noise_seed: self.imaging.seed,
            verbose: self.drprobe.verbose,
        }
    }

    pub fn dirs(&self) -> SimulationDirs {
        let d = &self.directories;
        SimulationDirs {
            input: d.input.clone(),
            output: d.output.clone(),
            clean_images: d.clean_images.clone(),
            noisy_images: d.noisy_images.clone(),
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration '{}'", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid configuration '{}'", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [directories]
        input = "structures"
        output = "output"
        clean_images = "clean"
        noisy_images = "noisy"
    "#;

    #[test]
    fn test_minimal_job_uses_standard_constants() {
        let job: JobConfig = toml::from_str(MINIMAL).unwrap();
        let constants = job.constants();

        assert_eq!(constants.high_tension_kv, 300.0);
        assert!((constants.wavelength_nm - 0.0019687).abs() < 1e-7);
        assert_eq!((constants.nx, constants.ny, constants.nz), (512, 512, 300));
        assert!(constants.debye_waller && constants.absorptive);
        assert_eq!(constants.biso_nm2, 0.005);
        assert_eq!(constants.cs_nm, -9000.0);
        assert_eq!(constants.c5_nm, 5_000_000.0);
        assert_eq!(constants.defoci_nm, vec![8.0]);
        assert_eq!(constants.vacuum_levels, vec![1, 4, 16]);
        assert_eq!(constants.noise_seed, None);
        assert!(job.parameters.is_none());
        assert!(job.directories.reference_cell.is_none());
    }

    #[test]
    fn test_full_job() {
        let toml_str = r#"
            [directories]
            input = "in"
            output = "out"
            clean_images = "img/clean"
            noisy_images = "img/noisy"
            reference_cell = "in/ref.cel"

            [microscope]
            high_tension = 200.0
            wavelength = 0.00251
            tilt = [0.0, 0.0]
            mtf_file = "MTF-US2k-300.mtf"

            [sampling]
            nx = 256
            ny = 128

            [slicing]
            nz = 40
            absorptive = false

            [imaging]
            defoci = [-4.0, 0.0, 4.0]
            vacuum_levels = [2, 8]
            seed = 99

            [parameters]
            msa = "prm/MsaPrm_Initialized.prm"
            wavimg = "prm/WavPrm_Initialized.prm"

            [drprobe]
            bin_dir = "/opt/drprobe/bin"
            verbose = false
        "#;
        let job: JobConfig = toml::from_str(toml_str).unwrap();
        let constants = job.constants();

        assert_eq!(constants.high_tension_kv, 200.0);
        assert_eq!(constants.wavelength_nm, 0.00251);
        assert_eq!(constants.tilt_deg, (0.0, 0.0));
        assert_eq!((constants.nx, constants.ny, constants.nz), (256, 128, 40));
        assert!(!constants.absorptive);
        assert!(constants.debye_waller);
        assert_eq!(constants.defoci_nm, vec![-4.0, 0.0, 4.0]);
        assert_eq!(constants.noise_seed, Some(99));
        assert!(!constants.verbose);
        assert_eq!(constants.mtf_file, Some(PathBuf::from("MTF-US2k-300.mtf")));

        let dirs = job.dirs();
        assert_eq!(dirs.noisy_images, PathBuf::from("img/noisy"));
        assert_eq!(
            job.parameters.unwrap().wavimg,
            PathBuf::from("prm/WavPrm_Initialized.prm")
        );
        assert_eq!(job.drprobe.bin_dir, Some(PathBuf::from("/opt/drprobe/bin")));
    }

    #[test]
    fn test_missing_directories_is_an_error() {
        let result: Result<JobConfig, _> = toml::from_str("[imaging]\ndefoci = [1.0]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/job.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/job.toml"));
    }
}
