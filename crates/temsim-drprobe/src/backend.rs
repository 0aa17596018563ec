//! Simulation backend trait.
//!
//! The [`SimulationBackend`] trait abstracts over the three blocking
//! multislice stages so that the pipeline in `temsim-core` does not care
//! whether they run as external Dr. Probe processes or as an in-process
//! stand-in.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

/// Errors originating from simulation backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' failed ({status})")]
    CommandFailed { program: String, status: ExitStatus },

    #[error("Expected output not produced: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Backend error: {0}")]
    Other(String),
}

/// Describes a simulation backend.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub name: String,
    /// Where the executables are taken from, if not from `PATH`.
    pub location: Option<PathBuf>,
}

/// Inputs of the slicing stage (`celslc`).
#[derive(Debug, Clone)]
pub struct SliceRequest {
    /// Structure file to slice.
    pub structure: PathBuf,
    /// Output prefix; slice files are written as `<prefix>_NNN.sli`.
    pub output_prefix: PathBuf,
    /// Accelerating voltage (kV).
    pub high_tension: f64,
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
    /// Apply built-in absorptive form factors.
    pub absorptive: bool,
    /// Apply Debye-Waller factors.
    pub debye_waller: bool,
    /// Isotropic B parameter (nm²) used when the structure carries none.
    pub biso: f64,
}

/// The three blocking stages of a CTEM multislice simulation.
pub trait SimulationBackend {
    /// Return information about the backend.
    fn info(&self) -> BackendInfo;

    /// Generate phase-grating slices from a structure file.
    fn slice(&self, request: &SliceRequest) -> Result<(), BackendError>;

    /// Propagate the incident wave through the slices described by
    /// `msa_prm`, writing the exit wave with prefix `wave_out`.
    ///
    /// The exit wave ends up at [`wave_file_path`]`(wave_out, nz)`.
    fn propagate(&self, msa_prm: &Path, wave_out: &Path) -> Result<(), BackendError>;

    /// Form an image from the wave named in `wavimg_prm` at the given
    /// defocus, writing a raw single-precision raster to `image_out`.
    fn form_image(
        &self,
        wavimg_prm: &Path,
        image_out: &Path,
        defocus_nm: f64,
    ) -> Result<(), BackendError>;
}

/// Path of the exit wave written by `msa` after `total_slices` slices.
///
/// `msa` appends `_sl<NNN>.wav` (three-digit, zero-padded) to the output
/// prefix.
pub fn wave_file_path(wave_out: &Path, total_slices: u32) -> PathBuf {
    let mut name = wave_out.as_os_str().to_os_string();
    name.push(format!("_sl{:03}.wav", total_slices));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_file_path_padding() {
        let p = wave_file_path(Path::new("out/foo/wav/foo"), 300);
        assert_eq!(p, PathBuf::from("out/foo/wav/foo_sl300.wav"));

        let p = wave_file_path(Path::new("foo"), 7);
        assert_eq!(p, PathBuf::from("foo_sl007.wav"));

        let p = wave_file_path(Path::new("foo"), 1200);
        assert_eq!(p, PathBuf::from("foo_sl1200.wav"));
    }
}
