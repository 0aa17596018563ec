//! Core types shared across the simulation pipeline.
//!
//! [`SimulationConstants`] and [`SimulationDirs`] are built once at start-up
//! and passed by reference into the bundle builder and the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use temsim_structure::parsers::{read_structure, ParseError};

/// Fixed physical and numerical settings of a simulation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConstants {
    /// Accelerating voltage (kV).
    pub high_tension_kv: f64,
    /// Electron wavelength (nm).
    pub wavelength_nm: f64,
    /// Pixel grid width of slices, waves and images.
    pub nx: u32,
    /// Pixel grid height of slices, waves and images.
    pub ny: u32,
    /// Number of slices per structure.
    pub nz: u32,
    /// Apply Debye-Waller factors while slicing.
    pub debye_waller: bool,
    /// Isotropic B parameter (nm²) for sites without one.
    pub biso_nm2: f64,
    /// Apply built-in absorptive form factors while slicing.
    pub absorptive: bool,
    /// Third-order spherical aberration (nm).
    pub cs_nm: f64,
    /// Fifth-order spherical aberration (nm).
    pub c5_nm: f64,
    /// Object tilt about x and y (deg).
    pub tilt_deg: (f64, f64),
    /// Focal half-spread (nm).
    pub focus_spread_nm: f64,
    /// Beam semi-divergence (mrad).
    pub semi_divergence_mrad: f64,
    /// Isotropic vibration amplitude (nm).
    pub vibration_nm: f64,
    /// Objective aperture radius (mrad).
    pub objective_aperture_mrad: f64,
    /// Detector MTF file; `None` disables the MTF.
    pub mtf_file: Option<PathBuf>,
    /// Experimental-to-simulated sampling ratio for the MTF.
    pub mtf_scale: f64,
    /// Defocus values (nm), positive is overfocus. Processed in order.
    pub defoci_nm: Vec<f64>,
    /// Vacuum intensity levels (electron counts). Processed in order.
    pub vacuum_levels: Vec<u32>,
    /// Seed for noise generation; `None` draws from OS entropy.
    pub noise_seed: Option<u64>,
    /// Show the external programs' console output.
    pub verbose: bool,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        Self {
            high_tension_kv: 300.0,
            wavelength_nm: electron_wavelength_nm(300.0),
            nx: 512,
            ny: 512,
            nz: 300,
            debye_waller: true,
            biso_nm2: 0.005,
            absorptive: true,
            cs_nm: -9000.0,
            c5_nm: 5_000_000.0,
            tilt_deg: (2.0, -1.0),
            focus_spread_nm: 4.0,
            semi_divergence_mrad: 0.2,
            vibration_nm: 0.05,
            objective_aperture_mrad: 250.0,
            mtf_file: None,
            mtf_scale: 1.0,
            defoci_nm: vec![8.0],
            vacuum_levels: vec![1, 4, 16],
            noise_seed: None,
            verbose: true,
        }
    }
}

/// The four directories a batch works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationDirs {
    /// Structure files to simulate.
    pub input: PathBuf,
    /// Per-structure working trees.
    pub output: PathBuf,
    /// Final clean images.
    pub clean_images: PathBuf,
    /// Final noisy images, one subdirectory per vacuum level.
    pub noisy_images: PathBuf,
}

/// Lattice lengths of the simulated super-cell (nm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellDimensions {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl CellDimensions {
    /// Read the lattice lengths from a `.cel` structure file.
    pub fn from_structure_file(path: &Path) -> Result<Self, ParseError> {
        let cell = read_structure(path)?.cell;
        Ok(Self { a: cell.a, b: cell.b, c: cell.c })
    }
}

/// Relativistic electron wavelength (nm) for an accelerating voltage (kV).
///
/// $\lambda = hc / \sqrt{E (E + 2 m_0 c^2)}$ with $E = eU$.
pub fn electron_wavelength_nm(high_tension_kv: f64) -> f64 {
    const HC_EV_NM: f64 = 1239.841_984;
    const REST_ENERGY_EV: f64 = 510_998.95;
    let e = high_tension_kv * 1e3;
    HC_EV_NM / (e * (e + 2.0 * REST_ENERGY_EV)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelength_at_300kv() {
        let lambda = electron_wavelength_nm(300.0);
        assert!((lambda - 0.0019687).abs() < 1e-7, "lambda = {lambda}");
    }

    #[test]
    fn test_wavelength_decreases_with_voltage() {
        assert!(electron_wavelength_nm(80.0) > electron_wavelength_nm(200.0));
        assert!((electron_wavelength_nm(200.0) - 0.0025079).abs() < 1e-7);
    }

    #[test]
    fn test_cell_dimensions_from_cel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.cel");
        std::fs::write(&path, "ref\n0 5.4 5.5 3.2 90 90 90\nCe 0.5 0.5 0.5\n*\n").unwrap();
        let cell = CellDimensions::from_structure_file(&path).unwrap();
        assert_eq!(cell, CellDimensions { a: 5.4, b: 5.5, c: 3.2 });
    }
}
