//! Parameter bundle builder.
//!
//! A batch needs one `msa` bundle and one `wavimg` bundle. They are either
//! built from [`SimulationConstants`] or loaded from files saved earlier,
//! and then specialised per structure by the pipeline.

use std::path::{Path, PathBuf};

use temsim_drprobe::prm::wavimg::{Mtf, Vibration};
use temsim_drprobe::prm::{DEFOCUS, SPHERICAL_C5, SPHERICAL_CS};
use temsim_drprobe::{Aberrations, MsaPrm, PrmError, WavimgPrm};

use crate::types::{CellDimensions, SimulationConstants};

/// File name of the saved initial `msa` bundle.
pub const MSA_INITIALIZED: &str = "MsaPrm_Initialized.prm";
/// File name of the saved initial `wavimg` bundle.
pub const WAVIMG_INITIALIZED: &str = "WavPrm_Initialized.prm";

/// The propagation and image-formation bundles of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBundles {
    pub msa: MsaPrm,
    pub wavimg: WavimgPrm,
}

impl ParameterBundles {
    /// Build both bundles from constants for a super-cell of size `cell`.
    ///
    /// Values are taken as given; nothing is range-checked.
    pub fn from_constants(constants: &SimulationConstants, cell: CellDimensions) -> Self {
        let aberrations = ctem_aberrations(constants);

        let msa = MsaPrm {
            wavelength: constants.wavelength_nm,
            focus_spread: constants.focus_spread_nm,
            h_scan_frame_size: cell.a,
            v_scan_frame_size: cell.b,
            tilt_x: constants.tilt_deg.0,
            tilt_y: constants.tilt_deg.1,
            scan_columns: constants.nx,
            scan_rows: constants.ny,
            // STEM-only coherence calculations stay off for CTEM
            temp_coherence_flag: 0,
            spat_coherence_flag: 0,
            slice_files: String::new(),
            number_of_slices: constants.nz,
            det_readout_period: 0,
            tot_number_of_slices: constants.nz,
            aberrations: aberrations.clone(),
            ..MsaPrm::default()
        };

        let mtf = match &constants.mtf_file {
            Some(file) => Mtf {
                flag: 1,
                scale: constants.mtf_scale,
                file: file.display().to_string(),
            },
            None => Mtf {
                flag: 0,
                scale: constants.mtf_scale,
                file: String::new(),
            },
        };

        let wavimg = WavimgPrm {
            high_tension: constants.high_tension_kv,
            wave_dim: (constants.nx, constants.ny),
            wave_sampling: (cell.a / constants.nx as f64, cell.b / constants.ny as f64),
            output_format: 0,
            output_dim: (constants.nx, constants.ny),
            coherence_model: 1,
            temp_coherence: (1, constants.focus_spread_nm),
            spat_coherence: (1, constants.semi_divergence_mrad),
            mtf,
            vibration: Vibration {
                flag: 1,
                x: constants.vibration_nm,
                y: constants.vibration_nm,
                angle: 0.0,
            },
            oa_radius: constants.objective_aperture_mrad,
            aberrations,
            ..WavimgPrm::default()
        };

        Self { msa, wavimg }
    }

    /// Load bundles saved by an earlier run or written by hand.
    pub fn load(msa_path: &Path, wavimg_path: &Path) -> Result<Self, PrmError> {
        Ok(Self {
            msa: MsaPrm::load(msa_path)?,
            wavimg: WavimgPrm::load(wavimg_path)?,
        })
    }

    /// Save both bundles into `dir` and return their paths.
    pub fn save(&self, dir: &Path) -> Result<(PathBuf, PathBuf), PrmError> {
        let msa_path = dir.join(MSA_INITIALIZED);
        let wavimg_path = dir.join(WAVIMG_INITIALIZED);
        self.msa.save(&msa_path)?;
        self.wavimg.save(&wavimg_path)?;
        Ok((msa_path, wavimg_path))
    }
}

/// Zero defocus (set per image at run time), Cs and C5.
fn ctem_aberrations(constants: &SimulationConstants) -> Aberrations {
    let mut aberrations = Aberrations::new();
    aberrations.insert(DEFOCUS, (0.0, 0.0));
    aberrations.insert(SPHERICAL_CS, (constants.cs_nm, 0.0));
    aberrations.insert(SPHERICAL_C5, (constants.c5_nm, 0.0));
    aberrations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> CellDimensions {
        CellDimensions { a: 5.12, b: 2.56, c: 3.0 }
    }

    #[test]
    fn test_bundles_from_default_constants() {
        let bundles = ParameterBundles::from_constants(&SimulationConstants::default(), cell());

        assert_eq!(bundles.msa.scan_columns, 512);
        assert_eq!(bundles.msa.tot_number_of_slices, 300);
        assert_eq!(bundles.msa.h_scan_frame_size, 5.12);
        assert_eq!(bundles.msa.tilt_x, 2.0);
        assert_eq!(bundles.msa.tilt_y, -1.0);
        assert_eq!(bundles.msa.aberrations.get(&SPHERICAL_CS), Some(&(-9000.0, 0.0)));
        assert_eq!(bundles.msa.aberrations.get(&SPHERICAL_C5), Some(&(5_000_000.0, 0.0)));

        assert_eq!(bundles.wavimg.wave_sampling, (0.01, 0.005));
        assert_eq!(bundles.wavimg.temp_coherence, (1, 4.0));
        assert_eq!(bundles.wavimg.spat_coherence, (1, 0.2));
        assert_eq!(bundles.wavimg.mtf.flag, 0);
        assert_eq!(bundles.wavimg.oa_radius, 250.0);
        assert_eq!(bundles.wavimg.aberrations, bundles.msa.aberrations);
    }

    #[test]
    fn test_mtf_enabled_when_file_given() {
        let constants = SimulationConstants {
            mtf_file: Some(PathBuf::from("MTF-US2k-300.mtf")),
            mtf_scale: 0.5,
            ..Default::default()
        };
        let bundles = ParameterBundles::from_constants(&constants, cell());
        assert_eq!(bundles.wavimg.mtf.flag, 1);
        assert_eq!(bundles.wavimg.mtf.scale, 0.5);
        assert_eq!(bundles.wavimg.mtf.file, "MTF-US2k-300.mtf");
    }

    #[test]
    fn test_no_validation_of_odd_values() {
        let constants = SimulationConstants { nz: 0, ..Default::default() };
        let bundles = ParameterBundles::from_constants(&constants, cell());
        assert_eq!(bundles.msa.tot_number_of_slices, 0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let bundles = ParameterBundles::from_constants(&SimulationConstants::default(), cell());
        let (msa_path, wavimg_path) = bundles.save(dir.path()).unwrap();

        assert!(msa_path.ends_with(MSA_INITIALIZED));
        assert!(wavimg_path.ends_with(WAVIMG_INITIALIZED));
        assert_eq!(ParameterBundles::load(&msa_path, &wavimg_path).unwrap(), bundles);
    }
}
