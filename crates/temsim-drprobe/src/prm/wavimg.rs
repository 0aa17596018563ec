//! `wavimg` parameter file: image formation from an exit-plane wave.

use std::path::Path;

use super::{quote, read_file, write_file, Aberrations, PrmError, PrmReader, PrmWriter};

/// Output sampling and frame option of `wavimg`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub flag: i32,
    /// Image sampling (nm/pixel) when `flag` is set.
    pub sampling: f64,
    /// Frame rotation (deg).
    pub rotation: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

impl Default for ImageFrame {
    fn default() -> Self {
        Self { flag: 0, sampling: 0.01, rotation: 0.0, shift_x: 0.0, shift_y: 0.0 }
    }
}

/// Intensity calibration and detector noise option.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityCalibration {
    pub flag: i32,
    pub vacuum_mean: f64,
    pub conversion_rate: f64,
    pub readout_noise: f64,
}

impl Default for IntensityCalibration {
    fn default() -> Self {
        Self { flag: 0, vacuum_mean: 1000.0, conversion_rate: 1.0, readout_noise: 0.0 }
    }
}

/// Detector modulation transfer function.
#[derive(Debug, Clone, PartialEq)]
pub struct Mtf {
    pub flag: i32,
    /// Ratio of experimental to simulated sampling rate.
    pub scale: f64,
    pub file: String,
}

impl Default for Mtf {
    fn default() -> Self {
        Self { flag: 0, scale: 1.0, file: String::new() }
    }
}

/// Isotropic or anisotropic image vibration envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vibration {
    pub flag: i32,
    /// RMS amplitude along x (nm).
    pub x: f64,
    /// RMS amplitude along y (nm).
    pub y: f64,
    /// Orientation of the x amplitude (deg).
    pub angle: f64,
}

/// Image formation parameter bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct WavimgPrm {
    /// Exit-plane wave file produced by `msa`.
    pub wave_files: String,
    /// Wave dimension in pixels (nx, ny).
    pub wave_dim: (u32, u32),
    /// Wave sampling (nm/pixel).
    pub wave_sampling: (f64, f64),
    /// Accelerating voltage (kV).
    pub high_tension: f64,
    /// 0 = TEM image, 1 = wave amplitude, ...
    pub output_format: i32,
    pub output_files: String,
    /// Output image size in pixels (nx, ny).
    pub output_dim: (u32, u32),
    pub image_frame: ImageFrame,
    pub intensity_calibration: IntensityCalibration,
    /// 0 = none, 1 = explicit TCC, 2 = quasi-coherent, ...
    pub coherence_model: i32,
    /// Temporal coherence flag and focal half-spread (nm).
    pub temp_coherence: (i32, f64),
    /// Spatial coherence flag and beam semi-divergence (mrad).
    pub spat_coherence: (i32, f64),
    pub mtf: Mtf,
    pub vibration: Vibration,
    pub aberrations: Aberrations,
    /// Objective aperture radius (mrad).
    pub oa_radius: f64,
    /// Objective aperture centre (mrad).
    pub oa_position: (f64, f64),
    /// Loop definition lines, kept verbatim.
    pub loop_lines: Vec<String>,
    pub loop_count: u32,
}

impl Default for WavimgPrm {
    fn default() -> Self {
        Self {
            wave_files: String::new(),
            wave_dim: (1, 1),
            wave_sampling: (0.01, 0.01),
            high_tension: 300.0,
            output_format: 0,
            output_files: String::new(),
            output_dim: (1, 1),
            image_frame: ImageFrame::default(),
            intensity_calibration: IntensityCalibration::default(),
            coherence_model: 0,
            temp_coherence: (0, 0.0),
            spat_coherence: (0, 0.0),
            mtf: Mtf::default(),
            vibration: Vibration::default(),
            aberrations: Aberrations::new(),
            oa_radius: 250.0,
            oa_position: (0.0, 0.0),
            loop_lines: Vec::new(),
            loop_count: 0,
        }
    }
}

impl WavimgPrm {
    /// Copy of this bundle reading a different wave file.
    pub fn with_wave_files(&self, wave_files: impl AsRef<Path>) -> Self {
        Self {
            wave_files: wave_files.as_ref().display().to_string(),
            ..self.clone()
        }
    }

    /// Render the bundle in `wavimg` parameter file syntax.
    pub fn to_prm_string(&self) -> String {
        let mut w = PrmWriter::new();
        w.line(quote(&self.wave_files), "wave function file");
        w.line(format!("{}, {}", self.wave_dim.0, self.wave_dim.1), "wave dimension [pixels]");
        w.line(
            format!("{}, {}", self.wave_sampling.0, self.wave_sampling.1),
            "wave sampling [nm/pixel]",
        );
        w.line(self.high_tension.to_string(), "high tension [kV]");
        w.line(self.output_format.to_string(), "output format (0 = TEM image)");
        w.line(quote(&self.output_files), "output file");
        w.line(format!("{}, {}", self.output_dim.0, self.output_dim.1), "output dimension [pixels]");
        let f = &self.image_frame;
        w.line(
            format!("{}, {}, {}, {}, {}", f.flag, f.sampling, f.rotation, f.shift_x, f.shift_y),
            "output frame flag, sampling [nm/pixel], rotation [deg], shift x, y",
        );
        let ic = &self.intensity_calibration;
        w.line(
            format!("{}, {}, {}, {}", ic.flag, ic.vacuum_mean, ic.conversion_rate, ic.readout_noise),
            "intensity calibration flag, vacuum mean, conversion rate, readout noise",
        );
        w.line(self.coherence_model.to_string(), "coherence model");
        w.line(
            format!("{}, {}", self.temp_coherence.0, self.temp_coherence.1),
            "temporal coherence flag, focal spread [nm]",
        );
        w.line(
            format!("{}, {}", self.spat_coherence.0, self.spat_coherence.1),
            "spatial coherence flag, semi-divergence [mrad]",
        );
        w.line(
            format!("{}, {}, {}", self.mtf.flag, self.mtf.scale, quote(&self.mtf.file)),
            "MTF flag, scale, file",
        );
        let v = &self.vibration;
        w.line(
            format!("{}, {}, {}, {}", v.flag, v.x, v.y, v.angle),
            "vibration flag, x [nm], y [nm], angle [deg]",
        );
        w.aberrations(&self.aberrations);
        w.line(self.oa_radius.to_string(), "objective aperture radius [mrad]");
        w.line(
            format!("{}, {}", self.oa_position.0, self.oa_position.1),
            "objective aperture centre [mrad]",
        );
        w.line(self.loop_count.to_string(), "number of loop definitions");
        for line in &self.loop_lines {
            w.line(line, "");
        }
        w.finish()
    }

    /// Parse a `wavimg` parameter file.
    pub fn from_prm_str(content: &str) -> Result<Self, PrmError> {
        let mut r = PrmReader::new(content);

        let wave_files = r.next("wave function file")?.string(0)?;
        let wd = r.next("wave dimension")?;
        let ws = r.next("wave sampling")?;
        let high_tension = r.next("high tension")?.parse(0)?;
        let output_format = r.next("output format")?.parse(0)?;
        let output_files = r.next("output file")?.string(0)?;
        let od = r.next("output dimension")?;
        let fr = r.next("output frame option")?;
        let ic = r.next("intensity calibration")?;
        let coherence_model = r.next("coherence model")?.parse(0)?;
        let tc = r.next("temporal coherence")?;
        let sc = r.next("spatial coherence")?;
        let mtf = r.next("MTF")?;
        let vib = r.next("vibration")?;
        let aberrations = r.aberrations()?;
        let oa_radius = r.next("objective aperture radius")?.parse(0)?;
        let oa = r.next("objective aperture centre")?;
        let loop_count = r.next("number of loop definitions")?.parse(0)?;

        let mut loop_lines = Vec::new();
        while let Some(record) = r.try_next()? {
            loop_lines.push(record.raw);
        }

        Ok(Self {
            wave_files,
            wave_dim: (wd.parse(0)?, wd.parse(1)?),
            wave_sampling: (ws.parse(0)?, ws.parse(1)?),
            high_tension,
            output_format,
            output_files,
            output_dim: (od.parse(0)?, od.parse(1)?),
            image_frame: ImageFrame {
                flag: fr.parse(0)?,
                sampling: fr.parse(1)?,
                rotation: fr.parse(2)?,
                shift_x: fr.parse(3)?,
                shift_y: fr.parse(4)?,
            },
            intensity_calibration: IntensityCalibration {
                flag: ic.parse(0)?,
                vacuum_mean: ic.parse(1)?,
                conversion_rate: ic.parse(2)?,
                readout_noise: ic.parse(3)?,
            },
            coherence_model,
            temp_coherence: (tc.parse(0)?, tc.parse(1)?),
            spat_coherence: (sc.parse(0)?, sc.parse(1)?),
            mtf: Mtf {
                flag: mtf.parse(0)?,
                scale: mtf.parse(1)?,
                file: if mtf.values.len() > 2 { mtf.string(2)? } else { String::new() },
            },
            vibration: Vibration {
                flag: vib.parse(0)?,
                x: vib.parse(1)?,
                y: vib.parse(2)?,
                angle: vib.parse(3)?,
            },
            aberrations,
            oa_radius,
            oa_position: (oa.parse(0)?, oa.parse(1)?),
            loop_lines,
            loop_count,
        })
    }

    /// Write the full bundle to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PrmError> {
        write_file(path, &self.to_prm_string())?;
        log::debug!("Saved wavimg parameters to {}", path.display());
        Ok(())
    }

    /// Load a bundle previously written by [`WavimgPrm::save`] or by Dr. Probe.
    pub fn load(path: &Path) -> Result<Self, PrmError> {
        Self::from_prm_str(&read_file(path)?)
    }
}
