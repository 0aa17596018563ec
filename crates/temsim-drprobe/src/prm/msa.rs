//! `msa` parameter file: multislice propagation settings.
//!
//! The file has two sections, `'[Microscope Parameters]'` and
//! `'[Multislice Parameters]'`, followed by the object slice sequence.
//! STEM-only entries are carried through untouched for CTEM runs.

use std::path::Path;

use super::{quote, read_file, write_file, Aberrations, PrmError, PrmReader, PrmWriter};

const MICROSCOPE_SECTION: &str = "[Microscope Parameters]";
const MULTISLICE_SECTION: &str = "[Multislice Parameters]";

/// STEM detector definition: flag and definition file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectorDefinition {
    pub flag: i32,
    pub file: String,
}

/// Multislice propagation parameter bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct MsaPrm {
    /// STEM only: probe-forming aperture radius (mrad).
    pub conv_semi_angle: f64,
    /// STEM only: inner radius of the annular detector (mrad).
    pub inner_radius_ann_det: f64,
    /// STEM only: outer radius of the annular detector (mrad).
    pub outer_radius_ann_det: f64,
    pub detector: DetectorDefinition,
    /// Electron wavelength (nm).
    pub wavelength: f64,
    /// Focus half-spread (nm).
    pub focus_spread: f64,
    pub focus_spread_kernel_hw: f64,
    pub focus_spread_kernel_size: u32,
    /// Source radius, HWHM (nm).
    pub source_radius: f64,
    pub source_radius_kernel_hw: f64,
    pub source_radius_kernel_size: u32,
    pub aberrations: Aberrations,
    /// Object tilt about x (deg).
    pub tilt_x: f64,
    /// Object tilt about y (deg).
    pub tilt_y: f64,
    pub h_scan_offset: f64,
    pub v_scan_offset: f64,
    /// Horizontal scan frame size (nm).
    pub h_scan_frame_size: f64,
    /// Vertical scan frame size (nm).
    pub v_scan_frame_size: f64,
    pub scan_frame_rot: f64,
    pub scan_columns: u32,
    pub scan_rows: u32,
    pub temp_coherence_flag: i32,
    pub spat_coherence_flag: i32,
    pub super_cell: [u32; 3],
    /// Slice file prefix produced by `celslc`.
    pub slice_files: String,
    /// Number of distinct slice files.
    pub number_of_slices: u32,
    pub number_of_frozen_lattice: u32,
    pub min_num_det_slices: u32,
    pub det_readout_period: u32,
    /// Number of slices in the object, i.e. the propagation depth.
    pub tot_number_of_slices: u32,
    /// Slice file index per object slice. Empty means the cyclic sequence
    /// `0, 1, .., number_of_slices - 1, 0, ..`.
    pub slice_sequence: Vec<u32>,
}

impl Default for MsaPrm {
    fn default() -> Self {
        Self {
            conv_semi_angle: 0.0,
            inner_radius_ann_det: 0.0,
            outer_radius_ann_det: 0.0,
            detector: DetectorDefinition::default(),
            wavelength: 0.0019687,
            focus_spread: 0.0,
            focus_spread_kernel_hw: 2.0,
            focus_spread_kernel_size: 7,
            source_radius: 0.0,
            source_radius_kernel_hw: 2.0,
            source_radius_kernel_size: 7,
            aberrations: Aberrations::new(),
            tilt_x: 0.0,
            tilt_y: 0.0,
            h_scan_offset: 0.0,
            v_scan_offset: 0.0,
            h_scan_frame_size: 1.0,
            v_scan_frame_size: 1.0,
            scan_frame_rot: 0.0,
            scan_columns: 1,
            scan_rows: 1,
            temp_coherence_flag: 0,
            spat_coherence_flag: 0,
            super_cell: [1, 1, 1],
            slice_files: String::new(),
            number_of_slices: 1,
            number_of_frozen_lattice: 1,
            min_num_det_slices: 0,
            det_readout_period: 0,
            tot_number_of_slices: 1,
            slice_sequence: Vec::new(),
        }
    }
}

impl MsaPrm {
    /// Copy of this bundle pointing at a different slice file prefix.
    pub fn with_slice_files(&self, slice_files: impl AsRef<Path>) -> Self {
        Self {
            slice_files: slice_files.as_ref().display().to_string(),
            ..self.clone()
        }
    }

    /// The slice file index used for each object slice.
    pub fn effective_slice_sequence(&self) -> Vec<u32> {
        if !self.slice_sequence.is_empty() {
            return self.slice_sequence.clone();
        }
        cyclic_sequence(self.tot_number_of_slices, self.number_of_slices)
    }

    /// Render the bundle in `msa` parameter file syntax.
    pub fn to_prm_string(&self) -> String {
        let mut w = PrmWriter::new();
        w.line(quote(MICROSCOPE_SECTION), "");
        w.line(self.conv_semi_angle.to_string(), "STEM only: aperture radius [mrad]");
        w.line(self.inner_radius_ann_det.to_string(), "STEM only: inner detector radius [mrad]");
        w.line(self.outer_radius_ann_det.to_string(), "STEM only: outer detector radius [mrad]");
        w.line(
            format!("{}, {}", self.detector.flag, quote(&self.detector.file)),
            "STEM only: detector definition flag, file",
        );
        w.line(self.wavelength.to_string(), "electron wavelength [nm]");
        w.line(self.focus_spread.to_string(), "focus spread [nm]");
        w.line(self.focus_spread_kernel_hw.to_string(), "focus spread kernel half-width [rel.]");
        w.line(self.focus_spread_kernel_size.to_string(), "focus spread kernel size");
        w.line(self.source_radius.to_string(), "source radius (HWHM) [nm]");
        w.line(self.source_radius_kernel_hw.to_string(), "source radius kernel half-width [rel.]");
        w.line(self.source_radius_kernel_size.to_string(), "source radius kernel size");
        w.aberrations(&self.aberrations);

        w.line(quote(MULTISLICE_SECTION), "");
        w.line(self.tilt_x.to_string(), "object tilt x [deg]");
        w.line(self.tilt_y.to_string(), "object tilt y [deg]");
        w.line(self.h_scan_offset.to_string(), "horizontal scan offset [nm]");
        w.line(self.v_scan_offset.to_string(), "vertical scan offset [nm]");
        w.line(self.h_scan_frame_size.to_string(), "horizontal scan frame size [nm]");
        w.line(self.v_scan_frame_size.to_string(), "vertical scan frame size [nm]");
        w.line(self.scan_frame_rot.to_string(), "scan frame rotation [deg]");
        w.line(self.scan_columns.to_string(), "scan columns");
        w.line(self.scan_rows.to_string(), "scan rows");
        w.line(self.temp_coherence_flag.to_string(), "temporal coherence flag");
        w.line(self.spat_coherence_flag.to_string(), "spatial coherence flag");
        w.line(
            format!("{}, {}, {}", self.super_cell[0], self.super_cell[1], self.super_cell[2]),
            "super-cell repeats x, y, z",
        );
        w.line(quote(&self.slice_files), "slice file prefix");
        w.line(self.number_of_slices.to_string(), "number of slice files");
        w.line(self.number_of_frozen_lattice.to_string(), "frozen lattice variants per slice");
        w.line(self.min_num_det_slices.to_string(), "minimum number of slices for detection");
        w.line(self.det_readout_period.to_string(), "detector readout period");
        w.line(self.tot_number_of_slices.to_string(), "number of slices in the object");
        for index in self.effective_slice_sequence() {
            w.line(index.to_string(), "");
        }
        w.finish()
    }

    /// Parse an `msa` parameter file.
    pub fn from_prm_str(content: &str) -> Result<Self, PrmError> {
        let mut r = PrmReader::new(content);
        expect_section(&mut r, MICROSCOPE_SECTION)?;

        let conv_semi_angle = r.next("aperture radius")?.parse(0)?;
        let inner_radius_ann_det = r.next("inner detector radius")?.parse(0)?;
        let outer_radius_ann_det = r.next("outer detector radius")?.parse(0)?;
        let det = r.next("detector definition")?;
        let detector = DetectorDefinition {
            flag: det.parse(0)?,
            file: if det.values.len() > 1 { det.string(1)? } else { String::new() },
        };
        let wavelength = r.next("wavelength")?.parse(0)?;
        let focus_spread = r.next("focus spread")?.parse(0)?;
        let focus_spread_kernel_hw = r.next("focus spread kernel half-width")?.parse(0)?;
        let focus_spread_kernel_size = r.next("focus spread kernel size")?.parse(0)?;
        let source_radius = r.next("source radius")?.parse(0)?;
        let source_radius_kernel_hw = r.next("source radius kernel half-width")?.parse(0)?;
        let source_radius_kernel_size = r.next("source radius kernel size")?.parse(0)?;
        let aberrations = r.aberrations()?;

        expect_section(&mut r, MULTISLICE_SECTION)?;
        let tilt_x = r.next("tilt x")?.parse(0)?;
        let tilt_y = r.next("tilt y")?.parse(0)?;
        let h_scan_offset = r.next("horizontal scan offset")?.parse(0)?;
        let v_scan_offset = r.next("vertical scan offset")?.parse(0)?;
        let h_scan_frame_size = r.next("horizontal scan frame size")?.parse(0)?;
        let v_scan_frame_size = r.next("vertical scan frame size")?.parse(0)?;
        let scan_frame_rot = r.next("scan frame rotation")?.parse(0)?;
        let scan_columns = r.next("scan columns")?.parse(0)?;
        let scan_rows = r.next("scan rows")?.parse(0)?;
        let temp_coherence_flag = r.next("temporal coherence flag")?.parse(0)?;
        let spat_coherence_flag = r.next("spatial coherence flag")?.parse(0)?;
        let sc = r.next("super-cell repeats")?;
        let super_cell = [sc.parse(0)?, sc.parse(1)?, sc.parse(2)?];
        let slice_files = r.next("slice file prefix")?.string(0)?;
        let number_of_slices = r.next("number of slice files")?.parse(0)?;
        let number_of_frozen_lattice = r.next("frozen lattice variants")?.parse(0)?;
        let min_num_det_slices = r.next("minimum detection slices")?.parse(0)?;
        let det_readout_period = r.next("detector readout period")?.parse(0)?;
        let tot_number_of_slices: u32 = r.next("number of object slices")?.parse(0)?;

        let mut sequence = Vec::new();
        for _ in 0..tot_number_of_slices {
            sequence.push(r.next("slice sequence")?.parse(0)?);
        }
        let slice_sequence = if sequence == cyclic_sequence(tot_number_of_slices, number_of_slices) {
            Vec::new()
        } else {
            sequence
        };

        Ok(Self {
            conv_semi_angle,
            inner_radius_ann_det,
            outer_radius_ann_det,
            detector,
            wavelength,
            focus_spread,
            focus_spread_kernel_hw,
            focus_spread_kernel_size,
            source_radius,
            source_radius_kernel_hw,
            source_radius_kernel_size,
            aberrations,
            tilt_x,
            tilt_y,
            h_scan_offset,
            v_scan_offset,
            h_scan_frame_size,
            v_scan_frame_size,
            scan_frame_rot,
            scan_columns,
            scan_rows,
            temp_coherence_flag,
            spat_coherence_flag,
            super_cell,
            slice_files,
            number_of_slices,
            number_of_frozen_lattice,
            min_num_det_slices,
            det_readout_period,
            tot_number_of_slices,
            slice_sequence,
        })
    }

    /// Write the full bundle to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PrmError> {
        write_file(path, &self.to_prm_string())?;
        log::debug!("Saved msa parameters to {}", path.display());
        Ok(())
    }

    /// Load a bundle previously written by [`MsaPrm::save`] or by Dr. Probe.
    pub fn load(path: &Path) -> Result<Self, PrmError> {
        Self::from_prm_str(&read_file(path)?)
    }
}

fn cyclic_sequence(total: u32, distinct: u32) -> Vec<u32> {
    let distinct = distinct.max(1);
    (0..total).map(|i| i % distinct).collect()
}

fn expect_section(reader: &mut PrmReader<'_>, name: &str) -> Result<(), PrmError> {
    let record = reader.next(name)?;
    if record.values.first().map(String::as_str) != Some(name) {
        return Err(PrmError::Syntax {
            line: record.line,
            message: format!("expected section '{}'", name),
        });
    }
    Ok(())
}
