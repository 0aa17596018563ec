//! Per-structure pipeline orchestrator.
//!
//! For every structure file in the input directory the [`Pipeline`] runs
//! setup, backup, slicing, propagation, image formation per defocus,
//! post-processing and slice cleanup, strictly in that order and one
//! structure after the other. The first fatal error ends the batch.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use temsim_drprobe::{
    wave_file_path, BackendError, PrmError, SimulationBackend, SliceRequest, WavimgPrm,
};
use temsim_structure::parsers::ParseError;

use crate::bundles::ParameterBundles;
use crate::image_io::{write_clean_tiff, write_counts_tiff, ImageIoError};
use crate::naming::{structure_name, vacuum_dir_name, ImageName};
use crate::noise::NoiseSource;
use crate::raster::{flip_vertical, read_raw, RasterError};
use crate::types::{SimulationConstants, SimulationDirs};

/// Fatal errors of a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Output directory '{}' already exists; clear it before rerunning", .0.display())]
    OutputExists(PathBuf),

    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} failed for '{structure}': {source}")]
    Stage {
        structure: String,
        stage: &'static str,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Prm(#[from] PrmError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Image(#[from] ImageIoError),

    #[error(transparent)]
    Structure(#[from] ParseError),

    #[error("Failed to write report: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A slice directory that could not be removed.
///
/// Never fatal; the structure still counts as processed.
#[derive(Debug, Clone, Error, Serialize)]
#[error("Could not remove slice directory '{}': {message}", path.display())]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Remove a slice directory and everything in it.
pub fn cleanup_slices(dir: &Path) -> Result<(), CleanupWarning> {
    std::fs::remove_dir_all(dir).map_err(|e| {
        let warning = CleanupWarning {
            path: dir.to_path_buf(),
            message: e.to_string(),
        };
        log::warn!("{warning}");
        warning
    })
}

/// Working tree of one structure: `<output>/<name>/{cel,slc,prm,wav,img}`.
#[derive(Debug, Clone)]
pub struct StructureLayout {
    pub name: String,
    pub root: PathBuf,
}

impl StructureLayout {
    pub const SUBDIRS: [&'static str; 5] = ["cel", "slc", "prm", "wav", "img"];

    pub fn new(output: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: output.join(name),
        }
    }

    pub fn cel(&self) -> PathBuf {
        self.root.join("cel")
    }

    pub fn slc(&self) -> PathBuf {
        self.root.join("slc")
    }

    pub fn prm(&self) -> PathBuf {
        self.root.join("prm")
    }

    pub fn wav(&self) -> PathBuf {
        self.root.join("wav")
    }

    pub fn img(&self) -> PathBuf {
        self.root.join("img")
    }

    /// Create the tree. An existing root is an error: one run claims it.
    pub fn create(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.root.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        match std::fs::create_dir(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::OutputExists(self.root.clone()));
            }
            Err(source) => {
                return Err(PipelineError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        }
        for sub in Self::SUBDIRS {
            let dir = self.root.join(sub);
            std::fs::create_dir(&dir).map_err(io_error(&dir))?;
        }
        Ok(())
    }

    /// Prefix handed to the slicing stage.
    pub fn slice_prefix(&self) -> PathBuf {
        self.slc().join(format!("{}_slc", self.name))
    }

    pub fn msa_prm_path(&self) -> PathBuf {
        self.prm().join(format!("MsaPrm_{}.prm", self.name))
    }

    /// Rewritten for every defocus; the last one stays on disk.
    pub fn wavimg_prm_path(&self) -> PathBuf {
        self.prm().join(format!("WavPrm_{}.prm", self.name))
    }

    /// Prefix handed to the propagation stage.
    pub fn wave_prefix(&self) -> PathBuf {
        self.wav().join(&self.name)
    }
}

/// Outcome of one structure.
#[derive(Debug, Clone, Serialize)]
pub struct StructureReport {
    pub name: String,
    pub output: PathBuf,
    pub clean_images: Vec<PathBuf>,
    pub noisy_images: Vec<PathBuf>,
    pub cleanup_warning: Option<CleanupWarning>,
}

/// Outcome of a completed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub structures: Vec<StructureReport>,
}

impl BatchReport {
    pub fn clean_image_count(&self) -> usize {
        self.structures.iter().map(|s| s.clean_images.len()).sum()
    }

    pub fn noisy_image_count(&self) -> usize {
        self.structures.iter().map(|s| s.noisy_images.len()).sum()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CleanupWarning> {
        self.structures
            .iter()
            .filter_map(|s| s.cleanup_warning.as_ref())
    }

    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_error(path))
    }
}

/// Sequential batch orchestrator.
pub struct Pipeline<'a> {
    constants: &'a SimulationConstants,
    dirs: &'a SimulationDirs,
    bundles: &'a ParameterBundles,
    backend: &'a dyn SimulationBackend,
    noise: NoiseSource,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        constants: &'a SimulationConstants,
        dirs: &'a SimulationDirs,
        bundles: &'a ParameterBundles,
        backend: &'a dyn SimulationBackend,
    ) -> Self {
        Self {
            constants,
            dirs,
            bundles,
            backend,
            noise: NoiseSource::new(constants.noise_seed),
        }
    }

    /// Create the clean image directory and one noisy directory per level.
    pub fn prepare_noise_dirs(&self) -> Result<(), PipelineError> {
        let clean = &self.dirs.clean_images;
        std::fs::create_dir_all(clean).map_err(io_error(clean))?;
        for &level in &self.constants.vacuum_levels {
            let dir = self.dirs.noisy_images.join(vacuum_dir_name(level));
            std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        }
        Ok(())
    }

    /// Regular files of the input directory, in listing order.
    pub fn structure_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let input = &self.dirs.input;
        let mut files = Vec::new();
        for entry in std::fs::read_dir(input).map_err(io_error(input))? {
            let path = entry.map_err(io_error(input))?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Process every structure of the input directory.
    pub fn run_batch(&mut self) -> Result<BatchReport, PipelineError> {
        self.prepare_noise_dirs()?;
        let files = self.structure_files()?;
        log::info!(
            "Simulating {} structures with {} backend",
            files.len(),
            self.backend.info().name
        );

        let mut report = BatchReport::default();
        for (i, file) in files.iter().enumerate() {
            log::info!("[{}/{}] {}", i + 1, files.len(), file.display());
            report.structures.push(self.process_structure(file)?);
        }
        Ok(report)
    }

    /// Run every stage for one structure file.
    pub fn process_structure(&mut self, file: &Path) -> Result<StructureReport, PipelineError> {
        let constants = self.constants;
        let name = structure_name(file);
        let layout = StructureLayout::new(&self.dirs.output, &name);
        layout.create()?;

        // Backup
        let file_name = file.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(&name));
        let backup = layout.cel().join(file_name);
        std::fs::copy(file, &backup).map_err(io_error(&backup))?;

        // Slicing
        let request = SliceRequest {
            structure: backup,
            output_prefix: layout.slice_prefix(),
            high_tension: constants.high_tension_kv,
            nx: constants.nx,
            ny: constants.ny,
            nz: constants.nz,
            absorptive: constants.absorptive,
            debye_waller: constants.debye_waller,
            biso: constants.biso_nm2,
        };
        log::debug!("Slicing {name}");
        self.backend
            .slice(&request)
            .map_err(|source| stage_error(&name, "slicing", source))?;

        // Propagation
        let msa = self.bundles.msa.with_slice_files(layout.slice_prefix());
        let msa_path = layout.msa_prm_path();
        msa.save(&msa_path)?;
        let wave_prefix = layout.wave_prefix();
        log::debug!("Propagating {name}");
        self.backend
            .propagate(&msa_path, &wave_prefix)
            .map_err(|source| stage_error(&name, "propagation", source))?;
        let wave = wave_file_path(&wave_prefix, msa.tot_number_of_slices);

        let mut report = StructureReport {
            name: name.clone(),
            output: layout.root.clone(),
            clean_images: Vec::new(),
            noisy_images: Vec::new(),
            cleanup_warning: None,
        };

        // Image formation and post-processing
        for &defocus in &constants.defoci_nm {
            let image = ImageName {
                structure: name.clone(),
                slices: constants.nz,
                nx: constants.nx,
                ny: constants.ny,
                defocus,
            };
            let raw = layout.img().join(image.raw_file_name());
            let wavimg = WavimgPrm {
                output_files: raw.display().to_string(),
                ..self.bundles.wavimg.with_wave_files(&wave)
            };
            let wavimg_path = layout.wavimg_prm_path();
            wavimg.save(&wavimg_path)?;

            log::debug!("Forming image of {name} at {defocus} nm defocus");
            self.backend
                .form_image(&wavimg_path, &raw, defocus)
                .map_err(|source| stage_error(&name, "image formation", source))?;

            self.post_process(&image, &raw, &mut report)?;
        }

        // Cleanup
        report.cleanup_warning = cleanup_slices(&layout.slc()).err();
        log::info!(
            "{name}: {} clean, {} noisy images",
            report.clean_images.len(),
            report.noisy_images.len()
        );
        Ok(report)
    }

    fn post_process(
        &mut self,
        image: &ImageName,
        raw: &Path,
        report: &mut StructureReport,
    ) -> Result<(), PipelineError> {
        let constants = self.constants;
        let raster = read_raw(raw, constants.nx as usize, constants.ny as usize)?;
        let clean = flip_vertical(&raster);

        let clean_path = self.dirs.clean_images.join(image.clean_file_name());
        write_clean_tiff(&clean_path, &clean)?;
        report.clean_images.push(clean_path);

        for &level in &constants.vacuum_levels {
            let counts = self.noise.poisson_realization(&clean, level as f64);
            let noisy_path = self
                .dirs
                .noisy_images
                .join(vacuum_dir_name(level))
                .join(image.noisy_file_name(level));
            write_counts_tiff(&noisy_path, &counts)?;
            report.noisy_images.push(noisy_path);
        }
        Ok(())
    }
}

fn stage_error(structure: &str, stage: &'static str, source: BackendError) -> PipelineError {
    PipelineError::Stage {
        structure: structure.to_string(),
        stage,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StructureLayout::new(Path::new("out"), "foo");
        assert_eq!(layout.slice_prefix(), PathBuf::from("out/foo/slc/foo_slc"));
        assert_eq!(layout.msa_prm_path(), PathBuf::from("out/foo/prm/MsaPrm_foo.prm"));
        assert_eq!(layout.wavimg_prm_path(), PathBuf::from("out/foo/prm/WavPrm_foo.prm"));
        assert_eq!(layout.wave_prefix(), PathBuf::from("out/foo/wav/foo"));
    }

    #[test]
    fn test_create_claims_root_once() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StructureLayout::new(&dir.path().join("output"), "foo");

        layout.create().unwrap();
        for sub in StructureLayout::SUBDIRS {
            assert!(layout.root.join(sub).is_dir(), "missing {sub}");
        }
        assert!(matches!(layout.create(), Err(PipelineError::OutputExists(_))));
    }

    #[test]
    fn test_cleanup_removes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let slc = dir.path().join("slc");
        std::fs::create_dir(&slc).unwrap();
        std::fs::write(slc.join("foo_slc_001.sli"), b"x").unwrap();

        assert!(cleanup_slices(&slc).is_ok());
        assert!(!slc.exists());
    }

    #[test]
    fn test_cleanup_of_missing_dir_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let warning = cleanup_slices(&dir.path().join("gone")).unwrap_err();
        assert!(warning.path.ends_with("gone"));
        assert!(warning.to_string().contains("Could not remove"));
    }
}
