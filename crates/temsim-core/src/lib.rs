//! # temsim Core
//!
//! Batch CTEM image simulation on top of an external multislice backend.
//!
//! ## Architecture
//!
//! A batch is described by an immutable [`types::SimulationConstants`] and
//! [`types::SimulationDirs`] pair, built once and passed by reference. The
//! [`pipeline::Pipeline`] drives a [`temsim_drprobe::SimulationBackend`]
//! through slicing, propagation and image formation for every structure
//! file, then writes clean and shot-noise TIFF renderings.
//!
//! ## Modules
//!
//! - [`types`]: simulation constants, directories, cell dimensions.
//! - [`bundles`]: build, save and load the `msa`/`wavimg` parameter bundles.
//! - [`naming`]: image and directory naming conventions.
//! - [`raster`]: headerless raw `f32` raster I/O.
//! - [`noise`]: Poisson shot-noise realisations.
//! - [`image_io`]: TIFF renderings and PNG previews.
//! - [`pipeline`]: the per-structure orchestrator.

pub mod bundles;
pub mod image_io;
pub mod naming;
pub mod noise;
pub mod pipeline;
pub mod raster;
pub mod types;

pub use bundles::ParameterBundles;
pub use pipeline::{BatchReport, CleanupWarning, Pipeline, PipelineError, StructureReport};
pub use types::{CellDimensions, SimulationConstants, SimulationDirs};
