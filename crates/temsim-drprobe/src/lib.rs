//! # temsim Dr. Probe
//!
//! Boundary to the Dr. Probe multislice programs. This crate provides:
//!
//! - **Backend abstraction** ([`backend`]): the [`SimulationBackend`] trait
//!   covering slicing, propagation and image formation.
//! - **Process backend** ([`commands`]): runs `celslc`, `msa` and `wavimg`.
//! - **Parameter files** ([`prm`]): load and save `msa` and `wavimg`
//!   parameter bundles.

pub mod backend;
pub mod commands;
pub mod prm;

pub use backend::{wave_file_path, BackendError, BackendInfo, SimulationBackend, SliceRequest};
pub use commands::DrProbeBackend;
pub use prm::msa::MsaPrm;
pub use prm::wavimg::WavimgPrm;
pub use prm::{Aberrations, PrmError};
