//! # temsim Structure
//!
//! Structure model preparation ahead of a multislice simulation. This
//! crate provides:
//!
//! - **Structure model** ([`structure`]): cell, sites and site edits.
//! - **File parsers** ([`parsers`]): Dr. Probe `.cel` (read/write) and
//!   `.xyz` import.
//! - **Transformations** ([`transform`]): translations and rotations about
//!   an anchor point.
//! - **Supercell expansion** ([`expand`]): vacuum padding around a model.
//! - **Tilt series** ([`tilt`]): rotate a supported particle and drop
//!   atoms buried in the support.

pub mod expand;
pub mod parsers;
pub mod structure;
pub mod tilt;
pub mod transform;

pub use structure::{Cell, Site, Structure, StructureError};
