//! Raw single-precision rasters written by the image-formation stage.
//!
//! The layout is headerless: `nx * ny` little-endian `f32` values in
//! row-major order (x fastest). Dimensions are not stored in the file and
//! must be supplied by the caller.

use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use thiserror::Error;

/// Errors reading or writing raw rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Failed to access raster '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Raster '{}' has {actual} bytes, expected {expected} for {nx}x{ny} f32 pixels", path.display())]
    SizeMismatch {
        path: PathBuf,
        nx: usize,
        ny: usize,
        expected: usize,
        actual: usize,
    },
}

/// Read an `nx` x `ny` raster into an array of shape `(ny, nx)`.
pub fn read_raw(path: &Path, nx: usize, ny: usize) -> Result<Array2<f32>, RasterError> {
    let bytes = std::fs::read(path).map_err(|source| RasterError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let expected = nx * ny * std::mem::size_of::<f32>();
    if bytes.len() != expected {
        return Err(RasterError::SizeMismatch {
            path: path.to_path_buf(),
            nx,
            ny,
            expected,
            actual: bytes.len(),
        });
    }

    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    // Length was checked above, so the shape always matches.
    Ok(Array2::from_shape_fn((ny, nx), |(row, col)| data[row * nx + col]))
}

/// Write a raster in the raw layout, replacing any existing file.
pub fn write_raw(path: &Path, raster: &Array2<f32>) -> Result<(), RasterError> {
    let mut bytes = Vec::with_capacity(raster.len() * std::mem::size_of::<f32>());
    for value in raster.iter() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes).map_err(|source| RasterError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reverse the row order (first row becomes last).
///
/// Converts between the simulation's and the image file's y convention.
pub fn flip_vertical<T: Clone>(raster: &Array2<T>) -> Array2<T> {
    raster.slice(s![..;-1, ..]).to_owned()
}
