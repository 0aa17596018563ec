//! Image file output: lossless TIFF renderings and PNG previews.
//!
//! Clean renderings are 32-bit float grayscale, noisy renderings 32-bit
//! unsigned grayscale. Row 0 of an array is the top row of the image.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

/// Errors writing or reading image files.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("Failed to access image '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unexpected pixel format in '{}': {message}", path.display())]
    UnexpectedFormat { path: PathBuf, message: String },
}

/// Write a clean rendering as a 32-bit float grayscale TIFF.
pub fn write_clean_tiff(path: &Path, raster: &Array2<f32>) -> Result<(), ImageIoError> {
    let (height, width) = raster.dim();
    let data: Vec<f32> = raster.iter().copied().collect();
    let mut encoder = TiffEncoder::new(create(path)?)?;
    encoder.write_image::<colortype::Gray32Float>(width as u32, height as u32, &data)?;
    Ok(())
}

/// Write a noisy rendering as a 32-bit unsigned grayscale TIFF.
pub fn write_counts_tiff(path: &Path, counts: &Array2<u32>) -> Result<(), ImageIoError> {
    let (height, width) = counts.dim();
    let data: Vec<u32> = counts.iter().copied().collect();
    let mut encoder = TiffEncoder::new(create(path)?)?;
    encoder.write_image::<colortype::Gray32>(width as u32, height as u32, &data)?;
    Ok(())
}

/// Read a 32-bit float grayscale TIFF.
pub fn read_tiff_f32(path: &Path) -> Result<Array2<f32>, ImageIoError> {
    let (width, height, image) = decode(path)?;
    match image {
        DecodingResult::F32(data) => to_array(path, width, height, data),
        _ => Err(ImageIoError::UnexpectedFormat {
            path: path.to_path_buf(),
            message: "expected 32-bit float samples".into(),
        }),
    }
}

/// Read a 32-bit unsigned grayscale TIFF.
pub fn read_tiff_u32(path: &Path) -> Result<Array2<u32>, ImageIoError> {
    let (width, height, image) = decode(path)?;
    match image {
        DecodingResult::U32(data) => to_array(path, width, height, data),
        _ => Err(ImageIoError::UnexpectedFormat {
            path: path.to_path_buf(),
            message: "expected 32-bit unsigned samples".into(),
        }),
    }
}

/// Map a raster onto 8-bit gray with a linear window.
///
/// Values at or below `vmin` are black, at or above `vmax` white.
pub fn render_preview(raster: &Array2<f32>, vmin: f32, vmax: f32) -> GrayImage {
    let (height, width) = raster.dim();
    let span = vmax - vmin;
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = raster[[y as usize, x as usize]];
        let t = if span > 0.0 && value.is_finite() {
            ((value - vmin) / span).clamp(0.0, 1.0)
        } else if value >= vmax {
            1.0
        } else {
            0.0
        };
        Luma([(t * 255.0).round() as u8])
    })
}

/// Render a windowed preview and save it as PNG.
pub fn save_preview(
    path: &Path,
    raster: &Array2<f32>,
    vmin: f32,
    vmax: f32,
) -> Result<(), ImageIoError> {
    render_preview(raster, vmin, vmax).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, ImageIoError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ImageIoError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn decode(path: &Path) -> Result<(usize, usize, DecodingResult), ImageIoError> {
    let file = File::open(path).map_err(|source| ImageIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let image = decoder.read_image()?;
    Ok((width as usize, height as usize, image))
}

fn to_array<T>(
    path: &Path,
    width: usize,
    height: usize,
    data: Vec<T>,
) -> Result<Array2<T>, ImageIoError> {
    Array2::from_shape_vec((height, width), data).map_err(|e| ImageIoError::UnexpectedFormat {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_clean_tiff_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.tif");
        let raster = array![[0.25f32, 1.0, 1.125], [0.9, 1.01, -0.5]];

        write_clean_tiff(&path, &raster).unwrap();
        assert_eq!(read_tiff_f32(&path).unwrap(), raster);
    }

    #[test]
    fn test_counts_tiff_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noisy.tif");
        let counts = array![[0u32, 4, 17], [70000, 2, 1]];

        write_counts_tiff(&path, &counts).unwrap();
        assert_eq!(read_tiff_u32(&path).unwrap(), counts);
    }

    #[test]
    fn test_wrong_sample_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noisy.tif");
        write_counts_tiff(&path, &array![[1u32, 2]]).unwrap();
        assert!(matches!(
            read_tiff_f32(&path),
            Err(ImageIoError::UnexpectedFormat { .. })
        ));
    }

    #[test]
    fn test_preview_window() {
        let raster = array![[-1.0f32, 0.0, 1.0, 2.0, 3.0]];
        let img = render_preview(&raster, 0.0, 2.0);
        assert_eq!(img.dimensions(), (5, 1));
        let pixels: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(pixels, vec![0, 0, 128, 255, 255]);
    }

    #[test]
    fn test_save_preview_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        save_preview(&path, &Array2::<f32>::ones((8, 4)), 0.8, 1.2).unwrap();

        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (4, 8));
    }
}
