//! Structure file parsers.
//!
//! Supported formats:
//! - [`.cel`](cel): Dr. Probe super-cell files (read and write)
//! - [`.xyz`](xyz): XYZ coordinate files, e.g. Wulff-constructed particles

pub mod cel;
pub mod xyz;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::structure::Structure;

/// Errors during structure file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to access '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// A parsed atomic position with optional element label.
#[derive(Debug, Clone)]
pub struct ParsedPoint {
    /// Cartesian position (nm).
    pub position: [f64; 3],
    /// Element symbol, if available.
    pub label: Option<String>,
}

/// Read a `.cel` structure file.
pub fn read_structure(path: &Path) -> Result<Structure, ParseError> {
    match extension(path).as_deref() {
        Some("cel") => cel::parse_cel(&read_to_string(path)?),
        other => Err(ParseError::UnsupportedFormat(format!(
            "'{}' (expected .cel, got {})",
            path.display(),
            other.unwrap_or("no extension")
        ))),
    }
}

/// Read the atoms of an `.xyz` file (positions converted to nm).
pub fn read_points(path: &Path) -> Result<Vec<ParsedPoint>, ParseError> {
    match extension(path).as_deref() {
        Some("xyz") => xyz::parse_xyz(&read_to_string(path)?),
        other => Err(ParseError::UnsupportedFormat(format!(
            "'{}' (expected .xyz, got {})",
            path.display(),
            other.unwrap_or("no extension")
        ))),
    }
}

/// Write a structure as a `.cel` file, replacing any existing file.
pub fn write_structure(path: &Path, structure: &Structure) -> Result<(), ParseError> {
    std::fs::write(path, cel::to_cel_string(structure)).map_err(|source| ParseError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

pub(crate) fn parse_f64(token: &str, line: usize, what: &str) -> Result<f64, ParseError> {
    token.parse().map_err(|_| ParseError::FormatError {
        line,
        message: format!("Invalid {}: {}", what, token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_structure_rejects_other_extensions() {
        let err = read_structure(Path::new("particle.xyz")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_cel_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.CEL");
        std::fs::write(&path, "model\n0 1.0 2.0 3.0 90 90 90\nPt 0.5 0.5 0.5\n*\n").unwrap();

        let structure = read_structure(&path).unwrap();
        let out = dir.path().join("copy.cel");
        write_structure(&out, &structure).unwrap();
        let back = read_structure(&out).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.cell.lengths(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_read_points_from_xyz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.xyz");
        std::fs::write(&path, "2\npair\nPt 0 0 0\nPt 10 0 0\n").unwrap();

        let points = read_points(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].position, [1.0, 0.0, 0.0]);
        assert!(matches!(read_points(&dir.path().join("pair.cel")), Err(ParseError::UnsupportedFormat(_))));
    }
}
