//! Parser for `.xyz` coordinate files.
//!
//! ```text
//! <num_atoms>
//! <comment line>
//! <element> <x> <y> <z>
//! ...
//! ```
//!
//! Coordinates are in angstroms and are converted to nanometres, the
//! length unit of `.cel` files. Extra columns after `z` (as written by ASE
//! for extended XYZ) are ignored.

use super::{parse_f64, ParseError, ParsedPoint};

const ANGSTROM_TO_NM: f64 = 0.1;

/// Parse an XYZ file from a string.
pub fn parse_xyz(content: &str) -> Result<Vec<ParsedPoint>, ParseError> {
    let mut lines = content.lines();

    let header = lines.next().unwrap_or("").trim();
    let num_atoms: usize = header.parse().map_err(|_| ParseError::FormatError {
        line: 1,
        message: format!("First line must be the number of atoms, got '{}'", header),
    })?;

    if lines.next().is_none() {
        return Err(ParseError::FormatError {
            line: 2,
            message: "Missing comment line".into(),
        });
    }

    let mut points = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 3;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < 4 {
            return Err(ParseError::FormatError {
                line: line_no,
                message: format!("Expected 'element x y z', got '{}'", line.trim()),
            });
        }

        let mut position = [0.0; 3];
        for (axis, (slot, token)) in position.iter_mut().zip(&parts[1..4]).enumerate() {
            let what = ["x coordinate", "y coordinate", "z coordinate"][axis];
            *slot = parse_f64(token, line_no, what)? * ANGSTROM_TO_NM;
        }

        points.push(ParsedPoint {
            position,
            label: Some(parts[0].to_string()),
        });
    }

    if points.len() != num_atoms {
        return Err(ParseError::FormatError {
            line: 1,
            message: format!("Header says {} atoms but found {}", num_atoms, points.len()),
        });
    }

    Ok(points)
}
