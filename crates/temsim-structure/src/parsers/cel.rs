//! Parser and writer for Dr. Probe `.cel` super-cell files.
//!
//! ```text
//! <comment line>
//! 0  <a> <b> <c> <alpha> <beta> <gamma>
//! <element> <x> <y> <z> <occupancy> <B_iso> <u> <v> <w>
//! ...
//! *
//! ```
//!
//! Lattice lengths are in nm, angles in degrees, positions are fractional
//! and B_iso is in nm². Occupancy, B_iso and the trailing columns are
//! optional on input.

use super::{parse_f64, ParseError};
use crate::structure::{Cell, Site, Structure};

/// Parse a `.cel` file from a string.
pub fn parse_cel(content: &str) -> Result<Structure, ParseError> {
    let mut lines = content.lines().enumerate();

    let comment = match lines.next() {
        Some((_, line)) => line.trim_end().to_string(),
        None => {
            return Err(ParseError::FormatError {
                line: 1,
                message: "Empty .cel file".into(),
            })
        }
    };

    let (idx, cell_line) = lines.next().ok_or_else(|| ParseError::FormatError {
        line: 2,
        message: "Missing cell parameter line".into(),
    })?;
    let cell = parse_cell(cell_line, idx + 1)?;

    let mut sites = Vec::new();
    for (idx, line) in lines {
        let line = line.trim();
        if line.starts_with('*') {
            break;
        }
        if line.is_empty() {
            continue;
        }
        sites.push(parse_site(line, idx + 1)?);
    }

    Ok(Structure { comment, cell, sites })
}

fn parse_cell(line: &str, line_no: usize) -> Result<Cell, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 7 {
        return Err(ParseError::FormatError {
            line: line_no,
            message: format!("Expected '0 a b c alpha beta gamma', got '{}'", line.trim()),
        });
    }
    Ok(Cell {
        a: parse_f64(parts[1], line_no, "lattice length a")?,
        b: parse_f64(parts[2], line_no, "lattice length b")?,
        c: parse_f64(parts[3], line_no, "lattice length c")?,
        alpha: parse_f64(parts[4], line_no, "angle alpha")?,
        beta: parse_f64(parts[5], line_no, "angle beta")?,
        gamma: parse_f64(parts[6], line_no, "angle gamma")?,
    })
}

fn parse_site(line: &str, line_no: usize) -> Result<Site, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(ParseError::FormatError {
            line: line_no,
            message: format!("Expected 'element x y z [occ B_iso]', got '{}'", line),
        });
    }

    let optional = |i: usize, default: f64, what: &str| -> Result<f64, ParseError> {
        parts.get(i).map_or(Ok(default), |t| parse_f64(t, line_no, what))
    };

    Ok(Site {
        element: parts[0].to_string(),
        frac: [
            parse_f64(parts[1], line_no, "x coordinate")?,
            parse_f64(parts[2], line_no, "y coordinate")?,
            parse_f64(parts[3], line_no, "z coordinate")?,
        ],
        occupancy: optional(4, 1.0, "occupancy")?,
        biso: optional(5, 0.0, "B_iso")?,
        extra: [
            optional(6, 0.0, "column 7")?,
            optional(7, 0.0, "column 8")?,
            optional(8, 0.0, "column 9")?,
        ],
    })
}

/// Render a structure in `.cel` syntax.
pub fn to_cel_string(structure: &Structure) -> String {
    let cell = &structure.cell;
    let mut out = String::new();
    out.push_str(structure.comment.lines().next().unwrap_or(""));
    out.push('\n');
    out.push_str(&format!(
        "0 {:10.6} {:10.6} {:10.6} {:8.4} {:8.4} {:8.4}\n",
        cell.a, cell.b, cell.c, cell.alpha, cell.beta, cell.gamma
    ));
    for site in &structure.sites {
        out.push_str(&format!(
            "{:<4} {:10.6} {:10.6} {:10.6} {:8.6} {:8.6} {} {} {}\n",
            site.element,
            site.frac[0],
            site.frac[1],
            site.frac[2],
            site.occupancy,
            site.biso,
            site.extra[0],
            site.extra[1],
            site.extra[2],
        ));
    }
    out.push_str("*\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEO2_WITH_RH: &str = "\
RhCeO2 adatom model
0  2.164800  2.700000  2.000000  90.0  90.0  90.0
Ce  0.125000  0.250000  0.500000  1.0  0.0050  0.0  0.0  0.0
O   0.250000  0.375000  0.500000  1.0  0.0050  0.0  0.0  0.0
Rh  0.500000  0.750000  0.600000
*
";

    #[test]
    fn test_parse_cel() {
        let s = parse_cel(CEO2_WITH_RH).unwrap();
        assert_eq!(s.comment, "RhCeO2 adatom model");
        assert!((s.cell.a - 2.1648).abs() < 1e-12);
        assert!((s.cell.b - 2.7).abs() < 1e-12);
        assert!((s.cell.c - 2.0).abs() < 1e-12);
        assert_eq!(s.sites.len(), 3);
        assert_eq!(s.sites[0].element, "Ce");
        assert!((s.sites[1].biso - 0.005).abs() < 1e-12);
        // Missing optional columns fall back to defaults
        assert_eq!(s.sites[2].occupancy, 1.0);
        assert_eq!(s.sites[2].biso, 0.0);
    }

    #[test]
    fn test_lines_after_terminator_ignored() {
        let content = format!("{}trailing notes\n", CEO2_WITH_RH);
        let s = parse_cel(&content).unwrap();
        assert_eq!(s.sites.len(), 3);
    }

    #[test]
    fn test_write_then_parse() {
        let original = parse_cel(CEO2_WITH_RH).unwrap();
        let text = to_cel_string(&original);
        assert!(text.ends_with("*\n"));

        let reparsed = parse_cel(&text).unwrap();
        assert_eq!(reparsed.sites.len(), original.sites.len());
        for (a, b) in original.sites.iter().zip(&reparsed.sites) {
            assert_eq!(a.element, b.element);
            for k in 0..3 {
                assert!((a.frac[k] - b.frac[k]).abs() < 1e-6);
            }
        }
        assert!((reparsed.cell.a - original.cell.a).abs() < 1e-6);
    }

    #[test]
    fn test_short_cell_line() {
        let err = parse_cel("comment\n0 1.0 1.0\n*\n").unwrap_err();
        assert!(matches!(err, ParseError::FormatError { line: 2, .. }));
    }

    #[test]
    fn test_bad_site_coordinate() {
        let err = parse_cel("c\n0 1 1 1 90 90 90\nPt 0.1 abc 0.3\n*\n").unwrap_err();
        match err {
            ParseError::FormatError { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("y coordinate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
