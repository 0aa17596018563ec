//! Supercell expansion.
//!
//! Pads a model with vacuum before it is rotated so that rotated atoms do
//! not wrap across the periodic boundary during a multislice simulation.

use crate::structure::{Cell, Site, Structure, StructureError};
use crate::transform::Transform;

/// Expanded lattice lengths are rounded to this many decimals (nm).
const LENGTH_DECIMALS: i32 = 4;

/// Expand the cell of `structure` by `factor` about its centre.
///
/// Each new lattice length is `factor * L` rounded to 1e-4 nm; if that is
/// not larger than `min_dimension` (nm), `min_dimension` is used instead.
/// The new cell is rectangular. Sites keep their Cartesian arrangement and
/// are shifted by half the growth along each axis, so the model stays
/// centred.
pub fn expand_supercell(
    structure: &Structure,
    factor: f64,
    min_dimension: f64,
) -> Result<Structure, StructureError> {
    let old_cell = structure.cell;
    old_cell.require_orthogonal()?;

    let old = old_cell.lengths();
    let new = old.map(|length| {
        let expanded = round_to(factor * length, LENGTH_DECIMALS);
        if expanded > min_dimension {
            expanded
        } else {
            min_dimension
        }
    });
    let new_cell = Cell::orthogonal(new[0], new[1], new[2]);

    let shift = Transform::translation(
        0.5 * (new[0] - old[0]),
        0.5 * (new[1] - old[1]),
        0.5 * (new[2] - old[2]),
    );

    let sites = structure
        .sites
        .iter()
        .map(|site| {
            let moved = shift.apply(&old_cell.to_cartesian(site.frac));
            Site {
                frac: new_cell.to_fractional(moved),
                ..site.clone()
            }
        })
        .collect();

    log::debug!(
        "Expanded cell ({:.4}, {:.4}, {:.4}) -> ({:.4}, {:.4}, {:.4}) nm",
        old[0], old[1], old[2], new[0], new[1], new[2]
    );

    Ok(Structure {
        comment: structure.comment.clone(),
        cell: new_cell,
        sites,
    })
}

/// File stem of an expanded model.
pub fn expanded_name(structure_name: &str) -> String {
    format!("{}_expanded", structure_name)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle() -> Structure {
        Structure {
            comment: "Pt on CeO2".into(),
            cell: Cell::orthogonal(2.0, 1.0, 3.0),
            sites: vec![Site::new("Pt", [0.5, 0.5, 0.5]), Site::new("Ce", [0.0, 0.0, 0.0])],
        }
    }

    #[test]
    fn test_expand_keeps_model_centred() {
        let expanded = expand_supercell(&particle(), 1.2, 0.5).unwrap();
        let lengths = expanded.cell.lengths();
        assert!((lengths[0] - 2.4).abs() < 1e-12);
        assert!((lengths[1] - 1.2).abs() < 1e-12);
        assert!((lengths[2] - 3.6).abs() < 1e-12);

        // Centre atom stays at the centre
        let centre = expanded.sites[0].frac;
        for x in centre {
            assert!((x - 0.5).abs() < 1e-12);
        }
        // Corner atom moves in by half the growth: 0.2 nm of 2.4 nm along a
        let corner = expanded.cartesian(1).unwrap();
        assert!((corner[0] - 0.2).abs() < 1e-12);
        assert!((corner[1] - 0.1).abs() < 1e-12);
        assert!((corner[2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_dimension_applies_per_axis() {
        let expanded = expand_supercell(&particle(), 1.2, 1.5).unwrap();
        let lengths = expanded.cell.lengths();
        assert!((lengths[0] - 2.4).abs() < 1e-12);
        assert!((lengths[1] - 1.5).abs() < 1e-12);
        assert!((lengths[2] - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_unit_factor_is_identity() {
        let base = particle();
        let expanded = expand_supercell(&base, 1.0, 0.0).unwrap();
        assert_eq!(expanded.cell, base.cell);
        for (a, b) in base.sites.iter().zip(&expanded.sites) {
            for k in 0..3 {
                assert!((a.frac[k] - b.frac[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_oblique_cell_rejected() {
        let mut s = particle();
        s.cell.beta = 100.0;
        assert!(expand_supercell(&s, 1.2, 1.5).is_err());
    }

    #[test]
    fn test_expanded_name() {
        assert_eq!(expanded_name("PtNP"), "PtNP_expanded");
    }
}
