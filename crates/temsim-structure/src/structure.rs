//! Atomistic structure model: a cell and its fractional sites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parsers::ParsedPoint;

const ANGLE_TOLERANCE_DEG: f64 = 1e-6;

/// Errors from structure operations.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("Operation requires an orthogonal cell, got angles ({alpha}, {beta}, {gamma})")]
    NonOrthogonalCell { alpha: f64, beta: f64, gamma: f64 },

    #[error("Site index {index} out of range ({count} sites)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Cannot build a structure from zero atoms")]
    Empty,

    #[error("Atom {0} has no element label")]
    MissingElement(usize),

    #[error("Rotation axis must be non-zero")]
    ZeroAxis,

    #[error("Cell lengths must be positive, got ({}, {}, {})", .0[0], .0[1], .0[2])]
    DegenerateCell([f64; 3]),
}

/// Simulation cell: lattice lengths (nm) and angles (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Cell {
    /// Rectangular cell with the given lengths.
    pub fn orthogonal(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c, alpha: 90.0, beta: 90.0, gamma: 90.0 }
    }

    pub fn lengths(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Centre of the cell in Cartesian coordinates (nm).
    pub fn centre(&self) -> [f64; 3] {
        [0.5 * self.a, 0.5 * self.b, 0.5 * self.c]
    }

    pub fn is_orthogonal(&self) -> bool {
        [self.alpha, self.beta, self.gamma]
            .iter()
            .all(|angle| (angle - 90.0).abs() < ANGLE_TOLERANCE_DEG)
    }

    pub fn require_orthogonal(&self) -> Result<(), StructureError> {
        if self.is_orthogonal() {
            Ok(())
        } else {
            Err(StructureError::NonOrthogonalCell {
                alpha: self.alpha,
                beta: self.beta,
                gamma: self.gamma,
            })
        }
    }

    /// Fractional to Cartesian, orthogonal cells only.
    pub(crate) fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        [frac[0] * self.a, frac[1] * self.b, frac[2] * self.c]
    }

    /// Cartesian to fractional, orthogonal cells only.
    pub(crate) fn to_fractional(&self, cart: [f64; 3]) -> [f64; 3] {
        [cart[0] / self.a, cart[1] / self.b, cart[2] / self.c]
    }
}

/// One atomic site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub element: String,
    /// Fractional coordinates.
    pub frac: [f64; 3],
    pub occupancy: f64,
    /// Isotropic Debye-Waller B parameter (nm²).
    pub biso: f64,
    /// Trailing `.cel` columns, carried through unchanged.
    pub extra: [f64; 3],
}

impl Site {
    pub fn new(element: impl Into<String>, frac: [f64; 3]) -> Self {
        Self {
            element: element.into(),
            frac,
            occupancy: 1.0,
            biso: 0.0,
            extra: [0.0; 3],
        }
    }
}

/// A periodic structure model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub comment: String,
    pub cell: Cell,
    pub sites: Vec<Site>,
}

impl Structure {
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Indices of all sites of one element.
    pub fn indices_of(&self, element: &str) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, site)| site.element == element)
            .map(|(i, _)| i)
            .collect()
    }

    /// Cartesian position of a site (nm). Requires an orthogonal cell.
    pub fn cartesian(&self, index: usize) -> Result<[f64; 3], StructureError> {
        self.cell.require_orthogonal()?;
        let site = self.sites.get(index).ok_or(StructureError::IndexOutOfRange {
            index,
            count: self.sites.len(),
        })?;
        Ok(self.cell.to_cartesian(site.frac))
    }

    /// Remove the sites at the given indices; order of the rest is kept.
    pub fn remove_sites(&mut self, indices: &[usize]) -> Result<(), StructureError> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.sites.len()) {
            return Err(StructureError::IndexOutOfRange { index, count: self.sites.len() });
        }
        let mut keep = vec![true; self.sites.len()];
        for &i in indices {
            keep[i] = false;
        }
        let mut flags = keep.into_iter();
        self.sites.retain(|_| flags.next().unwrap_or(true));
        Ok(())
    }

    /// Map fractional coordinates of the given sites into `[0, 1)`.
    pub fn wrap_to_unit_cell(&mut self, indices: &[usize]) {
        for &i in indices {
            if let Some(site) = self.sites.get_mut(i) {
                for x in site.frac.iter_mut() {
                    *x = x.rem_euclid(1.0);
                    // rem_euclid can round up to exactly 1.0 for tiny negatives
                    if *x >= 1.0 {
                        *x = 0.0;
                    }
                }
            }
        }
    }

    /// Place an isolated particle in an orthogonal box with `padding` nm of
    /// vacuum on every side.
    pub fn boxed(points: &[ParsedPoint], padding: f64, comment: &str) -> Result<Self, StructureError> {
        if points.is_empty() {
            return Err(StructureError::Empty);
        }

        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in points {
            for k in 0..3 {
                lo[k] = lo[k].min(p.position[k]);
                hi[k] = hi[k].max(p.position[k]);
            }
        }

        let lengths: [f64; 3] = std::array::from_fn(|k| hi[k] - lo[k] + 2.0 * padding);
        if !lengths.iter().all(|l| l.is_finite() && *l > 0.0) {
            return Err(StructureError::DegenerateCell(lengths));
        }
        let cell = Cell::orthogonal(lengths[0], lengths[1], lengths[2]);

        let sites = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let element = p.label.clone().ok_or(StructureError::MissingElement(i))?;
                let shifted: [f64; 3] = std::array::from_fn(|k| p.position[k] - lo[k] + padding);
                Ok(Site::new(element, cell.to_fractional(shifted)))
            })
            .collect::<Result<Vec<_>, StructureError>>()?;

        Ok(Self {
            comment: comment.to_string(),
            cell,
            sites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Structure {
        Structure {
            comment: "sample".into(),
            cell: Cell::orthogonal(2.0, 4.0, 1.0),
            sites: vec![
                Site::new("Ce", [0.1, 0.2, 0.3]),
                Site::new("Pt", [0.5, 0.5, 0.5]),
                Site::new("O", [0.2, 0.2, 0.2]),
                Site::new("Pt", [0.6, 0.7, 0.5]),
            ],
        }
    }

    #[test]
    fn test_indices_of() {
        assert_eq!(sample().indices_of("Pt"), vec![1, 3]);
        assert!(sample().indices_of("Rh").is_empty());
    }

    #[test]
    fn test_cartesian() {
        let p = sample().cartesian(1).unwrap();
        assert_eq!(p, [1.0, 2.0, 0.5]);
        assert!(matches!(
            sample().cartesian(9),
            Err(StructureError::IndexOutOfRange { index: 9, count: 4 })
        ));
    }

    #[test]
    fn test_cartesian_rejects_oblique_cell() {
        let mut s = sample();
        s.cell.gamma = 120.0;
        assert!(matches!(s.cartesian(0), Err(StructureError::NonOrthogonalCell { .. })));
    }

    #[test]
    fn test_remove_sites_keeps_order() {
        let mut s = sample();
        s.remove_sites(&[3, 0]).unwrap();
        let elements: Vec<&str> = s.sites.iter().map(|x| x.element.as_str()).collect();
        assert_eq!(elements, vec!["Pt", "O"]);
        assert!(s.remove_sites(&[5]).is_err());
    }

    #[test]
    fn test_wrap_to_unit_cell() {
        let mut s = sample();
        s.sites[0].frac = [-0.25, 1.5, 1.0];
        s.wrap_to_unit_cell(&[0]);
        let f = s.sites[0].frac;
        assert!((f[0] - 0.75).abs() < 1e-12);
        assert!((f[1] - 0.5).abs() < 1e-12);
        assert!(f[2].abs() < 1e-12);
    }

    #[test]
    fn test_boxed_particle() {
        let points = vec![
            ParsedPoint { position: [-0.1, 0.0, 0.0], label: Some("Pt".into()) },
            ParsedPoint { position: [0.1, 0.2, 0.3], label: Some("Pt".into()) },
        ];
        let s = Structure::boxed(&points, 1.0, "particle").unwrap();
        assert!((s.cell.a - 2.2).abs() < 1e-12);
        assert!((s.cell.b - 2.2).abs() < 1e-12);
        assert!((s.cell.c - 2.3).abs() < 1e-12);
        // First atom sits exactly `padding` from the low faces
        let p = s.cartesian(0).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!((p[1] - 1.0).abs() < 1e-12);
        assert!((p[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_boxed_requires_labels() {
        let points = vec![ParsedPoint { position: [0.0; 3], label: None }];
        assert!(matches!(
            Structure::boxed(&points, 1.0, ""),
            Err(StructureError::MissingElement(0))
        ));
        assert!(matches!(Structure::boxed(&[], 1.0, ""), Err(StructureError::Empty)));
    }

    #[test]
    fn test_boxed_single_atom_needs_padding() {
        let points = vec![ParsedPoint { position: [0.0; 3], label: Some("Pt".into()) }];
        assert!(matches!(
            Structure::boxed(&points, 0.0, ""),
            Err(StructureError::DegenerateCell(_))
        ));
        let s = Structure::boxed(&points, 0.5, "").unwrap();
        assert_eq!(s.sites[0].frac, [0.5, 0.5, 0.5]);
    }
}
