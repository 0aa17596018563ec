//! Tilt series of a supported particle.
//!
//! Sites of one element (the particle) are rotated about the principal
//! axes of the cell through its centre, leaving the support in place.
//! After rotation, particle atoms that ended up inside the support can
//! optionally be removed.

use crate::structure::{Structure, StructureError};
use crate::transform::Transform;

/// Fractional b coordinate below which particle atoms count as buried.
///
/// Matches one CeO2 support slab whose surface sits just below b = 0.5;
/// other support geometries need their own value.
pub const BURIED_THRESHOLD_B: f64 = 0.49;

const A_AXIS: [f64; 3] = [1.0, 0.0, 0.0];
const B_AXIS: [f64; 3] = [0.0, 1.0, 0.0];
const C_AXIS: [f64; 3] = [0.0, 0.0, 1.0];

/// Every combination of tilts about the a, b and c axes.
#[derive(Debug, Clone)]
pub struct TiltSeries {
    /// Element of the particle to rotate.
    pub element: String,
    /// Tilts about a (degrees).
    pub a_tilts: Vec<i32>,
    /// Tilts about b (degrees).
    pub b_tilts: Vec<i32>,
    /// Tilts about c (degrees).
    pub c_tilts: Vec<i32>,
    /// Drop particle atoms below [`TiltSeries::buried_threshold`] after rotating.
    pub remove_buried: bool,
    pub buried_threshold: f64,
}

/// One member of a tilt series.
#[derive(Debug, Clone)]
pub struct TiltedStructure {
    /// File stem, e.g. `PtNP_002a000b000c_NoBuriedPt`.
    pub name: String,
    pub structure: Structure,
    /// Number of buried atoms removed.
    pub removed: usize,
}

impl TiltSeries {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            a_tilts: vec![0],
            b_tilts: vec![0],
            c_tilts: vec![0],
            remove_buried: true,
            buried_threshold: BURIED_THRESHOLD_B,
        }
    }

    /// Number of structures [`TiltSeries::generate`] produces.
    pub fn len(&self) -> usize {
        self.a_tilts.len() * self.b_tilts.len() * self.c_tilts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build every tilted copy of `base`.
    ///
    /// Combinations are ordered with c outermost and a innermost. Each copy
    /// starts from the untouched base; rotations are applied about a, then
    /// b, then c.
    pub fn generate(&self, base: &Structure, base_name: &str) -> Result<Vec<TiltedStructure>, StructureError> {
        base.cell.require_orthogonal()?;
        let anchor = base.cell.centre();

        let mut series = Vec::with_capacity(self.len());
        for &c_tilt in &self.c_tilts {
            for &b_tilt in &self.b_tilts {
                for &a_tilt in &self.a_tilts {
                    let mut structure = base.clone();
                    let indices = structure.indices_of(&self.element);
                    for (axis, tilt) in [(A_AXIS, a_tilt), (B_AXIS, b_tilt), (C_AXIS, c_tilt)] {
                        if tilt != 0 {
                            rotate_sites(&mut structure, &indices, axis, anchor, tilt as f64)?;
                        }
                    }

                    let mut name = tilt_name(base_name, a_tilt, b_tilt, c_tilt);
                    let mut removed = 0;
                    if self.remove_buried {
                        removed = remove_buried(&mut structure, &self.element, self.buried_threshold)?;
                        name.push_str(&format!("_NoBuried{}", self.element));
                    }

                    log::debug!("{}: {} sites ({} buried removed)", name, structure.len(), removed);
                    series.push(TiltedStructure { name, structure, removed });
                }
            }
        }
        Ok(series)
    }
}

/// Rotate the given sites by `degrees` about `axis` through `anchor`
/// (Cartesian, nm), then wrap them back into the unit cell.
pub fn rotate_sites(
    structure: &mut Structure,
    indices: &[usize],
    axis: [f64; 3],
    anchor: [f64; 3],
    degrees: f64,
) -> Result<(), StructureError> {
    let rotation = Transform::rotation_about(axis, anchor, degrees).ok_or(StructureError::ZeroAxis)?;
    for &i in indices {
        let cart = structure.cartesian(i)?;
        let rotated = rotation.apply(&cart);
        structure.sites[i].frac = structure.cell.to_fractional(rotated);
    }
    structure.wrap_to_unit_cell(indices);
    Ok(())
}

/// Remove `element` sites whose fractional b coordinate is below `threshold`.
///
/// Returns the number of sites removed.
pub fn remove_buried(structure: &mut Structure, element: &str, threshold: f64) -> Result<usize, StructureError> {
    let buried: Vec<usize> = structure
        .indices_of(element)
        .into_iter()
        .filter(|&i| structure.sites[i].frac[1] < threshold)
        .collect();
    structure.remove_sites(&buried)?;
    Ok(buried.len())
}

/// File stem of a tilted model: `<name>_<aaa>a<bbb>b<ccc>c`.
pub fn tilt_name(base_name: &str, a_tilt: i32, b_tilt: i32, c_tilt: i32) -> String {
    format!("{}_{:03}a{:03}b{:03}c", base_name, a_tilt, b_tilt, c_tilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Cell, Site};

    /// Two-atom Pt "particle" sitting on a Ce support layer at b = 0.25.
    fn supported_particle() -> Structure {
        Structure {
            comment: "Pt/CeO2".into(),
            cell: Cell::orthogonal(2.0, 2.0, 2.0),
            sites: vec![
                Site::new("Ce", [0.5, 0.25, 0.5]),
                Site::new("Pt", [0.5, 0.6, 0.5]),
                Site::new("Pt", [0.5, 0.9, 0.5]),
            ],
        }
    }

    #[test]
    fn test_tilt_name() {
        assert_eq!(tilt_name("PtNP", 2, 0, 0), "PtNP_002a000b000c");
        assert_eq!(tilt_name("PtNP", 4, 2, 10), "PtNP_004a002b010c");
    }

    #[test]
    fn test_series_order_and_count() {
        let mut series = TiltSeries::new("Pt");
        series.a_tilts = vec![0, 2, 4];
        series.b_tilts = vec![0, 2];
        series.remove_buried = false;
        let out = series.generate(&supported_particle(), "PtNP").unwrap();

        assert_eq!(out.len(), 6);
        let names: Vec<&str> = out.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PtNP_000a000b000c",
                "PtNP_002a000b000c",
                "PtNP_004a000b000c",
                "PtNP_000a002b000c",
                "PtNP_002a002b000c",
                "PtNP_004a002b000c",
            ]
        );
    }

    #[test]
    fn test_zero_tilt_leaves_structure_untouched() {
        let mut series = TiltSeries::new("Pt");
        series.remove_buried = false;
        let base = supported_particle();
        let out = series.generate(&base, "PtNP").unwrap();
        assert_eq!(out[0].structure, base);
    }

    #[test]
    fn test_support_is_not_rotated() {
        let mut series = TiltSeries::new("Pt");
        series.c_tilts = vec![90];
        series.remove_buried = false;
        let out = series.generate(&supported_particle(), "PtNP").unwrap();
        let s = &out[0].structure;

        assert_eq!(s.sites[0].frac, [0.5, 0.25, 0.5]);
        // 90 degrees about c through the centre: (1.0, 1.2) -> (0.8, 1.0)
        let pt = s.cartesian(1).unwrap();
        assert!((pt[0] - 0.8).abs() < 1e-9);
        assert!((pt[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_wraps_into_cell() {
        let mut s = supported_particle();
        let centre = s.cell.centre();
        // 180 degrees about a: b = 0.9 -> 0.1, c stays 0.5
        rotate_sites(&mut s, &[2], A_AXIS, centre, 180.0).unwrap();
        let f = s.sites[2].frac;
        assert!((f[1] - 0.1).abs() < 1e-9);
        assert!(f.iter().all(|x| (0.0..1.0).contains(x)));
    }

    #[test]
    fn test_buried_atoms_removed_after_tilt() {
        let mut series = TiltSeries::new("Pt");
        series.c_tilts = vec![180];
        let out = series.generate(&supported_particle(), "PtNP").unwrap();
        let tilted = &out[0];

        // 180 degrees about c sends b = 0.6 -> 0.4 and b = 0.9 -> 0.1, both buried
        assert_eq!(tilted.name, "PtNP_000a000b180c_NoBuriedPt");
        assert_eq!(tilted.removed, 2);
        assert_eq!(tilted.structure.indices_of("Pt").len(), 0);
        assert_eq!(tilted.structure.indices_of("Ce").len(), 1);
    }

    #[test]
    fn test_remove_buried_only_touches_element() {
        let mut s = supported_particle();
        let removed = remove_buried(&mut s, "Pt", BURIED_THRESHOLD_B).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(s.len(), 3);
    }
}
