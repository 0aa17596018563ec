//! File naming conventions for simulated images.

use std::path::Path;

/// Identifies one simulated image of one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageName {
    pub structure: String,
    pub slices: u32,
    pub nx: u32,
    pub ny: u32,
    /// Defocus (nm).
    pub defocus: f64,
}

impl ImageName {
    /// `<structure>_<slices>slc_<nx>x<ny>_<defocus>nmDefocus`
    pub fn stem(&self) -> String {
        format!(
            "{}_{}slc_{}x{}_{}nmDefocus",
            self.structure, self.slices, self.nx, self.ny, self.defocus
        )
    }

    /// Raw raster written by the image-formation stage.
    pub fn raw_file_name(&self) -> String {
        format!("{}.dat", self.stem())
    }

    /// Clean rendering.
    pub fn clean_file_name(&self) -> String {
        format!("{}.tif", self.stem())
    }

    /// Noisy rendering at a vacuum level.
    pub fn noisy_file_name(&self, vacuum_level: u32) -> String {
        format!("{}_noisy_{}.tif", self.stem(), vacuum_level_tag(vacuum_level))
    }
}

/// Subdirectory of the noisy image directory for one vacuum level.
pub fn vacuum_dir_name(vacuum_level: u32) -> String {
    vacuum_level_tag(vacuum_level)
}

fn vacuum_level_tag(vacuum_level: u32) -> String {
    format!("vac_int-{:02}counts", vacuum_level)
}

/// Base name of a structure file: its file name without the extension.
pub fn structure_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo() -> ImageName {
        ImageName {
            structure: "foo".into(),
            slices: 300,
            nx: 512,
            ny: 512,
            defocus: 8.0,
        }
    }

    #[test]
    fn test_raw_and_clean_names() {
        assert_eq!(foo().raw_file_name(), "foo_300slc_512x512_8nmDefocus.dat");
        assert_eq!(foo().clean_file_name(), "foo_300slc_512x512_8nmDefocus.tif");
    }

    #[test]
    fn test_noisy_name_is_zero_padded() {
        assert_eq!(
            foo().noisy_file_name(4),
            "foo_300slc_512x512_8nmDefocus_noisy_vac_int-04counts.tif"
        );
        assert_eq!(
            foo().noisy_file_name(16),
            "foo_300slc_512x512_8nmDefocus_noisy_vac_int-16counts.tif"
        );
        assert_eq!(vacuum_dir_name(1), "vac_int-01counts");
    }

    #[test]
    fn test_fractional_and_negative_defocus() {
        let name = ImageName { defocus: -2.5, ..foo() };
        assert_eq!(name.raw_file_name(), "foo_300slc_512x512_-2.5nmDefocus.dat");
    }

    #[test]
    fn test_structure_name_strips_extension() {
        assert_eq!(structure_name(Path::new("in/RhCeO2_seq0000.cel")), "RhCeO2_seq0000");
        assert_eq!(structure_name(Path::new("in/model.v2.cel")), "model.v2");
        assert_eq!(structure_name(Path::new("in/noext")), "noext");
    }
}
