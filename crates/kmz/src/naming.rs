//! Output naming

use std::path::{Path, PathBuf};

/// Extension of packaged overlays
pub const KMZ_EXTENSION: &str = "kmz";

/// File stem of `input`, case preserved.
pub fn base_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<output_dir>/<base>.kmz`
pub fn kmz_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}.{}", base_name(input), KMZ_EXTENSION))
}

/// Image entry name inside the archive
pub fn image_entry_name(base: &str) -> String {
    format!("{}.png", base)
}

/// Whether `path` has a `.tif` or `.tiff` extension, ignoring case
pub fn is_geotiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}
