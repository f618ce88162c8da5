//! KMZ archive writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use geokmz_core::{Error, Result};
use geokmz_palette::EncodedImage;
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::kml::{OverlayDescriptor, DOC_ENTRY};

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::Packaging(format!("zip: {}", e))
}

/// Write `descriptor` and `image` into a KMZ at `path`.
///
/// The archive is assembled in a temporary file next to `path` and
/// renamed into place only once complete; on any failure the temporary
/// file is removed and nothing appears at `path`.
pub fn write_kmz(path: &Path, descriptor: &OverlayDescriptor, image: &EncodedImage) -> Result<()> {
    descriptor.validate()?;
    if image.is_empty() {
        return Err(Error::Packaging(format!(
            "image for {} is empty",
            path.display()
        )));
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|e| {
        Error::Packaging(format!("cannot create temporary file in {}: {}", dir.display(), e))
    })?;

    write_entries(tmp.as_file(), descriptor, image)?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::Packaging(format!("cannot flush archive for {}: {}", path.display(), e)))?;

    tmp.persist(path).map_err(|e| {
        Error::Packaging(format!("cannot move archive to {}: {}", path.display(), e.error))
    })?;

    debug!("Wrote {} ({} byte image)", path.display(), image.bytes.len());
    Ok(())
}

fn write_entries(file: &File, descriptor: &OverlayDescriptor, image: &EncodedImage) -> Result<()> {
    let mut zip = ZipWriter::new(file);

    let text = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(DOC_ENTRY, text).map_err(zip_err)?;
    zip.write_all(descriptor.to_kml().as_bytes())
        .map_err(|e| Error::Packaging(format!("writing {}: {}", DOC_ENTRY, e)))?;

    // PNG data is already deflated
    let binary = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(descriptor.href.as_str(), binary).map_err(zip_err)?;
    zip.write_all(&image.bytes)
        .map_err(|e| Error::Packaging(format!("writing {}: {}", descriptor.href, e)))?;

    zip.finish().map_err(zip_err)?;
    Ok(())
}
