//! # geokmz KMZ
//!
//! Packages georeferenced overlays as KMZ archives and drives conversions
//! over single files or whole directory trees.
//!
//! - [`kml`]: `GroundOverlay` descriptor (`LatLonBox` or `gx:LatLonQuad`)
//! - [`archive`]: atomic two-entry KMZ writer
//! - [`pipeline`]: open → footprint → reproject → encode → package for one file
//! - [`batch`]: tree walk with mirrored output layout, sequential or parallel

pub mod archive;
pub mod batch;
pub mod kml;
mod maybe_rayon;
pub mod naming;
pub mod parallel;
pub mod pipeline;

pub use archive::write_kmz;
pub use batch::{
    convert_tree, gather_tasks, run_batch, BatchFailure, BatchSummary, ConversionTask, TaskOutcome,
};
pub use kml::{OverlayDescriptor, OverlayGeometry};
pub use naming::{base_name, kmz_path_for};
pub use parallel::ProcessingMode;
pub use pipeline::{convert_file, ConversionReport, ConvertOptions};
