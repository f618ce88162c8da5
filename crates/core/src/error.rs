//! Error types for geokmz

use thiserror::Error;

/// Main error type for geokmz operations.
///
/// Every variant is scoped to a single input raster: a batch records the
/// failure and moves on to the next file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The raster lacks a usable affine transform or CRS.
    #[error("invalid georeference: {0}")]
    InvalidGeoreference(String),

    /// The source CRS is unrecognized, or a corner falls outside its valid domain.
    #[error("reprojection failed: {0}")]
    Reprojection(String),

    /// Pixel data is missing, zero-sized, or the bands are mismatched.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// The archive could not be assembled or written.
    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    /// Short machine-friendly label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::InvalidGeoreference(_) => "invalid-georeference",
            Error::Reprojection(_) => "reprojection",
            Error::ImageDecode(_) => "image-decode",
            Error::Packaging(_) => "packaging",
            Error::InvalidParameter { .. } => "invalid-parameter",
        }
    }
}

/// Result type alias for geokmz operations
pub type Result<T> = std::result::Result<T, Error>;
