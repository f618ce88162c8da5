//! Coordinate Reference System handling

mod reproject;

pub use reproject::{reproject_footprint, to_wgs84, WEB_MERCATOR_RADIUS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of the geographic frame KML requires (WGS84 lon/lat).
pub const WGS84_EPSG: u32 = 4326;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
    /// Free-form citation for user-defined systems
    citation: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            proj: None,
            citation: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            epsg: None,
            proj: Some(proj.into()),
            citation: None,
        }
    }

    /// A user-defined system known only by its citation text
    pub fn user_defined(citation: impl Into<String>) -> Self {
        Self {
            epsg: None,
            proj: None,
            citation: Some(citation.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether this is the WGS84 geographic frame itself
    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(WGS84_EPSG)
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(citation) = &self.citation {
            return format!("USER:{}", citation);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_wgs84());
    }

    #[test]
    fn test_identifier_forms() {
        assert_eq!(CRS::web_mercator().identifier(), "EPSG:3857");
        assert_eq!(
            CRS::from_proj("+proj=utm +zone=33 +datum=WGS84").identifier(),
            "+proj=utm +zone=33 +datum=WGS84"
        );
        assert_eq!(CRS::user_defined("Local grid").identifier(), "USER:Local grid");
        assert!(!CRS::user_defined("Local grid").is_wgs84());
    }
}
