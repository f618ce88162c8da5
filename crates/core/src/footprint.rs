//! Ground footprints of a raster in source and geographic frames

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterSource};

/// Four corner points listed in the order of the pixel corners they come
/// from: (0,0), (W,0), (0,H), (W,H).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub upper_left: (f64, f64),
    pub upper_right: (f64, f64),
    pub lower_left: (f64, f64),
    pub lower_right: (f64, f64),
}

impl Quad {
    /// Corners as an array in the fixed UL, UR, LL, LR order
    pub fn to_array(&self) -> [(f64, f64); 4] {
        [self.upper_left, self.upper_right, self.lower_left, self.lower_right]
    }

    /// Build from an array in UL, UR, LL, LR order
    pub fn from_array(corners: [(f64, f64); 4]) -> Self {
        Self {
            upper_left: corners[0],
            upper_right: corners[1],
            lower_left: corners[2],
            lower_right: corners[3],
        }
    }

    /// Apply `f` to every corner, failing fast on the first error
    pub fn try_map<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut((f64, f64)) -> Result<(f64, f64)>,
    {
        Ok(Self {
            upper_left: f(self.upper_left)?,
            upper_right: f(self.upper_right)?,
            lower_left: f(self.lower_left)?,
            lower_right: f(self.lower_right)?,
        })
    }
}

/// Raster corners in the source CRS.
///
/// Computed from pixel-corner coordinates, so the footprint covers the outer
/// half-pixel border as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Corner points in source CRS units
    pub corners: Quad,
    /// Transform the corners were derived from
    pub transform: GeoTransform,
}

impl Footprint {
    /// Apply `transform` to the four pixel-space corners of a `width` x `height` grid
    pub fn from_transform(transform: GeoTransform, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeoreference(format!(
                "raster has no extent: {}x{}",
                width, height
            )));
        }
        if transform.is_degenerate() {
            return Err(Error::InvalidGeoreference(format!(
                "degenerate affine transform {:?}",
                transform.to_gdal()
            )));
        }

        let corners = Quad {
            upper_left: transform.pixel_to_geo_corner(0, 0),
            upper_right: transform.pixel_to_geo_corner(width, 0),
            lower_left: transform.pixel_to_geo_corner(0, height),
            lower_right: transform.pixel_to_geo_corner(width, height),
        };

        Ok(Self { corners, transform })
    }

    /// Orientation of the pixel grid on the ground
    pub fn orientation(&self) -> Orientation {
        Orientation::of(&self.transform)
    }
}

/// Compute the ground footprint of a raster.
pub fn extract_footprint(source: &RasterSource) -> Result<Footprint> {
    Footprint::from_transform(source.transform, source.width, source.height)
}

/// Whether a footprint may be collapsed to a lon/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// North-up grid; the corners are fully described by a bounding box
    AxisAligned,
    /// Rotated, sheared or mirrored grid; all four corners must be kept
    Rotated,
}

impl Orientation {
    /// Classify a transform.
    ///
    /// A mirrored grid (positive `pixel_height` or negative `pixel_width`) is
    /// Rotated: a bounding box would show the image flipped.
    pub fn of(transform: &GeoTransform) -> Self {
        if transform.is_north_up() {
            Orientation::AxisAligned
        } else {
            Orientation::Rotated
        }
    }
}

/// North/south/east/west bounds in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl LatLonBox {
    /// Whether the box wraps across the 180° meridian (`west > east`)
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Whether `(lon, lat)` lies inside the box, allowing `epsilon` slack
    pub fn contains(&self, lon: f64, lat: f64, epsilon: f64) -> bool {
        let in_lon = if self.crosses_antimeridian() {
            lon >= self.west - epsilon || lon <= self.east + epsilon
        } else {
            lon >= self.west - epsilon && lon <= self.east + epsilon
        };
        in_lon && lat >= self.south - epsilon && lat <= self.north + epsilon
    }
}

/// Raster corners reprojected to WGS84 `(lon, lat)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFootprint {
    /// Corners as (longitude, latitude), same order as the source footprint
    pub corners: Quad,
    /// Axis-aligned or rotated classification
    pub orientation: Orientation,
}

impl GeoFootprint {
    /// Smallest box enclosing all four corners.
    ///
    /// A footprint straddles the antimeridian when its right-hand corners
    /// reproject west of its left-hand ones across a gap wider than 180°;
    /// the box then has `west > east`, as KML expects. A grid running the
    /// full -180..180 keeps its plain bounds.
    pub fn lat_lon_box(&self) -> LatLonBox {
        let corners = self.corners.to_array();
        let bbox = bounds(corners.iter().copied());
        if !self.crosses_antimeridian(&bbox) {
            return bbox;
        }
        let shifted = corners
            .iter()
            .map(|&(lon, lat)| (if lon < 0.0 { lon + 360.0 } else { lon }, lat));
        let wrapped = bounds(shifted);
        LatLonBox {
            east: wrapped.east - 360.0,
            ..wrapped
        }
    }

    fn crosses_antimeridian(&self, bbox: &LatLonBox) -> bool {
        let q = &self.corners;
        bbox.east - bbox.west > 180.0
            && (q.upper_left.0 > q.upper_right.0 || q.lower_left.0 > q.lower_right.0)
    }

    /// Whether the footprint may be written as a bounding box
    pub fn is_axis_aligned(&self) -> bool {
        self.orientation == Orientation::AxisAligned
    }
}

fn bounds(points: impl Iterator<Item = (f64, f64)>) -> LatLonBox {
    let mut bbox = LatLonBox {
        north: f64::NEG_INFINITY,
        south: f64::INFINITY,
        east: f64::NEG_INFINITY,
        west: f64::INFINITY,
    };
    for (lon, lat) in points {
        bbox.north = bbox.north.max(lat);
        bbox.south = bbox.south.min(lat);
        bbox.east = bbox.east.max(lon);
        bbox.west = bbox.west.min(lon);
    }
    bbox
}
