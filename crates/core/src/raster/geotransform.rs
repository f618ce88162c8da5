//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Relative tolerance below which rotation/shear terms are treated as zero.
pub const ROTATION_TOLERANCE: f64 = 1e-9;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and CRS coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images, `row_rotation` and `col_rotation` are 0,
/// and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Contribution of the row index to X (rotation/shear)
    pub row_rotation: f64,
    /// Contribution of the column index to Y (rotation/shear)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create a transform whose pixel grid is rotated clockwise by `degrees`
    /// around the upper-left corner.
    ///
    /// `pixel_size` is the ground size of one (square) pixel.
    pub fn rotated(origin_x: f64, origin_y: f64, pixel_size: f64, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            origin_x,
            origin_y,
            pixel_width: pixel_size * cos,
            pixel_height: -pixel_size * cos,
            row_rotation: -pixel_size * sin,
            col_rotation: -pixel_size * sin,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Convert pixel coordinates to CRS coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert pixel coordinates to CRS coordinates (top-left corner)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Apply the transform to fractional pixel coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Determinant of the linear part of the transform.
    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// True if the transform cannot be inverted or holds non-finite coefficients.
    pub fn is_degenerate(&self) -> bool {
        if self.to_gdal().iter().any(|c| !c.is_finite()) {
            return true;
        }
        let scale = self
            .pixel_width
            .abs()
            .max(self.pixel_height.abs())
            .max(self.row_rotation.abs())
            .max(self.col_rotation.abs());
        scale == 0.0 || self.determinant().abs() <= f64::EPSILON * scale * scale
    }

    /// Convert CRS coordinates to pixel coordinates
    ///
    /// Returns fractional pixel coordinates; use `.floor()` to get integer indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_degenerate() {
            return (f64::NAN, f64::NAN);
        }
        let det = self.determinant();

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// True if either off-diagonal coefficient exceeds the relative tolerance.
    pub fn is_rotated(&self) -> bool {
        let scale = self.pixel_width.abs().max(self.pixel_height.abs());
        let limit = ROTATION_TOLERANCE * scale;
        self.row_rotation.abs() > limit || self.col_rotation.abs() > limit
    }

    /// Check if this is a north-up image (no rotation, no mirroring)
    pub fn is_north_up(&self) -> bool {
        !self.is_rotated() && self.pixel_width > 0.0 && self.pixel_height < 0.0
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_rotated_roundtrip() {
        let gt = GeoTransform::rotated(500_000.0, 4_000_000.0, 30.0, 15.0);
        assert!(gt.is_rotated());
        assert!(!gt.is_north_up());
        assert_relative_eq!(gt.determinant(), -900.0, epsilon = 1e-6);

        let (x, y) = gt.pixel_to_geo_corner(100, 200);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 100.0, epsilon = 1e-6);
        assert_relative_eq!(row, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gdal_roundtrip() {
        let coeffs = [10.0, 2.0, 0.5, 20.0, -0.5, -2.0];
        assert_eq!(GeoTransform::from_gdal(coeffs).to_gdal(), coeffs);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate() {
        assert!(GeoTransform::new(0.0, 0.0, 0.0, -1.0).is_degenerate());
        assert!(GeoTransform::new(0.0, 0.0, f64::NAN, -1.0).is_degenerate());
        // Collinear rows and columns.
        assert!(GeoTransform::from_gdal([0.0, 1.0, 2.0, 0.0, 1.0, 2.0]).is_degenerate());
        assert!(!GeoTransform::default().is_degenerate());

        let (col, row) = GeoTransform::new(0.0, 0.0, 0.0, 0.0).geo_to_pixel(1.0, 1.0);
        assert!(col.is_nan() && row.is_nan());
    }

    #[test]
    fn test_rotation_tolerance_is_relative() {
        // Tiny shear relative to metre-sized pixels is noise.
        let mut gt = GeoTransform::new(0.0, 0.0, 30.0, -30.0);
        gt.row_rotation = 1e-12;
        assert!(!gt.is_rotated());

        // The same shear on degree-sized pixels is not.
        let mut gt = GeoTransform::new(0.0, 0.0, 1e-5, -1e-5);
        gt.row_rotation = 1e-12;
        assert!(gt.is_rotated());
    }

    #[test]
    fn test_north_up() {
        assert!(GeoTransform::new(0.0, 0.0, 1.0, -1.0).is_north_up());
        assert!(!GeoTransform::new(0.0, 0.0, 1.0, 1.0).is_north_up());
    }
}
