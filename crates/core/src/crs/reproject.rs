//! Reprojection of footprint corners to WGS84 longitude/latitude.
//!
//! EPSG:4326 passes through, Web Mercator uses the closed-form spherical
//! inverse, and every other EPSG code is looked up in the `crs-definitions`
//! database and transformed with `proj4rs` (pure Rust, no libproj).

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use tracing::debug;

use super::{CRS, WGS84_EPSG};
use crate::error::{Error, Result};
use crate::footprint::{Footprint, GeoFootprint};

/// Sphere radius used by Web Mercator (m)
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Half the Web Mercator world width (m)
const WEB_MERCATOR_HALF_WORLD: f64 = std::f64::consts::PI * WEB_MERCATOR_RADIUS;

/// Reproject every footprint corner to WGS84 and classify the orientation.
///
/// Corners are transformed independently; the first failing corner aborts
/// the whole footprint.
pub fn reproject_footprint(footprint: &Footprint, crs: &CRS) -> Result<GeoFootprint> {
    let projector = Projector::for_crs(crs)?;
    let corners = footprint.corners.try_map(|(x, y)| projector.project(x, y))?;
    let orientation = footprint.orientation();

    debug!("Reprojected footprint from {} ({:?})", crs, orientation);

    Ok(GeoFootprint {
        corners,
        orientation,
    })
}

/// Reproject one point from `crs` to WGS84 `(lon, lat)` in degrees.
pub fn to_wgs84(crs: &CRS, x: f64, y: f64) -> Result<(f64, f64)> {
    Projector::for_crs(crs)?.project(x, y)
}

/// Transformation strategy for one source CRS
enum Projector {
    /// Already geographic WGS84
    Identity,
    /// EPSG:3857 and its legacy aliases
    WebMercator,
    /// Generic proj4rs transform
    Proj {
        source: Box<Proj>,
        target: Box<Proj>,
        source_is_geographic: bool,
        label: String,
    },
}

impl Projector {
    fn for_crs(crs: &CRS) -> Result<Self> {
        match crs.epsg() {
            Some(WGS84_EPSG) => return Ok(Projector::Identity),
            Some(3857) | Some(900913) | Some(3785) | Some(102100) => {
                return Ok(Projector::WebMercator)
            }
            _ => {}
        }

        let source_str = match (crs.epsg(), crs.proj()) {
            (Some(code), _) => get_proj_string(code).ok_or_else(|| {
                Error::Reprojection(format!(
                    "EPSG:{} is not in the crs-definitions database",
                    code
                ))
            })?,
            (None, Some(proj)) => proj,
            (None, None) => {
                return Err(Error::Reprojection(format!("unrecognized CRS {}", crs)));
            }
        };
        let target_str = get_proj_string(WGS84_EPSG).ok_or_else(|| {
            Error::Reprojection("EPSG:4326 is not in the crs-definitions database".into())
        })?;

        let source = Proj::from_proj_string(source_str)
            .map_err(|e| Error::Reprojection(format!("invalid projection {}: {:?}", crs, e)))?;
        let target = Proj::from_proj_string(target_str)
            .map_err(|e| Error::Reprojection(format!("invalid projection EPSG:4326: {:?}", e)))?;

        Ok(Projector::Proj {
            source: Box::new(source),
            target: Box::new(target),
            source_is_geographic: source_str.contains("+proj=longlat"),
            label: crs.identifier(),
        })
    }

    fn project(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::Reprojection(format!(
                "non-finite coordinate ({}, {})",
                x, y
            )));
        }

        let (lon, lat) = match self {
            Projector::Identity => (x, y),
            Projector::WebMercator => web_mercator_to_lon_lat(x, y)?,
            Projector::Proj {
                source,
                target,
                source_is_geographic,
                label,
            } => {
                // proj4rs works in radians for geographic coordinates
                let mut point = if *source_is_geographic {
                    (x.to_radians(), y.to_radians(), 0.0)
                } else {
                    (x, y, 0.0)
                };
                transform(source, target, &mut point).map_err(|e| {
                    Error::Reprojection(format!(
                        "transform of ({}, {}) from {} failed: {:?}",
                        x, y, label, e
                    ))
                })?;
                (point.0.to_degrees(), point.1.to_degrees())
            }
        };

        validate_lon_lat(lon, lat)?;
        Ok((lon, lat))
    }
}

/// Spherical Web Mercator inverse
fn web_mercator_to_lon_lat(x: f64, y: f64) -> Result<(f64, f64)> {
    if x.abs() > WEB_MERCATOR_HALF_WORLD * (1.0 + 1e-9) {
        return Err(Error::Reprojection(format!(
            "easting {} outside the Web Mercator domain",
            x
        )));
    }
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (y / WEB_MERCATOR_RADIUS).sinh().atan().to_degrees();
    Ok((lon, lat))
}

fn validate_lon_lat(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(Error::Reprojection(format!(
            "transform produced non-finite coordinate ({}, {})",
            lon, lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::Reprojection(format!(
            "coordinate ({}, {}) outside [-180,180]x[-90,90]",
            lon, lat
        )));
    }
    Ok(())
}

/// PROJ.4 string for an EPSG code from the crs-definitions database
fn get_proj_string(epsg: u32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}
