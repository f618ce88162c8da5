//! KML ground overlay descriptor

use geokmz_core::{Error, GeoFootprint, LatLonBox, Quad, Result};

/// Name of the descriptor entry inside a KMZ archive.
pub const DOC_ENTRY: &str = "doc.kml";

const KML_NS: &str = "http://www.opengis.net/kml/2.2";
const GX_NS: &str = "http://www.google.com/kml/ext/2.2";

/// Ground geometry of one overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayGeometry {
    /// North-up box, rendered as `<LatLonBox>` with zero rotation
    Box(LatLonBox),
    /// Four independent corners, rendered as `<gx:LatLonQuad>`
    Quad(Quad),
}

impl OverlayGeometry {
    pub fn from_footprint(footprint: &GeoFootprint) -> Self {
        if footprint.is_axis_aligned() {
            OverlayGeometry::Box(footprint.lat_lon_box())
        } else {
            OverlayGeometry::Quad(footprint.corners)
        }
    }

    /// Corners in `gx:LatLonQuad` order: lower-left, lower-right,
    /// upper-right, upper-left.
    pub fn quad_order(quad: &Quad) -> [(f64, f64); 4] {
        [quad.lower_left, quad.lower_right, quad.upper_right, quad.upper_left]
    }
}

/// A single `GroundOverlay` document.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDescriptor {
    /// Display name
    pub name: String,
    /// Archive-relative image reference
    pub href: String,
    pub geometry: OverlayGeometry,
    pub draw_order: i32,
}

impl OverlayDescriptor {
    pub fn new(name: impl Into<String>, href: impl Into<String>, footprint: &GeoFootprint) -> Self {
        Self {
            name: name.into(),
            href: href.into(),
            geometry: OverlayGeometry::from_footprint(footprint),
            draw_order: 1,
        }
    }

    /// Check the descriptor can be packaged
    pub fn validate(&self) -> Result<()> {
        if self.href.is_empty() {
            return Err(Error::Packaging("overlay has an empty image reference".into()));
        }
        let finite = match &self.geometry {
            OverlayGeometry::Box(b) => [b.north, b.south, b.east, b.west].iter().all(|v| v.is_finite()),
            OverlayGeometry::Quad(q) => q
                .to_array()
                .iter()
                .all(|(lon, lat)| lon.is_finite() && lat.is_finite()),
        };
        if !finite {
            return Err(Error::Packaging("overlay geometry has non-finite coordinates".into()));
        }
        Ok(())
    }

    /// Render the complete KML document
    pub fn to_kml(&self) -> String {
        let mut out = String::with_capacity(768);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        match self.geometry {
            OverlayGeometry::Box(_) => out.push_str(&format!("<kml xmlns=\"{}\">\n", KML_NS)),
            OverlayGeometry::Quad(_) => out.push_str(&format!(
                "<kml xmlns=\"{}\" xmlns:gx=\"{}\">\n",
                KML_NS, GX_NS
            )),
        }
        out.push_str("  <GroundOverlay>\n");
        out.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        out.push_str("    <color>ffffffff</color>\n");
        out.push_str(&format!("    <drawOrder>{}</drawOrder>\n", self.draw_order));
        out.push_str("    <Icon>\n");
        out.push_str(&format!("      <href>{}</href>\n", escape_xml(&self.href)));
        out.push_str("    </Icon>\n");
        out.push_str("    <altitudeMode>clampToGround</altitudeMode>\n");

        match &self.geometry {
            OverlayGeometry::Box(b) => {
                out.push_str("    <LatLonBox>\n");
                out.push_str(&format!("      <north>{}</north>\n", b.north));
                out.push_str(&format!("      <south>{}</south>\n", b.south));
                out.push_str(&format!("      <east>{}</east>\n", b.east));
                out.push_str(&format!("      <west>{}</west>\n", b.west));
                out.push_str("      <rotation>0</rotation>\n");
                out.push_str("    </LatLonBox>\n");
            }
            OverlayGeometry::Quad(q) => {
                let coords: Vec<String> = OverlayGeometry::quad_order(q)
                    .iter()
                    .map(|(lon, lat)| format!("{},{},0", lon, lat))
                    .collect();
                out.push_str("    <gx:LatLonQuad>\n");
                out.push_str(&format!("      <coordinates>{}</coordinates>\n", coords.join(" ")));
                out.push_str("    </gx:LatLonQuad>\n");
            }
        }

        out.push_str("  </GroundOverlay>\n");
        out.push_str("</kml>\n");
        out
    }
}

/// Escape the five XML special characters
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geokmz_core::Orientation;

    fn footprint(orientation: Orientation) -> GeoFootprint {
        GeoFootprint {
            corners: Quad {
                upper_left: (10.0, 46.0),
                upper_right: (11.0, 46.5),
                lower_left: (9.5, 45.0),
                lower_right: (10.5, 45.5),
            },
            orientation,
        }
    }

    #[test]
    fn axis_aligned_uses_lat_lon_box() {
        let desc = OverlayDescriptor::new("tile", "tile.png", &footprint(Orientation::AxisAligned));
        let kml = desc.to_kml();
        assert!(kml.contains("<LatLonBox>"));
        assert!(kml.contains("<north>46.5</north>"));
        assert!(kml.contains("<south>45</south>"));
        assert!(kml.contains("<east>11</east>"));
        assert!(kml.contains("<west>9.5</west>"));
        assert!(kml.contains("<rotation>0</rotation>"));
        assert!(kml.contains("<altitudeMode>clampToGround</altitudeMode>"));
        assert!(!kml.contains("gx:"));
    }

    #[test]
    fn rotated_uses_lat_lon_quad() {
        let desc = OverlayDescriptor::new("tile", "tile.png", &footprint(Orientation::Rotated));
        let kml = desc.to_kml();
        assert!(kml.contains("xmlns:gx=\"http://www.google.com/kml/ext/2.2\""));
        assert!(kml.contains(
            "<coordinates>9.5,45,0 10.5,45.5,0 11,46.5,0 10,46,0</coordinates>"
        ));
        assert!(!kml.contains("<LatLonBox>"));
    }

    #[test]
    fn name_and_href_are_escaped() {
        let desc = OverlayDescriptor::new("a<b>&\"c'", "x&y.png", &footprint(Orientation::AxisAligned));
        let kml = desc.to_kml();
        assert!(kml.contains("<name>a&lt;b&gt;&amp;&quot;c&apos;</name>"));
        assert!(kml.contains("<href>x&amp;y.png</href>"));
    }

    #[test]
    fn empty_href_is_rejected() {
        let desc = OverlayDescriptor::new("tile", "", &footprint(Orientation::AxisAligned));
        assert!(matches!(desc.validate(), Err(Error::Packaging(_))));
    }
}
