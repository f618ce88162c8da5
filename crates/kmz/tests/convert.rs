mod common;

use approx::assert_relative_eq;
use common::*;
use geokmz_core::crs::to_wgs84;
use geokmz_core::{Error, GeoTransform, Orientation, CRS};
use geokmz_kmz::{convert_file, ConvertOptions};

#[test]
fn axis_aligned_projected_raster_gets_lat_lon_box() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Survey.tif");
    let output = dir.path().join("Survey.kmz");

    let transform = GeoTransform::new(500_000.0, 5_000_000.0, 30.0, -30.0);
    let meta = source(100, 200, CRS::from_epsg(32633), transform);
    write_fixture(&input, &meta, &gradient(100, 200));

    let report = convert_file(&input, &output, &ConvertOptions::default()).unwrap();
    assert_eq!(report.orientation, Orientation::AxisAligned);
    assert_eq!((report.width, report.height), (100, 200));
    assert!(report.palette_len <= 256);

    let kmz = open_kmz(&output);
    assert_eq!(kmz.entries.len(), 2);
    assert_eq!(kmz.png_name, "Survey.png");
    assert_eq!(tag_text(&kmz.kml, "href"), Some("Survey.png"));
    assert_eq!(tag_text(&kmz.kml, "name"), Some("Survey"));
    assert_eq!(tag_text(&kmz.kml, "altitudeMode"), Some("clampToGround"));
    assert!(tag_text(&kmz.kml, "LatLonBox").is_some());
    assert!(!kmz.kml.contains("LatLonQuad"));

    let (north, south) = (tag_f64(&kmz.kml, "north"), tag_f64(&kmz.kml, "south"));
    let (east, west) = (tag_f64(&kmz.kml, "east"), tag_f64(&kmz.kml, "west"));
    assert!(north > south && east > west);
    let crs = CRS::from_epsg(32633);
    for (col, row) in [(0.0, 0.0), (100.0, 0.0), (0.0, 200.0), (100.0, 200.0)] {
        let (x, y) = transform.apply(col, row);
        let (lon, lat) = to_wgs84(&crs, x, y).unwrap();
        let eps = 1e-9;
        assert!(lon >= west - eps && lon <= east + eps, "lon {} outside box", lon);
        assert!(lat >= south - eps && lat <= north + eps, "lat {} outside box", lat);
    }

    let png = decode_png(&kmz.png);
    assert_eq!((png.width, png.height), (100, 200));
    assert_eq!(png.color_type, png::ColorType::Indexed);
    assert!(png.palette.len() <= 256);
    assert!((0..png.indices.len()).all(|i| png.alpha(i) == 255));
}

#[test]
fn rotated_raster_gets_four_corners() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rotated.tif");
    let output = dir.path().join("rotated.kmz");

    let transform = GeoTransform::rotated(500_000.0, 5_000_000.0, 30.0, 15.0);
    let meta = source(100, 200, CRS::from_epsg(32633), transform);
    write_fixture(&input, &meta, &gradient(100, 200));

    let report = convert_file(&input, &output, &ConvertOptions::default()).unwrap();
    assert_eq!(report.orientation, Orientation::Rotated);

    let kmz = open_kmz(&output);
    assert!(!kmz.kml.contains("<LatLonBox>"));
    let corners = quad_coordinates(&kmz.kml);
    assert_eq!(corners.len(), 4);
    for i in 0..4 {
        for j in (i + 1)..4 {
            let (a, b) = (corners[i], corners[j]);
            assert!(
                (a.0 - b.0).abs() > 1e-6 || (a.1 - b.1).abs() > 1e-6,
                "corners {} and {} coincide",
                i,
                j
            );
        }
    }

    let png = decode_png(&kmz.png);
    assert_eq!((png.width, png.height), (100, 200));
}

#[test]
fn rotated_corners_map_back_to_pixel_corners() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("geo.tif");
    let output = dir.path().join("geo.kmz");

    let transform = GeoTransform::rotated(10.0, 45.0, 0.001, 15.0);
    let meta = source(100, 200, CRS::wgs84(), transform);
    write_fixture(&input, &meta, &gradient(100, 200));
    convert_file(&input, &output, &ConvertOptions::default()).unwrap();

    let corners = quad_coordinates(&open_kmz(&output).kml);
    let expected = [(0.0, 200.0), (100.0, 200.0), (100.0, 0.0), (0.0, 0.0)];
    for ((lon, lat), (col, row)) in corners.into_iter().zip(expected) {
        let (c, r) = transform.geo_to_pixel(lon, lat);
        assert_relative_eq!(c, col, epsilon = 1e-6);
        assert_relative_eq!(r, row, epsilon = 1e-6);
    }
}

#[test]
fn conversion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tile.tif");
    let meta = source(64, 48, CRS::web_mercator(), GeoTransform::new(-8_000.0, 6_000.0, 250.0, -250.0));
    write_fixture(&input, &meta, &gradient(64, 48));

    let first = dir.path().join("first.kmz");
    let second = dir.path().join("second.kmz");
    convert_file(&input, &first, &ConvertOptions::default()).unwrap();
    convert_file(&input, &second, &ConvertOptions::default()).unwrap();

    let (a, b) = (open_kmz(&first), open_kmz(&second));
    assert_eq!(a.kml, b.kml);
    let (pa, pb) = (decode_png(&a.png), decode_png(&b.png));
    assert_eq!((pa.width, pa.height), (pb.width, pb.height));
    assert_eq!(pa.indices, pb.indices);
    assert_eq!(pa.palette, pb.palette);
}

#[test]
fn nodata_becomes_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dem.tif");
    let output = dir.path().join("dem.kmz");

    let mut meta = source(30, 20, CRS::wgs84(), GeoTransform::new(5.0, 50.0, 0.01, -0.01));
    meta.nodata = Some(-9999.0);
    let band = ndarray::Array2::from_shape_fn((20, 30), |(r, c)| {
        if c < 5 {
            -9999.0f32
        } else {
            (r * 30 + c) as f32 * 0.5
        }
    });
    let pixels =
        geokmz_core::PixelBuffer::from_bands(vec![band], geokmz_core::BandLayout::Gray).unwrap();
    write_fixture(&input, &meta, &pixels);

    convert_file(&input, &output, &ConvertOptions::default()).unwrap();
    let png = decode_png(&open_kmz(&output).png);
    for i in 0..png.indices.len() {
        let transparent = i % 30 < 5;
        assert_eq!(png.alpha(i) == 0, transparent, "pixel {}", i);
    }
    assert_eq!(png.palette.iter().filter(|c| c[3] == 0).count(), 1);
}

#[test]
fn missing_georeference_leaves_no_archive() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plain.tif");
    let output = dir.path().join("out").join("plain.kmz");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    {
        let file = std::fs::File::create(&input).unwrap();
        let mut encoder = tiff::encoder::TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<tiff::encoder::colortype::Gray8>(2, 2, &[1, 2, 3, 4])
            .unwrap();
    }

    let err = convert_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidGeoreference(_)), "{err}");
    assert_eq!(std::fs::read_dir(output.parent().unwrap()).unwrap().count(), 0);
}

#[test]
fn out_of_domain_corner_is_reprojection_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("far.tif");
    let output = dir.path().join("far.kmz");
    let meta = source(10, 10, CRS::web_mercator(), GeoTransform::new(30_000_000.0, 0.0, 10.0, -10.0));
    write_fixture(&input, &meta, &gradient(10, 10));

    let err = convert_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Reprojection(_)), "{err}");
    assert!(!output.exists());
}

fn f32_raster_with_fill(fill: f32) -> geokmz_core::PixelBuffer<f32> {
    let band = ndarray::Array2::from_shape_fn((20, 30), |(r, c)| {
        if c < 5 {
            fill
        } else {
            1.0 + (r * 30 + c) as f32 * 0.5
        }
    });
    geokmz_core::PixelBuffer::from_bands(vec![band], geokmz_core::BandLayout::Gray).unwrap()
}

#[test]
fn f32_nodata_written_as_decimal_text_is_transparent() {
    for fill in [-3.40282e38f32, 0.1f32] {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dem32.tif");
        let output = dir.path().join("dem32.kmz");

        let mut meta = source(30, 20, CRS::wgs84(), GeoTransform::new(5.0, 50.0, 0.01, -0.01));
        // Stored as text the way GDAL prints it, not as the exact f32
        meta.nodata = Some(if fill < 0.0 { -3.40282e38 } else { 0.1 });
        write_fixture(&input, &meta, &f32_raster_with_fill(fill));

        convert_file(&input, &output, &ConvertOptions::default()).unwrap();
        let png = decode_png(&open_kmz(&output).png);

        let transparent = (0..png.indices.len()).filter(|&i| png.alpha(i) == 0).count();
        assert_eq!(transparent, 5 * 20, "fill {}", fill);
        for i in 0..png.indices.len() {
            assert_eq!(png.alpha(i) == 0, i % 30 < 5, "fill {} pixel {}", fill, i);
        }
        // The fill value must not take part in the stretch
        let opaque = png.palette.iter().filter(|c| c[3] == 255).count();
        assert!(opaque > 64, "fill {} collapsed to {} colours", fill, opaque);
    }
}

#[test]
fn alpha_band_is_carried_into_the_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rgba.tif");
    let output = dir.path().join("rgba.kmz");

    let mut meta = source(8, 8, CRS::wgs84(), GeoTransform::new(5.0, 50.0, 0.01, -0.01));
    meta.layout = geokmz_core::BandLayout::Rgba;
    let alpha_for = |c: usize| match c {
        0 => 0u8,
        1 => 128,
        _ => 255,
    };
    let bands = vec![
        ndarray::Array2::from_shape_fn((8, 8), |(_, c)| (c * 30) as u8),
        ndarray::Array2::from_shape_fn((8, 8), |(r, _)| (r * 30) as u8),
        ndarray::Array2::from_elem((8, 8), 100u8),
        ndarray::Array2::from_shape_fn((8, 8), |(_, c)| alpha_for(c)),
    ];
    let pixels =
        geokmz_core::PixelBuffer::from_bands(bands, geokmz_core::BandLayout::Rgba).unwrap();
    write_fixture(&input, &meta, &pixels);

    convert_file(&input, &output, &ConvertOptions::default()).unwrap();
    let png = decode_png(&open_kmz(&output).png);
    assert_eq!((png.width, png.height), (8, 8));
    for i in 0..64 {
        let (row, col) = (i / 8, i % 8);
        assert_eq!(png.alpha(i), alpha_for(col), "pixel ({}, {})", row, col);
        if col > 0 {
            let color = png.palette[png.indices[i] as usize];
            assert_eq!(&color[..3], &[(col * 30) as u8, (row * 30) as u8, 100][..]);
        }
    }
}

#[test]
fn nodata_border_does_not_shape_a_reduced_palette() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ortho.tif");
    let output = dir.path().join("ortho.kmz");

    let mut meta = source(64, 64, CRS::wgs84(), GeoTransform::new(5.0, 50.0, 0.001, -0.001));
    meta.layout = geokmz_core::BandLayout::Rgb;
    meta.nodata = Some(255.0);
    let border = |r: usize, c: usize| r < 4 || c < 4 || r >= 60 || c >= 60;
    let band = |f: fn(usize, usize) -> u8| {
        ndarray::Array2::from_shape_fn((64, 64), move |(r, c)| if border(r, c) { 255 } else { f(r, c) })
    };
    let bands = vec![
        band(|r, c| ((c * 3 + r) % 200) as u8),
        band(|r, c| ((r * 3 + c * 7) % 200) as u8),
        band(|r, c| ((r + c) % 200) as u8),
    ];
    let pixels = geokmz_core::PixelBuffer::from_bands(bands, geokmz_core::BandLayout::Rgb).unwrap();
    write_fixture(&input, &meta, &pixels);

    let report = convert_file(&input, &output, &ConvertOptions::default()).unwrap();
    assert!(report.palette_len > 128 && report.palette_len <= 256, "{}", report.palette_len);

    let png = decode_png(&open_kmz(&output).png);
    assert_eq!(png.palette[0], [0, 0, 0, 0]);
    for i in 0..png.indices.len() {
        assert_eq!(png.alpha(i) == 0, border(i / 64, i % 64), "pixel {}", i);
    }
    // Interior channels never exceed 199; a palette entry near white could
    // only come from the border.
    for (idx, color) in png.palette.iter().enumerate().skip(1) {
        assert_eq!(color[3], 255);
        assert!(color[..3].iter().all(|&v| v < 200), "entry {} = {:?}", idx, color);
    }
}
