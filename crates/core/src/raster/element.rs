//! Raster element trait for generic band samples

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

use super::SampleType;

/// Trait for types that can be stored in a raster band.
///
/// No-data values travel as `f64` (GeoTIFF stores them as text), so the
/// comparison is done in the sample's own type after casting.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sample type tag for this element
    const SAMPLE_TYPE: SampleType;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<f64>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $kind:expr) => {
        impl RasterElement for $t {
            const SAMPLE_TYPE: SampleType = $kind;

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                match nodata.and_then(|nd| <$t as NumCast>::from(nd)) {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $kind:expr) => {
        impl RasterElement for $t {
            const SAMPLE_TYPE: SampleType = $kind;

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                // Compare after rounding the no-data value into the sample
                // type: decimal text like "0.1" is not exact in f32.
                match nodata {
                    Some(nd) if nd.is_nan() => self.is_nan(),
                    Some(nd) => {
                        let nd = nd as $t;
                        *self == nd || (*self - nd).abs() <= nd.abs() * <$t>::EPSILON
                    }
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(i8, SampleType::I8);
impl_raster_element_int!(i16, SampleType::I16);
impl_raster_element_int!(i32, SampleType::I32);
impl_raster_element_int!(i64, SampleType::I64);
impl_raster_element_int!(u8, SampleType::U8);
impl_raster_element_int!(u16, SampleType::U16);
impl_raster_element_int!(u32, SampleType::U32);
impl_raster_element_int!(u64, SampleType::U64);
impl_raster_element_float!(f32, SampleType::F32);
impl_raster_element_float!(f64, SampleType::F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_nodata_exact_match() {
        assert!(0u8.is_nodata(Some(0.0)));
        assert!(!1u8.is_nodata(Some(0.0)));
        assert!(!0u8.is_nodata(None));
        // A no-data value the type cannot hold never matches.
        assert!(!255u8.is_nodata(Some(-9999.0)));
        assert!((-9999i16).is_nodata(Some(-9999.0)));
    }

    #[test]
    fn float_nodata() {
        assert!(f32::NAN.is_nodata(Some(f64::NAN)));
        assert!(!1.0f32.is_nodata(Some(f64::NAN)));
        assert!((-3.4028235e38f32).is_nodata(Some(-3.4028235e38)));
        assert!(0.0f64.is_nodata(Some(0.0)));
        assert!(!0.5f64.is_nodata(Some(0.0)));
    }

    #[test]
    fn f32_nodata_from_decimal_text() {
        // GDAL writes the float32 fill value rounded to six digits
        assert!((-3.40282e38f32).is_nodata(Some(-3.40282e38)));
        assert!(0.1f32.is_nodata(Some(0.1)));
        assert!(!0.2f32.is_nodata(Some(0.1)));
        assert!(!(-3.3e38f32).is_nodata(Some(-3.40282e38)));
    }
}
