//! End-to-end helpers from `image` buffer types.

use crate::scan::{detect_ellipses, ScanError, ScanParams, ScanResult};
use fiberscan_core::RgbImageView;

/// Convert an `image::RgbImage` into the lightweight `fiberscan-core` view
/// type.
pub fn rgb_view(img: &::image::RgbImage) -> RgbImageView<'_> {
    RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Run the full detector on an `image::RgbImage`.
pub fn detect_ellipses_image(
    img: &::image::RgbImage,
    params: &ScanParams,
) -> Result<ScanResult, ScanError> {
    detect_ellipses(&rgb_view(img), params)
}

/// Convenience overload using default parameters.
pub fn detect_ellipses_default(img: &::image::RgbImage) -> Result<ScanResult, ScanError> {
    detect_ellipses_image(img, &ScanParams::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_adapts_dimensions_and_data() {
        let mut img = ::image::RgbImage::new(8, 6);
        img.put_pixel(3, 2, ::image::Rgb([9, 8, 7]));
        let v = rgb_view(&img);
        assert_eq!(v.width, 8);
        assert_eq!(v.height, 6);
        assert_eq!(v.sample(3, 2).0, [9.0, 8.0, 7.0]);
    }
}
