use crate::color::ColorSample;
use crate::image::RgbImageView;

/// Square window of width `box_w` centered on an integer pixel.
///
/// Offsets are relative to the center: for `box_w = 7` the valid range is
/// `-3..=3` in both axes. Even widths bias one pixel toward the negative
/// side, matching the centered truncation `lo = -(box_w / 2)`.
#[derive(Clone, Copy, Debug)]
pub struct PatchView<'a> {
    img: RgbImageView<'a>,
    cx: i32,
    cy: i32,
    box_w: i32,
}

impl<'a> PatchView<'a> {
    /// Build a patch centered at `(cx, cy)`, or `None` if any part of the
    /// window would leave the image.
    pub fn centered(img: RgbImageView<'a>, cx: i32, cy: i32, box_w: u32) -> Option<Self> {
        let box_w = box_w as i32;
        if box_w == 0 {
            return None;
        }
        let lo = -(box_w / 2);
        let hi = box_w + lo; // exclusive
        if cx + lo < 0
            || cy + lo < 0
            || cx + hi > img.width as i32
            || cy + hi > img.height as i32
        {
            return None;
        }
        Some(Self { img, cx, cy, box_w })
    }

    pub fn box_w(&self) -> i32 {
        self.box_w
    }

    /// Inclusive lower relative offset.
    pub fn lo(&self) -> i32 {
        -(self.box_w / 2)
    }

    /// Exclusive upper relative offset.
    pub fn hi(&self) -> i32 {
        self.box_w + self.lo()
    }

    /// Sample at a relative offset from the patch center.
    #[inline]
    pub fn at(&self, i: i32, j: i32) -> ColorSample {
        self.img.sample(self.cx + i, self.cy + j)
    }

    /// Whether at least one diagonal of the patch carries contrast above
    /// `tol`. Cheap reject before the full angular search.
    pub fn has_diagonal_contrast(&self, tol: ColorSample) -> bool {
        let lo = self.lo();
        let hi = self.hi() - 1;
        let d1 = self.at(lo, lo) - self.at(hi, hi);
        if d1.abs_exceeds(tol) {
            return true;
        }
        let d2 = self.at(lo, hi) - self.at(hi, lo);
        d2.abs_exceeds(tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;

    #[test]
    fn centered_rejects_windows_off_the_image() {
        let img = RgbImage::filled(10, 10, [0, 0, 0]);
        let v = img.view();
        assert!(PatchView::centered(v, 5, 5, 7).is_some());
        assert!(PatchView::centered(v, 2, 5, 7).is_none()); // 2 - 3 < 0
        assert!(PatchView::centered(v, 5, 7, 7).is_none()); // 7 + 4 > 10
        assert!(PatchView::centered(v, 0, 0, 1).is_some());
    }

    #[test]
    fn offsets_span_the_window() {
        let img = RgbImage::from_fn(9, 9, |x, y| [(x * 10) as u8, (y * 10) as u8, 0]);
        let v = img.view();
        let p = PatchView::centered(v, 4, 4, 7).unwrap();
        assert_eq!(p.lo(), -3);
        assert_eq!(p.hi(), 4);
        assert_eq!(p.at(0, 0), ColorSample([40.0, 40.0, 0.0]));
        assert_eq!(p.at(-3, 3), ColorSample([10.0, 70.0, 0.0]));
    }

    #[test]
    fn diagonal_contrast_on_a_split_patch() {
        // Left half dark, right half bright.
        let img = RgbImage::from_fn(9, 9, |x, _| if x < 4 { [0, 0, 0] } else { [200, 200, 200] });
        let p = PatchView::centered(img.view(), 4, 4, 7).unwrap();
        assert!(p.has_diagonal_contrast(ColorSample([30.0, 30.0, 30.0])));

        let flat = RgbImage::filled(9, 9, [100, 100, 100]);
        let p = PatchView::centered(flat.view(), 4, 4, 7).unwrap();
        assert!(!p.has_diagonal_contrast(ColorSample([30.0, 30.0, 30.0])));
    }
}
