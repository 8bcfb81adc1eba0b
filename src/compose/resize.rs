//! Contain-fit resizing onto a transparent canvas.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::model::CanvasSize;

/// Scale `src` to fit inside `canvas` preserving aspect ratio, centered, with
/// the remainder left fully transparent. Never crops, never stretches.
pub fn contain_fit(src: &RgbaImage, canvas: CanvasSize) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    if (sw, sh) == (canvas.width, canvas.height) {
        return src.clone();
    }

    let mut out = RgbaImage::new(canvas.width, canvas.height);
    if sw == 0 || sh == 0 {
        return out;
    }

    let (fw, fh) = fit_dimensions(sw, sh, canvas);
    let scaled = if (fw, fh) == (sw, sh) {
        src.clone()
    } else {
        imageops::resize(src, fw, fh, FilterType::Lanczos3)
    };

    let x = i64::from((canvas.width - fw) / 2);
    let y = i64::from((canvas.height - fh) / 2);
    imageops::replace(&mut out, &scaled, x, y);
    out
}

/// Largest `(w, h)` with the source aspect ratio that fits in `canvas`.
pub fn fit_dimensions(sw: u32, sh: u32, canvas: CanvasSize) -> (u32, u32) {
    let scale = f64::min(
        f64::from(canvas.width) / f64::from(sw),
        f64::from(canvas.height) / f64::from(sh),
    );
    let w = ((f64::from(sw) * scale).round() as u32).clamp(1, canvas.width);
    let h = ((f64::from(sh) * scale).round() as u32).clamp(1, canvas.height);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn wide_source_is_letterboxed() {
        let src = RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]));
        let out = contain_fit(&src, CanvasSize::new(100, 100));
        assert_eq!(out.dimensions(), (100, 100));
        // Top and bottom bands are padding.
        assert_eq!(out.get_pixel(50, 10)[3], 0);
        assert_eq!(out.get_pixel(50, 90)[3], 0);
        assert_eq!(out.get_pixel(50, 50)[3], 255);
    }

    #[test]
    fn fit_dimensions_preserve_aspect() {
        assert_eq!(fit_dimensions(1000, 500, CanvasSize::new(2000, 2000)), (2000, 1000));
        assert_eq!(fit_dimensions(300, 900, CanvasSize::new(600, 600)), (200, 600));
    }

    #[test]
    fn same_size_is_identity() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4]));
        assert_eq!(contain_fit(&src, CanvasSize::new(4, 4)), src);
    }
}
