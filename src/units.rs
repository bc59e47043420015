//! # Unit Conversion
//!
//! Offsets are authored in browser pixels (96 DPI) and printed in PDF points
//! (72 DPI), so one pixel is 0.75 pt. A 794 px wide preview sheet lands on a
//! 595.5 pt page, which is the A4 width within a fraction of a point.
//!
//! ```
//! use invoice_designer::units::{to_pixels, to_points};
//!
//! assert_eq!(to_points(100.0), 75.0);
//! assert_eq!(to_pixels(75.0), 100.0);
//! ```
//!
//! Both directions round half away from zero to whole units. After one round
//! trip a value is a fixed point: `to_points(to_pixels(p)) == p` for any
//! integral `p`, so re-editing an offset never drifts.

/// Points per CSS pixel.
pub const PT_PER_PX: f64 = 0.75;

/// A4 width in points.
pub const A4_WIDTH_PT: f64 = 595.28;

/// A4 height in points.
pub const A4_HEIGHT_PT: f64 = 841.89;

/// Convert a stored pixel offset to whole points.
#[inline]
pub fn to_points(pixels: f64) -> f64 {
    (pixels * PT_PER_PX).round()
}

/// Convert whole points back to a pixel offset.
#[inline]
pub fn to_pixels(points: f64) -> f64 {
    (points / PT_PER_PX).round()
}

/// Scale layout geometry (not user offsets) to points without rounding.
#[inline]
pub fn scale_to_points(pixels: f64) -> f64 {
    pixels * PT_PER_PX
}
