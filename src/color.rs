//! Hex color parsing and the small amount of color math the renderers need.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Accepted hex color syntax: `#RGB` or `#RRGGBB`.
pub static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hex color pattern is valid")
});

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RGB` or `#RRGGBB`. Returns `None` for anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        if !is_hex_color(s) {
            return None;
        }
        let digits = &s[1..];
        let channel = |i: usize, len: usize| -> Option<u8> {
            let part = &digits[i * len..(i + 1) * len];
            let v = u8::from_str_radix(part, 16).ok()?;
            Some(if len == 1 { v * 17 } else { v })
        };
        let len = digits.len() / 3;
        Some(Self::new(channel(0, len)?, channel(1, len)?, channel(2, len)?))
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Add `delta` to every channel, clamped to [0, 255].
    pub fn shift(self, delta: i16) -> Self {
        let f = |c: u8| (c as i16 + delta).clamp(0, 255) as u8;
        Self::new(f(self.r), f(self.g), f(self.b))
    }

    pub fn lighten(self, delta: u8) -> Self {
        self.shift(delta as i16)
    }

    pub fn darken(self, delta: u8) -> Self {
        self.shift(-(delta as i16))
    }

    /// Channels as 0.0–1.0 floats, the form PDF color operators take.
    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }

    /// Squared Euclidean distance in RGB space.
    pub fn distance_sq(self, other: Rgb) -> u32 {
        let d = |a: u8, b: u8| {
            let v = a as i32 - b as i32;
            (v * v) as u32
        };
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// True when `s` is a `#RGB` or `#RRGGBB` hex color.
pub fn is_hex_color(s: &str) -> bool {
    HEX_COLOR.is_match(s)
}

/// Parse a settings color, falling back to `fallback` for invalid input.
///
/// Settings are validated at the edit boundary, so the fallback only
/// matters for hand-written JSON that skipped validation.
pub fn parse_or(s: &str, fallback: Rgb) -> Rgb {
    Rgb::from_hex(s).unwrap_or(fallback)
}
