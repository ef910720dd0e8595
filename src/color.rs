// Color math for group tinting
//
// Pixel filtering, per-image means, and the mean-of-means reduction that
// turns a set of favicon-sized images into one representative color.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Result, TabTintError};

static RGB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})").unwrap());
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap());

/// An 8-bit RGB triple. Displays as `rgb(R, G, B)`, the form persisted in
/// the colors document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Parse a CSS color string. Accepts `rgb(R, G, B)`, `rgba(R, G, B, A)`
    /// (alpha ignored) and `#rrggbb`.
    pub fn parse(text: &str) -> Result<Rgb> {
        let text = text.trim();
        if let Some(caps) = RGB_RE.captures(text) {
            let channel = |i: usize| -> Result<u8> {
                caps[i]
                    .parse::<u16>()
                    .ok()
                    .filter(|v| *v <= 255)
                    .map(|v| v as u8)
                    .ok_or_else(|| TabTintError::InvalidColor(text.to_string()))
            };
            return Ok(Rgb::new(channel(1)?, channel(2)?, channel(3)?));
        }
        if let Some(caps) = HEX_RE.captures(text) {
            let channel = |i: usize| -> Result<u8> {
                u8::from_str_radix(&caps[i], 16)
                    .map_err(|_| TabTintError::InvalidColor(text.to_string()))
            };
            return Ok(Rgb::new(channel(1)?, channel(2)?, channel(3)?));
        }
        Err(TabTintError::InvalidColor(text.to_string()))
    }

    /// Relative luminance in [0, 1] using the sRGB coefficients.
    pub fn luminance(&self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }

    /// Text color with readable contrast against this background:
    /// "black" on light colors, "white" on dark ones.
    pub fn contrast_color(&self) -> &'static str {
        if self.luminance() > 0.5 {
            "black"
        } else {
            "white"
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Mean color of the qualifying pixels in a raw RGBA8 buffer.
///
/// A pixel qualifies when its alpha exceeds `alpha_threshold` (visible)
/// and its channel sum exceeds `darkness_threshold` (not near-black).
/// Returns None when no pixel qualifies.
pub fn sample_rgba_pixels(data: &[u8], alpha_threshold: u8, darkness_threshold: u32) -> Option<Rgb> {
    let mut r = 0u64;
    let mut g = 0u64;
    let mut b = 0u64;
    let mut count = 0u64;

    for px in data.chunks_exact(4) {
        let sum = px[0] as u32 + px[1] as u32 + px[2] as u32;
        if px[3] > alpha_threshold && sum > darkness_threshold {
            r += px[0] as u64;
            g += px[1] as u64;
            b += px[2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    Some(Rgb::new(
        round_div(r, count),
        round_div(g, count),
        round_div(b, count),
    ))
}

/// Unweighted mean of per-image mean colors. None for an empty slice.
pub fn average_colors(colors: &[Rgb]) -> Option<Rgb> {
    if colors.is_empty() {
        return None;
    }
    let n = colors.len() as u64;
    let r: u64 = colors.iter().map(|c| c.r as u64).sum();
    let g: u64 = colors.iter().map(|c| c.g as u64).sum();
    let b: u64 = colors.iter().map(|c| c.b as u64).sum();
    Some(Rgb::new(round_div(r, n), round_div(g, n), round_div(b, n)))
}

fn round_div(sum: u64, count: u64) -> u8 {
    ((sum + count / 2) / count) as u8
}
