//! Colors and text styling

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Family name that resolves to the font book's fallback face.
pub const DEFAULT_FONT_FAMILY: &str = "default";

/// Straight-alpha RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` or
    /// `rgba(r, g, b, a)` where `a` is in `0..=1`.
    pub fn parse(s: &str) -> Option<Color> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let (body, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = s.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return None;
        };

        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != if has_alpha { 4 } else { 3 } {
            return None;
        }
        let channel = |p: &str| p.parse::<f64>().ok().map(|v| v.round().clamp(0.0, 255.0) as u8);
        let r = channel(parts[0])?;
        let g = channel(parts[1])?;
        let b = channel(parts[2])?;
        let a = if has_alpha {
            let a = parts[3].parse::<f64>().ok()?;
            (a.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            255
        };
        Some(Color { r, g, b, a })
    }

    /// Like [`Color::parse`] but unparseable input becomes black.
    pub fn from_css_lossy(s: &str) -> Color {
        Color::parse(s).unwrap_or(Color::BLACK)
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s).ok_or_else(|| Error::Validation(format!("unrecognised color '{s}'")))
    }
}

/// Stored colors never fail to load; unreadable ones become black.
impl From<String> for Color {
    fn from(s: String) -> Color {
        Color::parse(&s).unwrap_or_else(|| {
            log::warn!("color: unrecognised '{s}', using black");
            Color::BLACK
        })
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.to_string()
    }
}

/// Visual style of a title/subtitle element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_family: String,
    /// Font size in viewport pixels
    pub size: f64,
    pub color: Color,
    /// 0..=100
    pub opacity: u8,
    /// Stroke is disabled at 0
    pub stroke_width: f64,
    pub stroke_color: Color,
    /// Shadow is disabled at 0
    pub shadow_radius: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            size: 36.0,
            color: Color::WHITE,
            opacity: 100,
            stroke_width: 0.0,
            stroke_color: Color::BLACK,
            shadow_radius: 0.0,
        }
    }
}

impl TextStyle {
    pub fn has_stroke(&self) -> bool {
        self.stroke_width > 0.0
    }

    pub fn has_shadow(&self) -> bool {
        self.shadow_radius > 0.0
    }

    /// Opacity as a `0.0..=1.0` multiplier.
    pub fn alpha(&self) -> f32 {
        self.opacity.min(100) as f32 / 100.0
    }
}
