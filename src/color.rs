//! RGB colors for surface appearance

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Standard 16 ANSI colors, then the 6x6x6 cube and the grayscale ramp
    pub fn from_ansi_index(index: u8) -> Self {
        match index {
            0 => Self::new(0, 0, 0),        // Black
            1 => Self::new(205, 49, 49),    // Red
            2 => Self::new(13, 188, 121),   // Green
            3 => Self::new(229, 229, 16),   // Yellow
            4 => Self::new(36, 114, 200),   // Blue
            5 => Self::new(188, 63, 188),   // Magenta
            6 => Self::new(17, 168, 205),   // Cyan
            7 => Self::new(229, 229, 229),  // White
            8 => Self::new(102, 102, 102),  // Bright Black
            9 => Self::new(241, 76, 76),    // Bright Red
            10 => Self::new(35, 209, 139),  // Bright Green
            11 => Self::new(245, 245, 67),  // Bright Yellow
            12 => Self::new(59, 142, 234),  // Bright Blue
            13 => Self::new(214, 112, 214), // Bright Magenta
            14 => Self::new(41, 184, 219),  // Bright Cyan
            15 => Self::new(229, 229, 229), // Bright White

            16..=231 => {
                let index = index - 16;
                let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
                Self::new(level(index / 36), level((index / 6) % 6), level(index % 6))
            }

            232..=255 => {
                let gray = 8 + (index - 232) * 10;
                Self::new(gray, gray, gray)
            }
        }
    }
}

/// Error returned when a `#rrggbb` string is malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|hex| hex.len() == 6 && hex.is_ascii())
            .ok_or_else(|| ParseColorError(s.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}
