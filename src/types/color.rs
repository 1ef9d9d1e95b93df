//! RGB, RGBW, and RGBWW color representations.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::Error;

/// Accept a channel value in `[0, 256)`.
pub(crate) fn channel(value: i32) -> Option<u8> {
    u8::try_from(value).ok()
}

fn parse_channels(s: &str, expected: usize, format: &str) -> Result<Vec<u8>, Error> {
    let parts = s
        .split(',')
        .map(|c| c.trim().parse::<i32>().ok().and_then(channel))
        .collect::<Option<Vec<u8>>>()
        .filter(|parts| parts.len() == expected);
    parts.ok_or_else(|| Error::InvalidColorString(format!("{s:?}; expected format: {format}")))
}

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a color from untrusted channel values.
    ///
    /// Returns `None` unless every channel is in `[0, 256)`.
    ///
    /// ```
    /// use wiz_pilot::Color;
    ///
    /// assert!(Color::create(0, 128, 255).is_some());
    /// assert!(Color::create(256, 0, 0).is_none());
    /// assert!(Color::create(0, -1, 0).is_none());
    /// ```
    pub fn create(red: i32, green: i32, blue: i32) -> Option<Self> {
        Some(Self::rgb(channel(red)?, channel(green)?, channel(blue)?))
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parse from comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = parse_channels(s, 3, "r,g,b")?;
        Ok(Self::rgb(parts[0], parts[1], parts[2]))
    }
}

/// An RGBW color (RGB + warm white, 0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ColorRGBW {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub warm: u8,
}

impl ColorRGBW {
    pub fn new(red: u8, green: u8, blue: u8, warm: u8) -> Self {
        Self {
            red,
            green,
            blue,
            warm,
        }
    }

    pub fn to_rgb(&self) -> Color {
        Color::rgb(self.red, self.green, self.blue)
    }
}

impl FromStr for ColorRGBW {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = parse_channels(s, 4, "r,g,b,w")?;
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

/// An RGBWW color (RGB + cool white + warm white, 0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ColorRGBWW {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub cool: u8,
    pub warm: u8,
}

impl ColorRGBWW {
    pub fn new(red: u8, green: u8, blue: u8, cool: u8, warm: u8) -> Self {
        Self {
            red,
            green,
            blue,
            cool,
            warm,
        }
    }

    pub fn to_rgb(&self) -> Color {
        Color::rgb(self.red, self.green, self.blue)
    }
}

impl FromStr for ColorRGBWW {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = parse_channels(s, 5, "r,g,b,c,w")?;
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3], parts[4]))
    }
}
