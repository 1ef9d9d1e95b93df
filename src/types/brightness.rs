//! Brightness control for Wiz bulbs.
//!
//! Callers speak the 0-255 scale used by most home automation front ends;
//! the bulb itself takes a `dimming` percentage.

use serde::{Deserialize, Serialize};

/// Convert a 0-255 brightness to a percentage, rounding to nearest.
///
/// ```
/// use wiz_pilot::hex_to_percent;
///
/// assert_eq!(hex_to_percent(26), 10);
/// assert_eq!(hex_to_percent(255), 100);
/// ```
pub fn hex_to_percent(hex: i32) -> i32 {
    (f64::from(hex) / 255.0 * 100.0).round() as i32
}

/// Convert a percentage to a 0-255 brightness, rounding to nearest.
///
/// ```
/// use wiz_pilot::percent_to_hex;
///
/// assert_eq!(percent_to_hex(10), 26);
/// assert_eq!(percent_to_hex(100), 255);
/// ```
pub fn percent_to_hex(percent: i32) -> i32 {
    (f64::from(percent) / 100.0 * 255.0).round() as i32
}

/// Dimming level sent to the bulb, from 10 to 100 percent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Brightness {
    pub(crate) percent: u8,
}

impl Brightness {
    const MIN: i32 = 10;
    const MAX: i32 = 100;

    /// Create a brightness from a 0-255 value.
    ///
    /// Values that round below 10% are raised to the 10% floor the bulbs
    /// accept; returns `None` when the value rounds above 100%.
    ///
    /// ```
    /// use wiz_pilot::Brightness;
    ///
    /// assert_eq!(Brightness::from_hex(255).unwrap().percent(), 100);
    /// assert_eq!(Brightness::from_hex(10).unwrap().percent(), 10);
    /// assert_eq!(Brightness::from_hex(0).unwrap().percent(), 10);
    /// assert!(Brightness::from_hex(300).is_none());
    /// ```
    pub fn from_hex(value: i32) -> Option<Self> {
        let percent = hex_to_percent(value);
        if percent > Self::MAX {
            return None;
        }
        Some(Brightness {
            percent: percent.max(Self::MIN) as u8,
        })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// The brightness on the 0-255 scale.
    pub fn hex(&self) -> u8 {
        percent_to_hex(i32::from(self.percent)) as u8
    }
}
