//! Color temperature control.

use serde::{Deserialize, Serialize};

/// Color temperature in Kelvin, between 1000K and 10000K.
///
/// Lower values produce warmer (more yellow/orange) light, while higher
/// values produce cooler (more blue) light. Typical values:
/// - 2700K: Warm white (incandescent-like)
/// - 4000K: Neutral white
/// - 6500K: Daylight
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Kelvin {
    pub(crate) kelvin: u16,
}

impl Kelvin {
    const MIN: i32 = 1000;
    const MAX: i32 = 10000;

    /// Get the kelvin value.
    pub fn kelvin(&self) -> u16 {
        self.kelvin
    }

    /// Create a new Kelvin, clamping the value into 1000-10000.
    ///
    /// Bulbs clamp further to their own range, so out of range requests are
    /// not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::Kelvin;
    ///
    /// assert_eq!(Kelvin::clamped(500).kelvin(), 1000);
    /// assert_eq!(Kelvin::clamped(2700).kelvin(), 2700);
    /// assert_eq!(Kelvin::clamped(20000).kelvin(), 10000);
    /// ```
    pub fn clamped(kelvin: i32) -> Self {
        Kelvin {
            kelvin: kelvin.clamp(Self::MIN, Self::MAX) as u16,
        }
    }
}
