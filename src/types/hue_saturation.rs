//! Hue and Saturation color representation.

use super::Color;
use crate::rgbcw;

/// Hue and Saturation color representation.
///
/// - Hue: The color angle on the color wheel (0-360 degrees)
/// - Saturation: The intensity of the color (0-100 percent)
///
/// Low saturations are rendered by mixing in the bulb's white LEDs rather
/// than by desaturating the RGB channels, see [`HueSaturation::to_rgbcw`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HueSaturation {
    hue: f64,
    saturation: f64,
}

impl HueSaturation {
    /// Create a new HueSaturation with the given values.
    ///
    /// Returns `None` if values are outside valid ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::HueSaturation;
    ///
    /// assert!(HueSaturation::create(0.0, 100.0).is_some());
    /// assert!(HueSaturation::create(120.0, 50.0).is_some());
    /// assert!(HueSaturation::create(361.0, 50.0).is_none());
    /// assert!(HueSaturation::create(180.0, 101.0).is_none());
    /// ```
    pub fn create(hue: f64, saturation: f64) -> Option<Self> {
        if (0.0..=360.0).contains(&hue) && (0.0..=100.0).contains(&saturation) {
            Some(HueSaturation { hue, saturation })
        } else {
            None
        }
    }

    pub fn hue(&self) -> f64 {
        self.hue
    }

    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Convert to the RGB channels and the shared white channel.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::{Color, HueSaturation};
    ///
    /// let (color, white) = HueSaturation::create(100.0, 50.0).unwrap().to_rgbcw();
    /// assert_eq!(color, Color::rgb(88, 255, 0));
    /// assert_eq!(white, 128);
    /// ```
    pub fn to_rgbcw(&self) -> (Color, u8) {
        rgbcw::hs_to_rgbcw(self.hue, self.saturation)
    }
}
