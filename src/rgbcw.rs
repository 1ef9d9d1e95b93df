//! Mapping between hue/saturation and the bulb's RGB plus white channels.
//!
//! Wiz RGB bulbs render pastel colors by adding white light rather than by
//! desaturating the RGB LEDs. The model places the three primaries on a
//! plane as unit vectors 120 degrees apart: a color's hue is the direction
//! of the weighted sum of the primaries, its saturation is that sum's
//! length. Saturated colors (0.5 and above) keep the RGB channels at full
//! strength and fade the white channel in as saturation drops; below 0.5
//! the white channel is at full strength and the RGB channels fade out.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::errors::Error;
use crate::types::{Color, channel};

/// Full strength of the white channel.
pub const CW_MAX: u8 = 128;

const EPSILON: f64 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vec2 {
    x: f64,
    y: f64,
}

impl Vec2 {
    const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    fn from_angle(radians: f64) -> Self {
        Vec2 {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Length, or zero for vectors too short to have a direction.
    fn len(self) -> f64 {
        let len_sq = self.dot(self);
        if len_sq > EPSILON { len_sq.sqrt() } else { 0.0 }
    }

    fn normalized(self) -> Self {
        let len = self.len();
        if len > EPSILON { self * (1.0 / len) } else { self }
    }

    /// Angle from the red axis in degrees, in `[0, 360)`.
    fn degrees(self) -> f64 {
        let mut radians = self.y.atan2(self.x);
        if radians < 0.0 {
            radians += 2.0 * PI;
        }
        radians.to_degrees()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, factor: f64) -> Vec2 {
        Vec2 {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

/// Red, green and blue directions.
fn basis() -> [Vec2; 3] {
    [
        Vec2::from_angle(0.0),
        Vec2::from_angle(2.0 * PI / 3.0),
        Vec2::from_angle(4.0 * PI / 3.0),
    ]
}

fn hue_vector(rgb: [f64; 3]) -> Vec2 {
    basis()
        .iter()
        .zip(rgb)
        .fold(Vec2::ZERO, |sum, (axis, amount)| sum + *axis * amount)
}

/// Split a unit hue vector and a saturation in `[0, 1]` into RGB and white.
fn trapezoid(hue: Vec2, saturation: f64) -> (Color, u8) {
    let mut rgb = [0.0; 3];
    if saturation > EPSILON {
        let axes = basis();
        let threshold = (2.0 * PI / 3.0 - EPSILON).cos();
        let active: Vec<usize> = (0..3).filter(|&i| hue.dot(axes[i]) > threshold).collect();

        match active[..] {
            [first, second] => {
                let (a, b) = (axes[first], axes[second]);
                // Decompose the hue along the two neighbouring primaries.
                let normal = Vec2 { x: b.y, y: -b.x };
                let along_a = hue.dot(normal) / a.dot(normal);
                let along_b = (hue - a * along_a).dot(b);
                let peak = along_a.max(along_b);
                rgb[first] = (along_a / peak).min(1.0);
                rgb[second] = (along_b / peak).min(1.0);
            }
            _ => {
                for i in active {
                    rgb[i] = 1.0;
                }
            }
        }
    }

    let white = if saturation >= 0.5 {
        1.0 - (saturation - 0.5) * 2.0
    } else {
        rgb.iter_mut().for_each(|c| *c *= saturation * 2.0);
        1.0
    };

    let [red, green, blue] = rgb.map(|c| (c * 255.0) as u8);
    let white = (white * f64::from(CW_MAX)).max(0.0) as u8;
    (Color::rgb(red, green, blue), white)
}

/// Re-balance an RGB color into the RGB plus white form the bulb renders.
///
/// ```
/// use wiz_pilot::{Color, rgbcw};
///
/// assert_eq!(rgbcw::rgb_to_rgbcw(Color::rgb(0, 128, 255)), (Color::rgb(0, 127, 255), 34));
/// ```
pub fn rgb_to_rgbcw(color: Color) -> (Color, u8) {
    let scaled = [color.red(), color.green(), color.blue()].map(|c| f64::from(c) / 255.0);
    let hue = hue_vector(scaled);
    let saturation = hue.len();
    let hue = if saturation > EPSILON {
        hue.normalized()
    } else {
        hue
    };
    trapezoid(hue, saturation)
}

/// Convert hue in degrees and saturation in percent to RGB plus white.
///
/// Hues wrap, so 360 is the same as 0.
pub fn hs_to_rgbcw(hue: f64, saturation: f64) -> (Color, u8) {
    let turns = (hue / 360.0).rem_euclid(1.0);
    let hue = Vec2::from_angle(turns * 2.0 * PI);
    trapezoid(hue, saturation / 100.0)
}

/// Recover hue in degrees and saturation in percent from RGB plus white.
///
/// White values above [`CW_MAX`] count as full white.
pub fn rgbcw_to_hs(color: Color, white: u8) -> (f64, f64) {
    let scaled = [color.red(), color.green(), color.blue()].map(|c| f64::from(c) / 255.0);
    let hue = hue_vector(scaled);
    let white = f64::from(white.min(CW_MAX)) / f64::from(CW_MAX);
    let saturation = if white == 1.0 {
        hue.len() * 0.5
    } else {
        1.0 - white / 2.0
    };
    (hue.degrees(), saturation * 100.0)
}

/// [`rgbcw_to_hs`] for channel values that have not been validated yet.
pub fn convert_hs_from_rgbcw(red: i32, green: i32, blue: i32, white: i32) -> Result<(f64, f64), Error> {
    let checked = |field: &'static str, value: i32| {
        channel(value).ok_or_else(|| Error::out_of_range(field, "must be between 0 and 255"))
    };
    let color = Color::rgb(
        checked("red", red)?,
        checked("green", green)?,
        checked("blue", blue)?,
    );
    Ok(rgbcw_to_hs(color, checked("white", white)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hue_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn test_primaries() {
        assert_eq!(rgb_to_rgbcw(Color::rgb(255, 0, 0)), (Color::rgb(255, 0, 0), 0));
        assert_eq!(hs_to_rgbcw(0.0, 100.0), (Color::rgb(255, 0, 0), 0));
        assert_eq!(rgbcw_to_hs(Color::rgb(255, 0, 0), 0), (0.0, 100.0));
    }

    #[test]
    fn test_achromatic_input_is_all_white() {
        assert_eq!(rgb_to_rgbcw(Color::rgb(128, 128, 128)), (Color::rgb(0, 0, 0), CW_MAX));
        assert_eq!(hs_to_rgbcw(200.0, 0.0), (Color::rgb(0, 0, 0), CW_MAX));
    }

    #[test]
    fn test_hue_wraps() {
        assert_eq!(hs_to_rgbcw(360.0, 100.0), hs_to_rgbcw(0.0, 100.0));
        assert_eq!(hs_to_rgbcw(720.0, 80.0), hs_to_rgbcw(0.0, 80.0));
        assert_eq!(hs_to_rgbcw(-360.0, 100.0), hs_to_rgbcw(0.0, 100.0));
    }

    #[test]
    fn test_huge_hues_return() {
        assert_eq!(hs_to_rgbcw(1.0e18, 50.0).1, CW_MAX);
        assert_eq!(hs_to_rgbcw(f64::INFINITY, 100.0).1, 0);
        assert_eq!(hs_to_rgbcw(f64::MAX, 100.0).1, 0);
    }

    #[test]
    fn test_continuous_at_half_saturation() {
        for hue in [0.0, 45.0, 100.0, 200.0, 300.0] {
            let (above, white_above) = hs_to_rgbcw(hue, 50.0);
            let (below, white_below) = hs_to_rgbcw(hue, 49.999);
            assert!(above.red().abs_diff(below.red()) <= 1);
            assert!(above.green().abs_diff(below.green()) <= 1);
            assert!(above.blue().abs_diff(below.blue()) <= 1);
            assert_eq!(white_above, white_below);
        }
    }

    #[test]
    fn test_rgb_round_trip_preserves_hue() {
        for red in (0..=255).step_by(15) {
            for green in (0..=255).step_by(15) {
                for blue in (0..=255).step_by(15) {
                    let color = Color::rgb(red, green, blue);
                    let scaled = [red, green, blue].map(|c| f64::from(c) / 255.0);
                    let input = hue_vector(scaled);
                    if input.len() < 0.1 {
                        continue;
                    }

                    let (rgb, white) = rgb_to_rgbcw(color);
                    let (hue, _) = rgbcw_to_hs(rgb, white);
                    assert!(
                        hue_distance(hue, input.degrees()) < 3.0,
                        "{color:?} -> {rgb:?} gave hue {hue}, expected {}",
                        input.degrees()
                    );
                }
            }
        }
    }

    #[test]
    fn test_saturation_is_recovered() {
        let (rgb, white) = hs_to_rgbcw(240.0, 75.0);
        let (_, saturation) = rgbcw_to_hs(rgb, white);
        assert!((saturation - 75.0).abs() < 1.0);

        let (rgb, white) = hs_to_rgbcw(240.0, 30.0);
        let (_, saturation) = rgbcw_to_hs(rgb, white);
        assert!((saturation - 30.0).abs() < 1.0);
    }

    #[test]
    fn test_rejects_out_of_range_channels() {
        assert_eq!(
            convert_hs_from_rgbcw(300, 0, 0, 0).unwrap_err(),
            Error::out_of_range("red", "must be between 0 and 255")
        );
        assert!(convert_hs_from_rgbcw(0, 0, 0, -1).is_err());
        assert!(convert_hs_from_rgbcw(255, 0, 0, 0).is_ok());
    }
}
