//! White LED channel control.

use serde::{Deserialize, Serialize};

use super::color::channel;

/// Raw intensity for the cold (`c`) or warm (`w`) white LED channel, 0-255.
///
/// Some Wiz bulbs have white LED channels that can be driven independently
/// of the RGB LEDs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct White {
    pub(crate) value: u8,
}

impl White {
    /// Get the white value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a new White with the given value.
    ///
    /// Returns `None` if value is outside `[0, 256)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::White;
    ///
    /// assert!(White::create(0).is_some());
    /// assert!(White::create(255).is_some());
    /// assert!(White::create(256).is_none());
    /// ```
    pub fn create(value: i32) -> Option<Self> {
        channel(value).map(|value| White { value })
    }
}
