//! Animation speed for dynamic scenes.

use serde::{Deserialize, Serialize};

/// Animation speed for dynamic scenes, from 10 to 200 percent.
///
/// Speed only affects scenes with animation (like Party, Ocean, etc.).
/// A value of 100 is the default speed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Speed {
    pub(crate) value: u8,
}

impl Speed {
    pub(crate) const MIN: i32 = 10;
    pub(crate) const MAX: i32 = 200;

    /// Get the speed value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a new Speed with the given value.
    ///
    /// Returns `None` if value is outside the valid range (10-200).
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::Speed;
    ///
    /// assert!(Speed::create(9).is_none());
    /// assert!(Speed::create(10).is_some());
    /// assert!(Speed::create(200).is_some());
    /// assert!(Speed::create(201).is_none());
    /// ```
    pub fn create(value: i32) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Speed { value: value as u8 })
        } else {
            None
        }
    }
}
