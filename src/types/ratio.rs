//! Ratio control for dual-head fixtures.

use serde::{Deserialize, Serialize};

/// Ratio for dual-head fixtures, controlling the balance between up and down lights.
///
/// Valid values are 0 to 100, where:
/// - 0 = all light directed downward
/// - 50 = balanced between up and down
/// - 100 = all light directed upward
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct Ratio {
    pub(crate) value: u8,
}

impl Ratio {
    const MAX: i32 = 100;

    /// Get the ratio value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a new Ratio with the given value.
    ///
    /// Returns `None` if value is outside 0-100.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiz_pilot::Ratio;
    ///
    /// assert!(Ratio::create(0).is_some());
    /// assert!(Ratio::create(100).is_some());
    /// assert!(Ratio::create(101).is_none());
    /// assert!(Ratio::create(-1).is_none());
    /// ```
    pub fn create(value: i32) -> Option<Self> {
        if (0..=Self::MAX).contains(&value) {
            Some(Ratio { value: value as u8 })
        } else {
            None
        }
    }
}
