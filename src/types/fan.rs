//! Fan control types for fan-equipped Wiz fixtures.
//!
//! The bulb takes each of these as a small integer; the enums make the
//! out of range codes unrepresentable.

/// Fan power state (`fanState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanState {
    #[default]
    Off = 0,
    On = 1,
}

impl FanState {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<bool> for FanState {
    fn from(on: bool) -> Self {
        if on { FanState::On } else { FanState::Off }
    }
}

/// Fan operating mode (`fanMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanMode {
    #[default]
    Normal = 1,
    Breeze = 2,
}

impl FanMode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Fan rotation direction (`fanRevrs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanDirection {
    #[default]
    Forward = 0,
    Reverse = 1,
}

impl FanDirection {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Fan speed, from 1 up to the fixture's advertised maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanSpeed {
    pub(crate) value: u8,
}

impl FanSpeed {
    /// Maximum speed assumed when the fixture has not reported one.
    pub const DEFAULT_MAX: u8 = 6;

    /// Create a fan speed. Returns None if out of range (1 to max_speed).
    ///
    /// ```
    /// use wiz_pilot::FanSpeed;
    ///
    /// assert!(FanSpeed::create(6, None).is_some());
    /// assert!(FanSpeed::create(7, None).is_none());
    /// assert!(FanSpeed::create(8, Some(10)).is_some());
    /// assert!(FanSpeed::create(0, Some(10)).is_none());
    /// ```
    pub fn create(value: i32, max_speed: Option<u8>) -> Option<Self> {
        let max = i32::from(max_speed.unwrap_or(Self::DEFAULT_MAX));
        if (1..=max).contains(&value) {
            Some(FanSpeed { value: value as u8 })
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.value
    }
}
