//! Building `setPilot` / `setState` requests.

use serde::Serialize;

use crate::errors::Error;
use crate::message::{Command, Method};
use crate::rgbcw;
use crate::types::{
    Brightness, Color, ColorRGBW, ColorRGBWW, FanDirection, FanMode, FanSpeed, FanState,
    HueSaturation, Kelvin, Ratio, SceneMode, Speed, White, channel,
};

/// The `params` object of a `setPilot` or `setState` request.
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Clone, PartialEq)]
pub struct Payload {
    pub(crate) state: Option<bool>,
    pub(crate) speed: Option<u8>,
    pub(crate) ratio: Option<u8>,
    #[serde(rename = "sceneId")]
    pub(crate) scene: Option<u16>,
    pub(crate) dimming: Option<u8>,
    #[serde(rename = "r")]
    pub(crate) red: Option<u8>,
    #[serde(rename = "g")]
    pub(crate) green: Option<u8>,
    #[serde(rename = "b")]
    pub(crate) blue: Option<u8>,
    #[serde(rename = "c")]
    pub(crate) cool: Option<u8>,
    #[serde(rename = "w")]
    pub(crate) warm: Option<u8>,
    pub(crate) temp: Option<u16>,
    #[serde(rename = "fanState")]
    pub(crate) fan_state: Option<u8>,
    #[serde(rename = "fanMode")]
    pub(crate) fan_mode: Option<u8>,
    #[serde(rename = "fanSpeed")]
    pub(crate) fan_speed: Option<u8>,
    #[serde(rename = "fanRevrs")]
    pub(crate) fan_reverse: Option<u8>,
}

impl Payload {
    fn color(&mut self, color: Color) {
        self.red = Some(color.red);
        self.green = Some(color.green);
        self.blue = Some(color.blue);
    }
}

/// Validated settings for one `setPilot` or `setState` request.
///
/// Every setter validates its argument and fails with
/// [`Error::OutOfRange`] (or [`Error::SceneNotAvailable`]) before anything
/// is sent. At most one color directive ends up in the request: when
/// several are set, `rgb` wins over `rgbw`, then `rgbww`, then `colortemp`,
/// then `hucolor`. Explicit white channel values are applied last and
/// override whatever the directive computed.
///
/// ```
/// use serde_json::json;
/// use wiz_pilot::PilotBuilder;
///
/// let builder = PilotBuilder::new().rgb(0, 128, 255)?.brightness(255)?.colortemp(2700);
/// let params = serde_json::to_value(builder.params())?;
/// assert_eq!(params, json!({"dimming": 100, "r": 0, "g": 127, "b": 255, "w": 34}));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct PilotBuilder {
    state: Option<bool>,
    speed: Option<Speed>,
    ratio: Option<Ratio>,
    scene: Option<SceneMode>,
    brightness: Option<Brightness>,
    rgb: Option<Color>,
    rgbw: Option<ColorRGBW>,
    rgbww: Option<ColorRGBWW>,
    colortemp: Option<Kelvin>,
    hucolor: Option<HueSaturation>,
    warm_white: Option<White>,
    cold_white: Option<White>,
    fan_state: Option<FanState>,
    fan_mode: Option<FanMode>,
    fan_speed: Option<FanSpeed>,
    fan_direction: Option<FanDirection>,
}

fn checked_channel(field: &'static str, value: i32) -> Result<u8, Error> {
    channel(value).ok_or_else(|| Error::out_of_range(field, "must be between 0 and 255"))
}

impl PilotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the light on or off.
    pub fn state(mut self, on: bool) -> Self {
        self.state = Some(on);
        self
    }

    /// Animation speed of the active scene, 10 to 200.
    pub fn speed(mut self, speed: i32) -> Result<Self, Error> {
        let speed = Speed::create(speed).ok_or_else(|| {
            Error::out_of_range("speed", format!("must be between {} and {}", Speed::MIN, Speed::MAX))
        })?;
        self.speed = Some(speed);
        Ok(self)
    }

    /// Up/down balance of a dual-head fixture, 0 to 100.
    pub fn ratio(mut self, ratio: i32) -> Result<Self, Error> {
        let ratio = Ratio::create(ratio)
            .ok_or_else(|| Error::out_of_range("ratio", "must be between 0 and 100"))?;
        self.ratio = Some(ratio);
        Ok(self)
    }

    /// Run the scene with the given id.
    pub fn scene(mut self, scene_id: u16) -> Result<Self, Error> {
        let scene = SceneMode::create(scene_id).ok_or(Error::SceneNotAvailable(scene_id))?;
        self.scene = Some(scene);
        Ok(self)
    }

    pub fn scene_mode(mut self, scene: SceneMode) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Brightness on the 0-255 scale; see [`Brightness::from_hex`].
    pub fn brightness(mut self, value: i32) -> Result<Self, Error> {
        let brightness = Brightness::from_hex(value)
            .ok_or_else(|| Error::out_of_range("brightness", "must be between 0 and 255"))?;
        self.brightness = Some(brightness);
        Ok(self)
    }

    /// An RGB color, re-balanced into RGB plus warm white before sending.
    pub fn rgb(mut self, red: i32, green: i32, blue: i32) -> Result<Self, Error> {
        self.rgb = Some(Color::rgb(
            checked_channel("red", red)?,
            checked_channel("green", green)?,
            checked_channel("blue", blue)?,
        ));
        Ok(self)
    }

    /// Raw RGB and warm white channels.
    pub fn rgbw(mut self, red: i32, green: i32, blue: i32, warm: i32) -> Result<Self, Error> {
        self.rgbw = Some(ColorRGBW::new(
            checked_channel("red", red)?,
            checked_channel("green", green)?,
            checked_channel("blue", blue)?,
            checked_channel("warm_white", warm)?,
        ));
        Ok(self)
    }

    /// Raw RGB, cold white and warm white channels.
    pub fn rgbww(
        mut self,
        red: i32,
        green: i32,
        blue: i32,
        cold: i32,
        warm: i32,
    ) -> Result<Self, Error> {
        self.rgbww = Some(ColorRGBWW::new(
            checked_channel("red", red)?,
            checked_channel("green", green)?,
            checked_channel("blue", blue)?,
            checked_channel("cold_white", cold)?,
            checked_channel("warm_white", warm)?,
        ));
        Ok(self)
    }

    /// Color temperature, clamped into 1000-10000 K.
    pub fn colortemp(mut self, kelvin: i32) -> Self {
        self.colortemp = Some(Kelvin::clamped(kelvin));
        self
    }

    /// Hue in degrees and saturation in percent.
    pub fn hucolor(mut self, hue: f64, saturation: f64) -> Result<Self, Error> {
        let hs = HueSaturation::create(hue, saturation).ok_or_else(|| {
            Error::out_of_range("hucolor", "hue must be 0-360 and saturation 0-100")
        })?;
        self.hucolor = Some(hs);
        Ok(self)
    }

    pub fn warm_white(mut self, value: i32) -> Result<Self, Error> {
        let white = White::create(value)
            .ok_or_else(|| Error::out_of_range("warm_white", "must be between 0 and 255"))?;
        self.warm_white = Some(white);
        Ok(self)
    }

    pub fn cold_white(mut self, value: i32) -> Result<Self, Error> {
        let white = White::create(value)
            .ok_or_else(|| Error::out_of_range("cold_white", "must be between 0 and 255"))?;
        self.cold_white = Some(white);
        Ok(self)
    }

    pub fn fan_state(mut self, state: FanState) -> Self {
        self.fan_state = Some(state);
        self
    }

    pub fn fan_mode(mut self, mode: FanMode) -> Self {
        self.fan_mode = Some(mode);
        self
    }

    pub fn fan_direction(mut self, direction: FanDirection) -> Self {
        self.fan_direction = Some(direction);
        self
    }

    /// Fan speed from 1 to `max_speed` (6 when the fixture has not said).
    pub fn fan_speed(mut self, speed: i32, max_speed: Option<u8>) -> Result<Self, Error> {
        let max = max_speed.unwrap_or(FanSpeed::DEFAULT_MAX);
        let speed = FanSpeed::create(speed, Some(max))
            .ok_or_else(|| Error::out_of_range("fan_speed", format!("must be between 1 and {max}")))?;
        self.fan_speed = Some(speed);
        Ok(self)
    }

    /// Resolve the settings into the request parameters.
    pub fn params(&self) -> Payload {
        let mut payload = Payload {
            state: self.state,
            speed: self.speed.map(|s| s.value),
            ratio: self.ratio.map(|r| r.value),
            scene: self.scene.map(|s| s.id()),
            dimming: self.brightness.map(|b| b.percent),
            fan_state: self.fan_state.map(FanState::value),
            fan_mode: self.fan_mode.map(FanMode::value),
            fan_speed: self.fan_speed.map(FanSpeed::value),
            fan_reverse: self.fan_direction.map(FanDirection::value),
            ..Payload::default()
        };

        if let Some(color) = self.rgb {
            let (color, white) = rgbcw::rgb_to_rgbcw(color);
            payload.color(color);
            payload.warm = Some(white);
        } else if let Some(rgbw) = self.rgbw {
            payload.color(rgbw.to_rgb());
            payload.warm = Some(rgbw.warm);
        } else if let Some(rgbww) = self.rgbww {
            payload.color(rgbww.to_rgb());
            payload.cool = Some(rgbww.cool);
            payload.warm = Some(rgbww.warm);
        } else if let Some(kelvin) = self.colortemp {
            payload.temp = Some(kelvin.kelvin);
        } else if let Some(hs) = self.hucolor {
            let (color, white) = hs.to_rgbcw();
            payload.color(color);
            payload.warm = Some(white);
        }

        if let Some(warm) = self.warm_white {
            payload.warm = Some(warm.value);
        }
        if let Some(cold) = self.cold_white {
            payload.cool = Some(cold.value);
        }
        payload
    }

    fn message(&self, method: Method, state: Option<bool>) -> Result<Command, Error> {
        let mut payload = self.params();
        if state.is_some() {
            payload.state = state;
        }
        Command::with_params(method, &payload)
    }

    /// A `setPilot` request, optionally forcing the on/off state.
    pub fn set_pilot_message(&self, state: Option<bool>) -> Result<Command, Error> {
        self.message(Method::SetPilot, state)
    }

    /// A `setState` request, optionally forcing the on/off state.
    pub fn set_state_message(&self, state: Option<bool>) -> Result<Command, Error> {
        self.message(Method::SetState, state)
    }
}
