//! Bulb state as reported by `getPilot` replies and `syncPilot` pushes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rgbcw;
use crate::types::{Color, ColorRGBW, ColorRGBWW, SceneMode, percent_to_hex};

/// Keys that change on every report without the light itself changing.
const IGNORED_STATE_KEYS: [&str; 3] = ["mqttCd", "ts", "rssi"];

/// Scene id reported while a schedule preset (rhythm) is active.
const RHYTHM_SCENE_ID: i64 = 1000;

/// Sources whose reports are events in their own right (motion sensor and
/// WiZmote buttons), so they are forwarded even when nothing else changed.
const ALWAYS_SEND_SOURCES: [&str; 10] = [
    "pir", "wfa1", "wfa2", "wfa3", "wfa8", "wfa9", "wfa16", "wfa17", "wfa18", "wfa19",
];

/// A snapshot of a bulb's state.
///
/// The bulb decides which keys it reports, so this wraps the raw JSON object
/// and exposes typed accessors that return `None` for absent keys.
///
/// ```
/// use serde_json::json;
/// use wiz_pilot::Pilot;
///
/// let pilot = Pilot::from_value(json!({"state": true, "dimming": 50, "temp": 2700})).unwrap();
/// assert_eq!(pilot.state(), Some(true));
/// assert_eq!(pilot.brightness(), Some(128));
/// assert_eq!(pilot.colortemp(), Some(2700));
/// assert_eq!(pilot.rgb(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pilot(Map<String, Value>);

impl From<Map<String, Value>> for Pilot {
    fn from(map: Map<String, Value>) -> Self {
        Pilot(map)
    }
}

impl Pilot {
    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Pilot(map)),
            _ => None,
        }
    }

    /// The raw key/value pairs.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Overwrite keys with the ones in `params`.
    pub fn merge(&mut self, params: &Map<String, Value>) {
        for (key, value) in params {
            self.0.insert(key.clone(), value.clone());
        }
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn channel(&self, key: &str) -> Option<u8> {
        self.int(key).and_then(|v| u8::try_from(v).ok())
    }

    fn float_list(&self, key: &str) -> Option<Vec<f64>> {
        self.0
            .get(key)?
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }

    pub fn mac(&self) -> Option<&str> {
        self.0.get("mac").and_then(Value::as_str)
    }

    /// Where the last change came from (`udp`, `pir`, `wfa1`, ...).
    pub fn source(&self) -> Option<&str> {
        self.0.get("src").and_then(Value::as_str)
    }

    /// Whether the light is on.
    pub fn state(&self) -> Option<bool> {
        match self.0.get("state")? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            _ => None,
        }
    }

    /// The red, green and blue channels, when all three are reported.
    pub fn rgb(&self) -> Option<Color> {
        Some(Color::rgb(
            self.channel("r")?,
            self.channel("g")?,
            self.channel("b")?,
        ))
    }

    pub fn rgbw(&self) -> Option<ColorRGBW> {
        let rgb = self.rgb()?;
        Some(ColorRGBW::new(rgb.red(), rgb.green(), rgb.blue(), self.warm_white()?))
    }

    pub fn rgbww(&self) -> Option<ColorRGBWW> {
        let rgb = self.rgb()?;
        Some(ColorRGBWW::new(
            rgb.red(),
            rgb.green(),
            rgb.blue(),
            self.cold_white()?,
            self.warm_white()?,
        ))
    }

    pub fn warm_white(&self) -> Option<u8> {
        self.channel("w")
    }

    pub fn cold_white(&self) -> Option<u8> {
        self.channel("c")
    }

    /// The color as hue in degrees and saturation in percent, derived from
    /// the RGB channels and the warm white channel.
    pub fn hue_saturation(&self) -> Option<(f64, f64)> {
        Some(rgbcw::rgbcw_to_hs(self.rgb()?, self.warm_white()?))
    }

    /// Brightness on the 0-255 scale.
    pub fn brightness(&self) -> Option<u8> {
        self.int("dimming")
            .map(|percent| percent_to_hex(percent as i32).clamp(0, 255) as u8)
    }

    /// Brightness in percent, as the bulb reports it.
    pub fn dimming(&self) -> Option<u8> {
        self.channel("dimming")
    }

    pub fn colortemp(&self) -> Option<u32> {
        self.int("temp").and_then(|v| u32::try_from(v).ok())
    }

    pub fn speed(&self) -> Option<u8> {
        self.channel("speed")
    }

    pub fn ratio(&self) -> Option<u8> {
        self.channel("ratio")
    }

    /// The active scene id, reporting a running schedule as the rhythm scene.
    pub fn scene_id(&self) -> Option<u16> {
        if self.0.contains_key("schdPsetId") {
            return Some(RHYTHM_SCENE_ID as u16);
        }
        self.int("sceneId").and_then(|v| u16::try_from(v).ok())
    }

    /// The active scene, `None` when no known scene is running.
    pub fn scene(&self) -> Option<SceneMode> {
        self.scene_id().and_then(SceneMode::create)
    }

    /// Power draw in watts, for bulbs that report it.
    pub fn power(&self) -> Option<f64> {
        self.int("pc").map(|milliwatts| milliwatts as f64 / 1000.0)
    }

    /// The `whiteRange` list of a user or model config.
    pub fn white_range(&self) -> Option<Vec<f64>> {
        self.float_list("whiteRange")
    }

    /// The extended white range of a user or model config.
    ///
    /// Older firmware calls it `extRange`, newer firmware `cctRange`.
    pub fn extended_white_range(&self) -> Option<Vec<f64>> {
        self.float_list("extRange")
            .or_else(|| self.float_list("cctRange"))
    }

    /// The number of speed steps a fan fixture advertises.
    pub fn fan_speed_range(&self) -> Option<u8> {
        self.channel("fanSpeed")
    }

    pub fn fan_state(&self) -> Option<u8> {
        self.channel("fanState")
    }

    pub fn fan_mode(&self) -> Option<u8> {
        self.channel("fanMode")
    }

    pub fn fan_speed(&self) -> Option<u8> {
        self.channel("fanSpeed")
    }

    pub fn fan_reverse(&self) -> Option<u8> {
        self.channel("fanRevrs")
    }
}

/// Whether a new report describes the same state as the previous one.
///
/// Reports from motion sensors and remote buttons never match a report from
/// another source. Otherwise every key of `new`, except bookkeeping keys,
/// must hold the same value in `old`.
pub fn states_match(old: &Pilot, new: &Pilot) -> bool {
    let old_source = old.source();
    let new_source = new.source();
    let is_event = |source: Option<&str>| source.is_some_and(|s| ALWAYS_SEND_SOURCES.contains(&s));
    if old_source != new_source && (is_event(old_source) || is_event(new_source)) {
        return false;
    }

    new.0
        .iter()
        .filter(|(key, _)| key.as_str() != "src" && !IGNORED_STATE_KEYS.contains(&key.as_str()))
        .all(|(key, value)| old.0.get(key) == Some(value))
}
