//! Bulb configuration and type detection.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::SceneMode;

/// System configuration of a Wiz bulb, as returned by `getSystemConfig`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub mac: String,
    #[serde(default)]
    pub home_id: Option<u64>,
    #[serde(default)]
    pub room_id: Option<u64>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub fw_version: Option<String>,
    #[serde(default)]
    pub group_id: Option<u64>,
    #[serde(default)]
    pub type_id: Option<u32>,
    /// Driver configuration: `[white_to_color_ratio, white_channels]`.
    #[serde(default)]
    pub drv_conf: Option<Vec<u32>>,
}

/// Classification of Wiz bulb types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulbClass {
    /// Tunable white
    TW,
    /// Dimmable white
    DW,
    /// Full color with tunable white
    RGB,
    /// Smart socket
    Socket,
    /// Ceiling fan with a dimmable light
    FanDim,
}

impl BulbClass {
    /// The class encoded in a module name such as `ESP01_SHRGB_03`, and
    /// whether the fixture is dual-headed.
    fn from_module_name(module_name: &str) -> Result<(Self, bool), Error> {
        let identifier = module_name
            .split('_')
            .nth(1)
            .ok_or_else(|| Error::UnknownBulb(format!("malformed module name {module_name:?}")))?;

        let class = if identifier.contains("RGB") {
            BulbClass::RGB
        } else if identifier.contains("TW") {
            BulbClass::TW
        } else if identifier.contains("SOCKET") {
            BulbClass::Socket
        } else if identifier.contains("FANDIM") {
            BulbClass::FanDim
        } else {
            BulbClass::DW
        };
        Ok((class, identifier.contains("DH")))
    }

    /// The class of a bulb that only reports a numeric type id.
    fn from_type_id(type_id: u32) -> Self {
        match type_id {
            0 => BulbClass::DW,
            unknown => {
                warn!("Unknown typeId: {}, please report what kind of bulb this is", unknown);
                BulbClass::DW
            }
        }
    }

    /// Whether bulbs of this class must report a kelvin range.
    fn needs_kelvin_range(self) -> bool {
        matches!(self, BulbClass::RGB | BulbClass::TW)
    }

    fn features(self, dual_head: bool) -> Features {
        let mut features = Features {
            dual_head,
            ..Features::default()
        };
        match self {
            BulbClass::RGB => {
                features.color = true;
                features.color_tmp = true;
                features.effect = true;
                features.brightness = true;
            }
            BulbClass::TW => {
                features.color_tmp = true;
                features.effect = true;
                features.brightness = true;
            }
            BulbClass::DW => {
                features.effect = true;
                features.brightness = true;
            }
            BulbClass::Socket => {}
            BulbClass::FanDim => {
                features.brightness = true;
                features.fan = true;
                features.fan_breeze_mode = true;
                features.fan_reverse = true;
            }
        }
        features
    }
}

/// Feature flags for a Wiz bulb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub color: bool,
    pub color_tmp: bool,
    pub effect: bool,
    pub brightness: bool,
    pub dual_head: bool,
    pub fan: bool,
    pub fan_breeze_mode: bool,
    pub fan_reverse: bool,
}

/// Color temperature range (Kelvin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KelvinRange {
    pub min: u32,
    pub max: u32,
}

impl KelvinRange {
    fn from_list(kelvins: &[f64]) -> Option<Self> {
        let min = kelvins.iter().copied().reduce(f64::min)?;
        let max = kelvins.iter().copied().reduce(f64::max)?;
        Some(KelvinRange {
            min: min as u32,
            max: max as u32,
        })
    }
}

/// Complete type information for a Wiz bulb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulbType {
    pub features: Features,
    /// The module name, `None` for bulbs that only report a type id.
    pub name: Option<String>,
    pub kelvin_range: Option<KelvinRange>,
    pub bulb_class: BulbClass,
    pub fw_version: Option<String>,
    pub white_channels: Option<u32>,
    pub white_to_color_ratio: Option<u32>,
    pub fan_speed_range: Option<u8>,
}

impl BulbType {
    /// Classify a bulb from what its configuration calls report.
    ///
    /// The module name wins over the type id. RGB and tunable white bulbs
    /// must report a kelvin range.
    ///
    /// ```
    /// use wiz_pilot::{BulbClass, BulbType};
    ///
    /// let bulb = BulbType::from_data(
    ///     Some("ESP01_SHRGB_03"),
    ///     Some(&[2200.0, 2700.0, 4800.0, 6500.0]),
    ///     Some("1.25.0"),
    ///     Some(1),
    ///     Some(30),
    ///     None,
    ///     None,
    /// )
    /// .unwrap();
    /// assert_eq!(bulb.bulb_class, BulbClass::RGB);
    /// assert_eq!(bulb.kelvin_range.unwrap().min, 2200);
    /// assert!(bulb.features.color);
    /// ```
    pub fn from_data(
        module_name: Option<&str>,
        kelvin_list: Option<&[f64]>,
        fw_version: Option<&str>,
        white_channels: Option<u32>,
        white_to_color_ratio: Option<u32>,
        type_id: Option<u32>,
        fan_speed_range: Option<u8>,
    ) -> Result<Self, Error> {
        let module_name = module_name.filter(|name| !name.is_empty());
        let (bulb_class, dual_head) = match (module_name, type_id) {
            (Some(module_name), _) => BulbClass::from_module_name(module_name)?,
            (None, Some(type_id)) => (BulbClass::from_type_id(type_id), false),
            (None, None) => {
                return Err(Error::UnknownBulb(
                    "the bulb reported neither a module name nor a type id".to_string(),
                ));
            }
        };

        let kelvin_range = kelvin_list.and_then(KelvinRange::from_list);
        if kelvin_range.is_none() && bulb_class.needs_kelvin_range() {
            return Err(Error::UnknownBulb(format!(
                "{:?} bulb did not report a kelvin range",
                bulb_class
            )));
        }

        Ok(BulbType {
            features: bulb_class.features(dual_head),
            name: module_name.map(String::from),
            kelvin_range,
            bulb_class,
            fw_version: fw_version.map(String::from),
            white_channels,
            white_to_color_ratio,
            fan_speed_range,
        })
    }

    /// Names of the scenes this bulb can run.
    pub fn supported_scenes(&self) -> Vec<&'static str> {
        SceneMode::for_class(self.bulb_class)
            .iter()
            .map(SceneMode::name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CCT: [f64; 4] = [2200.0, 2700.0, 4800.0, 6500.0];

    fn classify(module_name: &str, kelvins: Option<&[f64]>) -> Result<BulbType, Error> {
        BulbType::from_data(Some(module_name), kelvins, Some("1.0.0"), None, None, None, None)
    }

    #[test]
    fn test_classes_from_module_name() {
        assert_eq!(classify("ESP01_SHRGB_03", Some(&CCT)).unwrap().bulb_class, BulbClass::RGB);
        assert_eq!(classify("ESP56_SHTW3_01", Some(&CCT)).unwrap().bulb_class, BulbClass::TW);
        assert_eq!(classify("ESP05_SHDW_21", None).unwrap().bulb_class, BulbClass::DW);
        assert_eq!(classify("ESP10_SOCKET_06", None).unwrap().bulb_class, BulbClass::Socket);

        let fan = classify("ESP03_FANDIMS_31", Some(&[2700.0])).unwrap();
        assert_eq!(fan.bulb_class, BulbClass::FanDim);
        assert!(fan.features.fan && fan.features.fan_reverse);
        assert!(!fan.features.color);
        assert_eq!(fan.kelvin_range, Some(KelvinRange { min: 2700, max: 2700 }));
    }

    #[test]
    fn test_dual_head() {
        let bulb = classify("ESP01_DHRGB_03", Some(&CCT)).unwrap();
        assert!(bulb.features.dual_head);
        assert!(!classify("ESP01_SHRGB_03", Some(&CCT)).unwrap().features.dual_head);
    }

    #[test]
    fn test_socket_has_no_features() {
        let socket = classify("ESP10_SOCKET_06", Some(&[2700.0; 4])).unwrap();
        assert_eq!(socket.features, Features::default());
        assert!(socket.supported_scenes().is_empty());
    }

    #[test]
    fn test_color_bulbs_need_kelvin_range() {
        assert!(matches!(classify("ESP01_SHRGB_03", None), Err(Error::UnknownBulb(_))));
        assert!(matches!(classify("ESP56_SHTW3_01", Some(&[])), Err(Error::UnknownBulb(_))));
    }

    #[test]
    fn test_malformed_module_name() {
        assert!(matches!(classify("INVALID", None), Err(Error::UnknownBulb(_))));
    }

    #[test]
    fn test_type_id_fallback() {
        let bulb = BulbType::from_data(None, None, None, None, None, Some(0), None).unwrap();
        assert_eq!(bulb.bulb_class, BulbClass::DW);
        assert_eq!(bulb.name, None);

        let unknown = BulbType::from_data(None, None, None, None, None, Some(9), None).unwrap();
        assert_eq!(unknown.bulb_class, BulbClass::DW);

        let unnamed = BulbType::from_data(Some(""), None, None, None, None, Some(0), None).unwrap();
        assert_eq!(unnamed.bulb_class, BulbClass::DW);
        assert_eq!(unnamed.name, None);

        assert!(BulbType::from_data(None, None, None, None, None, None, None).is_err());
        assert!(BulbType::from_data(Some(""), None, None, None, None, None, None).is_err());
    }

    #[test]
    fn test_system_config_decodes() {
        let config: SystemConfig = serde_json::from_value(serde_json::json!({
            "mac": "a8bb5006033d", "homeId": 653906, "roomId": 989983,
            "moduleName": "ESP01_SHRGB_03", "fwVersion": "1.25.0",
            "groupId": 0, "drvConf": [30, 1], "ping": 0
        }))
        .unwrap();
        assert_eq!(config.module_name.as_deref(), Some("ESP01_SHRGB_03"));
        assert_eq!(config.drv_conf, Some(vec![30, 1]));
    }
}
