//! Individual light control.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex as StdMutex};

use log::debug;
use serde_json::{Value, json};

use crate::config::{BulbType, SystemConfig};
use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::message::{Command, Method, Response};
use crate::payload::PilotBuilder;
use crate::pilot::{Pilot, states_match};
use crate::push::{PushManager, lock, normalize_mac};
use crate::runtime::{self, Instant, JoinHandle, Mutex};
use crate::transport::{BackoffConfig, PORT, Transport};
use crate::types::{FanDirection, FanMode, FanState};

type Result<T> = std::result::Result<T, Error>;

/// Configuration answers that never change while the bulb is powered.
///
/// The outer `Option` tells whether the bulb was asked at all.
#[derive(Debug, Default)]
struct ConfigCache {
    model_config: Option<Option<Pilot>>,
    white_range: Option<Option<Vec<f64>>>,
    extended_white_range: Option<Option<Vec<f64>>>,
    fan_speed_range: Option<Option<u8>>,
    bulb_type: Option<BulbType>,
    power_monitoring: Option<bool>,
}

struct PushRegistration {
    manager: Arc<PushManager>,
    mac: String,
    keep_alive: JoinHandle<()>,
}

/// Represents a single Wiz smart light bulb.
///
/// A `Light` talks to one bulb over UDP, caches the last state it saw and
/// remembers the bulb's capabilities once they have been resolved.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use wiz_pilot::Light;
///
/// let light = Light::new(Ipv4Addr::new(192, 168, 1, 100), Some("Bedroom"));
/// assert_eq!(light.name(), Some("Bedroom"));
/// assert!(light.state().is_none());
/// ```
pub struct Light {
    ip: IpAddr,
    name: Option<String>,
    mac: StdMutex<Option<String>>,
    transport: Arc<Transport>,
    state: Arc<StdMutex<Option<Pilot>>>,
    last_push: Arc<StdMutex<Option<Instant>>>,
    history: Arc<StdMutex<MessageHistory>>,
    cache: Mutex<ConfigCache>,
    push: Mutex<Option<PushRegistration>>,
}

impl std::fmt::Debug for Light {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Light")
            .field("ip", &self.ip)
            .field("name", &self.name)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Light {
    pub fn new(ip: impl Into<IpAddr>, name: Option<&str>) -> Self {
        let ip = ip.into();
        Light {
            ip,
            name: name.map(String::from),
            mac: StdMutex::new(None),
            transport: Arc::new(Transport::new(
                SocketAddr::new(ip, PORT),
                BackoffConfig::default(),
            )),
            state: Arc::new(StdMutex::new(None)),
            last_push: Arc::new(StdMutex::new(None)),
            history: Arc::new(StdMutex::new(MessageHistory::new())),
            cache: Mutex::new(ConfigCache::default()),
            push: Mutex::new(None),
        }
    }

    /// Talk to the bulb on a port other than 38899.
    pub fn with_port(mut self, port: u16) -> Self {
        self.transport = Arc::new(Transport::new(
            SocketAddr::new(self.ip, port),
            *self.transport.config(),
        ));
        self
    }

    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        self.transport = Arc::new(Transport::new(self.transport.addr(), config));
        self
    }

    /// Use an already known MAC address instead of asking the bulb.
    pub fn with_mac(self, mac: &str) -> Self {
        *lock(&self.mac) = Some(normalize_mac(mac));
        self
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The last state reported by the bulb or sent to it.
    pub fn state(&self) -> Option<Pilot> {
        lock(&self.state).clone()
    }

    /// Whether the light was on, as far as the cached state knows.
    pub fn status(&self) -> Option<bool> {
        lock(&self.state).as_ref().and_then(Pilot::state)
    }

    pub fn history(&self) -> MessageHistory {
        lock(&self.history).clone()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    /// Send a raw command and wait for the correlated reply.
    ///
    /// Both directions end up in the message history, and so does the
    /// error when the exchange fails.
    pub async fn send(&self, command: &Command) -> Result<Response> {
        let method = command.method();
        lock(&self.history).record(MessageType::Send, method, &command.to_value());
        match self.transport.send(command).await {
            Ok(response) => {
                lock(&self.history).record(MessageType::Receive, method, response.message());
                Ok(response)
            }
            Err(err) => {
                lock(&self.history).record_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Send a state change and fold its parameters into the cached state.
    async fn apply(&self, command: Command) -> Result<()> {
        self.send(&command).await?;
        if let Some(params) = command.params().as_object() {
            lock(&self.state)
                .get_or_insert_with(Pilot::default)
                .merge(params);
        }
        Ok(())
    }

    /// Turn the light on, applying the settings in `builder`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::net::Ipv4Addr;
    /// use wiz_pilot::{Light, PilotBuilder};
    ///
    /// # async fn run() -> Result<(), wiz_pilot::Error> {
    /// let light = Light::new(Ipv4Addr::new(192, 168, 1, 100), None);
    /// light.turn_on(&PilotBuilder::new().rgb(255, 0, 0)?.brightness(128)?).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn turn_on(&self, builder: &PilotBuilder) -> Result<()> {
        self.apply(builder.set_pilot_message(Some(true))?).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.apply(PilotBuilder::new().set_pilot_message(Some(false))?)
            .await
    }

    /// Apply `builder` with `setState`, keeping the power state the light
    /// was last seen in.
    pub async fn set_state(&self, builder: &PilotBuilder) -> Result<()> {
        self.apply(builder.set_state_message(self.status())?).await
    }

    /// Set the playback speed of the running scene, in percent.
    pub async fn set_speed(&self, speed: i32) -> Result<()> {
        self.apply(PilotBuilder::new().speed(speed)?.set_pilot_message(None)?)
            .await
    }

    /// Set the balance between the two heads of a dual-head fixture.
    pub async fn set_ratio(&self, ratio: i32) -> Result<()> {
        self.apply(PilotBuilder::new().ratio(ratio)?.set_pilot_message(None)?)
            .await
    }

    /// Turn the light off when it is on and on otherwise.
    pub async fn light_switch(&self) -> Result<()> {
        let on = self
            .update_state()
            .await?
            .and_then(|pilot| pilot.state())
            .unwrap_or(false);
        if on {
            self.turn_off().await
        } else {
            self.turn_on(&PilotBuilder::new()).await
        }
    }

    pub async fn reboot(&self) -> Result<()> {
        self.send(&Command::new(Method::Reboot)).await?;
        Ok(())
    }

    /// Reset the bulb to factory settings.
    pub async fn reset(&self) -> Result<()> {
        self.send(&Command::new(Method::Reset)).await?;
        Ok(())
    }

    /// Refresh the cached state with `getPilot`.
    ///
    /// While push updates keep arriving the cached state is already
    /// current, and it is returned without asking the bulb.
    pub async fn update_state(&self) -> Result<Option<Pilot>> {
        if self.push_is_fresh().await {
            debug!("{}: Push updates are fresh, skipping getPilot", self.ip);
            return Ok(self.state());
        }
        let response = self.send(&Command::new(Method::GetPilot)).await?;
        let pilot = Pilot::from_value(response.into_result());
        *lock(&self.state) = pilot.clone();
        Ok(pilot)
    }

    async fn push_is_fresh(&self) -> bool {
        let push = self.push.lock().await;
        let Some(registration) = push.as_ref() else {
            return false;
        };
        if !registration.manager.is_running() {
            return false;
        }
        let window = registration.manager.keep_alive_interval() + self.transport.config().timeout;
        lock(&self.last_push).is_some_and(|last| last.elapsed() < window)
    }

    /// Fetch the system configuration and remember the MAC address.
    pub async fn get_system_config(&self) -> Result<SystemConfig> {
        let response = self.send(&Command::new(Method::GetSystemConfig)).await?;
        let config: SystemConfig = response.decode_result()?;
        if !config.mac.is_empty() {
            *lock(&self.mac) = Some(normalize_mac(&config.mac));
        }
        Ok(config)
    }

    /// The bulb's MAC address, lowercase.
    pub async fn get_mac(&self) -> Result<String> {
        if let Some(mac) = lock(&self.mac).clone() {
            return Ok(mac);
        }
        self.get_system_config().await?;
        lock(&self.mac).clone().ok_or(Error::MacUnknown)
    }

    pub async fn get_user_config(&self) -> Result<Value> {
        let response = self.send(&Command::new(Method::GetUserConfig)).await?;
        Ok(response.into_result())
    }

    /// The model configuration, `None` on firmware without `getModelConfig`.
    ///
    /// The answer is cached, including the absence of the method.
    pub async fn get_model_config(&self) -> Result<Option<Value>> {
        let mut cache = self.cache.lock().await;
        let config = self.model_config(&mut cache).await?;
        Ok(config.map(|config| Value::Object(config.into_map())))
    }

    async fn model_config(&self, cache: &mut ConfigCache) -> Result<Option<Pilot>> {
        if let Some(config) = &cache.model_config {
            return Ok(config.clone());
        }
        let config = match self.send(&Command::new(Method::GetModelConfig)).await {
            Ok(response) => Pilot::from_value(response.into_result()),
            Err(err) if err.is_method_not_found() => {
                debug!("{}: getModelConfig not supported by firmware", self.ip);
                None
            }
            Err(err) => return Err(err),
        };
        cache.model_config = Some(config.clone());
        Ok(config)
    }

    async fn user_config(&self) -> Result<Option<Pilot>> {
        match self.get_user_config().await {
            Ok(config) => Ok(Pilot::from_value(config)),
            Err(err) if err.is_method_not_found() => {
                debug!("{}: getUserConfig not supported by firmware", self.ip);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The `whiteRange` of the user configuration.
    pub async fn get_white_range(&self) -> Result<Option<Vec<f64>>> {
        let mut cache = self.cache.lock().await;
        if let Some(range) = &cache.white_range {
            return Ok(range.clone());
        }
        let range = self.user_config().await?.and_then(|c| c.white_range());
        cache.white_range = Some(range.clone());
        Ok(range)
    }

    /// The full kelvin range the bulb supports.
    ///
    /// Read from the model configuration, or from the user configuration
    /// on firmware that has no model configuration.
    pub async fn get_extended_white_range(&self) -> Result<Option<Vec<f64>>> {
        let mut cache = self.cache.lock().await;
        self.extended_white_range(&mut cache).await
    }

    async fn extended_white_range(&self, cache: &mut ConfigCache) -> Result<Option<Vec<f64>>> {
        if let Some(range) = &cache.extended_white_range {
            return Ok(range.clone());
        }
        let range = match self.model_config(cache).await? {
            Some(model) => model.extended_white_range(),
            None => self
                .user_config()
                .await?
                .and_then(|c| c.extended_white_range()),
        };
        cache.extended_white_range = Some(range.clone());
        Ok(range)
    }

    /// The number of fan speed steps, for fixtures with a fan.
    pub async fn get_fan_speed_range(&self) -> Result<Option<u8>> {
        let mut cache = self.cache.lock().await;
        self.fan_speed_range(&mut cache).await
    }

    async fn fan_speed_range(&self, cache: &mut ConfigCache) -> Result<Option<u8>> {
        if let Some(range) = cache.fan_speed_range {
            return Ok(range);
        }
        let range = match self.model_config(cache).await? {
            Some(model) => model.fan_speed_range(),
            None => self.user_config().await?.and_then(|c| c.fan_speed_range()),
        };
        cache.fan_speed_range = Some(range);
        Ok(range)
    }

    /// Resolve what kind of bulb this is. Resolved once, then cached.
    ///
    /// White channel count and ratio come from `drvConf` and are overridden
    /// by the model configuration when the firmware has one.
    pub async fn get_bulb_type(&self) -> Result<BulbType> {
        let mut cache = self.cache.lock().await;
        if let Some(bulb_type) = &cache.bulb_type {
            return Ok(bulb_type.clone());
        }

        let system = self.get_system_config().await?;
        let (mut white_to_color_ratio, mut white_channels) = match system.drv_conf.as_deref() {
            Some([ratio, channels, ..]) => (Some(*ratio), Some(*channels)),
            _ => (None, None),
        };
        if let Some(model) = self.model_config(&mut cache).await? {
            let field = |key: &str| {
                model
                    .get(key)
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
            };
            white_channels = field("nowc").or(white_channels);
            white_to_color_ratio = field("wcr").or(white_to_color_ratio);
        }
        let kelvin_range = self.extended_white_range(&mut cache).await?;
        let fan_speed_range = self.fan_speed_range(&mut cache).await?;

        let bulb_type = BulbType::from_data(
            system.module_name.as_deref(),
            kelvin_range.as_deref(),
            system.fw_version.as_deref(),
            white_channels,
            white_to_color_ratio,
            system.type_id,
            fan_speed_range,
        )?;
        debug!("{}: Resolved bulb type {:?}", self.ip, bulb_type);
        cache.bulb_type = Some(bulb_type.clone());
        Ok(bulb_type)
    }

    /// Names of the scenes this bulb can run.
    pub async fn get_supported_scenes(&self) -> Result<Vec<&'static str>> {
        Ok(self.get_bulb_type().await?.supported_scenes())
    }

    /// Current power draw in watts.
    ///
    /// Bulbs without `getPower` are not asked again; for those the value
    /// comes from the `pc` key of the cached state, if any.
    pub async fn get_power(&self) -> Result<Option<f64>> {
        let mut cache = self.cache.lock().await;
        if cache.power_monitoring != Some(false) {
            match self.send(&Command::new(Method::GetPower)).await {
                Ok(response) => {
                    cache.power_monitoring = Some(true);
                    return Ok(response
                        .result()
                        .get("power")
                        .and_then(Value::as_f64)
                        .map(|milliwatts| milliwatts / 1000.0));
                }
                Err(err) if err.is_method_not_found() => {
                    debug!("{}: getPower not supported by firmware", self.ip);
                    cache.power_monitoring = Some(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.state().and_then(|state| state.power()))
    }

    /// Change any of the fan settings of a fan fixture.
    ///
    /// The speed is checked against the fixture's advertised range.
    pub async fn fan_set_state(
        &self,
        state: Option<FanState>,
        mode: Option<FanMode>,
        speed: Option<i32>,
        direction: Option<FanDirection>,
    ) -> Result<()> {
        let mut builder = PilotBuilder::new();
        if let Some(state) = state {
            builder = builder.fan_state(state);
        }
        if let Some(mode) = mode {
            builder = builder.fan_mode(mode);
        }
        if let Some(direction) = direction {
            builder = builder.fan_direction(direction);
        }
        if let Some(speed) = speed {
            let max_speed = self.get_fan_speed_range().await?;
            builder = builder.fan_speed(speed, max_speed)?;
        }
        self.apply(builder.set_pilot_message(None)?).await
    }

    pub async fn fan_turn_on(&self, mode: Option<FanMode>, speed: Option<i32>) -> Result<()> {
        self.fan_set_state(Some(FanState::On), mode, speed, None)
            .await
    }

    pub async fn fan_turn_off(&self) -> Result<()> {
        self.fan_set_state(Some(FanState::Off), None, None, None)
            .await
    }

    /// Toggle the fan based on its freshly read state.
    pub async fn fan_switch(&self) -> Result<()> {
        let running = self
            .update_state()
            .await?
            .and_then(|pilot| pilot.fan_state())
            .is_some_and(|state| state == FanState::On.value());
        if running {
            self.fan_turn_off().await
        } else {
            self.fan_turn_on(None, None).await
        }
    }

    /// Receive state changes through `manager` instead of polling.
    ///
    /// `callback` runs on the push listener for every report that differs
    /// from the cached state. While subscribed, the bulb is re-registered
    /// every keep-alive interval. Returns `false` when push is unavailable
    /// on this host, in which case callers should poll with
    /// [`update_state`](Self::update_state).
    pub async fn start_push<F>(&self, manager: &Arc<PushManager>, callback: F) -> Result<bool>
    where
        F: Fn(Pilot) + Send + Sync + 'static,
    {
        self.stop_push().await;
        let mac = self.get_mac().await?;

        let state = Arc::clone(&self.state);
        let last_push = Arc::clone(&self.last_push);
        let history = Arc::clone(&self.history);
        manager.subscribe(&mac, move |pilot: Pilot| {
            lock(&history).record(
                MessageType::Push,
                Method::SyncPilot,
                &Value::Object(pilot.as_map().clone()),
            );
            *lock(&last_push) = Some(Instant::now());
            {
                let mut current = lock(&state);
                if current.as_ref().is_some_and(|old| states_match(old, &pilot)) {
                    return;
                }
                *current = Some(pilot.clone());
            }
            callback(pilot);
        });

        if !manager.start(self.ip).await {
            manager.unsubscribe(&mac).await;
            return Ok(false);
        }
        let Some(registration) = manager.registration_message().await else {
            manager.unsubscribe(&mac).await;
            return Ok(false);
        };

        let transport = Arc::downgrade(&self.transport);
        let interval = manager.keep_alive_interval();
        let ip = self.ip;
        let keep_alive = runtime::spawn(async move {
            loop {
                let Some(bulb) = transport.upgrade() else {
                    return;
                };
                if let Err(err) = bulb.send(&registration).await {
                    debug!("{}: Push registration failed: {}", ip, err);
                }
                drop(bulb);
                runtime::sleep(interval).await;
            }
        });

        *self.push.lock().await = Some(PushRegistration {
            manager: Arc::clone(manager),
            mac,
            keep_alive,
        });
        Ok(true)
    }

    /// Stop receiving push updates for this bulb.
    pub async fn stop_push(&self) {
        let registration = self.push.lock().await.take();
        if let Some(registration) = registration {
            registration.keep_alive.cancel().await;
            registration.manager.unsubscribe(&registration.mac).await;
            debug!("{}: Stopped push updates", self.ip);
        }
    }

    /// Stop push updates and release the socket.
    pub async fn close(&self) {
        self.stop_push().await;
        self.transport.close().await;
    }

    /// Returns diagnostics including cached state, configuration, and history.
    pub async fn diagnostics(&self) -> Value {
        let cache = self.cache.lock().await;
        let push = self.push.lock().await;
        let history = self.history();
        json!({
            "ip": self.ip.to_string(),
            "name": self.name,
            "mac": lock(&self.mac).clone(),
            "state": self.state(),
            "white_range": cache.white_range.clone().flatten(),
            "extended_white_range": cache.extended_white_range.clone().flatten(),
            "fan_speed_range": cache.fan_speed_range.flatten(),
            "bulb_type": cache.bulb_type,
            "push_running": push.is_some(),
            "time_since_last_push": lock(&self.last_push).map(|t| t.elapsed().as_secs_f64()),
            "push_manager": push.as_ref().map(|p| p.manager.diagnostics()),
            "history": history.to_json(),
            "history_summary": history.summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::config::{BulbClass, KelvinRange};
    use crate::testing::{BULB_MAC, FakeBulb, Model, fast_backoff, silent_socket};
    use crate::types::Color;

    async fn next(rx: &mut mpsc::UnboundedReceiver<Pilot>) -> Pilot {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_turn_on_rgb() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light
            .turn_on(&PilotBuilder::new().rgb(0, 128, 255).unwrap())
            .await
            .unwrap();

        let pilot = light.update_state().await.unwrap().unwrap();
        assert_eq!(pilot.state(), Some(true));
        assert_eq!(pilot.rgb(), Some(Color::rgb(0, 127, 255)));
        assert_eq!(pilot.warm_white(), Some(34));
        assert_eq!(light.status(), Some(true));
    }

    #[tokio::test]
    async fn test_brightness_floor_reads_back() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light
            .turn_on(&PilotBuilder::new().brightness(10).unwrap())
            .await
            .unwrap();
        let pilot = light.update_state().await.unwrap().unwrap();
        assert_eq!(pilot.dimming(), Some(10));
        assert_eq!(pilot.brightness(), Some(26));
    }

    #[tokio::test]
    async fn test_colortemp_is_clamped() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light
            .turn_on(&PilotBuilder::new().colortemp(12000))
            .await
            .unwrap();
        assert_eq!(bulb.pilot()["temp"], 10000);
    }

    #[tokio::test]
    async fn test_scene_and_speed() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light
            .turn_on(&PilotBuilder::new().scene(4).unwrap())
            .await
            .unwrap();
        light.set_speed(150).await.unwrap();

        let pilot = light.update_state().await.unwrap().unwrap();
        assert_eq!(pilot.scene_id(), Some(4));
        assert_eq!(pilot.speed(), Some(150));

        let requests = bulb.requests();
        let err = light.set_speed(5).await.unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: "speed", .. }), "{err:?}");
        assert_eq!(bulb.requests(), requests);
    }

    #[tokio::test]
    async fn test_turn_off_and_switch() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();

        light.light_switch().await.unwrap();
        assert_eq!(bulb.pilot()["state"], true);
        light.light_switch().await.unwrap();
        assert_eq!(bulb.pilot()["state"], false);

        light.turn_on(&PilotBuilder::new()).await.unwrap();
        light.turn_off().await.unwrap();
        assert_eq!(light.status(), Some(false));
        assert_eq!(bulb.pilot()["state"], false);
    }

    #[tokio::test]
    async fn test_set_state_keeps_unknown_power() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light
            .set_state(&PilotBuilder::new().brightness(255).unwrap())
            .await
            .unwrap();
        let history = light.history();
        let sent = history.latest(MessageType::Send, Method::SetState).unwrap();
        assert_eq!(sent["params"], json!({"dimming": 100}));
        assert_eq!(bulb.pilot()["dimming"], 100);
    }

    #[tokio::test]
    async fn test_reboot_and_reset() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light.reboot().await.unwrap();
        light.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_bulb_type_from_model_config() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        let bulb_type = light.get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.bulb_class, BulbClass::RGB);
        assert_eq!(bulb_type.name.as_deref(), Some("ESP01_SHRGB_03"));
        assert_eq!(bulb_type.fw_version.as_deref(), Some("1.25.0"));
        assert_eq!(bulb_type.kelvin_range, Some(KelvinRange { min: 2200, max: 6500 }));
        assert_eq!(bulb_type.white_channels, Some(1));
        assert_eq!(bulb_type.white_to_color_ratio, Some(30));
        assert!(bulb_type.features.color);

        let requests = bulb.requests();
        assert_eq!(light.get_bulb_type().await.unwrap(), bulb_type);
        let scenes = light.get_supported_scenes().await.unwrap();
        assert_eq!(scenes.len(), 36);
        assert!(scenes.contains(&"Rhythm"));
        assert_eq!(bulb.requests(), requests);
    }

    #[tokio::test]
    async fn test_bulb_type_falls_back_to_user_config() {
        let bulb = FakeBulb::start(Model::RgbLegacy).await;
        let light = bulb.light();
        let bulb_type = light.get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.bulb_class, BulbClass::RGB);
        assert_eq!(bulb_type.kelvin_range, Some(KelvinRange { min: 2200, max: 6500 }));
        assert_eq!(bulb_type.white_channels, Some(2));
        assert_eq!(bulb_type.white_to_color_ratio, Some(20));
        assert_eq!(
            light.get_white_range().await.unwrap(),
            Some(vec![2700.0, 6500.0])
        );
    }

    #[tokio::test]
    async fn test_missing_model_config_is_remembered() {
        let bulb = FakeBulb::start(Model::RgbLegacy).await;
        let light = bulb.light();
        assert_eq!(light.get_model_config().await.unwrap(), None);
        let requests = bulb.requests();
        assert_eq!(light.get_model_config().await.unwrap(), None);
        assert_eq!(bulb.requests(), requests);
    }

    #[tokio::test]
    async fn test_socket_and_power() {
        let bulb = FakeBulb::start(Model::Socket).await;
        let light = bulb.light();
        let bulb_type = light.get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.bulb_class, BulbClass::Socket);
        assert_eq!(bulb_type.kelvin_range, Some(KelvinRange { min: 2700, max: 2700 }));
        assert!(light.get_supported_scenes().await.unwrap().is_empty());
        assert_eq!(light.get_power().await.unwrap(), Some(1.234));
    }

    #[tokio::test]
    async fn test_missing_power_is_remembered() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        assert_eq!(light.get_power().await.unwrap(), None);
        let requests = bulb.requests();
        assert_eq!(light.get_power().await.unwrap(), None);
        assert_eq!(bulb.requests(), requests);
    }

    #[tokio::test]
    async fn test_dimmable_white_without_configs() {
        let bulb = FakeBulb::start(Model::DimmableWhite).await;
        let bulb_type = bulb.light().get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.bulb_class, BulbClass::DW);
        assert_eq!(bulb_type.kelvin_range, None);
        assert!(!bulb_type.features.color_tmp);
    }

    #[tokio::test]
    async fn test_unknown_bulbs() {
        for model in [Model::RgbWithoutKelvin, Model::Unidentified, Model::Malformed] {
            let bulb = FakeBulb::start(model).await;
            let err = bulb.light().get_bulb_type().await.unwrap_err();
            assert!(matches!(err, Error::UnknownBulb(_)), "{model:?}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_fan_control() {
        let bulb = FakeBulb::start(Model::Fan).await;
        let light = bulb.light();
        let bulb_type = light.get_bulb_type().await.unwrap();
        assert_eq!(bulb_type.bulb_class, BulbClass::FanDim);
        assert_eq!(bulb_type.fan_speed_range, Some(6));
        assert!(bulb_type.features.fan);

        light
            .fan_turn_on(Some(FanMode::Breeze), Some(3))
            .await
            .unwrap();
        let pilot = bulb.pilot();
        assert_eq!(pilot["fanState"], 1);
        assert_eq!(pilot["fanMode"], 2);
        assert_eq!(pilot["fanSpeed"], 3);

        let err = light
            .fan_set_state(None, None, Some(7), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }), "{err:?}");

        light.fan_switch().await.unwrap();
        assert_eq!(bulb.pilot()["fanState"], 0);
    }

    #[tokio::test]
    async fn test_fan_speed_range_from_user_config() {
        let bulb = FakeBulb::start(Model::FanLegacy).await;
        let light = bulb.light();
        assert_eq!(light.get_fan_speed_range().await.unwrap(), Some(10));
        assert_eq!(light.get_bulb_type().await.unwrap().fan_speed_range, Some(10));

        light.fan_set_state(None, None, Some(8), None).await.unwrap();
        assert_eq!(bulb.pilot()["fanSpeed"], 8);
        assert!(light.fan_set_state(None, None, Some(11), None).await.is_err());
    }

    #[tokio::test]
    async fn test_mac_is_cached() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        assert_eq!(light.get_mac().await.unwrap(), BULB_MAC);
        let requests = bulb.requests();
        assert_eq!(light.get_mac().await.unwrap(), BULB_MAC);
        assert_eq!(bulb.requests(), requests);

        let known = bulb.light().with_mac("AABBCCDDEEFF");
        assert_eq!(known.get_mac().await.unwrap(), "aabbccddeeff");
        assert_eq!(bulb.requests(), requests);
    }

    #[tokio::test]
    async fn test_unreachable_bulb_times_out() {
        let silent = silent_socket().await;
        let addr = silent.local_addr().unwrap();
        let light = Light::new(addr.ip(), None)
            .with_port(addr.port())
            .with_backoff(BackoffConfig {
                timeout: Duration::from_millis(300),
                ..fast_backoff()
            });
        let err = light.turn_on(&PilotBuilder::new()).await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(light.history().last_error().is_some());
        assert_eq!(light.state(), None);
    }

    #[tokio::test]
    async fn test_invalid_values_never_reach_the_network() {
        let silent = silent_socket().await;
        let addr = silent.local_addr().unwrap();
        let light = Light::new(addr.ip(), None)
            .with_port(addr.port())
            .with_backoff(fast_backoff());

        let err = PilotBuilder::new().rgb(300, 0, 0).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { field: "red", .. }), "{err:?}");
        assert!(light.set_ratio(101).await.is_err());
        assert!(light.set_speed(201).await.is_err());

        let mut buffer = [0u8; 64];
        assert!(silent.try_recv(&mut buffer).is_err());
        assert!(light.history().is_empty());
    }

    #[tokio::test]
    async fn test_push_updates_state() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        let manager = Arc::new(PushManager::with_port(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = light
            .start_push(&manager, move |pilot| {
                let _ = tx.send(pilot);
            })
            .await
            .unwrap();
        assert!(started);
        assert!(manager.is_running());

        // getSystemConfig, then the first keep-alive registration.
        for _ in 0..100 {
            if bulb.requests() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let requests = bulb.requests();
        assert!(requests >= 2);

        let port = manager.local_addr().await.unwrap().port();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let push = |dimming: u8, rssi: i32| {
            json!({"method": "syncPilot", "env": "pro", "params": {
                "mac": BULB_MAC, "src": "udp", "state": true, "dimming": dimming, "rssi": rssi
            }})
            .to_string()
        };
        sender.send_to(push(50, -60).as_bytes(), target).await.unwrap();
        assert_eq!(next(&mut rx).await.brightness(), Some(128));

        sender.send_to(push(50, -70).as_bytes(), target).await.unwrap();
        sender.send_to(push(80, -70).as_bytes(), target).await.unwrap();
        assert_eq!(next(&mut rx).await.dimming(), Some(80));
        assert_eq!(light.state().unwrap().dimming(), Some(80));
        assert!(
            light
                .history()
                .latest(MessageType::Push, Method::SyncPilot)
                .is_some()
        );

        let cached = light.update_state().await.unwrap().unwrap();
        assert_eq!(cached.dimming(), Some(80));
        assert_eq!(bulb.requests(), requests);
        assert_eq!(light.diagnostics().await["push_running"], true);

        light.close().await;
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_push_unavailable_falls_back() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        let taken = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let manager = Arc::new(PushManager::with_port(taken.local_addr().unwrap().port()));
        assert!(!light.start_push(&manager, |_| {}).await.unwrap());
        assert_eq!(manager.diagnostics().subscription_count, 0);
        assert_eq!(light.diagnostics().await["push_running"], false);
    }

    #[tokio::test]
    async fn test_diagnostics() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let light = bulb.light();
        light.get_bulb_type().await.unwrap();
        light.update_state().await.unwrap();

        let diagnostics = light.diagnostics().await;
        assert_eq!(diagnostics["ip"], "127.0.0.1");
        assert_eq!(diagnostics["mac"], BULB_MAC);
        assert_eq!(diagnostics["bulb_type"]["bulb_class"], "RGB");
        assert_eq!(diagnostics["extended_white_range"], json!([2200.0, 2700.0, 4800.0, 6500.0]));
        assert_eq!(diagnostics["state"]["dimming"], 13);
        assert!(diagnostics["history"]["receive"]["getPilot"].is_object());
    }
}
