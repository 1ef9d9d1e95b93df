//! # wiz_pilot
//!
//! An async Rust client for Wiz smart bulbs on the local network.
//!
//! Bulbs speak JSON over UDP. This crate builds and validates the requests,
//! retransmits them until the bulb answers, keeps a cache of each bulb's
//! state and capabilities, and can subscribe to the state changes bulbs push
//! when another controller (the phone app, a switch, a motion sensor)
//! changes them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use wiz_pilot::{Light, PilotBuilder};
//!
//! async fn control_light() -> Result<(), wiz_pilot::Error> {
//!     let light = Light::new(Ipv4Addr::new(192, 168, 1, 100), Some("Living Room"));
//!
//!     // Blue at half brightness
//!     let blue = PilotBuilder::new().rgb(0, 0, 255)?.brightness(128)?;
//!     light.turn_on(&blue).await?;
//!
//!     if let Some(state) = light.update_state().await? {
//!         println!("{:?} at {:?}", state.rgb(), state.brightness());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Validated requests**: [`PilotBuilder`] rejects out of range values before anything is sent
//! - **Color model**: RGB and hue/saturation are mapped onto the bulb's RGB and white channels by [`rgbcw`]
//! - **Reliable exchange**: requests are retransmitted on the [`BackoffConfig`] schedule
//! - **Capabilities**: [`Light::get_bulb_type`] resolves the [`BulbClass`], kelvin range and features once
//! - **Scenes**: Use preset lighting scenes with [`SceneMode`]
//! - **Fans**: Control fan fixtures with [`FanState`], [`FanMode`] and [`FanDirection`]
//! - **Discovery**: Find bulbs on your network with [`discover_bulbs`]
//! - **Push Notifications**: Real-time state updates via [`push::PushManager`]
//! - **Diagnostics**: Per-bulb [`MessageHistory`] and [`Light::diagnostics`]
//!
//! ## Communication
//!
//! Requests go to UDP port 38899 of the bulb. Push updates arrive on UDP
//! port 38900 of this host. The bulbs must be on the same local network.
//!
//! ## Runtime Selection
//!
//! Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! wiz-pilot = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! wiz-pilot = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! wiz-pilot = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod config;
mod discovery;
mod errors;
mod history;
mod light;
mod message;
mod payload;
mod pilot;
pub mod push;
pub mod rgbcw;
pub mod runtime;
mod transport;
mod types;

#[cfg(test)]
mod testing;

// Re-export public API
pub use config::{BulbClass, BulbType, Features, KelvinRange, SystemConfig};
pub use discovery::{BulbRegistry, DiscoveredBulb, discover_bulbs, discover_bulbs_on};
pub use errors::{Error, METHOD_NOT_FOUND};
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use light::Light;
pub use message::{Command, Method, Response};
pub use payload::{Payload, PilotBuilder};
pub use pilot::{Pilot, states_match};
pub use transport::{BackoffConfig, PORT, Transport};
pub use types::{
    Brightness, Color, ColorRGBW, ColorRGBWW, FanDirection, FanMode, FanSpeed, FanState,
    HueSaturation, Kelvin, Ratio, SceneMode, Speed, White, hex_to_percent, percent_to_hex,
};
