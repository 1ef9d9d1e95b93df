//! Wire messages exchanged with Wiz bulbs.
//!
//! Every datagram is a single UTF-8 JSON object. Requests carry a `method`
//! and a `params` object; a reply echoes the `method` and carries either a
//! `result` or an `error`. Replies are matched to requests by method name
//! only, so at most one request per bulb may be outstanding at a time.

use std::net::IpAddr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::errors::{Error, METHOD_NOT_FOUND};

/// The methods this crate sends to, or receives from, a bulb.
///
/// ```
/// use std::str::FromStr;
/// use wiz_pilot::Method;
///
/// assert_eq!(Method::GetSystemConfig.as_ref(), "getSystemConfig");
/// assert_eq!(Method::from_str("syncPilot").unwrap(), Method::SyncPilot);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Method {
    GetPilot,
    SetPilot,
    SetState,
    GetSystemConfig,
    GetModelConfig,
    GetUserConfig,
    GetPower,
    Reboot,
    Reset,
    SetEffect,
    Registration,
    /// Pushed by a bulb when its state changes.
    SyncPilot,
    /// Pushed by a bulb when it comes online.
    FirstBeat,
}

/// A request ready to be sent to a bulb.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    method: Method,
    params: Value,
}

impl Command {
    /// A command with an empty `params` object.
    pub fn new(method: Method) -> Self {
        Command {
            method,
            params: Value::Object(Map::new()),
        }
    }

    /// A command whose `params` is the serialized form of `params`.
    pub fn with_params(method: Method, params: &impl Serialize) -> Result<Self, Error> {
        let params = serde_json::to_value(params).map_err(Error::JsonDump)?;
        Ok(Command { method, params })
    }

    /// The registration request bulbs answer to.
    ///
    /// With `register` set the bulb starts pushing `syncPilot` messages to
    /// `phone_ip`; without it the request only serves as a discovery probe.
    pub fn registration(phone_mac: &str, phone_ip: &str, register: bool) -> Self {
        Command {
            method: Method::Registration,
            params: json!({
                "phoneMac": phone_mac,
                "register": register,
                "phoneIp": phone_ip,
                "id": "1",
            }),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub(crate) fn to_value(&self) -> Value {
        json!({"method": self.method, "params": self.params})
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Error::JsonDump)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

/// A successful reply to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    method: Method,
    message: Value,
}

impl Response {
    /// Decode a raw datagram into a JSON message.
    ///
    /// Anything that is not UTF-8 JSON is reported as an invalid response
    /// from `ip`, whatever it was meant to answer.
    pub(crate) fn decode(ip: IpAddr, data: &[u8]) -> Result<Value, Error> {
        let text = std::str::from_utf8(data).map_err(|err| Error::InvalidResponse {
            ip,
            reason: format!("not utf-8: {err}"),
        })?;
        serde_json::from_str(text).map_err(|err| Error::InvalidResponse {
            ip,
            reason: format!("failed to decode message {text:?}: {err}"),
        })
    }

    /// Whether `message` answers a request for `method`.
    pub(crate) fn correlates(message: &Value, method: Method) -> bool {
        message.get("method").and_then(Value::as_str) == Some(method.as_ref())
    }

    /// Turn a correlated reply into a response, or into the error it carries.
    pub(crate) fn from_message(method: Method, message: Value) -> Result<Self, Error> {
        if let Some(error) = message.get("error") {
            let body: ErrorBody =
                serde_json::from_value(error.clone()).map_err(Error::JsonLoad)?;
            if body.code == METHOD_NOT_FOUND {
                return Err(Error::MethodNotFound(method));
            }
            return Err(Error::Device {
                code: body.code,
                message: body.message,
            });
        }
        Ok(Response { method, message })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The `result` object, or `Null` when the reply had none.
    pub fn result(&self) -> &Value {
        self.message.get("result").unwrap_or(&Value::Null)
    }

    pub fn into_result(mut self) -> Value {
        match self.message.get_mut("result") {
            Some(result) => result.take(),
            None => Value::Null,
        }
    }

    /// Deserialize the `result` object.
    pub fn decode_result<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.result().clone()).map_err(Error::JsonLoad)
    }

    /// The whole reply as received.
    pub fn message(&self) -> &Value {
        &self.message
    }
}
