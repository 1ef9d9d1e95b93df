use std::net::IpAddr;

use crate::message::Method;

/// JSON-RPC error code a bulb returns for methods its firmware lacks.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// All error types that can occur when interacting with Wiz bulbs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed while communicating with a bulb.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The bulb answered with something that is not a JSON message.
    #[error("{ip}: invalid response: {reason}")]
    InvalidResponse { ip: IpAddr, reason: String },

    /// No correlated response arrived before the request deadline.
    #[error("{ip}: {method} timed out after {attempts} datagrams")]
    Timeout {
        ip: IpAddr,
        method: Method,
        attempts: usize,
    },

    /// The bulb firmware does not implement the method.
    #[error("method {0} not found; maybe older bulb firmware?")]
    MethodNotFound(Method),

    /// The bulb answered with an error object other than "method not found".
    #[error("bulb returned error {code}: {message}")]
    Device { code: i64, message: String },

    /// A builder argument was outside of its accepted range.
    #[error("{field} is out of range; {bound}")]
    OutOfRange { field: &'static str, bound: String },

    /// The scene id is not in the scene table.
    #[error("scene {0} is not available")]
    SceneNotAvailable(u16),

    /// The scene name is not in the scene table.
    #[error("scene '{0}' not in scene list")]
    SceneNotFound(String),

    /// The bulb's configuration could not be mapped to a known bulb type.
    #[error("unknown bulb: {0}")]
    UnknownBulb(String),

    /// The operation needs the bulb's MAC address and none could be learned.
    #[error("the bulb's mac address is unknown")]
    MacUnknown,

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new out of range error
    pub fn out_of_range(field: &'static str, bound: impl Into<String>) -> Self {
        Error::OutOfRange {
            field,
            bound: bound.into(),
        }
    }

    /// Whether the request was abandoned because its deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the failure came from the network path rather than from
    /// the caller's input or the bulb's answer.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Socket { .. }
                | Error::InvalidResponse { .. }
                | Error::Device { .. }
        )
    }

    /// Whether the bulb rejected the method as unknown.
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Error::MethodNotFound(_))
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = Error::Timeout {
            ip: IpAddr::from([1, 1, 1, 1]),
            method: Method::GetPilot,
            attempts: 6,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_connection_error());

        let refused = Error::socket(
            "receive",
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        );
        assert!(refused.is_connection_error());
        assert!(Error::MethodNotFound(Method::GetModelConfig).is_method_not_found());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::MethodNotFound(Method::GetModelConfig).to_string(),
            "method getModelConfig not found; maybe older bulb firmware?"
        );
        assert_eq!(
            Error::out_of_range("speed", "must be between 10 and 200").to_string(),
            "speed is out of range; must be between 10 and 200"
        );
    }
}
