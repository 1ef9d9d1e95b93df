//! Message history tracking for debugging and diagnostics.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::message::Method;

/// Direction of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Send,
    Receive,
    Push,
}

/// A recorded message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub msg_type: MessageType,
    pub method: Method,
    pub message: Value,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// The last message per direction and method, plus a bounded log of
/// everything exchanged with one bulb.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    latest: HashMap<MessageType, HashMap<Method, Value>>,
    last_error: Option<String>,
    start_time: Instant,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self {
            latest: HashMap::new(),
            last_error: None,
            start_time: Instant::now(),
            entries: Vec::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    pub fn record(&mut self, msg_type: MessageType, method: Method, message: &Value) {
        self.latest
            .entry(msg_type)
            .or_default()
            .insert(method, message.clone());

        self.entries.push(HistoryEntry {
            msg_type,
            method,
            message: message.clone(),
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The most recent message of a direction and method.
    pub fn latest(&self, msg_type: MessageType, method: Method) -> Option<&Value> {
        self.latest.get(&msg_type)?.get(&method)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.latest.clear();
        self.entries.clear();
        self.last_error = None;
    }

    /// The latest messages grouped by direction, then method.
    pub fn to_json(&self) -> Value {
        let direction = |t: MessageType| -> Value {
            self.latest
                .get(&t)
                .map(|methods| {
                    methods
                        .iter()
                        .map(|(method, message)| (method.to_string(), message.clone()))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                })
                .unwrap_or_else(|| json!({}))
        };
        json!({
            "send": direction(MessageType::Send),
            "receive": direction(MessageType::Receive),
            "push": direction(MessageType::Push),
            "last_error": self.last_error,
        })
    }

    pub fn summary(&self) -> HistorySummary {
        let count = |t: MessageType| self.latest.get(&t).map_or(0, |m| m.len());
        HistorySummary {
            send_count: count(MessageType::Send),
            receive_count: count(MessageType::Receive),
            push_count: count(MessageType::Push),
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Summary of message history for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub send_count: usize,
    pub receive_count: usize,
    pub push_count: usize,
    pub total_entries: usize,
    pub last_error: Option<String>,
}
