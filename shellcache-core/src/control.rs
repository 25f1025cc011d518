//! Control messages posted by the foreground application.
//!
//! Messages travel as JSON objects with a `type` discriminator and an
//! optional `payload`:
//!
//! ```json
//! {"type": "SKIP_WAITING"}
//! {"type": "CLEAR_CACHE", "payload": {"reason": "logout"}}
//! ```
//!
//! Unknown types are not an error: [`ControlMessage::from_json`] returns
//! `Ok(None)` so the receiver can ignore them silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands understood by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Promote the pending generation immediately.
    SkipWaiting,
    /// Delete every namespace, of every generation.
    ClearCache,
}

impl ControlCommand {
    /// Returns the wire name of the command.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::SkipWaiting => "SKIP_WAITING",
            ControlCommand::ClearCache => "CLEAR_CACHE",
        }
    }

    /// Looks up a command by its wire name.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "SKIP_WAITING" => Some(ControlCommand::SkipWaiting),
            "CLEAR_CACHE" => Some(ControlCommand::ClearCache),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

/// A parsed control message.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    command: ControlCommand,
    payload: Option<Value>,
}

impl ControlMessage {
    /// Creates a message without payload.
    pub fn new(command: ControlCommand) -> Self {
        Self {
            command,
            payload: None,
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns the command.
    pub fn command(&self) -> ControlCommand {
        self.command
    }

    /// Returns the payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Parses a message from its JSON form.
    ///
    /// Returns `Ok(None)` for well-formed messages with an unknown type and
    /// `Err` for malformed JSON or a missing `type`.
    pub fn from_json(raw: &str) -> Result<Option<Self>, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        Ok(
            ControlCommand::from_wire(&envelope.kind).map(|command| Self {
                command,
                payload: envelope.payload,
            }),
        )
    }

    /// Serializes the message to its JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Envelope {
            kind: self.command.as_str().to_owned(),
            payload: self.payload.clone(),
        })
    }
}

impl From<ControlCommand> for ControlMessage {
    fn from(command: ControlCommand) -> Self {
        Self::new(command)
    }
}
