//! Messages exchanged between clients and the coordinator.

use serde::{Deserialize, Serialize};

/// Control message sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting version now.
    SkipWaiting,
    /// Run the version-drift check immediately.
    CheckVersion,
    /// Delete every store.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCaches,
}

/// Notification broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorEvent {
    /// The deployed version differs from the running one.
    UpdateAvailable { current: String, new: String },
    /// A new version took over request handling.
    ControllerChanged { version: String },
}

impl CoordinatorEvent {
    /// Name used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorEvent::UpdateAvailable { .. } => "UPDATE_AVAILABLE",
            CoordinatorEvent::ControllerChanged { .. } => "CONTROLLER_CHANGED",
        }
    }
}

/// Reply to a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Acknowledgement {
    CacheCleared { success: bool },
}
