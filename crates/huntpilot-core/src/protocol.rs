//! Protocol types for CLI-daemon and daemon-bridge communication.
//!
//! Both links speak newline-delimited JSON. The control protocol carries
//! operator/detector commands into the driver; the bridge protocol carries
//! synthetic events out to the game window shim and observed state back.

use serde::{Deserialize, Serialize};

use crate::acquire::AttemptState;
use crate::error::ApiError;
use crate::input::SyntheticEvent;

/// A request from CLI (or the detection collaborator) to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub command: Command,
}

/// Commands the daemon can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Request a confirmed attack click at a viewport coordinate.
    /// Bursts coalesce; only the newest pending request is acted on.
    Target { x: i32, y: i32 },
    /// Unconditional click at a coordinate, no target confirmation.
    Click { x: i32, y: i32 },
    /// Fire a slot directly (bar-select key plus slot digit).
    Slot { bar: u8, index: usize },
    /// Send a key to the client: a press, or a hold released after
    /// `hold_ms`.
    Key { key: String, hold_ms: Option<u64> },
    /// Put text into the client's chat input.
    Chat { text: String },
    /// Enable or disable the action rotation.
    Rotation { enabled: bool },
    /// Block until the host cursor token matches a pattern.
    WaitCursor {
        pattern: String,
        timeout_ms: Option<u64>,
        regex: Option<bool>,
    },
    /// Report driver state.
    Status,
    /// Shutdown the daemon gracefully.
    Shutdown,
}

/// A response from daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    pub fn success(id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ApiError) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Response payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Driver state report.
    Status(DriverStatus),
    /// Wait-cursor result with match info.
    WaitCursorResult {
        matched: bool,
        token: Option<String>,
        elapsed_ms: u64,
    },
    /// Generic success message.
    Ok { message: String },
}

/// Snapshot of driver state for `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub attempt_state: AttemptState,
    pub generation: u64,
    pub tries: u32,
    pub bridge_connected: bool,
    pub rotation_enabled: bool,
    pub clicks: u64,
    pub targets_lost: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
    pub started_at: String,
}

/// A command from the daemon to the game-window shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Deliver a synthetic event to the client's dispatch entry point.
    Dispatch { event: SyntheticEvent },
    /// Draw a short-lived debug marker at a point.
    Marker {
        x: i32,
        y: i32,
        color: String,
        ttl_ms: u64,
    },
    /// Draw a short-lived debug rectangle.
    Bounds {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        ttl_ms: u64,
    },
    /// Put text into the chat input and select it.
    Chat { text: String },
}

/// A message from the game-window shim to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The host's cursor style token changed.
    Cursor { token: String },
    /// A genuine event captured on the overlay surface, to be forwarded to
    /// the host.
    Input { event: SyntheticEvent },
    /// Vital-sign reading scraped from the client HUD, consumed by the
    /// rotation's threshold slots.
    Vitals { hp_percent: u8 },
}
