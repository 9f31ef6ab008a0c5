//! Control messages sent from pages to the worker.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Recognized page→worker messages.
///
/// Pages post bare strings, e.g. `"GET_VERSION"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting generation without waiting for pages to close.
    SkipWaiting,
    /// Ask for the current generation id.
    GetVersion,
}

impl ControlMessage {
    /// Parse a posted message; anything unrecognized yields `None`.
    pub fn parse(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}

/// Reply to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

/// Port a page supplies for replies.
pub type ReplyPort = oneshot::Sender<VersionReply>;

/// What handling a message led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A version reply was sent.
    Replied(VersionReply),
    /// The page asked to skip waiting.
    SkipWaiting,
    /// Unrecognized message, or no port to reply on.
    Ignored,
}
