use serde::{Deserialize, Serialize};

/// Frames the server itself originates on a realtime channel. Relayed
/// annotation events are forwarded as received and never wrapped.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "error")]
    Error { message: String },
}
