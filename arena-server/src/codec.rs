//! Wire framing for client traffic.
//!
//! The transport is external; it hands the runtime opaque frames and takes
//! encoded frames back. Two formats share the same message types: JSON text
//! for browsers and debugging, bincode for compact binary sockets.

use arena_core::messages::{ClientMessage, ServerMessage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

impl FromStr for WireFormat {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(WireFormat::Json),
            "bincode" | "binary" => Ok(WireFormat::Bincode),
            other => Err(ServerError::Config(format!("unknown wire format {other:?}"))),
        }
    }
}

impl WireFormat {
    pub fn encode(&self, msg: &ServerMessage) -> ServerResult<Vec<u8>> {
        Ok(match self {
            WireFormat::Json => serde_json::to_vec(msg)?,
            WireFormat::Bincode => bincode::serialize(msg)?,
        })
    }

    /// Decode one client frame. Callers drop frames that fail.
    pub fn decode(&self, frame: &[u8]) -> ServerResult<ClientMessage> {
        Ok(match self {
            WireFormat::Json => serde_json::from_slice(frame)?,
            WireFormat::Bincode => bincode::deserialize(frame)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::entities::PlayerId;

    #[test]
    fn test_json_decode_input() {
        let msg = WireFormat::Json
            .decode(br#"{"input":{"angle":0.5,"moving":true}}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::Input { angle: 0.5, moving: true });
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(WireFormat::Json.decode(b"{nope").is_err());
        assert!(WireFormat::Bincode.decode(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_bincode_is_smaller_than_json() {
        let msg = ServerMessage::Joined {
            player_id: PlayerId(7),
            room: "room-1".into(),
            map_size: 4000.0,
            safe_zone_radius: 300.0,
        };
        let json = WireFormat::Json.encode(&msg).unwrap();
        let bin = WireFormat::Bincode.encode(&msg).unwrap();
        assert!(bin.len() < json.len());
    }

    #[test]
    fn test_bincode_client_frame() {
        let sent = ClientMessage::LevelUp { choice_index: 1 };
        let frame = bincode::serialize(&sent).unwrap();
        assert_eq!(WireFormat::Bincode.decode(&frame).unwrap(), sent);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("BINARY".parse::<WireFormat>().unwrap(), WireFormat::Bincode);
        assert!("xml".parse::<WireFormat>().is_err());
    }
}
