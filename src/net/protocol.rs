use serde::{Deserialize, Serialize};

use crate::game::constants::store::{ADDON_MESSAGE_TYPE, ARENA_KEY_PREFIX};
use crate::game::state::Arena;
use crate::net::store::FieldMap;

/// Key of the shared record for one arena of one server
pub fn record_key(server_id: &str, arena_identifier: &str) -> String {
    format!("{}{}-{}", ARENA_KEY_PREFIX, server_id, arena_identifier)
}

/// Record field naming the owning server
pub const SERVER_NAME_FIELD: &str = "server_name";

/// Glob matching every record owned by a server. Also matches servers whose
/// id starts with `{server_id}-`; check [`SERVER_NAME_FIELD`] before deleting.
pub fn server_pattern(server_id: &str) -> String {
    format!("{}{}-*", ARENA_KEY_PREFIX, server_id)
}

/// Outward-facing status of one arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedRecord {
    pub server_name: String,
    pub arena_name: String,
    pub arena_identifier: String,
    /// Upper-case phase name (WAITING, STARTING, PLAYING, RESTARTING)
    pub arena_status: String,
    pub arena_current_players: usize,
    pub arena_max_players: usize,
    pub arena_max_in_team: usize,
    /// Upper-case group tag
    pub arena_group: String,
    pub allow_spectate: bool,
}

impl DistributedRecord {
    pub fn from_arena(server_id: &str, arena: &Arena) -> Self {
        Self {
            server_name: server_id.to_string(),
            arena_name: arena.name.clone(),
            arena_identifier: arena.identifier.clone(),
            arena_status: arena.phase().as_str().to_uppercase(),
            arena_current_players: arena.player_count(),
            arena_max_players: arena.max_players(),
            arena_max_in_team: arena.max_in_team,
            arena_group: arena.group.to_uppercase(),
            allow_spectate: arena.allow_spectate,
        }
    }

    pub fn key(&self) -> String {
        record_key(&self.server_name, &self.arena_identifier)
    }

    /// Hash fields as stored
    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            (SERVER_NAME_FIELD.to_string(), self.server_name.clone()),
            ("arena_name".to_string(), self.arena_name.clone()),
            ("arena_identifier".to_string(), self.arena_identifier.clone()),
            ("arena_status".to_string(), self.arena_status.clone()),
            ("arena_current_players".to_string(), self.arena_current_players.to_string()),
            ("arena_max_players".to_string(), self.arena_max_players.to_string()),
            ("arena_max_in_team".to_string(), self.arena_max_in_team.to_string()),
            ("arena_group".to_string(), self.arena_group.clone()),
            ("allow_spectate".to_string(), self.allow_spectate.to_string()),
        ]
    }

    /// Rebuild a record read back from the store
    pub fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        fn text(fields: &FieldMap, name: &str) -> Result<String, DecodeError> {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| DecodeError(format!("missing field {}", name)))
        }
        fn parsed<T: std::str::FromStr>(fields: &FieldMap, name: &str) -> Result<T, DecodeError> {
            text(fields, name)?
                .parse()
                .map_err(|_| DecodeError(format!("invalid field {}", name)))
        }

        Ok(Self {
            server_name: text(fields, "server_name")?,
            arena_name: text(fields, "arena_name")?,
            arena_identifier: text(fields, "arena_identifier")?,
            arena_status: text(fields, "arena_status")?,
            arena_current_players: parsed(fields, "arena_current_players")?,
            arena_max_players: parsed(fields, "arena_max_players")?,
            arena_max_in_team: parsed(fields, "arena_max_in_team")?,
            arena_group: text(fields, "arena_group")?,
            allow_spectate: parsed(fields, "allow_spectate")?,
        })
    }
}

/// Addon payload relayed between servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub addon_name: String,
    /// JSON document encoded as a string
    pub addon_data: String,
}

impl AddonEnvelope {
    pub fn new(addon_name: impl Into<String>, data: &serde_json::Value) -> Self {
        Self {
            kind: ADDON_MESSAGE_TYPE.to_string(),
            addon_name: addon_name.into(),
            addon_data: data.to_string(),
        }
    }

    /// Parse the embedded payload
    pub fn data(&self) -> Result<serde_json::Value, DecodeError> {
        serde_json::from_str(&self.addon_data).map_err(|e| DecodeError(e.to_string()))
    }
}

/// Message carried on the shared channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    /// Free-form status notification
    Plain(String),
    /// Tagged payload for a named addon
    Addon(AddonEnvelope),
}

impl ChannelMessage {
    pub fn addon(addon_name: impl Into<String>, data: &serde_json::Value) -> Self {
        ChannelMessage::Addon(AddonEnvelope::new(addon_name, data))
    }

    pub fn encode(&self) -> Result<String, EncodeError> {
        match self {
            ChannelMessage::Plain(text) => Ok(text.clone()),
            ChannelMessage::Addon(envelope) => {
                serde_json::to_string(envelope).map_err(|e| EncodeError(e.to_string()))
            }
        }
    }

    /// Anything that is not an addon envelope is delivered as plain text
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<AddonEnvelope>(raw) {
            Ok(envelope) if envelope.kind == ADDON_MESSAGE_TYPE => ChannelMessage::Addon(envelope),
            _ => ChannelMessage::Plain(raw.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
