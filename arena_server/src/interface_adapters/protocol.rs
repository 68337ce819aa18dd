// Wire protocol DTOs, conversions and the JSON codec for the session WebSocket.
//
// Every frame is a flat JSON object whose `type` field selects the message.

use crate::domain::systems::projectiles::{DestroyedBlock, WallHit};
use crate::domain::{ArenaBounds, Block, BlockKind, GameState, Projectile, SessionPhase, Vec3};
use axum::extract::ws::Utf8Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client frames the session framework understands; everything else belongs to the app.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    ParticipantReady,
    PlayAgainVote,
    BotIdentify,
    App(AppMessage),
}

/// An app-level frame: the raw object plus its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct AppMessage {
    pub kind: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
    #[error("message must be a JSON object")]
    NotAnObject,
    #[error("message is missing a string `type` field")]
    MissingType,
    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Parses one text frame. Never panics on hostile input.
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
    let Value::Object(ref object) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    let Some(kind) = object.get("type").and_then(Value::as_str) else {
        return Err(ProtocolError::MissingType);
    };

    Ok(match kind {
        "participant_ready" => Inbound::ParticipantReady,
        "play_again_vote" => Inbound::PlayAgainVote,
        "bot_identify" => Inbound::BotIdentify,
        other => Inbound::App(AppMessage {
            kind: other.to_string(),
            body: value.clone(),
        }),
    })
}

/// Validates an app frame against its typed payload schema.
pub fn decode_payload<T: DeserializeOwned>(message: &AppMessage) -> Result<T, ProtocolError> {
    T::deserialize(&message.body).map_err(|e| ProtocolError::InvalidPayload {
        kind: message.kind.clone(),
        reason: e.to_string(),
    })
}

/// Serializes an outbound message once so it can be shared by every recipient.
pub fn encode<T: Serialize>(message: &T) -> Result<Utf8Bytes, serde_json::Error> {
    serde_json::to_string(message).map(Utf8Bytes::from)
}

/// Framework messages the server sends to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Welcome {
        participant_id: String,
        participant_number: u8,
        session_phase: SessionPhaseDto,
        app_data: Value,
    },
    #[serde(rename_all = "camelCase")]
    OpponentJoined {
        participant_id: String,
        participant_number: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    OpponentLeft { participant_id: String },
    #[serde(rename_all = "camelCase")]
    ReadyStatus {
        ready_participant_ids: Vec<String>,
        total_participants: usize,
    },
    SessionStarted,
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_number: Option<u8>,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    PlayAgainStatus {
        voted_participant_ids: Vec<String>,
        voted_count: usize,
        total_participants: usize,
    },
    #[serde(rename_all = "camelCase")]
    SessionReset {
        #[serde(skip_serializing_if = "Option::is_none")]
        app_data: Option<Value>,
    },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Session phase as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhaseDto {
    Waiting,
    Playing,
    Finished,
}

impl From<SessionPhase> for SessionPhaseDto {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Waiting => SessionPhaseDto::Waiting,
            SessionPhase::Playing => SessionPhaseDto::Playing,
            SessionPhase::Finished => SessionPhaseDto::Finished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3Dto {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Dto {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Dto> for Vec3 {
    fn from(v: Vec3Dto) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

// Block battle client payloads.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockGrabPayload {
    pub block_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMovePayload {
    pub block_id: String,
    pub position: Vec3Dto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReleasePayload {
    pub block_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CannonFirePayload {
    pub cannon_id: String,
}

/// Block battle broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    #[serde(rename_all = "camelCase")]
    BlockGrabbed {
        block_id: String,
        participant_id: String,
    },
    #[serde(rename_all = "camelCase")]
    BlockReleased {
        block_id: String,
        participant_id: String,
    },
    #[serde(rename_all = "camelCase")]
    BlockMoved { block_id: String, position: Vec3Dto },
    BlocksPushed { blocks: Vec<BlockDto> },
    #[serde(rename_all = "camelCase")]
    BlocksRemoved {
        owner_id: String,
        block_ids: Vec<String>,
    },
    ProjectileSpawned { projectile: ProjectileDto },
    ProjectilesUpdate { projectiles: Vec<ProjectileDto> },
    #[serde(rename_all = "camelCase")]
    BlockDestroyed {
        block_id: String,
        position: Vec3Dto,
        color: String,
    },
    #[serde(rename_all = "camelCase")]
    WallHit {
        position: Vec3Dto,
        wall_side: &'static str,
    },
}

impl From<&DestroyedBlock> for BattleEvent {
    fn from(destroyed: &DestroyedBlock) -> Self {
        BattleEvent::BlockDestroyed {
            block_id: destroyed.block_id.clone(),
            position: destroyed.position.into(),
            color: destroyed.color.clone(),
        }
    }
}

impl From<&WallHit> for BattleEvent {
    fn from(hit: &WallHit) -> Self {
        BattleEvent::WallHit {
            position: hit.position.into(),
            wall_side: hit.side.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTypeDto {
    Regular,
    Cannon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDto {
    pub id: String,
    pub position: Vec3Dto,
    pub color: String,
    pub owner_id: String,
    pub block_type: BlockTypeDto,
}

impl From<&Block> for BlockDto {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            position: block.position.into(),
            color: block.color.clone(),
            owner_id: block.owner_id.clone(),
            block_type: match block.kind {
                BlockKind::Regular => BlockTypeDto::Regular,
                BlockKind::Cannon => BlockTypeDto::Cannon,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileDto {
    pub id: String,
    pub position: Vec3Dto,
    pub velocity: Vec3Dto,
    pub owner_id: String,
    pub color: String,
}

impl From<&Projectile> for ProjectileDto {
    fn from(projectile: &Projectile) -> Self {
        Self {
            id: projectile.id.clone(),
            position: projectile.position.into(),
            velocity: projectile.velocity.into(),
            owner_id: projectile.owner_id.clone(),
            color: projectile.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArenaDto {
    pub min: Vec3Dto,
    pub max: Vec3Dto,
}

/// Full block battle state, sent as `appData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleStateDto {
    pub blocks: Vec<BlockDto>,
    pub projectiles: Vec<ProjectileDto>,
    pub arena: ArenaDto,
}

impl BattleStateDto {
    pub fn new(state: &GameState, bounds: &ArenaBounds) -> Self {
        Self {
            blocks: state.blocks.values().map(BlockDto::from).collect(),
            projectiles: state.projectiles.values().map(ProjectileDto::from).collect(),
            arena: ArenaDto {
                min: bounds.min.into(),
                max: bounds.max.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn when_text_is_not_json_then_malformed_json_error() {
        assert!(matches!(decode("{not json"), Err(ProtocolError::MalformedJson(_))));
    }

    #[test]
    fn when_type_is_missing_or_not_a_string_then_missing_type_error() {
        assert_eq!(decode(r#"{"blockId":"b"}"#), Err(ProtocolError::MissingType));
        assert_eq!(decode(r#"{"type":7}"#), Err(ProtocolError::MissingType));
        assert_eq!(decode("[1,2]"), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn when_framework_type_then_typed_variant_is_returned() {
        assert_eq!(decode(r#"{"type":"participant_ready"}"#), Ok(Inbound::ParticipantReady));
        assert_eq!(decode(r#"{"type":"play_again_vote"}"#), Ok(Inbound::PlayAgainVote));
        assert_eq!(decode(r#"{"type":"bot_identify","extra":1}"#), Ok(Inbound::BotIdentify));
    }

    #[test]
    fn when_unknown_type_then_message_is_handed_to_the_app() {
        let decoded = decode(r#"{"type":"block_grab","blockId":"block-1"}"#);

        let Ok(Inbound::App(message)) = decoded else {
            panic!("expected app message, got {decoded:?}");
        };
        assert_eq!(message.kind, "block_grab");
        let payload: BlockGrabPayload = decode_payload(&message).expect("valid payload");
        assert_eq!(payload.block_id, "block-1");
    }

    #[test]
    fn when_payload_misses_fields_then_invalid_payload_error() {
        let Ok(Inbound::App(message)) = decode(r#"{"type":"block_move","blockId":"b"}"#) else {
            panic!("expected app message");
        };

        let result = decode_payload::<BlockMovePayload>(&message);

        assert!(matches!(result, Err(ProtocolError::InvalidPayload { kind, .. }) if kind == "block_move"));
    }

    #[test]
    fn when_encoding_welcome_then_fields_are_flat_and_camel_case() {
        let message = ServerMessage::Welcome {
            participant_id: "p1".to_string(),
            participant_number: 1,
            session_phase: SessionPhase::Waiting.into(),
            app_data: json!({"blocks": []}),
        };

        let value: Value = serde_json::to_value(&message).expect("serializable");

        assert_eq!(
            value,
            json!({
                "type": "welcome",
                "participantId": "p1",
                "participantNumber": 1,
                "sessionPhase": "waiting",
                "appData": {"blocks": []}
            })
        );
    }

    #[test]
    fn when_encoding_session_ended_without_winner_then_winner_fields_are_omitted() {
        let message = ServerMessage::SessionEnded {
            winner_id: None,
            winner_number: None,
            reason: "timeout".to_string(),
            app_data: None,
        };

        let value: Value = serde_json::to_value(&message).expect("serializable");

        assert_eq!(value, json!({"type": "session_ended", "reason": "timeout"}));
        assert_eq!(
            serde_json::to_value(ServerMessage::SessionStarted).expect("serializable"),
            json!({"type": "session_started"})
        );
    }

    #[test]
    fn when_encoding_wall_hit_then_wall_side_uses_bound_name() {
        let event = BattleEvent::WallHit {
            position: Vec3Dto {
                x: 0.0,
                y: 1.0,
                z: -12.0,
            },
            wall_side: "minZ",
        };

        let value: Value = serde_json::to_value(&event).expect("serializable");

        assert_eq!(value["type"], "wall_hit");
        assert_eq!(value["wallSide"], "minZ");
    }
}
