use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every message the server writes to a session carries a `type` discriminant.
/// This is not an exhaustive wire format for client->server traffic — inbound
/// lines during `playing` are raw command text, parsed by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomInfo(RoomInfo),
    RoomMessage(TextMessage),
    SystemMessage(TextMessage),
    ChatMessage(ChatMessage),
    PrivateMessage(ChatMessage),
    PlayerJoined(PlayerRoomEvent),
    PlayerLeft(PlayerRoomEvent),
    PlayerMoved(PlayerMoved),
    CombatStart(CombatStart),
    CombatMessage(TextMessage),
    CombatStatus(CombatStatus),
    CombatEnd(CombatEnd),
    TurnStart(TurnStart),
    ActionResult(ActionResult),
    MonsterAggro(MonsterAggro),
    ShopList(ShopList),
    TransactionResult(ActionResult),
    NpcDialogue(NpcDialogue),
    Stats(Value),
    Inventory(Value),
    UiUpdate(Value),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextMessage {
    pub message: String,
}

impl TextMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomInfo {
    pub room_id: String,
    pub name: String,
    pub description: String,
    pub exits: Vec<String>,
    pub players: Vec<String>,
    pub monsters: Vec<String>,
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRoomEvent {
    pub room_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerMoved {
    pub player_name: String,
    pub direction: Option<String>,
    pub from_room_id: String,
    pub to_room_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatStart {
    pub instance_id: String,
    pub room_id: String,
    pub combatants: Vec<CombatantSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatantSummary {
    pub id: String,
    pub display_name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub speed: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatStatus {
    pub instance_id: String,
    pub turn_number: u32,
    pub combatants: Vec<CombatantSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnStart {
    pub instance_id: String,
    pub turn_number: u32,
    pub actor_id: String,
    pub actor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatEnd {
    pub instance_id: String,
    pub victor: CombatVictor,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CombatVictor {
    Players,
    Monsters,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterAggro {
    pub monster_name: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopList {
    pub npc_name: String,
    pub items: Vec<ShopItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopItem {
    pub object_id: String,
    pub name: String,
    pub price: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcDialogue {
    pub npc_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// `{action, message, data}` nested under `data` in the success envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActionResult {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Top-level success/error envelope per the wire contract: `{status, data}` or
/// `{status, message}`. This wraps a [`ServerMessage`] only for command
/// responses; broadcasts are sent as bare `ServerMessage` lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    Success { data: ActionResult },
    Error { message: String },
}

impl Envelope {
    pub fn success(action: impl Into<String>, message: Option<String>, data: Option<Value>) -> Self {
        Envelope::Success {
            data: ActionResult {
                action: action.into(),
                message,
                data,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }
}

/// Accepts the legacy `{status, action, message, data}` flat shape produced by
/// older clients, normalizing it to the current nested [`Envelope`]. Only used
/// by tests exercising backward-compat parsing; the server never emits it.
#[derive(Debug, Clone, Deserialize)]
struct LegacyEnvelope {
    status: String,
    action: Option<String>,
    message: Option<String>,
    data: Option<Value>,
}

pub fn parse_envelope_compat(line: &str) -> Result<Envelope, serde_json::Error> {
    if let Ok(envelope) = serde_json::from_str::<Envelope>(line) {
        return Ok(envelope);
    }

    let legacy: LegacyEnvelope = serde_json::from_str(line)?;
    Ok(match legacy.status.as_str() {
        "success" => Envelope::success(
            legacy.action.unwrap_or_default(),
            legacy.message,
            legacy.data,
        ),
        _ => Envelope::error(legacy.message.unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = Envelope::success("look", Some("ok".to_string()), None);
        let line = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&line).unwrap();
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn legacy_flat_shape_is_accepted() {
        let legacy = r#"{"status":"success","action":"login_success","message":"welcome","data":null}"#;
        let parsed = parse_envelope_compat(legacy).unwrap();
        match parsed {
            Envelope::Success { data } => assert_eq!(data.action, "login_success"),
            Envelope::Error { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn server_message_tags_by_type_field() {
        let msg = ServerMessage::SystemMessage(TextMessage::new("hi"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "system_message");
        assert_eq!(json["message"], "hi");
    }
}
