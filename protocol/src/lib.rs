//! Wire protocol for the game's line-oriented TCP connections.
//!
//! Every session speaks newline-terminated JSON in one direction (server ->
//! client) and newline-terminated command text in the other (client ->
//! server, parsed by the dispatcher in the `server` crate, not here).

pub mod codec;
pub mod message;

pub use codec::{clean_input_line, encode_envelope, encode_message};
pub use message::{
    ActionResult, ChatMessage, CombatEnd, CombatStart, CombatStatus, CombatVictor,
    CombatantSummary, Envelope, ErrorPayload, MonsterAggro, NpcDialogue, PlayerMoved,
    PlayerRoomEvent, RoomInfo, ServerMessage, ShopItem, ShopList, TextMessage, TurnStart,
    parse_envelope_compat,
};
