//! Core protocol types for Jewelfall's wire format.
//!
//! Everything here crosses the network. Inbound traffic is a
//! [`ClientIntent`], outbound traffic is a [`ServerEvent`], and both travel
//! inside an [`Envelope`]. Every shape is an explicit tagged type, so a
//! malformed frame fails at decode time and never reaches a room.

use std::fmt;

// `Serialize` means "can be written out as JSON", `Deserialize` means "can be
// built from JSON". `#[derive(...)]` generates both from the type's fields,
// and the `#[serde(...)]` attributes below adjust the generated shape.
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Number of player slots in every room.
pub const ROOM_CAPACITY: usize = 2;

const MAX_ROOM_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 256;
const MAX_DISPLAY_NAME_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// A newtype around `u64`. The wrapper costs nothing at runtime but keeps a
/// `RoomId` from being passed where a [`ConnectionId`] is expected, even
/// though both are numbers underneath.
///
/// What the derives buy:
/// - `Clone, Copy`: ids are passed by value everywhere, like the integer
///   they wrap.
/// - `PartialEq, Eq, Hash`: comparison and use as a map key.
/// - `PartialOrd, Ord`: the registry keeps rooms in a `BTreeMap`, so
///   `roomList` comes back in creation order.
/// - `Serialize, Deserialize`: wire conversion.
///
/// `#[serde(transparent)]` serializes the inner number alone, so
/// `RoomId(4)` is `4` on the wire rather than `[4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Opaque identifier for one client connection.
///
/// Rooms keep connection ids in their rosters; the server maps them to
/// live sockets. The id itself never changes while the connection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One of the two player positions in a room.
///
/// Clients send the number `1` or `2`. `#[serde(try_from = "u8", into =
/// "u8")]` routes serde through the `TryFrom<u8>` and `From<Slot>` impls
/// below, so the enum is a plain number on the wire and any other number
/// fails to decode instead of reaching a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// Both slots, in tick order.
    pub const ALL: [Slot; ROOM_CAPACITY] = [Slot::One, Slot::Two];

    /// Zero-based index for per-slot arrays.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// The wire number, 1 or 2.
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// The other slot in the room.
    pub fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("slot must be 1 or 2, got {other}")),
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.number()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ---------------------------------------------------------------------------
// Room status and discovery
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
///
/// ```text
/// waiting → playing ⇄ paused → finished
///    ↓         ↓                   ↑
///    └→ paused ┴───────────────────┘
/// ```
///
/// `finished` is terminal. A room may also go `waiting → paused` when both
/// players are present but nobody is watching yet, and back to `waiting`
/// if a player leaves before the match ever started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if players may still take a slot.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoomStatus::*;
        matches!(
            (self, target),
            (Waiting, Playing)
                | (Waiting, Paused)
                | (Playing, Paused)
                | (Playing, Finished)
                | (Paused, Playing)
                | (Paused, Waiting)
                | (Paused, Finished)
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Read-only projection of a room used for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub description: String,
    pub player_count: usize,
    /// Always [`ROOM_CAPACITY`].
    pub capacity: usize,
    pub viewer_count: usize,
    pub status: RoomStatus,
}

// ---------------------------------------------------------------------------
// Grid payloads
// ---------------------------------------------------------------------------

/// One occupied cell in a slot's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JewelCell {
    pub x: usize,
    pub y: usize,
    pub jewel_type: u8,
}

/// Board dimensions and owner of a slot, sent once per slot on game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSetup {
    pub slot: Slot,
    pub display_name: String,
    pub width: usize,
    pub height: usize,
}

/// Full view of one slot: every occupied grid cell plus the visible cells
/// of the active piece. Each update replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridUpdate {
    pub slot: Slot,
    pub display_name: String,
    pub updated_nodes: Vec<JewelCell>,
}

/// Why a room stopped ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    /// The viewer set became empty.
    NoViewers,
}

/// How a game was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndCause {
    /// The loser's spawn position was blocked.
    BoardFull,
    /// The loser left the room mid-game.
    Forfeit,
}

// ---------------------------------------------------------------------------
// Intents (client → server)
// ---------------------------------------------------------------------------

/// A request from a connection.
///
/// Internally tagged: the variant name goes in an `intent` field next to
/// the variant's own fields.
///
/// ```json
/// {"intent": "joinAsViewer", "roomId": 4}
/// ```
///
/// `rename_all` turns variant names into camelCase (`JoinAsViewer` becomes
/// `joinAsViewer`); `rename_all_fields` does the same for the fields inside
/// each variant (`room_id` becomes `roomId`). An unknown `intent` value is
/// a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "intent",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientIntent {
    /// Ask for the room list. Also subscribes the connection to
    /// `roomList` pushes whenever the registry changes.
    ListRooms,
    CreateRoom {
        name: String,
        #[serde(default)]
        description: String,
    },
    /// Take a player slot. Without `slot`, the first free one is assigned.
    JoinAsPlayer {
        room_id: RoomId,
        display_name: String,
        #[serde(default)]
        slot: Option<Slot>,
    },
    JoinAsViewer {
        room_id: RoomId,
    },
    Input {
        room_id: RoomId,
        slot: Slot,
        direction: Direction,
    },
    RequestFullState {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Heartbeat {
        client_time: u64,
    },
}

impl ClientIntent {
    /// Checks rules that decoding alone cannot express.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for blank or oversized
    /// names.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::CreateRoom { name, description } => {
                check_text("room name", name, MAX_ROOM_NAME_LEN)?;
                if description.chars().count() > MAX_DESCRIPTION_LEN {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "description longer than {MAX_DESCRIPTION_LEN} characters"
                    )));
                }
                Ok(())
            }
            Self::JoinAsPlayer { display_name, .. } => {
                check_text("display name", display_name, MAX_DISPLAY_NAME_LEN)
            }
            _ => Ok(()),
        }
    }
}

fn check_text(what: &str, value: &str, max: usize) -> Result<(), ProtocolError> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidMessage(format!("{what} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(ProtocolError::InvalidMessage(format!(
            "{what} longer than {max} characters"
        )));
    }
    Ok(())
}

/// A movement command for a slot's active piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Down,
    Rotate,
}

// ---------------------------------------------------------------------------
// Events (server → client)
// ---------------------------------------------------------------------------

/// A named event pushed to a connection.
///
/// Adjacently tagged: the name and the payload sit in two separate fields.
/// Clients switch on `event` and hand `data` to the matching handler.
///
/// ```json
/// {"event": "gamePaused", "data": {"reason": "noViewers"}}
/// ```
///
/// Newtype variants such as `GridUpdate(GridUpdate)` put the inner struct
/// straight into `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    RoomList {
        rooms: Vec<RoomSummary>,
    },
    RoomCreated {
        room_id: RoomId,
    },
    JoinedAsPlayer {
        room_id: RoomId,
        slot: Slot,
    },
    JoinedAsViewer {
        room_id: RoomId,
    },
    GridSetup(GridSetup),
    GridUpdate(GridUpdate),
    GameStarted {
        room_id: RoomId,
    },
    GamePaused {
        reason: PauseReason,
    },
    GameResumed,
    /// A player gave up their slot before the match started. The room is
    /// `waiting` again and the slot is free.
    PlayerLeft {
        room_id: RoomId,
        slot: Slot,
    },
    GameEnded {
        winning_slot: Slot,
        winner_name: String,
        cause: EndCause,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    Error {
        code: u16,
        message: String,
    },
}

impl ServerEvent {
    /// The wire name of the event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomList { .. } => "roomList",
            Self::RoomCreated { .. } => "roomCreated",
            Self::JoinedAsPlayer { .. } => "joinedAsPlayer",
            Self::JoinedAsViewer { .. } => "joinedAsViewer",
            Self::GridSetup(_) => "gridSetup",
            Self::GridUpdate(_) => "gridUpdate",
            Self::GameStarted { .. } => "gameStarted",
            Self::GamePaused { .. } => "gamePaused",
            Self::GameResumed => "gameResumed",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::GameEnded { .. } => "gameEnded",
            Self::HeartbeatAck { .. } => "heartbeatAck",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// One recorded `gridUpdate`, stamped with seconds since the match started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFrame {
    pub timestamp: f64,
    pub slot: Slot,
    pub update: GridUpdate,
}

/// A finished game, ready to hand to a replay store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay {
    pub room_id: RoomId,
    pub room_name: String,
    /// Unix seconds when the match started.
    pub started_at: u64,
    pub player1_name: String,
    pub player2_name: String,
    pub winning_slot: Slot,
    pub frames: Vec<ReplayFrame>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Top-level frame wrapper for both directions.
///
/// Generic over the body: the server decodes `Envelope<ClientIntent>` and
/// encodes `Envelope<ServerEvent>`. The derives only hold when `T` has
/// the same trait, which is what serde's generated impls require anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-sender sequence number.
    pub seq: u64,
    /// Milliseconds since the sender started.
    pub timestamp: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, body: T) -> Self {
        Self { seq, timestamp, body }
    }
}
