//! Control API request and response bodies.
//!
//! Request enums arrive as plain strings so the server can reject bad values
//! with a structured `BadRequest` instead of a generic decode failure.

use crate::{BotSummary, Location, Position, TaskStatus, Tile, VisualState};
use crate::{BotView, Direction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SAY_DURATION_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Owning controller; defaults to `id`.
    #[serde(default)]
    pub controller: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnbindRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub id: String,
    pub direction: String,
}

/// Either `location` or both `x` and `y`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GotoRequest {
    pub id: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    pub id: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SayRequest {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusRequest {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `{ ok: true, ...body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Success<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Success<T> {
    pub fn new(body: T) -> Self {
        Self { ok: true, body }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundBot {
    pub id: String,
    pub name: String,
    pub character: String,
    pub position: Position,
    pub bound_by: Option<String>,
}

impl From<&BotView> for BoundBot {
    fn from(v: &BotView) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            character: v.character.clone(),
            position: v.position,
            bound_by: v.bound_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindResponse {
    pub bot: BoundBot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub bots: Vec<BotSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotoResponse {
    pub path: Vec<Tile>,
    pub target: Tile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: VisualState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SayResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub task_status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    pub locations: BTreeMap<String, Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeTokenResponse {
    pub token: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    Forbidden,
    AlreadyBound,
    Unbound,
    UnknownLocation,
    NoPathFound,
    NoWalkableTileFound,
    MapUnavailable,
    Internal,
}

/// `{ ok: false, error, message, ...detail }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: ErrorCode,
    pub message: String,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}
