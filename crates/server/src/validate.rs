//! Request validation. Everything here is a pure function of the request body;
//! nothing touches the registry, so a rejected request never changes state.

use crate::error::ApiError;
use claw_office_engine::Destination;
use claw_office_protocol::api::{GotoRequest, SayRequest, DEFAULT_SAY_DURATION_MS};
use claw_office_protocol::{Direction, Position, TaskStatusKind, Tile, VisualState};
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_SAY_DURATION_MS: u64 = 10 * 60 * 1000;

static BOT_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,63}$").ok());

/// Action segments under `/api/bots/`; a bot with one of these ids could
/// never be fetched by `GET /api/bots/{id}`.
pub const RESERVED_BOT_IDS: &[&str] =
    &["bind", "unbind", "move", "goto", "state", "say", "task-status"];

fn is_valid_id(id: &str) -> bool {
    BOT_ID.as_ref().is_some_and(|re| re.is_match(id))
}

pub fn is_valid_bot_id(id: &str) -> bool {
    is_valid_id(id) && !RESERVED_BOT_IDS.contains(&id)
}

pub fn bot_id(id: &str) -> Result<&str, ApiError> {
    if is_valid_bot_id(id) {
        Ok(id)
    } else {
        Err(ApiError::bad_request(format!("invalid bot id {id:?}")).with("field", "id".into()))
    }
}

pub fn controller<'a>(controller: Option<&'a str>, id: &'a str) -> Result<&'a str, ApiError> {
    match controller {
        None => Ok(id),
        Some(c) if is_valid_id(c) => Ok(c),
        Some(c) => Err(ApiError::bad_request(format!("invalid controller {c:?}"))
            .with("field", "controller".into())),
    }
}

pub fn name(name: Option<&str>) -> Result<Option<&str>, ApiError> {
    match name.map(str::trim) {
        None => Ok(None),
        Some("") => Err(ApiError::bad_request("name must not be empty")),
        Some(n) if n.chars().count() > MAX_NAME_LEN => Err(ApiError::bad_request(format!(
            "name longer than {MAX_NAME_LEN} characters"
        ))),
        Some(n) => Ok(Some(n)),
    }
}

pub fn direction(raw: &str) -> Result<Direction, ApiError> {
    Ok(raw.parse()?)
}

pub fn visual_state(raw: &str) -> Result<VisualState, ApiError> {
    Ok(raw.parse()?)
}

pub fn task_status(raw: &str) -> Result<TaskStatusKind, ApiError> {
    Ok(raw.parse()?)
}

pub fn description(raw: Option<&str>) -> Result<Option<&str>, ApiError> {
    match raw {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(ApiError::bad_request(
            format!("description longer than {MAX_DESCRIPTION_LEN} characters"),
        )),
        other => Ok(other),
    }
}

/// Exactly one of `location` or the `x`/`y` pair.
pub fn destination(req: &GotoRequest) -> Result<Destination, ApiError> {
    match (&req.location, req.x, req.y) {
        (Some(key), None, None) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(ApiError::bad_request("location must not be empty"));
            }
            Ok(Destination::Location(key.to_string()))
        }
        (None, Some(x), Some(y)) => {
            let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
                return Err(ApiError::bad_request("coordinates out of range"));
            };
            Ok(Destination::Coordinates(Tile::new(x, y)))
        }
        (None, None, None) => Err(ApiError::bad_request("goto needs location or x and y")),
        _ => Err(ApiError::bad_request(
            "goto takes either location or x and y, not both",
        )),
    }
}

pub fn say(req: &SayRequest) -> Result<(&str, u64), ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::bad_request(format!(
            "message longer than {MAX_MESSAGE_LEN} characters"
        )));
    }
    let duration = req.duration_ms.unwrap_or(DEFAULT_SAY_DURATION_MS);
    if duration > MAX_SAY_DURATION_MS {
        return Err(ApiError::bad_request(format!(
            "durationMs above {MAX_SAY_DURATION_MS}"
        )));
    }
    Ok((message, duration))
}

pub fn position(x: f64, y: f64) -> Result<Position, ApiError> {
    let p = Position::new(x, y);
    if p.is_finite() {
        Ok(p)
    } else {
        Err(ApiError::bad_request("position must be finite"))
    }
}
