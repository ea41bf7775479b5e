use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod api;
pub mod events;

/// Rejected enum value coming from an untyped request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    /// Machine-readable reason, e.g. `InvalidDirection`.
    pub reason: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.reason, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! wire_enum {
    ($name:ident, $reason:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ParseEnumError {
                        reason: $reason,
                        value: s.to_string(),
                    })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Stop,
}

wire_enum!(Direction, "InvalidDirection", {
    Up => "up",
    Down => "down",
    Left => "left",
    Right => "right",
    Stop => "stop",
});

impl Direction {
    /// Unit step in tile space. `y` grows downwards, as on the map.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Stop => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualState {
    #[default]
    Working,
    Coffee,
    Offline,
}

wire_enum!(VisualState, "InvalidState", {
    Working => "working",
    Coffee => "coffee",
    Offline => "offline",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatusKind {
    #[default]
    Idle,
    Working,
}

wire_enum!(TaskStatusKind, "InvalidStatus", {
    Idle => "idle",
    Working => "working",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotKind {
    Local,
    Remote,
}

wire_enum!(BotKind, "InvalidKind", {
    Local => "local",
    Remote => "remote",
});

/// Integer map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Tile) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn to_position(self) -> Position {
        Position::new(f64::from(self.x), f64::from(self.y))
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Continuous position in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Tile containing this position (floored).
    pub fn floor_tile(self) -> Tile {
        Tile::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub status: TaskStatusKind,
    #[serde(default)]
    pub description: String,
    /// RFC 3339.
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speech {
    pub text: String,
    pub expires_at: i64,
}

/// Full bot record as seen by viewers and `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotView {
    pub id: String,
    pub kind: BotKind,
    pub name: String,
    pub character: String,
    pub state: VisualState,
    pub bound_by: Option<String>,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<Speech>,
    pub task_status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSummary {
    pub id: String,
    pub kind: BotKind,
    pub name: String,
    pub character: String,
    pub state: VisualState,
    pub bound_by: Option<String>,
    pub position: Position,
}

impl From<&BotView> for BotSummary {
    fn from(v: &BotView) -> Self {
        Self {
            id: v.id.clone(),
            kind: v.kind,
            name: v.name.clone(),
            character: v.character.clone(),
            state: v.state,
            bound_by: v.bound_by.clone(),
            position: v.position,
        }
    }
}

/// Named waypoint, as published by `mapLocations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub layers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("Coffee".parse::<VisualState>().unwrap(), VisualState::Coffee);
        assert_eq!(" idle ".parse::<TaskStatusKind>().unwrap(), TaskStatusKind::Idle);
    }

    #[test]
    fn fresh_bots_start_working_with_idle_task() {
        assert_eq!(VisualState::default(), VisualState::Working);
        assert_eq!(TaskStatusKind::default(), TaskStatusKind::Idle);
    }

    #[test]
    fn bad_enum_values_carry_reason() {
        let err = "north".parse::<Direction>().unwrap_err();
        assert_eq!(err.reason, "InvalidDirection");
        let err = "sleeping".parse::<VisualState>().unwrap_err();
        assert_eq!(err.reason, "InvalidState");
        let err = "done".parse::<TaskStatusKind>().unwrap_err();
        assert_eq!(err.reason, "InvalidStatus");
    }

    #[test]
    fn negative_positions_floor_downwards() {
        assert_eq!(Position::new(-0.5, 2.9).floor_tile(), Tile::new(-1, 2));
    }

    #[test]
    fn bot_view_uses_camel_case() {
        let v = BotView {
            id: "pm".into(),
            kind: BotKind::Remote,
            name: "PM".into(),
            character: "Alvin".into(),
            state: VisualState::Working,
            bound_by: Some("pm".into()),
            position: Position::new(1.0, 2.0),
            speech: None,
            task_status: TaskStatus {
                status: TaskStatusKind::Idle,
                description: String::new(),
                last_update: "2026-01-01T00:00:00Z".into(),
            },
        };
        let j = serde_json::to_value(&v).unwrap();
        assert_eq!(j["boundBy"], "pm");
        assert_eq!(j["taskStatus"]["lastUpdate"], "2026-01-01T00:00:00Z");
        assert!(j.get("speech").is_none());
    }
}
