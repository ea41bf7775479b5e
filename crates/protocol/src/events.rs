//! Realtime channel frames. Every frame is a JSON object tagged by `type`.

use crate::{BotView, Direction, TaskStatus, Tile, VisualState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMoveBody {
    pub id: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotGotoBody {
    pub id: String,
    pub path: Vec<Tile>,
    pub target: Tile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStateBody {
    pub id: String,
    pub state: VisualState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSayBody {
    pub id: String,
    pub message: String,
    /// Milliseconds.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotTaskStatusBody {
    pub id: String,
    pub task_status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotPositionBody {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    AuthSuccess { bots: Vec<BotView> },
    AuthFailed { error: String },
    Error { error: String, message: String },
    /// Full snapshot sent after the connection fell behind the broadcast.
    Resync { bots: Vec<BotView> },
    BotCreated { bot: BotView },
    BotBound { bot: BotView },
    BotRemoved { bot: BotRef },
    BotMove { bot: BotMoveBody },
    BotGoto { bot: BotGotoBody },
    BotState { bot: BotStateBody },
    BotSay { bot: BotSayBody },
    BotTaskStatus { bot: BotTaskStatusBody },
    BotPosition { bot: BotPositionBody },
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::AuthSuccess { .. } => "auth_success",
            ServerEvent::AuthFailed { .. } => "auth_failed",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Resync { .. } => "resync",
            ServerEvent::BotCreated { .. } => "bot_created",
            ServerEvent::BotBound { .. } => "bot_bound",
            ServerEvent::BotRemoved { .. } => "bot_removed",
            ServerEvent::BotMove { .. } => "bot_move",
            ServerEvent::BotGoto { .. } => "bot_goto",
            ServerEvent::BotState { .. } => "bot_state",
            ServerEvent::BotSay { .. } => "bot_say",
            ServerEvent::BotTaskStatus { .. } => "bot_task_status",
            ServerEvent::BotPosition { .. } => "bot_position",
        }
    }

    /// Bot the event is about, for per-bot events.
    pub fn bot_id(&self) -> Option<&str> {
        match self {
            ServerEvent::BotCreated { bot } | ServerEvent::BotBound { bot } => Some(&bot.id),
            ServerEvent::BotRemoved { bot } => Some(&bot.id),
            ServerEvent::BotMove { bot } => Some(&bot.id),
            ServerEvent::BotGoto { bot } => Some(&bot.id),
            ServerEvent::BotState { bot } => Some(&bot.id),
            ServerEvent::BotSay { bot } => Some(&bot.id),
            ServerEvent::BotTaskStatus { bot } => Some(&bot.id),
            ServerEvent::BotPosition { bot } => Some(&bot.id),
            ServerEvent::AuthSuccess { .. }
            | ServerEvent::AuthFailed { .. }
            | ServerEvent::Error { .. }
            | ServerEvent::Resync { .. } => None,
        }
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth { token: String },
    BotUpdate { bot: BotPositionBody },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_events_are_tagged_snake_case() {
        let ev = ServerEvent::BotMove {
            bot: BotMoveBody {
                id: "pm".into(),
                direction: Direction::Up,
            },
        };
        let j = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            j,
            serde_json::json!({"type": "bot_move", "bot": {"id": "pm", "direction": "up"}})
        );
        assert_eq!(ev.kind(), "bot_move");
        assert_eq!(ev.bot_id(), Some("pm"));
    }

    #[test]
    fn client_frames_decode() {
        let m: ClientMessage =
            serde_json::from_str(r#"{"type":"bot_update","bot":{"id":"pm","x":1.5,"y":2}}"#)
                .unwrap();
        assert_eq!(
            m,
            ClientMessage::BotUpdate {
                bot: BotPositionBody {
                    id: "pm".into(),
                    x: 1.5,
                    y: 2.0
                }
            }
        );
        let m: ClientMessage = serde_json::from_str(r#"{"type":"auth","token":"t"}"#).unwrap();
        assert_eq!(m, ClientMessage::Auth { token: "t".into() });
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
    }
}
