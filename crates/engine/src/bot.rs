use crate::motion::Motion;
use crate::now_rfc3339;
use crate::store::BotSnapshot;
use claw_office_protocol::{
    BotKind, BotSummary, BotView, Position, Speech, TaskStatus, TaskStatusKind, VisualState,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub id: String,
    pub kind: BotKind,
    pub name: String,
    pub character: String,
    pub position: Position,
    pub state: VisualState,
    pub task_status: TaskStatus,
    /// Owning controller. Always `None` for local bots.
    pub bound_by: Option<String>,
    pub speech: Option<Speech>,
    pub motion: Motion,
    pub created_at_ms: i64,
    /// Seconds spent idle since the last wander trip.
    pub(crate) idle_secs: f64,
    pub(crate) wander_pause_secs: f64,
    /// Last position broadcast by the server-side driver.
    pub(crate) synced: Position,
}

impl Bot {
    pub fn new(
        id: impl Into<String>,
        kind: BotKind,
        name: impl Into<String>,
        character: impl Into<String>,
        position: Position,
        created_at_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            character: character.into(),
            position,
            state: VisualState::default(),
            task_status: idle_task_status(),
            bound_by: None,
            speech: None,
            motion: Motion::Idle,
            created_at_ms,
            idle_secs: 0.0,
            wander_pause_secs: 0.0,
            synced: position,
        }
    }

    pub fn from_snapshot(snap: &BotSnapshot) -> Self {
        let position = Position::new(snap.x as f64, snap.y as f64);
        let mut bot = Self::new(
            snap.id.clone(),
            snap.kind,
            snap.name.clone(),
            snap.character.clone(),
            position,
            snap.created_at_ms,
        );
        bot.task_status = snap.task_status.clone();
        bot
    }

    pub fn snapshot(&self) -> BotSnapshot {
        let tile = self.position.floor_tile();
        BotSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            character: self.character.clone(),
            x: i64::from(tile.x),
            y: i64::from(tile.y),
            created_at_ms: self.created_at_ms,
            task_status: self.task_status.clone(),
        }
    }

    /// Local bots are always driveable; remote bots only while claimed.
    pub fn is_controllable(&self) -> bool {
        match self.kind {
            BotKind::Local => true,
            BotKind::Remote => self.bound_by.is_some(),
        }
    }

    pub fn view(&self, now_ms: i64) -> BotView {
        BotView {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            character: self.character.clone(),
            state: self.state,
            bound_by: self.bound_by.clone(),
            position: self.position,
            speech: self.speech.clone().filter(|s| s.expires_at > now_ms),
            task_status: self.task_status.clone(),
        }
    }

    pub fn summary(&self) -> BotSummary {
        BotSummary {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            character: self.character.clone(),
            state: self.state,
            bound_by: self.bound_by.clone(),
            position: self.position,
        }
    }
}

pub fn idle_task_status() -> TaskStatus {
    TaskStatus {
        status: TaskStatusKind::Idle,
        description: String::new(),
        last_update: now_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_speech_is_hidden() {
        let mut bot = Bot::new("pm", BotKind::Remote, "PM", "Alvin", Position::new(1.0, 1.0), 0);
        bot.speech = Some(Speech {
            text: "hello".into(),
            expires_at: 1_000,
        });
        assert!(bot.view(999).speech.is_some());
        assert!(bot.view(1_000).speech.is_none());
    }

    #[test]
    fn snapshot_floors_position() {
        let mut bot = Bot::new("pm", BotKind::Remote, "PM", "Alvin", Position::new(1.0, 1.0), 5);
        bot.position = Position::new(3.8, 7.2);
        let snap = bot.snapshot();
        assert_eq!((snap.x, snap.y), (3, 7));
        let back = Bot::from_snapshot(&snap);
        assert_eq!(back.position, Position::new(3.0, 7.0));
        assert_eq!(back.bound_by, None);
        assert_eq!(back.created_at_ms, 5);
    }

    #[test]
    fn remote_bots_need_a_controller() {
        let mut bot = Bot::new("pm", BotKind::Remote, "PM", "Alvin", Position::default(), 0);
        assert!(!bot.is_controllable());
        bot.bound_by = Some("pm".into());
        assert!(bot.is_controllable());
        let local = Bot::new("alvin", BotKind::Local, "Alvin", "Alvin", Position::default(), 0);
        assert!(local.is_controllable());
    }
}
