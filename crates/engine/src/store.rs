use crate::now_ms;
use anyhow::Context;
use claw_office_protocol::{BotKind, TaskStatus};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Durable part of a bot: identity, last integer position, creation time and
/// task status. Motion, speech and the live binding are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSnapshot {
    pub id: String,
    pub kind: BotKind,
    pub name: String,
    pub character: String,
    pub x: i64,
    pub y: i64,
    pub created_at_ms: i64,
    pub task_status: TaskStatus,
}

/// One keyed row per bot id in SQLite.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    db_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        migrate(&conn)?;
        Ok(conn)
    }

    pub fn load(&self, id: &str) -> anyhow::Result<Option<BotSnapshot>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, kind, name, character, x, y, created_at_ms, task_json
                 FROM bot_snapshots WHERE id = ?1",
                [id],
                read_row,
            )
            .optional()
            .with_context(|| format!("load snapshot {id}"))?;
        row.map(decode).transpose()
    }

    pub fn load_kind(&self, kind: BotKind) -> anyhow::Result<Vec<BotSnapshot>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, name, character, x, y, created_at_ms, task_json
             FROM bot_snapshots WHERE kind = ?1 ORDER BY created_at_ms, id",
        )?;
        let rows = stmt.query_map([kind.as_str()], read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode(row?)?);
        }
        Ok(out)
    }

    pub fn save(&self, snap: &BotSnapshot) -> anyhow::Result<()> {
        let conn = self.open()?;
        let task_json = serde_json::to_string(&snap.task_status)?;
        conn.execute(
            "INSERT INTO bot_snapshots (id, kind, name, character, x, y, created_at_ms, task_json, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
               kind = excluded.kind,
               name = excluded.name,
               character = excluded.character,
               x = excluded.x,
               y = excluded.y,
               task_json = excluded.task_json,
               updated_at_ms = excluded.updated_at_ms",
            (
                &snap.id,
                snap.kind.as_str(),
                &snap.name,
                &snap.character,
                snap.x,
                snap.y,
                snap.created_at_ms,
                &task_json,
                now_ms(),
            ),
        )
        .with_context(|| format!("save snapshot {}", snap.id))?;
        Ok(())
    }
}

type RawRow = (String, String, String, String, i64, i64, i64, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode(raw: RawRow) -> anyhow::Result<BotSnapshot> {
    let (id, kind, name, character, x, y, created_at_ms, task_json) = raw;
    let kind = kind
        .parse::<BotKind>()
        .with_context(|| format!("snapshot {id} has bad kind"))?;
    let task_status = serde_json::from_str(&task_json)
        .with_context(|| format!("snapshot {id} has bad task status"))?;
    Ok(BotSnapshot {
        id,
        kind,
        name,
        character,
        x,
        y,
        created_at_ms,
        task_status,
    })
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS bot_snapshots (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  name TEXT NOT NULL,
  character TEXT NOT NULL,
  x INTEGER NOT NULL,
  y INTEGER NOT NULL,
  created_at_ms INTEGER NOT NULL,
  task_json TEXT NOT NULL DEFAULT '{}',
  updated_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bot_snapshots_kind ON bot_snapshots(kind);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn temp_store(tag: &str) -> SnapshotStore {
    let p = std::env::temp_dir().join(format!(
        "claw-office-{tag}-{}.db",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ));
    SnapshotStore::new(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_office_protocol::TaskStatusKind;

    fn snap(id: &str, kind: BotKind, x: i64) -> BotSnapshot {
        BotSnapshot {
            id: id.to_string(),
            kind,
            name: id.to_uppercase(),
            character: "Alvin".into(),
            x,
            y: 3,
            created_at_ms: 10,
            task_status: TaskStatus {
                status: TaskStatusKind::Working,
                description: "writing docs".into(),
                last_update: "2026-01-01T00:00:00Z".into(),
            },
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store("store-rt");
        assert_eq!(store.load("pm").unwrap(), None);
        let s = snap("pm", BotKind::Remote, 4);
        store.save(&s).unwrap();
        assert_eq!(store.load("pm").unwrap(), Some(s));
    }

    #[test]
    fn save_overwrites_but_keeps_created_at() {
        let store = temp_store("store-upsert");
        store.save(&snap("pm", BotKind::Remote, 4)).unwrap();
        let mut later = snap("pm", BotKind::Remote, 9);
        later.created_at_ms = 99;
        store.save(&later).unwrap();
        let got = store.load("pm").unwrap().unwrap();
        assert_eq!(got.x, 9);
        assert_eq!(got.created_at_ms, 10);
    }

    #[test]
    fn load_kind_filters() {
        let store = temp_store("store-kind");
        store.save(&snap("alvin", BotKind::Local, 1)).unwrap();
        store.save(&snap("pm", BotKind::Remote, 2)).unwrap();
        store.save(&snap("qa", BotKind::Remote, 3)).unwrap();
        let ids: Vec<String> = store
            .load_kind(BotKind::Remote)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["pm", "qa"]);
    }
}
