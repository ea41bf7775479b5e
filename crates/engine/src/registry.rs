//! Single source of truth for every live bot.
//!
//! All mutations run under one lock, and the broadcast event for a mutation
//! is published before the lock is released. Viewers therefore see events in
//! exactly the order the mutations were applied. Snapshot writes also happen
//! under the lock, so a bot's durable record never races its live state.

use crate::bot::Bot;
use crate::error::{RegistryError, RegistryResult};
use crate::location::Destination;
use crate::motion::{self, Motion, MotionConfig, Step, WANDER_TARGET};
use crate::office::OfficeMap;
use crate::path::find_path;
use crate::store::SnapshotStore;
use crate::{now_ms, now_rfc3339};
use claw_office_protocol::events::{
    BotGotoBody, BotMoveBody, BotPositionBody, BotRef, BotSayBody, BotStateBody,
    BotTaskStatusBody, ServerEvent,
};
use claw_office_protocol::{
    BotKind, BotSummary, BotView, Direction, Position, Speech, TaskStatus, TaskStatusKind, Tile,
    VisualState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Identifies a realtime connection so it can be skipped on rebroadcast.
pub type ConnectionId = u64;

/// Receives every externally observable mutation, in order.
///
/// Implementations must not block: publishing happens while the registry lock
/// is held.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ServerEvent, skip: Option<ConnectionId>);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ServerEvent, _skip: Option<ConnectionId>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalBotSpec {
    pub id: String,
    pub name: String,
    pub character: String,
    pub spawn: Tile,
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub spawn: Tile,
    /// Sprite catalog used for random assignment on first bind.
    pub characters: Vec<String>,
    pub local_bots: Vec<LocalBotSpec>,
    /// Load persisted remote bots as live, unbound bots at startup.
    pub restore_remote_bots: bool,
    pub random_point_attempts: u32,
    pub motion: MotionConfig,
    pub wander: bool,
    /// Idle pause before an unbound remote bot picks a new wander target.
    pub wander_pause_secs: (f64, f64),
    pub seed: Option<u64>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            spawn: Tile::new(15, 18),
            characters: vec![
                "Alvin".to_string(),
                "PM_OldLiu".to_string(),
                "Designer_XiaoMei".to_string(),
                "Coder_OldYe".to_string(),
            ],
            local_bots: Vec::new(),
            restore_remote_bots: true,
            random_point_attempts: crate::grid::DEFAULT_RANDOM_POINT_ATTEMPTS,
            motion: MotionConfig::default(),
            wander: true,
            wander_pause_secs: (2.0, 6.0),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindChange {
    /// New identity, no snapshot existed.
    Created,
    /// Brought back into the live registry from its snapshot.
    Rehydrated,
    /// Was live and unbound; now owned by the caller.
    Claimed,
    /// Already owned by the same controller. Nothing changed.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindOutcome {
    pub bot: BotView,
    pub change: BindChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoPlan {
    pub path: Vec<Tile>,
    pub target: Tile,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub moved: Vec<String>,
    /// `(bot id, target label)`
    pub arrived: Vec<(String, String)>,
    pub wander_started: Vec<String>,
}

struct RegistryState {
    bots: BTreeMap<String, Bot>,
    rng: StdRng,
}

pub struct Registry {
    state: Mutex<RegistryState>,
    map: Arc<OfficeMap>,
    store: SnapshotStore,
    sink: Arc<dyn EventSink>,
    settings: RegistrySettings,
}

impl Registry {
    /// Instantiates the local bots and, if enabled, rehydrates persisted
    /// remote bots as unbound.
    pub fn open(
        settings: RegistrySettings,
        map: Arc<OfficeMap>,
        store: SnapshotStore,
        sink: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut bots = BTreeMap::new();

        for spec in &settings.local_bots {
            let bot = match store.load(&spec.id)? {
                Some(snap) if snap.kind == BotKind::Local => {
                    let mut bot = Bot::from_snapshot(&snap);
                    bot.name = spec.name.clone();
                    bot.character = spec.character.clone();
                    bot
                }
                _ => Bot::new(
                    spec.id.clone(),
                    BotKind::Local,
                    spec.name.clone(),
                    spec.character.clone(),
                    spec.spawn.to_position(),
                    now_ms(),
                ),
            };
            store.save(&bot.snapshot())?;
            bots.insert(bot.id.clone(), bot);
        }

        if settings.restore_remote_bots {
            for snap in store.load_kind(BotKind::Remote)? {
                if bots.contains_key(&snap.id) {
                    warn!(bot_id = %snap.id, "remote snapshot shadows a local bot; skipped");
                    continue;
                }
                bots.insert(snap.id.clone(), Bot::from_snapshot(&snap));
            }
        }

        info!(
            local = settings.local_bots.len(),
            total = bots.len(),
            db = %store.db_path().display(),
            "registry opened"
        );

        Ok(Self {
            state: Mutex::new(RegistryState { bots, rng }),
            map,
            store,
            sink,
            settings,
        })
    }

    pub fn map(&self) -> &OfficeMap {
        &self.map
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ServerEvent) {
        debug!(kind = event.kind(), bot_id = ?event.bot_id(), "publish");
        self.sink.publish(event, None);
    }

    pub fn list(&self) -> Vec<BotSummary> {
        self.lock().bots.values().map(Bot::summary).collect()
    }

    pub fn get(&self, id: &str) -> RegistryResult<BotView> {
        let st = self.lock();
        let bot = st
            .bots
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(bot.view(now_ms()))
    }

    /// Every live bot, for connection handshakes and resyncs.
    pub fn views(&self) -> Vec<BotView> {
        let now = now_ms();
        self.lock().bots.values().map(|b| b.view(now)).collect()
    }

    pub fn task_status(&self, id: &str) -> RegistryResult<TaskStatus> {
        let st = self.lock();
        st.bots
            .get(id)
            .map(|b| b.task_status.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn bind(
        &self,
        id: &str,
        name: Option<&str>,
        controller: &str,
    ) -> RegistryResult<BindOutcome> {
        let mut st = self.lock();
        let now = now_ms();

        if let Some(bot) = st.bots.get_mut(id) {
            if bot.kind == BotKind::Local {
                return Err(RegistryError::Forbidden {
                    id: id.to_string(),
                    reason: "local bots cannot be bound",
                });
            }
            match bot.bound_by.as_deref() {
                Some(owner) if owner == controller => {
                    return Ok(BindOutcome {
                        bot: bot.view(now),
                        change: BindChange::Unchanged,
                    });
                }
                Some(owner) => {
                    return Err(RegistryError::AlreadyBound {
                        id: id.to_string(),
                        bound_by: owner.to_string(),
                    });
                }
                None => {}
            }
            let mut claimed = bot.clone();
            claimed.bound_by = Some(controller.to_string());
            if let Some(name) = name {
                claimed.name = name.to_string();
            }
            self.store.save(&claimed.snapshot())?;
            *bot = claimed;
            let view = bot.view(now);
            info!(bot_id = %id, controller, "bot claimed");
            self.publish(ServerEvent::BotBound { bot: view.clone() });
            return Ok(BindOutcome {
                bot: view,
                change: BindChange::Claimed,
            });
        }

        let (mut bot, change) = match self.store.load(id)? {
            Some(snap) if snap.kind == BotKind::Local => {
                return Err(RegistryError::Forbidden {
                    id: id.to_string(),
                    reason: "id belongs to a local bot",
                });
            }
            Some(snap) => (Bot::from_snapshot(&snap), BindChange::Rehydrated),
            None => {
                let character = self.pick_character(&mut st.rng);
                let spawn = self.spawn_point(&mut st.rng);
                let bot = Bot::new(
                    id,
                    BotKind::Remote,
                    name.unwrap_or(id),
                    character,
                    spawn.to_position(),
                    now,
                );
                (bot, BindChange::Created)
            }
        };
        bot.bound_by = Some(controller.to_string());
        if let Some(name) = name {
            bot.name = name.to_string();
        }
        self.store.save(&bot.snapshot())?;

        let view = bot.view(now);
        st.bots.insert(id.to_string(), bot);
        info!(bot_id = %id, controller, ?change, "bot bound");
        self.publish(ServerEvent::BotCreated { bot: view.clone() });
        Ok(BindOutcome { bot: view, change })
    }

    /// Flushes the snapshot, then drops the bot from the live registry.
    pub fn unbind(&self, id: &str) -> RegistryResult<()> {
        let mut st = self.lock();
        let bot = st
            .bots
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if bot.kind == BotKind::Local {
            return Err(RegistryError::Forbidden {
                id: id.to_string(),
                reason: "local bots cannot be unbound",
            });
        }
        self.store.save(&bot.snapshot())?;
        st.bots.remove(id);
        info!(bot_id = %id, "bot unbound");
        self.publish(ServerEvent::BotRemoved {
            bot: BotRef { id: id.to_string() },
        });
        Ok(())
    }

    pub fn apply_move(&self, id: &str, direction: Direction) -> RegistryResult<()> {
        let mut st = self.lock();
        let bot = controlled_mut(&mut st.bots, id)?;
        bot.motion = Motion::from_direction(direction);
        self.publish(ServerEvent::BotMove {
            bot: BotMoveBody {
                id: id.to_string(),
                direction,
            },
        });
        Ok(())
    }

    /// Resolves the destination, plans a path from the bot's floored position
    /// and replaces whatever motion the bot had.
    pub fn apply_goto(&self, id: &str, destination: &Destination) -> RegistryResult<GotoPlan> {
        let mut st = self.lock();
        let bot = controlled_mut(&mut st.bots, id)?;
        let grid = self.map.grid().ok_or(RegistryError::MapUnavailable)?;
        let target = destination
            .resolve(self.map.locations())
            .ok_or_else(|| RegistryError::UnknownLocation(destination.label()))?;
        let from = bot.position.floor_tile();
        let path = find_path(grid, from, target)
            .ok_or(RegistryError::NoPathFound { from, to: target })?;

        bot.motion = Motion::follow(path.clone(), destination.label());
        debug!(bot_id = %id, %target, steps = path.len(), "goto planned");
        self.publish(ServerEvent::BotGoto {
            bot: BotGotoBody {
                id: id.to_string(),
                path: path.clone(),
                target,
            },
        });
        Ok(GotoPlan { path, target })
    }

    pub fn set_visual_state(&self, id: &str, state: VisualState) -> RegistryResult<()> {
        let mut st = self.lock();
        let bot = live_mut(&mut st.bots, id)?;
        bot.state = state;
        self.publish(ServerEvent::BotState {
            bot: BotStateBody {
                id: id.to_string(),
                state,
            },
        });
        Ok(())
    }

    pub fn set_speech(&self, id: &str, text: &str, duration_ms: u64) -> RegistryResult<()> {
        let mut st = self.lock();
        let bot = live_mut(&mut st.bots, id)?;
        let duration = i64::try_from(duration_ms).unwrap_or(i64::MAX);
        bot.speech = Some(Speech {
            text: text.to_string(),
            expires_at: now_ms().saturating_add(duration),
        });
        self.publish(ServerEvent::BotSay {
            bot: BotSayBody {
                id: id.to_string(),
                message: text.to_string(),
                duration: duration_ms,
            },
        });
        Ok(())
    }

    /// Always persisted; the live record only changes once the write succeeded.
    pub fn set_task_status(
        &self,
        id: &str,
        status: TaskStatusKind,
        description: Option<&str>,
    ) -> RegistryResult<TaskStatus> {
        let mut st = self.lock();
        let bot = live_mut(&mut st.bots, id)?;
        let task_status = TaskStatus {
            status,
            description: description.unwrap_or_default().to_string(),
            last_update: now_rfc3339(),
        };
        let mut snap = bot.snapshot();
        snap.task_status = task_status.clone();
        self.store.save(&snap)?;

        bot.task_status = task_status.clone();
        self.publish(ServerEvent::BotTaskStatus {
            bot: BotTaskStatusBody {
                id: id.to_string(),
                task_status: task_status.clone(),
            },
        });
        Ok(task_status)
    }

    /// Last report wins. Any authenticated connection may report for any bot;
    /// stale reports are overwritten within one sync period.
    pub fn sync_position(
        &self,
        id: &str,
        position: Position,
        origin: Option<ConnectionId>,
    ) -> RegistryResult<()> {
        let mut st = self.lock();
        let bot = live_mut(&mut st.bots, id)?;
        bot.position = position;
        bot.synced = position;
        self.sink.publish(
            ServerEvent::BotPosition {
                bot: BotPositionBody {
                    id: id.to_string(),
                    x: position.x,
                    y: position.y,
                },
            },
            origin,
        );
        Ok(())
    }

    pub fn random_point(&self) -> RegistryResult<Tile> {
        let grid = self.map.grid().ok_or(RegistryError::MapUnavailable)?;
        let mut st = self.lock();
        Ok(grid.random_walkable_point(&mut st.rng, self.settings.random_point_attempts)?)
    }

    /// One step of the server-side driver: starts wander trips for idle
    /// unbound remote bots and advances every bot's motion by `dt_secs`.
    pub fn tick(&self, dt_secs: f64) -> TickReport {
        let mut report = TickReport::default();
        let mut guard = self.lock();
        let RegistryState { bots, rng } = &mut *guard;
        let grid = self.map.grid();

        for bot in bots.values_mut() {
            if self.settings.wander && !bot.is_controllable() && bot.motion.is_idle() {
                if let Some(grid) = grid {
                    bot.idle_secs += dt_secs;
                    if bot.idle_secs >= bot.wander_pause_secs {
                        bot.idle_secs = 0.0;
                        bot.wander_pause_secs = self.pick_pause(rng);
                        if let Some((target, path)) = motion::plan_wander(
                            grid,
                            bot.position,
                            rng,
                            self.settings.random_point_attempts,
                        ) {
                            bot.motion = Motion::follow(path.clone(), WANDER_TARGET);
                            report.wander_started.push(bot.id.clone());
                            self.publish(ServerEvent::BotGoto {
                                bot: BotGotoBody {
                                    id: bot.id.clone(),
                                    path,
                                    target,
                                },
                            });
                        }
                    }
                }
            }

            match motion::advance(
                grid,
                &mut bot.position,
                &mut bot.motion,
                dt_secs,
                &self.settings.motion,
            ) {
                Step::Moved => report.moved.push(bot.id.clone()),
                Step::Arrived { target } => {
                    debug!(bot_id = %bot.id, %target, "arrived");
                    report.moved.push(bot.id.clone());
                    report.arrived.push((bot.id.clone(), target));
                }
                Step::Idle | Step::Blocked => {}
            }
        }
        report
    }

    /// Publishes `bot_position` for every bot that moved since its last sync.
    pub fn broadcast_positions(&self) -> usize {
        let mut st = self.lock();
        let mut sent = 0;
        for bot in st.bots.values_mut() {
            if bot.position == bot.synced {
                continue;
            }
            bot.synced = bot.position;
            self.publish(ServerEvent::BotPosition {
                bot: BotPositionBody {
                    id: bot.id.clone(),
                    x: bot.position.x,
                    y: bot.position.y,
                },
            });
            sent += 1;
        }
        sent
    }

    fn pick_character(&self, rng: &mut StdRng) -> String {
        let chars = &self.settings.characters;
        if chars.is_empty() {
            return "default".to_string();
        }
        chars[rng.random_range(0..chars.len())].clone()
    }

    fn pick_pause(&self, rng: &mut StdRng) -> f64 {
        let (lo, hi) = self.settings.wander_pause_secs;
        if hi > lo {
            rng.random_range(lo..hi)
        } else {
            lo
        }
    }

    /// Configured spawn, or a random walkable tile if the spawn is blocked.
    fn spawn_point(&self, rng: &mut StdRng) -> Tile {
        let spawn = self.settings.spawn;
        match self.map.grid() {
            Some(grid) if !grid.is_walkable(spawn) => grid
                .random_walkable_point(rng, self.settings.random_point_attempts)
                .unwrap_or(spawn),
            _ => spawn,
        }
    }
}

fn live_mut<'a>(bots: &'a mut BTreeMap<String, Bot>, id: &str) -> RegistryResult<&'a mut Bot> {
    bots.get_mut(id)
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))
}

fn controlled_mut<'a>(
    bots: &'a mut BTreeMap<String, Bot>,
    id: &str,
) -> RegistryResult<&'a mut Bot> {
    let bot = live_mut(bots, id)?;
    if !bot.is_controllable() {
        return Err(RegistryError::Unbound(id.to_string()));
    }
    Ok(bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::location::LocationTable;
    use crate::store::{temp_store, BotSnapshot};
    use claw_office_protocol::Location;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(ServerEvent, Option<ConnectionId>)>>,
    }

    impl EventSink for Recorder {
        fn publish(&self, event: ServerEvent, skip: Option<ConnectionId>) {
            self.events.lock().unwrap().push((event, skip));
        }
    }

    impl Recorder {
        fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(e, _)| e.kind())
                .collect()
        }
    }

    fn office() -> Arc<OfficeMap> {
        let mut rows = vec![".".repeat(31); 21];
        rows[10] = format!("{}{}", "#".repeat(30), ".");
        let grid = Grid::from_ascii(&rows.join("\n")).unwrap();
        let mut locs = BTreeMap::new();
        locs.insert(
            "coffee".to_string(),
            Location {
                x: 25,
                y: 5,
                name: "Coffee Bar".into(),
            },
        );
        locs.insert(
            "wall".to_string(),
            Location {
                x: 3,
                y: 10,
                name: "Inside the wall".into(),
            },
        );
        Arc::new(OfficeMap::new(Some(grid), LocationTable::new(locs)))
    }

    fn settings() -> RegistrySettings {
        RegistrySettings {
            spawn: Tile::new(2, 2),
            local_bots: vec![LocalBotSpec {
                id: "alvin".into(),
                name: "Alvin".into(),
                character: "Alvin".into(),
                spawn: Tile::new(1, 1),
            }],
            seed: Some(42),
            ..RegistrySettings::default()
        }
    }

    fn open(store: SnapshotStore) -> (Registry, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        let reg = Registry::open(settings(), office(), store, rec.clone()).unwrap();
        (reg, rec)
    }

    #[test]
    fn first_bind_creates_at_spawn() {
        let (reg, rec) = open(temp_store("reg-create"));
        let out = reg.bind("pm", Some("PM"), "pm").unwrap();
        assert_eq!(out.change, BindChange::Created);
        assert_eq!(out.bot.bound_by.as_deref(), Some("pm"));
        assert_eq!(out.bot.position, Position::new(2.0, 2.0));
        assert_eq!(out.bot.name, "PM");
        assert!(reg.settings().characters.contains(&out.bot.character));
        assert_eq!(rec.kinds(), vec!["bot_created"]);
    }

    #[test]
    fn rebind_by_same_controller_is_noop() {
        let (reg, rec) = open(temp_store("reg-noop"));
        reg.bind("pm", None, "pm").unwrap();
        reg.sync_position("pm", Position::new(4.5, 2.0), None).unwrap();
        let again = reg.bind("pm", None, "pm").unwrap();
        assert_eq!(again.change, BindChange::Unchanged);
        assert_eq!(again.bot.position, Position::new(4.5, 2.0));
        assert_eq!(rec.kinds(), vec!["bot_created", "bot_position"]);
    }

    #[test]
    fn rebind_by_other_controller_conflicts() {
        let (reg, _) = open(temp_store("reg-conflict"));
        reg.bind("pm", None, "pm").unwrap();
        let err = reg.bind("pm", None, "intruder").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyBound { ref bound_by, .. } if bound_by == "pm"));
    }

    #[test]
    fn local_bots_refuse_bind_and_unbind() {
        let (reg, rec) = open(temp_store("reg-local"));
        assert!(matches!(
            reg.bind("alvin", None, "alvin"),
            Err(RegistryError::Forbidden { .. })
        ));
        assert!(matches!(
            reg.unbind("alvin"),
            Err(RegistryError::Forbidden { .. })
        ));
        assert!(reg.get("alvin").is_ok());
        assert!(rec.kinds().is_empty());
    }

    #[test]
    fn unbind_unknown_is_not_found() {
        let (reg, _) = open(temp_store("reg-nf"));
        assert!(matches!(reg.unbind("ghost"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn unbind_then_bind_restores_position_and_task_status() {
        let (reg, rec) = open(temp_store("reg-restore"));
        reg.bind("pm", None, "pm").unwrap();
        reg.sync_position("pm", Position::new(7.0, 3.0), None).unwrap();
        let ts = reg
            .set_task_status("pm", TaskStatusKind::Working, Some("triage"))
            .unwrap();
        reg.unbind("pm").unwrap();
        assert!(matches!(reg.get("pm"), Err(RegistryError::NotFound(_))));

        let back = reg.bind("pm", None, "pm").unwrap();
        assert_eq!(back.change, BindChange::Rehydrated);
        assert_eq!(back.bot.position, Position::new(7.0, 3.0));
        assert_eq!(back.bot.task_status, ts);
        assert_eq!(
            rec.kinds(),
            vec![
                "bot_created",
                "bot_position",
                "bot_task_status",
                "bot_removed",
                "bot_created"
            ]
        );
    }

    #[test]
    fn restart_restores_remote_bots_unbound() {
        let store = temp_store("reg-restart");
        {
            let (reg, _) = open(store.clone());
            reg.bind("pm", None, "pm").unwrap();
            reg.set_task_status("pm", TaskStatusKind::Working, Some("deploy"))
                .unwrap();
        }
        let (reg, rec) = open(store);
        let pm = reg.get("pm").unwrap();
        assert_eq!(pm.bound_by, None);
        assert_eq!(pm.task_status.status, TaskStatusKind::Working);
        assert!(matches!(
            reg.apply_move("pm", Direction::Up),
            Err(RegistryError::Unbound(_))
        ));
        let claimed = reg.bind("pm", None, "pm").unwrap();
        assert_eq!(claimed.change, BindChange::Claimed);
        reg.apply_move("pm", Direction::Up).unwrap();
        assert_eq!(rec.kinds(), vec!["bot_bound", "bot_move"]);
    }

    #[test]
    fn local_task_status_survives_restart() {
        let store = temp_store("reg-local-ts");
        {
            let (reg, _) = open(store.clone());
            reg.set_task_status("alvin", TaskStatusKind::Working, None)
                .unwrap();
        }
        let (reg, _) = open(store);
        assert_eq!(
            reg.task_status("alvin").unwrap().status,
            TaskStatusKind::Working
        );
    }

    #[test]
    fn local_bot_moves_without_binding() {
        let (reg, rec) = open(temp_store("reg-local-move"));
        reg.apply_move("alvin", Direction::Right).unwrap();
        assert_eq!(rec.kinds(), vec!["bot_move"]);
    }

    #[test]
    fn goto_plans_path_and_replaces_impulse() {
        let (reg, rec) = open(temp_store("reg-goto"));
        reg.apply_move("alvin", Direction::Down).unwrap();
        let plan = reg
            .apply_goto("alvin", &Destination::Location("coffee".into()))
            .unwrap();
        assert_eq!(plan.target, Tile::new(25, 5));
        assert_eq!(plan.path.first(), Some(&Tile::new(1, 1)));
        assert_eq!(plan.path.last(), Some(&Tile::new(25, 5)));
        assert_eq!(plan.path.len(), 24 + 4 + 1);
        assert_eq!(rec.kinds(), vec!["bot_move", "bot_goto"]);
        let st = reg.lock();
        assert!(matches!(
            st.bots["alvin"].motion,
            Motion::FollowingPath { ref target, .. } if target == "coffee"
        ));
    }

    #[test]
    fn goto_errors_are_distinct() {
        let (reg, rec) = open(temp_store("reg-goto-err"));
        assert!(matches!(
            reg.apply_goto("alvin", &Destination::Location("roof".into())),
            Err(RegistryError::UnknownLocation(_))
        ));
        assert!(matches!(
            reg.apply_goto("alvin", &Destination::Coordinates(Tile::new(999, 999))),
            Err(RegistryError::NoPathFound { to, .. }) if to == Tile::new(999, 999)
        ));
        assert!(matches!(
            reg.apply_goto("alvin", &Destination::Location("wall".into())),
            Err(RegistryError::NoPathFound { .. })
        ));
        assert!(rec.kinds().is_empty());
    }

    #[test]
    fn goto_without_map_is_unavailable() {
        let rec = Arc::new(Recorder::default());
        let reg = Registry::open(
            settings(),
            Arc::new(OfficeMap::default()),
            temp_store("reg-nomap"),
            rec,
        )
        .unwrap();
        assert!(matches!(
            reg.apply_goto("alvin", &Destination::Coordinates(Tile::new(1, 2))),
            Err(RegistryError::MapUnavailable)
        ));
        assert!(matches!(
            reg.random_point(),
            Err(RegistryError::MapUnavailable)
        ));
        reg.apply_move("alvin", Direction::Left).unwrap();
    }

    #[test]
    fn speech_and_state_broadcast() {
        let (reg, rec) = open(temp_store("reg-say"));
        reg.set_visual_state("alvin", VisualState::Coffee).unwrap();
        reg.set_speech("alvin", "brb", 60_000).unwrap();
        let v = reg.get("alvin").unwrap();
        assert_eq!(v.state, VisualState::Coffee);
        assert_eq!(v.speech.map(|s| s.text).as_deref(), Some("brb"));
        reg.set_speech("alvin", "gone", 0).unwrap();
        assert!(reg.get("alvin").unwrap().speech.is_none());
        assert_eq!(rec.kinds(), vec!["bot_state", "bot_say", "bot_say"]);
    }

    #[test]
    fn position_sync_skips_origin() {
        let (reg, rec) = open(temp_store("reg-sync"));
        reg.sync_position("alvin", Position::new(1.5, 1.0), Some(7))
            .unwrap();
        let events = rec.events.lock().unwrap();
        assert_eq!(events[0].1, Some(7));
        assert!(matches!(
            reg.sync_position("ghost", Position::new(0.0, 0.0), None),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn tick_drives_goto_to_arrival() {
        let (reg, _) = open(temp_store("reg-tick"));
        reg.apply_goto("alvin", &Destination::Coordinates(Tile::new(4, 1)))
            .unwrap();
        let mut arrived = Vec::new();
        for _ in 0..50 {
            arrived.extend(reg.tick(0.1).arrived);
        }
        assert_eq!(arrived, vec![("alvin".to_string(), "4,1".to_string())]);
        assert_eq!(reg.get("alvin").unwrap().position, Position::new(4.0, 1.0));
        assert_eq!(reg.broadcast_positions(), 1);
        assert_eq!(reg.broadcast_positions(), 0);
    }

    #[test]
    fn unbound_remote_bots_wander() {
        let store = temp_store("reg-wander");
        store
            .save(&BotSnapshot {
                id: "qa".into(),
                kind: BotKind::Remote,
                name: "QA".into(),
                character: "Alvin".into(),
                x: 5,
                y: 5,
                created_at_ms: 0,
                task_status: crate::bot::idle_task_status(),
            })
            .unwrap();
        let (reg, rec) = open(store);
        let mut started = Vec::new();
        for _ in 0..5 {
            started.extend(reg.tick(0.5).wander_started);
        }
        assert!(started.contains(&"qa".to_string()));
        assert!(!started.contains(&"alvin".to_string()));
        assert!(rec.kinds().contains(&"bot_goto"));
    }
}
