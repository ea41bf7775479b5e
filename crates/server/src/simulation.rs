//! Headless motion driver. Stands in for a rendering viewer: advances every
//! bot on a fixed tick and periodically publishes authoritative positions.

use crate::config::SimulationConfig;
use claw_office_engine::{Registry, TickReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct Driver {
    registry: Arc<Registry>,
    tick: Duration,
    sync: Duration,
    since_sync: Duration,
}

impl Driver {
    pub fn new(registry: Arc<Registry>, cfg: &SimulationConfig) -> Self {
        Self {
            registry,
            tick: cfg.tick(),
            sync: cfg.sync(),
            since_sync: Duration::ZERO,
        }
    }

    /// One tick. Returns the tick report and how many positions were synced.
    pub fn step(&mut self) -> (TickReport, usize) {
        let report = self.registry.tick(self.tick.as_secs_f64());
        self.since_sync += self.tick;
        let mut synced = 0;
        if self.since_sync >= self.sync {
            self.since_sync = Duration::ZERO;
            synced = self.registry.broadcast_positions();
        }
        for (id, target) in &report.arrived {
            debug!(bot_id = %id, %target, "arrived");
        }
        (report, synced)
    }

    pub async fn run(mut self) {
        info!(
            tick_ms = self.tick.as_millis() as u64,
            sync_ms = self.sync.as_millis() as u64,
            "simulation driver started"
        );
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_office_engine::{
        Destination, Grid, LocalBotSpec, LocationTable, NullSink, OfficeMap, RegistrySettings,
        SnapshotStore,
    };
    use claw_office_protocol::{Position, Tile};

    fn registry(tag: &str) -> Arc<Registry> {
        let db = std::env::temp_dir().join(format!(
            "claw-office-sim-{tag}-{}.db",
            time::OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let grid = Grid::from_ascii(&vec![".".repeat(8); 8].join("\n")).unwrap();
        let settings = RegistrySettings {
            local_bots: vec![LocalBotSpec {
                id: "alvin".into(),
                name: "Alvin".into(),
                character: "Alvin".into(),
                spawn: Tile::new(0, 0),
            }],
            seed: Some(7),
            ..RegistrySettings::default()
        };
        Arc::new(
            Registry::open(
                settings,
                Arc::new(OfficeMap::new(Some(grid), LocationTable::default())),
                SnapshotStore::new(db),
                Arc::new(NullSink),
            )
            .unwrap(),
        )
    }

    #[test]
    fn syncs_on_its_own_period() {
        let reg = registry("period");
        reg.apply_goto("alvin", &Destination::Coordinates(Tile::new(3, 0)))
            .unwrap();
        let cfg = SimulationConfig {
            tick_ms: 100,
            sync_ms: 300,
            ..SimulationConfig::default()
        };
        let mut driver = Driver::new(reg.clone(), &cfg);
        assert_eq!(driver.step().1, 0);
        assert_eq!(driver.step().1, 0);
        assert_eq!(driver.step().1, 1);

        let mut arrived = false;
        for _ in 0..20 {
            arrived |= !driver.step().0.arrived.is_empty();
        }
        assert!(arrived);
        assert_eq!(reg.get("alvin").unwrap().position, Position::new(3.0, 0.0));
    }
}
