//! Per-tick motion for one bot: directional impulse or path following.
//!
//! The same stepping drives controller-issued gotos and the ambient wander of
//! unbound remote bots; only the choice of destination differs.

use crate::grid::Grid;
use crate::path::find_path_from;
use claw_office_protocol::{Direction, Position, Tile};
use rand::Rng;

pub const WANDER_TARGET: &str = "wander";

/// Longest single collision-checked move, in tiles. Rounding the occupied
/// tile can then change by at most one per sub-step, so no tile is skipped.
const MAX_SUBSTEP: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Motion {
    #[default]
    Idle,
    Impulse(Direction),
    FollowingPath {
        path: Vec<Tile>,
        cursor: usize,
        target: String,
    },
}

impl Motion {
    /// `stop` maps to `Idle`.
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Stop => Motion::Idle,
            d => Motion::Impulse(d),
        }
    }

    pub fn follow(path: Vec<Tile>, target: impl Into<String>) -> Self {
        Motion::FollowingPath {
            path,
            cursor: 0,
            target: target.into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Motion::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    /// Tiles per second.
    pub speed: f64,
    pub arrive_epsilon: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 3.0,
            arrive_epsilon: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Idle,
    Moved,
    /// Next tile was blocked; the bot stayed put for this tick.
    Blocked,
    Arrived { target: String },
}

enum Follow {
    Moved,
    Blocked,
    Exhausted,
}

/// Advances `position` by one tick of `dt_secs`.
///
/// Without a grid (degraded map mode) nothing blocks.
pub fn advance(
    grid: Option<&Grid>,
    position: &mut Position,
    motion: &mut Motion,
    dt_secs: f64,
    config: &MotionConfig,
) -> Step {
    let budget = (config.speed * dt_secs).max(0.0);
    let outcome = match motion {
        Motion::Idle => return Step::Idle,
        Motion::Impulse(direction) => {
            let (ux, uy) = direction.unit();
            let mut remaining = budget;
            let mut moved = false;
            while remaining > 0.0 {
                let step = remaining.min(MAX_SUBSTEP);
                let candidate = Position::new(position.x + ux * step, position.y + uy * step);
                if !passable(grid, candidate) {
                    break;
                }
                *position = candidate;
                remaining -= step;
                moved = true;
            }
            return if moved { Step::Moved } else { Step::Blocked };
        }
        Motion::FollowingPath { path, cursor, .. } => {
            follow(grid, position, path, cursor, budget, config.arrive_epsilon)
        }
    };
    match outcome {
        Follow::Moved => Step::Moved,
        Follow::Blocked => Step::Blocked,
        Follow::Exhausted => match std::mem::take(motion) {
            Motion::FollowingPath { target, .. } => Step::Arrived { target },
            _ => Step::Idle,
        },
    }
}

fn follow(
    grid: Option<&Grid>,
    position: &mut Position,
    path: &[Tile],
    cursor: &mut usize,
    mut budget: f64,
    epsilon: f64,
) -> Follow {
    let mut moved = false;
    loop {
        let Some(waypoint) = path.get(*cursor).map(|t| t.to_position()) else {
            return Follow::Exhausted;
        };
        let (dx, dy) = (waypoint.x - position.x, waypoint.y - position.y);
        let dist = dx.hypot(dy);
        if dist < epsilon {
            *position = waypoint;
            *cursor += 1;
            continue;
        }
        if budget <= 0.0 {
            break;
        }
        let step = budget.min(dist).min(MAX_SUBSTEP);
        let candidate = Position::new(position.x + dx / dist * step, position.y + dy / dist * step);
        if !passable(grid, candidate) {
            return if moved { Follow::Moved } else { Follow::Blocked };
        }
        *position = candidate;
        budget -= step;
        moved = true;
    }
    if moved {
        Follow::Moved
    } else {
        Follow::Blocked
    }
}

/// Tile under a continuous position. Bots are centred on integer coordinates,
/// so this rounds rather than floors.
pub fn occupied_tile(position: Position) -> Tile {
    Tile::new(position.x.round() as i32, position.y.round() as i32)
}

fn passable(grid: Option<&Grid>, candidate: Position) -> bool {
    grid.map_or(true, |g| g.is_walkable(occupied_tile(candidate)))
}

/// Picks a random walkable tile and a path to it for ambient wandering.
pub fn plan_wander<R: Rng + ?Sized>(
    grid: &Grid,
    from: Position,
    rng: &mut R,
    max_attempts: u32,
) -> Option<(Tile, Vec<Tile>)> {
    let goal = grid.random_walkable_point(rng, max_attempts).ok()?;
    let path = find_path_from(grid, from, goal)?;
    Some((goal, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corridor() -> Grid {
        Grid::from_ascii(
            "\
#####
#...#
#####
",
        )
        .unwrap()
    }

    const CFG: MotionConfig = MotionConfig {
        speed: 2.0,
        arrive_epsilon: 0.05,
    };

    #[test]
    fn impulse_moves_at_fixed_speed() {
        let g = corridor();
        let mut pos = Position::new(1.0, 1.0);
        let mut m = Motion::from_direction(Direction::Right);
        assert_eq!(advance(Some(&g), &mut pos, &mut m, 0.1, &CFG), Step::Moved);
        assert!((pos.x - 1.2).abs() < 1e-9);
        assert_eq!(pos.y, 1.0);
    }

    #[test]
    fn impulse_into_wall_does_not_move() {
        let g = corridor();
        let mut pos = Position::new(1.0, 1.0);
        let mut m = Motion::from_direction(Direction::Up);
        assert_eq!(advance(Some(&g), &mut pos, &mut m, 0.5, &CFG), Step::Blocked);
        assert_eq!(pos, Position::new(1.0, 1.0));
        assert_eq!(m, Motion::Impulse(Direction::Up));
    }

    #[test]
    fn fast_impulse_cannot_tunnel_through_wall() {
        let g = Grid::from_ascii(".#..").unwrap();
        let mut pos = Position::new(0.0, 0.0);
        let mut m = Motion::from_direction(Direction::Right);
        let fast = MotionConfig {
            speed: 3.0,
            ..CFG
        };
        assert_eq!(advance(Some(&g), &mut pos, &mut m, 1.0, &fast), Step::Blocked);
        assert_eq!(pos, Position::new(0.0, 0.0));
    }

    #[test]
    fn fast_impulse_stops_at_last_open_tile() {
        let g = Grid::from_ascii("...#.").unwrap();
        let mut pos = Position::new(0.0, 0.0);
        let mut m = Motion::from_direction(Direction::Right);
        let fast = MotionConfig {
            speed: 15.0,
            ..CFG
        };
        assert_eq!(advance(Some(&g), &mut pos, &mut m, 1.0, &fast), Step::Moved);
        assert_eq!(pos, Position::new(2.0, 0.0));
        assert_eq!(m, Motion::Impulse(Direction::Right));
    }

    #[test]
    fn stop_is_idle() {
        let mut pos = Position::new(1.0, 1.0);
        let mut m = Motion::from_direction(Direction::Stop);
        assert!(m.is_idle());
        assert_eq!(advance(None, &mut pos, &mut m, 1.0, &CFG), Step::Idle);
    }

    #[test]
    fn path_follow_arrives_and_goes_idle() {
        let g = corridor();
        let path = vec![Tile::new(1, 1), Tile::new(2, 1), Tile::new(3, 1)];
        let mut pos = Position::new(1.0, 1.0);
        let mut m = Motion::follow(path, "desk");
        let mut arrived = None;
        for _ in 0..20 {
            match advance(Some(&g), &mut pos, &mut m, 0.1, &CFG) {
                Step::Arrived { target } => {
                    arrived = Some(target);
                    break;
                }
                Step::Moved => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(arrived.as_deref(), Some("desk"));
        assert_eq!(pos, Position::new(3.0, 1.0));
        assert!(m.is_idle());
    }

    #[test]
    fn large_tick_carries_across_waypoints() {
        let mut pos = Position::new(0.0, 0.0);
        let path = vec![Tile::new(0, 0), Tile::new(1, 0), Tile::new(2, 0), Tile::new(3, 0)];
        let mut m = Motion::follow(path, "x");
        assert_eq!(advance(None, &mut pos, &mut m, 1.0, &CFG), Step::Moved);
        assert!((pos.x - 2.0).abs() < 1e-9);
        match m {
            Motion::FollowingPath { cursor, .. } => assert_eq!(cursor, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wander_plan_ends_on_walkable_goal() {
        let g = corridor();
        let mut rng = StdRng::seed_from_u64(3);
        let (goal, path) = plan_wander(&g, Position::new(1.0, 1.0), &mut rng, 100).unwrap();
        assert!(g.is_walkable(goal));
        assert_eq!(path.last(), Some(&goal));
        assert_eq!(path.first(), Some(&Tile::new(1, 1)));
    }
}
