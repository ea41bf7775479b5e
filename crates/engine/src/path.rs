//! A* over the 4-connected walkability grid.
//!
//! Uniform step cost with a Manhattan heuristic, so returned paths are
//! shortest by tile count. The open set is a binary heap keyed by
//! `(f, push sequence)`: among equal f-scores the entry pushed first wins,
//! and neighbours are pushed in the fixed order up, right, down, left. Equal
//! input therefore always yields the same path.

use crate::grid::Grid;
use claw_office_protocol::{Position, Tile};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const NEIGHBOURS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Path from `start` to `goal`, both included, or `None` when either end is
/// blocked or no route exists.
pub fn find_path(grid: &Grid, start: Tile, goal: Tile) -> Option<Vec<Tile>> {
    if !grid.is_walkable(start) || !grid.is_walkable(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let width = grid.width() as usize;
    let cells = width * grid.height() as usize;
    let index = |t: Tile| t.y as usize * width + t.x as usize;

    let mut g_score = vec![u32::MAX; cells];
    let mut parent: Vec<Option<Tile>> = vec![None; cells];
    let mut closed = vec![false; cells];
    let mut open = BinaryHeap::new();
    let mut seq: u64 = 0;

    g_score[index(start)] = 0;
    open.push(Reverse((start.manhattan(goal), seq, start)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        let ci = index(current);
        if closed[ci] {
            continue;
        }
        if current == goal {
            return Some(walk_back(&parent, width, goal));
        }
        closed[ci] = true;

        for (dx, dy) in NEIGHBOURS {
            let next = Tile::new(current.x + dx, current.y + dy);
            if !grid.is_walkable(next) {
                continue;
            }
            let ni = index(next);
            if closed[ni] {
                continue;
            }
            let tentative = g_score[ci] + 1;
            if tentative < g_score[ni] {
                g_score[ni] = tentative;
                parent[ni] = Some(current);
                seq += 1;
                open.push(Reverse((tentative + next.manhattan(goal), seq, next)));
            }
        }
    }
    None
}

/// Same as [`find_path`], flooring a continuous start position first.
pub fn find_path_from(grid: &Grid, start: Position, goal: Tile) -> Option<Vec<Tile>> {
    find_path(grid, start.floor_tile(), goal)
}

fn walk_back(parent: &[Option<Tile>], width: usize, goal: Tile) -> Vec<Tile> {
    let mut path = vec![goal];
    let mut cur = goal;
    while let Some(prev) = parent[cur.y as usize * width + cur.x as usize] {
        path.push(prev);
        cur = prev;
    }
    path.reverse();
    path
}
