//! NPC behaviour: find the nearest visible player, walk one step toward it,
//! swing when adjacent.

use crate::combat;
use crate::grid::Grid;
use crate::room::Room;
use shared::{ActorId, Direction, Position};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Clone, Eq, PartialEq)]
struct PathNode {
    position: Position,
    g_cost: i32,
    h_cost: i32,
    f_cost: i32,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over the grid's current blocking state, 4-neighbour, unit cost.
/// The goal tile counts as walkable even when occupied. The returned path
/// starts at `start` and ends at `goal`.
pub fn find_path(grid: &Grid, start: Position, goal: Position) -> Option<Vec<Position>> {
    if start == goal {
        return Some(vec![goal]);
    }
    if !grid.in_bounds(goal) || grid.collides(goal) {
        return None;
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, i32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(PathNode {
        position: start,
        g_cost: 0,
        h_cost: start.manhattan(&goal),
        f_cost: start.manhattan(&goal),
    });

    while let Some(current_node) = open_set.pop() {
        let current = current_node.position;
        if current == goal {
            return Some(reconstruct_path(&came_from, current));
        }
        if current_node.g_cost > *g_score.get(&current).unwrap_or(&i32::MAX) {
            continue;
        }

        for neighbour in current.neighbours() {
            if neighbour != goal && grid.is_blocked(neighbour) {
                continue;
            }
            let tentative = current_node.g_cost + 1;
            if tentative < *g_score.get(&neighbour).unwrap_or(&i32::MAX) {
                came_from.insert(neighbour, current);
                g_score.insert(neighbour, tentative);
                let h_cost = neighbour.manhattan(&goal);
                open_set.push(PathNode {
                    position: neighbour,
                    g_cost: tentative,
                    h_cost,
                    f_cost: tentative + h_cost,
                });
            }
        }
    }

    None
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&previous) = came_from.get(&current) {
        current = previous;
        path.push(current);
    }
    path.reverse();
    path
}

/// Nearest living, visible, placed player within `fov` of `npc`, by
/// straight-line distance. The first one found wins a tie.
fn nearest_target(room: &Room, npc: ActorId) -> Option<(ActorId, Position)> {
    let npc = room.actors.get(&npc)?;
    let fov = npc.fov()? as f64;
    let origin = npc.position();

    let mut best: Option<(ActorId, Position, f64)> = None;
    for actor in room.actors.values() {
        if !actor.is_player() || actor.is_dead() || actor.is_invisible() || !actor.is_placed() {
            continue;
        }
        let distance = origin.distance_to(&actor.position());
        if distance > fov {
            continue;
        }
        if best.map_or(true, |(_, _, closest)| distance < closest) {
            best = Some((actor.id(), actor.position(), distance));
        }
    }
    best.map(|(id, position, _)| (id, position))
}

/// Advances one NPC. Returns whether it moved or swung.
pub fn step_npc(room: &mut Room, npc: ActorId) -> bool {
    let Some(actor) = room.actors.get(&npc) else {
        return false;
    };
    if !actor.is_npc() || actor.is_dead() || !actor.is_placed() || actor.is_frozen() {
        return false;
    }
    let origin = actor.position();
    let Some((_, target)) = nearest_target(room, npc) else {
        return false;
    };
    let Some(path) = find_path(&room.grid, origin, target) else {
        return false;
    };

    match path.len() {
        0 | 1 => false,
        2 => {
            if !room.config.npc_attacks {
                return false;
            }
            if let (Some(direction), Some(actor)) =
                (Direction::between(origin, target), room.actors.get_mut(&npc))
            {
                actor.turn(direction, &mut room.events);
            }
            combat::resolve_blow(room, npc)
        }
        _ => match Direction::between(origin, path[1]) {
            Some(direction) => room.move_actor(npc, direction),
            None => false,
        },
    }
}

/// One AI pass over every NPC, in id order.
pub fn tick_npcs(room: &mut Room) {
    let npcs: Vec<ActorId> = room
        .actors
        .values()
        .filter(|actor| actor.is_npc())
        .map(|actor| actor.id())
        .collect();
    for npc in npcs {
        step_npc(room, npc);
    }
}
