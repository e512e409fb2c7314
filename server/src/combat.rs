//! Melee blow resolution.

use crate::actor::Actor;
use crate::room::Room;
use log::debug;
use rand::Rng;
use shared::{ActorId, GameEvent, StatKind};

/// Swings at whatever stands on the tile the attacker faces.
///
/// The stamina cost is paid on every accepted swing, whether it hits, is
/// dodged or cuts through empty air. Actors without a stamina pool swing
/// for free.
pub fn resolve_blow(room: &mut Room, attacker_id: ActorId) -> bool {
    let cost = room.config.attack_stamina_cost as i64;
    let Some(attacker) = room.actors.get(&attacker_id) else {
        return false;
    };
    if attacker.is_dead() || !attacker.is_placed() || attacker.is_meditating() {
        return false;
    }
    let pays_stamina = attacker.stats().has(StatKind::Stamina);
    if pays_stamina && (attacker.stat(StatKind::Stamina) as i64) < cost {
        debug!("Actor {} too tired to attack", attacker_id);
        return false;
    }

    let front = room.grid.neighbour(attacker.position(), attacker.direction());
    let defender_id = room
        .grid
        .occupant(front)
        .filter(|id| room.actors.get(id).is_some_and(Actor::is_alive));

    match defender_id {
        None => room.events.push(GameEvent::Attacked {
            attacker: attacker_id,
            target: None,
            damage: 0,
        }),
        Some(defender_id) => {
            let attacker = &room.actors[&attacker_id];
            let defender = &room.actors[&defender_id];
            let evasion = defender.evasion();
            if evasion > 0.0 && room.rng.gen::<f64>() <= evasion {
                room.events.push(GameEvent::MissedAttack {
                    attacker: attacker_id,
                    target: defender_id,
                });
            } else {
                let raw = attacker.physical_damage(&room.catalog, &mut room.rng)
                    - defender.physical_defense(&room.catalog, &mut room.rng);
                let damage = raw.round().max(0.0) as i64;
                room.events.push(GameEvent::Attacked {
                    attacker: attacker_id,
                    target: Some(defender_id),
                    damage: damage as u32,
                });
                room.apply_damage(defender_id, damage);
            }
        }
    }

    if pays_stamina {
        room.adjust_stat(attacker_id, StatKind::Stamina, -cost);
    }
    true
}
