//! Spell casting.
//!
//! `cast_spell` checks everything that does not depend on the spell type,
//! then hands off to one effect function per type. An effect returns whether
//! the cast took; only then is mana spent and `ReceivedSpell` emitted.

use crate::catalog::{roll, SpellDef, SpellType};
use crate::room::Room;
use log::debug;
use shared::{ActorId, GameEvent, Position, StatKind};

pub fn cast_spell(room: &mut Room, caster_id: ActorId, spell_id: &str, target: Position) -> bool {
    let Some(spell) = room.catalog.spell(spell_id).cloned() else {
        return false;
    };
    let Some(target_id) = room.grid.occupant(target) else {
        return false;
    };
    let (Some(caster), Some(target)) = (room.actors.get(&caster_id), room.actors.get(&target_id))
    else {
        return false;
    };
    if !caster.knows_spell(&spell.id)
        || caster.is_dead()
        || caster.is_meditating()
        || caster.stat(StatKind::Mana) < spell.mana_cost
        || !target.kind().accepts(spell.kind)
    {
        debug!("Actor {} cannot cast {} on {}", caster_id, spell.id, target_id);
        return false;
    }

    let took = match spell.kind {
        SpellType::Damage => damage(room, caster_id, target_id, &spell),
        SpellType::Heal => heal(room, target_id, &spell),
        SpellType::Revive => revive(room, target_id),
        SpellType::Freeze => freeze(room, caster_id, target_id),
        SpellType::Unfreeze => unfreeze(room, target_id),
        SpellType::Invisibility => invisibility(room, target_id),
    };
    if !took {
        return false;
    }

    room.adjust_stat(caster_id, StatKind::Mana, -(spell.mana_cost as i64));
    room.events.push(GameEvent::ReceivedSpell {
        caster: caster_id,
        target: target_id,
        spell: spell.id,
    });
    true
}

fn is_dead(room: &Room, id: ActorId) -> bool {
    room.actors.get(&id).map_or(true, |actor| actor.is_dead())
}

/// Rolled value times the caster's magical damage, less the target's
/// magical defense. Never below zero.
fn damage(room: &mut Room, caster_id: ActorId, target_id: ActorId, spell: &SpellDef) -> bool {
    if caster_id == target_id || is_dead(room, target_id) {
        return false;
    }
    let caster = &room.actors[&caster_id];
    let target = &room.actors[&target_id];
    let rolled = roll(&mut room.rng, spell.value) as f64;
    let raw = rolled * caster.magical_damage(&room.catalog, &mut room.rng)
        - target.magical_defense(&room.catalog, &mut room.rng);
    let amount = raw.round().max(0.0) as i64;
    room.apply_damage(target_id, amount);
    true
}

fn heal(room: &mut Room, target_id: ActorId, spell: &SpellDef) -> bool {
    if is_dead(room, target_id) {
        return false;
    }
    let amount = roll(&mut room.rng, spell.value);
    room.adjust_stat(target_id, StatKind::Hp, amount.max(0));
    true
}

fn revive(room: &mut Room, target_id: ActorId) -> bool {
    room.revive(target_id)
}

fn freeze(room: &mut Room, caster_id: ActorId, target_id: ActorId) -> bool {
    let frozen = room
        .actors
        .get(&target_id)
        .map_or(true, |actor| actor.is_frozen());
    if caster_id == target_id || frozen || is_dead(room, target_id) {
        return false;
    }
    let duration = room.config.freeze_duration_ms;
    room.freeze_actor(target_id, duration)
}

fn unfreeze(room: &mut Room, target_id: ActorId) -> bool {
    let frozen = room
        .actors
        .get(&target_id)
        .is_some_and(|actor| actor.is_frozen());
    if !frozen || is_dead(room, target_id) {
        return false;
    }
    room.unfreeze_actor(target_id)
}

fn invisibility(room: &mut Room, target_id: ActorId) -> bool {
    if is_dead(room, target_id) {
        return false;
    }
    let duration = room.config.invisibility_duration_ms;
    room.make_invisible(target_id, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::GameConfig;
    use crate::timers::TimerKind;
    use std::sync::Arc;

    struct Fixture {
        room: Room,
        mage: ActorId,
        mage_at: Position,
        ally: ActorId,
        ally_at: Position,
    }

    fn fixture() -> Fixture {
        let config = GameConfig {
            map_size: 8,
            ..GameConfig::default()
        };
        let mut room = Room::new(config, Arc::new(Catalog::builtin().unwrap()), 5);
        let mage_at = Position::new(1, 1);
        let ally_at = Position::new(5, 5);
        let mage = room.join_player_at("mage", "human", "mage", mage_at).unwrap();
        let ally = room.join_player_at("ally", "human", "warrior", ally_at).unwrap();
        room.drain_events();
        Fixture {
            room,
            mage,
            mage_at,
            ally,
            ally_at,
        }
    }

    fn mana(room: &Room, id: ActorId) -> u32 {
        room.actor(id).unwrap().stat(StatKind::Mana)
    }

    #[test]
    fn test_revive_restores_dead_target() {
        let mut f = fixture();
        f.room.apply_damage(f.ally, 10_000);
        f.room.adjust_stat(f.ally, StatKind::Stamina, -40);
        f.room.drain_events();
        let before = mana(&f.room, f.mage);

        assert!(cast_spell(&mut f.room, f.mage, "revive", f.ally_at));
        let ally = f.room.actor(f.ally).unwrap();
        assert!(ally.is_alive());
        for stat in [StatKind::Hp, StatKind::Mana, StatKind::Stamina] {
            assert!(ally.stats().get(stat).unwrap().is_full());
        }
        assert!(!f.room.timers().is_scheduled(f.ally, TimerKind::Revive));
        assert_eq!(mana(&f.room, f.mage), before - 40);
        let events = f.room.drain_events();
        assert!(events.contains(&GameEvent::Revived { actor: f.ally }));
        assert!(events.contains(&GameEvent::ReceivedSpell {
            caster: f.mage,
            target: f.ally,
            spell: "revive".to_string()
        }));
    }

    #[test]
    fn test_revive_on_living_target_is_noop() {
        let mut f = fixture();
        let before = mana(&f.room, f.mage);
        assert!(!cast_spell(&mut f.room, f.mage, "revive", f.ally_at));
        assert_eq!(mana(&f.room, f.mage), before);
        assert!(f.room.drain_events().is_empty());
    }

    #[test]
    fn test_damage_rejects_self() {
        let mut f = fixture();
        assert!(!cast_spell(&mut f.room, f.mage, "fireball", f.mage_at));
        assert!(f.room.drain_events().is_empty());
    }

    #[test]
    fn test_damage_hurts_target() {
        let mut f = fixture();
        let before = f.room.actor(f.ally).unwrap().stat(StatKind::Hp);
        assert!(cast_spell(&mut f.room, f.mage, "fireball", f.ally_at));
        assert!(f.room.actor(f.ally).unwrap().stat(StatKind::Hp) < before);
    }

    #[test]
    fn test_unknown_spell_and_empty_tile() {
        let mut f = fixture();
        assert!(!cast_spell(&mut f.room, f.mage, "meteor", f.ally_at));
        assert!(!cast_spell(&mut f.room, f.mage, "heal", Position::new(7, 7)));
        assert!(!cast_spell(&mut f.room, f.ally, "heal", f.mage_at));
    }

    #[test]
    fn test_insufficient_mana() {
        let mut f = fixture();
        let full = mana(&f.room, f.mage) as i64;
        f.room.adjust_stat(f.mage, StatKind::Mana, -(full - 10));
        assert!(!cast_spell(&mut f.room, f.mage, "fireball", f.ally_at));
        assert_eq!(mana(&f.room, f.mage), 10);
    }

    #[test]
    fn test_freeze_then_thaw() {
        let mut f = fixture();
        assert!(cast_spell(&mut f.room, f.mage, "freeze", f.ally_at));
        assert!(f.room.actor(f.ally).unwrap().is_frozen());
        // Already frozen.
        assert!(!cast_spell(&mut f.room, f.mage, "freeze", f.ally_at));
        assert!(!cast_spell(&mut f.room, f.mage, "freeze", f.mage_at));

        assert!(cast_spell(&mut f.room, f.mage, "thaw", f.ally_at));
        assert!(!f.room.actor(f.ally).unwrap().is_frozen());
        assert!(!f.room.timers().is_scheduled(f.ally, TimerKind::Unfreeze));
        assert!(!cast_spell(&mut f.room, f.mage, "thaw", f.ally_at));
    }

    #[test]
    fn test_invisibility_expires() {
        let mut f = fixture();
        assert!(cast_spell(&mut f.room, f.mage, "vanish", f.mage_at));
        assert!(f.room.actor(f.mage).unwrap().is_invisible());
        let duration = f.room.config().invisibility_duration_ms;
        f.room.advance(duration);
        assert!(!f.room.actor(f.mage).unwrap().is_invisible());
    }

    #[test]
    fn test_npc_rejects_invisibility() {
        let mut f = fixture();
        let rat_at = Position::new(3, 3);
        f.room.spawn_npc_at("rat", rat_at).unwrap();
        assert!(!cast_spell(&mut f.room, f.mage, "vanish", rat_at));
        assert!(cast_spell(&mut f.room, f.mage, "freeze", rat_at));
    }

    #[test]
    fn test_heal_rejects_dead_target() {
        let mut f = fixture();
        f.room.apply_damage(f.ally, 10_000);
        assert!(!cast_spell(&mut f.room, f.mage, "heal", f.ally_at));
    }
}
