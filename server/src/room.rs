//! A room: one grid, the actors on it and the timers acting on them.
//!
//! The room is the only owner of game state. Every inbound action, timer
//! firing and AI step goes through `&mut Room`, so each handler runs to
//! completion before the next one starts. Handlers return `true` when they
//! took effect; a `false` return leaves no state change and no event behind.

use crate::actor::{Actor, ActorKind, DamageOutcome};
use crate::catalog::{roll, Catalog};
use crate::config::GameConfig;
use crate::grid::Grid;
use crate::map::CollisionLayer;
use crate::timers::{TimerKind, TimerQueue};
use crate::{ai, combat, spells};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ActionRequest, ActorId, ActorSnapshot, Direction, GameEvent, Position, StatKind, TileItem,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct Room {
    pub(crate) config: GameConfig,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) grid: Grid,
    pub(crate) actors: BTreeMap<ActorId, Actor>,
    pub(crate) timers: TimerQueue,
    pub(crate) rng: StdRng,
    pub(crate) events: Vec<GameEvent>,
    next_actor_id: ActorId,
    now_ms: u64,
}

impl Room {
    /// Open map of `config.map_size` tiles per side.
    pub fn new(config: GameConfig, catalog: Arc<Catalog>, seed: u64) -> Self {
        let layer = CollisionLayer::open(config.map_size);
        Self::with_collision(config, catalog, &layer, seed)
    }

    pub fn with_collision(
        mut config: GameConfig,
        catalog: Arc<Catalog>,
        layer: &CollisionLayer,
        seed: u64,
    ) -> Self {
        config.map_size = layer.size();
        let grid = Grid::new(layer, config.stack_ceiling);
        info!(
            "Room created: {}x{} tiles, {} blocked",
            layer.size(),
            layer.size(),
            layer.blocked_count()
        );
        Self {
            config,
            catalog,
            grid,
            actors: BTreeMap::new(),
            timers: TimerQueue::new(),
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
            next_actor_id: 1,
            now_ms: 0,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn player_count(&self) -> usize {
        self.actors.values().filter(|actor| actor.is_player()).count()
    }

    pub fn npc_count(&self) -> usize {
        self.actors.values().filter(|actor| actor.is_npc()).count()
    }

    /// Takes every event emitted since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Everything a newly connected client needs to draw the room.
    pub fn snapshot(&self) -> (Vec<ActorSnapshot>, Vec<TileItem>) {
        let actors = self
            .actors
            .values()
            .filter(|actor| actor.is_placed())
            .map(Actor::snapshot)
            .collect();
        (actors, self.grid.items())
    }

    fn allocate_id(&mut self) -> ActorId {
        let id = self.next_actor_id;
        self.next_actor_id += 1;
        id
    }

    /// Adds a player on a random free tile.
    pub fn join_player(&mut self, name: &str, race: &str, class: &str) -> Option<ActorId> {
        let position = self.grid.random_free_position(&mut self.rng)?;
        self.join_player_at(name, race, class, position)
    }

    pub fn join_player_at(
        &mut self,
        name: &str,
        race: &str,
        class: &str,
        position: Position,
    ) -> Option<ActorId> {
        if self.player_count() >= self.config.room_capacity {
            debug!("Join of {} rejected: room full", name);
            return None;
        }
        if self.grid.is_blocked(position) {
            return None;
        }
        let catalog = Arc::clone(&self.catalog);
        let (Some(race_def), Some(class_def)) = (catalog.race(race), catalog.class(class)) else {
            debug!("Join of {} rejected: unknown race {} or class {}", name, race, class);
            return None;
        };

        let id = self.allocate_id();
        let mut actor = Actor::player(
            id,
            name,
            position,
            &catalog.player,
            race_def,
            class_def,
            &self.config,
        );
        self.grid.place_actor(id, None, position);
        self.events.push(GameEvent::ActorSpawned {
            snapshot: actor.snapshot(),
        });
        for grant in &class_def.starting_items {
            actor.give_item(&grant.item, grant.quantity, &mut self.events);
        }
        self.actors.insert(id, actor);

        info!("Player {} ({} {}) joined as actor {} at {:?}", name, race, class, id, position);
        Some(id)
    }

    pub fn spawn_npc(&mut self, template: &str) -> Option<ActorId> {
        let position = self.grid.random_free_position(&mut self.rng)?;
        self.spawn_npc_at(template, position)
    }

    pub fn spawn_npc_at(&mut self, template: &str, position: Position) -> Option<ActorId> {
        if self.grid.is_blocked(position) {
            return None;
        }
        let template = self.catalog.npc(template)?.clone();

        let id = self.allocate_id();
        let mut actor = Actor::npc(id, &template, position, &self.config);
        self.grid.place_actor(id, None, position);
        self.events.push(GameEvent::ActorSpawned {
            snapshot: actor.snapshot(),
        });
        for grant in &template.loot {
            actor.give_item(&grant.item, grant.quantity, &mut self.events);
        }
        self.actors.insert(id, actor);

        debug!("Spawned npc {} as actor {} at {:?}", template.id, id, position);
        Some(id)
    }

    /// Removes an actor from the room for good.
    pub fn leave(&mut self, id: ActorId) -> bool {
        let Some(actor) = self.actors.remove(&id) else {
            return false;
        };
        if actor.is_placed() {
            self.grid.remove_actor(id, actor.position());
        }
        self.timers.cancel_all(id);
        self.events.push(GameEvent::ActorRemoved { actor: id });
        info!("Actor {} ({}) left the room", id, actor.name());
        true
    }

    pub fn handle_action(&mut self, id: ActorId, action: ActionRequest) -> bool {
        let took = match action {
            ActionRequest::Move { direction } => self.move_actor(id, direction),
            ActionRequest::Speak { text } => self.speak(id, &text),
            ActionRequest::Attack => self.attack(id),
            ActionRequest::Meditate => self.meditate(id),
            ActionRequest::UseItem { item } => self.use_item(id, &item),
            ActionRequest::GrabItem => self.grab_item(id),
            ActionRequest::DropItem { item, quantity } => self.drop_item(id, &item, quantity),
            ActionRequest::CastSpell { spell, position } => self.cast_spell(id, &spell, position),
        };
        if !took {
            debug!("Action from actor {} had no effect", id);
        }
        took
    }

    /// Turns and, when possible, steps. Returns whether the actor turned or
    /// stepped; a request that does neither leaves meditation running.
    pub fn move_actor(&mut self, id: ActorId, direction: Direction) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_dead() || !actor.is_placed() {
            return false;
        }
        let turns = actor.direction() != direction;
        let destination = self.grid.neighbour(actor.position(), direction);
        let steps = !actor.is_frozen() && !self.grid.is_blocked(destination);
        if !turns && !steps {
            return false;
        }

        if actor.set_meditating(false, &mut self.events) {
            self.timers.cancel(id, TimerKind::MeditationTick);
        }
        actor.move_in(direction, &mut self.grid, &mut self.events);
        true
    }

    pub fn speak(&mut self, id: ActorId, text: &str) -> bool {
        if !self.actors.contains_key(&id) {
            return false;
        }
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let text: String = text.chars().take(self.config.message_length_cap).collect();
        self.events.push(GameEvent::Spoke { actor: id, text });
        true
    }

    pub fn attack(&mut self, id: ActorId) -> bool {
        combat::resolve_blow(self, id)
    }

    pub fn cast_spell(&mut self, id: ActorId, spell: &str, target: Position) -> bool {
        spells::cast_spell(self, id, spell, target)
    }

    /// Starts meditating, or stops when already meditating.
    pub fn meditate(&mut self, id: ActorId) -> bool {
        let interval = self.config.meditation_interval_ms;
        let now = self.now_ms;
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_meditating() {
            actor.set_meditating(false, &mut self.events);
            self.timers.cancel(id, TimerKind::MeditationTick);
            return true;
        }
        let Some(mana) = actor.stats().get(StatKind::Mana) else {
            return false;
        };
        if actor.is_dead() || mana.is_full() {
            return false;
        }
        actor.set_meditating(true, &mut self.events);
        self.timers.schedule(id, TimerKind::MeditationTick, now + interval);
        true
    }

    /// Drinks a consumable, or toggles an equippable item.
    pub fn use_item(&mut self, id: ActorId, item: &str) -> bool {
        let Some(def) = self.catalog.item(item).cloned() else {
            return false;
        };
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_dead() || actor.inventory().quantity(item) == 0 {
            return false;
        }

        if let Some(consumable) = def.consumable {
            let stat = consumable.stat();
            if !actor.stats().has(stat) {
                return false;
            }
            let amount = def.restore.map_or(0, |range| roll(&mut self.rng, range));
            actor.consume_one(item, &mut self.events);
            actor.increase_stat(stat, amount, &mut self.events);
            return true;
        }

        if def.body_part.is_some() {
            if actor.equipment().is_equipped(item) {
                return actor.unequip(item, &mut self.events);
            }
            return actor.equip(&def, &mut self.events);
        }
        false
    }

    pub fn equip(&mut self, id: ActorId, item: &str) -> bool {
        let Some(def) = self.catalog.item(item) else {
            return false;
        };
        match self.actors.get_mut(&id) {
            Some(actor) if actor.is_alive() => actor.equip(def, &mut self.events),
            _ => false,
        }
    }

    pub fn unequip(&mut self, id: ActorId, item: &str) -> bool {
        match self.actors.get_mut(&id) {
            Some(actor) if actor.is_alive() => actor.unequip(item, &mut self.events),
            _ => false,
        }
    }

    pub fn grab_item(&mut self, id: ActorId) -> bool {
        match self.actors.get_mut(&id) {
            Some(actor) => actor.grab_item(&mut self.grid, &mut self.events) > 0,
            None => false,
        }
    }

    pub fn drop_item(&mut self, id: ActorId, item: &str, quantity: u32) -> bool {
        match self.actors.get_mut(&id) {
            Some(actor) => actor.drop_item(item, quantity, &mut self.grid, &mut self.events) > 0,
            None => false,
        }
    }

    /// Puts items into an actor's inventory outside the normal pickup path.
    pub fn give_item(&mut self, id: ActorId, item: &str, quantity: u32) -> u32 {
        match self.actors.get_mut(&id) {
            Some(actor) => actor.give_item(item, quantity, &mut self.events),
            None => 0,
        }
    }

    /// Places items on a tile directly, as a map loader or test would.
    pub fn place_item(&mut self, position: Position, item: &str, quantity: u32) -> u32 {
        let added = self.grid.add_item(position, item, quantity);
        if added > 0 {
            self.tile_changed(position);
        }
        added
    }

    fn tile_changed(&mut self, position: Position) {
        let stack = self.grid.item_at(position);
        self.events.push(GameEvent::TileItemChanged {
            position,
            item: stack.map(|stack| stack.item.clone()),
            quantity: stack.map_or(0, |stack| stack.quantity),
        });
    }

    /// Clamped change to one pool, arming stamina rest when stamina drops.
    pub fn adjust_stat(&mut self, id: ActorId, stat: StatKind, delta: i64) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        let changed = actor.adjust_stat(stat, delta, &mut self.events);
        if changed && stat == StatKind::Stamina && delta < 0 {
            let due = self.now_ms + self.config.stamina_rest_interval_ms;
            self.timers.ensure(id, TimerKind::StaminaRest, due);
        }
        changed
    }

    pub fn apply_damage(&mut self, id: ActorId, amount: i64) -> DamageOutcome {
        let Some(actor) = self.actors.get_mut(&id) else {
            return DamageOutcome::Ignored;
        };
        let outcome = actor.apply_damage(amount, &mut self.events);
        if outcome == DamageOutcome::Killed {
            self.handle_death(id);
        }
        outcome
    }

    fn handle_death(&mut self, id: ActorId) {
        self.timers.cancel(id, TimerKind::Unfreeze);
        self.timers.cancel(id, TimerKind::MeditationTick);
        self.timers.cancel(id, TimerKind::StaminaRest);

        if self.config.drop_inventory_on_death {
            self.scatter_inventory(id);
        }

        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        if actor.is_player() {
            let due = self.now_ms + self.config.revive_delay_ms;
            self.timers.schedule(id, TimerKind::Revive, due);
            info!("Player {} ({}) died, reviving in {} ms", id, actor.name(), self.config.revive_delay_ms);
        } else {
            self.grid.remove_actor(id, actor.position());
            actor.unplace();
            self.timers.cancel(id, TimerKind::InvisibilityEnd);
            self.events.push(GameEvent::ActorRemoved { actor: id });
            let due = self.now_ms + self.config.npc_respawn_delay_ms;
            self.timers.schedule(id, TimerKind::NpcRespawn, due);
            info!("Npc {} ({}) died, respawning in {} ms", id, actor.name(), self.config.npc_respawn_delay_ms);
        }
    }

    /// Empties a dead actor's inventory onto the tiles around it.
    fn scatter_inventory(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        let origin = actor.position();
        let held = actor.take_inventory(&mut self.events);
        if held.is_empty() {
            return;
        }

        let mut dropped = Vec::new();
        let mut touched = BTreeSet::new();
        for (item, quantity) in held {
            let mut remaining = quantity;
            while remaining > 0 {
                let Some(position) = self.grid.drop_position(origin, &item) else {
                    debug!("No room left to drop {} x{} from actor {}", item, remaining, id);
                    break;
                };
                let added = self.grid.add_item(position, &item, remaining);
                remaining -= added;
                touched.insert(position);
            }
            let placed = quantity - remaining;
            if placed > 0 {
                dropped.push((item, placed));
            }
        }

        self.events.push(GameEvent::InventoryDropped {
            actor: id,
            position: origin,
            items: dropped,
        });
        for position in touched {
            self.tile_changed(position);
        }
    }

    pub fn freeze_actor(&mut self, id: ActorId, duration_ms: u64) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_dead() {
            return false;
        }
        actor.set_frozen(true, &mut self.events);
        self.timers
            .schedule(id, TimerKind::Unfreeze, self.now_ms + duration_ms);
        true
    }

    pub fn unfreeze_actor(&mut self, id: ActorId) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        self.timers.cancel(id, TimerKind::Unfreeze);
        actor.set_frozen(false, &mut self.events)
    }

    pub fn make_invisible(&mut self, id: ActorId, duration_ms: u64) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_dead() {
            return false;
        }
        actor.set_invisible(true, &mut self.events);
        self.timers
            .schedule(id, TimerKind::InvisibilityEnd, self.now_ms + duration_ms);
        true
    }

    /// Brings a dead actor back with every pool full.
    pub fn revive(&mut self, id: ActorId) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if actor.is_alive() {
            return false;
        }
        self.timers.cancel(id, TimerKind::Revive);
        actor.restore_all(&mut self.events);
        self.events.push(GameEvent::Revived { actor: id });
        info!("Actor {} ({}) revived", id, actor.name());
        true
    }

    /// Runs every timer due at or before `now_ms`, in due order. Periodic
    /// timers re-arm from their own due time so late ticks catch up.
    pub fn advance(&mut self, now_ms: u64) {
        let now_ms = now_ms.max(self.now_ms);
        while let Some(entry) = self.timers.pop_due(now_ms) {
            self.now_ms = entry.due_ms.max(self.now_ms);
            self.fire(entry.actor, entry.kind);
        }
        self.now_ms = now_ms;
    }

    fn fire(&mut self, id: ActorId, kind: TimerKind) {
        match kind {
            TimerKind::Unfreeze => {
                if let Some(actor) = self.actors.get_mut(&id) {
                    actor.set_frozen(false, &mut self.events);
                }
            }
            TimerKind::InvisibilityEnd => {
                if let Some(actor) = self.actors.get_mut(&id) {
                    actor.set_invisible(false, &mut self.events);
                }
            }
            TimerKind::MeditationTick => self.meditation_tick(id),
            TimerKind::StaminaRest => self.stamina_rest(id),
            TimerKind::Revive => {
                self.revive(id);
            }
            TimerKind::NpcRespawn => self.respawn_npc(id),
        }
    }

    fn meditation_tick(&mut self, id: ActorId) {
        let increment = self.config.meditation_increment as i64;
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        if actor.is_dead() || !actor.is_meditating() {
            return;
        }
        actor.increase_stat(StatKind::Mana, increment, &mut self.events);
        let full = actor
            .stats()
            .get(StatKind::Mana)
            .map_or(true, |pool| pool.is_full());
        if full {
            actor.set_meditating(false, &mut self.events);
        } else {
            let due = self.now_ms + self.config.meditation_interval_ms;
            self.timers.schedule(id, TimerKind::MeditationTick, due);
        }
    }

    fn stamina_rest(&mut self, id: ActorId) {
        let increment = self.config.stamina_rest_increment as i64;
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        if actor.is_dead() {
            return;
        }
        actor.increase_stat(StatKind::Stamina, increment, &mut self.events);
        let full = actor
            .stats()
            .get(StatKind::Stamina)
            .map_or(true, |pool| pool.is_full());
        if !full {
            let due = self.now_ms + self.config.stamina_rest_interval_ms;
            self.timers.schedule(id, TimerKind::StaminaRest, due);
        }
    }

    fn respawn_npc(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        let ActorKind::Npc(profile) = actor.kind() else {
            return;
        };
        if actor.is_placed() {
            return;
        }
        let loot = profile.template.loot.clone();
        let Some(position) = self.grid.random_free_position(&mut self.rng) else {
            let due = self.now_ms + self.config.npc_respawn_delay_ms;
            self.timers.schedule(id, TimerKind::NpcRespawn, due);
            return;
        };

        actor.place(position);
        self.grid.place_actor(id, None, position);
        let mut scratch = Vec::new();
        actor.restore_all(&mut scratch);
        actor.set_frozen(false, &mut scratch);
        actor.set_invisible(false, &mut scratch);
        actor.take_inventory(&mut scratch);
        for grant in &loot {
            actor.give_item(&grant.item, grant.quantity, &mut scratch);
        }
        self.events.push(GameEvent::ActorSpawned {
            snapshot: actor.snapshot(),
        });
        info!("Npc {} ({}) respawned at {:?}", id, actor.name(), position);
    }

    /// One AI step for every NPC.
    pub fn tick_npcs(&mut self) {
        ai::tick_npcs(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room() -> Room {
        let catalog = Catalog::builtin().unwrap();
        let config = GameConfig {
            map_size: 8,
            ..GameConfig::default()
        };
        Room::new(config, Arc::new(catalog), 7)
    }

    #[test]
    fn test_join_places_player() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "warrior", Position::new(2, 2))
            .unwrap();
        assert_eq!(room.grid().occupant(Position::new(2, 2)), Some(id));
        let actor = room.actor(id).unwrap();
        assert_eq!(actor.inventory().quantity("sword"), 1);

        let events = room.drain_events();
        assert!(matches!(events[0], GameEvent::ActorSpawned { .. }));
    }

    #[test]
    fn test_join_rejects_unknown_class_and_full_room() {
        let mut room = test_room();
        assert!(room.join_player("ann", "human", "bard").is_none());

        room.config.room_capacity = 1;
        assert!(room.join_player("ann", "human", "warrior").is_some());
        assert!(room.join_player("bob", "human", "warrior").is_none());
    }

    #[test]
    fn test_leave_clears_grid_and_timers() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "mage", Position::new(1, 1))
            .unwrap();
        room.freeze_actor(id, 1_000);
        assert!(room.leave(id));
        assert_eq!(room.grid().occupant(Position::new(1, 1)), None);
        assert!(!room.timers().is_scheduled(id, TimerKind::Unfreeze));
        assert!(!room.leave(id));
    }

    #[test]
    fn test_speak_trims_and_truncates() {
        let mut room = test_room();
        room.config.message_length_cap = 5;
        let id = room.join_player("ann", "human", "warrior").unwrap();
        room.drain_events();

        assert!(!room.speak(id, "   "));
        assert!(room.speak(id, "  hello world  "));
        assert_eq!(
            room.drain_events(),
            vec![GameEvent::Spoke {
                actor: id,
                text: "hello".to_string()
            }]
        );
    }

    #[test]
    fn test_freeze_restarts_timer() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "warrior").unwrap();
        room.freeze_actor(id, 1_000);
        room.advance(600);
        room.freeze_actor(id, 1_000);
        room.advance(1_200);
        assert!(room.actor(id).unwrap().is_frozen());
        room.advance(1_600);
        assert!(!room.actor(id).unwrap().is_frozen());
    }

    #[test]
    fn test_meditation_fills_mana_then_stops() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "mage").unwrap();
        room.adjust_stat(id, StatKind::Mana, -12);
        let max = room.actor(id).unwrap().stats().get(StatKind::Mana).unwrap().max();

        assert!(room.meditate(id));
        assert!(room.actor(id).unwrap().is_meditating());
        room.advance(10_000);

        let actor = room.actor(id).unwrap();
        assert_eq!(actor.stat(StatKind::Mana), max);
        assert!(!actor.is_meditating());
        assert!(!room.timers().is_scheduled(id, TimerKind::MeditationTick));
    }

    #[test]
    fn test_meditation_requires_missing_mana() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "mage").unwrap();
        assert!(!room.meditate(id));
    }

    #[test]
    fn test_move_stops_meditation() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "mage", Position::new(3, 3))
            .unwrap();
        room.adjust_stat(id, StatKind::Mana, -50);
        room.meditate(id);
        room.move_actor(id, Direction::Left);
        assert!(!room.actor(id).unwrap().is_meditating());
        assert!(!room.timers().is_scheduled(id, TimerKind::MeditationTick));
    }

    #[test]
    fn test_move_into_edge_keeps_meditation() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "mage", Position::new(0, 3))
            .unwrap();
        // Turning toward the edge counts as a move.
        assert!(room.move_actor(id, Direction::Left));
        room.adjust_stat(id, StatKind::Mana, -50);
        assert!(room.meditate(id));
        room.drain_events();

        assert!(!room.move_actor(id, Direction::Left));
        assert!(room.actor(id).unwrap().is_meditating());
        assert!(room.timers().is_scheduled(id, TimerKind::MeditationTick));
        assert!(room.drain_events().is_empty());
    }

    #[test]
    fn test_frozen_turn_is_accepted() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "mage", Position::new(3, 3))
            .unwrap();
        room.freeze_actor(id, 5_000);

        assert!(room.move_actor(id, Direction::Up));
        let actor = room.actor(id).unwrap();
        assert_eq!(actor.position(), Position::new(3, 3));
        assert_eq!(actor.direction(), Direction::Up);
        assert!(!room.move_actor(id, Direction::Up));
    }

    #[test]
    fn test_stamina_rest_regenerates() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "warrior").unwrap();
        room.adjust_stat(id, StatKind::Stamina, -25);
        assert!(room.timers().is_scheduled(id, TimerKind::StaminaRest));

        room.advance(1_000);
        assert_eq!(room.actor(id).unwrap().stat(StatKind::Stamina), 85);
        room.advance(3_000);
        assert_eq!(room.actor(id).unwrap().stat(StatKind::Stamina), 100);
        assert!(!room.timers().is_scheduled(id, TimerKind::StaminaRest));
    }

    #[test]
    fn test_player_death_drops_inventory_and_revives() {
        let mut room = test_room();
        let id = room
            .join_player_at("ann", "human", "warrior", Position::new(4, 4))
            .unwrap();
        room.drain_events();

        assert_eq!(room.apply_damage(id, 1_000), DamageOutcome::Killed);
        assert!(room.actor(id).unwrap().inventory().is_empty());
        let events = room.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::InventoryDropped { actor, .. } if *actor == id
        )));
        assert!(room.grid().item_at(Position::new(4, 4)).is_some());

        room.advance(room.config().revive_delay_ms);
        let actor = room.actor(id).unwrap();
        assert!(actor.is_alive());
        assert_eq!(actor.stat(StatKind::Hp), actor.stats().get(StatKind::Hp).unwrap().max());
        assert!(room.drain_events().contains(&GameEvent::Revived { actor: id }));
    }

    #[test]
    fn test_npc_death_removes_then_respawns() {
        let mut room = test_room();
        let id = room.spawn_npc_at("rat", Position::new(1, 1)).unwrap();
        room.apply_damage(id, 1_000);

        assert!(!room.actor(id).unwrap().is_placed());
        assert_eq!(room.grid().occupant(Position::new(1, 1)), None);
        assert!(room.drain_events().contains(&GameEvent::ActorRemoved { actor: id }));

        room.advance(room.config().npc_respawn_delay_ms);
        let npc = room.actor(id).unwrap();
        assert!(npc.is_placed() && npc.is_alive());
        assert_eq!(room.grid().occupant(npc.position()), Some(id));
    }

    #[test]
    fn test_respawn_resets_loot_when_inventory_is_kept() {
        let mut room = test_room();
        room.config.drop_inventory_on_death = false;
        let id = room.spawn_npc_at("rat", Position::new(1, 1)).unwrap();

        for _ in 0..3 {
            assert_eq!(room.apply_damage(id, 1_000), DamageOutcome::Killed);
            let due = room.now_ms() + room.config().npc_respawn_delay_ms;
            room.advance(due);

            let npc = room.actor(id).unwrap();
            assert!(npc.is_placed());
            assert_eq!(npc.inventory().quantity("gold"), 2);
            assert_eq!(npc.inventory().len(), 1);
        }
    }

    #[test]
    fn test_use_item_consumes_potion() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "warrior").unwrap();
        room.apply_damage(id, 60);
        let before = room.actor(id).unwrap().stat(StatKind::Hp);

        assert!(room.use_item(id, "health_potion"));
        let actor = room.actor(id).unwrap();
        assert!(actor.stat(StatKind::Hp) > before);
        assert_eq!(actor.inventory().quantity("health_potion"), 2);
    }

    #[test]
    fn test_use_item_toggles_equipment() {
        let mut room = test_room();
        let id = room.join_player("ann", "human", "warrior").unwrap();
        assert!(room.use_item(id, "sword"));
        assert!(room.actor(id).unwrap().equipment().is_equipped("sword"));
        assert!(room.use_item(id, "sword"));
        assert!(!room.actor(id).unwrap().equipment().is_equipped("sword"));
        assert!(!room.use_item(id, "staff"));
    }

    #[test]
    fn test_snapshot_lists_placed_actors_and_items() {
        let mut room = test_room();
        room.join_player("ann", "human", "warrior").unwrap();
        let npc = room.spawn_npc("rat").unwrap();
        room.place_item(Position::new(0, 0), "gold", 3);
        room.apply_damage(npc, 1_000);

        let (actors, items) = room.snapshot();
        assert_eq!(actors.len(), 1);
        assert!(items.iter().any(|item| item.item == "gold"));
    }
}
