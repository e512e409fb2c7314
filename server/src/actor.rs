//! Actors: anything standing on the grid with hit points and an action set.
//!
//! An `Actor` carries the state every kind shares (pools, position,
//! inventory, equipment, status flags). What differs between players and NPCs
//! is kept in `ActorKind`: the combat formulas, AI sight radius, known
//! spells and which spell effects they can receive.
//!
//! Every mutation reports what it changed as `GameEvent`s pushed onto the
//! caller's event buffer. A rejected mutation pushes nothing.

use crate::catalog::{
    roll, Attribute, Catalog, ClassDef, ItemDef, NpcTemplate, PlayerBase, RaceDef, SpellType,
};
use crate::config::GameConfig;
use crate::grid::Grid;
use crate::inventory::{Equipment, Inventory};
use crate::stats::Stats;
use rand::Rng;
use shared::{
    ActorClass, ActorId, ActorSnapshot, Direction, GameEvent, ItemId, Position, SpellId, StatKind,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub base: PlayerBase,
    pub race: RaceDef,
    pub class: ClassDef,
    pub spells: BTreeSet<SpellId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcProfile {
    pub template: NpcTemplate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActorKind {
    Player(PlayerProfile),
    Npc(NpcProfile),
}

impl ActorKind {
    /// Whether an actor of this kind can be the target of `spell` at all.
    pub fn accepts(&self, spell: SpellType) -> bool {
        match self {
            ActorKind::Player(_) => true,
            ActorKind::Npc(_) => !matches!(spell, SpellType::Invisibility | SpellType::Revive),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    Ignored,
    Damaged,
    Killed,
}

fn scaled(base: u32, factors: &[f64]) -> u32 {
    let value = factors.iter().fold(base as f64, |acc, factor| acc * factor);
    value.round().max(1.0) as u32
}

#[derive(Debug, Clone)]
pub struct Actor {
    id: ActorId,
    name: String,
    position: Position,
    direction: Direction,
    stats: Stats,
    inventory: Inventory,
    equipment: Equipment,
    frozen: bool,
    invisible: bool,
    meditating: bool,
    placed: bool,
    kind: ActorKind,
}

impl Actor {
    pub fn player(
        id: ActorId,
        name: &str,
        position: Position,
        base: &PlayerBase,
        race: &RaceDef,
        class: &ClassDef,
        config: &GameConfig,
    ) -> Self {
        let (r, c) = (&race.modifiers, &class.modifiers);
        let stats = Stats::default()
            .with(StatKind::Hp, scaled(base.hp, &[r.hp, c.hp]))
            .with(StatKind::Mana, scaled(base.mana, &[r.mana, c.mana]))
            .with(StatKind::Stamina, scaled(base.stamina, &[r.stamina, c.stamina]));

        Self {
            id,
            name: name.to_string(),
            position,
            direction: Direction::default(),
            stats,
            inventory: Inventory::new(config.inventory_size, config.stack_ceiling),
            equipment: Equipment::default(),
            frozen: false,
            invisible: false,
            meditating: false,
            placed: true,
            kind: ActorKind::Player(PlayerProfile {
                base: base.clone(),
                race: race.clone(),
                class: class.clone(),
                spells: class.spells.iter().cloned().collect(),
            }),
        }
    }

    pub fn npc(id: ActorId, template: &NpcTemplate, position: Position, config: &GameConfig) -> Self {
        let name = if template.name.is_empty() {
            template.id.clone()
        } else {
            template.name.clone()
        };
        Self {
            id,
            name,
            position,
            direction: Direction::default(),
            stats: Stats::default().with(StatKind::Hp, template.hp.max(1)),
            inventory: Inventory::new(config.inventory_size, config.stack_ceiling),
            equipment: Equipment::default(),
            frozen: false,
            invisible: false,
            meditating: false,
            placed: true,
            kind: ActorKind::Npc(NpcProfile {
                template: template.clone(),
            }),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> &ActorKind {
        &self.kind
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, ActorKind::Player(_))
    }

    pub fn is_npc(&self) -> bool {
        matches!(self.kind, ActorKind::Npc(_))
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stat(&self, stat: StatKind) -> u32 {
        self.stats.current(stat)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn is_dead(&self) -> bool {
        self.stats.current(StatKind::Hp) == 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn is_meditating(&self) -> bool {
        self.meditating
    }

    /// Whether the actor currently occupies a grid cell.
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn fov(&self) -> Option<u32> {
        match &self.kind {
            ActorKind::Npc(profile) => Some(profile.template.fov),
            ActorKind::Player(_) => None,
        }
    }

    pub fn knows_spell(&self, spell: &str) -> bool {
        match &self.kind {
            ActorKind::Player(profile) => profile.spells.contains(spell),
            ActorKind::Npc(_) => false,
        }
    }

    pub(crate) fn place(&mut self, position: Position) {
        self.position = position;
        self.placed = true;
    }

    pub(crate) fn unplace(&mut self) {
        self.placed = false;
    }

    pub fn turn(&mut self, direction: Direction, events: &mut Vec<GameEvent>) -> bool {
        if self.direction == direction {
            return false;
        }
        self.direction = direction;
        events.push(GameEvent::DirectionChanged {
            actor: self.id,
            direction,
        });
        true
    }

    /// Faces `direction`, then steps into it unless frozen or blocked.
    /// The turn happens even when the step does not.
    pub fn move_in(
        &mut self,
        direction: Direction,
        grid: &mut Grid,
        events: &mut Vec<GameEvent>,
    ) -> Option<Position> {
        if self.is_dead() || !self.placed {
            return None;
        }
        self.turn(direction, events);
        if self.frozen {
            return None;
        }
        let destination = grid.neighbour(self.position, direction);
        if grid.is_blocked(destination) {
            return None;
        }
        grid.place_actor(self.id, Some(self.position), destination);
        self.position = destination;
        events.push(GameEvent::PositionChanged {
            actor: self.id,
            position: destination,
        });
        Some(destination)
    }

    /// Clamped change to one pool. No event when the value does not move.
    pub fn adjust_stat(&mut self, stat: StatKind, delta: i64, events: &mut Vec<GameEvent>) -> bool {
        let Some(pool) = self.stats.get_mut(stat) else {
            return false;
        };
        match pool.adjust(delta) {
            Some(value) => {
                events.push(GameEvent::StatChanged {
                    actor: self.id,
                    stat,
                    value,
                    max: pool.max(),
                });
                true
            }
            None => false,
        }
    }

    pub fn increase_stat(&mut self, stat: StatKind, amount: i64, events: &mut Vec<GameEvent>) -> bool {
        if amount < 0 {
            return false;
        }
        self.adjust_stat(stat, amount, events)
    }

    pub fn decrease_stat(&mut self, stat: StatKind, amount: i64, events: &mut Vec<GameEvent>) -> bool {
        if amount < 0 {
            return false;
        }
        self.adjust_stat(stat, -amount, events)
    }

    /// Subtracts `amount` hit points. Reaching zero kills the actor, which
    /// also ends any freeze and meditation.
    pub fn apply_damage(&mut self, amount: i64, events: &mut Vec<GameEvent>) -> DamageOutcome {
        if amount < 0 || self.is_dead() {
            return DamageOutcome::Ignored;
        }
        let hp = self.stat(StatKind::Hp) as i64;
        if hp - amount > 0 {
            self.adjust_stat(StatKind::Hp, -amount, events);
            return DamageOutcome::Damaged;
        }

        self.adjust_stat(StatKind::Hp, -hp, events);
        self.set_frozen(false, events);
        self.set_meditating(false, events);
        events.push(GameEvent::Died { actor: self.id });
        DamageOutcome::Killed
    }

    /// Fills every pool. Used by revival and respawn.
    pub fn restore_all(&mut self, events: &mut Vec<GameEvent>) {
        for stat in self.stats.kinds() {
            if let Some(pool) = self.stats.get_mut(stat) {
                if let Some(value) = pool.refill() {
                    events.push(GameEvent::StatChanged {
                        actor: self.id,
                        stat,
                        value,
                        max: pool.max(),
                    });
                }
            }
        }
    }

    pub fn set_frozen(&mut self, frozen: bool, events: &mut Vec<GameEvent>) -> bool {
        if self.frozen == frozen {
            return false;
        }
        self.frozen = frozen;
        events.push(GameEvent::FrozenChanged {
            actor: self.id,
            frozen,
        });
        true
    }

    pub fn set_invisible(&mut self, invisible: bool, events: &mut Vec<GameEvent>) -> bool {
        if self.invisible == invisible {
            return false;
        }
        self.invisible = invisible;
        events.push(GameEvent::VisibilityChanged {
            actor: self.id,
            invisible,
        });
        true
    }

    pub fn set_meditating(&mut self, meditating: bool, events: &mut Vec<GameEvent>) -> bool {
        if self.meditating == meditating {
            return false;
        }
        self.meditating = meditating;
        events.push(if meditating {
            GameEvent::StartedMeditating { actor: self.id }
        } else {
            GameEvent::StoppedMeditating { actor: self.id }
        });
        true
    }

    fn inventory_changed(&self, item: &str, events: &mut Vec<GameEvent>) {
        events.push(GameEvent::InventoryChanged {
            actor: self.id,
            item: item.to_string(),
            quantity: self.inventory.quantity(item),
        });
    }

    fn tile_changed(position: Position, grid: &Grid, events: &mut Vec<GameEvent>) {
        let stack = grid.item_at(position);
        events.push(GameEvent::TileItemChanged {
            position,
            item: stack.map(|stack| stack.item.clone()),
            quantity: stack.map_or(0, |stack| stack.quantity),
        });
    }

    /// Adds items directly (starting kit, loot). Returns the amount accepted.
    pub fn give_item(&mut self, item: &str, quantity: u32, events: &mut Vec<GameEvent>) -> u32 {
        let accepted = self.inventory.add(item, quantity);
        if accepted > 0 {
            self.inventory_changed(item, events);
        }
        accepted
    }

    /// Picks up as much of the stack under the actor as the inventory takes.
    pub fn grab_item(&mut self, grid: &mut Grid, events: &mut Vec<GameEvent>) -> u32 {
        if self.is_dead() || !self.placed {
            return 0;
        }
        let Some(stack) = grid.item_at(self.position).cloned() else {
            return 0;
        };
        let accepted = self.inventory.add(&stack.item, stack.quantity);
        if accepted == 0 {
            return 0;
        }
        grid.remove_item(self.position, accepted);
        self.inventory_changed(&stack.item, events);
        Self::tile_changed(self.position, grid, events);
        accepted
    }

    /// Puts `quantity` of `item` on the actor's tile, capped by the room
    /// left on a matching stack. Returns the amount dropped.
    pub fn drop_item(
        &mut self,
        item: &str,
        quantity: u32,
        grid: &mut Grid,
        events: &mut Vec<GameEvent>,
    ) -> u32 {
        if quantity == 0 || self.is_dead() || !self.placed {
            return 0;
        }
        if self.inventory.quantity(item) < quantity {
            return 0;
        }
        let dropped = grid.add_item(self.position, item, quantity);
        if dropped == 0 {
            return 0;
        }
        let left = self.inventory.remove(item, dropped).unwrap_or(0);
        if left == 0 {
            self.unequip(item, events);
        }
        self.inventory_changed(item, events);
        Self::tile_changed(self.position, grid, events);
        dropped
    }

    /// Uses up one unit of `item`.
    pub fn consume_one(&mut self, item: &str, events: &mut Vec<GameEvent>) -> bool {
        if self.inventory.remove(item, 1).is_none() {
            return false;
        }
        self.inventory_changed(item, events);
        true
    }

    pub fn equip(&mut self, item: &ItemDef, events: &mut Vec<GameEvent>) -> bool {
        let Some(part) = item.body_part else {
            return false;
        };
        if self.inventory.quantity(&item.id) == 0 || self.equipment.is_equipped(&item.id) {
            return false;
        }
        if let Some(replaced) = self.equipment.equip(part, &item.id) {
            events.push(GameEvent::Unequipped {
                actor: self.id,
                item: replaced,
            });
        }
        events.push(GameEvent::Equipped {
            actor: self.id,
            item: item.id.clone(),
        });
        true
    }

    pub fn unequip(&mut self, item: &str, events: &mut Vec<GameEvent>) -> bool {
        if self.equipment.unequip(item).is_none() {
            return false;
        }
        events.push(GameEvent::Unequipped {
            actor: self.id,
            item: item.to_string(),
        });
        true
    }

    /// Empties the inventory, unequipping everything. Returns what was held.
    pub fn take_inventory(&mut self, events: &mut Vec<GameEvent>) -> Vec<(ItemId, u32)> {
        for item in self.equipment.item_ids() {
            self.unequip(&item, events);
        }
        let items = self.inventory.take_all();
        for (item, _) in &items {
            self.inventory_changed(item, events);
        }
        items
    }

    fn base_attribute(&self, attribute: Attribute) -> f64 {
        match &self.kind {
            ActorKind::Player(profile) => {
                let (base, r, c) = (&profile.base, &profile.race.modifiers, &profile.class.modifiers);
                match attribute {
                    Attribute::PhysicalDamage => {
                        base.physical_damage * r.physical_damage * c.physical_damage
                    }
                    Attribute::PhysicalDefense => {
                        base.physical_defense * r.physical_defense * c.physical_defense
                    }
                    Attribute::MagicalDamage => {
                        base.magical_damage * r.magical_damage * c.magical_damage
                    }
                    Attribute::MagicalDefense => {
                        base.magical_defense * r.magical_defense * c.magical_defense
                    }
                }
            }
            ActorKind::Npc(profile) => {
                let template = &profile.template;
                match attribute {
                    Attribute::PhysicalDamage => template.physical_damage,
                    Attribute::PhysicalDefense => template.physical_defense,
                    Attribute::MagicalDamage => 0.0,
                    Attribute::MagicalDefense => template.magical_defense,
                }
            }
        }
    }

    /// Sum over equipped items of a roll in the item's range for `attribute`.
    fn equipment_bonus<R: Rng + ?Sized>(&self, attribute: Attribute, catalog: &Catalog, rng: &mut R) -> f64 {
        self.equipment
            .item_ids()
            .iter()
            .filter_map(|id| catalog.item(id))
            .filter_map(|item| item.bonus(attribute))
            .map(|range| roll(rng, range) as f64)
            .sum()
    }

    fn attribute<R: Rng + ?Sized>(&self, attribute: Attribute, catalog: &Catalog, rng: &mut R) -> f64 {
        self.base_attribute(attribute) + self.equipment_bonus(attribute, catalog, rng)
    }

    pub fn physical_damage<R: Rng + ?Sized>(&self, catalog: &Catalog, rng: &mut R) -> f64 {
        self.attribute(Attribute::PhysicalDamage, catalog, rng)
    }

    pub fn physical_defense<R: Rng + ?Sized>(&self, catalog: &Catalog, rng: &mut R) -> f64 {
        self.attribute(Attribute::PhysicalDefense, catalog, rng)
    }

    pub fn magical_damage<R: Rng + ?Sized>(&self, catalog: &Catalog, rng: &mut R) -> f64 {
        self.attribute(Attribute::MagicalDamage, catalog, rng)
    }

    pub fn magical_defense<R: Rng + ?Sized>(&self, catalog: &Catalog, rng: &mut R) -> f64 {
        self.attribute(Attribute::MagicalDefense, catalog, rng)
    }

    /// Chance in `[0, 1]` to dodge a melee blow.
    pub fn evasion(&self) -> f64 {
        let value = match &self.kind {
            ActorKind::Player(profile) => {
                profile.base.evasion * profile.race.modifiers.evasion * profile.class.modifiers.evasion
            }
            ActorKind::Npc(profile) => profile.template.evasion,
        };
        value.clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            class: if self.is_player() {
                ActorClass::Player
            } else {
                ActorClass::Npc
            },
            name: self.name.clone(),
            position: self.position,
            direction: self.direction,
            stats: self.stats.values(),
            equipment: self.equipment.item_ids(),
            frozen: self.frozen,
            invisible: self.invisible,
            meditating: self.meditating,
            dead: self.is_dead(),
        }
    }
}
