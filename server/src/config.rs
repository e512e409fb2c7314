//! Tunable room rules.
//!
//! Every field has a default so an override file only needs to name what it
//! changes. Durations are in milliseconds of room time.

use crate::error::{read_file, LoadError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Edge length of the square map. Replaced by the imported map's size when one is given.
    pub map_size: usize,
    /// Number of distinct item ids an actor can carry.
    pub inventory_size: usize,
    /// Largest quantity of one item id in an inventory slot or on a tile.
    pub stack_ceiling: u32,
    pub attack_stamina_cost: u32,
    pub message_length_cap: usize,
    pub freeze_duration_ms: u64,
    pub invisibility_duration_ms: u64,
    pub revive_delay_ms: u64,
    pub meditation_interval_ms: u64,
    pub meditation_increment: u32,
    pub stamina_rest_interval_ms: u64,
    pub stamina_rest_increment: u32,
    pub npc_tick_interval_ms: u64,
    pub npc_respawn_delay_ms: u64,
    /// NPCs standing next to their target swing at it instead of idling.
    pub npc_attacks: bool,
    pub room_capacity: usize,
    pub client_timeout_ms: u64,
    pub drop_inventory_on_death: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_size: 64,
            inventory_size: 20,
            stack_ceiling: 100,
            attack_stamina_cost: 20,
            message_length_cap: 128,
            freeze_duration_ms: 5_000,
            invisibility_duration_ms: 10_000,
            revive_delay_ms: 10_000,
            meditation_interval_ms: 1_000,
            meditation_increment: 5,
            stamina_rest_interval_ms: 1_000,
            stamina_rest_increment: 10,
            npc_tick_interval_ms: 500,
            npc_respawn_delay_ms: 15_000,
            npc_attacks: true,
            room_capacity: 32,
            client_timeout_ms: 5_000,
            drop_inventory_on_death: true,
        }
    }
}

impl GameConfig {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_json(&read_file(path)?)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.map_size == 0 {
            return Err(LoadError::Config("map_size must be positive".into()));
        }
        if self.inventory_size == 0 {
            return Err(LoadError::Config("inventory_size must be positive".into()));
        }
        if self.stack_ceiling == 0 {
            return Err(LoadError::Config("stack_ceiling must be positive".into()));
        }
        if self.meditation_interval_ms == 0 || self.stamina_rest_interval_ms == 0 {
            return Err(LoadError::Config(
                "regeneration intervals must be positive".into(),
            ));
        }
        if self.npc_tick_interval_ms == 0 {
            return Err(LoadError::Config(
                "npc_tick_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
