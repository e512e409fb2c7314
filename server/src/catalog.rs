//! Read-only reference data: items, spells, races, classes and NPC templates.
//!
//! Loaded once at startup and shared between rooms behind an `Arc`.

use crate::error::{read_file, LoadError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{ItemId, SpellId, StatKind};
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Inclusive `[min, max]` integer range.
pub type Range = [i64; 2];

/// Uniform integer from an inclusive range.
pub fn roll<R: Rng + ?Sized>(rng: &mut R, [min, max]: Range) -> i64 {
    if min >= max {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Head,
    Body,
    Legs,
    Feet,
    Hands,
    Weapon,
    Shield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consumable {
    Hp,
    Mana,
}

impl Consumable {
    pub fn stat(&self) -> StatKind {
        match self {
            Consumable::Hp => StatKind::Hp,
            Consumable::Mana => StatKind::Mana,
        }
    }
}

/// Combat attributes equipment can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    PhysicalDamage,
    PhysicalDefense,
    MagicalDamage,
    MagicalDefense,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDef {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub body_part: Option<BodyPart>,
    #[serde(default)]
    pub consumable: Option<Consumable>,
    #[serde(default)]
    pub restore: Option<Range>,
    #[serde(default)]
    pub physical_damage: Option<Range>,
    #[serde(default)]
    pub physical_defense: Option<Range>,
    #[serde(default)]
    pub magical_damage: Option<Range>,
    #[serde(default)]
    pub magical_defense: Option<Range>,
}

impl ItemDef {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            body_part: None,
            consumable: None,
            restore: None,
            physical_damage: None,
            physical_defense: None,
            magical_damage: None,
            magical_defense: None,
        }
    }

    pub fn bonus(&self, attribute: Attribute) -> Option<Range> {
        match attribute {
            Attribute::PhysicalDamage => self.physical_damage,
            Attribute::PhysicalDefense => self.physical_defense,
            Attribute::MagicalDamage => self.magical_damage,
            Attribute::MagicalDefense => self.magical_defense,
        }
    }

    fn validate(&self) -> Result<(), LoadError> {
        let ranges = [
            ("restore", self.restore),
            ("physical_damage", self.physical_damage),
            ("physical_defense", self.physical_defense),
            ("magical_damage", self.magical_damage),
            ("magical_defense", self.magical_defense),
        ];
        for (field, range) in ranges {
            if let Some([min, max]) = range {
                if min > max {
                    return Err(LoadError::invalid(
                        "item",
                        &self.id,
                        format!("{} range [{}, {}] is inverted", field, min, max),
                    ));
                }
            }
        }
        if self.consumable.is_some() && self.restore.is_none() {
            return Err(LoadError::invalid(
                "item",
                &self.id,
                "consumable without a restore range",
            ));
        }
        if self.consumable.is_some() && self.body_part.is_some() {
            return Err(LoadError::invalid(
                "item",
                &self.id,
                "an item cannot be both consumable and equippable",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpellType {
    Damage,
    Heal,
    Revive,
    Freeze,
    Unfreeze,
    Invisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpellDef {
    pub id: SpellId,
    #[serde(rename = "type")]
    pub kind: SpellType,
    pub mana_cost: u32,
    #[serde(default)]
    pub value: Range,
}

/// Multiplicative factors a race or class applies to the player base stats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Modifiers {
    pub hp: f64,
    pub mana: f64,
    pub stamina: f64,
    pub physical_damage: f64,
    pub physical_defense: f64,
    pub magical_damage: f64,
    pub magical_defense: f64,
    pub evasion: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            hp: 1.0,
            mana: 1.0,
            stamina: 1.0,
            physical_damage: 1.0,
            physical_defense: 1.0,
            magical_damage: 1.0,
            magical_defense: 1.0,
            evasion: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemGrant {
    pub item: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceDef {
    pub id: String,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassDef {
    pub id: String,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub spells: Vec<SpellId>,
    #[serde(default)]
    pub starting_items: Vec<ItemGrant>,
}

/// Base values every player starts from before race and class factors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerBase {
    pub hp: u32,
    pub mana: u32,
    pub stamina: u32,
    pub physical_damage: f64,
    pub physical_defense: f64,
    pub magical_damage: f64,
    pub magical_defense: f64,
    pub evasion: f64,
}

impl Default for PlayerBase {
    fn default() -> Self {
        Self {
            hp: 100,
            mana: 100,
            stamina: 100,
            physical_damage: 10.0,
            physical_defense: 2.0,
            magical_damage: 1.0,
            magical_defense: 1.0,
            evasion: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub hp: u32,
    pub physical_damage: f64,
    #[serde(default)]
    pub physical_defense: f64,
    #[serde(default)]
    pub magical_defense: f64,
    #[serde(default)]
    pub evasion: f64,
    pub fov: u32,
    #[serde(default)]
    pub loot: Vec<ItemGrant>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    player: PlayerBase,
    #[serde(default)]
    items: Vec<ItemDef>,
    #[serde(default)]
    spells: Vec<SpellDef>,
    #[serde(default)]
    races: Vec<RaceDef>,
    #[serde(default)]
    classes: Vec<ClassDef>,
    #[serde(default)]
    npcs: Vec<NpcTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub player: PlayerBase,
    items: HashMap<ItemId, ItemDef>,
    spells: HashMap<SpellId, SpellDef>,
    races: HashMap<String, RaceDef>,
    classes: HashMap<String, ClassDef>,
    npcs: Vec<NpcTemplate>,
}

fn index<T>(
    kind: &'static str,
    entries: Vec<T>,
    id: impl Fn(&T) -> String,
) -> Result<HashMap<String, T>, LoadError> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        let key = id(&entry);
        if map.contains_key(&key) {
            return Err(LoadError::Duplicate { kind, id: key });
        }
        map.insert(key, entry);
    }
    Ok(map)
}

impl Catalog {
    /// The catalog shipped with the server binary.
    pub fn builtin() -> Result<Self, LoadError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_json(&read_file(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let file: CatalogFile = serde_json::from_str(text)?;

        let mut npc_ids = std::collections::HashSet::new();
        for template in &file.npcs {
            if !npc_ids.insert(template.id.clone()) {
                return Err(LoadError::Duplicate {
                    kind: "npc",
                    id: template.id.clone(),
                });
            }
        }

        let catalog = Catalog {
            player: file.player,
            items: index("item", file.items, |item| item.id.clone())?,
            spells: index("spell", file.spells, |spell| spell.id.clone())?,
            races: index("race", file.races, |race| race.id.clone())?,
            classes: index("class", file.classes, |class| class.id.clone())?,
            npcs: file.npcs,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Checks ranges and cross references. Called by the loaders; programmatic
    /// builders may call it once they are done inserting.
    pub fn validate(&self) -> Result<(), LoadError> {
        if !(0.0..=1.0).contains(&self.player.evasion) {
            return Err(LoadError::invalid(
                "player",
                "base",
                "evasion must lie in [0, 1]",
            ));
        }
        for item in self.items.values() {
            item.validate()?;
        }
        for spell in self.spells.values() {
            if spell.value[0] > spell.value[1] {
                return Err(LoadError::invalid("spell", &spell.id, "value range is inverted"));
            }
        }
        for class in self.classes.values() {
            for spell in &class.spells {
                if !self.spells.contains_key(spell) {
                    return Err(LoadError::invalid(
                        "class",
                        &class.id,
                        format!("unknown spell `{}`", spell),
                    ));
                }
            }
            self.check_grants("class", &class.id, &class.starting_items)?;
        }
        for template in &self.npcs {
            if !(0.0..=1.0).contains(&template.evasion) {
                return Err(LoadError::invalid(
                    "npc",
                    &template.id,
                    "evasion must lie in [0, 1]",
                ));
            }
            self.check_grants("npc", &template.id, &template.loot)?;
        }
        Ok(())
    }

    fn check_grants(
        &self,
        kind: &'static str,
        id: &str,
        grants: &[ItemGrant],
    ) -> Result<(), LoadError> {
        for grant in grants {
            if !self.items.contains_key(&grant.item) {
                return Err(LoadError::invalid(
                    kind,
                    id,
                    format!("unknown item `{}`", grant.item),
                ));
            }
        }
        Ok(())
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn spell(&self, id: &str) -> Option<&SpellDef> {
        self.spells.get(id)
    }

    pub fn race(&self, id: &str) -> Option<&RaceDef> {
        self.races.get(id)
    }

    pub fn class(&self, id: &str) -> Option<&ClassDef> {
        self.classes.get(id)
    }

    pub fn npc(&self, id: &str) -> Option<&NpcTemplate> {
        self.npcs.iter().find(|template| template.id == id)
    }

    pub fn npc_templates(&self) -> &[NpcTemplate] {
        &self.npcs
    }

    pub fn with_item(mut self, item: ItemDef) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_spell(mut self, spell: SpellDef) -> Self {
        self.spells.insert(spell.id.clone(), spell);
        self
    }

    pub fn with_race(mut self, race: RaceDef) -> Self {
        self.races.insert(race.id.clone(), race);
        self
    }

    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.classes.insert(class.id.clone(), class);
        self
    }

    pub fn with_npc(mut self, template: NpcTemplate) -> Self {
        self.npcs.retain(|existing| existing.id != template.id);
        self.npcs.push(template);
        self
    }
}
