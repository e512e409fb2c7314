use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 8192;

pub type ActorId = u32;
pub type ItemId = String;
pub type SpellId = String;

/// Tile coordinate on the room grid. `y` grows downwards.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile in `direction`. Not bounds checked.
    pub fn neighbour(&self, direction: Direction) -> Position {
        let (dx, dy) = direction.offset();
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn neighbours(&self) -> [Position; 4] {
        Direction::ALL.map(|direction| self.neighbour(direction))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Direction of a single cardinal step from `from` to `to`, if they are adjacent.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|direction| from.neighbour(*direction) == to)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatKind {
    Hp,
    Mana,
    Stamina,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ActorClass {
    Player,
    Npc,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatValue {
    pub stat: StatKind,
    pub current: u32,
    pub max: u32,
}

/// Full public state of one actor, sent on join and respawn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub class: ActorClass,
    pub name: String,
    pub position: Position,
    pub direction: Direction,
    pub stats: Vec<StatValue>,
    pub equipment: Vec<ItemId>,
    pub frozen: bool,
    pub invisible: bool,
    pub meditating: bool,
    pub dead: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TileItem {
    pub position: Position,
    pub item: ItemId,
    pub quantity: u32,
}

/// Inbound game actions. The acting actor is implied by the sending session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ActionRequest {
    Move { direction: Direction },
    Speak { text: String },
    Attack,
    Meditate,
    UseItem { item: ItemId },
    GrabItem,
    DropItem { item: ItemId, quantity: u32 },
    CastSpell { spell: SpellId, position: Position },
}

/// Outbound state changes, one per observable mutation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum GameEvent {
    DirectionChanged {
        actor: ActorId,
        direction: Direction,
    },
    PositionChanged {
        actor: ActorId,
        position: Position,
    },
    Attacked {
        attacker: ActorId,
        target: Option<ActorId>,
        damage: u32,
    },
    MissedAttack {
        attacker: ActorId,
        target: ActorId,
    },
    Died {
        actor: ActorId,
    },
    Revived {
        actor: ActorId,
    },
    StatChanged {
        actor: ActorId,
        stat: StatKind,
        value: u32,
        max: u32,
    },
    FrozenChanged {
        actor: ActorId,
        frozen: bool,
    },
    VisibilityChanged {
        actor: ActorId,
        invisible: bool,
    },
    InventoryChanged {
        actor: ActorId,
        item: ItemId,
        quantity: u32,
    },
    InventoryDropped {
        actor: ActorId,
        position: Position,
        items: Vec<(ItemId, u32)>,
    },
    Equipped {
        actor: ActorId,
        item: ItemId,
    },
    Unequipped {
        actor: ActorId,
        item: ItemId,
    },
    StartedMeditating {
        actor: ActorId,
    },
    StoppedMeditating {
        actor: ActorId,
    },
    ReceivedSpell {
        caster: ActorId,
        target: ActorId,
        spell: SpellId,
    },
    TileItemChanged {
        position: Position,
        item: Option<ItemId>,
        quantity: u32,
    },
    Spoke {
        actor: ActorId,
        text: String,
    },
    ActorSpawned {
        snapshot: ActorSnapshot,
    },
    ActorRemoved {
        actor: ActorId,
    },
}

impl GameEvent {
    /// The actor whose state this event describes, if any.
    pub fn subject(&self) -> Option<ActorId> {
        match self {
            GameEvent::DirectionChanged { actor, .. }
            | GameEvent::PositionChanged { actor, .. }
            | GameEvent::Died { actor }
            | GameEvent::Revived { actor }
            | GameEvent::StatChanged { actor, .. }
            | GameEvent::FrozenChanged { actor, .. }
            | GameEvent::VisibilityChanged { actor, .. }
            | GameEvent::InventoryChanged { actor, .. }
            | GameEvent::InventoryDropped { actor, .. }
            | GameEvent::Equipped { actor, .. }
            | GameEvent::Unequipped { actor, .. }
            | GameEvent::StartedMeditating { actor }
            | GameEvent::StoppedMeditating { actor }
            | GameEvent::Spoke { actor, .. }
            | GameEvent::ActorRemoved { actor } => Some(*actor),
            GameEvent::Attacked { attacker, .. } | GameEvent::MissedAttack { attacker, .. } => {
                Some(*attacker)
            }
            GameEvent::ReceivedSpell { target, .. } => Some(*target),
            GameEvent::ActorSpawned { snapshot } => Some(snapshot.id),
            GameEvent::TileItemChanged { .. } => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
        race: String,
        class: String,
    },
    Action {
        sequence: u32,
        action: ActionRequest,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
        actor_id: ActorId,
    },
    Snapshot {
        tick: u64,
        actors: Vec<ActorSnapshot>,
        items: Vec<TileItem>,
    },
    Events {
        tick: u64,
        events: Vec<GameEvent>,
    },
    Disconnected {
        reason: String,
    },
}
