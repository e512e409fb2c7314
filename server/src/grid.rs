//! Tile occupancy for one room: static collision, the actor standing on each
//! tile and the item stack lying on it.
//!
//! The grid only answers questions and applies mutations it is told to apply.
//! Game rules (frozen actors, dead actors, inventory limits) live with the
//! callers, which query first and then commit.

use crate::map::CollisionLayer;
use rand::Rng;
use shared::{ActorId, ItemId, Position, TileItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub item: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default)]
struct Tile {
    collides: bool,
    occupant: Option<ActorId>,
    item: Option<ItemStack>,
}

#[derive(Debug, Clone)]
pub struct Grid {
    size: i32,
    stack_ceiling: u32,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn new(layer: &CollisionLayer, stack_ceiling: u32) -> Self {
        let size = layer.size();
        let mut tiles = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                tiles.push(Tile {
                    collides: layer.is_blocked(x, y),
                    ..Tile::default()
                });
            }
        }
        Self {
            size: size as i32,
            stack_ceiling,
            tiles,
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn stack_ceiling(&self) -> u32 {
        self.stack_ceiling
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.size && position.y < self.size
    }

    fn index(&self, position: Position) -> Option<usize> {
        if self.in_bounds(position) {
            Some((position.y * self.size + position.x) as usize)
        } else {
            None
        }
    }

    fn tile(&self, position: Position) -> Option<&Tile> {
        let index = self.index(position)?;
        Some(&self.tiles[index])
    }

    fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        let index = self.index(position)?;
        Some(&mut self.tiles[index])
    }

    pub fn neighbour(&self, position: Position, direction: shared::Direction) -> Position {
        position.neighbour(direction)
    }

    pub fn occupant(&self, position: Position) -> Option<ActorId> {
        self.tile(position).and_then(|tile| tile.occupant)
    }

    pub fn collides(&self, position: Position) -> bool {
        self.tile(position).map_or(true, |tile| tile.collides)
    }

    /// Out of bounds, static collision, or an actor standing there.
    pub fn is_blocked(&self, position: Position) -> bool {
        match self.tile(position) {
            Some(tile) => tile.collides || tile.occupant.is_some(),
            None => true,
        }
    }

    /// Moves `actor` from `from` (when it is recorded there) to `to`.
    /// Collision is not re-checked; callers test `is_blocked` first.
    pub fn place_actor(&mut self, actor: ActorId, from: Option<Position>, to: Position) {
        if let Some(from) = from {
            self.remove_actor(actor, from);
        }
        if let Some(tile) = self.tile_mut(to) {
            tile.occupant = Some(actor);
        }
    }

    pub fn remove_actor(&mut self, actor: ActorId, position: Position) {
        if let Some(tile) = self.tile_mut(position) {
            if tile.occupant == Some(actor) {
                tile.occupant = None;
            }
        }
    }

    pub fn item_at(&self, position: Position) -> Option<&ItemStack> {
        self.tile(position).and_then(|tile| tile.item.as_ref())
    }

    /// Room left on a tile for `item`: the full ceiling when empty, the
    /// remainder when holding the same item, zero otherwise.
    pub fn capacity_for(&self, position: Position, item: &str) -> u32 {
        match self.tile(position) {
            Some(tile) if !tile.collides => match &tile.item {
                None => self.stack_ceiling,
                Some(stack) if stack.item == item => {
                    self.stack_ceiling.saturating_sub(stack.quantity)
                }
                Some(_) => 0,
            },
            _ => 0,
        }
    }

    /// Puts up to `quantity` of `item` on the tile and returns the amount
    /// accepted. Overflow past the stack ceiling is left to the caller.
    pub fn add_item(&mut self, position: Position, item: &str, quantity: u32) -> u32 {
        let accepted = quantity.min(self.capacity_for(position, item));
        if accepted == 0 {
            return 0;
        }
        if let Some(tile) = self.tile_mut(position) {
            match &mut tile.item {
                Some(stack) => stack.quantity += accepted,
                None => {
                    tile.item = Some(ItemStack {
                        item: item.to_string(),
                        quantity: accepted,
                    })
                }
            }
        }
        accepted
    }

    /// Takes up to `quantity` from the tile's stack, clearing the tile when it runs out.
    pub fn remove_item(&mut self, position: Position, quantity: u32) -> u32 {
        let Some(tile) = self.tile_mut(position) else {
            return 0;
        };
        let Some(stack) = tile.item.as_mut() else {
            return 0;
        };
        let removed = quantity.min(stack.quantity);
        stack.quantity -= removed;
        if stack.quantity == 0 {
            tile.item = None;
        }
        removed
    }

    /// Uniformly samples tiles until an unblocked one turns up. Returns `None`
    /// only when no tile is free at all.
    pub fn random_free_position<R: Rng>(&self, rng: &mut R) -> Option<Position> {
        if self.size == 0 || !self.tiles.iter().any(|t| !t.collides && t.occupant.is_none()) {
            return None;
        }
        loop {
            let candidate = Position::new(rng.gen_range(0..self.size), rng.gen_range(0..self.size));
            if !self.is_blocked(candidate) {
                return Some(candidate);
            }
        }
    }

    /// Nearest tile to `origin` that can take at least one unit of `item`,
    /// searching square rings outward.
    pub fn drop_position(&self, origin: Position, item: &str) -> Option<Position> {
        for radius in 0..self.size {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let candidate = Position::new(origin.x + dx, origin.y + dy);
                    if self.capacity_for(candidate, item) > 0 {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    pub fn items(&self) -> Vec<TileItem> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(index, tile)| {
                tile.item.as_ref().map(|stack| TileItem {
                    position: Position::new(index as i32 % self.size, index as i32 / self.size),
                    item: stack.item.clone(),
                    quantity: stack.quantity,
                })
            })
            .collect()
    }

    pub fn actor_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.occupant.is_some()).count()
    }
}
