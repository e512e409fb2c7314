//! Collision layer import from tile-editor JSON exports.
//!
//! Only the parts of the export that decide walkability are read: the tile
//! layers and the per-tile `collides` property of each tileset. Object
//! layers and rendering data are ignored.

use crate::error::{read_file, LoadError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Tiled stores flip flags in the top three bits of a gid.
const GID_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Deserialize)]
struct TiledMap {
    width: usize,
    height: usize,
    #[serde(default)]
    layers: Vec<TiledLayer>,
    #[serde(default)]
    tilesets: Vec<TiledTileset>,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    #[serde(default)]
    data: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct TiledTileset {
    firstgid: u32,
    #[serde(default)]
    tiles: Vec<TiledTile>,
}

#[derive(Debug, Deserialize)]
struct TiledTile {
    id: u32,
    #[serde(default)]
    properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
struct TiledProperty {
    name: String,
    value: serde_json::Value,
}

/// Static walkability of a square map, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionLayer {
    size: usize,
    blocked: Vec<bool>,
}

impl CollisionLayer {
    /// A map without any static collision.
    pub fn open(size: usize) -> Self {
        Self {
            size,
            blocked: vec![false; size * size],
        }
    }

    /// Builds a layer from rows of text, `#` marking a wall.
    pub fn from_rows(rows: &[&str]) -> Result<Self, LoadError> {
        let size = rows.len();
        let mut blocked = Vec::with_capacity(size * size);
        for row in rows {
            let width = row.chars().count();
            if width != size {
                return Err(LoadError::NotSquare {
                    width,
                    height: size,
                });
            }
            blocked.extend(row.chars().map(|c| c == '#'));
        }
        Ok(Self { size, blocked })
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_tiled_json(&read_file(path)?)
    }

    pub fn from_tiled_json(text: &str) -> Result<Self, LoadError> {
        let map: TiledMap = serde_json::from_str(text)?;
        if map.width != map.height {
            return Err(LoadError::NotSquare {
                width: map.width,
                height: map.height,
            });
        }

        let colliding = colliding_gids(&map.tilesets);
        let expected = map.width * map.height;
        let mut blocked = vec![false; expected];

        for (index, layer) in map.layers.iter().enumerate() {
            if layer.data.is_empty() {
                continue;
            }
            if layer.data.len() != expected {
                return Err(LoadError::LayerSize {
                    index,
                    expected,
                    actual: layer.data.len(),
                });
            }
            for (cell, gid) in layer.data.iter().enumerate() {
                if colliding.contains(&(gid & GID_MASK)) {
                    blocked[cell] = true;
                }
            }
        }

        Ok(Self {
            size: map.width,
            blocked,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_blocked(&self, x: usize, y: usize) -> bool {
        self.blocked
            .get(y * self.size + x)
            .copied()
            .unwrap_or(true)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|cell| **cell).count()
    }
}

fn colliding_gids(tilesets: &[TiledTileset]) -> HashSet<u32> {
    let mut gids = HashSet::new();
    for tileset in tilesets {
        for tile in &tileset.tiles {
            let collides = tile
                .properties
                .iter()
                .any(|prop| prop.name == "collides" && prop.value.as_bool() == Some(true));
            if collides {
                gids.insert(tileset.firstgid + tile.id);
            }
        }
    }
    gids
}
