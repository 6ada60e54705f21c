//! Tile map and its seeded generator.
//!
//! Tiles are addressed `(x, y)` and sit at world `(x, 0, y)`, one unit apart.
//! Writes outside the map are ignored.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::MapConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Terrain {
    #[default]
    Grass,
    Water,
    Mountain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    Tree { variant: u8 },
    Building,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    pub terrain: Terrain,
    pub prop: Option<Prop>,
}

#[derive(Debug, Clone)]
pub struct TileMap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// All grass, no props.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_valid(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.is_valid(x, y)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    pub fn set_terrain(&mut self, x: i32, y: i32, terrain: Terrain) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i].terrain = terrain;
        }
    }

    /// Place a prop, replacing whatever stood there.
    pub fn place_prop(&mut self, x: i32, y: i32, prop: Prop) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i].prop = Some(prop);
        }
    }

    pub fn clear_prop(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i].prop = None;
        }
    }

    /// Grass with nothing on it.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y)
            .is_some_and(|tile| tile.terrain == Terrain::Grass && tile.prop.is_none())
    }

    /// `(x, y, tile)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, &Tile)> + '_ {
        let width = self.width as usize;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, tile)| ((i % width) as i32, (i / width) as i32, tile))
    }

    pub fn generate(config: &MapConfig, tree_variants: u8) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut map = Self::new(config.size, config.size);
        let water = config.water;
        for x in water.x0..water.x1 {
            for y in water.y0..water.y1 {
                map.set_terrain(x, y, Terrain::Water);
            }
        }

        let size = config.size as i32;
        let variants = tree_variants.max(1);
        for _ in 0..config.trees {
            let x = rng.random_range(0..size);
            let y = rng.random_range(0..size);
            let variant = rng.random_range(0..variants);
            map.place_prop(x, y, Prop::Tree { variant });
        }
        for _ in 0..config.buildings {
            let x = rng.random_range(0..size);
            let y = rng.random_range(0..size);
            map.place_prop(x, y, Prop::Building);
        }

        log::info!(
            "Generated {}x{} map (seed {:#x}): {} props",
            map.width,
            map.height,
            config.seed,
            map.tiles.iter().filter(|t| t.prop.is_some()).count()
        );
        map
    }
}
