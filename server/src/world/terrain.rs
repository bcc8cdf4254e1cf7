//! Terrain height queries.
//!
//! Heightmaps are stored as a JSON metadata file next to a binary file of
//! little-endian f32 heights (row-major, Y then X). Heights between samples
//! are bilinearly interpolated.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use log::{info, warn};
use serde::Deserialize;

/// Ground height lookup used when a creature needs to land
pub trait TerrainQuery {
    fn ground_height(&self, map_id: u32, x: f32, y: f32) -> Option<f32>;
}

/// Heightmap metadata structure
#[derive(Debug, Deserialize)]
struct HeightmapMetadata {
    version: u32,
    width: u32,
    height: u32,
    world_min_x: f32,
    world_max_x: f32,
    world_min_y: f32,
    world_max_y: f32,
}

/// Height samples covering one rectangle of a map
#[derive(Debug)]
pub struct Heightmap {
    width: u32,
    height: u32,
    world_min_x: f32,
    world_max_x: f32,
    world_min_y: f32,
    world_max_y: f32,
    /// Raw height data (row-major, Y then X)
    heights: Vec<f32>,
}

impl Heightmap {
    /// Build a heightmap from samples
    pub fn from_samples(width: u32, height: u32, min: [f32; 2], max: [f32; 2], heights: Vec<f32>) -> Result<Self, String> {
        if width < 2 || height < 2 {
            return Err(format!("Heightmap must be at least 2x2, got {}x{}", width, height));
        }
        if heights.len() != (width * height) as usize {
            return Err(format!(
                "Height data size mismatch: expected {}, got {}",
                width * height,
                heights.len()
            ));
        }
        if max[0] <= min[0] || max[1] <= min[1] {
            return Err("Heightmap bounds are empty".to_string());
        }

        Ok(Self {
            width,
            height,
            world_min_x: min[0],
            world_max_x: max[0],
            world_min_y: min[1],
            world_max_y: max[1],
            heights,
        })
    }

    /// Load a heightmap from JSON metadata and binary data files
    pub fn load<P: AsRef<Path>>(json_path: P) -> Result<Self, String> {
        let json_path = json_path.as_ref();

        let json_file = File::open(json_path)
            .map_err(|e| format!("Failed to open metadata file {:?}: {}", json_path, e))?;
        let metadata: HeightmapMetadata = serde_json::from_reader(BufReader::new(json_file))
            .map_err(|e| format!("Failed to parse metadata {:?}: {}", json_path, e))?;

        if metadata.version != 1 {
            return Err(format!("Unsupported heightmap version: {}", metadata.version));
        }

        let bin_path = json_path.with_extension("bin");
        let mut bin_file = File::open(&bin_path)
            .map_err(|e| format!("Failed to open binary file {:?}: {}", bin_path, e))?;

        let expected_size = (metadata.width * metadata.height * 4) as usize;
        let mut buffer = vec![0u8; expected_size];
        bin_file.read_exact(&mut buffer)
            .map_err(|e| format!("Failed to read binary data {:?}: {}", bin_path, e))?;

        let heights: Vec<f32> = buffer
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        info!(
            "Loaded heightmap {}x{} covering ({}, {}) to ({}, {})",
            metadata.width, metadata.height,
            metadata.world_min_x, metadata.world_min_y,
            metadata.world_max_x, metadata.world_max_y
        );

        Self::from_samples(
            metadata.width,
            metadata.height,
            [metadata.world_min_x, metadata.world_min_y],
            [metadata.world_max_x, metadata.world_max_y],
            heights,
        )
    }

    /// Sample height at a world position using bilinear interpolation
    pub fn get_height(&self, world_x: f32, world_y: f32) -> f32 {
        let norm_x = ((world_x - self.world_min_x) / (self.world_max_x - self.world_min_x)).clamp(0.0, 1.0);
        let norm_y = ((world_y - self.world_min_y) / (self.world_max_y - self.world_min_y)).clamp(0.0, 1.0);

        let px = norm_x * (self.width - 1) as f32;
        let py = norm_y * (self.height - 1) as f32;

        let x0 = px.floor() as u32;
        let y0 = py.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = px.fract();
        let fy = py.fract();

        let h00 = self.get_pixel_height(x0, y0);
        let h10 = self.get_pixel_height(x1, y0);
        let h01 = self.get_pixel_height(x0, y1);
        let h11 = self.get_pixel_height(x1, y1);

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        h0 * (1.0 - fy) + h1 * fy
    }

    fn get_pixel_height(&self, x: u32, y: u32) -> f32 {
        let index = (y * self.width + x) as usize;
        self.heights.get(index).copied().unwrap_or(0.0)
    }

    /// Check if a world position is within the heightmap bounds
    pub fn contains(&self, world_x: f32, world_y: f32) -> bool {
        world_x >= self.world_min_x && world_x <= self.world_max_x &&
        world_y >= self.world_min_y && world_y <= self.world_max_y
    }
}

/// Heightmaps per map
#[derive(Debug, Default)]
pub struct TerrainMaps {
    maps: HashMap<u32, Heightmap>,
}

impl TerrainMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, map_id: u32, heightmap: Heightmap) {
        self.maps.insert(map_id, heightmap);
    }

    /// Load `map_<id>.json` for each map found in `dir`. Missing maps are
    /// simply absent; creatures on them never land.
    pub fn load_dir<P: AsRef<Path>>(dir: P, map_ids: &[u32]) -> Self {
        let dir = dir.as_ref();
        let mut terrain = Self::new();

        for map_id in map_ids {
            let path = dir.join(format!("map_{}.json", map_id));
            if !path.exists() {
                continue;
            }
            match Heightmap::load(&path) {
                Ok(heightmap) => terrain.insert(*map_id, heightmap),
                Err(e) => warn!("Failed to load heightmap for map {}: {}", map_id, e),
            }
        }

        info!("Loaded terrain for {} maps", terrain.maps.len());
        terrain
    }
}

impl TerrainQuery for TerrainMaps {
    fn ground_height(&self, map_id: u32, x: f32, y: f32) -> Option<f32> {
        let heightmap = self.maps.get(&map_id)?;
        heightmap.contains(x, y).then(|| heightmap.get_height(x, y))
    }
}
