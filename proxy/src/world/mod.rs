//! Per-player view of the world, backed by the shared chunk cache.

pub mod block;
pub mod cache;
pub mod chunk;
pub mod ray;

use block::{Block, BlockRegistry};
use cache::{resolve, CacheEntry, ChunkCache, SetBlockOutcome, WorldId};
use chunk::{Chunk, DimensionRange};
use shared::{Aabb, BlockPos, ChunkPos, Vec3};
use std::collections::HashMap;
use std::sync::Arc;

const COLLISION_EPS: f32 = 1e-5;

/// Inclusive integer block range covered by `[min, max]`.
pub fn block_range(min: f32, max: f32) -> (i32, i32) {
    let min_i = (min + COLLISION_EPS).floor() as i32;
    let max_i = (max - COLLISION_EPS).floor() as i32;
    if min_i <= max_i {
        (min_i, max_i)
    } else {
        (max_i, min_i)
    }
}

pub struct World {
    id: WorldId,
    cache: Arc<ChunkCache>,
    registry: Arc<BlockRegistry>,
    range: DimensionRange,
    chunks: HashMap<ChunkPos, Arc<CacheEntry>>,
}

impl World {
    pub fn new(cache: Arc<ChunkCache>, registry: Arc<BlockRegistry>) -> Self {
        Self {
            id: cache.next_world_id(),
            cache,
            registry,
            range: DimensionRange::OVERWORLD,
            chunks: HashMap::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn range(&self) -> DimensionRange {
        self.range
    }

    /// Switches dimension, dropping every loaded column.
    pub fn set_dimension(&mut self, dimension: i32) {
        self.purge();
        self.range = DimensionRange::for_dimension(dimension);
    }

    pub fn add_chunk(&mut self, pos: ChunkPos, chunk: Chunk) {
        if let Some(old) = self.chunks.remove(&pos) {
            self.cache.unsubscribe(self.id, &old);
        }
        let entry = self.cache.insert(self.id, pos, chunk);
        self.chunks.insert(pos, entry);
    }

    pub fn remove_chunk(&mut self, pos: ChunkPos) -> bool {
        match self.chunks.remove(&pos) {
            Some(entry) => {
                self.cache.unsubscribe(self.id, &entry);
                true
            }
            None => false,
        }
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Current cache entry backing `pos`, following merges done by the sweeper.
    pub fn entry(&self, pos: ChunkPos) -> Option<Arc<CacheEntry>> {
        self.chunks.get(&pos).map(resolve)
    }

    pub fn block_id(&self, pos: BlockPos) -> u32 {
        self.block_id_layer(pos, 0)
    }

    pub fn block_id_layer(&self, pos: BlockPos, layer: usize) -> u32 {
        if !self.range.contains(pos.y) {
            return self.registry.air_id();
        }
        match self.entry(pos.chunk_pos()) {
            Some(entry) => entry.with_chunk(|c| {
                c.block(
                    pos.x.rem_euclid(16) as usize,
                    pos.y,
                    pos.z.rem_euclid(16) as usize,
                    layer,
                )
            }),
            None => self.registry.air_id(),
        }
    }

    pub fn block(&self, pos: BlockPos) -> &Block {
        self.registry.get(self.block_id(pos))
    }

    /// Returns false when the column is not loaded or the height is out of range.
    pub fn set_block(&mut self, pos: BlockPos, runtime_id: u32) -> bool {
        self.set_block_layer(pos, 0, runtime_id)
    }

    pub fn set_block_layer(&mut self, pos: BlockPos, layer: usize, runtime_id: u32) -> bool {
        if !self.range.contains(pos.y) {
            return false;
        }
        let chunk_pos = pos.chunk_pos();
        let Some(entry) = self.chunks.get(&chunk_pos) else {
            return false;
        };
        let (entry, outcome) = self
            .cache
            .set_block(self.id, entry, pos, layer, runtime_id);
        if outcome != SetBlockOutcome::Unchanged {
            self.chunks.insert(chunk_pos, entry);
        }
        true
    }

    /// Unsubscribes from every column further than `radius` chunks from `center`.
    pub fn cleanup_range(&mut self, center: ChunkPos, radius: i32) -> usize {
        let far: Vec<ChunkPos> = self
            .chunks
            .keys()
            .filter(|pos| pos.distance(center) > radius)
            .copied()
            .collect();
        for pos in &far {
            self.remove_chunk(*pos);
        }
        far.len()
    }

    pub fn purge(&mut self) {
        for (_, entry) in self.chunks.drain() {
            self.cache.unsubscribe(self.id, &entry);
        }
    }

    pub fn is_loaded(&self, pos: Vec3) -> bool {
        self.has_chunk(ChunkPos::from_vec3(pos))
    }

    /// Every block collision box intersecting `area`.
    pub fn collision_boxes(&self, area: &Aabb) -> Vec<Aabb> {
        let (min_x, max_x) = block_range(area.min.x, area.max.x);
        let (min_y, max_y) = block_range(area.min.y, area.max.y);
        let (min_z, max_z) = block_range(area.min.z, area.max.z);
        let mut out = Vec::new();
        // one extra layer below catches boxes taller than a block, such as fences
        for y in (min_y - 1)..=max_y {
            for z in min_z..=max_z {
                for x in min_x..=max_x {
                    let pos = BlockPos::new(x, y, z);
                    for bb in self.block(pos).world_boxes(pos) {
                        if bb.intersects(area) {
                            out.push(bb);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn collides(&self, area: &Aabb) -> bool {
        !self.collision_boxes(area).is_empty()
    }

    /// Block positions whose cube intersects `area`.
    pub fn blocks_in(&self, area: &Aabb) -> Vec<(BlockPos, &Block)> {
        let (min_x, max_x) = block_range(area.min.x, area.max.x);
        let (min_y, max_y) = block_range(area.min.y, area.max.y);
        let (min_z, max_z) = block_range(area.min.z, area.max.z);
        let mut out = Vec::new();
        for y in min_y..=max_y {
            for z in min_z..=max_z {
                for x in min_x..=max_x {
                    let pos = BlockPos::new(x, y, z);
                    out.push((pos, self.block(pos)));
                }
            }
        }
        out
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.purge();
    }
}
