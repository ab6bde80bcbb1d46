//! Chunk columns made of paletted 16x16x16 sub-chunks.
//!
//! Columns are kept normalized at all times: palettes are compacted in
//! first-occurrence order, uniform storages carry no index array and trailing
//! all-air layers are dropped. Two columns with the same blocks therefore
//! compare equal and encode to the same bytes.

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};

pub const SUB_CHUNK_VOLUME: usize = 16 * 16 * 16;
pub const MAX_LAYERS: usize = 2;

/// Vertical extent of a dimension, in whole sub-chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionRange {
    pub min_y: i32,
    /// Exclusive upper bound.
    pub max_y: i32,
}

impl DimensionRange {
    pub const OVERWORLD: DimensionRange = DimensionRange {
        min_y: -64,
        max_y: 320,
    };
    pub const NETHER: DimensionRange = DimensionRange {
        min_y: 0,
        max_y: 128,
    };
    pub const END: DimensionRange = DimensionRange {
        min_y: 0,
        max_y: 256,
    };

    pub fn for_dimension(dimension: i32) -> Self {
        match dimension {
            1 => Self::NETHER,
            2 => Self::END,
            _ => Self::OVERWORLD,
        }
    }

    pub fn contains(&self, y: i32) -> bool {
        y >= self.min_y && y < self.max_y
    }

    pub fn sub_chunk_count(&self) -> usize {
        ((self.max_y - self.min_y) / 16) as usize
    }
}

#[inline]
fn storage_index(x: usize, y: usize, z: usize) -> usize {
    (x * 16 + z) * 16 + y
}

/// One layer of a sub-chunk: a palette of runtime IDs plus one palette index per block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PalettedStorage {
    palette: Vec<u32>,
    /// Empty when the storage is uniform.
    indices: Vec<u16>,
}

impl PalettedStorage {
    pub fn uniform(runtime_id: u32) -> Self {
        Self {
            palette: vec![runtime_id],
            indices: Vec::new(),
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn palette(&self) -> &[u32] {
        &self.palette
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> u32 {
        if self.indices.is_empty() {
            return self.palette[0];
        }
        self.palette[self.indices[storage_index(x, y, z)] as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, runtime_id: u32) {
        if self.indices.is_empty() {
            if self.palette[0] == runtime_id {
                return;
            }
            self.indices = vec![0; SUB_CHUNK_VOLUME];
        }
        let palette_index = match self.palette.iter().position(|&id| id == runtime_id) {
            Some(idx) => idx,
            None => {
                self.palette.push(runtime_id);
                self.palette.len() - 1
            }
        };
        self.indices[storage_index(x, y, z)] = palette_index as u16;
        self.normalize();
    }

    /// Compacts the palette into first-occurrence order and collapses uniform storages.
    pub fn normalize(&mut self) {
        if self.indices.is_empty() {
            self.palette.truncate(1);
            return;
        }

        let mut remap: Vec<Option<u16>> = vec![None; self.palette.len()];
        let mut palette = Vec::new();
        for index in self.indices.iter_mut() {
            let old = *index as usize;
            let new = match remap[old] {
                Some(new) => new,
                None => {
                    palette.push(self.palette[old]);
                    let new = (palette.len() - 1) as u16;
                    remap[old] = Some(new);
                    new
                }
            };
            *index = new;
        }
        self.palette = palette;
        if self.palette.len() == 1 {
            self.indices.clear();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.palette.is_empty() {
            return Err(ProxyError::ChunkDecode("empty palette".into()));
        }
        if !self.indices.is_empty() {
            if self.indices.len() != SUB_CHUNK_VOLUME {
                return Err(ProxyError::ChunkDecode(format!(
                    "storage holds {} indices",
                    self.indices.len()
                )));
            }
            if self.indices.iter().any(|&i| i as usize >= self.palette.len()) {
                return Err(ProxyError::ChunkDecode("palette index out of range".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubChunk {
    /// Layer 0 holds blocks, layer 1 waterlogging.
    layers: Vec<PalettedStorage>,
}

impl SubChunk {
    pub fn empty(air: u32) -> Self {
        Self {
            layers: vec![PalettedStorage::uniform(air)],
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn get(&self, x: usize, y: usize, z: usize, layer: usize, air: u32) -> u32 {
        self.layers.get(layer).map_or(air, |l| l.get(x, y, z))
    }

    fn set(&mut self, x: usize, y: usize, z: usize, layer: usize, runtime_id: u32, air: u32) {
        while self.layers.len() <= layer {
            self.layers.push(PalettedStorage::uniform(air));
        }
        self.layers[layer].set(x, y, z, runtime_id);
        self.trim_layers(air);
    }

    fn trim_layers(&mut self, air: u32) {
        while self.layers.len() > 1 {
            let last = &self.layers[self.layers.len() - 1];
            if last.is_uniform() && last.palette()[0] == air {
                self.layers.pop();
            } else {
                break;
            }
        }
    }

    fn normalize(&mut self, air: u32) {
        self.layers.truncate(MAX_LAYERS);
        for layer in &mut self.layers {
            layer.normalize();
        }
        self.trim_layers(air);
    }
}

/// A full-height 16x16 column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    range: DimensionRange,
    air: u32,
    sub_chunks: Vec<SubChunk>,
}

impl Chunk {
    pub fn new(range: DimensionRange, air: u32) -> Self {
        Self {
            range,
            air,
            sub_chunks: vec![SubChunk::empty(air); range.sub_chunk_count()],
        }
    }

    pub fn range(&self) -> DimensionRange {
        self.range
    }

    /// Block at local `x`/`z` (0..16) and absolute `y`. Out-of-range heights are air.
    pub fn block(&self, x: usize, y: i32, z: usize, layer: usize) -> u32 {
        if !self.range.contains(y) || x >= 16 || z >= 16 {
            return self.air;
        }
        let shifted = (y - self.range.min_y) as usize;
        self.sub_chunks[shifted / 16].get(x, shifted % 16, z, layer, self.air)
    }

    /// Returns false when the position lies outside the column.
    pub fn set_block(&mut self, x: usize, y: i32, z: usize, layer: usize, runtime_id: u32) -> bool {
        if !self.range.contains(y) || x >= 16 || z >= 16 || layer >= MAX_LAYERS {
            return false;
        }
        let shifted = (y - self.range.min_y) as usize;
        let air = self.air;
        self.sub_chunks[shifted / 16].set(x, shifted % 16, z, layer, runtime_id, air);
        true
    }

    /// Structural equality of block contents. Columns are always normalized, so this is `==`.
    pub fn content_eq(&self, other: &Chunk) -> bool {
        self == other
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes and normalizes a column, rejecting malformed storages.
    pub fn decode(bytes: &[u8]) -> Result<Chunk> {
        let mut chunk: Chunk =
            bincode::deserialize(bytes).map_err(|e| ProxyError::ChunkDecode(e.to_string()))?;
        if chunk.sub_chunks.len() != chunk.range.sub_chunk_count() {
            return Err(ProxyError::ChunkDecode(format!(
                "expected {} sub-chunks, got {}",
                chunk.range.sub_chunk_count(),
                chunk.sub_chunks.len()
            )));
        }
        for sub in &chunk.sub_chunks {
            if sub.layers.is_empty() {
                return Err(ProxyError::ChunkDecode("sub-chunk without layers".into()));
            }
            for layer in &sub.layers {
                layer.validate()?;
            }
        }
        let air = chunk.air;
        for sub in &mut chunk.sub_chunks {
            sub.normalize(air);
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AIR: u32 = 0;
    const STONE: u32 = 7;
    const DIRT: u32 = 3;

    #[test]
    fn test_new_chunk_is_air_everywhere() {
        let chunk = Chunk::new(DimensionRange::OVERWORLD, AIR);
        assert_eq!(chunk.block(0, -64, 0, 0), AIR);
        assert_eq!(chunk.block(15, 319, 15, 0), AIR);
        assert_eq!(chunk.block(3, 64, 3, 1), AIR);
    }

    #[test]
    fn test_out_of_range_heights_resolve_to_air() {
        let mut chunk = Chunk::new(DimensionRange::OVERWORLD, AIR);
        assert!(!chunk.set_block(0, 320, 0, 0, STONE));
        assert!(!chunk.set_block(0, -65, 0, 0, STONE));
        assert_eq!(chunk.block(0, 400, 0, 0), AIR);
        assert_eq!(chunk.block(0, -100, 0, 0), AIR);
    }

    #[test]
    fn test_set_and_get_across_sub_chunks() {
        let mut chunk = Chunk::new(DimensionRange::OVERWORLD, AIR);
        assert!(chunk.set_block(5, 63, 3, 0, STONE));
        assert!(chunk.set_block(5, 64, 3, 0, DIRT));
        assert_eq!(chunk.block(5, 63, 3, 0), STONE);
        assert_eq!(chunk.block(5, 64, 3, 0), DIRT);
        assert_eq!(chunk.block(5, 65, 3, 0), AIR);
    }

    #[test]
    fn test_set_back_restores_equality() {
        let pristine = Chunk::new(DimensionRange::OVERWORLD, AIR);
        let mut chunk = pristine.clone();
        chunk.set_block(1, 10, 1, 0, STONE);
        assert!(!chunk.content_eq(&pristine));
        chunk.set_block(1, 10, 1, 0, AIR);
        assert!(chunk.content_eq(&pristine));
    }

    #[test]
    fn test_palette_is_first_occurrence_order() {
        let mut a = Chunk::new(DimensionRange::OVERWORLD, AIR);
        a.set_block(0, 0, 1, 0, DIRT);
        a.set_block(0, 0, 0, 0, STONE);

        let mut b = Chunk::new(DimensionRange::OVERWORLD, AIR);
        b.set_block(0, 0, 0, 0, STONE);
        b.set_block(0, 0, 1, 0, DIRT);

        assert!(a.content_eq(&b));
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_waterlog_layer_dropped_when_cleared() {
        let mut chunk = Chunk::new(DimensionRange::OVERWORLD, AIR);
        chunk.set_block(2, 2, 2, 1, 9);
        assert_eq!(chunk.block(2, 2, 2, 1), 9);
        chunk.set_block(2, 2, 2, 1, AIR);
        assert!(chunk.content_eq(&Chunk::new(DimensionRange::OVERWORLD, AIR)));
    }

    #[test]
    fn test_encode_decode_identity() {
        let mut chunk = Chunk::new(DimensionRange::NETHER, AIR);
        for x in 0..16 {
            chunk.set_block(x, 10, x, 0, STONE);
        }
        let decoded = Chunk::decode(&chunk.encode().unwrap()).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Chunk::decode(&[1, 2, 3]),
            Err(ProxyError::ChunkDecode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_sub_chunk_count() {
        let mut chunk = Chunk::new(DimensionRange::END, AIR);
        chunk.sub_chunks.pop();
        let bytes = bincode::serialize(&chunk).unwrap();
        assert!(Chunk::decode(&bytes).is_err());
    }
}
