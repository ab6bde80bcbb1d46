//! Wire model and geometry shared by the proxy, its tools and the test suite.

pub mod math;
pub mod packet;

pub use math::{direction_vector, wrap_degrees, Aabb, BlockPos, ChunkPos, Face, RayHit, Rotation, Vec3};
pub use packet::*;

pub const TICKS_PER_SECOND: u32 = 20;
pub const TICK_DURATION_MS: u64 = 50;

pub const PLAYER_WIDTH: f32 = 0.6;
pub const PLAYER_HEIGHT: f32 = 1.8;
pub const PLAYER_SNEAK_HEIGHT: f32 = 1.5;
pub const PLAYER_EYE_HEIGHT: f32 = 1.62;
pub const PLAYER_SNEAK_EYE_HEIGHT: f32 = 1.54;

///Runtime ID a client uses for itself after the server rewrote it.
pub const SELF_RUNTIME_ID_SENTINEL: u64 = u64::MAX;

///Protocol versions at or above this echo latency timestamps scaled twice on non-console devices.
pub const DOUBLE_LATENCY_SCALING_PROTOCOL: i32 = 649;
pub const CURRENT_PROTOCOL: i32 = 712;

///Largest frame either side may send.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
