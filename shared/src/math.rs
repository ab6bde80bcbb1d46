use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

///Represents a vector in 3D space.
/// Positive Y is up, positive Z is south, positive X is east.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    ///Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    ///Returns the magnitude of the vector projected onto the XZ plane.
    pub fn horizontal_length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    ///Returns the normalized vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.length();
        if mag == 0.0 {
            Vec3::ZERO
        } else {
            *self * (1.0 / mag)
        }
    }

    pub fn dot(&self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance(&self, other: Vec3) -> f32 {
        (*self - other).length()
    }

    ///Linear interpolation from `self` (t = 0) towards `other` (t = 1).
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        self + (other - self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn with_y(self, y: f32) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }

    ///Returns the block containing this point.
    pub fn block_pos(self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

///Player view rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f32,
    pub head_yaw: f32,
    pub yaw: f32,
}

impl Rotation {
    pub const fn new(pitch: f32, head_yaw: f32, yaw: f32) -> Self {
        Self {
            pitch,
            head_yaw,
            yaw,
        }
    }

    ///Unit vector the player is looking along.
    pub fn direction(&self) -> Vec3 {
        direction_vector(self.yaw, self.pitch)
    }

    ///Interpolates between two rotations. Yaw takes the shortest arc.
    pub fn lerp(self, other: Rotation, t: f32) -> Rotation {
        Rotation {
            pitch: self.pitch + (other.pitch - self.pitch) * t,
            head_yaw: self.head_yaw + wrap_degrees(other.head_yaw - self.head_yaw) * t,
            yaw: self.yaw + wrap_degrees(other.yaw - self.yaw) * t,
        }
    }
}

///Converts a yaw/pitch pair in degrees into a unit direction vector.
pub fn direction_vector(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    let horizontal = pitch.cos();
    Vec3::new(-yaw.sin() * horizontal, -pitch.sin(), yaw.cos() * horizontal)
}

///Wraps an angle in degrees into [-180, 180).
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped.is_nan() {
        0.0
    } else {
        wrapped
    }
}

///One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    ///Maps the protocol face index (0..=5) onto a face.
    pub fn from_index(index: i32) -> Option<Face> {
        match index {
            0 => Some(Face::Down),
            1 => Some(Face::Up),
            2 => Some(Face::North),
            3 => Some(Face::South),
            4 => Some(Face::West),
            5 => Some(Face::East),
            _ => None,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            Face::Down => 0,
            Face::Up => 1,
            Face::North => 2,
            Face::South => 3,
            Face::West => 4,
            Face::East => 5,
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::East => Face::West,
        }
    }

    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }
}

///Integer coordinates of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    ///The neighbouring block across `face`.
    pub fn side(self, face: Face) -> BlockPos {
        let (dx, dy, dz) = face.offset();
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    ///Minimum corner of the block as a vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub fn center(self) -> Vec3 {
        self.to_vec3() + Vec3::new(0.5, 0.5, 0.5)
    }

    pub fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(self.x.div_euclid(16), self.z.div_euclid(16))
    }
}

///Horizontal coordinates of a 16x16 chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_vec3(pos: Vec3) -> Self {
        pos.block_pos().chunk_pos()
    }

    ///Chebyshev distance between two chunk columns.
    pub fn distance(self, other: ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

///Result of a successful ray/box intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    ///Distance along the ray from its origin. Zero when the origin starts inside the box.
    pub distance: f32,
    pub point: Vec3,
    ///Face the ray entered through; `None` when the origin was inside the box.
    pub face: Option<Face>,
}

///Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    ///Box centred on X/Z at `pos`, spanning `[pos.y, pos.y + height]`.
    pub fn from_bottom_center(pos: Vec3, width: f32, height: f32) -> Self {
        let half = width / 2.0;
        Self {
            min: Vec3::new(pos.x - half, pos.y, pos.z - half),
            max: Vec3::new(pos.x + half, pos.y + height, pos.z + half),
        }
    }

    ///The full 1x1x1 cube of a block.
    pub fn block(pos: BlockPos) -> Self {
        let min = pos.to_vec3();
        Self {
            min,
            max: min + Vec3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    ///Bottom-centre point, the inverse of `from_bottom_center`.
    pub fn bottom_center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            self.min.y,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    pub fn translate(self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    ///Grows the box by `amount` on every side.
    pub fn grow(self, amount: f32) -> Self {
        let delta = Vec3::new(amount, amount, amount);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    pub fn contract(self, x: f32, y: f32, z: f32) -> Self {
        Self {
            min: Vec3::new(self.min.x + x, self.min.y + y, self.min.z + z),
            max: Vec3::new(self.max.x - x, self.max.y - y, self.max.z - z),
        }
    }

    ///Extends the box in the direction of `delta` only.
    pub fn extend(self, delta: Vec3) -> Self {
        let mut min = self.min;
        let mut max = self.max;
        if delta.x < 0.0 {
            min.x += delta.x;
        } else {
            max.x += delta.x;
        }
        if delta.y < 0.0 {
            min.y += delta.y;
        } else {
            max.y += delta.y;
        }
        if delta.z < 0.0 {
            min.z += delta.z;
        } else {
            max.z += delta.z;
        }
        Self { min, max }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    ///Closest point on (or in) the box to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        )
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.closest_point(point).distance(point)
    }

    ///Clips a movement along X so this box does not enter `other`.
    pub fn calculate_x_offset(&self, other: &Aabb, mut dx: f32) -> f32 {
        if !(self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z)
        {
            return dx;
        }
        if dx > 0.0 && self.max.x <= other.min.x {
            dx = dx.min(other.min.x - self.max.x);
        } else if dx < 0.0 && self.min.x >= other.max.x {
            dx = dx.max(other.max.x - self.min.x);
        }
        dx
    }

    ///Clips a movement along Y so this box does not enter `other`.
    pub fn calculate_y_offset(&self, other: &Aabb, mut dy: f32) -> f32 {
        if !(self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.z > other.min.z
            && self.min.z < other.max.z)
        {
            return dy;
        }
        if dy > 0.0 && self.max.y <= other.min.y {
            dy = dy.min(other.min.y - self.max.y);
        } else if dy < 0.0 && self.min.y >= other.max.y {
            dy = dy.max(other.max.y - self.min.y);
        }
        dy
    }

    ///Clips a movement along Z so this box does not enter `other`.
    pub fn calculate_z_offset(&self, other: &Aabb, mut dz: f32) -> f32 {
        if !(self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y)
        {
            return dz;
        }
        if dz > 0.0 && self.max.z <= other.min.z {
            dz = dz.min(other.min.z - self.max.z);
        } else if dz < 0.0 && self.min.z >= other.max.z {
            dz = dz.max(other.max.z - self.min.z);
        }
        dz
    }

    ///Intersects a ray with this box using the slab method.
    ///
    /// `direction` is expected to be a unit vector, so the returned distance is in blocks.
    /// Hits further than `max_distance` are ignored.
    pub fn ray_intercept(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let mut t_near = 0.0f32;
        let mut t_far = max_distance;
        let mut entered: Option<Face> = None;

        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x, Face::West, Face::East),
            (origin.y, direction.y, self.min.y, self.max.y, Face::Down, Face::Up),
            (origin.z, direction.z, self.min.z, self.max.z, Face::North, Face::South),
        ];

        for (o, d, lo, hi, min_face, max_face) in axes {
            if d.abs() < 1e-9 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
            let mut face = min_face;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                face = max_face;
            }

            if t0 > t_near {
                t_near = t0;
                entered = Some(face);
            }
            if t1 < t_far {
                t_far = t1;
            }
            if t_near > t_far {
                return None;
            }
        }

        Some(RayHit {
            distance: t_near,
            point: origin + direction * t_near,
            face: entered,
        })
    }
}
