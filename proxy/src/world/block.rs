//! Block definitions and the runtime-ID registry.
//!
//! The registry is built once at start-up and shared behind an `Arc`. Runtime
//! IDs come from a deterministic enumeration: block kinds sorted by name, then
//! every combination of property values with property names in sorted order.
//! Two processes built from the same table always agree on every ID.

use shared::{Aabb, BlockPos, Face, Vec3};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_FRICTION: f32 = 0.6;
pub const ICE_FRICTION: f32 = 0.98;
pub const SLIME_FRICTION: f32 = 0.8;
pub const BLUE_ICE_FRICTION: f32 = 0.99;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Str(String),
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Tool class that mines a block at full speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    None,
    Pickaxe,
    Axe,
    Shovel,
    Hoe,
    Sword,
    Shears,
}

/// Collision shape family. Concrete boxes depend on the state's properties.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Empty,
    Full,
    Height(f32),
    Inset { inset: f32, height: f32 },
    Slab,
    Stairs,
    Fence,
    SnowLayer,
    Ladder,
    Trapdoor,
}

struct BlockDef {
    name: &'static str,
    properties: Vec<(&'static str, Vec<PropertyValue>)>,
    shape: Shape,
    friction: f32,
    hardness: f32,
    tool: ToolKind,
    requires_tool: bool,
    replaceable: bool,
    climbable: bool,
    pass_through: bool,
}

impl BlockDef {
    fn new(name: &'static str, shape: Shape, hardness: f32, tool: ToolKind) -> Self {
        Self {
            name,
            properties: Vec::new(),
            shape,
            friction: DEFAULT_FRICTION,
            hardness,
            tool,
            requires_tool: false,
            replaceable: false,
            climbable: false,
            pass_through: false,
        }
    }

    fn prop(mut self, name: &'static str, values: Vec<PropertyValue>) -> Self {
        self.properties.push((name, values));
        self
    }

    fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    fn requires_tool(mut self) -> Self {
        self.requires_tool = true;
        self
    }

    fn replaceable(mut self) -> Self {
        self.replaceable = true;
        self
    }

    fn climbable(mut self) -> Self {
        self.climbable = true;
        self
    }

    fn pass_through(mut self) -> Self {
        self.pass_through = true;
        self
    }
}

fn bools() -> Vec<PropertyValue> {
    vec![PropertyValue::Bool(false), PropertyValue::Bool(true)]
}

fn ints(range: std::ops::RangeInclusive<i32>) -> Vec<PropertyValue> {
    range.map(PropertyValue::Int).collect()
}

fn strs(values: &[&str]) -> Vec<PropertyValue> {
    values
        .iter()
        .map(|v| PropertyValue::Str((*v).to_string()))
        .collect()
}

fn definitions() -> Vec<BlockDef> {
    use Shape::*;
    use ToolKind::*;

    vec![
        BlockDef::new("minecraft:air", Empty, 0.0, None)
            .replaceable()
            .pass_through(),
        BlockDef::new("minecraft:stone", Full, 1.5, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:grass_block", Full, 0.6, Shovel),
        BlockDef::new("minecraft:dirt", Full, 0.5, Shovel),
        BlockDef::new("minecraft:cobblestone", Full, 2.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:oak_planks", Full, 2.0, Axe),
        BlockDef::new("minecraft:bedrock", Full, -1.0, None),
        BlockDef::new("minecraft:sand", Full, 0.5, Shovel),
        BlockDef::new("minecraft:gravel", Full, 0.6, Shovel),
        BlockDef::new("minecraft:oak_log", Full, 2.0, Axe).prop("pillar_axis", strs(&["x", "y", "z"])),
        BlockDef::new("minecraft:glass", Full, 0.3, None),
        BlockDef::new("minecraft:obsidian", Full, 50.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:iron_block", Full, 5.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:diamond_block", Full, 5.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:netherrack", Full, 0.4, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:end_stone", Full, 3.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:crafting_table", Full, 2.5, Axe),
        BlockDef::new("minecraft:white_wool", Full, 0.8, Shears),
        BlockDef::new("minecraft:ice", Full, 0.5, Pickaxe).friction(ICE_FRICTION),
        BlockDef::new("minecraft:packed_ice", Full, 0.5, Pickaxe).friction(ICE_FRICTION),
        BlockDef::new("minecraft:blue_ice", Full, 2.8, Pickaxe).friction(BLUE_ICE_FRICTION),
        BlockDef::new("minecraft:slime", Full, 0.0, None).friction(SLIME_FRICTION),
        BlockDef::new("minecraft:water", Empty, -1.0, None)
            .prop("liquid_depth", ints(0..=15))
            .replaceable()
            .pass_through(),
        BlockDef::new("minecraft:lava", Empty, -1.0, None)
            .prop("liquid_depth", ints(0..=15))
            .replaceable()
            .pass_through(),
        BlockDef::new("minecraft:stone_block_slab", Slab, 2.0, Pickaxe)
            .prop("minecraft:vertical_half", strs(&["bottom", "top"]))
            .requires_tool(),
        BlockDef::new("minecraft:stone_double_slab", Full, 2.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:oak_stairs", Stairs, 2.0, Axe)
            .prop("upside_down_bit", bools())
            .prop("weirdo_direction", ints(0..=3)),
        BlockDef::new("minecraft:oak_fence", Fence, 2.0, Axe),
        BlockDef::new("minecraft:white_carpet", Height(0.0625), 0.1, None),
        BlockDef::new("minecraft:snow_layer", SnowLayer, 0.1, Shovel)
            .prop("height", ints(0..=7))
            .requires_tool(),
        BlockDef::new("minecraft:ladder", Ladder, 0.4, Axe)
            .prop("facing_direction", ints(2..=5))
            .climbable(),
        BlockDef::new("minecraft:vine", Empty, 0.2, Shears)
            .prop("vine_direction_bits", ints(0..=15))
            .climbable()
            .replaceable()
            .pass_through(),
        BlockDef::new("minecraft:web", Empty, 4.0, Sword).pass_through(),
        BlockDef::new("minecraft:chest", Inset { inset: 0.0625, height: 0.875 }, 2.5, Axe)
            .prop("minecraft:cardinal_direction", strs(&["east", "north", "south", "west"])),
        BlockDef::new("minecraft:farmland", Height(0.9375), 0.6, Shovel)
            .prop("moisturized_amount", ints(0..=7)),
        BlockDef::new("minecraft:soul_sand", Height(0.875), 0.5, Shovel),
        BlockDef::new("minecraft:enchanting_table", Height(0.75), 5.0, Pickaxe).requires_tool(),
        BlockDef::new("minecraft:trapdoor", Trapdoor, 3.0, Axe)
            .prop("direction", ints(0..=3))
            .prop("open_bit", bools())
            .prop("upside_down_bit", bools()),
        BlockDef::new("minecraft:torch", Empty, 0.0, None)
            .prop("torch_facing_direction", strs(&["east", "north", "south", "top", "unknown", "west"]))
            .pass_through(),
        BlockDef::new("minecraft:short_grass", Empty, 0.0, None)
            .replaceable()
            .pass_through(),
        BlockDef::new("minecraft:dandelion", Empty, 0.0, None).pass_through(),
    ]
}

/// Fully resolved block state.
#[derive(Debug, Clone)]
pub struct Block {
    pub runtime_id: u32,
    pub name: String,
    pub properties: Properties,
    /// Collision boxes in block-local coordinates.
    pub boxes: Vec<Aabb>,
    solid_faces: [bool; 6],
    pub friction: f32,
    /// Negative hardness marks an unbreakable block.
    pub hardness: f32,
    pub tool: ToolKind,
    pub requires_tool: bool,
    pub replaceable: bool,
    pub climbable: bool,
    pub pass_through: bool,
}

impl Block {
    pub fn is_air(&self) -> bool {
        self.name == "minecraft:air"
    }

    pub fn is_liquid(&self) -> bool {
        self.name == "minecraft:water" || self.name == "minecraft:lava"
    }

    pub fn is_cobweb(&self) -> bool {
        self.name == "minecraft:web"
    }

    pub fn has_collision(&self) -> bool {
        !self.boxes.is_empty()
    }

    pub fn face_solid(&self, face: Face) -> bool {
        self.solid_faces[face.index() as usize]
    }

    /// Collision boxes translated to world coordinates.
    pub fn world_boxes(&self, pos: BlockPos) -> impl Iterator<Item = Aabb> + '_ {
        let offset = pos.to_vec3();
        self.boxes.iter().map(move |b| b.translate(offset))
    }

    /// Boxes used for interaction rays: the collision boxes, or the full cube for non-solid
    /// blocks that still block interaction.
    pub fn interaction_boxes(&self, pos: BlockPos) -> Vec<Aabb> {
        if self.pass_through {
            return Vec::new();
        }
        if self.boxes.is_empty() {
            return vec![Aabb::block(pos)];
        }
        self.world_boxes(pos).collect()
    }
}

fn local_box(min: (f32, f32, f32), max: (f32, f32, f32)) -> Aabb {
    Aabb::new(Vec3::new(min.0, min.1, min.2), Vec3::new(max.0, max.1, max.2))
}

fn prop_int(props: &Properties, name: &str) -> i32 {
    match props.get(name) {
        Some(PropertyValue::Int(v)) => *v,
        _ => 0,
    }
}

fn prop_bool(props: &Properties, name: &str) -> bool {
    matches!(props.get(name), Some(PropertyValue::Bool(true)))
}

fn prop_str<'a>(props: &'a Properties, name: &str) -> &'a str {
    match props.get(name) {
        Some(PropertyValue::Str(v)) => v.as_str(),
        _ => "",
    }
}

fn shape_boxes(shape: Shape, props: &Properties) -> (Vec<Aabb>, [bool; 6]) {
    let mut solid = [false; 6];
    let boxes = match shape {
        Shape::Empty => Vec::new(),
        Shape::Full => {
            solid = [true; 6];
            vec![local_box((0.0, 0.0, 0.0), (1.0, 1.0, 1.0))]
        }
        Shape::Height(h) => {
            solid[Face::Down.index() as usize] = true;
            vec![local_box((0.0, 0.0, 0.0), (1.0, h, 1.0))]
        }
        Shape::Inset { inset, height } => {
            vec![local_box((inset, 0.0, inset), (1.0 - inset, height, 1.0 - inset))]
        }
        Shape::Slab => {
            if prop_str(props, "minecraft:vertical_half") == "top" {
                solid[Face::Up.index() as usize] = true;
                vec![local_box((0.0, 0.5, 0.0), (1.0, 1.0, 1.0))]
            } else {
                solid[Face::Down.index() as usize] = true;
                vec![local_box((0.0, 0.0, 0.0), (1.0, 0.5, 1.0))]
            }
        }
        Shape::Stairs => {
            let upside_down = prop_bool(props, "upside_down_bit");
            let (base, step_y) = if upside_down {
                solid[Face::Up.index() as usize] = true;
                (local_box((0.0, 0.5, 0.0), (1.0, 1.0, 1.0)), (0.0, 0.5))
            } else {
                solid[Face::Down.index() as usize] = true;
                (local_box((0.0, 0.0, 0.0), (1.0, 0.5, 1.0)), (0.5, 1.0))
            };
            // weirdo_direction: 0 east, 1 west, 2 south, 3 north
            let step = match prop_int(props, "weirdo_direction") {
                0 => local_box((0.5, step_y.0, 0.0), (1.0, step_y.1, 1.0)),
                1 => local_box((0.0, step_y.0, 0.0), (0.5, step_y.1, 1.0)),
                2 => local_box((0.0, step_y.0, 0.5), (1.0, step_y.1, 1.0)),
                _ => local_box((0.0, step_y.0, 0.0), (1.0, step_y.1, 0.5)),
            };
            vec![base, step]
        }
        Shape::Fence => vec![local_box((0.375, 0.0, 0.375), (0.625, 1.5, 0.625))],
        Shape::SnowLayer => {
            let height = prop_int(props, "height") as f32 * 0.125;
            if height > 0.0 {
                solid[Face::Down.index() as usize] = true;
                vec![local_box((0.0, 0.0, 0.0), (1.0, height, 1.0))]
            } else {
                Vec::new()
            }
        }
        Shape::Ladder => {
            const T: f32 = 0.1875;
            // facing_direction: 2 north, 3 south, 4 west, 5 east
            match prop_int(props, "facing_direction") {
                2 => vec![local_box((0.0, 0.0, 1.0 - T), (1.0, 1.0, 1.0))],
                3 => vec![local_box((0.0, 0.0, 0.0), (1.0, 1.0, T))],
                4 => vec![local_box((1.0 - T, 0.0, 0.0), (1.0, 1.0, 1.0))],
                _ => vec![local_box((0.0, 0.0, 0.0), (T, 1.0, 1.0))],
            }
        }
        Shape::Trapdoor => {
            const T: f32 = 0.1875;
            if prop_bool(props, "open_bit") {
                match prop_int(props, "direction") {
                    0 => vec![local_box((0.0, 0.0, 0.0), (T, 1.0, 1.0))],
                    1 => vec![local_box((1.0 - T, 0.0, 0.0), (1.0, 1.0, 1.0))],
                    2 => vec![local_box((0.0, 0.0, 0.0), (1.0, 1.0, T))],
                    _ => vec![local_box((0.0, 0.0, 1.0 - T), (1.0, 1.0, 1.0))],
                }
            } else if prop_bool(props, "upside_down_bit") {
                vec![local_box((0.0, 1.0 - T, 0.0), (1.0, 1.0, 1.0))]
            } else {
                vec![local_box((0.0, 0.0, 0.0), (1.0, T, 1.0))]
            }
        }
    };
    (boxes, solid)
}

fn cartesian(properties: &[(&'static str, Vec<PropertyValue>)]) -> Vec<Properties> {
    let mut sorted: Vec<_> = properties.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut states = vec![Properties::new()];
    for (name, values) in sorted {
        let mut next = Vec::with_capacity(states.len() * values.len());
        for state in &states {
            for value in values {
                let mut combined = state.clone();
                combined.insert((*name).to_string(), value.clone());
                next.push(combined);
            }
        }
        states = next;
    }
    states
}

/// Immutable table of every known block state.
pub struct BlockRegistry {
    blocks: Vec<Block>,
    by_state: HashMap<(String, Properties), u32>,
    air: u32,
}

impl BlockRegistry {
    pub fn new() -> Self {
        let mut defs = definitions();
        defs.sort_by(|a, b| a.name.cmp(b.name));

        let mut blocks = Vec::new();
        let mut by_state = HashMap::new();
        for def in &defs {
            for properties in cartesian(&def.properties) {
                let runtime_id = blocks.len() as u32;
                let (boxes, solid_faces) = shape_boxes(def.shape, &properties);
                by_state.insert((def.name.to_string(), properties.clone()), runtime_id);
                blocks.push(Block {
                    runtime_id,
                    name: def.name.to_string(),
                    properties,
                    boxes,
                    solid_faces,
                    friction: def.friction,
                    hardness: def.hardness,
                    tool: def.tool,
                    requires_tool: def.requires_tool,
                    replaceable: def.replaceable,
                    climbable: def.climbable,
                    pass_through: def.pass_through,
                });
            }
        }

        let air = by_state
            .get(&("minecraft:air".to_string(), Properties::new()))
            .copied()
            .unwrap_or(0);

        Self {
            blocks,
            by_state,
            air,
        }
    }

    pub fn air_id(&self) -> u32 {
        self.air
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Looks up a runtime ID. Unknown IDs resolve to air.
    pub fn get(&self, runtime_id: u32) -> &Block {
        self.blocks
            .get(runtime_id as usize)
            .unwrap_or(&self.blocks[self.air as usize])
    }

    pub fn runtime_id(&self, name: &str, properties: &Properties) -> Option<u32> {
        self.by_state
            .get(&(name.to_string(), properties.clone()))
            .copied()
    }

    /// Runtime ID of the first state of `name`, i.e. its all-defaults state.
    pub fn default_state(&self, name: &str) -> Option<u32> {
        self.blocks
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.runtime_id)
    }

    /// Looks up a state from `(property, value)` pairs; unnamed properties take their first value.
    pub fn state_with(&self, name: &str, overrides: &[(&str, PropertyValue)]) -> Option<u32> {
        let base = self.get(self.default_state(name)?);
        let mut properties = base.properties.clone();
        for (key, value) in overrides {
            properties.insert((*key).to_string(), value.clone());
        }
        self.runtime_id(name, &properties)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
