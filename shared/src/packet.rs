use crate::math::{BlockPos, ChunkPos, Vec3};
use serde::{Deserialize, Serialize};

///Operating system reported by the client at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceOs {
    Unknown,
    Android,
    Ios,
    Osx,
    FireOs,
    GearVr,
    Hololens,
    Win10,
    Win32,
    Dedicated,
    TvOs,
    PlayStation,
    NintendoSwitch,
    Xbox,
    WindowsPhone,
    Linux,
}

impl DeviceOs {
    pub fn is_mobile(&self) -> bool {
        matches!(self, DeviceOs::Android | DeviceOs::Ios | DeviceOs::FireOs)
    }

    pub fn is_console(&self) -> bool {
        matches!(
            self,
            DeviceOs::PlayStation | DeviceOs::NintendoSwitch | DeviceOs::Xbox
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    Unknown,
    Mouse,
    Touch,
    GamePad,
    MotionController,
}

///Identity data carried by the login handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    pub xuid: String,
    pub device_os: DeviceOs,
    pub default_input_mode: InputMode,
    pub game_version: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    ///Survival and adventure are the only modes whose movement and block breaking obey physics.
    pub fn is_validated(&self) -> bool {
        matches!(self, GameMode::Survival | GameMode::Adventure)
    }
}

///Bit set of the per-tick input flags sent with every PlayerAuthInput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputFlags(pub u64);

impl InputFlags {
    pub const ASCEND: u64 = 1 << 0;
    pub const DESCEND: u64 = 1 << 1;
    pub const JUMP_DOWN: u64 = 1 << 3;
    pub const SPRINT_DOWN: u64 = 1 << 4;
    pub const JUMPING: u64 = 1 << 6;
    pub const SNEAKING: u64 = 1 << 8;
    pub const SNEAK_DOWN: u64 = 1 << 9;
    pub const SPRINTING: u64 = 1 << 20;
    pub const START_SPRINTING: u64 = 1 << 25;
    pub const STOP_SPRINTING: u64 = 1 << 26;
    pub const START_SNEAKING: u64 = 1 << 27;
    pub const STOP_SNEAKING: u64 = 1 << 28;
    pub const START_JUMPING: u64 = 1 << 31;
    pub const PERFORM_ITEM_INTERACTION: u64 = 1 << 34;
    pub const PERFORM_BLOCK_ACTIONS: u64 = 1 << 35;
    pub const HANDLED_TELEPORT: u64 = 1 << 37;
    pub const MISSED_SWING: u64 = 1 << 38;
    pub const START_FLYING: u64 = 1 << 40;
    pub const STOP_FLYING: u64 = 1 << 41;

    pub fn has(&self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u64) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u64) {
        self.0 &= !flag;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionModel {
    Touch,
    Crosshair,
    Classic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockActionType {
    StartBreak,
    AbortBreak,
    StopBreak,
    ContinueBreak,
    CrackBreak,
    PredictDestroyBlock,
}

///A block action bundled into an authoritative input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockAction {
    pub action: BlockActionType,
    pub position: BlockPos,
    pub face: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStack {
    pub network_id: i32,
    pub name: String,
    pub count: u16,
    ///Non-zero when the item places a block.
    pub block_runtime_id: u32,
}

impl ItemStack {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(network_id: i32, name: &str, count: u16) -> Self {
        Self {
            network_id,
            name: name.to_string(),
            count,
            block_runtime_id: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.network_id == 0 || self.count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseItemAction {
    ClickBlock,
    ClickAir,
    BreakBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseItemData {
    pub action: UseItemAction,
    pub block_position: BlockPos,
    pub face: i32,
    pub hotbar_slot: i32,
    pub held_item: ItemStack,
    pub position: Vec3,
    pub click_position: Vec3,
    pub block_runtime_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseItemOnEntityAction {
    Interact,
    Attack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseItemOnEntityData {
    pub target_runtime_id: u64,
    pub action: UseItemOnEntityAction,
    pub hotbar_slot: i32,
    pub held_item: ItemStack,
    pub position: Vec3,
    pub click_position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionData {
    Normal,
    Mismatch,
    UseItem(UseItemData),
    UseItemOnEntity(UseItemOnEntityData),
    ReleaseItem,
}

///Authoritative per-tick input sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAuthInput {
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    ///Eye position claimed by the client.
    pub position: Vec3,
    pub move_strafe: f32,
    pub move_forward: f32,
    pub input_data: InputFlags,
    pub input_mode: InputMode,
    pub interaction_model: InteractionModel,
    pub tick: u64,
    pub delta: Vec3,
    pub item_interaction: Option<UseItemData>,
    pub block_actions: Vec<BlockAction>,
}

impl PlayerAuthInput {
    ///Input with no movement and no actions at the given eye position.
    pub fn idle(tick: u64, position: Vec3) -> Self {
        Self {
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            position,
            move_strafe: 0.0,
            move_forward: 0.0,
            input_data: InputFlags::default(),
            input_mode: InputMode::Mouse,
            interaction_model: InteractionModel::Crosshair,
            tick,
            delta: Vec3::ZERO,
            item_interaction: None,
            block_actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMode {
    Normal,
    Reset,
    Teleport,
    Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimateAction {
    SwingArm,
    StopSleep,
    CriticalHit,
    MagicCriticalHit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerActionType {
    StartBreak,
    AbortBreak,
    StopBreak,
    ContinueBreak,
    PredictDestroyBlock,
    Jump,
    StartSprint,
    StopSprint,
    StartSneak,
    StopSneak,
    Respawn,
    DimensionChangeDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectOperation {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Abilities {
    pub may_fly: bool,
    pub flying: bool,
    pub no_clip: bool,
    pub fly_speed: f32,
    pub walk_speed: f32,
}

///Subset of actor metadata the proxy understands. Absent fields are unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActorData {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub scale: Option<f32>,
    pub immobile: Option<bool>,
}

///A slot addressed by an item stack request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackSlot {
    pub window: u32,
    pub slot: u32,
}

impl StackSlot {
    pub const fn new(window: u32, slot: u32) -> Self {
        Self { window, slot }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackRequestAction {
    Take {
        count: u16,
        source: StackSlot,
        destination: StackSlot,
    },
    Place {
        count: u16,
        source: StackSlot,
        destination: StackSlot,
    },
    Swap {
        source: StackSlot,
        destination: StackSlot,
    },
    Drop {
        count: u16,
        source: StackSlot,
    },
    Destroy {
        count: u16,
        source: StackSlot,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub request_id: i32,
    pub actions: Vec<StackRequestAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResponse {
    pub request_id: i32,
    pub success: bool,
}

///Every message crossing the proxy.
///
/// Packets the proxy does not model travel as `Raw` and are forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Login {
        identity: ClientIdentity,
    },
    StartGame {
        runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        gamemode: GameMode,
        server_tick: u64,
        dimension: i32,
    },
    NetworkStackLatency {
        timestamp: i64,
        needs_response: bool,
    },
    PlayerAuthInput(PlayerAuthInput),
    MovePlayer {
        runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        head_yaw: f32,
        mode: MoveMode,
        on_ground: bool,
        tick: u64,
    },
    CorrectPlayerMovePrediction {
        position: Vec3,
        delta: Vec3,
        on_ground: bool,
        tick: u64,
    },
    AddActor {
        runtime_id: u64,
        entity_type: String,
        position: Vec3,
        velocity: Vec3,
        data: ActorData,
    },
    AddPlayer {
        runtime_id: u64,
        name: String,
        position: Vec3,
        velocity: Vec3,
    },
    RemoveActor {
        runtime_id: u64,
    },
    MoveActorAbsolute {
        runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        on_ground: bool,
        teleport: bool,
    },
    SetActorMotion {
        runtime_id: u64,
        velocity: Vec3,
        tick: u64,
    },
    SetActorData {
        runtime_id: u64,
        data: ActorData,
        tick: u64,
    },
    UpdateAttributes {
        runtime_id: u64,
        attributes: Vec<Attribute>,
        tick: u64,
    },
    MobEffect {
        runtime_id: u64,
        operation: EffectOperation,
        effect_id: i32,
        amplifier: i32,
        duration: i32,
        tick: u64,
    },
    SetPlayerGameType {
        gamemode: GameMode,
    },
    UpdateAbilities {
        runtime_id: u64,
        abilities: Abilities,
    },
    LevelChunk {
        position: ChunkPos,
        dimension: i32,
        payload: Vec<u8>,
    },
    UpdateBlock {
        position: BlockPos,
        block_runtime_id: u32,
        layer: u8,
    },
    ChunkRadiusUpdated {
        radius: i32,
    },
    InventoryTransaction {
        request_id: i32,
        data: TransactionData,
    },
    PlayerAction {
        runtime_id: u64,
        action: PlayerActionType,
        position: BlockPos,
        face: i32,
    },
    Animate {
        action: AnimateAction,
        runtime_id: u64,
    },
    MobEquipment {
        runtime_id: u64,
        item: ItemStack,
        inventory_slot: u8,
        hotbar_slot: u8,
        window_id: u8,
    },
    ItemStackRequest {
        requests: Vec<StackRequest>,
    },
    ItemStackResponse {
        responses: Vec<StackResponse>,
    },
    InventoryContent {
        window_id: u32,
        items: Vec<ItemStack>,
    },
    InventorySlot {
        window_id: u32,
        slot: u32,
        item: ItemStack,
    },
    Text {
        message: String,
    },
    Transfer {
        address: String,
    },
    Disconnect {
        message: String,
    },
    Raw {
        id: u32,
        payload: Vec<u8>,
    },
}

impl Packet {
    ///Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Login { .. } => "Login",
            Packet::StartGame { .. } => "StartGame",
            Packet::NetworkStackLatency { .. } => "NetworkStackLatency",
            Packet::PlayerAuthInput(_) => "PlayerAuthInput",
            Packet::MovePlayer { .. } => "MovePlayer",
            Packet::CorrectPlayerMovePrediction { .. } => "CorrectPlayerMovePrediction",
            Packet::AddActor { .. } => "AddActor",
            Packet::AddPlayer { .. } => "AddPlayer",
            Packet::RemoveActor { .. } => "RemoveActor",
            Packet::MoveActorAbsolute { .. } => "MoveActorAbsolute",
            Packet::SetActorMotion { .. } => "SetActorMotion",
            Packet::SetActorData { .. } => "SetActorData",
            Packet::UpdateAttributes { .. } => "UpdateAttributes",
            Packet::MobEffect { .. } => "MobEffect",
            Packet::SetPlayerGameType { .. } => "SetPlayerGameType",
            Packet::UpdateAbilities { .. } => "UpdateAbilities",
            Packet::LevelChunk { .. } => "LevelChunk",
            Packet::UpdateBlock { .. } => "UpdateBlock",
            Packet::ChunkRadiusUpdated { .. } => "ChunkRadiusUpdated",
            Packet::InventoryTransaction { .. } => "InventoryTransaction",
            Packet::PlayerAction { .. } => "PlayerAction",
            Packet::Animate { .. } => "Animate",
            Packet::MobEquipment { .. } => "MobEquipment",
            Packet::ItemStackRequest { .. } => "ItemStackRequest",
            Packet::ItemStackResponse { .. } => "ItemStackResponse",
            Packet::InventoryContent { .. } => "InventoryContent",
            Packet::InventorySlot { .. } => "InventorySlot",
            Packet::Text { .. } => "Text",
            Packet::Transfer { .. } => "Transfer",
            Packet::Disconnect { .. } => "Disconnect",
            Packet::Raw { .. } => "Raw",
        }
    }
}
