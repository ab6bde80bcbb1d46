//! Runtime-ID translation across a fast transfer.
//!
//! The client keeps the self id it learned from the first `StartGame` for the
//! whole session. After a transfer the new upstream knows the player by a
//! different id, so every packet that names an entity is rewritten on its way
//! through. Before any transfer the map is the identity.
//!
//! The new upstream may also hand the client's old self id to some other
//! entity. That entity is shown to the client under `SHADOW_RUNTIME_ID`.

use shared::{Packet, TransactionData, SELF_RUNTIME_ID_SENTINEL};

/// Client-side id of the upstream entity that reuses the client's self id.
pub const SHADOW_RUNTIME_ID: u64 = SELF_RUNTIME_ID_SENTINEL - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeIdMap {
    client_self: u64,
    upstream_self: u64,
    transferred: bool,
}

impl RuntimeIdMap {
    pub fn new(runtime_id: u64) -> Self {
        Self {
            client_self: runtime_id,
            upstream_self: runtime_id,
            transferred: false,
        }
    }

    /// The id the client believes it has.
    pub fn client_self(&self) -> u64 {
        self.client_self
    }

    /// The id the current upstream uses for the player.
    pub fn upstream_self(&self) -> u64 {
        self.upstream_self
    }

    pub fn is_active(&self) -> bool {
        self.transferred
    }

    /// Records the id a new upstream assigned to the player.
    pub fn transfer(&mut self, upstream_self: u64) {
        self.upstream_self = upstream_self;
        self.transferred = true;
    }

    fn has_shadow(&self) -> bool {
        self.transferred && self.client_self != self.upstream_self
    }

    pub fn to_server(&self, id: u64) -> u64 {
        if !self.transferred {
            return id;
        }
        if id == SHADOW_RUNTIME_ID && self.has_shadow() {
            self.client_self
        } else if id == self.client_self || id == SELF_RUNTIME_ID_SENTINEL {
            self.upstream_self
        } else {
            id
        }
    }

    /// Translates an upstream id. State aimed at the player itself keeps the
    /// client's own id; any other reference to the player becomes the sentinel.
    pub fn to_client(&self, id: u64, self_state: bool) -> u64 {
        if !self.transferred {
            return id;
        }
        if id != self.upstream_self {
            return if id == self.client_self { SHADOW_RUNTIME_ID } else { id };
        }
        if self_state {
            self.client_self
        } else {
            SELF_RUNTIME_ID_SENTINEL
        }
    }

    /// Rewrites a client packet in place. Returns whether anything changed.
    pub fn client_to_server(&self, packet: &mut Packet) -> bool {
        if !self.transferred {
            return false;
        }
        let id = match packet {
            Packet::PlayerAction { runtime_id, .. }
            | Packet::Animate { runtime_id, .. }
            | Packet::MobEquipment { runtime_id, .. } => runtime_id,
            Packet::InventoryTransaction {
                data: TransactionData::UseItemOnEntity(data),
                ..
            } => &mut data.target_runtime_id,
            _ => return false,
        };
        rewrite(id, self.to_server(*id))
    }

    /// Rewrites a server packet in place. Returns whether anything changed.
    pub fn server_to_client(&self, packet: &mut Packet) -> bool {
        if !self.transferred {
            return false;
        }
        let (id, self_state) = match packet {
            Packet::MovePlayer { runtime_id, .. }
            | Packet::SetActorMotion { runtime_id, .. }
            | Packet::SetActorData { runtime_id, .. }
            | Packet::UpdateAttributes { runtime_id, .. }
            | Packet::MobEffect { runtime_id, .. }
            | Packet::UpdateAbilities { runtime_id, .. } => (runtime_id, true),
            Packet::AddActor { runtime_id, .. }
            | Packet::AddPlayer { runtime_id, .. }
            | Packet::RemoveActor { runtime_id }
            | Packet::MoveActorAbsolute { runtime_id, .. }
            | Packet::Animate { runtime_id, .. }
            | Packet::MobEquipment { runtime_id, .. }
            | Packet::PlayerAction { runtime_id, .. } => (runtime_id, false),
            _ => return false,
        };
        let translated = self.to_client(*id, self_state);
        rewrite(id, translated)
    }
}

fn rewrite(slot: &mut u64, value: u64) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ItemStack, UseItemOnEntityAction, UseItemOnEntityData, Vec3};

    fn attack(target: u64) -> Packet {
        Packet::InventoryTransaction {
            request_id: 0,
            data: TransactionData::UseItemOnEntity(UseItemOnEntityData {
                target_runtime_id: target,
                action: UseItemOnEntityAction::Attack,
                hotbar_slot: 0,
                held_item: ItemStack::empty(),
                position: Vec3::ZERO,
                click_position: Vec3::ZERO,
            }),
        }
    }

    fn target_of(packet: &Packet) -> u64 {
        match packet {
            Packet::InventoryTransaction {
                data: TransactionData::UseItemOnEntity(data),
                ..
            } => data.target_runtime_id,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_identity_before_transfer() {
        let map = RuntimeIdMap::new(7);
        let mut packet = attack(SELF_RUNTIME_ID_SENTINEL);
        assert!(!map.client_to_server(&mut packet));
        assert_eq!(target_of(&packet), SELF_RUNTIME_ID_SENTINEL);
        assert_eq!(map.to_client(7, false), 7);
    }

    #[test]
    fn test_sentinel_attack_goes_to_new_upstream_id() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        let mut packet = attack(SELF_RUNTIME_ID_SENTINEL);
        assert!(map.client_to_server(&mut packet));
        assert_eq!(target_of(&packet), 42);
    }

    #[test]
    fn test_references_to_player_become_sentinel() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        let mut packet = Packet::MoveActorAbsolute {
            runtime_id: 42,
            position: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            on_ground: true,
            teleport: false,
        };
        assert!(map.server_to_client(&mut packet));
        assert!(matches!(packet, Packet::MoveActorAbsolute { runtime_id, .. } if runtime_id == SELF_RUNTIME_ID_SENTINEL));
    }

    #[test]
    fn test_self_state_keeps_client_id() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        let mut packet = Packet::SetActorMotion {
            runtime_id: 42,
            velocity: Vec3::new(0.0, 0.4, 0.0),
            tick: 0,
        };
        assert!(map.server_to_client(&mut packet));
        assert!(matches!(packet, Packet::SetActorMotion { runtime_id: 7, .. }));
    }

    #[test]
    fn test_other_entities_untouched() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        let mut packet = Packet::RemoveActor { runtime_id: 99 };
        assert!(!map.server_to_client(&mut packet));
        let mut packet = attack(99);
        assert!(!map.client_to_server(&mut packet));
        assert_eq!(target_of(&packet), 99);
    }

    #[test]
    fn test_upstream_entity_reusing_client_id_gets_shadow() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        let mut packet = Packet::RemoveActor { runtime_id: 7 };
        assert!(map.server_to_client(&mut packet));
        assert_eq!(packet, Packet::RemoveActor { runtime_id: SHADOW_RUNTIME_ID });

        let mut packet = attack(SHADOW_RUNTIME_ID);
        assert!(map.client_to_server(&mut packet));
        assert_eq!(target_of(&packet), 7);

        let mut packet = attack(7);
        assert!(map.client_to_server(&mut packet));
        assert_eq!(target_of(&packet), 42);
    }

    #[test]
    fn test_no_shadow_when_upstream_keeps_id() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(7);
        assert_eq!(map.to_client(7, true), 7);
        assert_eq!(map.to_server(SHADOW_RUNTIME_ID), SHADOW_RUNTIME_ID);
    }

    #[test]
    fn test_client_own_id_maps_to_upstream() {
        let mut map = RuntimeIdMap::new(7);
        map.transfer(42);
        assert_eq!(map.to_server(7), 42);
        assert_eq!(map.to_server(8), 8);
    }
}
