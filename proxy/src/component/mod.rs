//! Passive mirrors of client-side state. They are only mutated from
//! acknowledged actions, so they track what the client has actually seen.

pub mod effects;
pub mod inventory;

pub use effects::Effects;
pub use inventory::Inventory;
