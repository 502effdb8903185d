//! World-state model for the Reborn client
//!
//! The typed player record, the single-writer world state with snapshot
//! reads, the inbound packet dispatcher that reduces sub-packets into
//! state mutations, the synchronous event bus, and the transient effect
//! collections the renderer consumes.

pub mod dispatcher;
pub mod effects;
pub mod events;
pub mod player;
pub mod state;

pub use dispatcher::{DispatchEffects, Reducer};
pub use effects::{Arrow, Bomb, Effects, Explosion, ShownImage};
pub use events::{Event, EventBus, EventKind, FilePayload, SubscriptionToken};
pub use player::{Equip, Player};
pub use state::{WorldSnapshot, WorldState};
