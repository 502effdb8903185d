//! # Reborn Client
//!
//! Client library for Reborn/Graal-family 2D tile MMO servers: the
//! framed, obfuscated, compressed wire protocol, a streaming world-state
//! model (player, level board, GMAP segments), and a stable action API
//! for bots and visual clients.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reborn_client::Client;
//!
//! # fn main() -> reborn_core::Result<()> {
//! let mut client = Client::session("localhost", 14900, "account", "password")?;
//! client.say("Hello, world!")?;
//! loop {
//!     client.update();
//!     let player = client.get_player();
//!     if player.x() > 40.0 {
//!         break;
//!     }
//!     client.move_by(0.5, 0.0)?;
//! }
//! client.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! The async variant exposes the same surface as suspending calls:
//!
//! ```rust,no_run
//! use reborn_client::{AsyncClient, ClientConfig};
//!
//! # async fn run() -> reborn_core::Result<()> {
//! let config = ClientConfig::new("localhost", 14900);
//! let mut client = AsyncClient::session(config, "account", "password").await?;
//! client.actions()?.say("hi")?;
//! client.update().await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod client;
pub mod rc;

pub use actions::Actions;
pub use client::{init_logging, AsyncClient, Client};
pub use rc::RcSession;

// The crates a consumer is expected to touch directly
pub use reborn_config::{ClientConfig, ListServerConfig};
pub use reborn_core::{
    ClientType, Direction, DisconnectReason, Generation, NpcId, PlayerId, RebornError, Result,
};
pub use reborn_game::{Event, EventKind, FilePayload, Player, SubscriptionToken, WorldSnapshot};
pub use reborn_levels::{Board, Chest, Gmap, Item, Level, Link, Npc, Sign};
pub use reborn_network::{fetch_server_list, ListStatus, ServerEntry, SessionState};
