//! Network layer for the Reborn client
//!
//! The session state machine, the TCP connection that pairs the frame
//! codec with the reducer, the fixed-backoff reconnect policy, and the
//! listserver client.

pub mod connection;
pub mod listserver;
pub mod session;

pub use connection::{PacketSender, ServerConnection, SharedReducer};
pub use listserver::{fetch_server_list, ListStatus, ServerEntry};
pub use session::{ReconnectPolicy, SessionState};
