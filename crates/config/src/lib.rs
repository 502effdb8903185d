//! Client configuration
//!
//! Everything a session needs to know before the first byte goes out:
//! endpoint, identity bytes for the handshake, pacing, and the reconnect
//! policy. Defaults match the stock server setup.

use reborn_core::{ClientType, Generation};
use std::time::Duration;

/// Connection and protocol settings for one client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname or IP
    pub host: String,

    /// Server port (default: 14900)
    pub port: u16,

    /// 8-byte version banner sent in the handshake
    pub version_banner: String,

    /// Client-variant token following the banner
    pub client_variant: String,

    /// Client type declared at handshake; RC types unlock the RC family
    pub client_type: ClientType,

    /// Protocol generation to negotiate
    pub generation: Generation,

    /// Cipher key sent in the version packet. None picks a random key
    /// per connection.
    pub cipher_key: Option<u8>,

    /// Minimum spacing between outbound frames
    pub packet_send_rate: Duration,

    /// How long without NEW_WORLD_TIME before the connection counts as
    /// stalled
    pub keepalive_window: Duration,

    /// Overall timeout for connect() and login()
    pub connect_timeout: Duration,

    /// Fixed delay between reconnect attempts
    pub reconnect_backoff: Duration,

    /// Reconnect attempts before giving up; 0 disables reconnecting
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 14900,
            version_banner: "GNW30123".into(),
            client_variant: "newmain".into(),
            client_type: ClientType::Client3,
            generation: Generation::Gen5,
            cipher_key: None,
            packet_send_rate: Duration::from_millis(20),
            keepalive_window: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(3),
            max_reconnect_attempts: 3,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    pub fn with_send_rate(mut self, rate: Duration) -> Self {
        self.packet_send_rate = rate;
        self
    }

    pub fn with_reconnect(mut self, backoff: Duration, max_attempts: u32) -> Self {
        self.reconnect_backoff = backoff;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// RC preset: same endpoint, RC client type.
    pub fn rc(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port).with_client_type(ClientType::Rc2)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Listserver endpoint settings
#[derive(Debug, Clone)]
pub struct ListServerConfig {
    pub host: String,
    pub port: u16,

    /// Version banner for the listserver exchange
    pub version_banner: String,

    /// Client-variant token
    pub client_variant: String,

    pub timeout: Duration,
}

impl Default for ListServerConfig {
    fn default() -> Self {
        Self {
            host: "listserver.graal.in".into(),
            port: 14922,
            version_banner: "GNW30123".into(),
            client_variant: "newmain".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ListServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
