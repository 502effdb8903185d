//! Client facades
//!
//! [`AsyncClient`] is the primary surface: every operation is a
//! suspending call on the session's task. [`Client`] wraps it with a
//! current-thread runtime for synchronous, `update()`-polled use from
//! bots and simple tools.

use crate::actions::Actions;
use crate::rc::RcSession;
use parking_lot::Mutex;
use reborn_config::ClientConfig;
use reborn_core::{DisconnectReason, RebornError, Result};
use reborn_game::{Event, EventKind, Player, Reducer, SubscriptionToken, WorldSnapshot};
use reborn_levels::Level;
use reborn_network::{ReconnectPolicy, ServerConnection, SessionState, SharedReducer};
use std::sync::Arc;
use std::time::Duration;

/// How much wall-clock one `update()` may spend on socket I/O
const UPDATE_BUDGET: Duration = Duration::from_millis(5);

/// Asynchronous client facade
pub struct AsyncClient {
    config: ClientConfig,
    reducer: SharedReducer,
    connection: Option<ServerConnection>,
    actions: Option<Actions>,
    credentials: Option<(String, String)>,
    policy: ReconnectPolicy,
}

impl AsyncClient {
    pub fn new(config: ClientConfig) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect_backoff, config.max_reconnect_attempts);
        Self {
            config,
            reducer: Arc::new(Mutex::new(Reducer::new())),
            connection: None,
            actions: None,
            credentials: None,
            policy,
        }
    }

    /// Connect and log in, in one call.
    pub async fn session(
        config: ClientConfig,
        account: &str,
        password: &str,
    ) -> Result<AsyncClient> {
        let mut client = Self::new(config);
        client.connect().await?;
        client.login(account, password).await?;
        Ok(client)
    }

    pub async fn connect(&mut self) -> Result<()> {
        let connection =
            ServerConnection::connect(self.config.clone(), Arc::clone(&self.reducer)).await?;
        self.actions = Some(Actions::new(connection.sender(), Arc::clone(&self.reducer)));
        self.connection = Some(connection);
        Ok(())
    }

    pub async fn login(&mut self, account: &str, password: &str) -> Result<()> {
        let connection = self.connection.as_mut().ok_or(RebornError::NotConnected)?;
        connection.login(account, password).await?;
        self.credentials = Some((account.to_string(), password.to_string()));
        self.policy.reset();
        Ok(())
    }

    /// One poll step: flush batched props, run socket I/O briefly, and
    /// apply the reconnect policy if the session ended.
    pub async fn update(&mut self) -> Result<()> {
        if let Some(actions) = self.actions.as_mut() {
            actions.flush_props()?;
        }
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };

        let ended = match connection.pump(UPDATE_BUDGET).await {
            Ok(None) => return Ok(()),
            Ok(Some(reason)) => reason,
            Err(err) => {
                tracing::error!(%err, "session error");
                connection.disconnect().await;
                connection
                    .last_disconnect()
                    .unwrap_or(DisconnectReason::ConnectionLost)
            }
        };

        self.connection = None;
        self.actions = None;
        self.try_reconnect(ended).await
    }

    /// Drive the session until it ends for good (reconnects exhausted
    /// or a non-transient reason). Returns the final reason.
    pub async fn run(&mut self) -> DisconnectReason {
        loop {
            if self.connection.is_none() {
                return DisconnectReason::Requested;
            }
            match self.update().await {
                Ok(()) => {}
                Err(RebornError::Disconnected(reason)) => return reason,
                Err(err) => {
                    tracing::error!(%err, "client update failed");
                    return DisconnectReason::ConnectionLost;
                }
            }
        }
    }

    async fn try_reconnect(&mut self, reason: DisconnectReason) -> Result<()> {
        let Some((account, password)) = self.credentials.clone() else {
            return Err(RebornError::Disconnected(reason));
        };
        let Some(delay) = self.policy.next_delay(&reason) else {
            return Err(RebornError::Disconnected(reason));
        };

        tracing::info!(%reason, ?delay, attempt = self.policy.attempts_made(), "reconnecting");
        tokio::time::sleep(delay).await;

        // A fresh session starts from a clean world; anything queued
        // during the outage is gone.
        self.reducer.lock().reset_session();

        self.connect().await?;
        self.login(&account, &password).await?;
        self.reducer.lock().events.emit(&Event::Reconnected);
        Ok(())
    }

    /// Close the session. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        self.actions = None;
        self.credentials = None;
    }

    //-------------------------------------------------------------------
    // State access
    //-------------------------------------------------------------------

    pub fn connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.state().is_connected())
            .unwrap_or(false)
    }

    pub fn logged_in(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.state().is_logged_in())
            .unwrap_or(false)
    }

    pub fn state(&self) -> SessionState {
        self.connection
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(SessionState::Disconnected)
    }

    pub fn last_disconnect(&self) -> Option<DisconnectReason> {
        self.connection
            .as_ref()
            .and_then(|c| c.last_disconnect())
    }

    pub fn player(&self) -> Player {
        self.reducer.lock().state.local_player.clone()
    }

    pub fn players(&self) -> Vec<Player> {
        self.reducer.lock().state.players.values().cloned().collect()
    }

    pub fn level(&self) -> Option<Level> {
        let handle = self.reducer.lock().state.current_level()?;
        let level = handle.read().clone();
        Some(level)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.reducer.lock().state.snapshot()
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.reducer.lock().events.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.reducer.lock().events.unsubscribe(token);
    }

    /// The action surface. Errors until connected.
    pub fn actions(&mut self) -> Result<&mut Actions> {
        self.actions.as_mut().ok_or(RebornError::NotConnected)
    }

    /// RC operations; only valid once the session reached RcMode.
    pub fn rc(&self) -> Result<RcSession> {
        let connection = self.connection.as_ref().ok_or(RebornError::NotConnected)?;
        if connection.state() != SessionState::RcMode {
            return Err(RebornError::ProtocolViolation(
                "RC operations require an RC session".into(),
            ));
        }
        Ok(RcSession::new(connection.sender()))
    }
}

/// Synchronous client facade, polled with [`Client::update`]
pub struct Client {
    runtime: tokio::runtime::Runtime,
    inner: AsyncClient,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::with_config(ClientConfig::new(host, port))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            inner: AsyncClient::new(config),
        })
    }

    /// Connect and log in, in one call.
    pub fn session(
        host: impl Into<String>,
        port: u16,
        account: &str,
        password: &str,
    ) -> Result<Self> {
        let mut client = Self::new(host, port)?;
        if !client.connect() {
            return Err(RebornError::NotConnected);
        }
        if !client.login(account, password) {
            return Err(RebornError::LoginRejected("login failed".into()));
        }
        Ok(client)
    }

    pub fn connect(&mut self) -> bool {
        match self.runtime.block_on(self.inner.connect()) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%err, "connect failed");
                false
            }
        }
    }

    pub fn login(&mut self, account: &str, password: &str) -> bool {
        match self.runtime.block_on(self.inner.login(account, password)) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%err, "login failed");
                false
            }
        }
    }

    /// Poll the session; call this regularly from the main loop.
    pub fn update(&mut self) {
        if let Err(err) = self.runtime.block_on(self.inner.update()) {
            tracing::warn!(%err, "update ended session");
        }
    }

    pub fn disconnect(&mut self) {
        self.runtime.block_on(self.inner.disconnect());
    }

    //-------------------------------------------------------------------
    // Actions
    //-------------------------------------------------------------------

    pub fn move_by(&mut self, dx: f32, dy: f32) -> Result<()> {
        self.inner.actions()?.move_by(dx, dy)
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        self.inner.actions()?.say(message)
    }

    pub fn set_nickname(&mut self, nickname: &str) -> Result<()> {
        self.inner.actions()?.set_nickname(nickname)
    }

    pub fn drop_bomb(&mut self, power: u8, timer: u8) -> Result<()> {
        self.inner.actions()?.drop_bomb(power, timer)
    }

    pub fn shoot_arrow(&mut self) -> Result<()> {
        self.inner.actions()?.shoot_arrow()
    }

    pub fn attack(&mut self) -> Result<()> {
        self.inner.actions()?.attack()
    }

    pub fn take_item(&mut self, x: f32, y: f32) -> Result<()> {
        self.inner.actions()?.take_item(x, y)
    }

    pub fn open_chest(&mut self, x: f32, y: f32) -> Result<()> {
        self.inner.actions()?.open_chest(x, y)
    }

    pub fn warp_to_level(&mut self, name: &str, x: f32, y: f32) -> Result<()> {
        self.inner.actions()?.warp_to_level(name, x, y)
    }

    pub fn request_file(&mut self, name: &str) -> Result<()> {
        self.inner.actions()?.request_file(name)
    }

    pub fn set_head_image(&mut self, image: &str) -> Result<()> {
        self.inner.actions()?.set_head_image(image)
    }

    pub fn set_body_image(&mut self, image: &str) -> Result<()> {
        self.inner.actions()?.set_body_image(image)
    }

    pub fn set_gani(&mut self, gani: &str) -> Result<()> {
        self.inner.actions()?.set_gani(gani)
    }

    pub fn send_private_message(&mut self, player_id: u16, message: &str) -> Result<()> {
        self.inner.actions()?.send_private_message(player_id, message)
    }

    pub fn set_flag(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.actions()?.set_flag(name, value)
    }

    pub fn del_flag(&mut self, name: &str) -> Result<()> {
        self.inner.actions()?.del_flag(name)
    }

    //-------------------------------------------------------------------
    // State access
    //-------------------------------------------------------------------

    pub fn connected(&self) -> bool {
        self.inner.connected()
    }

    pub fn logged_in(&self) -> bool {
        self.inner.logged_in()
    }

    pub fn get_player(&self) -> Player {
        self.inner.player()
    }

    pub fn get_players(&self) -> Vec<Player> {
        self.inner.players()
    }

    pub fn get_level(&self) -> Option<Level> {
        self.inner.level()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.inner.snapshot()
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.inner.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.unsubscribe(token)
    }

    pub fn rc(&self) -> Result<RcSession> {
        self.inner.rc()
    }
}

/// Wire `tracing` to stderr with `RUST_LOG`-style filtering. Call once
/// from binaries that have no subscriber of their own.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use reborn_core::Generation;
    use reborn_protocol::{read_gchar, FrameCodec, ServerPacketId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A server that accepts the handshake, streams the first level, and
    /// echoes player props back.
    async fn scripted_server(listener: TcpListener) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut hdr = [0u8; 2];

        // Version frame
        socket.read_exact(&mut hdr).await.unwrap();
        let mut version = vec![0u8; u16::from_be_bytes(hdr) as usize];
        socket.read_exact(&mut version).await.unwrap();
        let mut head = BytesMut::from(&version[..2]);
        let _ = read_gchar(&mut head).unwrap();
        let key = read_gchar(&mut head).unwrap();
        let mut codec = FrameCodec::new(Generation::Gen5, key);

        // Login frame
        socket.read_exact(&mut hdr).await.unwrap();
        let mut login = vec![0u8; u16::from_be_bytes(hdr) as usize];
        socket.read_exact(&mut login).await.unwrap();
        codec.decode(&login).unwrap();

        // Accept, then stream props + level name + board
        let mut reply = Vec::new();
        reply.push(ServerPacketId::Signature.as_u8() + 32);
        reply.push(b'\n');
        reply.push(ServerPacketId::StartMessage.as_u8() + 32);
        reply.extend_from_slice(b"Welcome");
        reply.push(b'\n');
        // Local props: id 14 -> gshort 5, X -> 30, Y -> 30
        reply.push(ServerPacketId::PlayerProps.as_u8() + 32);
        reply.extend_from_slice(&[14 + 32, 5 + 32, 32]); // Id = 5
        reply.extend_from_slice(&[15 + 32, 60 + 32]); // X = 30.0
        reply.extend_from_slice(&[16 + 32, 60 + 32]); // Y = 30.0
        reply.push(b'\n');
        reply.push(ServerPacketId::LevelName.as_u8() + 32);
        reply.extend_from_slice(b"onlinestartlocal.nw");
        reply.push(b'\n');
        let frame = codec.encode(&reply).unwrap();
        socket.write_all(&frame).await.unwrap();

        // Board in its own frame
        let mut board_frame = Vec::new();
        board_frame.push(ServerPacketId::LevelBoard.as_u8() + 32);
        board_frame.extend_from_slice(&vec![0u8; reborn_levels::BOARD_BYTES]);
        let frame = codec.encode(&board_frame).unwrap();
        socket.write_all(&frame).await.unwrap();

        // Read whatever the client sends until it hangs up
        let mut scratch = vec![0u8; 4096];
        loop {
            match socket.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn test_session_receives_first_level() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(scripted_server(listener));

        let mut config = ClientConfig::new(addr.ip().to_string(), addr.port());
        config.connect_timeout = Duration::from_secs(2);
        let mut client = AsyncClient::session(config, "tester", "secret")
            .await
            .unwrap();
        assert!(client.logged_in());

        // Pump until the board lands
        for _ in 0..100 {
            client.update().await.ok();
            if client.level().map(|l| l.is_loaded()).unwrap_or(false) {
                break;
            }
        }

        let level = client.level().expect("level entered");
        assert_eq!(level.name, "onlinestartlocal.nw");
        assert!(level.is_loaded());

        let player = client.player();
        assert_eq!(player.id.get(), 5);
        assert!(player.x() >= 0.0 && player.x() < 64.0);
        assert!(player.y() >= 0.0 && player.y() < 64.0);

        client.disconnect().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_say_updates_chat_and_sends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(scripted_server(listener));

        let mut config = ClientConfig::new(addr.ip().to_string(), addr.port());
        config.connect_timeout = Duration::from_secs(2);
        let mut client = AsyncClient::session(config, "tester", "secret")
            .await
            .unwrap();

        client.actions().unwrap().say("hello").unwrap();
        assert_eq!(client.player().chat, "hello");
        client.update().await.ok();

        client.disconnect().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_rc_requires_rc_session() {
        let config = ClientConfig::default();
        let client = AsyncClient::new(config);
        assert!(client.rc().is_err());
    }
}
