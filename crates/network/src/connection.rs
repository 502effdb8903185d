//! # Server connection
//!
//! Owns the TCP socket, the frame codec, and the reducer context for one
//! session. The reader half decodes frames into sub-packets and feeds
//! them to the reducer in arrival order; the sender half coalesces
//! queued sub-packets into one frame per send-rate tick.
//!
//! # Handshake
//!
//! ```text
//! 1. version frame  (plaintext): client type, cipher key, banner, variant
//! 2. login frame    (encrypted + compressed): account, password, generation
//! 3. wait for SIGNATURE then START_MESSAGE, or DISCONNECT_MESSAGE
//! ```
//!
//! # Cancellation
//!
//! All socket reads go through a growable buffer with single `read_buf`
//! calls, so wrapping any step in a timeout never loses bytes.

use crate::session::SessionState;
use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use rand::Rng;
use reborn_config::ClientConfig;
use reborn_core::{DisconnectReason, RebornError, Result};
use reborn_game::{Event, Reducer};
use reborn_protocol::{
    build_login, build_player_props, build_version, FrameCodec, PlayerProp, PropValue,
    SubPacket, SubPacketStream,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Reducer shared between the connection and the client facade
pub type SharedReducer = Arc<Mutex<Reducer>>;

/// Cheap handle for queueing outbound sub-packets from any thread
#[derive(Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<BytesMut>,
}

impl PacketSender {
    pub fn send(&self, packet: BytesMut) -> Result<()> {
        self.tx.send(packet).map_err(|_| RebornError::NotConnected)
    }
}

/// One TCP session against a game server
pub struct ServerConnection {
    config: ClientConfig,
    reducer: SharedReducer,
    state: SessionState,

    socket: Option<TcpStream>,
    codec: FrameCodec,
    stream: SubPacketStream,
    read_buf: BytesMut,

    outbound_tx: mpsc::UnboundedSender<BytesMut>,
    outbound_rx: mpsc::UnboundedReceiver<BytesMut>,
    pending_frame: BytesMut,
    last_send: Instant,

    last_disconnect: Option<DisconnectReason>,
}

impl ServerConnection {
    /// A sender/receiver pair with no socket behind it, for wiring the
    /// action layer in tests and tools that replay captured traffic.
    pub fn detached_sender() -> (PacketSender, mpsc::UnboundedReceiver<BytesMut>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PacketSender { tx }, rx)
    }

    /// Open the socket and send the version frame.
    pub async fn connect(config: ClientConfig, reducer: SharedReducer) -> Result<Self> {
        let key = config
            .cipher_key
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..=223));

        tracing::info!(address = %config.address(), generation = ?config.generation, "connecting");

        let socket = timeout(config.connect_timeout, TcpStream::connect(config.address()))
            .await
            .map_err(|_| RebornError::Timeout(format!("connect to {}", config.address())))??;
        socket.set_nodelay(true)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut conn = Self {
            codec: FrameCodec::new(config.generation, key),
            config,
            reducer,
            state: SessionState::Handshaking,
            socket: Some(socket),
            stream: SubPacketStream::new(),
            read_buf: BytesMut::with_capacity(8192),
            outbound_tx,
            outbound_rx,
            pending_frame: BytesMut::new(),
            last_send: Instant::now() - Duration::from_secs(1),
            last_disconnect: None,
        };

        let version = build_version(
            conn.config.client_type,
            key,
            &conn.config.version_banner,
            &conn.config.client_variant,
        )?;
        conn.write_wire(&FrameCodec::encode_plaintext(&version)?).await?;

        conn.reducer.lock().events.emit(&Event::Connected);
        Ok(conn)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_disconnect(&self) -> Option<DisconnectReason> {
        self.last_disconnect.clone()
    }

    pub fn sender(&self) -> PacketSender {
        PacketSender {
            tx: self.outbound_tx.clone(),
        }
    }

    /// Send credentials and pump until the server accepts or rejects.
    pub async fn login(&mut self, account: &str, password: &str) -> Result<()> {
        let login = build_login(account, password, self.config.generation)?;
        let frame = self.codec.encode(&login)?;
        self.write_wire(&frame).await?;

        let deadline = Instant::now() + self.config.connect_timeout;
        loop {
            if self.reducer.lock().logged_in() {
                self.state = if self.config.client_type.is_rc() {
                    SessionState::RcMode
                } else {
                    SessionState::LoggedIn
                };
                tracing::info!(account, state = ?self.state, "login complete");
                return Ok(());
            }
            if let Some(reason) = self.last_disconnect.clone() {
                return Err(RebornError::LoginRejected(reason.to_string()));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.close(DisconnectReason::ConnectionLost).await;
                return Err(RebornError::Timeout("login".into()));
            }

            match timeout(remaining, self.fill_read_buf()).await {
                Ok(Ok(true)) => self.drain_frames()?,
                Ok(Ok(false)) => {
                    let reason = self
                        .last_disconnect
                        .clone()
                        .unwrap_or(DisconnectReason::ConnectionLost);
                    self.close(reason.clone()).await;
                    return Err(RebornError::LoginRejected(reason.to_string()));
                }
                Ok(Err(err)) => {
                    self.close(DisconnectReason::ConnectionLost).await;
                    return Err(err);
                }
                Err(_) => {
                    self.close(DisconnectReason::ConnectionLost).await;
                    return Err(RebornError::Timeout("login".into()));
                }
            }

            if let Some(reason) = self.last_disconnect.clone() {
                self.close(reason.clone()).await;
                return Err(RebornError::LoginRejected(reason.to_string()));
            }
        }
    }

    /// Process I/O for up to `budget`: flush queued sub-packets at the
    /// send rate, read whatever arrives, dispatch it. Returns the
    /// disconnect reason once the session ends.
    pub async fn pump(&mut self, budget: Duration) -> Result<Option<DisconnectReason>> {
        let deadline = Instant::now() + budget;

        loop {
            self.flush_outbound().await?;

            if self.keepalive_stalled() {
                let reason = DisconnectReason::KeepaliveTimeout;
                self.close(reason.clone()).await;
                return Ok(Some(reason));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match timeout(remaining, self.fill_read_buf()).await {
                Ok(Ok(true)) => {
                    self.drain_frames()?;
                    if let Some(reason) = self.last_disconnect.clone() {
                        self.close(reason.clone()).await;
                        return Ok(Some(reason));
                    }
                }
                Ok(Ok(false)) => {
                    let reason = DisconnectReason::ConnectionLost;
                    self.close(reason.clone()).await;
                    return Ok(Some(reason));
                }
                Ok(Err(err)) => {
                    self.close(DisconnectReason::ConnectionLost).await;
                    return Err(err);
                }
                Err(_) => return Ok(None),
            }
        }
    }

    /// Drive the session until it ends.
    pub async fn run(&mut self) -> DisconnectReason {
        loop {
            match self.pump(self.config.packet_send_rate).await {
                Ok(Some(reason)) => return reason,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(%err, "session failed");
                    let reason = DisconnectReason::ConnectionLost;
                    self.close(reason.clone()).await;
                    return reason;
                }
            }
        }
    }

    /// Close the session. Idempotent; best-effort close intent and
    /// flush, then the socket goes away.
    pub async fn disconnect(&mut self) {
        if self.socket.is_some() {
            if let Ok(intent) =
                build_player_props(&[(PlayerProp::Disconnect, PropValue::Byte(1))])
            {
                let _ = self.outbound_tx.send(intent);
            }
            self.last_send = Instant::now() - self.config.packet_send_rate;
            let _ = timeout(Duration::from_millis(250), self.flush_outbound()).await;
        }
        self.close(DisconnectReason::Requested).await;
    }

    async fn close(&mut self, reason: DisconnectReason) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Closing;
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.shutdown().await;
        }
        if self.last_disconnect.is_none() {
            self.last_disconnect = Some(reason.clone());
        }
        // Server-announced disconnects already emitted their event in
        // the reducer; transport-level ones are announced here.
        if !matches!(reason, DisconnectReason::ServerMessage(_) | DisconnectReason::LoginRejected(_)) {
            self.reducer.lock().events.emit(&Event::Disconnected { reason });
        }
        self.state = SessionState::Disconnected;
        tracing::info!("session closed");
    }

    //-------------------------------------------------------------------
    // Reader half
    //-------------------------------------------------------------------

    /// One buffered read. Returns false on clean EOF. Cancel-safe.
    async fn fill_read_buf(&mut self) -> Result<bool> {
        let socket = self.socket.as_mut().ok_or(RebornError::NotConnected)?;
        let n = socket.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            // EOF under an incomplete frame is a truncation, not a
            // graceful close.
            if self.read_buf.len() >= 2 {
                let expected =
                    u16::from_be_bytes([self.read_buf[0], self.read_buf[1]]) as usize;
                return Err(RebornError::TransportTruncated {
                    expected,
                    got: self.read_buf.len() - 2,
                });
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Decode every complete frame in the buffer and dispatch it.
    fn drain_frames(&mut self) -> Result<()> {
        loop {
            if self.read_buf.len() < 2 {
                return Ok(());
            }
            let len = u16::from_be_bytes([self.read_buf[0], self.read_buf[1]]) as usize;
            if self.read_buf.len() < 2 + len {
                return Ok(());
            }
            self.read_buf.advance(2);
            let payload = self.read_buf.split_to(len);

            let decoded = self.codec.decode(&payload)?;
            let packets = self.stream.feed(&decoded);
            self.dispatch(packets);
            if self.last_disconnect.is_some() {
                return Ok(());
            }
        }
    }

    /// Run the reducer over a batch of sub-packets, in order.
    fn dispatch(&mut self, packets: Vec<SubPacket>) {
        let mut reducer = self.reducer.lock();
        for packet in packets {
            let fx = reducer.handle(&packet);
            for outbound in fx.outbound {
                let _ = self.outbound_tx.send(outbound);
            }
            if let Some(reason) = fx.disconnect {
                self.last_disconnect = Some(reason);
                break;
            }
        }
    }

    //-------------------------------------------------------------------
    // Sender half
    //-------------------------------------------------------------------

    /// Coalesce queued sub-packets and send at most one frame per
    /// send-rate tick.
    async fn flush_outbound(&mut self) -> Result<()> {
        while let Ok(packet) = self.outbound_rx.try_recv() {
            self.pending_frame.extend_from_slice(&packet);
        }

        if self.pending_frame.is_empty() {
            return Ok(());
        }
        if self.last_send.elapsed() < self.config.packet_send_rate {
            return Ok(());
        }

        let payload = std::mem::take(&mut self.pending_frame);
        let frame = self.codec.encode(&payload)?;
        self.write_wire(&frame).await?;
        self.last_send = Instant::now();
        Ok(())
    }

    async fn write_wire(&mut self, bytes: &[u8]) -> Result<()> {
        let socket = self.socket.as_mut().ok_or(RebornError::NotConnected)?;
        socket.write_all(bytes).await?;
        Ok(())
    }

    fn keepalive_stalled(&self) -> bool {
        if !self.state.is_logged_in() {
            return false;
        }
        let reducer = self.reducer.lock();
        match reducer.state.last_world_time {
            Some(at) => at.elapsed() > self.config.keepalive_window,
            None => false,
        }
    }
}
