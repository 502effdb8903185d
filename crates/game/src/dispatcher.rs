//! Inbound packet dispatcher and world-state reducer
//!
//! Every decoded sub-packet lands here, in arrival order, on the reducer
//! context. Handlers mutate [`WorldState`], emit events after the
//! mutation that caused them, and may hand back follow-up sub-packets
//! (prefetch requests, crossing warps) for the sender half to queue.
//!
//! Tolerance rules: unknown packet ids are logged at debug and skipped;
//! a handler that cannot decode its body drops that sub-packet at warn
//! and the stream continues. Only transport-level corruption ends the
//! session, and that is decided a layer below.

use crate::events::{Event, EventBus, FilePayload};
use crate::player::Player;
use crate::state::WorldState;
use bytes::{Buf, BytesMut};
use reborn_core::{DisconnectReason, NpcId, PlayerId, RebornError, Result};
use reborn_levels::{
    Board, Chest, Gmap, GmapFile, Item, LevelParser, Link, Npc, SegmentName, Sign, BOARD_BYTES,
};
use reborn_protocol::{
    build_adjacent_level, build_want_file, codecs::*, read_prop_pairs, PlayerProp, PropValue,
    ServerPacketId, SubPacket,
};
use std::time::{Duration, Instant};

/// What a dispatch produced besides state mutation
#[derive(Debug, Default)]
pub struct DispatchEffects {
    /// Sub-packets to enqueue for sending
    pub outbound: Vec<BytesMut>,

    /// Set when the packet ends the session
    pub disconnect: Option<DisconnectReason>,
}

/// In-flight multi-frame file transfer
#[derive(Debug)]
struct FileTransfer {
    name: String,
    expected: Option<usize>,
    data: Vec<u8>,
}

/// The single-writer reducer: world state plus its event bus
pub struct Reducer {
    pub state: WorldState,
    pub events: EventBus,
    file_transfer: Option<FileTransfer>,
    signature_seen: bool,
    logged_in: bool,
}

impl Reducer {
    pub fn new() -> Self {
        Self {
            state: WorldState::new(),
            events: EventBus::new(),
            file_transfer: None,
            signature_seen: false,
            logged_in: false,
        }
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// Forget everything tied to the old session while keeping event
    /// subscriptions alive, so a reconnect starts from a clean world.
    pub fn reset_session(&mut self) {
        self.state.reset();
        self.file_transfer = None;
        self.signature_seen = false;
        self.logged_in = false;
    }

    pub fn signature_seen(&self) -> bool {
        self.signature_seen
    }

    /// Dispatch one sub-packet.
    pub fn handle(&mut self, packet: &SubPacket) -> DispatchEffects {
        let mut fx = DispatchEffects::default();

        let Some(id) = ServerPacketId::from_u8(packet.id) else {
            tracing::debug!(id = packet.id, "unknown packet, skipping");
            return fx;
        };

        let body = packet.body.clone();
        let result = match id {
            ServerPacketId::PlayerProps => self.on_player_props(body),
            ServerPacketId::OtherPlayerProps => self.on_other_player_props(body),
            ServerPacketId::LevelName => self.on_level_name(body, &mut fx),
            ServerPacketId::LevelBoard | ServerPacketId::BoardPacket => self.on_board(body),
            ServerPacketId::BoardModify => self.on_board_modify(body),
            ServerPacketId::LevelLink => self.on_level_link(body),
            ServerPacketId::LevelSign => self.on_level_sign(body),
            ServerPacketId::LevelChest => self.on_level_chest(body),
            ServerPacketId::LevelModTime => self.on_level_mod_time(body),
            ServerPacketId::NpcProps => self.on_npc_props(body),
            ServerPacketId::NpcMoved => self.on_npc_moved(body),
            ServerPacketId::NpcDel => self.on_npc_del(body),
            ServerPacketId::NpcAction => Ok(()),
            ServerPacketId::BaddyProps => self.on_baddy_props(body),
            ServerPacketId::BaddyHurt => Ok(()),
            ServerPacketId::ItemAdd => self.on_item_add(body),
            ServerPacketId::ItemDel => self.on_item_del(body),
            ServerPacketId::ToAll => self.on_to_all(body),
            ServerPacketId::PrivateMessage => self.on_private_message(body),
            ServerPacketId::AdminMessage => self.on_admin_message(body),
            ServerPacketId::ServerText | ServerPacketId::RcServerText => self.on_server_text(body),
            ServerPacketId::PlayerWarp => self.on_player_warp(body, &mut fx),
            ServerPacketId::GmapWarp2 => self.on_gmap_warp2(body, &mut fx),
            ServerPacketId::WarpFailed => {
                tracing::warn!("server refused a warp request");
                Ok(())
            }
            ServerPacketId::IsLeader => {
                self.state.is_leader = true;
                Ok(())
            }
            ServerPacketId::BombAdd => self.on_bomb_add(body),
            ServerPacketId::BombDel => self.on_bomb_del(body),
            ServerPacketId::ArrowAdd => self.on_arrow_add(body),
            ServerPacketId::Explosion => self.on_explosion(body),
            ServerPacketId::Firespy | ServerPacketId::ThrowCarried | ServerPacketId::PushAway => {
                Ok(())
            }
            ServerPacketId::HurtPlayer => self.on_hurt_player(body),
            ServerPacketId::ShowImg => self.on_show_img(body),
            ServerPacketId::FlagSet => self.on_flag_set(body),
            ServerPacketId::FlagDel => self.on_flag_del(body),
            ServerPacketId::Signature => {
                self.signature_seen = true;
                Ok(())
            }
            ServerPacketId::StartMessage => self.on_start_message(body),
            ServerPacketId::DisconnectMessage => self.on_disconnect_message(body, &mut fx),
            ServerPacketId::NewWorldTime => self.on_new_world_time(body),
            ServerPacketId::DefaultWeapon => self.on_default_weapon(body),
            ServerPacketId::NpcWeaponAdd => self.on_weapon_add(body),
            ServerPacketId::NpcWeaponDel => self.on_weapon_del(body),
            ServerPacketId::LargeFileStart => self.on_large_file_start(body),
            ServerPacketId::LargeFileSize => self.on_large_file_size(body),
            ServerPacketId::LargeFileEnd => self.on_large_file_end(),
            ServerPacketId::File => self.on_file(body),
            ServerPacketId::FileUpToDate => self.on_file_up_to_date(body),
            ServerPacketId::FileSendFailed => self.on_file_send_failed(body),
            ServerPacketId::RawData => Ok(()),
            ServerPacketId::RcFileBrowserDir | ServerPacketId::RcFileBrowserMessage => {
                self.on_server_text(body)
            }
        };

        if let Err(err) = result {
            tracing::warn!(?id, %err, "dropping malformed sub-packet");
        }

        // Transient effects age out as packets flow
        self.state.effects.sweep(Instant::now());

        fx
    }

    //-------------------------------------------------------------------
    // Player props
    //-------------------------------------------------------------------

    fn on_player_props(&mut self, mut body: BytesMut) -> Result<()> {
        let pairs = read_prop_pairs(&mut body)?;
        let mut chat = None;
        for (id, value) in &pairs {
            // The client is authoritative on its own facing; a server
            // echo never turns the player around.
            self.state.local_player.apply_prop(*id, value, false);
            if *id == PlayerProp::CurChat.as_u8() {
                if let PropValue::Str(text) = value {
                    chat = Some(text.clone());
                }
            }
        }
        self.events.emit(&Event::PlayerPropsUpdate);
        if let Some(message) = chat {
            let id = self.state.local_player.id;
            self.events.emit(&Event::ChatMessage { id, message });
        }
        Ok(())
    }

    fn on_other_player_props(&mut self, mut body: BytesMut) -> Result<()> {
        let id = PlayerId::new(read_gshort(&mut body)?);
        let pairs = read_prop_pairs(&mut body)?;

        if id == self.state.local_player.id {
            for (prop, value) in &pairs {
                self.state.local_player.apply_prop(*prop, value, false);
            }
            self.events.emit(&Event::PlayerPropsUpdate);
            return Ok(());
        }

        let is_new = !self.state.players.contains_key(&id);
        let player = self
            .state
            .players
            .entry(id)
            .or_insert_with(|| Player::new(id));

        let mut chat = None;
        let mut left = false;
        for (prop, value) in &pairs {
            player.apply_prop(*prop, value, true);
            if *prop == PlayerProp::CurChat.as_u8() {
                if let PropValue::Str(text) = value {
                    chat = Some(text.clone());
                }
            }
            if *prop == PlayerProp::Disconnect.as_u8() {
                left = true;
            }
        }

        if is_new {
            self.events.emit(&Event::PlayerAdded { id });
        }
        self.events.emit(&Event::OtherPlayerUpdate { id });
        if let Some(message) = chat {
            self.events.emit(&Event::ChatMessage { id, message });
        }
        if left {
            self.state.players.remove(&id);
            if let Some(level) = self.state.current_level() {
                level.write().players.remove(&id);
            }
            self.events.emit(&Event::PlayerRemoved { id });
        }
        Ok(())
    }

    //-------------------------------------------------------------------
    // Level state
    //-------------------------------------------------------------------

    fn on_level_name(&mut self, mut body: BytesMut, fx: &mut DispatchEffects) -> Result<()> {
        let name = read_line_string(&mut body);
        if name.is_empty() {
            return Err(RebornError::SubpacketMalformed("empty level name".into()));
        }
        self.enter_named_level(&name, fx);
        Ok(())
    }

    /// Shared by LEVEL_NAME and the warp packets: point the world at a
    /// level, wiring up GMAP residency when the name says so.
    fn enter_named_level(&mut self, name: &str, fx: &mut DispatchEffects) {
        if name.ends_with(".gmap") {
            // Entering a GMAP world: the map file tells us the grid.
            let known = self
                .state
                .gmap
                .as_ref()
                .map(|g| g.name == name)
                .unwrap_or(false);
            if !known && self.state.prefetch.mark_requested(name) {
                fx.outbound.push(build_want_file(name));
            }
            self.events.emit(&Event::LevelEntered { name: name.to_string() });
            return;
        }

        let previously_active = self
            .state
            .gmap
            .as_ref()
            .and_then(|g| g.active_segment())
            .map(String::from);

        self.state.enter_level(name);

        match SegmentName::parse(name) {
            Ok(segment) => {
                if let Some(gmap) = self.state.gmap.as_mut() {
                    if !gmap.contains(name) {
                        gmap.register_segment(name.to_string(), segment.coord);
                    }
                    gmap.set_active_segment(name);
                }
                self.state.local_player.set_segment(segment.coord);
                if previously_active.as_deref() != Some(name) {
                    self.prefetch_window(name, fx);
                }
            }
            Err(_) => {
                // Standalone level: GMAP residency ends
                self.state.gmap = None;
                self.state.local_player.clear_segment();
            }
        }

        self.events.emit(&Event::LevelEntered { name: name.to_string() });
    }

    /// Queue fetches for every unloaded neighbor in the 3x3 window.
    fn prefetch_window(&mut self, center: &str, fx: &mut DispatchEffects) {
        let Some(gmap) = self.state.gmap.as_ref() else {
            return;
        };
        for neighbor in gmap.window3x3(center) {
            if self.state.cache.is_loaded(&neighbor) {
                continue;
            }
            if self.state.prefetch.mark_requested(&neighbor) {
                if let Ok(packet) = build_adjacent_level(0, &neighbor) {
                    fx.outbound.push(packet);
                }
                fx.outbound.push(build_want_file(&neighbor));
            }
        }
    }

    fn on_board(&mut self, body: BytesMut) -> Result<()> {
        // A board may arrive while a large file transfer is open; those
        // bytes belong to the file, not the active level.
        if let Some(transfer) = self.file_transfer.as_mut() {
            transfer.data.extend_from_slice(&body);
            return Ok(());
        }

        if body.len() != BOARD_BYTES {
            return Err(RebornError::WorldInvariant(format!(
                "board of {} bytes rejected",
                body.len()
            )));
        }
        let Some(level) = self.state.current_level() else {
            return Err(RebornError::WorldInvariant(
                "board arrived with no active level".into(),
            ));
        };

        let board = Board::from_raw(&body)?;
        let name = {
            let mut level = level.write();
            level.board = Some(board);
            level.name.clone()
        };
        self.state.prefetch.complete(&name);
        self.events.emit(&Event::LevelBoardLoaded { name });
        Ok(())
    }

    fn on_board_modify(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)?;
        let y = read_gchar(&mut body)?;
        let w = read_gchar(&mut body)?;
        let h = read_gchar(&mut body)?;

        let count = w as usize * h as usize;
        if body.remaining() < count * 2 {
            return Err(RebornError::SubpacketMalformed(format!(
                "board patch wants {} tiles, has {} bytes",
                count,
                body.remaining()
            )));
        }
        let tiles: Vec<u16> = (0..count)
            .map(|_| {
                let lo = body.get_u8();
                let hi = body.get_u8();
                u16::from_le_bytes([lo, hi])
            })
            .collect();

        let Some(level) = self.state.current_level() else {
            return Err(RebornError::WorldInvariant(
                "board patch with no active level".into(),
            ));
        };
        let mut level = level.write();
        match level.board.as_mut() {
            Some(board) => board.patch(x, y, w, h, &tiles).map_err(Into::into),
            None => Err(RebornError::WorldInvariant(
                "board patch before board".into(),
            )),
        }
    }

    fn on_level_link(&mut self, mut body: BytesMut) -> Result<()> {
        let text = read_line_string(&mut body);
        let link = Link::parse_line(&text)
            .ok_or_else(|| RebornError::SubpacketMalformed(format!("bad link {:?}", text)))?;
        if let Some(level) = self.state.current_level() {
            level.write().add_link(link);
        }
        Ok(())
    }

    fn on_level_sign(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)?;
        let y = read_gchar(&mut body)?;
        let text = read_line_string(&mut body);
        if let Some(level) = self.state.current_level() {
            level.write().add_sign(Sign { x, y, text });
        }
        Ok(())
    }

    fn on_level_chest(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)?;
        let y = read_gchar(&mut body)?;
        let item = read_gchar(&mut body)?;
        let sign_index = read_gchar(&mut body)? as i8;
        if let Some(level) = self.state.current_level() {
            level.write().add_chest(Chest {
                x,
                y,
                item,
                sign_index,
                opened: false,
            });
        }
        Ok(())
    }

    fn on_level_mod_time(&mut self, mut body: BytesMut) -> Result<()> {
        let mod_time = read_gint5(&mut body)?;
        if let Some(level) = self.state.current_level() {
            level.write().mod_time = mod_time;
        }
        Ok(())
    }

    //-------------------------------------------------------------------
    // NPCs and baddies
    //-------------------------------------------------------------------

    fn on_npc_props(&mut self, mut body: BytesMut) -> Result<()> {
        let id = NpcId::new(read_gint3(&mut body)?);
        let Some(level) = self.state.current_level() else {
            return Ok(());
        };
        let is_new;
        {
            let mut level = level.write();
            is_new = !level.npcs.contains_key(&id);
            let npc = level.npcs.entry(id).or_insert_with(|| Npc::new(id));
            npc.props = body.to_vec();
        }
        let event = if is_new {
            Event::NpcAdded { id }
        } else {
            Event::NpcMoved { id }
        };
        self.events.emit(&event);
        Ok(())
    }

    fn on_npc_moved(&mut self, mut body: BytesMut) -> Result<()> {
        let id = NpcId::new(read_gint3(&mut body)?);
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        if let Some(level) = self.state.current_level() {
            let mut level = level.write();
            let npc = level.npcs.entry(id).or_insert_with(|| Npc::new(id));
            npc.x = x;
            npc.y = y;
        }
        self.events.emit(&Event::NpcMoved { id });
        Ok(())
    }

    fn on_npc_del(&mut self, mut body: BytesMut) -> Result<()> {
        let id = NpcId::new(read_gint3(&mut body)?);
        if let Some(level) = self.state.current_level() {
            level.write().remove_npc(id);
        }
        self.events.emit(&Event::NpcRemoved { id });
        Ok(())
    }

    fn on_baddy_props(&mut self, mut body: BytesMut) -> Result<()> {
        // Baddies share the NPC table; their ids are a small separate
        // space, kept distinct by offsetting into the high range.
        let id = NpcId::new(0x8000_0000 | read_gchar(&mut body)? as u32);
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        if let Some(level) = self.state.current_level() {
            let mut level = level.write();
            let npc = level.npcs.entry(id).or_insert_with(|| Npc::new(id));
            npc.x = x;
            npc.y = y;
            npc.props = body.to_vec();
        }
        Ok(())
    }

    //-------------------------------------------------------------------
    // Items
    //-------------------------------------------------------------------

    fn on_item_add(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let item = read_gchar(&mut body)?;
        if let Some(level) = self.state.current_level() {
            level.write().add_item(Item { x, y, item });
        }
        Ok(())
    }

    fn on_item_del(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        if let Some(level) = self.state.current_level() {
            level.write().remove_item_at(x, y);
        }
        Ok(())
    }

    //-------------------------------------------------------------------
    // Chat and text
    //-------------------------------------------------------------------

    fn on_to_all(&mut self, mut body: BytesMut) -> Result<()> {
        let id = PlayerId::new(read_gshort(&mut body)?);
        let message = read_line_string(&mut body);
        if let Some(player) = self.state.players.get_mut(&id) {
            player.chat = message.clone();
        }
        self.events.emit(&Event::ChatMessage { id, message });
        Ok(())
    }

    fn on_private_message(&mut self, mut body: BytesMut) -> Result<()> {
        let id = PlayerId::new(read_gshort(&mut body)?);
        let message = read_line_string(&mut body);
        self.events.emit(&Event::PrivateMessage { id, message });
        Ok(())
    }

    fn on_admin_message(&mut self, mut body: BytesMut) -> Result<()> {
        let text = read_line_string(&mut body);
        self.events.emit(&Event::AdminMessage { text });
        Ok(())
    }

    fn on_server_text(&mut self, mut body: BytesMut) -> Result<()> {
        let text = read_line_string(&mut body);
        self.events.emit(&Event::ServerText { text });
        Ok(())
    }

    //-------------------------------------------------------------------
    // Warps
    //-------------------------------------------------------------------

    fn on_player_warp(&mut self, mut body: BytesMut, fx: &mut DispatchEffects) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let level = read_line_string(&mut body);
        self.state.local_player.set_local_pos(x, y);
        if !level.is_empty() {
            self.enter_named_level(&level, fx);
        }
        Ok(())
    }

    fn on_gmap_warp2(&mut self, mut body: BytesMut, fx: &mut DispatchEffects) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let col = read_gchar(&mut body)? as i32;
        let row = read_gchar(&mut body)? as i32;

        let target = self
            .state
            .gmap
            .as_ref()
            .and_then(|g| g.segment_at(reborn_core::SegmentCoord::new(col, row)))
            .map(String::from);

        self.state
            .local_player
            .set_segment(reborn_core::SegmentCoord::new(col, row));
        self.state.local_player.set_local_pos(x, y);

        if let Some(target) = target {
            self.enter_named_level(&target, fx);
        }
        Ok(())
    }

    //-------------------------------------------------------------------
    // Combat and transient effects
    //-------------------------------------------------------------------

    fn on_bomb_add(&mut self, mut body: BytesMut) -> Result<()> {
        let owner = PlayerId::new(read_gshort(&mut body)?);
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let power = read_gchar(&mut body)?;
        let timer = read_gchar(&mut body).unwrap_or(55);
        self.state.effects.add_bomb(owner, x, y, power, timer);
        self.events.emit(&Event::BombAdded { owner, x, y });
        Ok(())
    }

    fn on_bomb_del(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        self.state.effects.remove_bomb_at(x, y);
        self.events.emit(&Event::BombExploded { x, y });
        Ok(())
    }

    fn on_arrow_add(&mut self, mut body: BytesMut) -> Result<()> {
        let owner = PlayerId::new(read_gshort(&mut body)?);
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let direction = read_gchar(&mut body).unwrap_or(2);
        self.state.effects.add_arrow(owner, x, y, direction);
        self.events.emit(&Event::ArrowAdded { owner });
        Ok(())
    }

    fn on_explosion(&mut self, mut body: BytesMut) -> Result<()> {
        let x = read_gchar(&mut body)? as f32 / 2.0;
        let y = read_gchar(&mut body)? as f32 / 2.0;
        let power = read_gchar(&mut body).unwrap_or(1);
        self.state.effects.add_explosion(x, y, power);
        Ok(())
    }

    fn on_hurt_player(&mut self, mut body: BytesMut) -> Result<()> {
        let attacker = PlayerId::new(read_gshort(&mut body)?);
        let half_hearts = read_gchar(&mut body)?;
        let damage = half_hearts as f32 / 2.0;
        let player = &mut self.state.local_player;
        player.hearts = (player.hearts - damage).max(0.0);
        self.events.emit(&Event::PlayerHurt { attacker, damage });
        Ok(())
    }

    fn on_show_img(&mut self, mut body: BytesMut) -> Result<()> {
        let spec = read_line_string(&mut body);
        self.state.effects.add_image(spec, Duration::from_secs(3));
        Ok(())
    }

    //-------------------------------------------------------------------
    // Flags, weapons, time, session
    //-------------------------------------------------------------------

    fn on_flag_set(&mut self, mut body: BytesMut) -> Result<()> {
        let text = read_line_string(&mut body);
        let (name, value) = text.split_once('=').unwrap_or((text.as_str(), ""));
        let (name, value) = (name.to_string(), value.to_string());
        self.state.flags.insert(name.clone(), value.clone());
        self.events.emit(&Event::FlagSet { name, value });
        Ok(())
    }

    fn on_flag_del(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        self.state.flags.remove(&name);
        self.events.emit(&Event::FlagDeleted { name });
        Ok(())
    }

    fn on_default_weapon(&mut self, mut body: BytesMut) -> Result<()> {
        self.state.default_weapon = Some(read_gchar(&mut body)?);
        Ok(())
    }

    fn on_weapon_add(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        self.state.weapons.insert(name);
        Ok(())
    }

    fn on_weapon_del(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        self.state.weapons.remove(&name);
        Ok(())
    }

    fn on_start_message(&mut self, mut body: BytesMut) -> Result<()> {
        let text = read_line_string(&mut body);
        tracing::info!(%text, "server start message");
        if !self.logged_in {
            self.logged_in = true;
            self.events.emit(&Event::LoggedIn);
        }
        Ok(())
    }

    fn on_disconnect_message(&mut self, mut body: BytesMut, fx: &mut DispatchEffects) -> Result<()> {
        let text = read_line_string(&mut body);
        let reason = if self.logged_in {
            DisconnectReason::ServerMessage(text)
        } else {
            DisconnectReason::LoginRejected(text)
        };
        self.events.emit(&Event::Disconnected {
            reason: reason.clone(),
        });
        fx.disconnect = Some(reason);
        Ok(())
    }

    fn on_new_world_time(&mut self, mut body: BytesMut) -> Result<()> {
        self.state.server_time = read_gint5(&mut body)?;
        self.state.last_world_time = Some(Instant::now());
        Ok(())
    }

    //-------------------------------------------------------------------
    // Files
    //-------------------------------------------------------------------

    fn on_large_file_start(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        self.file_transfer = Some(FileTransfer {
            name,
            expected: None,
            data: Vec::new(),
        });
        Ok(())
    }

    fn on_large_file_size(&mut self, mut body: BytesMut) -> Result<()> {
        let size = read_gint5(&mut body)? as usize;
        if let Some(transfer) = self.file_transfer.as_mut() {
            transfer.expected = Some(size);
            transfer.data.reserve(size.min(reborn_protocol::MAX_RAW_WINDOW));
        }
        Ok(())
    }

    fn on_large_file_end(&mut self) -> Result<()> {
        let Some(transfer) = self.file_transfer.take() else {
            return Err(RebornError::SubpacketMalformed(
                "LARGE_FILE_END with no open transfer".into(),
            ));
        };
        if let Some(expected) = transfer.expected {
            if transfer.data.len() != expected {
                tracing::warn!(
                    name = %transfer.name,
                    expected,
                    got = transfer.data.len(),
                    "large file size mismatch"
                );
            }
        }
        self.finish_file(&transfer.name.clone(), transfer.data);
        Ok(())
    }

    fn on_file(&mut self, mut body: BytesMut) -> Result<()> {
        let _mod_time = read_gint5(&mut body)?;
        let name = read_gstring(&mut body)?;
        self.finish_file(&name, body.to_vec());
        Ok(())
    }

    fn on_file_up_to_date(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        self.state.prefetch.complete(&name);
        Ok(())
    }

    fn on_file_send_failed(&mut self, mut body: BytesMut) -> Result<()> {
        let name = read_line_string(&mut body);
        tracing::warn!(%name, "server could not send file");
        self.state.prefetch.complete(&name);
        Ok(())
    }

    /// A complete file arrived: classify, install, announce.
    fn finish_file(&mut self, name: &str, data: Vec<u8>) {
        self.state.prefetch.complete(name);

        let payload = if name.ends_with(".nw") {
            let text = String::from_utf8_lossy(&data).into_owned();
            match LevelParser::parse(name, &text) {
                Ok(parsed) => {
                    let handle = self.state.cache.get_or_insert(name);
                    {
                        let mut level = handle.write();
                        level.board = parsed.board;
                        level.links = parsed.links;
                        level.signs = parsed.signs;
                        level.chests = parsed.chests;
                    }
                    self.events.emit(&Event::LevelBoardLoaded {
                        name: name.to_string(),
                    });
                }
                Err(err) => tracing::warn!(%name, %err, "discarding unparsable level file"),
            }
            FilePayload::LevelText(String::from_utf8_lossy(&data).into_owned())
        } else if name.ends_with(".gmap") {
            let text = String::from_utf8_lossy(&data).into_owned();
            match GmapFile::parse(name, &text) {
                Ok(file) => {
                    let mut gmap = Gmap::from_file(&file);
                    // Keep residency if we already know where we stand
                    if let Some(current) = self.state.current_level_name() {
                        if gmap.contains(&current) {
                            gmap.set_active_segment(&current);
                            if let Some(coord) = gmap.coord_of(&current) {
                                self.state.local_player.set_segment(coord);
                            }
                        }
                    }
                    self.state.gmap = Some(gmap);
                }
                Err(err) => tracing::warn!(%name, %err, "discarding unparsable gmap file"),
            }
            FilePayload::GmapText(text)
        } else {
            FilePayload::Blob(data)
        };

        self.events.emit(&Event::FileReceived {
            name: name.to_string(),
            payload,
        });
    }
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new()
    }
}
