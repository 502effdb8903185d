//! Action layer
//!
//! Turns user intent into outbound sub-packets plus the matching
//! optimistic world-state mutation. Property writes batch per tick and
//! go out as one PLAYER_PROPS sub-packet; the server's echo later
//! confirms them (except facing, where the client stays authoritative).

use bytes::BytesMut;
use reborn_core::{Direction, RebornError, Result, SEGMENT_TILES};
use reborn_levels::CrossingOutcome;
use reborn_network::{PacketSender, SharedReducer};
use reborn_protocol::{
    build_adjacent_level, build_arrow_add, build_bomb_add, build_item_take, build_level_warp,
    build_open_chest, build_player_props, build_private_message, build_shoot, build_to_all,
    build_trigger_action, build_want_file, builder::{build_flag_del, build_flag_set},
    PlayerProp, PropValue, GSTRING_MAX,
};

/// Highest local coordinate a player can stand at
const EDGE_MAX: f32 = SEGMENT_TILES as f32 - 0.5;

/// Issues actions against one session
pub struct Actions {
    sender: PacketSender,
    reducer: SharedReducer,

    /// Property writes accumulated within the current tick
    pending_props: Vec<(PlayerProp, PropValue)>,
}

impl Actions {
    pub fn new(sender: PacketSender, reducer: SharedReducer) -> Self {
        Self {
            sender,
            reducer,
            pending_props: Vec::new(),
        }
    }

    /// Send everything batched this tick as one PLAYER_PROPS sub-packet.
    /// Called once per client tick, and before any non-props action so
    /// ordering holds.
    pub fn flush_props(&mut self) -> Result<()> {
        if self.pending_props.is_empty() {
            return Ok(());
        }
        let pairs = std::mem::take(&mut self.pending_props);
        self.sender.send(build_player_props(&pairs)?)
    }

    fn queue_prop(&mut self, prop: PlayerProp, value: PropValue) {
        // Later writes of the same prop within a tick supersede earlier
        // ones; one packet carries the final value.
        self.pending_props.retain(|(p, _)| *p != prop);
        self.pending_props.push((prop, value));
    }

    fn send_now(&mut self, packet: BytesMut) -> Result<()> {
        self.flush_props()?;
        self.sender.send(packet)
    }

    /// Move by a delta in tiles, handling clamping and GMAP boundary
    /// crossings. The local mutation is applied immediately; the wire
    /// catches up on the next send tick.
    pub fn move_by(&mut self, dx: f32, dy: f32) -> Result<()> {
        let mut props: Vec<(PlayerProp, PropValue)> = Vec::new();
        let mut follow_up: Vec<BytesMut> = Vec::new();

        {
            let mut reducer = self.reducer.lock();

            let (raw_x, raw_y) = {
                let player = &reducer.state.local_player;
                (player.x() + dx, player.y() + dy)
            };

            if let Some(dir) = Direction::from_delta(dx, dy) {
                reducer.state.local_player.direction = dir;
            }
            let dir = reducer.state.local_player.direction;

            let in_bounds = (0.0..SEGMENT_TILES as f32).contains(&raw_x)
                && (0.0..SEGMENT_TILES as f32).contains(&raw_y);

            if in_bounds || reducer.state.gmap.is_none() {
                let x = raw_x.clamp(0.0, EDGE_MAX);
                let y = raw_y.clamp(0.0, EDGE_MAX);
                reducer.state.local_player.set_local_pos(x, y);
                props.push((PlayerProp::X, PropValue::HalfTile(x)));
                props.push((PlayerProp::Y, PropValue::HalfTile(y)));
                props.push((PlayerProp::Sprite, PropValue::Byte(dir.as_u8())));
            } else {
                // Stepped over a segment edge: the adjacency map decides
                let current = reducer
                    .state
                    .current_level_name()
                    .ok_or(RebornError::NotConnected)?;
                let outcome = reducer
                    .state
                    .gmap
                    .as_ref()
                    .map(|g| g.resolve_crossing(&current, raw_x, raw_y))
                    .unwrap_or(CrossingOutcome::Blocked);

                match outcome {
                    CrossingOutcome::Blocked => {
                        // Edge of the world is a wall
                        let x = raw_x.clamp(0.0, EDGE_MAX);
                        let y = raw_y.clamp(0.0, EDGE_MAX);
                        reducer.state.local_player.set_local_pos(x, y);
                        props.push((PlayerProp::X, PropValue::HalfTile(x)));
                        props.push((PlayerProp::Y, PropValue::HalfTile(y)));
                        props.push((PlayerProp::Sprite, PropValue::Byte(dir.as_u8())));
                    }
                    CrossingOutcome::Entered {
                        target,
                        coord,
                        local,
                    } => {
                        let loaded = reducer.state.cache.is_loaded(&target);

                        // Switch segment atomically: level pointer, player
                        // segment, and local position move together.
                        reducer.state.enter_level(&target);
                        if let Some(gmap) = reducer.state.gmap.as_mut() {
                            gmap.set_active_segment(&target);
                        }
                        reducer.state.local_player.set_segment(coord);
                        reducer.state.local_player.set_local_pos(local.x, local.y);

                        props.push((PlayerProp::X, PropValue::HalfTile(local.x)));
                        props.push((PlayerProp::Y, PropValue::HalfTile(local.y)));
                        props.push((PlayerProp::Sprite, PropValue::Byte(dir.as_u8())));
                        props.push((PlayerProp::GmapLevelX, PropValue::Byte(coord.col as u8)));
                        props.push((PlayerProp::GmapLevelY, PropValue::Byte(coord.row as u8)));

                        if !loaded {
                            // Board still in flight: tell the server where
                            // we went and fetch the segment
                            follow_up.push(build_level_warp(local.x, local.y, &target)?);
                            if reducer.state.prefetch.mark_requested(&target) {
                                follow_up.push(build_want_file(&target));
                            }
                        }

                        // Fresh 3x3 window around the new segment
                        let window = reducer
                            .state
                            .gmap
                            .as_ref()
                            .map(|g| g.window3x3(&target))
                            .unwrap_or_default();
                        for neighbor in window {
                            if reducer.state.cache.is_loaded(&neighbor) {
                                continue;
                            }
                            if reducer.state.prefetch.mark_requested(&neighbor) {
                                follow_up.push(build_adjacent_level(0, &neighbor)?);
                                follow_up.push(build_want_file(&neighbor));
                            }
                        }
                    }
                }
            }
        }

        for (prop, value) in props {
            self.queue_prop(prop, value);
        }
        if !follow_up.is_empty() {
            self.flush_props()?;
            for packet in follow_up {
                self.sender.send(packet)?;
            }
        }
        Ok(())
    }

    /// Say something; shows up in our chat bubble immediately.
    pub fn say(&mut self, message: &str) -> Result<()> {
        if message.len() > GSTRING_MAX {
            return Err(RebornError::ValueOutOfRange(format!(
                "chat message of {} bytes",
                message.len()
            )));
        }
        self.reducer.lock().state.local_player.chat = message.to_string();
        self.queue_prop(PlayerProp::CurChat, PropValue::Str(message.to_string()));
        Ok(())
    }

    pub fn set_nickname(&mut self, nickname: &str) -> Result<()> {
        self.reducer.lock().state.local_player.nickname = nickname.to_string();
        self.queue_prop(PlayerProp::Nickname, PropValue::Str(nickname.to_string()));
        Ok(())
    }

    pub fn set_head_image(&mut self, image: &str) -> Result<()> {
        self.reducer.lock().state.local_player.head_image = image.to_string();
        self.queue_prop(PlayerProp::HeadImage, PropValue::Str(image.to_string()));
        Ok(())
    }

    pub fn set_body_image(&mut self, image: &str) -> Result<()> {
        self.reducer.lock().state.local_player.body_image = image.to_string();
        self.queue_prop(PlayerProp::BodyImage, PropValue::Str(image.to_string()));
        Ok(())
    }

    pub fn set_gani(&mut self, gani: &str) -> Result<()> {
        self.reducer.lock().state.local_player.gani = gani.to_string();
        self.queue_prop(PlayerProp::Gani, PropValue::Str(gani.to_string()));
        Ok(())
    }

    /// Drop a bomb at the player's feet.
    pub fn drop_bomb(&mut self, power: u8, timer: u8) -> Result<()> {
        let (x, y, id) = {
            let reducer = self.reducer.lock();
            let p = &reducer.state.local_player;
            (p.x(), p.y(), p.id)
        };
        self.reducer
            .lock()
            .state
            .effects
            .add_bomb(id, x, y, power, timer);
        self.send_now(build_bomb_add(x, y, power, timer)?)
    }

    pub fn shoot_arrow(&mut self) -> Result<()> {
        self.send_now(build_arrow_add())
    }

    /// Sword swing, with the matching attack animation.
    pub fn attack(&mut self) -> Result<()> {
        self.set_gani("sword")?;
        self.send_now(build_shoot())
    }

    pub fn take_item(&mut self, x: f32, y: f32) -> Result<()> {
        self.send_now(build_item_take(x, y)?)
    }

    pub fn open_chest(&mut self, x: f32, y: f32) -> Result<()> {
        self.send_now(build_open_chest(x, y)?)
    }

    pub fn request_file(&mut self, name: &str) -> Result<()> {
        self.send_now(build_want_file(name))
    }

    /// Warp to a level position; applied locally at once.
    pub fn warp_to_level(&mut self, name: &str, x: f32, y: f32) -> Result<()> {
        {
            let mut reducer = self.reducer.lock();
            reducer.state.enter_level(name);
            reducer.state.local_player.set_local_pos(x, y);
        }
        self.send_now(build_level_warp(x, y, name)?)
    }

    pub fn send_to_all(&mut self, message: &str) -> Result<()> {
        self.send_now(build_to_all(message))
    }

    pub fn send_private_message(&mut self, player_id: u16, message: &str) -> Result<()> {
        self.send_now(build_private_message(player_id, message)?)
    }

    pub fn set_flag(&mut self, name: &str, value: &str) -> Result<()> {
        self.send_now(build_flag_set(name, value))
    }

    pub fn del_flag(&mut self, name: &str) -> Result<()> {
        self.send_now(build_flag_del(name))
    }

    pub fn trigger_action(&mut self, x: f32, y: f32, action: &str) -> Result<()> {
        self.send_now(build_trigger_action(x, y, action)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use reborn_game::Reducer;
    use reborn_levels::{Board, Gmap, GmapFile, SegmentName};
    use reborn_network::ServerConnection;
    use std::sync::Arc;

    /// Actions wired to a channel we can inspect instead of a socket.
    fn harness() -> (Actions, SharedReducer, tokio::sync::mpsc::UnboundedReceiver<BytesMut>) {
        let reducer: SharedReducer = Arc::new(Mutex::new(Reducer::new()));
        let (sender, rx) = ServerConnection::detached_sender();
        (Actions::new(sender, Arc::clone(&reducer)), reducer, rx)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<BytesMut>) -> Vec<BytesMut> {
        let mut out = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            out.push(packet);
        }
        out
    }

    #[test]
    fn test_props_coalesce_per_tick() {
        let (mut actions, _reducer, mut rx) = harness();

        actions.say("hello").unwrap();
        actions.set_nickname("bot").unwrap();
        actions.flush_props().unwrap();

        let packets = drain(&mut rx);
        assert_eq!(packets.len(), 1, "one PLAYER_PROPS sub-packet per tick");
        assert_eq!(packets[0][0], 1 + 32);
    }

    #[test]
    fn test_same_prop_superseded_within_tick() {
        let (mut actions, reducer, mut rx) = harness();

        actions.say("first").unwrap();
        actions.say("second").unwrap();
        actions.flush_props().unwrap();

        let packets = drain(&mut rx);
        assert_eq!(packets.len(), 1);
        assert_eq!(reducer.lock().state.local_player.chat, "second");
        let body = &packets[0][1..packets[0].len() - 1];
        // One CurChat pair carrying the final value
        assert_eq!(body.iter().filter(|&&b| b == 12 + 32).count(), 1);
    }

    #[test]
    fn test_move_optimistic_and_clamped() {
        let (mut actions, reducer, mut rx) = harness();
        reducer.lock().state.enter_level("town.nw");
        reducer.lock().state.local_player.set_local_pos(30.0, 30.0);

        for _ in 0..10 {
            actions.move_by(1.0, 0.0).unwrap();
            actions.flush_props().unwrap();
        }

        let player_x = reducer.lock().state.local_player.x();
        assert_eq!(player_x, 40.0);
        assert_eq!(reducer.lock().state.local_player.direction, Direction::Right);
        assert_eq!(drain(&mut rx).len(), 10);

        // Clamped at the level edge without a gmap
        reducer.lock().state.local_player.set_local_pos(63.0, 30.0);
        actions.move_by(5.0, 0.0).unwrap();
        assert_eq!(reducer.lock().state.local_player.x(), EDGE_MAX);
    }

    fn gmap_3x3(reducer: &SharedReducer) {
        let mut segments = Vec::new();
        for row in 7..=9 {
            for col in 2..=4 {
                let name = SegmentName::parse(&format!(
                    "zlttp-{}{}.nw",
                    char::from(b'a' + col as u8),
                    row
                ))
                .unwrap();
                segments.push((name.to_level_name(), name.coord));
            }
        }
        let mut gmap = Gmap::from_file(&GmapFile {
            name: "zlttp.gmap".into(),
            width: 8,
            height: 10,
            segments,
        });
        gmap.set_active_segment("zlttp-d8.nw");

        let mut reducer = reducer.lock();
        reducer.state.gmap = Some(gmap);
        reducer.state.enter_level("zlttp-d8.nw");
        let coord = SegmentName::parse("zlttp-d8.nw").unwrap().coord;
        reducer.state.local_player.set_segment(coord);
    }

    #[test]
    fn test_boundary_crossing_east() {
        let (mut actions, reducer, mut rx) = harness();
        gmap_3x3(&reducer);
        reducer.lock().state.local_player.set_local_pos(63.4, 30.0);
        let x2_before = reducer.lock().state.local_player.x2();

        actions.move_by(1.0, 0.0).unwrap();
        actions.flush_props().unwrap();

        {
            let reducer = reducer.lock();
            assert_eq!(
                reducer.state.current_level_name().as_deref(),
                Some("zlttp-e8.nw")
            );
            let player = &reducer.state.local_player;
            assert!((player.x() - 0.4).abs() < 1e-4);
            assert!((player.y() - 30.0).abs() < 1e-4);
            // World coordinate advanced by exactly the step
            assert!((player.x2() - (x2_before + 1.0)).abs() < 1e-4);
            assert_eq!(player.segment().unwrap().col, 4);
        }

        // Crossing requests the unloaded target plus its 3x3 window
        let packets = drain(&mut rx);
        assert!(!packets.is_empty());
        let text: Vec<u8> = packets.concat().into_iter().collect();
        let needle = b"zlttp-e8.nw";
        assert!(text.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_boundary_crossing_into_loaded_segment_skips_warp() {
        let (mut actions, reducer, mut rx) = harness();
        gmap_3x3(&reducer);
        {
            let reducer = reducer.lock();
            let handle = reducer.state.cache.get_or_insert("zlttp-e8.nw");
            handle.write().board = Some(Board::filled(0));
        }
        reducer.lock().state.local_player.set_local_pos(63.4, 30.0);

        actions.move_by(1.0, 0.0).unwrap();
        actions.flush_props().unwrap();

        let packets = drain(&mut rx);
        // No LEVEL_WARP among the outbound packets (id 11 + 32 = 43)
        assert!(packets.iter().all(|p| p[0] != 11 + 32));
    }

    #[test]
    fn test_world_edge_is_a_wall() {
        let (mut actions, reducer, _rx) = harness();
        gmap_3x3(&reducer);
        // c7 is the top-left registered corner
        {
            let mut r = reducer.lock();
            r.state.enter_level("zlttp-c7.nw");
            r.state.gmap.as_mut().unwrap().set_active_segment("zlttp-c7.nw");
            let coord = SegmentName::parse("zlttp-c7.nw").unwrap().coord;
            r.state.local_player.set_segment(coord);
            r.state.local_player.set_local_pos(0.5, 30.0);
        }

        actions.move_by(-2.0, 0.0).unwrap();

        let reducer = reducer.lock();
        assert_eq!(
            reducer.state.current_level_name().as_deref(),
            Some("zlttp-c7.nw")
        );
        assert_eq!(reducer.state.local_player.x(), 0.0);
    }

    #[test]
    fn test_say_rejects_oversized() {
        let (mut actions, _reducer, _rx) = harness();
        assert!(actions.say(&"x".repeat(300)).is_err());
    }
}
