//! Outbound sub-packet builders
//!
//! Pure functions from action arguments to complete sub-packet bytes
//! (id byte, fields, trailing newline) ready to be queued for framing.
//! Nothing here touches client state; optimistic application and rate
//! limiting live with the caller.

use crate::codecs::*;
use crate::packets::ClientPacketId;
use crate::props::{write_prop_pairs, PlayerProp, PropValue};
use bytes::{BufMut, BytesMut};
use reborn_core::{ClientType, Direction, Generation, RebornError, Result};

fn packet(id: ClientPacketId) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(id.as_u8().wrapping_add(32));
    buf
}

fn finish(mut buf: BytesMut) -> BytesMut {
    buf.put_u8(b'\n');
    buf
}

fn write_half_tile(buf: &mut BytesMut, tiles: f32, what: &str) -> Result<()> {
    let half = (tiles * 2.0).round();
    if !(0.0..=GCHAR_MAX as f32).contains(&half) {
        return Err(RebornError::ValueOutOfRange(format!(
            "{} {} outside half-tile range",
            what, tiles
        )));
    }
    write_gchar(buf, half as u8)
}

/// Build the version sub-packet that opens the handshake.
///
/// Sent in plaintext framing; the key byte it carries is what seeds both
/// cipher directions afterwards.
///
/// # Packet Format
/// ```text
/// {GCHAR client type}{GCHAR key}{8-byte banner}{variant token}
/// ```
pub fn build_version(
    client_type: ClientType,
    key: u8,
    banner: &str,
    variant: &str,
) -> Result<BytesMut> {
    if banner.len() != 8 {
        return Err(RebornError::ValueOutOfRange(format!(
            "version banner {:?} must be exactly 8 bytes",
            banner
        )));
    }
    let mut buf = BytesMut::new();
    write_gchar(&mut buf, client_type.as_u8())?;
    write_gchar(&mut buf, key)?;
    buf.put_slice(banner.as_bytes());
    buf.put_slice(variant.as_bytes());
    Ok(finish(buf))
}

/// Build the login sub-packet: credentials plus the desired generation.
pub fn build_login(account: &str, password: &str, generation: Generation) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::Login);
    write_gstring(&mut buf, account)?;
    write_gstring(&mut buf, password)?;
    write_gchar(&mut buf, generation.as_u8())?;
    Ok(finish(buf))
}

/// Build one PLAYER_PROPS sub-packet from coalesced property writes.
pub fn build_player_props(pairs: &[(PlayerProp, PropValue)]) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::PlayerProps);
    write_prop_pairs(pairs, &mut buf)?;
    Ok(finish(buf))
}

/// Props for a movement step: position plus facing.
pub fn build_move(x: f32, y: f32, dir: Direction) -> Result<BytesMut> {
    build_player_props(&[
        (PlayerProp::X, PropValue::HalfTile(x)),
        (PlayerProp::Y, PropValue::HalfTile(y)),
        (PlayerProp::Sprite, PropValue::Byte(dir.as_u8())),
    ])
}

/// Props carrying a chat bubble.
pub fn build_chat(message: &str) -> Result<BytesMut> {
    build_player_props(&[(PlayerProp::CurChat, PropValue::Str(message.to_string()))])
}

/// Place a bomb at a tile.
///
/// # Packet Format
/// ```text
/// {32}{GCHAR x*2}{GCHAR y*2}{GCHAR power}{GCHAR timer}
/// ```
pub fn build_bomb_add(x: f32, y: f32, power: u8, timer: u8) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::BombAdd);
    write_half_tile(&mut buf, x, "bomb x")?;
    write_half_tile(&mut buf, y, "bomb y")?;
    write_gchar(&mut buf, power)?;
    write_gchar(&mut buf, timer)?;
    Ok(finish(buf))
}

/// Fire an arrow from the current position.
pub fn build_arrow_add() -> BytesMut {
    finish(packet(ClientPacketId::ArrowAdd))
}

/// Sword swing.
pub fn build_shoot() -> BytesMut {
    finish(packet(ClientPacketId::Shoot))
}

/// Projectile with explicit trajectory.
pub fn build_shoot2(x: f32, y: f32, angle: u8, speed: u8) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::Shoot2);
    write_half_tile(&mut buf, x, "shoot x")?;
    write_half_tile(&mut buf, y, "shoot y")?;
    write_gchar(&mut buf, angle)?;
    write_gchar(&mut buf, speed)?;
    Ok(finish(buf))
}

/// Pick up the item at a tile.
pub fn build_item_take(x: f32, y: f32) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::ItemTake);
    write_half_tile(&mut buf, x, "item x")?;
    write_half_tile(&mut buf, y, "item y")?;
    Ok(finish(buf))
}

/// Remove the item at a tile.
pub fn build_item_del(x: f32, y: f32) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::ItemDel);
    write_half_tile(&mut buf, x, "item x")?;
    write_half_tile(&mut buf, y, "item y")?;
    Ok(finish(buf))
}

/// Open the chest at a tile.
pub fn build_open_chest(x: f32, y: f32) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::OpenChest);
    write_half_tile(&mut buf, x, "chest x")?;
    write_half_tile(&mut buf, y, "chest y")?;
    Ok(finish(buf))
}

/// Request a file (level, gmap, image) from the server.
pub fn build_want_file(name: &str) -> BytesMut {
    let mut buf = packet(ClientPacketId::WantFile);
    buf.put_slice(name.as_bytes());
    finish(buf)
}

/// Request a warp to a level position.
pub fn build_level_warp(x: f32, y: f32, level: &str) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::LevelWarp);
    write_half_tile(&mut buf, x, "warp x")?;
    write_half_tile(&mut buf, y, "warp y")?;
    buf.put_slice(level.as_bytes());
    Ok(finish(buf))
}

/// Declare interest in an adjacent GMAP segment so the server streams it.
pub fn build_adjacent_level(mod_time: u32, level: &str) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::AdjacentLevel);
    write_gint5(&mut buf, mod_time)?;
    buf.put_slice(level.as_bytes());
    Ok(finish(buf))
}

/// Server-wide chat line.
pub fn build_to_all(message: &str) -> BytesMut {
    let mut buf = packet(ClientPacketId::ToAll);
    buf.put_slice(message.as_bytes());
    finish(buf)
}

/// Private message to one player.
pub fn build_private_message(player_id: u16, message: &str) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::PrivateMessage);
    write_gshort(&mut buf, player_id)?;
    buf.put_slice(message.as_bytes());
    Ok(finish(buf))
}

/// Set a server flag to a value.
pub fn build_flag_set(name: &str, value: &str) -> BytesMut {
    let mut buf = packet(ClientPacketId::FlagSet);
    buf.put_slice(name.as_bytes());
    buf.put_u8(b'=');
    buf.put_slice(value.as_bytes());
    finish(buf)
}

/// Delete a server flag.
pub fn build_flag_del(name: &str) -> BytesMut {
    let mut buf = packet(ClientPacketId::FlagDel);
    buf.put_slice(name.as_bytes());
    finish(buf)
}

/// Script trigger action at a tile.
pub fn build_trigger_action(x: f32, y: f32, action: &str) -> Result<BytesMut> {
    let mut buf = packet(ClientPacketId::TriggerAction);
    write_half_tile(&mut buf, x, "trigger x")?;
    write_half_tile(&mut buf, y, "trigger y")?;
    buf.put_slice(action.as_bytes());
    Ok(finish(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    #[test]
    fn test_packets_are_newline_terminated() {
        let built = [
            build_chat("hello").unwrap(),
            build_move(30.0, 30.0, Direction::Right).unwrap(),
            build_want_file("zlttp-d8.nw"),
            build_arrow_add(),
        ];
        for buf in &built {
            assert_eq!(*buf.last().unwrap(), b'\n');
        }
    }

    #[test]
    fn test_version_packet_layout() {
        let buf = build_version(ClientType::Client3, 42, "GNW30123", "newmain").unwrap();
        assert_eq!(buf[0], 5 + 32);
        assert_eq!(buf[1], 42 + 32);
        assert_eq!(&buf[2..10], b"GNW30123");
        assert_eq!(&buf[10..17], b"newmain");
        assert_eq!(buf[17], b'\n');
    }

    #[test]
    fn test_version_requires_8_byte_banner() {
        assert!(build_version(ClientType::Client, 0, "SHORT", "x").is_err());
    }

    #[test]
    fn test_login_packet() {
        let buf = build_login("account", "secret", Generation::Gen5).unwrap();
        assert_eq!(buf[0], 32); // id 0
        let mut body = BytesMut::from(&buf[1..buf.len() - 1]);
        assert_eq!(read_gstring(&mut body).unwrap(), "account");
        assert_eq!(read_gstring(&mut body).unwrap(), "secret");
        assert_eq!(read_gchar(&mut body).unwrap(), 5);
    }

    #[test]
    fn test_move_packet_coalesces_props() {
        let buf = build_move(30.5, 12.0, Direction::Left).unwrap();
        // One sub-packet: id, then three prop pairs, then newline
        assert_eq!(buf[0], ClientPacketId::PlayerProps.as_u8() + 32);
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);

        let mut body = BytesMut::from(&buf[1..buf.len() - 1]);
        assert_eq!(read_gchar(&mut body).unwrap(), PlayerProp::X.as_u8());
        assert_eq!(read_gchar(&mut body).unwrap(), 61); // 30.5 * 2
        assert_eq!(read_gchar(&mut body).unwrap(), PlayerProp::Y.as_u8());
        assert_eq!(read_gchar(&mut body).unwrap(), 24);
        assert_eq!(read_gchar(&mut body).unwrap(), PlayerProp::Sprite.as_u8());
        assert_eq!(read_gchar(&mut body).unwrap(), Direction::Left.as_u8());
        assert!(!body.has_remaining());
    }

    #[test]
    fn test_bomb_packet() {
        let buf = build_bomb_add(10.0, 20.5, 2, 55).unwrap();
        assert_eq!(buf[0], ClientPacketId::BombAdd.as_u8() + 32);
        let mut body = BytesMut::from(&buf[1..buf.len() - 1]);
        assert_eq!(read_gchar(&mut body).unwrap(), 20);
        assert_eq!(read_gchar(&mut body).unwrap(), 41);
        assert_eq!(read_gchar(&mut body).unwrap(), 2);
        assert_eq!(read_gchar(&mut body).unwrap(), 55);
    }

    #[test]
    fn test_out_of_range_position_refused() {
        assert!(build_move(200.0, 0.0, Direction::Up).is_err());
        assert!(build_bomb_add(-1.0, 0.0, 1, 55).is_err());
    }

    #[test]
    fn test_flag_packets() {
        let buf = build_flag_set("quest.done", "1");
        assert_eq!(&buf[1..buf.len() - 1], b"quest.done=1");
        let buf = build_flag_del("quest.done");
        assert_eq!(&buf[1..buf.len() - 1], b"quest.done");
    }
}
