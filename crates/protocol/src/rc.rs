//! RC (remote control) packet family
//!
//! An RC session is a normal session whose handshake declared an RC
//! client type; after login it may send this request family. Payload
//! schemas beyond the leading account/id fields are not pinned down by
//! the protocol documentation, so fields ride as plain text until
//! validated against a live server.

use crate::codecs::write_gshort;
use bytes::{BufMut, BytesMut};
use reborn_core::Result;

/// RC request ids (client-to-server)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RcRequestId {
    Chat = 100,
    AdminMessage = 101,
    PrivAdminMessage = 102,
    DisconnectPlayer = 103,
    WarpPlayer = 104,
    PlayerPropsGet2 = 105,
    PlayerPropsGet3 = 106,
    PlayerRightsGet = 107,
    PlayerRightsSet = 108,
    PlayerCommentsGet = 109,
    PlayerCommentsSet = 110,
    PlayerBanGet = 111,
    PlayerBanSet = 112,
    AccountListGet = 113,
    AccountGet = 114,
    AccountAdd = 115,
    AccountDel = 116,
    ServerFlagsGet = 117,
    ServerOptionsGet = 118,
    FolderConfigGet = 119,
    UpdateLevels = 120,
    FileBrowserStart = 121,
    FileBrowserCd = 122,
    FileBrowserEnd = 123,
    FileBrowserDown = 124,
    FileBrowserDelete = 125,
    FileBrowserRename = 126,
}

impl RcRequestId {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

fn packet(id: RcRequestId) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u8(id.as_u8().wrapping_add(32));
    buf
}

fn finish(mut buf: BytesMut) -> BytesMut {
    buf.put_u8(b'\n');
    buf
}

fn text_packet(id: RcRequestId, text: &str) -> BytesMut {
    let mut buf = packet(id);
    buf.put_slice(text.as_bytes());
    finish(buf)
}

/// RC console chat line.
pub fn build_rc_chat(message: &str) -> BytesMut {
    text_packet(RcRequestId::Chat, message)
}

/// Broadcast an admin message to every player.
pub fn build_rc_admin_message(message: &str) -> BytesMut {
    text_packet(RcRequestId::AdminMessage, message)
}

/// Admin message to one player.
pub fn build_rc_priv_admin_message(player_id: u16, message: &str) -> Result<BytesMut> {
    let mut buf = packet(RcRequestId::PrivAdminMessage);
    write_gshort(&mut buf, player_id)?;
    buf.put_slice(message.as_bytes());
    Ok(finish(buf))
}

/// Kick a player by account name.
pub fn build_rc_disconnect_player(account: &str) -> BytesMut {
    text_packet(RcRequestId::DisconnectPlayer, account)
}

/// Warp a player to a level position.
pub fn build_rc_warp_player(account: &str, level: &str, x: f32, y: f32) -> BytesMut {
    text_packet(
        RcRequestId::WarpPlayer,
        &format!("{} {} {} {}", account, x, y, level),
    )
}

pub fn build_rc_player_props_get2(account: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerPropsGet2, account)
}

pub fn build_rc_player_props_get3(account: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerPropsGet3, account)
}

pub fn build_rc_player_rights_get(account: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerRightsGet, account)
}

pub fn build_rc_player_rights_set(account: &str, rights: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerRightsSet, &format!("{}\n{}", account, rights))
}

pub fn build_rc_player_comments_get(account: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerCommentsGet, account)
}

pub fn build_rc_player_comments_set(account: &str, comments: &str) -> BytesMut {
    text_packet(
        RcRequestId::PlayerCommentsSet,
        &format!("{}\n{}", account, comments),
    )
}

pub fn build_rc_player_ban_get(account: &str) -> BytesMut {
    text_packet(RcRequestId::PlayerBanGet, account)
}

pub fn build_rc_player_ban_set(account: &str, banned: bool, reason: &str) -> BytesMut {
    text_packet(
        RcRequestId::PlayerBanSet,
        &format!("{}\n{}\n{}", account, u8::from(banned), reason),
    )
}

pub fn build_rc_account_list_get(filter: &str) -> BytesMut {
    text_packet(RcRequestId::AccountListGet, filter)
}

pub fn build_rc_account_get(account: &str) -> BytesMut {
    text_packet(RcRequestId::AccountGet, account)
}

pub fn build_rc_account_add(account: &str, password: &str) -> BytesMut {
    text_packet(RcRequestId::AccountAdd, &format!("{}\n{}", account, password))
}

pub fn build_rc_account_del(account: &str) -> BytesMut {
    text_packet(RcRequestId::AccountDel, account)
}

pub fn build_rc_server_flags_get() -> BytesMut {
    finish(packet(RcRequestId::ServerFlagsGet))
}

pub fn build_rc_server_options_get() -> BytesMut {
    finish(packet(RcRequestId::ServerOptionsGet))
}

pub fn build_rc_folder_config_get() -> BytesMut {
    finish(packet(RcRequestId::FolderConfigGet))
}

/// Ask the server to reload the named levels from disk.
pub fn build_rc_update_levels(levels: &[&str]) -> BytesMut {
    text_packet(RcRequestId::UpdateLevels, &levels.join(","))
}

pub fn build_rc_file_browser_start() -> BytesMut {
    finish(packet(RcRequestId::FileBrowserStart))
}

pub fn build_rc_file_browser_cd(path: &str) -> BytesMut {
    text_packet(RcRequestId::FileBrowserCd, path)
}

pub fn build_rc_file_browser_end() -> BytesMut {
    finish(packet(RcRequestId::FileBrowserEnd))
}

pub fn build_rc_file_browser_down(file: &str) -> BytesMut {
    text_packet(RcRequestId::FileBrowserDown, file)
}

pub fn build_rc_file_browser_delete(file: &str) -> BytesMut {
    text_packet(RcRequestId::FileBrowserDelete, file)
}

pub fn build_rc_file_browser_rename(from: &str, to: &str) -> BytesMut {
    text_packet(RcRequestId::FileBrowserRename, &format!("{}\n{}", from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc_packets_carry_family_id() {
        let buf = build_rc_chat("/who");
        assert_eq!(buf[0], RcRequestId::Chat.as_u8() + 32);
        assert_eq!(&buf[1..buf.len() - 1], b"/who");

        let buf = build_rc_server_flags_get();
        assert_eq!(buf[0], RcRequestId::ServerFlagsGet.as_u8() + 32);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_rc_warp_player_fields() {
        let buf = build_rc_warp_player("someone", "onlinestartlocal.nw", 30.0, 35.5);
        let text = std::str::from_utf8(&buf[1..buf.len() - 1]).unwrap();
        assert_eq!(text, "someone 30 35.5 onlinestartlocal.nw");
    }

    #[test]
    fn test_rc_update_levels_joins_names() {
        let buf = build_rc_update_levels(&["a.nw", "b.nw"]);
        assert_eq!(&buf[1..buf.len() - 1], b"a.nw,b.nw");
    }
}
