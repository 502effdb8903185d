//! RC session surface
//!
//! Thin wrapper over the RC packet family. Handed out only once a
//! session declared an RC client type at handshake and logged in; the
//! world-state side of the session is unchanged by RC mode.

use reborn_core::Result;
use reborn_network::PacketSender;
use reborn_protocol::rc::*;

/// Administrative operations of a logged-in RC session
pub struct RcSession {
    sender: PacketSender,
}

impl RcSession {
    pub(crate) fn new(sender: PacketSender) -> Self {
        Self { sender }
    }

    /// RC console chat line.
    pub fn chat(&self, message: &str) -> Result<()> {
        self.sender.send(build_rc_chat(message))
    }

    /// Broadcast an admin message to every player.
    pub fn admin_message(&self, message: &str) -> Result<()> {
        self.sender.send(build_rc_admin_message(message))
    }

    /// Admin message to one player.
    pub fn private_admin_message(&self, player_id: u16, message: &str) -> Result<()> {
        self.sender
            .send(build_rc_priv_admin_message(player_id, message)?)
    }

    /// Kick a player by account name.
    pub fn disconnect_player(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_disconnect_player(account))
    }

    /// Warp a player to a level position.
    pub fn warp_player(&self, account: &str, level: &str, x: f32, y: f32) -> Result<()> {
        self.sender.send(build_rc_warp_player(account, level, x, y))
    }

    pub fn get_player_props(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_player_props_get2(account))
    }

    pub fn get_player_props_extended(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_player_props_get3(account))
    }

    pub fn get_player_rights(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_player_rights_get(account))
    }

    pub fn set_player_rights(&self, account: &str, rights: &str) -> Result<()> {
        self.sender.send(build_rc_player_rights_set(account, rights))
    }

    pub fn get_player_comments(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_player_comments_get(account))
    }

    pub fn set_player_comments(&self, account: &str, comments: &str) -> Result<()> {
        self.sender
            .send(build_rc_player_comments_set(account, comments))
    }

    pub fn get_player_ban(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_player_ban_get(account))
    }

    pub fn set_player_ban(&self, account: &str, banned: bool, reason: &str) -> Result<()> {
        self.sender
            .send(build_rc_player_ban_set(account, banned, reason))
    }

    pub fn get_account_list(&self, filter: &str) -> Result<()> {
        self.sender.send(build_rc_account_list_get(filter))
    }

    pub fn get_account(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_account_get(account))
    }

    pub fn add_account(&self, account: &str, password: &str) -> Result<()> {
        self.sender.send(build_rc_account_add(account, password))
    }

    pub fn delete_account(&self, account: &str) -> Result<()> {
        self.sender.send(build_rc_account_del(account))
    }

    pub fn get_server_flags(&self) -> Result<()> {
        self.sender.send(build_rc_server_flags_get())
    }

    pub fn get_server_options(&self) -> Result<()> {
        self.sender.send(build_rc_server_options_get())
    }

    pub fn get_folder_config(&self) -> Result<()> {
        self.sender.send(build_rc_folder_config_get())
    }

    /// Ask the server to reload levels from disk.
    pub fn update_levels(&self, levels: &[&str]) -> Result<()> {
        self.sender.send(build_rc_update_levels(levels))
    }

    //-------------------------------------------------------------------
    // File browser
    //-------------------------------------------------------------------

    pub fn file_browser_start(&self) -> Result<()> {
        self.sender.send(build_rc_file_browser_start())
    }

    pub fn file_browser_cd(&self, path: &str) -> Result<()> {
        self.sender.send(build_rc_file_browser_cd(path))
    }

    pub fn file_browser_end(&self) -> Result<()> {
        self.sender.send(build_rc_file_browser_end())
    }

    pub fn file_browser_download(&self, file: &str) -> Result<()> {
        self.sender.send(build_rc_file_browser_down(file))
    }

    pub fn file_browser_delete(&self, file: &str) -> Result<()> {
        self.sender.send(build_rc_file_browser_delete(file))
    }

    pub fn file_browser_rename(&self, from: &str, to: &str) -> Result<()> {
        self.sender.send(build_rc_file_browser_rename(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reborn_network::ServerConnection;
    use reborn_protocol::rc::RcRequestId;

    #[test]
    fn test_rc_ops_enqueue_family_packets() {
        let (sender, mut rx) = ServerConnection::detached_sender();
        let rc = RcSession::new(sender);

        rc.chat("/who").unwrap();
        rc.disconnect_player("grief3r").unwrap();
        rc.get_server_flags().unwrap();
        rc.file_browser_cd("levels/").unwrap();

        let ids: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|p| p[0].wrapping_sub(32))
            .collect();
        assert_eq!(
            ids,
            vec![
                RcRequestId::Chat.as_u8(),
                RcRequestId::DisconnectPlayer.as_u8(),
                RcRequestId::ServerFlagsGet.as_u8(),
                RcRequestId::FileBrowserCd.as_u8(),
            ]
        );
    }
}
