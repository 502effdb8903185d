//! Packet id catalogues
//!
//! Every sub-packet starts with its id encoded as `byte - 32`. Server and
//! client id spaces are independent. Ids the dispatcher does not know are
//! tolerated and skipped, so these enums only need to cover what the
//! client acts on.

/// Server-to-client packet ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerPacketId {
    /// Raw level board, 8192 bytes of 2-byte little-endian tile ids
    ///
    /// # Packet Format
    /// ```text
    /// {0}{8192 raw bytes}
    /// ```
    LevelBoard = 0,

    /// Warp trigger rectangle inside the current level
    ///
    /// # Packet Format
    /// ```text
    /// {1}{destination and rect as space-separated text}
    /// ```
    LevelLink = 1,

    /// Enemy (baddy) property update
    BaddyProps = 2,

    /// NPC property update
    ///
    /// # Packet Format
    /// ```text
    /// {3}{GINT3 id}{prop pairs}
    /// ```
    NpcProps = 3,

    /// Chest contents at a level position
    LevelChest = 4,

    /// Sign text at a level position
    LevelSign = 5,

    /// Name of the level the player is now in
    ///
    /// # Packet Format
    /// ```text
    /// {6}{text level name}
    /// ```
    LevelName = 6,

    /// Rectangular tile patch
    ///
    /// # Packet Format
    /// ```text
    /// {7}{GCHAR x}{GCHAR y}{GCHAR w}{GCHAR h}{w*h tiles, 2 bytes LE each}
    /// ```
    BoardModify = 7,

    /// Property update for another player
    OtherPlayerProps = 8,

    /// Property update for the local player
    PlayerProps = 9,

    /// This client is the level leader
    IsLeader = 10,

    /// Bomb placed
    BombAdd = 11,

    /// Bomb removed
    BombDel = 12,

    /// Server-wide chat line
    ToAll = 13,

    /// Forced warp of the local player
    ///
    /// # Packet Format
    /// ```text
    /// {14}{GCHAR x*2}{GCHAR y*2}{text level name}
    /// ```
    PlayerWarp = 14,

    /// A warp request was refused
    WarpFailed = 15,

    /// Session is over; the body is the reason text
    DisconnectMessage = 16,

    /// Arrow fired
    ArrowAdd = 19,

    /// Firespy stream
    Firespy = 20,

    /// Carried object thrown
    ThrowCarried = 21,

    /// Item appeared on the board
    ItemAdd = 22,

    /// Item removed from the board
    ItemDel = 23,

    /// NPC moved
    NpcMoved = 24,

    /// Login accepted; START_MESSAGE follows
    Signature = 25,

    /// NPC action trigger
    NpcAction = 26,

    /// Baddy took damage
    BaddyHurt = 27,

    /// Server flag set
    FlagSet = 28,

    /// NPC removed; authoritative
    NpcDel = 29,

    /// Pending file request failed server-side
    FileSendFailed = 30,

    /// Server flag deleted
    FlagDel = 31,

    /// Show an image over the level
    ShowImg = 32,

    /// NPC weapon granted
    NpcWeaponAdd = 33,

    /// NPC weapon revoked
    NpcWeaponDel = 34,

    /// Administrative broadcast
    AdminMessage = 35,

    /// Explosion effect
    Explosion = 36,

    /// Private message
    ///
    /// # Packet Format
    /// ```text
    /// {37}{GSHORT player id}{text}
    /// ```
    PrivateMessage = 37,

    /// Push-away effect
    PushAway = 38,

    /// Level modification time
    LevelModTime = 39,

    /// Local player was hurt
    HurtPlayer = 40,

    /// Post-login server banner; marks the handshake as complete
    StartMessage = 41,

    /// Periodic world clock; doubles as the keepalive
    NewWorldTime = 42,

    /// Default weapon assignment
    DefaultWeapon = 43,

    /// Requested file matches the client's cached copy
    FileUpToDate = 45,

    /// Forced warp within a GMAP
    ///
    /// # Packet Format
    /// ```text
    /// {49}{GCHAR x2}{GCHAR y2}{GCHAR gmaplevelx}{GCHAR gmaplevely}
    /// ```
    GmapWarp2 = 49,

    /// RC file browser directory listing
    RcFileBrowserDir = 66,

    /// RC file browser status line
    RcFileBrowserMessage = 67,

    /// First frame of a multi-frame file transfer
    ///
    /// # Packet Format
    /// ```text
    /// {68}{text file name}
    /// ```
    LargeFileStart = 68,

    /// Final frame of a multi-frame file transfer
    LargeFileEnd = 69,

    /// Total byte count of a multi-frame file transfer
    LargeFileSize = 82,

    /// RC console text
    RcServerText = 86,

    /// Free-form server text channel
    ServerText = 87,

    /// Board bytes delivered through a RAW_DATA window
    BoardPacket = 101,

    /// A whole requested file delivered through a RAW_DATA window
    ///
    /// # Packet Format
    /// ```text
    /// {102}{GINT5 mod time}{GSTRING file name}{raw bytes}
    /// ```
    File = 102,

    /// Primes the stream reader: the next N bytes are one opaque payload
    ///
    /// # Packet Format
    /// ```text
    /// {161}{GINT3 byte count}
    /// ```
    RawData = 161,
}

impl ServerPacketId {
    pub fn from_u8(value: u8) -> Option<Self> {
        use ServerPacketId::*;
        Some(match value {
            0 => LevelBoard,
            1 => LevelLink,
            2 => BaddyProps,
            3 => NpcProps,
            4 => LevelChest,
            5 => LevelSign,
            6 => LevelName,
            7 => BoardModify,
            8 => OtherPlayerProps,
            9 => PlayerProps,
            10 => IsLeader,
            11 => BombAdd,
            12 => BombDel,
            13 => ToAll,
            14 => PlayerWarp,
            15 => WarpFailed,
            16 => DisconnectMessage,
            19 => ArrowAdd,
            20 => Firespy,
            21 => ThrowCarried,
            22 => ItemAdd,
            23 => ItemDel,
            24 => NpcMoved,
            25 => Signature,
            26 => NpcAction,
            27 => BaddyHurt,
            28 => FlagSet,
            29 => NpcDel,
            30 => FileSendFailed,
            31 => FlagDel,
            32 => ShowImg,
            33 => NpcWeaponAdd,
            34 => NpcWeaponDel,
            35 => AdminMessage,
            36 => Explosion,
            37 => PrivateMessage,
            38 => PushAway,
            39 => LevelModTime,
            40 => HurtPlayer,
            41 => StartMessage,
            42 => NewWorldTime,
            43 => DefaultWeapon,
            45 => FileUpToDate,
            49 => GmapWarp2,
            66 => RcFileBrowserDir,
            67 => RcFileBrowserMessage,
            68 => LargeFileStart,
            69 => LargeFileEnd,
            82 => LargeFileSize,
            86 => RcServerText,
            87 => ServerText,
            101 => BoardPacket,
            102 => File,
            161 => RawData,
            _ => return None,
        })
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Client-to-server packet ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientPacketId {
    /// Login credentials; first frame after the version exchange
    Login = 0,

    /// Local player property writes, coalesced per tick
    PlayerProps = 1,

    /// Declare interest in an adjacent GMAP segment
    AdjacentLevel = 2,

    /// Movement update
    PlayerMove = 10,

    /// Request a warp to a level
    ///
    /// # Packet Format
    /// ```text
    /// {11}{GCHAR x*2}{GCHAR y*2}{text level name}
    /// ```
    LevelWarp = 11,

    /// Server-wide chat
    ToAll = 20,

    /// Private message to one player
    PrivateMessage = 21,

    /// Sword swing
    Shoot = 30,

    /// Projectile with explicit parameters
    Shoot2 = 31,

    /// Place a bomb
    BombAdd = 32,

    /// Fire an arrow
    ArrowAdd = 33,

    /// Add a weapon
    WeaponAdd = 34,

    /// Pick up the item at a tile
    ItemTake = 40,

    /// Remove an item
    ItemDel = 41,

    /// Open the chest at a tile
    OpenChest = 42,

    /// Ask the server for a file by name
    ///
    /// # Packet Format
    /// ```text
    /// {50}{text file name}
    /// ```
    WantFile = 50,

    /// Free-form text channel to the server
    SendText = 51,

    /// Ask for a server text value
    RequestText = 52,

    /// Set a server flag
    FlagSet = 53,

    /// Delete a server flag
    FlagDel = 54,

    /// Script trigger action
    TriggerAction = 55,

    /// Delete an NPC
    NpcDel = 60,

    /// NPC property writes
    NpcProps = 61,
}

impl ClientPacketId {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}
