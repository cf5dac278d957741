/// Game server opcodes (first byte of every frame)
pub mod opcode {
    /// Server -> client: a cell id now belongs to this session
    pub const CELL_ASSIGNED: u8 = 32;
    /// Server -> client: leaderboard (probe occupancy)
    pub const LEADERBOARD: u8 = 54;
    /// Server -> client: access blocked (captcha required)
    pub const ACCESS_BLOCKED: u8 = 85;
    /// Server -> client: key exchange
    pub const KEY_EXCHANGE: u8 = 241;
    /// Server -> client: spawn prompt
    pub const SPAWN_PROMPT: u8 = 242;
    /// Server -> client: compressed envelope
    pub const COMPRESSED_ENVELOPE: u8 = 255;

    /// Inner envelope opcode: viewport delta
    pub const VIEWPORT_DELTA: u8 = 16;
    /// Inner envelope opcode: boundary rectangle
    pub const BOUNDARY_RECT: u8 = 64;

    /// Client -> server: spawn request with display name
    pub const SPAWN: u8 = 0;
    /// Client -> server: move intent
    pub const MOVE: u8 = 16;
    /// Client -> server: follow-mode on signal
    pub const FOLLOW_ON: u8 = 17;
    /// Client -> server: follow-mode off signal
    pub const FOLLOW_OFF: u8 = 21;
    /// Client -> server: protocol version handshake
    pub const PROTOCOL_VERSION: u8 = 254;
    /// Client -> server: client version handshake
    pub const CLIENT_VERSION: u8 = 255;
}

/// Cipher constants
pub mod cipher {
    /// Leading bytes never ciphered (the opcode)
    pub const PREFIX_LEN: usize = 1;
    /// Seed for the encryption key hash
    pub const KEY_SEED: u32 = 255;
    /// MurmurHash2 multiplier, shared by key rotation
    pub const MIX_MULTIPLIER: u32 = 0x5bd1_e995;
    /// Constant folded into every key rotation
    pub const ROTATION_XOR: u32 = 114_296_087;
}

/// Envelope decompression constants
pub mod envelope {
    /// Opcode byte + u32 uncompressed length
    pub const HEADER_LEN: usize = 5;
    /// Upper bound on a declared uncompressed length (16 MiB)
    pub const MAX_UNCOMPRESSED_LEN: usize = 16 * 1024 * 1024;
}

/// Viewport reconciliation constants
pub mod viewport {
    /// Bytes per eat record (eater id + eaten id)
    pub const EAT_RECORD_LEN: usize = 8;
    /// Expected width/height of an accepted boundary rectangle
    pub const BOUNDARY_SPAN: i32 = 14142;

    pub const FLAG_VIRUS: u8 = 1;
    pub const FLAG_SKIP_COLOR: u8 = 2;
    pub const FLAG_SKIP_SKIN: u8 = 4;
    pub const FLAG_NAME: u8 = 8;
    pub const FLAG_EXTENDED: u8 = 128;

    pub const EXT_PELLET: u8 = 1;
    pub const EXT_SKIP_ACCOUNT: u8 = 4;
}

/// Movement policy constants
pub mod policy {
    /// Movement tick cadence
    pub const TICK_INTERVAL_MS: u64 = 40;
    /// Threats must exceed the bot's size by this ratio
    pub const THREAT_SIZE_RATIO: f64 = 1.15;
    /// Threats closer than this trigger a flee
    pub const THREAT_RADIUS: f64 = 420.0;
    /// Distance of the flee target from the bot
    pub const FLEE_RADIUS: f64 = 14142.0;
    /// Max per-axis wander offset
    pub const WANDER_SPAN: f64 = 1337.0;
}

/// Session timing constants
pub mod session {
    /// Dwell time alive before follow-mode becomes eligible
    pub const FOLLOW_DWELL_SECS: u64 = 18;
    /// Delay before force-closing a transport that reported an error
    pub const ERROR_CLOSE_DELAY_MS: u64 = 1000;
    /// Grace delay between the last operator signal and process exit
    pub const EXIT_GRACE_MS: u64 = 1000;
    /// Origin header presented to the game server
    pub const DEFAULT_ORIGIN: &str = "https://agar.io";
}

/// Operator link opcodes
pub mod operator {
    pub const START: u8 = 0;
    pub const STOP: u8 = 1;
    pub const FOLLOW_ON: u8 = 2;
    pub const FOLLOW_OFF: u8 = 3;
    pub const SET_AI: u8 = 4;
    pub const SET_ALIVE: u8 = 5;
    pub const MOUSE: u8 = 6;

    /// Outbound: bots started
    pub const SIGNAL_STARTED: u8 = 0;
    /// Outbound: shutdown countdown begun
    pub const SIGNAL_STOPPING: u8 = 1;
    /// Outbound: shutdown complete
    pub const SIGNAL_STOPPED: u8 = 2;
    /// Outbound: startup failed (blocked before any bot started)
    pub const SIGNAL_START_FAILED: u8 = 3;
}
