use std::time::Duration;

pub const TCEC_SOCKET_URL: &str = "wss://tcec-chess.com/socket.io/?EIO=3&transport=websocket";
pub const TCEC_ORIGIN: &str = "https://tcec-chess.com";

pub const ORIGIN_HEADER: &str = "Origin";

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CAPACITY: usize = 1024;
