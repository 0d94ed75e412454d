/// Application name
pub const APP_NAME: &str = "Sharegate";

/// Typed-data domain version shared by every signed message
pub const TYPED_DATA_VERSION: &str = "1";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Bot command that carries deep-link parameters
pub const START_COMMAND: &str = "/start";

/// Frontend route where an owner signs a provisional binding
pub const SETCHAT_PATH: &str = "/shares/setchat";

/// Keyboard request ids for the chat picker buttons
pub const SELECT_GROUP_REQUEST_ID: i32 = 1;
pub const SELECT_CHANNEL_REQUEST_ID: i32 = 2;
