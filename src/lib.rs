pub mod client;
pub mod codec;
pub mod commentary;
pub mod commentator;
pub mod dispatcher;
pub mod position;
pub mod replay;
pub mod speech;

pub use tcec_commentator_types as types;
pub use tcec_commentator_utils as utils;
pub use client::config::{ConnectionConfig, ConnectionConfigBuilder};
pub use client::dump::FrameDump;
pub use client::stats::Stats;
pub use client::transport::{Transport, TransportError, WebSocketTransport};
pub use client::{Connection, ConnectionState};
pub use dispatcher::{ChessInformationHandler, Dispatch, Dispatcher, FrameHandler};
