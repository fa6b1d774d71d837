pub mod message;
pub mod update;

pub use message::{ChessInformation, ChessTag, MessageKind};
pub use update::{EvalUpdate, GameUpdate};
