use std::fmt;

/// Kind of a raw frame, derived from its short numeric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `42`: a socket.io event carrying `[tag, data]`.
    ChessInformation,
    /// `0`: engine.io open packet sent right after the handshake.
    FirstPing,
    /// `4`: socket.io message packet without a payload.
    EmptyPostPing,
    Unknown,
}

impl MessageKind {
    const KNOWN: [MessageKind; 3] = [
        MessageKind::ChessInformation,
        MessageKind::FirstPing,
        MessageKind::EmptyPostPing,
    ];

    /// Looks up the kind registered for a prefix token.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::KNOWN.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MessageKind::ChessInformation => "42",
            MessageKind::FirstPing => "0",
            MessageKind::EmptyPostPing => "4",
            MessageKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.tag())
    }
}

/// First element of a chess information event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChessTag {
    /// Game headers plus the latest move.
    Pgn,
    /// Evaluation from one of the commentating engines.
    LiveEval,
    Other(String),
}

impl From<&str> for ChessTag {
    fn from(tag: &str) -> Self {
        match tag {
            "pgn" => ChessTag::Pgn,
            "liveeval" => ChessTag::LiveEval,
            other => ChessTag::Other(other.to_string()),
        }
    }
}

/// A decoded `42[tag, data]` frame.
#[derive(Debug, Clone)]
pub struct ChessInformation {
    tag: ChessTag,
    data: serde_json::Value,
}

impl ChessInformation {
    pub fn new(tag: ChessTag, data: serde_json::Value) -> Self {
        Self { tag, data }
    }

    pub fn tag(&self) -> &ChessTag {
        &self.tag
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}
