//! Frame codec for the socket.io text framing used by the live feed.
//!
//! A frame looks like `42["pgn",{...}]`: a short numeric prefix followed by
//! an optional JSON body. Only the prefix is self-delimiting, and only while
//! it stays shorter than [`MESSAGE_TYPE_MAX_LENGTH`].

use serde_json::Value;
use tcec_commentator_types::{ChessInformation, ChessTag, EvalUpdate, GameUpdate, MessageKind};

/// A `[` at or beyond this byte offset belongs to the body, not the prefix.
pub const MESSAGE_TYPE_MAX_LENGTH: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Extracts the prefix token of a raw frame.
fn message_type_token(raw: &str) -> &str {
    match raw.find('[') {
        Some(idx) if idx < MESSAGE_TYPE_MAX_LENGTH => &raw[..idx],
        _ => {
            let end = raw.char_indices().nth(1).map_or(raw.len(), |(idx, _)| idx);
            &raw[..end]
        }
    }
}

/// Maps a raw frame to its [`MessageKind`]. Unrecognised prefixes are
/// logged and reported as [`MessageKind::Unknown`].
pub fn classify(raw: &str) -> MessageKind {
    let token = message_type_token(raw);
    MessageKind::from_tag(token).unwrap_or_else(|| {
        tracing::warn!("Unknown message type: {:?}", token);
        MessageKind::Unknown
    })
}

/// Decodes the `[tag, data]` body of a chess information frame.
pub fn parse_chess_information(raw: &str) -> Result<ChessInformation, FrameError> {
    let prefix = MessageKind::ChessInformation.tag();
    let body = raw.strip_prefix(prefix).ok_or_else(|| {
        FrameError::MalformedPayload(format!("frame does not start with {prefix:?}"))
    })?;

    let payload: Value = serde_json::from_str(body.trim_end())
        .map_err(|e| FrameError::MalformedPayload(e.to_string()))?;

    match payload {
        Value::Array(mut items) if items.len() == 2 => {
            let data = items.pop().unwrap_or(Value::Null);
            let tag = items
                .pop()
                .and_then(|tag| tag.as_str().map(ChessTag::from))
                .ok_or_else(|| FrameError::MalformedPayload("event tag is not a string".to_string()))?;
            Ok(ChessInformation::new(tag, data))
        }
        other => Err(FrameError::MalformedPayload(format!(
            "expected a [tag, data] array, got {other}"
        ))),
    }
}

fn str_field<'a>(value: &'a Value, key: &str, path: &'static str) -> Result<&'a str, FrameError> {
    match value.get(key) {
        None | Some(Value::Null) => Err(FrameError::MissingField(path)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(FrameError::MalformedPayload(format!("{path} is not a string"))),
    }
}

/// Engines report evaluations either as text (`"#12"`) or as a number.
fn score_field(value: &Value, key: &str, path: &'static str) -> Result<String, FrameError> {
    match value.get(key) {
        None | Some(Value::Null) => Err(FrameError::MissingField(path)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(FrameError::MalformedPayload(format!("{path} is not a score"))),
    }
}

/// Pulls the player names and the most recent move out of a `pgn` event.
pub fn extract_game_update(data: &Value) -> Result<GameUpdate, FrameError> {
    let headers = data.get("Headers").ok_or(FrameError::MissingField("Headers"))?;
    let white_name = str_field(headers, "White", "Headers.White")?;
    let black_name = str_field(headers, "Black", "Headers.Black")?;

    let last_move = data
        .get("Moves")
        .and_then(Value::as_array)
        .and_then(|moves| moves.first())
        .ok_or(FrameError::MissingField("Moves[0]"))?;
    let san = str_field(last_move, "m", "Moves[0].m")?;
    let fen = str_field(last_move, "fen", "Moves[0].fen")?;

    Ok(GameUpdate::new(fen, san, white_name, black_name))
}

/// Pulls engine name, score and principal variation out of a `liveeval` event.
pub fn extract_eval_update(data: &Value) -> Result<EvalUpdate, FrameError> {
    let engine_name = str_field(data, "engine", "engine")?;
    let evaluation = score_field(data, "eval", "eval")?;
    let best_line = str_field(data, "pv", "pv")?;
    Ok(EvalUpdate::new(engine_name, &evaluation, best_line))
}
