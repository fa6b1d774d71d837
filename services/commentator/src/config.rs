//! Service configuration, read once from the environment at startup.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use tcec_commentator::client::consts::TCEC_SOCKET_URL;
use tcec_commentator::commentary::DEFAULT_CHAT_MODEL;
use tcec_commentator::speech::{DEFAULT_SPEECH_MODEL, DEFAULT_VOICE};
use tracing::Level;

pub const DEFAULT_DUMP_FILE_PATH: &str = "data_dump.txt";

#[derive(Debug)]
pub struct Config {
    pub log_level: Level,
    pub dump_raw_messages: bool,
    pub data_dump_file_path: PathBuf,
    pub local_source_file_path: PathBuf,
    pub silent_mode: bool,
    pub openai_api_key: SecretString,
    pub chat_model: String,
    pub voice_model: String,
    pub voice: String,
    pub output_device: Option<String>,
    pub socket_url: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from the process environment, after reading a
    /// `.env` file if one is present.
    ///
    /// *   `OPENAI_API_KEY`: required, used for both commentary and speech.
    /// *   `RUST_LOG` or `LOG_LEVEL`: defaults to "INFO".
    /// *   `DUMP_RAW_MESSAGES`, `SILENT_MODE`: boolean flags, default off.
    /// *   `DATA_DUMP_FILE_PATH`, `LOCAL_SOURCE_FILE_PATH`: default "data_dump.txt".
    /// *   `CHAT_MODEL`, `VOICE_MODEL`, `VOICE`, `OUTPUT_DEVICE`, `TCEC_SOCKET_URL`: optional overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_level_str = var("RUST_LOG")
            .or_else(|| var("LOG_LEVEL"))
            .unwrap_or_else(|| "INFO".to_string());
        let log_level = parse_level(&log_level_str)?;

        let openai_api_key = var("OPENAI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            log_level,
            dump_raw_messages: parse_flag("DUMP_RAW_MESSAGES", var("DUMP_RAW_MESSAGES"))?,
            data_dump_file_path: var("DATA_DUMP_FILE_PATH")
                .unwrap_or_else(|| DEFAULT_DUMP_FILE_PATH.to_string())
                .into(),
            local_source_file_path: var("LOCAL_SOURCE_FILE_PATH")
                .unwrap_or_else(|| DEFAULT_DUMP_FILE_PATH.to_string())
                .into(),
            silent_mode: parse_flag("SILENT_MODE", var("SILENT_MODE"))?,
            openai_api_key,
            chat_model: var("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            voice_model: var("VOICE_MODEL").unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            voice: var("VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            output_device: var("OUTPUT_DEVICE"),
            socket_url: var("TCEC_SOCKET_URL").unwrap_or_else(|| TCEC_SOCKET_URL.to_string()),
        })
    }
}

fn parse_level(value: &str) -> Result<Level, ConfigError> {
    if value.trim().eq_ignore_ascii_case("warning") {
        return Ok(Level::WARN);
    }
    value
        .trim()
        .parse::<Level>()
        .map_err(|_| ConfigError::InvalidLogLevel(value.to_string()))
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name.to_string(), value)),
    }
}
