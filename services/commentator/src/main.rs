mod config;

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tcec_commentator::commentary::ChatCommentator;
use tcec_commentator::commentator::Commentator;
use tcec_commentator::replay::{self, DEFAULT_REPLAY_INTERVAL};
use tcec_commentator::speech::{SilentSink, SpeechSink, VoiceSink};
use tcec_commentator::types::MessageKind;
use tcec_commentator::utils;
use tcec_commentator::{
    ChessInformationHandler, Connection, ConnectionConfig, Dispatcher, FrameDump, WebSocketTransport,
};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Live spoken commentary for TCEC games")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the live TCEC feed until interrupted
    ConnectSocket,
    /// Feed a file of captured frames through the commentator
    RunFromLocalDump {
        /// Defaults to LOCAL_SOURCE_FILE_PATH
        #[arg(long)]
        path: Option<PathBuf>,
        /// Pause between frames
        #[arg(long, default_value_t = DEFAULT_REPLAY_INTERVAL.as_millis() as u64)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting TCEC commentator...");

    let dispatcher = build_dispatcher(&config)?;

    match args.command {
        Command::ConnectSocket => connect_socket(&config, dispatcher).await,
        Command::RunFromLocalDump { path, interval_ms } => {
            let path = path.unwrap_or_else(|| config.local_source_file_path.clone());
            run_from_local_dump(&path, dispatcher, Duration::from_millis(interval_ms)).await
        }
    }
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let generator = ChatCommentator::new(config.openai_api_key.clone(), config.chat_model.clone());

    let sink: Box<dyn SpeechSink> = if config.silent_mode {
        tracing::info!("Silent mode: commentary will be logged, not spoken");
        Box::new(SilentSink)
    } else {
        match utils::device::get_available_outputs() {
            Ok(outputs) => tracing::debug!("Available output devices:\n{}", outputs),
            Err(e) => tracing::debug!("Could not list output devices: {}", e),
        }
        Box::new(
            VoiceSink::new(
                config.openai_api_key.clone(),
                config.voice_model.clone(),
                config.voice.clone(),
                config.output_device.clone(),
            )
            .context("Failed to set up speech output")?,
        )
    };

    let handler = ChessInformationHandler::new(Commentator::new(generator, sink));
    Ok(Dispatcher::new().with_handler(MessageKind::ChessInformation, handler))
}

async fn connect_socket(config: &Config, dispatcher: Dispatcher) -> Result<()> {
    let connection_config = ConnectionConfig::builder().with_url(&config.socket_url).build();
    let mut connection = Connection::new(WebSocketTransport, connection_config, dispatcher);
    if config.dump_raw_messages {
        tracing::info!("Dumping raw frames to {}", config.data_dump_file_path.display());
        connection = connection.with_dump(FrameDump::new(&config.data_dump_file_path));
    }
    let connection = Arc::new(connection);

    if let Err(e) = connection.connect().await {
        tracing::warn!("Initial connection failed, leaving it to keep-alive: {}", e);
    }

    let keep_alive = tokio::spawn({
        let connection = connection.clone();
        async move { connection.keep_alive().await }
    });

    tokio::signal::ctrl_c().await.context("Failed to listen for interrupt")?;
    tracing::info!("Interrupt received, shutting down");

    connection.stop();
    keep_alive.await.context("Keep-alive task failed")?;
    connection.disconnect().await;

    let stats = connection.stats();
    tracing::info!(
        "Frames received: {}, dropped: {}, handler failures: {}, reconnects: {}",
        stats.frames_received(),
        stats.frames_dropped(),
        stats.handler_failures(),
        stats.reconnects()
    );
    Ok(())
}

async fn run_from_local_dump(path: &std::path::Path, mut dispatcher: Dispatcher, interval: Duration) -> Result<()> {
    tracing::info!("Replaying frames from {}", path.display());
    let count = replay::replay_file(path, &mut dispatcher, interval).await?;
    tracing::info!("Replay finished after {} frames", count);
    Ok(())
}
