//! Drives the dispatcher from a file of captured frames instead of the live
//! feed.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::dispatcher::{Dispatch, Dispatcher};

pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_secs(1);

/// Dispatches every non-blank line of `path` in order, sleeping `interval`
/// between frames. Handler failures are logged and skipped. Returns the
/// number of frames dispatched.
pub async fn replay_file(path: impl AsRef<Path>, dispatcher: &mut Dispatcher, interval: Duration) -> Result<usize> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read replay source {}", path.display()))?;

    let mut dispatched = 0;
    for frame in contents.lines().map(|line| line.trim_end_matches('\r')) {
        if frame.trim().is_empty() {
            continue;
        }
        if dispatched > 0 {
            tokio::time::sleep(interval).await;
        }

        match dispatcher.dispatch(frame).await {
            Ok(Dispatch::Handled(kind)) => tracing::debug!("Replayed {} frame", kind),
            Ok(Dispatch::Unmatched(_)) => {}
            Err(e) => tracing::error!("Failed to handle replayed frame: {:#}", e),
        }
        dispatched += 1;
    }

    tracing::info!("Replayed {} frames from {}", dispatched, path.display());
    Ok(dispatched)
}
