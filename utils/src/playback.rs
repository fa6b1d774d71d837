use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use std::time::{Duration, Instant};

use crate::audio;

/// Extra time allowed after the expected utterance length before giving up.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Time kept after the ring buffer drains so the device plays out its last
/// buffer before the stream is dropped.
const OUTPUT_TAIL: Duration = Duration::from_millis(250);

/// How long to keep the stream open once the buffer has drained, given the
/// expected utterance length and the time already spent playing.
fn remaining_playback(expected: Duration, elapsed: Duration) -> Duration {
    expected.saturating_sub(elapsed) + OUTPUT_TAIL
}

/// Plays mono samples on `device`, duplicating them across all output
/// channels, and blocks until the buffer has been drained.
///
/// Must run on a thread that may block; `cpal::Stream` is not `Send`.
pub fn play_blocking(device: &Device, config: &StreamConfig, samples: Vec<f32>) -> anyhow::Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let channel_count = config.channels.max(1) as usize;
    let expected = Duration::from_secs_f64(samples.len() as f64 / config.sample_rate.0 as f64);

    let (mut producer, mut consumer) = audio::shared_buffer(samples.len()).split();
    let pushed = producer.push_slice(&samples);
    if pushed < samples.len() {
        tracing::warn!("Dropped {} samples that did not fit the output buffer", samples.len() - pushed);
    }

    let (drained_tx, drained_rx) = std::sync::mpsc::sync_channel::<()>(1);
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let mut exhausted = false;
        for frame in data.chunks_mut(channel_count) {
            let sample = consumer.try_pop();
            exhausted |= sample.is_none();
            frame.fill(sample.unwrap_or(0.0));
        }
        if exhausted {
            let _ = drained_tx.try_send(());
        }
    };

    let stream = device
        .build_output_stream(
            config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )
        .context("Failed to build output stream")?;
    stream.play().context("Failed to start output stream")?;
    let started = Instant::now();

    if drained_rx.recv_timeout(expected + DRAIN_GRACE).is_err() {
        tracing::warn!("Output stream did not drain within {:?}", expected + DRAIN_GRACE);
    } else {
        std::thread::sleep(remaining_playback(expected, started.elapsed()));
    }
    drop(stream);
    Ok(())
}
