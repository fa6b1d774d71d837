use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::DeviceTrait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tcec_commentator_utils::{audio, device, playback};

pub const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "alloy";

/// Destination for finished commentary. `speak` returns once the text has
/// been played (or logged).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSink: Send {
    async fn speak(&mut self, text: &str) -> Result<()>;
}

#[async_trait]
impl<S: SpeechSink + ?Sized> SpeechSink for Box<S> {
    async fn speak(&mut self, text: &str) -> Result<()> {
        (**self).speak(text).await
    }
}

/// Logs commentary instead of producing audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

#[async_trait]
impl SpeechSink for SilentSink {
    async fn speak(&mut self, text: &str) -> Result<()> {
        tracing::info!("{}", text);
        Ok(())
    }
}

/// Synthesises speech over HTTP and plays it on a local output device.
///
/// The HTTP client and the output device are resolved once, at
/// construction, and reused for every utterance.
pub struct VoiceSink {
    client: Client,
    api_key: SecretString,
    model: String,
    voice: String,
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
}

impl VoiceSink {
    pub fn new(api_key: SecretString, model: String, voice: String, device_name: Option<String>) -> Result<Self> {
        let device = device::get_or_default_output(device_name).context("Failed to get audio output device")?;
        let output_config = device
            .default_output_config()
            .context("Failed to get default output config")?;
        let stream_config = cpal::StreamConfig {
            channels: output_config.channels(),
            sample_rate: output_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        tracing::info!(
            "Using output device {:?} ({:?})",
            device.name().unwrap_or_default(),
            stream_config
        );

        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            voice,
            device,
            stream_config,
        })
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "pcm",
        });

        let bytes = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Failed to reach the speech endpoint")?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(audio::decode_pcm16(&bytes))
    }
}

#[async_trait]
impl SpeechSink for VoiceSink {
    async fn speak(&mut self, text: &str) -> Result<()> {
        let samples = self.synthesize(text).await?;
        let samples = audio::resample_all(
            &samples,
            audio::SPEECH_PCM16_SAMPLE_RATE,
            self.stream_config.sample_rate.0 as f64,
        )?;

        let device = self.device.clone();
        let config = self.stream_config.clone();
        tokio::task::spawn_blocking(move || playback::play_blocking(&device, &config, samples))
            .await
            .context("Playback task panicked")?
    }
}
