use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the raw PCM16 returned by the speech synthesis endpoint.
pub const SPEECH_PCM16_SAMPLE_RATE: f64 = 24000.0;

/// Frames handed to the resampler per call.
pub const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size.max(1))
}

/// Interprets little-endian PCM16 bytes as f32 samples in [-1.0, 1.0].
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / 32768.0).clamp(-1.0, 1.0)
        })
        .collect()
}

/// Resamples a whole mono utterance at once.
pub fn resample_all(samples: &[f32], in_rate: f64, out_rate: f64) -> anyhow::Result<Vec<f32>> {
    if (in_rate - out_rate).abs() < f64::EPSILON || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(in_rate, out_rate, RESAMPLE_CHUNK_SIZE)?;
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::with_capacity((samples.len() as f64 * out_rate / in_rate) as usize + chunk_size);
    for chunk in split_for_chunks(samples, chunk_size) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}
