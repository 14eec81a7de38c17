//! WAV loading and saving for the command-line tester.
//!
//! Input files of any channel count, bit depth and rate are downmixed to mono
//! and resampled to the detector rate before conversion to 16-bit PCM.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dasp::Sample;
use rubato::audioadapter::Adapter;
use rubato::{Fft, FixedSync, Resampler};

const CHUNK_SIZE: usize = 1024;

// Bridges a mono buffer to Rubato
struct MonoBuffer<'a> {
    data: &'a [f32],
}

impl<'a> Adapter<'a, f32> for MonoBuffer<'a> {
    fn channels(&self) -> usize {
        1
    }
    fn frames(&self) -> usize {
        self.data.len()
    }
    fn read_sample(&self, channel: usize, frame: usize) -> Option<f32> {
        if channel == 0 {
            self.data.get(frame).copied()
        } else {
            None
        }
    }
    unsafe fn read_sample_unchecked(&self, _channel: usize, frame: usize) -> f32 {
        *self.data.get_unchecked(frame)
    }
}

/// Mono samples in `[-1, 1]` and their rate
#[derive(Debug, Clone)]
pub struct WavAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn read_wav(path: &Path) -> Result<WavAudio> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{} declares zero channels", path.display());
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v.to_sample::<f32>()))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, bits) if bits <= 32 => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (_, bits) => bail!("unsupported bit depth {bits}"),
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    tracing::debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        frames = samples.len(),
        "wav loaded"
    );

    Ok(WavAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Resamples mono audio with Rubato's FFT resampler
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 1, 1, FixedSync::Input)
        .with_context(|| format!("failed to create resampler {from}->{to}Hz"))?;

    let chunk_len = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to as u64 / from as u64) as usize;
    let mut out = Vec::with_capacity(delay + expected + chunk_len);
    let mut chunk = vec![0.0f32; chunk_len];
    let mut blocks = samples.chunks(chunk_len);

    // zero blocks past the input flush the filter's delay line
    while out.len() < delay + expected {
        let block = blocks.next().unwrap_or(&[]);
        chunk[..block.len()].copy_from_slice(block);
        chunk[block.len()..].fill(0.0);

        let output = resampler
            .process(&MonoBuffer { data: &chunk }, 0, None)
            .context("resampling failed")?;
        if output.frames() == 0 && block.is_empty() {
            bail!("resampler produced no output while flushing");
        }
        out.extend((0..output.frames()).filter_map(|i| output.read_sample(0, i)));
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}

/// Loads a WAV file as 16-bit mono PCM at `target_rate`
pub fn load_pcm16(path: &Path, target_rate: u32) -> Result<Vec<i16>> {
    let audio = read_wav(path)?;
    let mono = resample(&audio.samples, audio.sample_rate, target_rate)?;
    Ok(mono.iter().map(|s| s.clamp(-1.0, 1.0).to_sample::<i16>()).collect())
}

pub fn write_pcm16(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("failed to create {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}
