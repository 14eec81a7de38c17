//! Signal conditioning applied once per incoming buffer before framing.

use dasp::Sample;

/// Decodes little-endian 16-bit PCM. A trailing odd byte is ignored.
pub fn decode_pcm16_le(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    let even = bytes.len() & !1;

    if let Some(samples) = cast_aligned(&bytes[..even]) {
        out.extend_from_slice(samples);
        return;
    }

    out.extend(
        bytes[..even]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]])),
    );
}

#[cfg(target_endian = "little")]
fn cast_aligned(bytes: &[u8]) -> Option<&[i16]> {
    bytemuck::try_cast_slice(bytes).ok()
}

#[cfg(not(target_endian = "little"))]
fn cast_aligned(_bytes: &[u8]) -> Option<&[i16]> {
    None
}

/// Converts samples to `[-1, 1]` and applies `y[i] = x[i] - coeff·x[i-1]`, `y[0] = x[0]`
pub fn condition(samples: &[i16], coeff: f32, out: &mut Vec<f32>) {
    out.clear();
    out.reserve(samples.len());

    let mut prev = 0.0f32;
    for (i, &s) in samples.iter().enumerate() {
        let x = s.to_sample::<f32>();
        out.push(if i == 0 { x } else { x - coeff * prev });
        prev = x;
    }
}

pub fn mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32
}

/// Root-mean-square level
pub fn rms(samples: &[f32]) -> f32 {
    mean_square(samples).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}
