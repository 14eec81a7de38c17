//! Triangular Mel filterbank.
//!
//! Breakpoints are spaced uniformly on the Mel axis between 0 Hz and Nyquist,
//! mapped back to FFT bins with `floor((fft_size + 1)·hz / sample_rate)` and
//! clamped to `[1, fft_size/2]`. Filter `i` rises from `left` to `center` and
//! falls from `center` to `right`; its centre is the left edge of filter `i+1`.

use super::fft::{check_len, check_size};
use crate::error::{Error, Result};
use crate::EPSILON;

#[inline]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Bin indices bounding one triangular filter. Weights are zero outside `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterEdges {
    pub left: usize,
    pub center: usize,
    pub right: usize,
}

#[derive(Debug, Clone)]
pub struct MelFilterBank {
    num_filters: usize,
    fft_size: usize,
    sample_rate: u32,
    num_bins: usize,
    edges: Vec<FilterEdges>,
    weights: Vec<f32>, // num_filters rows of num_bins
}

impl MelFilterBank {
    pub fn new(num_filters: usize, fft_size: usize, sample_rate: u32) -> Result<Self> {
        check_size(fft_size)?;
        // a single-point transform has no bin above DC to place a filter on
        if fft_size < 2 {
            return Err(Error::InvalidSize(fft_size));
        }
        if num_filters == 0 {
            return Err(Error::Config("mel filterbank needs at least one filter".into()));
        }
        if sample_rate == 0 {
            return Err(Error::Config("mel filterbank needs a positive sample rate".into()));
        }

        let num_bins = fft_size / 2 + 1;
        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(sample_rate as f32 / 2.0);
        let step = (mel_max - mel_min) / (num_filters + 1) as f32;

        let bins: Vec<usize> = (0..num_filters + 2)
            .map(|i| {
                let hz = mel_to_hz(mel_min + i as f32 * step);
                let bin = ((fft_size + 1) as f32 * hz / sample_rate as f32) as usize;
                bin.clamp(1, fft_size / 2)
            })
            .collect();

        let mut edges = Vec::with_capacity(num_filters);
        let mut weights = vec![0.0f32; num_filters * num_bins];

        for (i, row) in weights.chunks_exact_mut(num_bins).enumerate() {
            let e = FilterEdges {
                left: bins[i],
                center: bins[i + 1],
                right: bins[i + 2],
            };

            for j in e.left..e.center {
                row[j] = (j - e.left) as f32 / (e.center - e.left) as f32;
            }
            for j in e.center..e.right {
                row[j] = 1.0 - (j - e.center) as f32 / (e.right - e.center) as f32;
            }
            edges.push(e);
        }

        tracing::debug!(num_filters, fft_size, sample_rate, "mel filterbank built");

        Ok(Self {
            num_filters,
            fft_size,
            sample_rate,
            num_bins,
            edges,
            weights,
        })
    }

    pub fn num_filters(&self) -> usize {
        self.num_filters
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Power-spectrum bins per filter, `fft_size/2 + 1`
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn edges(&self, filter: usize) -> FilterEdges {
        self.edges[filter]
    }

    /// Dense weight row of one filter
    pub fn weights(&self, filter: usize) -> &[f32] {
        let start = filter * self.num_bins;
        &self.weights[start..start + self.num_bins]
    }

    pub(crate) fn check_io(&self, power: &[f32], energies: &[f32]) -> Result<()> {
        check_len("power", power.len(), self.num_bins)?;
        check_len("mel energies", energies.len(), self.num_filters)
    }
}

/// Weighted sum over each filter's support, then `ln(energy + ε)`
pub fn apply_mel_filter_bank(power: &[f32], bank: &MelFilterBank, energies: &mut [f32]) -> Result<()> {
    bank.check_io(power, energies)?;

    for (i, out) in energies[..bank.num_filters()].iter_mut().enumerate() {
        let e = bank.edges(i);
        let w = bank.weights(i);
        let mut energy = 0.0f32;
        for j in e.left..e.right {
            energy += power[j] * w[j];
        }
        *out = (energy + EPSILON).ln();
    }
    Ok(())
}
