use std::f64::consts::PI;

use super::fft::{check_len, check_size};
use crate::error::Result;
use crate::EPSILON;

/// Hamming weight `0.54 - 0.46·cos(2π·i/(n-1))`. A one-sample window is left unscaled.
#[inline]
pub fn hamming(i: usize, n: usize) -> f32 {
    if n <= 1 {
        return 1.0;
    }
    (0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()) as f32
}

pub fn apply_hamming_window(frame: &mut [f32]) {
    let n = frame.len();
    for (i, x) in frame.iter_mut().enumerate() {
        *x *= hamming(i, n);
    }
}

/// `re² + im² + ε` for bins `0..=n/2` of an interleaved spectrum
pub fn power_spectrum(spectrum: &[f32], power: &mut [f32], n: usize) -> Result<()> {
    check_size(n)?;
    check_len("spectrum", spectrum.len(), 2 * n)?;
    let bins = n / 2 + 1;
    check_len("power", power.len(), bins)?;

    for (k, p) in power[..bins].iter_mut().enumerate() {
        let re = spectrum[2 * k];
        let im = spectrum[2 * k + 1];
        *p = re * re + im * im + EPSILON;
    }
    Ok(())
}
