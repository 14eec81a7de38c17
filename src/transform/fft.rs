//! Radix-2 Cooley-Tukey FFT over interleaved `[re, im, re, im, ..]` buffers.
//!
//! These are the scalar reference routines. Every check that can fail runs
//! before the output buffer is touched, so a rejected call leaves it as it was.

use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Rejects zero and non-power-of-two sizes
pub fn check_size(n: usize) -> Result<()> {
    if n == 0 || !n.is_power_of_two() {
        return Err(Error::InvalidSize(n));
    }
    Ok(())
}

pub(crate) fn check_len(what: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual < expected {
        return Err(Error::BufferLength {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Twiddle factor `e^(-2πi·k/len)`, evaluated in f64 and rounded once
#[inline]
pub(crate) fn twiddle(k: usize, len: usize) -> (f32, f32) {
    let angle = -2.0 * PI * k as f64 / len as f64;
    (angle.cos() as f32, angle.sin() as f32)
}

/// Reorders the first `n` complex values of `data` into bit-reversed index order
pub fn bit_reverse(data: &mut [f32], n: usize) {
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;

        if i < j {
            data.swap(2 * i, 2 * j);
            data.swap(2 * i + 1, 2 * j + 1);
        }
    }
}

/// One butterfly between complex slots `a` and `b = a + half` with twiddle `(wr, wi)`
#[inline(always)]
pub(crate) fn butterfly(data: &mut [f32], a: usize, b: usize, wr: f32, wi: f32) {
    let br = data[2 * b];
    let bi = data[2 * b + 1];
    let tr = wr * br - wi * bi;
    let ti = wr * bi + wi * br;

    let ur = data[2 * a];
    let ui = data[2 * a + 1];
    data[2 * a] = ur + tr;
    data[2 * a + 1] = ui + ti;
    data[2 * b] = ur - tr;
    data[2 * b + 1] = ui - ti;
}

/// In-place forward transform of `n` complex values. `n` must already be validated.
pub fn fft_in_place(data: &mut [f32], n: usize) {
    bit_reverse(data, n);

    let mut len = 2;
    while len <= n {
        let half = len >> 1;
        for j in 0..half {
            let (wr, wi) = twiddle(j, len);
            let mut start = 0;
            while start < n {
                butterfly(data, start + j, start + j + half, wr, wi);
                start += len;
            }
        }
        len <<= 1;
    }
}

/// Copies `n` real samples into interleaved form with zero imaginary parts
pub(crate) fn load_real(input: &[f32], output: &mut [f32], n: usize) {
    for (i, &x) in input[..n].iter().enumerate() {
        output[2 * i] = x;
        output[2 * i + 1] = 0.0;
    }
}

/// Forward FFT of `n` real samples into `2n` interleaved values
pub fn fft(input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
    check_size(n)?;
    check_len("fft input", input.len(), n)?;
    check_len("fft output", output.len(), 2 * n)?;

    load_real(input, output, n);
    fft_in_place(output, n);
    Ok(())
}

/// Inverse FFT via conjugate, forward transform, scale by `1/n`, conjugate
pub fn ifft(input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
    check_size(n)?;
    check_len("ifft input", input.len(), 2 * n)?;
    check_len("ifft output", output.len(), 2 * n)?;

    for i in 0..n {
        output[2 * i] = input[2 * i];
        output[2 * i + 1] = -input[2 * i + 1];
    }

    fft_in_place(output, n);

    let scale = 1.0 / n as f32;
    for i in 0..n {
        output[2 * i] *= scale;
        output[2 * i + 1] = -output[2 * i + 1] * scale;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut input = [0.0f32; 8];
        input[0] = 1.0;
        let mut out = [0.0f32; 16];
        fft(&input, &mut out, 8).unwrap();

        for k in 0..8 {
            assert!((out[2 * k] - 1.0).abs() < 1e-6);
            assert!(out[2 * k + 1].abs() < 1e-6);
        }
    }

    #[test]
    fn sine_energy_lands_in_its_bin() {
        let n = 8;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * i as f32 / n as f32).sin())
            .collect();
        let mut out = vec![0.0f32; 2 * n];
        fft(&input, &mut out, n).unwrap();

        // sin -> -i·n/2 at bin 1, +i·n/2 at bin n-1
        assert!((out[3] + 4.0).abs() < 1e-5);
        assert!((out[2 * (n - 1) + 1] - 4.0).abs() < 1e-5);
        assert!(out[0].abs() < 1e-5);
    }

    #[test]
    fn bit_reverse_permutes_indices() {
        let mut data: Vec<f32> = (0..8).flat_map(|i| [i as f32, 0.0]).collect();
        bit_reverse(&mut data, 8);
        let order: Vec<f32> = data.iter().step_by(2).copied().collect();
        assert_eq!(order, vec![0.0, 4.0, 2.0, 6.0, 1.0, 5.0, 3.0, 7.0]);
    }

    #[test]
    fn size_one_is_identity() {
        let mut out = [9.0f32; 2];
        fft(&[0.25], &mut out, 1).unwrap();
        assert_eq!(out, [0.25, 0.0]);
    }

    #[test]
    fn short_output_is_rejected() {
        let input = [0.0f32; 8];
        let mut out = [0.0f32; 15];
        let err = fft(&input, &mut out, 8).unwrap_err();
        assert!(matches!(err, Error::BufferLength { expected: 16, .. }));
    }
}
