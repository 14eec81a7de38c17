//! Table-driven backend that processes four lanes per step.
//!
//! Lane blocks are fixed-size arrays so the compiler can lower them to SIMD
//! registers; the arithmetic per element is the same as the scalar path.
//! Tables are sized at construction. A request outside those sizes is reported
//! as a computation error, which the feature extractor answers by re-running
//! the frame on the scalar backend.

use super::dct::DctTable;
use super::fft::{bit_reverse, butterfly, check_len, check_size, load_real, twiddle};
use super::spectrum::hamming;
use super::{BackendKind, MelFilterBank, TransformBackend};
use crate::error::{Error, Result};
use crate::EPSILON;

const LANES: usize = 4;

#[derive(Debug, Clone)]
pub struct VectorizedBackend {
    max_size: usize,
    twiddle_re: Vec<f32>, // e^(-2πi·k/max_size), k < max_size/2
    twiddle_im: Vec<f32>,
    window: Vec<f32>,
    dct: DctTable,
}

impl VectorizedBackend {
    pub fn new(fft_size: usize, num_filters: usize, num_coefficients: usize) -> Result<Self> {
        check_size(fft_size)?;
        let half = fft_size / 2;
        let (twiddle_re, twiddle_im): (Vec<f32>, Vec<f32>) = (0..half).map(|k| twiddle(k, fft_size)).unzip();

        Ok(Self {
            max_size: fft_size,
            twiddle_re,
            twiddle_im,
            window: (0..fft_size).map(|i| hamming(i, fft_size)).collect(),
            dct: DctTable::new(num_filters, num_coefficients)?,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn fft_in_place(&self, data: &mut [f32], n: usize) -> Result<()> {
        if n > self.max_size {
            return Err(Error::Computation(format!(
                "twiddle table covers {} points, {} requested",
                self.max_size, n
            )));
        }
        bit_reverse(data, n);

        let mut len = 2;
        while len <= n {
            let half = len >> 1;
            let stride = self.max_size / len;
            let mut start = 0;
            while start < n {
                let mut j = 0;
                while j + LANES <= half {
                    self.butterfly_block(data, start + j, half, j, stride);
                    j += LANES;
                }
                while j < half {
                    let t = j * stride;
                    butterfly(data, start + j, start + j + half, self.twiddle_re[t], self.twiddle_im[t]);
                    j += 1;
                }
                start += len;
            }
            len <<= 1;
        }
        Ok(())
    }

    #[inline(always)]
    fn butterfly_block(&self, data: &mut [f32], first: usize, half: usize, j: usize, stride: usize) {
        let mut ar = [0.0f32; LANES];
        let mut ai = [0.0f32; LANES];
        let mut br = [0.0f32; LANES];
        let mut bi = [0.0f32; LANES];
        let mut wr = [0.0f32; LANES];
        let mut wi = [0.0f32; LANES];

        for l in 0..LANES {
            let a = first + l;
            let b = a + half;
            ar[l] = data[2 * a];
            ai[l] = data[2 * a + 1];
            br[l] = data[2 * b];
            bi[l] = data[2 * b + 1];
            wr[l] = self.twiddle_re[(j + l) * stride];
            wi[l] = self.twiddle_im[(j + l) * stride];
        }

        let mut tr = [0.0f32; LANES];
        let mut ti = [0.0f32; LANES];
        for l in 0..LANES {
            tr[l] = wr[l] * br[l] - wi[l] * bi[l];
            ti[l] = wr[l] * bi[l] + wi[l] * br[l];
        }

        for l in 0..LANES {
            let a = first + l;
            let b = a + half;
            data[2 * a] = ar[l] + tr[l];
            data[2 * a + 1] = ai[l] + ti[l];
            data[2 * b] = ar[l] - tr[l];
            data[2 * b + 1] = ai[l] - ti[l];
        }
    }
}

/// Four-lane dot product with a scalar tail
#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut acc = [0.0f32; LANES];
    let blocks = len / LANES;

    for (ca, cb) in a[..blocks * LANES]
        .chunks_exact(LANES)
        .zip(b[..blocks * LANES].chunks_exact(LANES))
    {
        for l in 0..LANES {
            acc[l] += ca[l] * cb[l];
        }
    }

    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    for i in blocks * LANES..len {
        sum += a[i] * b[i];
    }
    sum
}

impl TransformBackend for VectorizedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vectorized
    }

    fn fft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
        check_size(n)?;
        check_len("fft input", input.len(), n)?;
        check_len("fft output", output.len(), 2 * n)?;
        if n > self.max_size {
            return Err(Error::Computation(format!(
                "twiddle table covers {} points, {} requested",
                self.max_size, n
            )));
        }

        load_real(input, output, n);
        self.fft_in_place(output, n)
    }

    fn ifft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
        check_size(n)?;
        check_len("ifft input", input.len(), 2 * n)?;
        check_len("ifft output", output.len(), 2 * n)?;
        if n > self.max_size {
            return Err(Error::Computation(format!(
                "twiddle table covers {} points, {} requested",
                self.max_size, n
            )));
        }

        for (o, i) in output[..2 * n]
            .chunks_exact_mut(2)
            .zip(input[..2 * n].chunks_exact(2))
        {
            o[0] = i[0];
            o[1] = -i[1];
        }

        self.fft_in_place(output, n)?;

        let scale = 1.0 / n as f32;
        for pair in output[..2 * n].chunks_exact_mut(2) {
            pair[0] *= scale;
            pair[1] = -pair[1] * scale;
        }
        Ok(())
    }

    fn apply_hamming_window(&self, frame: &mut [f32]) -> Result<()> {
        if frame.len() != self.window.len() {
            return Err(Error::Computation(format!(
                "window table has {} points, frame has {}",
                self.window.len(),
                frame.len()
            )));
        }

        let split = frame.len() / LANES * LANES;
        let (head, tail) = frame.split_at_mut(split);
        for (x, w) in head
            .chunks_exact_mut(LANES)
            .zip(self.window[..split].chunks_exact(LANES))
        {
            for l in 0..LANES {
                x[l] *= w[l];
            }
        }
        for (x, w) in tail.iter_mut().zip(&self.window[split..]) {
            *x *= *w;
        }
        Ok(())
    }

    fn power_spectrum(&self, spectrum: &[f32], power: &mut [f32], n: usize) -> Result<()> {
        check_size(n)?;
        check_len("spectrum", spectrum.len(), 2 * n)?;
        let bins = n / 2 + 1;
        check_len("power", power.len(), bins)?;

        let blocks = bins / LANES;
        for b in 0..blocks {
            let base = b * LANES;
            let mut out = [0.0f32; LANES];
            for l in 0..LANES {
                let re = spectrum[2 * (base + l)];
                let im = spectrum[2 * (base + l) + 1];
                out[l] = re * re + im * im + EPSILON;
            }
            power[base..base + LANES].copy_from_slice(&out);
        }
        for k in blocks * LANES..bins {
            let re = spectrum[2 * k];
            let im = spectrum[2 * k + 1];
            power[k] = re * re + im * im + EPSILON;
        }
        Ok(())
    }

    fn apply_mel_filter_bank(&self, power: &[f32], bank: &MelFilterBank, energies: &mut [f32]) -> Result<()> {
        bank.check_io(power, energies)?;
        let bins = bank.num_bins();

        for (i, out) in energies[..bank.num_filters()].iter_mut().enumerate() {
            let energy = dot(&power[..bins], bank.weights(i));
            *out = (energy + EPSILON).ln();
        }
        Ok(())
    }

    fn dct2(&self, input: &[f32], output: &mut [f32]) -> Result<()> {
        let (n, m) = self.dct.shape();
        if input.len() != n || output.len() > m {
            return Err(Error::Computation(format!(
                "dct table is {}x{}, requested {}x{}",
                m,
                n,
                output.len(),
                input.len()
            )));
        }

        for (k, out) in output.iter_mut().enumerate() {
            *out = dot(input, self.dct.row(k));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_fft_is_a_computation_error() {
        let backend = VectorizedBackend::new(256, 26, 13).unwrap();
        let input = vec![0.0f32; 1024];
        let mut out = vec![1.5f32; 2048];
        let err = backend.fft(&input, &mut out, 1024).unwrap_err();

        assert!(matches!(err, Error::Computation(_)));
        assert!(out.iter().all(|&x| x == 1.5));
    }

    #[test]
    fn smaller_transforms_reuse_the_table() {
        let backend = VectorizedBackend::new(1024, 26, 13).unwrap();
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).cos()).collect();
        let mut fast = vec![0.0f32; 128];
        let mut reference = vec![0.0f32; 128];

        backend.fft(&input, &mut fast, 64).unwrap();
        super::super::fft::fft(&input, &mut reference, 64).unwrap();

        for (a, b) in fast.iter().zip(&reference) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn window_length_mismatch_is_reported() {
        let backend = VectorizedBackend::new(512, 26, 13).unwrap();
        let mut frame = vec![1.0f32; 1024];
        assert!(backend.apply_hamming_window(&mut frame).is_err());
    }

    #[test]
    fn dot_handles_tails() {
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [1.0f32; 6];
        assert_eq!(dot(&a, &b), 21.0);
    }
}
