use std::sync::Arc;

use crate::config::BackendPreference;
use crate::error::Result;

// Sub-modules
pub mod dct;
pub mod fft;
pub mod mel;
pub mod scalar;
pub mod spectrum;
pub mod vectorized;

// Re-exports
pub use mel::{FilterEdges, MelFilterBank};
pub use scalar::ScalarBackend;
pub use vectorized::VectorizedBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Scalar,
    Vectorized,
}

/// Numeric kernels behind the MFCC pipeline.
///
/// Spectra are interleaved `[re, im, ..]` buffers of `2·n` values. Every method
/// validates sizes before writing, so an `Err` leaves the output untouched.
pub trait TransformBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Forward FFT of `n` real samples
    fn fft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()>;

    /// Inverse FFT of an interleaved spectrum
    fn ifft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()>;

    fn apply_hamming_window(&self, frame: &mut [f32]) -> Result<()>;

    /// Fills `n/2 + 1` bins of `power`
    fn power_spectrum(&self, spectrum: &[f32], power: &mut [f32], n: usize) -> Result<()>;

    /// Log Mel energies, one per filter
    fn apply_mel_filter_bank(&self, power: &[f32], bank: &MelFilterBank, energies: &mut [f32]) -> Result<()>;

    /// DCT-II of `input` into `output.len()` coefficients
    fn dct2(&self, input: &[f32], output: &mut [f32]) -> Result<()>;
}

#[cfg(target_arch = "x86_64")]
fn probe() -> bool {
    is_x86_feature_detected!("sse2")
}

#[cfg(target_arch = "aarch64")]
fn probe() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn probe() -> bool {
    false
}

/// Whether the CPU has the vector unit the four-lane backend is written for
pub fn vectorized_supported() -> bool {
    probe()
}

/// Picks the backend for a pipeline shape
pub fn select_backend(
    preference: BackendPreference,
    fft_size: usize,
    num_filters: usize,
    num_coefficients: usize,
) -> Arc<dyn TransformBackend> {
    let want_vectorized = match preference {
        BackendPreference::Scalar => false,
        BackendPreference::Vectorized => true,
        BackendPreference::Auto => vectorized_supported(),
    };

    if want_vectorized {
        match VectorizedBackend::new(fft_size, num_filters, num_coefficients) {
            Ok(backend) => {
                tracing::debug!(fft_size, "using vectorized transform backend");
                return Arc::new(backend);
            }
            Err(e) => {
                tracing::warn!(error = %e, "vectorized backend unavailable, using scalar");
            }
        }
    }

    tracing::debug!(fft_size, "using scalar transform backend");
    Arc::new(ScalarBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::EPSILON;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn backends(max: usize) -> Vec<Box<dyn TransformBackend>> {
        vec![
            Box::new(ScalarBackend),
            Box::new(VectorizedBackend::new(max, 26, 13).unwrap()),
        ]
    }

    fn random_signal(rng: &mut StdRng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    #[test]
    fn ifft_inverts_fft_for_all_sizes() {
        let mut rng = StdRng::seed_from_u64(7);
        for backend in backends(4096) {
            let mut n = 1;
            while n <= 4096 {
                let x = random_signal(&mut rng, n);
                let mut spectrum = vec![0.0f32; 2 * n];
                let mut back = vec![0.0f32; 2 * n];
                backend.fft(&x, &mut spectrum, n).unwrap();
                backend.ifft(&spectrum, &mut back, n).unwrap();

                let peak = x.iter().fold(1.0f32, |m, v| m.max(v.abs()));
                for i in 0..n {
                    let err = (back[2 * i] - x[i]).abs();
                    assert!(err <= 1e-4 * peak, "{:?} n={n} i={i} err={err}", backend.kind());
                    assert!(back[2 * i + 1].abs() <= 1e-4 * peak);
                }
                n <<= 1;
            }
        }
    }

    #[test]
    fn power_spectrum_satisfies_parseval() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 1024;
        let x = random_signal(&mut rng, n);
        let time_energy: f64 = x.iter().map(|&v| (v as f64) * (v as f64)).sum();

        for backend in backends(n) {
            let mut spectrum = vec![0.0f32; 2 * n];
            let mut power = vec![0.0f32; n / 2 + 1];
            backend.fft(&x, &mut spectrum, n).unwrap();
            backend.power_spectrum(&spectrum, &mut power, n).unwrap();

            // bins 1..n/2 stand for their mirrored twins as well
            let p = |k: usize| (power[k] - EPSILON) as f64;
            let mut freq_energy = p(0) + p(n / 2);
            for k in 1..n / 2 {
                freq_energy += 2.0 * p(k);
            }
            freq_energy /= n as f64;

            let rel = (freq_energy - time_energy).abs() / time_energy;
            assert!(rel < 1e-4, "{:?} relative error {rel}", backend.kind());
        }
    }

    #[test]
    fn invalid_size_is_rejected_without_writing() {
        let input = vec![0.5f32; 1000];
        for backend in backends(1024) {
            let mut out = vec![-3.0f32; 2000];
            let err = backend.fft(&input, &mut out, 1000).unwrap_err();
            assert!(matches!(err, Error::InvalidSize(1000)));
            assert!(err.is_configuration());
            assert!(out.iter().all(|&v| v == -3.0));

            assert!(matches!(backend.fft(&input, &mut out, 0), Err(Error::InvalidSize(0))));
            assert!(matches!(backend.ifft(&out.clone(), &mut out, 1000), Err(Error::InvalidSize(1000))));
        }
    }

    #[test]
    fn backends_agree_on_every_stage() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 1024;
        let bank = MelFilterBank::new(26, n, 16_000).unwrap();
        let scalar = ScalarBackend;
        let fast = VectorizedBackend::new(n, 26, 13).unwrap();

        let mut frame_a = random_signal(&mut rng, n);
        let mut frame_b = frame_a.clone();
        scalar.apply_hamming_window(&mut frame_a).unwrap();
        fast.apply_hamming_window(&mut frame_b).unwrap();
        for (a, b) in frame_a.iter().zip(&frame_b) {
            assert!((a - b).abs() < 1e-6);
        }

        let mut spec_a = vec![0.0f32; 2 * n];
        let mut spec_b = vec![0.0f32; 2 * n];
        scalar.fft(&frame_a, &mut spec_a, n).unwrap();
        fast.fft(&frame_a, &mut spec_b, n).unwrap();
        for (a, b) in spec_a.iter().zip(&spec_b) {
            assert!((a - b).abs() < 1e-3);
        }

        let mut pow_a = vec![0.0f32; n / 2 + 1];
        let mut pow_b = vec![0.0f32; n / 2 + 1];
        scalar.power_spectrum(&spec_a, &mut pow_a, n).unwrap();
        fast.power_spectrum(&spec_a, &mut pow_b, n).unwrap();
        assert_eq!(pow_a, pow_b);

        let mut mel_a = vec![0.0f32; 26];
        let mut mel_b = vec![0.0f32; 26];
        scalar.apply_mel_filter_bank(&pow_a, &bank, &mut mel_a).unwrap();
        fast.apply_mel_filter_bank(&pow_a, &bank, &mut mel_b).unwrap();
        for (a, b) in mel_a.iter().zip(&mel_b) {
            assert!((a - b).abs() < 1e-4);
        }

        let mut dct_a = vec![0.0f32; 13];
        let mut dct_b = vec![0.0f32; 13];
        scalar.dct2(&mel_a, &mut dct_a).unwrap();
        fast.dct2(&mel_a, &mut dct_b).unwrap();
        for (a, b) in dct_a.iter().zip(&dct_b) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn selection_honours_preference() {
        let scalar = select_backend(BackendPreference::Scalar, 1024, 26, 13);
        assert_eq!(scalar.kind(), BackendKind::Scalar);

        let fast = select_backend(BackendPreference::Vectorized, 1024, 26, 13);
        assert_eq!(fast.kind(), BackendKind::Vectorized);

        // unusable shape falls back instead of failing
        let fallback = select_backend(BackendPreference::Vectorized, 1024, 4, 13);
        assert_eq!(fallback.kind(), BackendKind::Scalar);
    }
}
