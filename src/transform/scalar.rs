use super::{dct, fft, mel, spectrum, BackendKind, MelFilterBank, TransformBackend};
use crate::error::Result;

/// Reference implementation. Evaluates every twiddle, window and cosine on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

impl TransformBackend for ScalarBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Scalar
    }

    fn fft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
        fft::fft(input, output, n)
    }

    fn ifft(&self, input: &[f32], output: &mut [f32], n: usize) -> Result<()> {
        fft::ifft(input, output, n)
    }

    fn apply_hamming_window(&self, frame: &mut [f32]) -> Result<()> {
        spectrum::apply_hamming_window(frame);
        Ok(())
    }

    fn power_spectrum(&self, spectrum: &[f32], power: &mut [f32], n: usize) -> Result<()> {
        spectrum::power_spectrum(spectrum, power, n)
    }

    fn apply_mel_filter_bank(&self, power: &[f32], bank: &MelFilterBank, energies: &mut [f32]) -> Result<()> {
        mel::apply_mel_filter_bank(power, bank, energies)
    }

    fn dct2(&self, input: &[f32], output: &mut [f32]) -> Result<()> {
        dct::dct2(input, output)
    }
}
