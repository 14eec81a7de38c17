//! Reference patterns for a trigger phrase.
//!
//! A phrase is split into sub-word units (lower-cased, whitespace separated)
//! and each unit is turned into one feature vector by a [`PatternProvider`].
//! Patterns are built once and never change afterwards.

use dasp::{signal, Sample, Signal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureVector};

/// Source of reference features for sub-word units
pub trait PatternProvider: Send + Sync {
    fn unit_features(&self, unit: &str, extractor: &FeatureExtractor) -> Result<FeatureVector>;
}

/// Deterministic stand-in for recorded enrollment audio.
///
/// Each unit hashes to a seed that picks a few partials; their sum is shaped by
/// a Hann envelope so a frame starts and ends at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticPatternProvider;

const PARTIALS: usize = 3;
const PEAK: f64 = 0.6;

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

impl SyntheticPatternProvider {
    /// One frame of reference audio for `unit`
    pub fn reference_audio(&self, unit: &str, frame_size: usize, sample_rate: u32) -> Vec<i16> {
        let mut rng = StdRng::seed_from_u64(fnv1a(unit));
        let top = (sample_rate as f64 / 2.0 * 0.95).max(200.0);

        let mut mix = vec![0.0f64; frame_size];
        for _ in 0..PARTIALS {
            let hz = rng.gen_range(150.0..top);
            let gain = rng.gen_range(0.2..1.0);
            let partial = signal::rate(sample_rate as f64).const_hz(hz).sine();
            for (m, s) in mix.iter_mut().zip(partial.take(frame_size)) {
                *m += gain * s;
            }
        }

        let peak = mix.iter().fold(0.0f64, |p, s| p.max(s.abs()));
        let scale = if peak > 0.0 { PEAK / peak } else { 0.0 };
        let last = frame_size.saturating_sub(1).max(1) as f64;

        mix.iter()
            .enumerate()
            .map(|(i, &s)| {
                let env = (std::f64::consts::PI * i as f64 / last).sin().powi(2);
                (s * scale * env).to_sample::<i16>()
            })
            .collect()
    }

    /// Reference audio of every unit in `phrase`, back to back
    pub fn phrase_audio(&self, phrase: &str, frame_size: usize, sample_rate: u32) -> Vec<i16> {
        split_units(phrase)
            .iter()
            .flat_map(|unit| self.reference_audio(unit, frame_size, sample_rate))
            .collect()
    }
}

impl PatternProvider for SyntheticPatternProvider {
    fn unit_features(&self, unit: &str, extractor: &FeatureExtractor) -> Result<FeatureVector> {
        let audio = self.reference_audio(unit, extractor.frame_size(), extractor.sample_rate());
        let mut conditioned = Vec::with_capacity(audio.len());
        extractor.condition(&audio, &mut conditioned);
        extractor.extract_features(&conditioned)
    }
}

/// Lower-cased, whitespace-separated units of a phrase
pub fn split_units(phrase: &str) -> Vec<String> {
    phrase.split_whitespace().map(str::to_lowercase).collect()
}

/// Ordered reference features, one per unit
#[derive(Debug, Clone)]
pub struct PhoneticPattern {
    units: Vec<String>,
    features: Vec<FeatureVector>,
}

impl PhoneticPattern {
    pub fn build(phrase: &str, provider: &dyn PatternProvider, extractor: &FeatureExtractor) -> Result<Self> {
        let units = split_units(phrase);
        if units.is_empty() {
            return Err(Error::Config("trigger phrase has no units".into()));
        }

        let features = units
            .iter()
            .map(|unit| provider.unit_features(unit, extractor))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(units = ?units, "phonetic pattern built");
        Ok(Self { units, features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::features::similarity;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&DetectorConfig::default()).unwrap()
    }

    #[test]
    fn units_are_lowercased_and_split() {
        assert_eq!(split_units("  Hey   Wake\tUp "), vec!["hey", "wake", "up"]);
        assert!(split_units(" \n").is_empty());
    }

    #[test]
    fn reference_audio_is_deterministic_and_enveloped() {
        let p = SyntheticPatternProvider;
        let a = p.reference_audio("hey", 1024, 16_000);
        let b = p.reference_audio("hey", 1024, 16_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1024);
        assert_eq!(a[0], 0);
        assert_eq!(a[1023], 0);
        assert!(a.iter().any(|&s| s.unsigned_abs() > 8000));
        assert_ne!(a, p.reference_audio("wake", 1024, 16_000));
    }

    #[test]
    fn pattern_has_one_entry_per_unit() {
        let fx = extractor();
        let pattern = PhoneticPattern::build("Hey Wake", &SyntheticPatternProvider, &fx).unwrap();
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.units(), ["hey", "wake"]);
        assert!(pattern.features().iter().all(|f| f.len() == 13));
        assert!(similarity(&pattern.features()[0], &pattern.features()[1]) < 0.999);
    }

    #[test]
    fn empty_phrase_is_rejected() {
        let fx = extractor();
        let err = PhoneticPattern::build("   ", &SyntheticPatternProvider, &fx).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn phrase_audio_concatenates_units() {
        let audio = SyntheticPatternProvider.phrase_audio("hey wake", 512, 16_000);
        assert_eq!(audio.len(), 1024);
        assert_eq!(&audio[512..], SyntheticPatternProvider.reference_audio("wake", 512, 16_000));
    }
}
