use std::sync::atomic::{AtomicU8, Ordering};

/// Events published by the detector's worker thread
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    /// Confidence reached the threshold. The detector stays suppressed until `resume()`.
    WakeWordDetected { confidence: f32 },
    /// Human-readable description of a failed chunk or match
    Error { message: String },
}

/// Outcome of comparing one window of audio against the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionResult {
    Triggered { confidence: f32 },
    NoTrigger { confidence: f32 },
}

impl DetectionResult {
    pub fn from_confidence(confidence: f32, threshold: f32) -> Self {
        if confidence >= threshold {
            Self::Triggered { confidence }
        } else {
            Self::NoTrigger { confidence }
        }
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    pub fn confidence(&self) -> f32 {
        match *self {
            Self::Triggered { confidence } | Self::NoTrigger { confidence } => confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DetectorState {
    Idle = 0,
    Listening = 1,
    Matching = 2,
    Triggered = 3,
}

impl DetectorState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Listening,
            2 => Self::Matching,
            3 => Self::Triggered,
            _ => Self::Idle,
        }
    }
}

/// State shared between the capture side and the worker
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new(state: DetectorState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> DetectorState {
        DetectorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: DetectorState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from -> to` only if the current state is `from`
    pub(crate) fn transition(&self, from: DetectorState, to: DetectorState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_result_uses_inclusive_threshold() {
        assert!(DetectionResult::from_confidence(0.7, 0.7).is_trigger());
        assert!(!DetectionResult::from_confidence(0.69, 0.7).is_trigger());
        assert_eq!(DetectionResult::from_confidence(0.5, 0.7).confidence(), 0.5);
    }

    #[test]
    fn transition_only_from_expected_state() {
        let s = SharedState::new(DetectorState::Listening);
        assert!(!s.transition(DetectorState::Triggered, DetectorState::Listening));
        assert!(s.transition(DetectorState::Listening, DetectorState::Matching));
        assert_eq!(s.get(), DetectorState::Matching);
        s.set(DetectorState::Triggered);
        assert_eq!(s.get(), DetectorState::Triggered);
    }
}
