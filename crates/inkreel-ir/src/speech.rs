//! Narration length estimates.

/// Estimates how long spoken narration of a text takes.
pub trait SpeechEstimator: Send + Sync {
    /// Duration in milliseconds at the given rate multiplier (1.0 = normal).
    fn estimate_ms(&self, text: &str, rate: f32) -> u64;
}

/// Words-per-minute heuristic used when no synthesizer is wired in.
#[derive(Debug, Clone, Copy)]
pub struct WordRateEstimator {
    pub words_per_minute: f32,
}

impl Default for WordRateEstimator {
    fn default() -> Self {
        Self {
            words_per_minute: 150.0,
        }
    }
}

impl SpeechEstimator for WordRateEstimator {
    fn estimate_ms(&self, text: &str, rate: f32) -> u64 {
        let words = text.split_whitespace().count();
        if words == 0 {
            return 0;
        }
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let wpm = self.words_per_minute.max(1.0) * rate;
        (words as f64 * 60_000.0 / wpm as f64).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_silent() {
        assert_eq!(WordRateEstimator::default().estimate_ms("   ", 1.0), 0);
    }

    #[test]
    fn test_rate_scales_duration() {
        let est = WordRateEstimator::default();
        let normal = est.estimate_ms("one two three", 1.0);
        assert_eq!(normal, 1_200);
        assert_eq!(est.estimate_ms("one two three", 2.0), 600);
        assert_eq!(est.estimate_ms("one two three", 0.0), normal);
    }
}
