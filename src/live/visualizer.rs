//! Cosmetic audio-activity feed
//!
//! Five magnitude bars driven by capture volume and inbound speech. Nothing
//! in the pipeline reads these values back; they exist purely for display.

use std::sync::{Arc, Mutex};

/// Number of magnitude bars
pub const VISUALIZER_BARS: usize = 5;

/// Idle magnitude for every bar
pub const BASELINE_LEVEL: f32 = 20.0;

/// Shared handle to the visualizer state. Cloning is cheap; all clones
/// observe the same bars.
#[derive(Debug, Clone)]
pub struct VisualizerFeed {
    levels: Arc<Mutex<[f32; VISUALIZER_BARS]>>,
}

impl Default for VisualizerFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualizerFeed {
    pub fn new() -> Self {
        Self {
            levels: Arc::new(Mutex::new([BASELINE_LEVEL; VISUALIZER_BARS])),
        }
    }

    /// Randomize bars for microphone activity (range [10, 60))
    pub fn excite_capture(&self) {
        self.randomize(50.0, 10.0);
    }

    /// Randomize bars for inbound agent speech (range [20, 100))
    pub fn excite_playback(&self) {
        self.randomize(80.0, 20.0);
    }

    /// Return every bar to the idle baseline
    pub fn reset(&self) {
        if let Ok(mut levels) = self.levels.lock() {
            *levels = [BASELINE_LEVEL; VISUALIZER_BARS];
        }
    }

    /// Snapshot of the current bar magnitudes
    pub fn levels(&self) -> [f32; VISUALIZER_BARS] {
        self.levels
            .lock()
            .map(|l| *l)
            .unwrap_or([BASELINE_LEVEL; VISUALIZER_BARS])
    }

    /// Whether every bar sits at the idle baseline
    pub fn is_idle(&self) -> bool {
        self.levels().iter().all(|&l| l == BASELINE_LEVEL)
    }

    fn randomize(&self, scale: f32, offset: f32) {
        use rand::Rng;
        let mut rng = rand::rng();
        if let Ok(mut levels) = self.levels.lock() {
            for level in levels.iter_mut() {
                *level = rng.random_range(0.0..scale) + offset;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_baseline() {
        let feed = VisualizerFeed::new();
        assert!(feed.is_idle());
        assert_eq!(feed.levels(), [BASELINE_LEVEL; VISUALIZER_BARS]);
    }

    #[test]
    fn test_capture_excitation_range() {
        let feed = VisualizerFeed::new();
        feed.excite_capture();
        for level in feed.levels() {
            assert!((10.0..60.0).contains(&level), "level {} out of range", level);
        }
    }

    #[test]
    fn test_playback_excitation_range() {
        let feed = VisualizerFeed::new();
        feed.excite_playback();
        for level in feed.levels() {
            assert!((20.0..100.0).contains(&level), "level {} out of range", level);
        }
    }

    #[test]
    fn test_reset_returns_to_baseline() {
        let feed = VisualizerFeed::new();
        feed.excite_playback();
        feed.reset();
        assert!(feed.is_idle());
    }

    #[test]
    fn test_clones_share_state() {
        let feed = VisualizerFeed::new();
        let clone = feed.clone();
        feed.excite_playback();
        assert_eq!(feed.levels(), clone.levels());
    }
}
