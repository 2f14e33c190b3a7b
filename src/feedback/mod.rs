//! Audio feedback contract
//!
//! The engine never synthesises sound itself. It calls a `FeedbackService`
//! owned by the composition root; what the calls turn into (speakers, log
//! lines, a test recorder) is up to the implementation.

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Sink for discrete feedback cues
pub trait FeedbackService: Send + Sync {
    /// Ball passed a pocket divider; `amplitude` is in `[0, 1]`
    fn play_segment_click(&self, amplitude: f64);
    /// Celebratory sequence for a round the player is estimated to have won
    fn play_win(&self, amount: Decimal);
    /// Defeat sequence for a round the player is estimated to have lost
    fn play_lose(&self, amount: Decimal);
    /// Countdown and betting-closed tick
    fn play_tick(&self);
}

/// A cue as observed by a sink
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackCue {
    SegmentClick(f64),
    Win(Decimal),
    Lose(Decimal),
    Tick,
}

/// Discards every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFeedback;

impl FeedbackService for NullFeedback {
    fn play_segment_click(&self, _amplitude: f64) {}
    fn play_win(&self, _amount: Decimal) {}
    fn play_lose(&self, _amount: Decimal) {}
    fn play_tick(&self) {}
}

/// Renders cues as log lines, used by the headless binary
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl FeedbackService for LogFeedback {
    fn play_segment_click(&self, amplitude: f64) {
        debug!(amplitude, "click");
    }

    fn play_win(&self, amount: Decimal) {
        info!(%amount, "estimated win");
    }

    fn play_lose(&self, amount: Decimal) {
        info!(%amount, "estimated loss");
    }

    fn play_tick(&self) {
        debug!("tick");
    }
}

/// Keeps every cue in order
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    cues: Mutex<Vec<FeedbackCue>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<FeedbackCue> {
        self.cues.lock().clone()
    }

    pub fn clicks(&self) -> Vec<f64> {
        self.cues
            .lock()
            .iter()
            .filter_map(|cue| match cue {
                FeedbackCue::SegmentClick(amplitude) => Some(*amplitude),
                _ => None,
            })
            .collect()
    }

    /// Win and lose cues only
    pub fn verdicts(&self) -> Vec<FeedbackCue> {
        self.cues
            .lock()
            .iter()
            .filter(|cue| matches!(cue, FeedbackCue::Win(_) | FeedbackCue::Lose(_)))
            .cloned()
            .collect()
    }

    pub fn ticks(&self) -> usize {
        self.cues
            .lock()
            .iter()
            .filter(|cue| matches!(cue, FeedbackCue::Tick))
            .count()
    }

    pub fn clear(&self) {
        self.cues.lock().clear();
    }
}

impl FeedbackService for RecordingFeedback {
    fn play_segment_click(&self, amplitude: f64) {
        self.cues.lock().push(FeedbackCue::SegmentClick(amplitude));
    }

    fn play_win(&self, amount: Decimal) {
        self.cues.lock().push(FeedbackCue::Win(amount));
    }

    fn play_lose(&self, amount: Decimal) {
        self.cues.lock().push(FeedbackCue::Lose(amount));
    }

    fn play_tick(&self) {
        self.cues.lock().push(FeedbackCue::Tick);
    }
}

#[derive(Debug, Clone, Copy)]
struct VolumeSettings {
    enabled: bool,
    volume: f64,
}

/// Master switch and effects volume in front of another sink
pub struct VolumeControl {
    inner: Arc<dyn FeedbackService>,
    settings: RwLock<VolumeSettings>,
}

impl VolumeControl {
    pub fn new(inner: Arc<dyn FeedbackService>, enabled: bool, volume: f64) -> Self {
        Self {
            inner,
            settings: RwLock::new(VolumeSettings {
                enabled,
                volume: volume.clamp(0.0, 1.0),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings.write().enabled = enabled;
    }

    /// Set the effects volume, clamped to `[0, 1]`
    pub fn set_volume(&self, volume: f64) {
        self.settings.write().volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    }

    pub fn volume(&self) -> f64 {
        self.settings.read().volume
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.read().enabled
    }

    fn audible(&self) -> Option<f64> {
        let settings = *self.settings.read();
        (settings.enabled && settings.volume > 0.0).then_some(settings.volume)
    }
}

impl FeedbackService for VolumeControl {
    fn play_segment_click(&self, amplitude: f64) {
        if let Some(volume) = self.audible() {
            self.inner.play_segment_click(amplitude.clamp(0.0, 1.0) * volume);
        }
    }

    fn play_win(&self, amount: Decimal) {
        if self.audible().is_some() {
            self.inner.play_win(amount);
        }
    }

    fn play_lose(&self, amount: Decimal) {
        if self.audible().is_some() {
            self.inner.play_lose(amount);
        }
    }

    fn play_tick(&self) {
        if self.audible().is_some() {
            self.inner.play_tick();
        }
    }
}
