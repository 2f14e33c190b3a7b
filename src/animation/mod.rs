//! Wheel and ball animation
//!
//! The animation is an owned `AnimationState` advanced by the pure `step`
//! function. `WheelAnimationEngine` wraps the state for the client loop,
//! accepts phase commands and forwards segment clicks to the feedback sink.

pub mod geometry;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AnimationConfig, Config};
use crate::error::{Error, Result};
use crate::feedback::FeedbackService;
use crate::protocol::table::pocket_index;

pub use geometry::{
    ball_rest_angle, normalize_degrees, pocket_angle, pointer_to_ball_angle, segment_angle,
    segment_under_ball, wheel_alignment_angle, SEGMENT_ANGLE,
};

/// Click amplitude while free spinning
const SPIN_CLICK_AMPLITUDE: f64 = 1.0;
/// Click amplitude at the start of a settle and its decaying share
const SETTLE_CLICK_FLOOR: f64 = 0.3;
const SETTLE_CLICK_DECAY: f64 = 0.5;

/// Animation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationPhase {
    Idle,
    Spinning,
    Settling,
}

/// Fixed motion parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationParams {
    /// Wheel counter-rotation speed in degrees per second
    pub wheel_speed: f64,
    /// Ball co-rotation speed in degrees per second
    pub ball_speed: f64,
    /// Settle duration in seconds
    pub settle_secs: f64,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub wheel_extra_turns: u32,
    pub ball_extra_turns: u32,
}

impl From<&AnimationConfig> for AnimationParams {
    fn from(config: &AnimationConfig) -> Self {
        Self {
            wheel_speed: config.wheel_speed,
            ball_speed: config.ball_speed,
            settle_secs: config.settle_duration.as_secs_f64(),
            outer_radius: config.outer_radius,
            inner_radius: config.inner_radius,
            wheel_extra_turns: config.wheel_extra_turns,
            ball_extra_turns: config.ball_extra_turns,
        }
    }
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self::from(&Config::default().animation)
    }
}

/// Interpolation endpoints computed on the first settling frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlePlan {
    pub start_wheel: f64,
    pub start_ball: f64,
    pub target_wheel: f64,
    pub target_ball: f64,
    /// Seconds since the plan was fixed
    pub elapsed: f64,
}

impl SettlePlan {
    /// Fix the settle endpoints for a winning pocket
    pub fn new(wheel_angle: f64, ball_angle: f64, segment_index: usize, params: &AnimationParams) -> Self {
        Self {
            start_wheel: wheel_angle,
            start_ball: ball_angle,
            target_wheel: geometry::wheel_settle_target(
                wheel_angle,
                segment_angle(segment_index),
                params.wheel_extra_turns,
            ),
            target_ball: geometry::ball_settle_target(ball_angle, params.ball_extra_turns),
            elapsed: 0.0,
        }
    }
}

/// Complete animation state
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    pub phase: AnimationPhase,
    pub wheel_angle: f64,
    pub ball_angle: f64,
    pub ball_radius: f64,
    pub last_crossed_segment: Option<usize>,
    /// Winning number of the current or last settle
    pub winning_number: Option<u8>,
    /// `None` until the first settling frame runs
    pub settle: Option<SettlePlan>,
}

impl AnimationState {
    pub fn new(params: &AnimationParams) -> Self {
        Self {
            phase: AnimationPhase::Idle,
            wheel_angle: 0.0,
            ball_angle: ball_rest_angle(),
            ball_radius: params.outer_radius,
            last_crossed_segment: None,
            winning_number: None,
            settle: None,
        }
    }

    /// Enter spinning, from any phase
    pub fn enter_spinning(&mut self, params: &AnimationParams) {
        self.phase = AnimationPhase::Spinning;
        self.ball_radius = params.outer_radius;
        self.settle = None;
        self.winning_number = None;
        self.last_crossed_segment = None;
    }

    /// Enter settling towards `winning_number`
    ///
    /// The plan itself is computed lazily on the next `step`.
    pub fn enter_settling(&mut self, winning_number: Option<u8>) -> Result<()> {
        let number = winning_number
            .ok_or_else(|| Error::GuardViolation("settle requested without a winning number".into()))?;
        if pocket_index(number).is_none() {
            return Err(Error::GuardViolation(format!("{} is not on the wheel", number)));
        }
        self.phase = AnimationPhase::Settling;
        self.winning_number = Some(number);
        self.settle = None;
        Ok(())
    }

    /// Segment of the ball relative to the wheel face, for crossing detection
    pub fn segment(&self) -> usize {
        segment_under_ball(self.ball_angle, self.wheel_angle)
    }

    fn track_crossing(&mut self, amplitude: f64, events: &mut Vec<AnimationEvent>) {
        let segment = self.segment();
        if self.last_crossed_segment.is_some_and(|last| last != segment) {
            events.push(AnimationEvent::SegmentCrossed { segment, amplitude });
        }
        self.last_crossed_segment = Some(segment);
    }
}

/// Discrete outputs of a step
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    SegmentCrossed { segment: usize, amplitude: f64 },
    SettleCompleted { winning_number: u8 },
}

fn ease_out(progress: f64) -> f64 {
    progress * (2.0 - progress)
}

/// Advance the animation by `dt` seconds
pub fn step(
    mut state: AnimationState,
    dt: f64,
    params: &AnimationParams,
) -> (AnimationState, Vec<AnimationEvent>) {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    let mut events = Vec::new();

    match state.phase {
        AnimationPhase::Idle => {}
        AnimationPhase::Spinning => {
            state.wheel_angle -= params.wheel_speed * dt;
            state.ball_angle += params.ball_speed * dt;
            state.track_crossing(SPIN_CLICK_AMPLITUDE, &mut events);
        }
        AnimationPhase::Settling => {
            let Some(number) = state.winning_number else {
                state.phase = AnimationPhase::Idle;
                return (state, events);
            };

            let plan = match state.settle {
                Some(mut plan) => {
                    plan.elapsed += dt;
                    plan
                }
                None => {
                    let index = pocket_index(number).unwrap_or_default();
                    SettlePlan::new(state.wheel_angle, state.ball_angle, index, params)
                }
            };
            state.settle = Some(plan);

            let progress = if params.settle_secs > 0.0 {
                (plan.elapsed / params.settle_secs).min(1.0)
            } else {
                1.0
            };
            let eased = ease_out(progress);

            if progress >= 1.0 {
                state.wheel_angle = plan.target_wheel;
                state.ball_angle = plan.target_ball;
                state.ball_radius = params.inner_radius;
                state.last_crossed_segment = Some(state.segment());
                state.phase = AnimationPhase::Idle;
                events.push(AnimationEvent::SettleCompleted { winning_number: number });
            } else {
                state.wheel_angle =
                    plan.start_wheel + (plan.target_wheel - plan.start_wheel) * eased;
                state.ball_angle = plan.start_ball + (plan.target_ball - plan.start_ball) * eased;
                state.ball_radius =
                    params.outer_radius - (params.outer_radius - params.inner_radius) * eased;
                let amplitude = SETTLE_CLICK_FLOOR + (1.0 - progress) * SETTLE_CLICK_DECAY;
                state.track_crossing(amplitude, &mut events);
            }
        }
    }

    (state, events)
}

/// Snapshot published to renderers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WheelFrame {
    pub phase: AnimationPhase,
    pub wheel_angle: f64,
    pub ball_angle: f64,
    pub ball_radius: f64,
}

impl WheelFrame {
    /// Ball position relative to the wheel centre, screen axes (y down)
    pub fn ball_position(&self) -> (f64, f64) {
        let radians = self.ball_angle.to_radians();
        (radians.cos() * self.ball_radius, radians.sin() * self.ball_radius)
    }
}

impl From<&AnimationState> for WheelFrame {
    fn from(state: &AnimationState) -> Self {
        Self {
            phase: state.phase,
            wheel_angle: state.wheel_angle,
            ball_angle: state.ball_angle,
            ball_radius: state.ball_radius,
        }
    }
}

/// Stateful driver around `step`
pub struct WheelAnimationEngine {
    state: AnimationState,
    params: AnimationParams,
    feedback: Arc<dyn FeedbackService>,
}

impl WheelAnimationEngine {
    pub fn new(params: AnimationParams, feedback: Arc<dyn FeedbackService>) -> Self {
        Self {
            state: AnimationState::new(&params),
            params,
            feedback,
        }
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn phase(&self) -> AnimationPhase {
        self.state.phase
    }

    pub fn frame(&self) -> WheelFrame {
        WheelFrame::from(&self.state)
    }

    pub fn start_spin(&mut self) {
        if self.state.phase != AnimationPhase::Idle {
            debug!(phase = ?self.state.phase, "spin restarted");
        }
        self.state.enter_spinning(&self.params);
        info!("wheel spinning");
    }

    /// Begin converging on `winning_number`; rejected without a valid number
    pub fn start_settle(&mut self, winning_number: Option<u8>) -> Result<()> {
        self.state.enter_settling(winning_number)?;
        info!(winning_number = ?winning_number, "wheel settling");
        Ok(())
    }

    /// Stop a free spin in place; settles are left to finish
    pub fn halt_spin(&mut self) -> bool {
        if self.state.phase == AnimationPhase::Spinning {
            self.state.phase = AnimationPhase::Idle;
            debug!("spin halted");
            true
        } else {
            false
        }
    }

    /// Advance by `elapsed`; returns the winning number when a settle completes
    pub fn advance(&mut self, elapsed: Duration) -> Option<u8> {
        let state = std::mem::replace(&mut self.state, AnimationState::new(&self.params));
        let (next, events) = step(state, elapsed.as_secs_f64(), &self.params);
        self.state = next;

        let mut completed = None;
        for event in events {
            match event {
                AnimationEvent::SegmentCrossed { amplitude, .. } => {
                    self.feedback.play_segment_click(amplitude)
                }
                AnimationEvent::SettleCompleted { winning_number } => {
                    info!(winning_number, "wheel at rest");
                    completed = Some(winning_number);
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;
    use crate::protocol::table::WHEEL_ORDER;
    use geometry::circular_distance;

    const EPS: f64 = 1e-6;

    fn params() -> AnimationParams {
        AnimationParams::default()
    }

    /// Pocket whose leading edge sits under the pointer
    fn pocket_at_pointer(state: &AnimationState) -> usize {
        let from_pointer = normalize_degrees(state.ball_angle - ball_rest_angle() - state.wheel_angle);
        (from_pointer / SEGMENT_ANGLE).round() as usize % WHEEL_ORDER.len()
    }

    fn run_settle(mut state: AnimationState, params: &AnimationParams) -> AnimationState {
        for _ in 0..10_000 {
            let (next, events) = step(state, 1.0 / 60.0, params);
            state = next;
            if events
                .iter()
                .any(|e| matches!(e, AnimationEvent::SettleCompleted { .. }))
            {
                return state;
            }
        }
        panic!("settle never completed");
    }

    #[test]
    fn test_idle_is_frozen() {
        let p = params();
        let state = AnimationState::new(&p);
        let (next, events) = step(state.clone(), 0.5, &p);
        assert_eq!(next, state);
        assert!(events.is_empty());
    }

    #[test]
    fn test_spinning_moves_in_opposite_senses() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_spinning(&p);
        let (next, _) = step(state, 0.5, &p);
        assert!((next.wheel_angle - -90.0).abs() < EPS);
        assert!((next.ball_angle - (270.0 + 160.0)).abs() < EPS);
    }

    #[test]
    fn test_spinning_clicks_at_full_amplitude() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_spinning(&p);
        let mut clicks = Vec::new();
        for _ in 0..60 {
            let (next, events) = step(state, 1.0 / 60.0, &p);
            state = next;
            clicks.extend(events.into_iter().filter_map(|e| match e {
                AnimationEvent::SegmentCrossed { amplitude, .. } => Some(amplitude),
                _ => None,
            }));
        }
        // 500 degrees of relative motion in one second
        assert!(clicks.len() >= 12);
        assert!(clicks.iter().all(|a| *a == 1.0));
    }

    #[test]
    fn test_settle_without_number_is_rejected() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_spinning(&p);
        assert!(matches!(
            state.enter_settling(None),
            Err(Error::GuardViolation(_))
        ));
        assert!(state.enter_settling(Some(37)).is_err());
        assert_eq!(state.phase, AnimationPhase::Spinning);
    }

    #[test]
    fn test_settle_converges_on_every_pocket() {
        let p = params();
        for (index, number) in WHEEL_ORDER.iter().enumerate() {
            let mut state = AnimationState::new(&p);
            state.enter_spinning(&p);
            let (spun, _) = step(state, 1.37 + index as f64 * 0.11, &p);
            let mut state = spun;
            state.enter_settling(Some(*number)).unwrap();
            let done = run_settle(state, &p);

            assert_eq!(done.phase, AnimationPhase::Idle);
            assert_eq!(done.ball_radius, p.inner_radius);
            assert!(circular_distance(done.wheel_angle + segment_angle(index), 0.0) < EPS);
            assert!(circular_distance(done.ball_angle, ball_rest_angle()) < EPS);
            assert_eq!(pocket_at_pointer(&done), index);
        }
    }

    #[test]
    fn test_settle_plan_is_fixed_once_initialised() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_settling(Some(17)).unwrap();
        let (first, _) = step(state, 1.0 / 60.0, &p);
        let plan = first.settle.unwrap();
        assert_eq!(plan.elapsed, 0.0);
        assert_eq!(first.wheel_angle, plan.start_wheel);

        let (second, _) = step(first, 1.0, &p);
        let later = second.settle.unwrap();
        assert_eq!(later.target_wheel, plan.target_wheel);
        assert_eq!(later.target_ball, plan.target_ball);
        assert!((later.elapsed - 1.0).abs() < EPS);
    }

    #[test]
    fn test_settle_clicks_decay() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_settling(Some(26)).unwrap();
        let mut amplitudes = Vec::new();
        loop {
            let (next, events) = step(state, 1.0 / 60.0, &p);
            state = next;
            let mut done = false;
            for event in events {
                match event {
                    AnimationEvent::SegmentCrossed { amplitude, .. } => amplitudes.push(amplitude),
                    AnimationEvent::SettleCompleted { .. } => done = true,
                }
            }
            if done {
                break;
            }
        }
        assert!(!amplitudes.is_empty());
        assert!(amplitudes.windows(2).all(|w| w[1] <= w[0]));
        assert!(amplitudes.iter().all(|a| (0.3..=0.8).contains(a)));
    }

    #[test]
    fn test_spin_during_settle_resets() {
        let p = params();
        let mut state = AnimationState::new(&p);
        state.enter_settling(Some(5)).unwrap();
        let (mid, _) = step(state, 0.1, &p);
        let (mut mid, _) = step(mid, 1.0, &p);
        assert!(mid.ball_radius < p.outer_radius);

        mid.enter_spinning(&p);
        assert_eq!(mid.phase, AnimationPhase::Spinning);
        assert_eq!(mid.ball_radius, p.outer_radius);
        assert!(mid.settle.is_none());
    }

    #[test]
    fn test_engine_forwards_clicks_and_reports_completion() {
        let recorder = Arc::new(RecordingFeedback::new());
        let mut engine = WheelAnimationEngine::new(params(), recorder.clone());
        engine.start_spin();
        for _ in 0..30 {
            assert_eq!(engine.advance(Duration::from_millis(16)), None);
        }
        assert!(!recorder.clicks().is_empty());

        engine.start_settle(Some(0)).unwrap();
        let mut completed = None;
        for _ in 0..400 {
            if let Some(n) = engine.advance(Duration::from_millis(16)) {
                completed = Some(n);
                break;
            }
        }
        assert_eq!(completed, Some(0));
        assert_eq!(engine.phase(), AnimationPhase::Idle);
        assert_eq!(engine.advance(Duration::from_millis(16)), None);
    }

    #[test]
    fn test_halt_spin_leaves_settle_alone() {
        let mut engine = WheelAnimationEngine::new(params(), Arc::new(RecordingFeedback::new()));
        engine.start_spin();
        assert!(engine.halt_spin());
        assert_eq!(engine.phase(), AnimationPhase::Idle);

        engine.start_settle(Some(3)).unwrap();
        assert!(!engine.halt_spin());
        assert_eq!(engine.phase(), AnimationPhase::Settling);
    }

    #[test]
    fn test_ball_position_at_rest() {
        let frame = WheelFrame {
            phase: AnimationPhase::Idle,
            wheel_angle: 0.0,
            ball_angle: 270.0,
            ball_radius: 115.0,
        };
        let (x, y) = frame.ball_position();
        assert!(x.abs() < EPS);
        assert!((y + 115.0).abs() < EPS);
    }
}
