//! Frame-driven progress for the noise transition.
//!
//! Everything here works on explicit millisecond timestamps so the same code
//! runs against `requestAnimationFrame` in the browser and a simulated clock
//! in tests.

use log::debug;

/// Linear 0 → 1 ramp over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressRamp {
    start_ms: f64,
    duration_ms: f64,
}

impl ProgressRamp {
    pub fn new(start_ms: f64, duration_ms: f64) -> Self {
        Self {
            start_ms,
            duration_ms: duration_ms.max(0.0),
        }
    }

    pub fn progress_at(&self, now_ms: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0)
    }
}

/// Fires once, the first time progress reaches 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionLatch {
    fired: bool,
}

impl CompletionLatch {
    /// Returns `true` exactly once per latch lifetime (or since the last
    /// [`reset`](Self::reset)).
    pub fn observe(&mut self, progress: f64) -> bool {
        if self.fired || progress < 1.0 {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

/// Where transition progress comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressSource {
    /// The caller pushes progress values directly.
    External(f64),
    /// Progress is derived from elapsed time since the first frame.
    Internal {
        duration_ms: f64,
        ramp: Option<ProgressRamp>,
    },
}

/// What the render loop should do after drawing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirective {
    Continue,
    /// Progress has resolved; draw one more frame so the final composite is
    /// not a frame stale, then stop.
    FinalFrame,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub progress: f64,
    /// `true` on exactly one tick: the first at which progress reached 1.0.
    pub completed: bool,
    pub next: FrameDirective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Finishing,
    Stopped,
}

/// Progress, completion and loop termination for one transition instance.
#[derive(Debug, Clone)]
pub struct PerlinTimeline {
    source: ProgressSource,
    latch: CompletionLatch,
    state: LoopState,
    progress: f64,
}

impl PerlinTimeline {
    pub fn internal(duration_ms: f64) -> Self {
        Self::with_source(ProgressSource::Internal {
            duration_ms,
            ramp: None,
        })
    }

    pub fn external(progress: f64) -> Self {
        Self::with_source(ProgressSource::External(sanitize(progress)))
    }

    fn with_source(source: ProgressSource) -> Self {
        Self {
            source,
            latch: CompletionLatch::default(),
            state: LoopState::Running,
            progress: 0.0,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_stopped(&self) -> bool {
        self.state == LoopState::Stopped
    }

    pub fn has_completed(&self) -> bool {
        self.latch.has_fired()
    }

    /// Pushes a new externally driven value. Returns `true` when the render
    /// loop had stopped and must be restarted to show it.
    ///
    /// Rewinding to exactly 0 starts a fresh transition instance, re-arming
    /// the completion callback. An internally driven timeline switches to
    /// external mode.
    pub fn set_external(&mut self, progress: f64) -> bool {
        let progress = sanitize(progress);
        if progress == 0.0 && self.latch.has_fired() {
            debug!("transition progress rewound; completion re-armed");
            self.latch.reset();
        }
        self.source = ProgressSource::External(progress);

        let was_stopped = self.state == LoopState::Stopped;
        if progress < 1.0 {
            self.state = LoopState::Running;
        }
        was_stopped && progress < 1.0
    }

    /// Advances to the frame at `now_ms`.
    pub fn advance(&mut self, now_ms: f64) -> FrameTick {
        self.progress = match &mut self.source {
            ProgressSource::External(progress) => *progress,
            ProgressSource::Internal { duration_ms, ramp } => ramp
                .get_or_insert_with(|| ProgressRamp::new(now_ms, *duration_ms))
                .progress_at(now_ms),
        };
        let completed = self.latch.observe(self.progress);

        let next = match self.state {
            LoopState::Running if self.progress < 1.0 => FrameDirective::Continue,
            LoopState::Running => {
                self.state = LoopState::Finishing;
                FrameDirective::FinalFrame
            }
            LoopState::Finishing | LoopState::Stopped => {
                self.state = LoopState::Stopped;
                FrameDirective::Stop
            }
        };

        FrameTick {
            progress: self.progress,
            completed,
            next,
        }
    }
}

/// Wipe origin in `[0, 1]` texture space (top-left origin) for a centre
/// given in CSS pixels. Without a centre, or on an empty surface, the wipe
/// starts in the middle.
pub fn normalized_center(center: Option<(f64, f64)>, size: (f64, f64)) -> (f32, f32) {
    let (width, height) = size;
    match center {
        Some((x, y)) if width > 0.0 && height > 0.0 => (
            (x / width).clamp(0.0, 1.0) as f32,
            (y / height).clamp(0.0, 1.0) as f32,
        ),
        _ => (0.5, 0.5),
    }
}

fn sanitize(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_clamps_and_handles_zero_duration() {
        let ramp = ProgressRamp::new(100.0, 1000.0);
        assert_eq!(ramp.progress_at(50.0), 0.0);
        assert_eq!(ramp.progress_at(600.0), 0.5);
        assert_eq!(ramp.progress_at(1100.0), 1.0);
        assert_eq!(ramp.progress_at(9000.0), 1.0);
        assert_eq!(ProgressRamp::new(0.0, 0.0).progress_at(0.0), 1.0);
    }

    #[test]
    fn latch_fires_once_for_repeated_full_progress() {
        let mut latch = CompletionLatch::default();
        assert!(!latch.observe(0.5));
        assert!(latch.observe(1.0));
        assert!(!latch.observe(1.0));
        assert!(!latch.observe(1.0));
        latch.reset();
        assert!(latch.observe(1.0));
    }

    #[test]
    fn internal_clock_completes_within_one_frame_of_duration() {
        let mut timeline = PerlinTimeline::internal(1000.0);
        let start = 5_000.0;
        let mut completions = Vec::new();
        let mut frames_after_complete = 0;
        let mut now = start;

        loop {
            let tick = timeline.advance(now);
            if tick.completed {
                completions.push(now - start);
            }
            if timeline.has_completed() {
                frames_after_complete += 1;
            }
            if tick.next == FrameDirective::Stop {
                break;
            }
            now += 16.0;
            assert!(now - start < 2_000.0, "render loop never terminated");
        }

        assert_eq!(completions.len(), 1);
        let elapsed = completions[0];
        assert!((1000.0 - 16.0..=1000.0 + 16.0).contains(&elapsed), "{elapsed}");
        // the completing frame, then exactly one more
        assert_eq!(frames_after_complete, 2);
    }

    #[test]
    fn external_progress_reporting_one_repeatedly_completes_once() {
        let mut timeline = PerlinTimeline::external(0.0);
        let mut fired = 0;
        for (frame, progress) in [0.2, 0.7, 1.0, 1.0, 1.0].into_iter().enumerate() {
            timeline.set_external(progress);
            if timeline.advance(frame as f64 * 16.0).completed {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn final_frame_then_stop() {
        let mut timeline = PerlinTimeline::external(1.0);
        assert_eq!(timeline.advance(0.0).next, FrameDirective::FinalFrame);
        assert_eq!(timeline.advance(16.0).next, FrameDirective::Stop);
        assert!(timeline.is_stopped());
    }

    #[test]
    fn rewinding_restarts_and_rearms() {
        let mut timeline = PerlinTimeline::external(1.0);
        assert!(timeline.advance(0.0).completed);
        timeline.advance(16.0);
        assert!(timeline.is_stopped());

        assert!(timeline.set_external(0.0));
        assert_eq!(timeline.advance(32.0).next, FrameDirective::Continue);
        timeline.set_external(1.0);
        assert!(timeline.advance(48.0).completed);
    }

    #[test]
    fn center_defaults_to_the_middle() {
        assert_eq!(normalized_center(None, (1280.0, 720.0)), (0.5, 0.5));
        assert_eq!(normalized_center(Some((320.0, 540.0)), (1280.0, 720.0)), (0.25, 0.75));
        assert_eq!(normalized_center(Some((-50.0, 9000.0)), (1280.0, 720.0)), (0.0, 1.0));
        assert_eq!(normalized_center(Some((10.0, 10.0)), (0.0, 0.0)), (0.5, 0.5));
    }

    #[test]
    fn zero_duration_resolves_on_first_frame() {
        let mut timeline = PerlinTimeline::internal(0.0);
        let tick = timeline.advance(123.0);
        assert_eq!(tick.progress, 1.0);
        assert!(tick.completed);
    }
}
