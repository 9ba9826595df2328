//! Sequencing of the gallery → detail page transition.
//!
//! ```text
//! Idle ─begin─▶ Morphing ─morph done─▶ Paused ─300ms─▶ NoiseTransition ─progress 1─▶ Complete
//!                   │                                                                  ▲
//!                   └──────────── no distinct target image ────────────────────────────┘
//! ```
//!
//! The machine is driven by a single [`Choreographer::tick`] that receives the
//! current time and answers with the next [`Wakeup`]. Every transition gets a
//! [`TransitionToken`]; calls carrying a superseded token are ignored, so a
//! stale frame or timer can never move a newer transition.

use log::{debug, info};

use crate::config::TransitionConfig;
use crate::easing::CubicBezier;
use crate::media;
use crate::morph::{self, MorphAnimation, Rect};
use crate::timeline::{CompletionLatch, ProgressRamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Morphing,
    Paused,
    NoiseTransition,
    Complete,
}

impl TransitionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionPhase::Idle => "idle",
            TransitionPhase::Morphing => "morphing",
            TransitionPhase::Paused => "paused",
            TransitionPhase::NoiseTransition => "noise",
            TransitionPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub progress: f64,
    pub phase: TransitionPhase,
}

/// What the gallery hands over when an item is activated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub source_rect: Rect,
    pub source_image: String,
    /// Media URLs of the destination work, in display order.
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionTimings {
    pub morph_ms: f64,
    pub pause_ms: f64,
    pub noise_ms: f64,
}

impl TransitionTimings {
    /// Reduced motion collapses the morph and noise phases to zero length.
    /// The settle pause is kept.
    pub fn from_config(config: &TransitionConfig, reduced_motion: bool) -> Self {
        if reduced_motion {
            Self {
                morph_ms: 0.0,
                pause_ms: config.pause_ms,
                noise_ms: 0.0,
            }
        } else {
            Self {
                morph_ms: config.morph_ms,
                pause_ms: config.pause_ms,
                noise_ms: config.noise_ms,
            }
        }
    }
}

/// When the driver should call [`Choreographer::tick`] again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wakeup {
    NextFrame,
    /// After a fixed delay in milliseconds.
    After(f64),
    /// Not before the driver reports an event (target measured, images
    /// loaded).
    AwaitEvent,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub wakeup: Wakeup,
    /// The phase entered during this tick, if it changed.
    pub entered: Option<TransitionPhase>,
    /// `true` exactly once per transition, on the tick that completes it.
    pub completed: bool,
}

#[derive(Debug)]
struct ActiveTransition {
    token: TransitionToken,
    request: TransitionRequest,
    noise_target: Option<String>,
    morph: Option<MorphAnimation>,
    morph_rect: Rect,
    phase_started_at: Option<f64>,
    noise_ready: bool,
    completion: CompletionLatch,
}

#[derive(Debug)]
pub struct Choreographer {
    timings: TransitionTimings,
    easing: CubicBezier,
    next_token: u64,
    phase: TransitionPhase,
    progress: f64,
    active: Option<ActiveTransition>,
}

impl Choreographer {
    pub fn new(config: &TransitionConfig, reduced_motion: bool) -> Self {
        Self {
            timings: TransitionTimings::from_config(config, reduced_motion),
            easing: CubicBezier::from_points(config.morph_easing),
            next_token: 0,
            phase: TransitionPhase::Idle,
            progress: 0.0,
            active: None,
        }
    }

    pub fn timings(&self) -> TransitionTimings {
        self.timings
    }

    /// Starts a transition, superseding any one still in flight.
    pub fn begin(&mut self, request: TransitionRequest) -> TransitionToken {
        if let Some(previous) = self.active.take() {
            debug!("transition {:?} superseded", previous.token);
        }

        self.next_token += 1;
        let token = TransitionToken(self.next_token);

        let noise_target =
            media::distinct_target(&request.source_image, &request.media).map(str::to_owned);
        if noise_target.is_none() {
            info!(
                "no image distinct from {} in destination media; noise phase skipped",
                request.source_image
            );
        }

        self.phase = TransitionPhase::Morphing;
        self.progress = 0.0;
        self.active = Some(ActiveTransition {
            token,
            morph_rect: request.source_rect,
            request,
            noise_target,
            morph: None,
            phase_started_at: None,
            noise_ready: false,
            completion: CompletionLatch::default(),
        });
        token
    }

    /// Drops the in-flight transition and returns to idle.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("transition {:?} cancelled", active.token);
        }
        self.phase = TransitionPhase::Idle;
        self.progress = 0.0;
    }

    pub fn is_current(&self, token: TransitionToken) -> bool {
        self.current(token).is_some()
    }

    /// Records the measured destination slot. Only the first non-empty
    /// measurement per transition is used; later layout passes are ignored.
    pub fn set_morph_target(&mut self, token: TransitionToken, target: Rect) -> bool {
        if self.phase != TransitionPhase::Morphing || target.is_empty() {
            return false;
        }
        let (timings, easing) = (self.timings, self.easing);
        let Some(active) = self.current_mut(token) else {
            return false;
        };
        if active.morph.is_some() {
            return false;
        }
        active.morph = Some(MorphAnimation::new(
            active.request.source_rect,
            target,
            timings.morph_ms,
            easing,
        ));
        true
    }

    /// Ends the wait for a measurement by morphing in place onto the current
    /// rect, empty or not. Used when the destination slot cannot be measured.
    pub fn settle_morph(&mut self, token: TransitionToken) -> bool {
        if self.phase != TransitionPhase::Morphing {
            return false;
        }
        let easing = self.easing;
        let Some(active) = self.current_mut(token) else {
            return false;
        };
        if active.morph.is_some() {
            return false;
        }
        let here = active.morph_rect;
        active.morph = Some(MorphAnimation::new(here, here, 0.0, easing));
        true
    }

    /// Both noise-phase images are decodable.
    pub fn mark_noise_ready(&mut self, token: TransitionToken) {
        if let Some(active) = self.current_mut(token) {
            active.noise_ready = true;
        }
    }

    /// The noise phase cannot play (target failed to load, no GPU); the
    /// transition finishes without it.
    pub fn abandon_noise(&mut self, token: TransitionToken) {
        if let Some(active) = self.current_mut(token) {
            if active.noise_target.take().is_some() {
                info!("noise phase abandoned for {:?}", token);
            }
        }
    }

    /// Advances the machine to `now_ms`. Returns `None` for a stale token.
    pub fn tick(&mut self, token: TransitionToken, now_ms: f64) -> Option<Tick> {
        use TransitionPhase::*;

        let timings = self.timings;
        let active = self.active.as_mut().filter(|a| a.token == token)?;
        let initial = self.phase;

        let wakeup = loop {
            match self.phase {
                Idle => break Wakeup::Done,
                Morphing => {
                    let Some(morph) = &active.morph else {
                        break Wakeup::AwaitEvent;
                    };
                    let started = *active.phase_started_at.get_or_insert(now_ms);
                    let elapsed = now_ms - started;
                    active.morph_rect = morph.frame_at(elapsed);
                    if !morph.is_finished(elapsed) {
                        break Wakeup::NextFrame;
                    }
                    active.phase_started_at = Some(now_ms);
                    self.phase = if active.noise_target.is_some() {
                        Paused
                    } else {
                        Complete
                    };
                }
                Paused => {
                    if active.noise_target.is_none() {
                        self.phase = Complete;
                        continue;
                    }
                    let started = *active.phase_started_at.get_or_insert(now_ms);
                    let remaining = timings.pause_ms - (now_ms - started);
                    if remaining > 0.0 {
                        break Wakeup::After(remaining);
                    }
                    active.phase_started_at = None;
                    self.phase = NoiseTransition;
                }
                NoiseTransition => {
                    if active.noise_target.is_none() {
                        self.phase = Complete;
                        continue;
                    }
                    if !active.noise_ready {
                        break Wakeup::AwaitEvent;
                    }
                    let started = *active.phase_started_at.get_or_insert(now_ms);
                    self.progress = ProgressRamp::new(started, timings.noise_ms).progress_at(now_ms);
                    if self.progress < 1.0 {
                        break Wakeup::NextFrame;
                    }
                    self.phase = Complete;
                }
                Complete => {
                    self.progress = 1.0;
                    break Wakeup::Done;
                }
            }
        };

        let entered = (self.phase != initial).then_some(self.phase);
        if let Some(phase) = entered {
            info!("transition {:?}: {:?} -> {:?}", token, initial, phase);
        }
        let completed = self.phase == Complete && active.completion.observe(1.0);

        Some(Tick {
            wakeup,
            entered,
            completed,
        })
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn state(&self) -> TransitionState {
        TransitionState {
            progress: self.progress,
            phase: self.phase,
        }
    }

    pub fn token(&self) -> Option<TransitionToken> {
        self.active.as_ref().map(|a| a.token)
    }

    pub fn source_image(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.request.source_image.as_str())
    }

    pub fn noise_target(&self) -> Option<&str> {
        self.active.as_ref().and_then(|a| a.noise_target.as_deref())
    }

    /// Where the morphed thumbnail should be painted right now.
    pub fn morph_rect(&self) -> Option<Rect> {
        self.active.as_ref().map(|a| a.morph_rect)
    }

    pub fn morph_target(&self) -> Option<Rect> {
        self.active
            .as_ref()
            .and_then(|a| a.morph.as_ref())
            .map(MorphAnimation::target)
    }

    /// Opacity of the detail-page text panels and carousel.
    pub fn content_opacity(&self) -> f64 {
        match self.phase {
            TransitionPhase::Idle | TransitionPhase::Complete => 1.0,
            _ => 0.0,
        }
    }

    pub fn morph_overlay_opacity(&self) -> f64 {
        match self.phase {
            TransitionPhase::Morphing | TransitionPhase::Paused => 1.0,
            TransitionPhase::NoiseTransition => morph::overlay_opacity(self.progress),
            TransitionPhase::Idle | TransitionPhase::Complete => 0.0,
        }
    }

    /// Origin of the noise wipe in CSS pixels: the centre of the measured
    /// slot, or of the viewport when nothing was measured.
    pub fn noise_center(&self, viewport: (f64, f64)) -> (f64, f64) {
        self.morph_target()
            .filter(|rect| !rect.is_empty())
            .map(|rect| rect.center())
            .unwrap_or((viewport.0 / 2.0, viewport.1 / 2.0))
    }

    fn current(&self, token: TransitionToken) -> Option<&ActiveTransition> {
        self.active.as_ref().filter(|a| a.token == token)
    }

    fn current_mut(&mut self, token: TransitionToken) -> Option<&mut ActiveTransition> {
        self.active.as_mut().filter(|a| a.token == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: Rect = Rect::new(40.0, 300.0, 160.0, 120.0);
    const SLOT: Rect = Rect::new(200.0, 100.0, 800.0, 600.0);

    fn request(media: &[&str]) -> TransitionRequest {
        TransitionRequest {
            source_rect: SOURCE,
            source_image: "/thumbs/cover.jpg".into(),
            media: media.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn choreographer(reduced_motion: bool) -> Choreographer {
        Choreographer::new(&TransitionConfig::default(), reduced_motion)
    }

    #[test]
    fn full_sequence_with_default_timings() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/works/cover.jpg", "/works/detail.jpg"]));
        assert_eq!(fx.phase(), TransitionPhase::Morphing);
        assert_eq!(fx.noise_target(), Some("/works/detail.jpg"));

        // nothing to animate until the slot has been measured
        assert_eq!(fx.tick(token, 0.0).unwrap().wakeup, Wakeup::AwaitEvent);
        assert!(fx.set_morph_target(token, SLOT));

        assert_eq!(fx.tick(token, 10.0).unwrap().wakeup, Wakeup::NextFrame);
        assert_eq!(fx.morph_rect(), Some(SOURCE));

        let paused = fx.tick(token, 810.0).unwrap();
        assert_eq!(paused.entered, Some(TransitionPhase::Paused));
        assert_eq!(paused.wakeup, Wakeup::After(300.0));
        assert_eq!(fx.morph_rect(), Some(SLOT));

        let noise = fx.tick(token, 1110.0).unwrap();
        assert_eq!(noise.entered, Some(TransitionPhase::NoiseTransition));
        assert_eq!(noise.wakeup, Wakeup::AwaitEvent);

        fx.mark_noise_ready(token);
        assert_eq!(fx.tick(token, 1120.0).unwrap().wakeup, Wakeup::NextFrame);
        fx.tick(token, 1620.0).unwrap();
        assert_eq!(fx.progress(), 0.5);
        assert_eq!(fx.morph_overlay_opacity(), 0.0);

        let done = fx.tick(token, 2120.0).unwrap();
        assert_eq!(done.entered, Some(TransitionPhase::Complete));
        assert!(done.completed);
        assert_eq!(fx.content_opacity(), 1.0);

        let again = fx.tick(token, 2136.0).unwrap();
        assert!(!again.completed);
        assert_eq!(again.wakeup, Wakeup::Done);
    }

    #[test]
    fn identical_media_skips_the_noise_phase() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/a/cover.jpg", "/b/COVER.jpg"]));
        assert_eq!(fx.noise_target(), None);
        fx.set_morph_target(token, SLOT);

        let mut entered = Vec::new();
        let mut now = 0.0;
        loop {
            let tick = fx.tick(token, now).unwrap();
            entered.extend(tick.entered);
            if tick.wakeup == Wakeup::Done {
                break;
            }
            now += 16.0;
        }
        assert_eq!(entered, [TransitionPhase::Complete]);
    }

    #[test]
    fn reduced_motion_advances_on_the_next_tick() {
        let mut fx = choreographer(true);
        let token = fx.begin(request(&["/works/detail.jpg"]));
        fx.set_morph_target(token, SLOT);

        let first = fx.tick(token, 0.0).unwrap();
        assert_eq!(first.entered, Some(TransitionPhase::Paused));
        assert_eq!(fx.morph_rect(), Some(SLOT));

        fx.mark_noise_ready(token);
        let done = fx.tick(token, 300.0).unwrap();
        assert_eq!(done.entered, Some(TransitionPhase::Complete));
        assert!(done.completed);
    }

    #[test]
    fn superseded_tokens_are_ignored() {
        let mut fx = choreographer(false);
        let stale = fx.begin(request(&["/works/detail.jpg"]));
        let fresh = fx.begin(request(&["/works/other.jpg"]));

        assert!(fx.tick(stale, 0.0).is_none());
        assert!(!fx.set_morph_target(stale, SLOT));
        fx.abandon_noise(stale);
        assert_eq!(fx.noise_target(), Some("/works/other.jpg"));
        assert!(fx.is_current(fresh));
        assert!(!fx.is_current(stale));
    }

    #[test]
    fn morph_target_is_measured_once() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/works/detail.jpg"]));
        assert!(!fx.set_morph_target(token, Rect::default()));
        assert!(fx.set_morph_target(token, SLOT));
        assert!(!fx.set_morph_target(token, Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(fx.morph_target(), Some(SLOT));
        assert_eq!(fx.noise_center((1000.0, 800.0)), (600.0, 400.0));
    }

    #[test]
    fn abandoning_noise_completes_without_it() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/works/detail.jpg"]));
        fx.set_morph_target(token, SLOT);
        fx.tick(token, 0.0);
        fx.tick(token, 800.0);
        fx.tick(token, 1100.0);
        assert_eq!(fx.phase(), TransitionPhase::NoiseTransition);

        fx.abandon_noise(token);
        let tick = fx.tick(token, 1116.0).unwrap();
        assert_eq!(tick.entered, Some(TransitionPhase::Complete));
        assert!(tick.completed);
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/works/detail.jpg"]));
        assert_eq!(fx.content_opacity(), 0.0);
        fx.cancel();
        assert_eq!(
            fx.state(),
            TransitionState {
                progress: 0.0,
                phase: TransitionPhase::Idle
            }
        );
        assert!(fx.tick(token, 0.0).is_none());
        assert_eq!(fx.content_opacity(), 1.0);
        assert_eq!(fx.noise_center((1000.0, 800.0)), (500.0, 400.0));
    }

    #[test]
    fn unmeasurable_slot_settles_in_place_and_completes() {
        let mut fx = choreographer(false);
        let token = fx.begin(TransitionRequest {
            source_rect: Rect::default(),
            ..request(&["/works/detail.jpg"])
        });
        assert!(!fx.set_morph_target(token, fx.morph_rect().unwrap_or_default()));
        assert!(fx.settle_morph(token));
        assert!(!fx.settle_morph(token));

        let morph_done = fx.tick(token, 0.0).unwrap();
        assert_eq!(morph_done.entered, Some(TransitionPhase::Paused));
        assert_eq!(fx.morph_rect(), Some(Rect::default()));
        assert_eq!(fx.noise_center((1000.0, 800.0)), (500.0, 400.0));

        fx.abandon_noise(token);
        let mut now = 0.0;
        let mut completed = false;
        while now < 16_000.0 {
            now += 16.0;
            let tick = fx.tick(token, now).unwrap();
            completed |= tick.completed;
            if tick.wakeup == Wakeup::Done {
                break;
            }
        }
        assert!(completed);
        assert_eq!(fx.phase(), TransitionPhase::Complete);
        assert_eq!(fx.content_opacity(), 1.0);
    }

    #[test]
    fn settle_is_ignored_once_measured_or_stale() {
        let mut fx = choreographer(false);
        let stale = fx.begin(request(&["/works/detail.jpg"]));
        let token = fx.begin(request(&["/works/detail.jpg"]));
        assert!(!fx.settle_morph(stale));
        assert!(fx.set_morph_target(token, SLOT));
        assert!(!fx.settle_morph(token));
        assert_eq!(fx.morph_target(), Some(SLOT));
    }

    #[test]
    fn early_timer_reschedules_the_remaining_pause() {
        let mut fx = choreographer(false);
        let token = fx.begin(request(&["/works/detail.jpg"]));
        fx.set_morph_target(token, SLOT);
        fx.tick(token, 0.0);
        fx.tick(token, 800.0);
        let early = fx.tick(token, 1000.0).unwrap();
        assert_eq!(early.wakeup, Wakeup::After(100.0));
        assert_eq!(fx.phase(), TransitionPhase::Paused);
    }
}
