//! Plays a [`Choreographer`] against the live page: styles the morph
//! element, preloads the noise-phase images, measures the destination slot
//! and mounts the noise overlay for as long as it is needed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement};

use crate::choreographer::{
    Choreographer, TransitionPhase, TransitionRequest, TransitionToken, Wakeup,
};
use crate::config::FxConfig;
use crate::context_tracker::ContextTracker;
use crate::media::MediaReadyState;
use crate::morph::Rect;
use crate::wasm::frame::{DomListener, FrameLoop, Timeout};
use crate::wasm::media_element::{image_readiness, load_image};
use crate::wasm::perlin_overlay::{PerlinOptions, PerlinOverlay};
use crate::wasm::env;

/// Frames spent re-measuring a destination slot that still has no size
/// before the morph settles in place.
const MAX_MEASURE_ATTEMPTS: u32 = 30;

type Completion = Box<dyn FnOnce()>;

enum Measure {
    Measured,
    /// Try again next frame.
    Settling,
    /// The destination image has not loaded yet.
    AwaitLoad,
}

/// Everything owned by the transition in flight.
#[derive(Default)]
struct Flight {
    destination: Option<HtmlImageElement>,
    from_image: Option<HtmlImageElement>,
    to_image: Option<HtmlImageElement>,
    layout_settled: bool,
    measure_attempts: u32,
    perlin: Option<PerlinOverlay>,
    timer: Option<Timeout>,
    listeners: Vec<DomListener>,
    on_complete: Option<Completion>,
}

struct DirectorState {
    fx: Choreographer,
    config: FxConfig,
    tracker: Rc<ContextTracker>,
    morph: HtmlElement,
    noise_canvas: HtmlCanvasElement,
    content: Vec<HtmlElement>,
    flight: Flight,
    this: Weak<RefCell<DirectorState>>,
    frames: Weak<FrameLoop>,
}

impl DirectorState {
    /// Releases timers, listeners and the noise overlay of the transition in
    /// flight. Its completion callback is dropped without running.
    fn clear_flight(&mut self) {
        let mut flight = std::mem::take(&mut self.flight);
        if let Some(frames) = self.frames.upgrade() {
            frames.cancel();
        }
        if let Some(perlin) = flight.perlin.take() {
            self.noise_canvas = perlin.canvas();
        }
    }

    fn begin(
        &mut self,
        request: TransitionRequest,
        destination: Option<HtmlImageElement>,
        on_complete: Option<Completion>,
    ) -> TransitionToken {
        self.clear_flight();
        let source_url = request.source_image.clone();
        let token = self.fx.begin(request);

        if let Some(image) = self.morph.dyn_ref::<HtmlImageElement>() {
            image.set_src(&source_url);
        }

        self.flight.on_complete = on_complete;
        self.flight.destination = destination.clone();
        if let Some(destination) = &destination {
            self.watch(destination);
        }
        self.preload(token, &source_url);
        self.apply_styles();
        token
    }

    fn cancel(&mut self) {
        self.clear_flight();
        self.fx.cancel();
        self.apply_styles();
    }

    fn preload(&mut self, token: TransitionToken, source_url: &str) {
        let Some(target_url) = self.fx.noise_target().map(str::to_owned) else {
            return;
        };
        if !env::webgl_supported() {
            info!("WebGL unavailable; transition continues without the noise phase");
            self.fx.abandon_noise(token);
            return;
        }
        match (load_image(source_url), load_image(&target_url)) {
            (Ok(from), Ok(to)) => {
                self.watch(&from);
                self.watch(&to);
                self.flight.from_image = Some(from);
                self.flight.to_image = Some(to);
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!("could not preload transition images: {err}");
                self.fx.abandon_noise(token);
            }
        }
    }

    /// Wakes the director when `image` loads or fails.
    fn watch(&mut self, image: &HtmlImageElement) {
        for event in ["load", "error"] {
            let this = self.this.clone();
            match DomListener::new(image.as_ref(), event, move |_| wake(&this)) {
                Ok(listener) => self.flight.listeners.push(listener),
                Err(err) => warn!("could not watch image {event}: {err}"),
            }
        }
    }

    fn check_preload(&mut self, token: TransitionToken) {
        let (Some(from), Some(to)) = (&self.flight.from_image, &self.flight.to_image) else {
            return;
        };
        match (image_readiness(from), image_readiness(to)) {
            (MediaReadyState::Ready, MediaReadyState::Ready) => self.fx.mark_noise_ready(token),
            (MediaReadyState::Failed, _) | (_, MediaReadyState::Failed) => {
                warn!("transition image failed to load; skipping the noise phase");
                self.flight.from_image = None;
                self.flight.to_image = None;
                self.fx.abandon_noise(token);
            }
            _ => {}
        }
    }

    /// Measures the destination slot one frame after its image has loaded.
    fn measure(&mut self, token: TransitionToken) -> Measure {
        let Some(destination) = &self.flight.destination else {
            self.fx.settle_morph(token);
            return Measure::Measured;
        };
        match image_readiness(destination) {
            MediaReadyState::Ready => {}
            MediaReadyState::Failed => {
                self.fx.settle_morph(token);
                return Measure::Measured;
            }
            _ => return Measure::AwaitLoad,
        }
        if !self.flight.layout_settled {
            self.flight.layout_settled = true;
            return Measure::Settling;
        }

        let bounds = destination.get_bounding_client_rect();
        let rect = Rect::new(bounds.left(), bounds.top(), bounds.width(), bounds.height());
        if self.fx.set_morph_target(token, rect) {
            debug!("morph target measured at {rect:?}");
            return Measure::Measured;
        }
        self.flight.measure_attempts += 1;
        if self.flight.measure_attempts >= MAX_MEASURE_ATTEMPTS {
            warn!("destination slot never gained a size; morphing in place");
            self.fx.settle_morph(token);
            return Measure::Measured;
        }
        Measure::Settling
    }

    /// Runs one step of the transition. Returns whether another animation
    /// frame is needed, plus the completion callback once it is due.
    fn step(&mut self, now_ms: f64) -> (bool, Option<Completion>) {
        let Some(token) = self.fx.token() else {
            return (false, None);
        };

        if self.fx.phase() == TransitionPhase::Morphing && self.fx.morph_target().is_none() {
            match self.measure(token) {
                Measure::Measured => {}
                Measure::Settling => return (true, None),
                Measure::AwaitLoad => return (false, None),
            }
        }
        self.check_preload(token);

        let Some(tick) = self.fx.tick(token, now_ms) else {
            return (false, None);
        };
        let mut again = false;
        if let Some(phase) = tick.entered {
            again = self.enter(token, phase);
        }
        if let Some(perlin) = &self.flight.perlin {
            perlin.set_progress(self.fx.progress());
        }
        self.apply_styles();

        let callback = if tick.completed {
            self.flight.on_complete.take()
        } else {
            None
        };
        let keep_going = match tick.wakeup {
            Wakeup::NextFrame => true,
            Wakeup::After(delay_ms) => {
                self.schedule(delay_ms);
                again
            }
            Wakeup::AwaitEvent | Wakeup::Done => again,
        };
        (keep_going, callback)
    }

    /// Side effects of entering `phase`. Returns `true` when the machine
    /// should be ticked again on the next frame.
    fn enter(&mut self, token: TransitionToken, phase: TransitionPhase) -> bool {
        match phase {
            TransitionPhase::NoiseTransition => {
                let (Some(from), Some(to)) =
                    (self.flight.from_image.clone(), self.flight.to_image.clone())
                else {
                    self.fx.abandon_noise(token);
                    return true;
                };
                let mut options = PerlinOptions::from_config(&self.config.transition);
                options.progress = Some(0.0);
                options.center = Some(self.fx.noise_center(env::viewport()));
                self.flight.perlin = Some(PerlinOverlay::new(
                    self.noise_canvas.clone(),
                    Rc::clone(&self.tracker),
                    self.config.gpu.max_pixel_ratio,
                    from,
                    to,
                    options,
                ));
                false
            }
            TransitionPhase::Complete => {
                if let Some(perlin) = self.flight.perlin.take() {
                    self.noise_canvas = perlin.canvas();
                }
                self.flight.timer = None;
                self.flight.listeners.clear();
                false
            }
            TransitionPhase::Idle | TransitionPhase::Morphing | TransitionPhase::Paused => false,
        }
    }

    fn schedule(&mut self, delay_ms: f64) {
        let this = self.this.clone();
        match Timeout::new(delay_ms, move || wake(&this)) {
            Ok(timer) => self.flight.timer = Some(timer),
            Err(err) => warn!("could not schedule transition timer: {err}"),
        }
    }

    fn apply_styles(&self) {
        let content_opacity = self.fx.content_opacity().to_string();
        for element in &self.content {
            set_style(element, "opacity", &content_opacity);
        }

        let morph_opacity = self.fx.morph_overlay_opacity();
        match self.fx.morph_rect() {
            Some(rect) if morph_opacity > 0.0 => {
                set_style(&self.morph, "display", "block");
                set_style(&self.morph, "left", &format!("{}px", rect.x));
                set_style(&self.morph, "top", &format!("{}px", rect.y));
                set_style(&self.morph, "width", &format!("{}px", rect.width));
                set_style(&self.morph, "height", &format!("{}px", rect.height));
                set_style(&self.morph, "opacity", &morph_opacity.to_string());
            }
            _ => set_style(&self.morph, "display", "none"),
        }

        let noise_visible = self.flight.perlin.is_some()
            && self.fx.phase() == TransitionPhase::NoiseTransition;
        let canvas = self.noise_canvas();
        set_style(canvas.as_ref(), "display", if noise_visible { "block" } else { "none" });
    }

    /// The canvas the noise overlay draws on. A mounted overlay may have
    /// swapped in a replacement for a canvas whose context was lost.
    fn noise_canvas(&self) -> HtmlCanvasElement {
        match &self.flight.perlin {
            Some(perlin) => perlin.canvas(),
            None => self.noise_canvas.clone(),
        }
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(err) = element.style().set_property(property, value) {
        debug!("could not set {property}: {err:?}");
    }
}

fn drive(cell: &Rc<RefCell<DirectorState>>, now_ms: f64) -> bool {
    let (keep_going, callback) = cell.borrow_mut().step(now_ms);
    // the borrow is released; the callback may start a new transition
    if let Some(callback) = callback {
        callback();
    }
    keep_going
}

fn wake(this: &Weak<RefCell<DirectorState>>) {
    let Some(cell) = this.upgrade() else {
        return;
    };
    if drive(&cell, env::now_ms()) {
        let frames = cell.borrow().frames.upgrade();
        if let Some(frames) = frames {
            frames.start();
        }
    }
}

/// The gallery → detail transition bound to a morph element, a noise
/// canvas and the detail page's content elements.
pub struct TransitionDirector {
    state: Rc<RefCell<DirectorState>>,
    frames: Rc<FrameLoop>,
}

impl TransitionDirector {
    /// A director that follows the OS reduced-motion preference.
    pub fn new(
        morph: HtmlElement,
        noise_canvas: HtmlCanvasElement,
        tracker: Rc<ContextTracker>,
        config: FxConfig,
    ) -> Self {
        let reduced_motion = env::prefers_reduced_motion();
        Self::with_reduced_motion(morph, noise_canvas, tracker, config, reduced_motion)
    }

    pub fn with_reduced_motion(
        morph: HtmlElement,
        noise_canvas: HtmlCanvasElement,
        tracker: Rc<ContextTracker>,
        config: FxConfig,
        reduced_motion: bool,
    ) -> Self {
        let fx = Choreographer::new(&config.transition, reduced_motion);
        let state = Rc::new_cyclic(|this| {
            RefCell::new(DirectorState {
                fx,
                config,
                tracker,
                morph,
                noise_canvas,
                content: Vec::new(),
                flight: Flight::default(),
                this: this.clone(),
                frames: Weak::new(),
            })
        });

        let weak = Rc::downgrade(&state);
        let frames = Rc::new(FrameLoop::new(move |now| {
            let Some(cell) = weak.upgrade() else {
                return false;
            };
            drive(&cell, now)
        }));
        state.borrow_mut().frames = Rc::downgrade(&frames);
        state.borrow().apply_styles();

        Self { state, frames }
    }

    /// The detail-page elements hidden until the transition completes.
    pub fn set_content(&self, content: Vec<HtmlElement>) {
        let mut state = self.state.borrow_mut();
        state.content = content;
        state.apply_styles();
    }

    /// Starts a transition, cancelling any still in flight. `destination`
    /// is the laid-out image whose box the thumbnail morphs into.
    pub fn begin(
        &self,
        request: TransitionRequest,
        destination: Option<HtmlImageElement>,
        on_complete: Option<Box<dyn FnOnce()>>,
    ) -> TransitionToken {
        let token = self
            .state
            .borrow_mut()
            .begin(request, destination, on_complete);
        self.frames.start();
        token
    }

    pub fn cancel(&self) {
        self.state.borrow_mut().cancel();
    }

    pub fn phase(&self) -> TransitionPhase {
        self.state.borrow().fx.phase()
    }

    pub fn progress(&self) -> f64 {
        self.state.borrow().fx.progress()
    }

    /// The noise canvas currently in the document.
    pub fn noise_canvas(&self) -> HtmlCanvasElement {
        self.state.borrow().noise_canvas()
    }
}

impl Drop for TransitionDirector {
    fn drop(&mut self) {
        self.frames.cancel();
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.clear_flight();
        }
    }
}
