//! Noise-wipe cross-fade between two images, drawn in a fixed canvas above
//! the page while a transition plays.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, info, log, warn};
use web_sys::{HtmlCanvasElement, HtmlImageElement};

use crate::config::TransitionConfig;
use crate::context_tracker::ContextTracker;
use crate::media::MediaReadyState;
use crate::timeline::{normalized_center, FrameDirective, PerlinTimeline};
use crate::wasm::frame::{DomListener, FrameLoop};
use crate::wasm::media_element::image_readiness;
use crate::wasm::resources;
use crate::wasm::shader::PERLIN_FRAG;
use crate::wasm::surface::{RenderSurface, SurfaceProgram};

const PERLIN_PROGRAM: SurfaceProgram = SurfaceProgram {
    fragment: PERLIN_FRAG,
    uniforms: &[
        "u_fromTexture",
        "u_toTexture",
        "u_progress",
        "u_resolution",
        "u_smoothness",
        "u_center",
    ],
    textures: 2,
};

/// How one transition is driven.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerlinOptions {
    /// Externally driven progress. `None` animates over `duration_ms`.
    pub progress: Option<f64>,
    pub duration_ms: f64,
    pub smoothness: f32,
    /// Wipe origin in CSS pixels; the viewport centre when `None`.
    pub center: Option<(f64, f64)>,
}

impl PerlinOptions {
    pub fn from_config(config: &TransitionConfig) -> Self {
        Self {
            progress: None,
            duration_ms: config.noise_ms,
            smoothness: config.smoothness,
            center: None,
        }
    }

    fn timeline(&self) -> PerlinTimeline {
        match self.progress {
            Some(progress) => PerlinTimeline::external(progress),
            None => PerlinTimeline::internal(self.duration_ms),
        }
    }
}

type CompletionCallback = Rc<dyn Fn()>;

struct PerlinState {
    surface: RenderSurface,
    from: HtmlImageElement,
    to: HtmlImageElement,
    options: PerlinOptions,
    timeline: PerlinTimeline,
    on_complete: Option<CompletionCallback>,
    gpu_failed: bool,
}

impl PerlinState {
    fn readiness(&self) -> MediaReadyState {
        match (image_readiness(&self.from), image_readiness(&self.to)) {
            (MediaReadyState::Ready, MediaReadyState::Ready) => MediaReadyState::Ready,
            (MediaReadyState::Failed, _) | (_, MediaReadyState::Failed) => MediaReadyState::Failed,
            _ => MediaReadyState::Loading,
        }
    }

    /// Advances and draws one frame. Returns the completion callback when
    /// this frame completed the transition, and whether to keep looping.
    fn step(&mut self, now_ms: f64) -> (Option<CompletionCallback>, bool) {
        match self.readiness() {
            MediaReadyState::Ready if !self.gpu_failed => {
                if let Err(err) = self.surface.initialize(PERLIN_PROGRAM) {
                    log!(err.log_level(), "noise transition cannot render: {err}");
                    self.gpu_failed = true;
                }
            }
            MediaReadyState::Ready => {}
            // a broken image cannot be shown, but the transition still ends
            MediaReadyState::Failed => {}
            // both images' load events restart the loop
            _ => return (None, false),
        }

        let tick = self.timeline.advance(now_ms);
        self.draw(tick.progress);

        let callback = if tick.completed {
            info!("noise transition complete");
            self.on_complete.clone()
        } else {
            None
        };
        (callback, tick.next != FrameDirective::Stop)
    }

    fn draw(&self, progress: f64) {
        let Some(frame) = self.surface.begin_frame() else {
            return;
        };
        let (gl, program) = (frame.gl(), frame.program());
        let (Some(from), Some(to)) = (frame.texture(0), frame.texture(1)) else {
            return;
        };
        // both units are re-uploaded every frame
        if resources::upload_image(gl, 0, from, &self.from).is_err()
            || resources::upload_image(gl, 1, to, &self.to).is_err()
        {
            return;
        }

        let canvas = self.surface.canvas();
        let css_size = (canvas.client_width() as f64, canvas.client_height() as f64);
        let (cx, cy) = normalized_center(self.options.center, css_size);
        let (width, height) = frame.resolution();

        program.set_sampler(gl, "u_fromTexture", 0);
        program.set_sampler(gl, "u_toTexture", 1);
        program.set_f32(gl, "u_progress", progress as f32);
        program.set_vec2(gl, "u_resolution", width, height);
        program.set_f32(gl, "u_smoothness", self.options.smoothness);
        program.set_vec2(gl, "u_center", cx, cy);
        frame.draw();
    }
}

/// One noise transition between a pair of images.
///
/// Nothing is initialized or drawn until both images have loaded. The
/// completion callback runs after the borrow of the overlay's state has
/// been released.
pub struct PerlinOverlay {
    state: Rc<RefCell<PerlinState>>,
    frames: Rc<FrameLoop>,
    listeners: Vec<DomListener>,
}

impl PerlinOverlay {
    pub fn new(
        canvas: HtmlCanvasElement,
        tracker: Rc<ContextTracker>,
        max_pixel_ratio: Option<f64>,
        from: HtmlImageElement,
        to: HtmlImageElement,
        options: PerlinOptions,
    ) -> Self {
        let state = Rc::new(RefCell::new(PerlinState {
            surface: RenderSurface::new(canvas, tracker, max_pixel_ratio),
            from,
            to,
            timeline: options.timeline(),
            options,
            on_complete: None,
            gpu_failed: false,
        }));

        let weak: Weak<RefCell<PerlinState>> = Rc::downgrade(&state);
        let frames = Rc::new(FrameLoop::new(move |now| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let (callback, keep_going) = state.borrow_mut().step(now);
            if let Some(callback) = callback {
                callback();
            }
            keep_going
        }));

        let mut overlay = Self {
            state,
            frames,
            listeners: Vec::new(),
        };
        overlay.watch_images();
        overlay.frames.start();
        overlay
    }

    /// Runs `callback` each time a transition instance completes: once per
    /// image pair, and again after progress is rewound to zero.
    pub fn on_complete(&mut self, callback: impl Fn() + 'static) {
        self.state.borrow_mut().on_complete = Some(Rc::new(callback));
    }

    /// The canvas currently drawn on. It differs from the one passed to
    /// [`new`](Self::new) once a lost context forced a replacement.
    pub fn canvas(&self) -> HtmlCanvasElement {
        self.state.borrow().surface.canvas().clone()
    }

    pub fn progress(&self) -> f64 {
        self.state.borrow().timeline.progress()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().surface.is_initialized()
    }

    pub fn has_completed(&self) -> bool {
        self.state.borrow().timeline.has_completed()
    }

    /// Pushes an externally driven progress value, restarting a stopped
    /// render loop when needed.
    pub fn set_progress(&self, progress: f64) {
        if self.state.borrow_mut().timeline.set_external(progress) {
            debug!("noise transition restarted at {progress}");
        }
        self.frames.start();
    }

    pub fn set_smoothness(&self, smoothness: f32) {
        self.state.borrow_mut().options.smoothness = smoothness.clamp(0.0, 1.0);
        self.frames.start();
    }

    pub fn set_center(&self, center: Option<(f64, f64)>) {
        self.state.borrow_mut().options.center = center;
        self.frames.start();
    }

    /// Replaces the image pair. A different pair is a new transition: the
    /// GPU objects are released and the timeline and completion rearm.
    pub fn set_images(&mut self, from: HtmlImageElement, to: HtmlImageElement) {
        {
            let mut state = self.state.borrow_mut();
            if state.from == from && state.to == to {
                return;
            }
            debug!("noise transition images changed; rebuilding");
            state.surface.teardown();
            state.from = from;
            state.to = to;
            state.timeline = state.options.timeline();
            state.gpu_failed = false;
        }
        self.frames.cancel();
        self.watch_images();
        self.frames.start();
    }

    fn watch_images(&mut self) {
        self.listeners.clear();
        let state = self.state.borrow();
        for image in [&state.from, &state.to] {
            if image_readiness(image) != MediaReadyState::Loading {
                continue;
            }
            for event in ["load", "error"] {
                let frames = Rc::downgrade(&self.frames);
                match DomListener::new(image.as_ref(), event, move |_| {
                    if let Some(frames) = frames.upgrade() {
                        frames.start();
                    }
                }) {
                    Ok(listener) => self.listeners.push(listener),
                    Err(err) => warn!("could not watch image {event}: {err}"),
                }
            }
        }
    }

    pub fn dispose(&mut self) {
        self.frames.cancel();
        self.listeners.clear();
        let mut state = self.state.borrow_mut();
        state.on_complete = None;
        state.surface.teardown();
    }
}

impl Drop for PerlinOverlay {
    fn drop(&mut self) {
        self.dispose();
    }
}
