//! Full-viewport canvas drawing a blurred, burgundy-tinted copy of the
//! landing media underneath the page content.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, log, warn};
use web_sys::HtmlCanvasElement;

use crate::blur_params::{keeps_looping, shader_time, BlurParameters};
use crate::config::FxConfig;
use crate::context_tracker::ContextTracker;
use crate::wasm::env;
use crate::wasm::frame::{DomListener, FrameLoop};
use crate::wasm::media_element::TextureSource;
use crate::wasm::shader::BLUR_FRAG;
use crate::wasm::surface::{RenderSurface, SurfaceProgram};

const BLUR_PROGRAM: SurfaceProgram = SurfaceProgram {
    fragment: BLUR_FRAG,
    uniforms: &[
        "u_texture",
        "u_resolution",
        "u_blurIntensity",
        "u_blurRadius",
        "u_burgundyIntensity",
        "u_time",
    ],
    textures: 1,
};

struct BlurState {
    surface: RenderSurface,
    source: Option<TextureSource>,
    params: BlurParameters,
    reduced_motion: bool,
}

impl BlurState {
    /// Draws one frame. Returns whether the loop should keep running.
    fn render(&self, now_ms: f64) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let looping = keeps_looping(source.kind());
        if !source.readiness().is_ready() {
            // the element's ready event restarts an image loop
            return looping;
        }
        let Some(frame) = self.surface.begin_frame() else {
            return false;
        };
        let (gl, program) = (frame.gl(), frame.program());
        let Some(texture) = frame.texture(0) else {
            return false;
        };
        if source.upload(gl, 0, texture).is_err() {
            return looping;
        }

        let (width, height) = frame.resolution();
        program.set_sampler(gl, "u_texture", 0);
        program.set_vec2(gl, "u_resolution", width, height);
        program.set_f32(gl, "u_blurIntensity", self.params.intensity());
        program.set_f32(gl, "u_blurRadius", self.params.radius());
        program.set_f32(gl, "u_burgundyIntensity", self.params.tint_strength());
        program.set_f32(gl, "u_time", shader_time(now_ms, self.reduced_motion));
        frame.draw();
        looping
    }
}

/// The landing-page blur/tint overlay.
///
/// Owns its context for its whole lifetime; source and parameter updates
/// only schedule redraws. When WebGL is unavailable or initialization
/// fails the overlay stays inert and draws nothing.
pub struct BlurOverlay {
    state: Rc<RefCell<BlurState>>,
    frames: Rc<FrameLoop>,
    ready_listener: Option<DomListener>,
}

impl BlurOverlay {
    pub fn new(canvas: HtmlCanvasElement, tracker: Rc<ContextTracker>, config: &FxConfig) -> Self {
        let mut surface = RenderSurface::new(canvas, tracker, config.gpu.max_pixel_ratio);
        if let Err(err) = surface.initialize(BLUR_PROGRAM) {
            log!(err.log_level(), "blur overlay disabled: {err}");
        }

        let state = Rc::new(RefCell::new(BlurState {
            surface,
            source: None,
            params: BlurParameters::new(0.0, config.blur.radius, config.blur.tint_strength),
            reduced_motion: env::prefers_reduced_motion(),
        }));

        let weak: Weak<RefCell<BlurState>> = Rc::downgrade(&state);
        let frames = Rc::new(FrameLoop::new(move |now| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let keep_going = state.borrow().render(now);
            keep_going
        }));

        Self {
            state,
            frames,
            ready_listener: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().surface.is_initialized()
    }

    pub fn canvas(&self) -> HtmlCanvasElement {
        self.state.borrow().surface.canvas().clone()
    }

    pub fn parameters(&self) -> BlurParameters {
        self.state.borrow().params
    }

    /// Swaps the media element. Passing the element already shown does
    /// nothing.
    pub fn set_source(&mut self, source: Option<TextureSource>) {
        if self.state.borrow().source == source {
            return;
        }
        self.frames.cancel();
        self.ready_listener = None;

        if let Some(source) = &source {
            let frames = Rc::downgrade(&self.frames);
            match DomListener::new(source.element(), source.ready_event(), move |_| {
                if let Some(frames) = frames.upgrade() {
                    frames.start();
                }
            }) {
                Ok(listener) => self.ready_listener = Some(listener),
                Err(err) => warn!("could not watch media readiness: {err}"),
            }
            debug!("blur overlay source set ({:?})", source.kind());
        }

        self.state.borrow_mut().source = source;
        self.request_redraw();
    }

    /// Updates intensity, radius and tint. Unchanged values do not redraw.
    pub fn set_parameters(&mut self, params: BlurParameters) {
        {
            let mut state = self.state.borrow_mut();
            if state.params == params {
                return;
            }
            state.params = params;
        }
        self.request_redraw();
    }

    fn request_redraw(&self) {
        let state = self.state.borrow();
        if state.surface.is_initialized() && state.source.is_some() {
            self.frames.start();
        }
    }

    pub fn dispose(&mut self) {
        self.frames.cancel();
        self.ready_listener = None;
        let mut state = self.state.borrow_mut();
        state.source = None;
        state.surface.teardown();
    }
}

impl Drop for BlurOverlay {
    fn drop(&mut self) {
        self.dispose();
    }
}
