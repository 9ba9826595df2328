//! JavaScript-facing API.
//!
//! Constructors never throw: an effect that cannot run is logged and left
//! inert so the page still renders its static content.

use std::cell::RefCell;

use js_sys::{Array, Function};
use log::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement};

use crate::choreographer::TransitionRequest;
use crate::config::FxConfig;
use crate::context_tracker::ContextTracker;
use crate::media;
use crate::morph::Rect;
use crate::scroll;
use crate::wasm::blur_overlay::BlurOverlay;
use crate::wasm::director::TransitionDirector;
use crate::wasm::env;
use crate::wasm::media_element::TextureSource;
use crate::wasm::perlin_overlay::{PerlinOptions, PerlinOverlay};

thread_local! {
    static CONFIG: RefCell<FxConfig> = RefCell::new(FxConfig::default());
}

fn current_config() -> FxConfig {
    CONFIG.with(|config| config.borrow().clone())
}

/// Applies a JSON configuration document. Missing keys keep their
/// defaults; `undefined` restores every default.
#[wasm_bindgen]
pub fn configure(config_json: Option<String>) -> Result<(), JsValue> {
    let config = match config_json {
        Some(text) => FxConfig::from_json(&text)?,
        None => FxConfig::default(),
    };
    log::set_max_level(config.log_level);
    ContextTracker::shared().set_ceiling(config.gpu.context_ceiling);
    info!("configuration applied: {config:?}");
    CONFIG.with(|current| *current.borrow_mut() = config);
    Ok(())
}

#[wasm_bindgen(js_name = webglSupported)]
pub fn webgl_supported() -> bool {
    env::webgl_supported()
}

#[wasm_bindgen(js_name = prefersReducedMotion)]
pub fn prefers_reduced_motion() -> bool {
    env::prefers_reduced_motion()
}

/// Normalized blur intensity for a vertical scroll offset.
#[wasm_bindgen(js_name = scrollProgress)]
pub fn scroll_progress(scroll_y: f64, threshold: f64) -> f64 {
    scroll::scroll_progress(scroll_y, threshold)
}

/// `media` reordered so the entry matching `source` comes first.
#[wasm_bindgen(js_name = orderedMedia)]
pub fn ordered_media(source: &str, media: Array) -> Array {
    let urls = strings(&media);
    media::order_with_thumbnail_first(source, &urls)
        .into_iter()
        .map(JsValue::from)
        .collect()
}

#[wasm_bindgen(js_name = liveContexts)]
pub fn live_contexts() -> usize {
    ContextTracker::shared().live()
}

fn strings(values: &Array) -> Vec<String> {
    values.iter().filter_map(|value| value.as_string()).collect()
}

fn call_js(callback: &Function) {
    if let Err(err) = callback.call0(&JsValue::NULL) {
        warn!("completion callback threw: {err:?}");
    }
}

#[wasm_bindgen]
pub struct BlurOverlayHandle {
    overlay: BlurOverlay,
    scroll_threshold: f64,
}

#[wasm_bindgen]
impl BlurOverlayHandle {
    /// `media` is the `<video>` or `<img>` to blur.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, media: JsValue) -> BlurOverlayHandle {
        let config = current_config();
        let mut overlay = BlurOverlay::new(canvas, ContextTracker::shared(), &config);
        overlay.set_source(source_from_js(&media));
        BlurOverlayHandle {
            overlay,
            scroll_threshold: config.blur.scroll_threshold,
        }
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.overlay.is_active()
    }

    #[wasm_bindgen(js_name = setMedia)]
    pub fn set_media(&mut self, media: JsValue) {
        self.overlay.set_source(source_from_js(&media));
    }

    /// Derives intensity from the page's vertical scroll offset.
    #[wasm_bindgen(js_name = setScroll)]
    pub fn set_scroll(&mut self, scroll_y: f64) {
        let intensity = scroll::scroll_progress(scroll_y, self.scroll_threshold);
        self.set_intensity(intensity as f32);
    }

    #[wasm_bindgen(js_name = setIntensity)]
    pub fn set_intensity(&mut self, intensity: f32) {
        let params = self.overlay.parameters().with_intensity(intensity);
        self.overlay.set_parameters(params);
    }

    #[wasm_bindgen(js_name = setRadius)]
    pub fn set_radius(&mut self, radius: f32) {
        let params = self.overlay.parameters().with_radius(radius);
        self.overlay.set_parameters(params);
    }

    #[wasm_bindgen(js_name = setTint)]
    pub fn set_tint(&mut self, tint_strength: f32) {
        let params = self.overlay.parameters().with_tint_strength(tint_strength);
        self.overlay.set_parameters(params);
    }

    #[wasm_bindgen(getter)]
    pub fn intensity(&self) -> f32 {
        self.overlay.parameters().intensity()
    }

    pub fn dispose(&mut self) {
        self.overlay.dispose();
    }
}

fn source_from_js(media: &JsValue) -> Option<TextureSource> {
    if media.is_null() || media.is_undefined() {
        return None;
    }
    match TextureSource::from_js(media) {
        Ok(source) => Some(source),
        Err(err) => {
            warn!("blur overlay media ignored: {err}");
            None
        }
    }
}

#[wasm_bindgen]
pub struct PerlinOverlayHandle {
    overlay: PerlinOverlay,
}

#[wasm_bindgen]
impl PerlinOverlayHandle {
    /// Supplying `progress` drives the transition externally; otherwise it
    /// animates over `duration` milliseconds.
    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        from: HtmlImageElement,
        to: HtmlImageElement,
        progress: Option<f64>,
        duration: Option<f64>,
        smoothness: Option<f32>,
        center_x: Option<f64>,
        center_y: Option<f64>,
        on_complete: Option<Function>,
    ) -> PerlinOverlayHandle {
        let config = current_config();
        let mut options = PerlinOptions::from_config(&config.transition);
        options.progress = progress;
        if let Some(duration) = duration.filter(|d| d.is_finite()) {
            options.duration_ms = duration.max(0.0);
        }
        if let Some(smoothness) = smoothness.filter(|s| s.is_finite()) {
            options.smoothness = smoothness.clamp(0.0, 1.0);
        }
        options.center = center_x.zip(center_y);

        let mut overlay = PerlinOverlay::new(
            canvas,
            ContextTracker::shared(),
            config.gpu.max_pixel_ratio,
            from,
            to,
            options,
        );
        if let Some(callback) = on_complete {
            overlay.on_complete(move || call_js(&callback));
        }
        PerlinOverlayHandle { overlay }
    }

    #[wasm_bindgen(js_name = setProgress)]
    pub fn set_progress(&self, progress: f64) {
        self.overlay.set_progress(progress);
    }

    #[wasm_bindgen(js_name = setImages)]
    pub fn set_images(&mut self, from: HtmlImageElement, to: HtmlImageElement) {
        self.overlay.set_images(from, to);
    }

    #[wasm_bindgen(js_name = setCenter)]
    pub fn set_center(&self, center_x: Option<f64>, center_y: Option<f64>) {
        self.overlay.set_center(center_x.zip(center_y));
    }

    #[wasm_bindgen(js_name = setSmoothness)]
    pub fn set_smoothness(&self, smoothness: f32) {
        self.overlay.set_smoothness(smoothness);
    }

    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> f64 {
        self.overlay.progress()
    }

    #[wasm_bindgen(getter)]
    pub fn completed(&self) -> bool {
        self.overlay.has_completed()
    }

    pub fn dispose(&mut self) {
        self.overlay.dispose();
    }
}

#[wasm_bindgen]
pub struct TransitionDirectorHandle {
    director: TransitionDirector,
}

#[wasm_bindgen]
impl TransitionDirectorHandle {
    /// `morph` is the fixed-position element that carries the thumbnail;
    /// `noise_canvas` hosts the noise transition.
    #[wasm_bindgen(constructor)]
    pub fn new(morph: HtmlElement, noise_canvas: HtmlCanvasElement) -> TransitionDirectorHandle {
        TransitionDirectorHandle {
            director: TransitionDirector::new(
                morph,
                noise_canvas,
                ContextTracker::shared(),
                current_config(),
            ),
        }
    }

    /// Elements kept transparent until the transition completes.
    #[wasm_bindgen(js_name = setContent)]
    pub fn set_content(&self, elements: Array) {
        let elements = elements
            .iter()
            .filter_map(|value| value.dyn_into::<HtmlElement>().ok())
            .collect();
        self.director.set_content(elements);
    }

    /// Starts the transition from a gallery thumbnail at
    /// `(x, y, width, height)` towards `destination`.
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        source_image: String,
        media: Array,
        destination: Option<HtmlImageElement>,
        on_complete: Option<Function>,
    ) {
        let request = TransitionRequest {
            source_rect: Rect::new(x, y, width, height),
            source_image,
            media: strings(&media),
        };
        let on_complete = on_complete
            .map(|callback| Box::new(move || call_js(&callback)) as Box<dyn FnOnce()>);
        self.director.begin(request, destination, on_complete);
    }

    pub fn cancel(&self) {
        self.director.cancel();
    }

    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> String {
        self.director.phase().as_str().to_owned()
    }

    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> f64 {
        self.director.progress()
    }

    /// The noise canvas in the document; it is replaced after a lost context.
    #[wasm_bindgen(getter, js_name = noiseCanvas)]
    pub fn noise_canvas(&self) -> HtmlCanvasElement {
        self.director.noise_canvas()
    }

    pub fn dispose(&self) {
        self.director.cancel();
    }
}
