//! Scroll-coupled blur/tint overlay and gallery → detail page transitions
//! for the portfolio site, rendered with WebGL2 from WebAssembly.

pub mod blur_params;
pub mod choreographer;
pub mod config;
pub mod context_tracker;
pub mod easing;
pub mod error;
pub mod media;
pub mod morph;
pub mod scroll;
pub mod timeline;

pub use choreographer::{Choreographer, TransitionPhase, TransitionRequest, TransitionToken};
pub use config::FxConfig;
pub use context_tracker::{ContextLease, ContextTracker};
pub use error::{FxError, Result};

// Only compile browser-facing code when targeting wasm32.

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use wasm_bindgen::prelude::*;

    pub mod bindings;
    pub mod blur_overlay;
    pub mod director;
    pub mod env;
    pub mod frame;
    pub mod media_element;
    pub mod perlin_overlay;
    pub mod resources;
    pub mod shader;
    pub mod surface;

    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        // the sink accepts everything; `configure` narrows the level later
        wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
        log::set_max_level(crate::FxConfig::default().log_level);
        log::info!(
            "portfolio_fx ready (webgl2: {})",
            if env::webgl_supported() { "yes" } else { "no" }
        );
        Ok(())
    }
}
