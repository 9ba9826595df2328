//! Browser environment probes, each evaluated once per page.

use std::cell::Cell;

use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext as GL, Window};

use crate::error::{FxError, Result};
use crate::wasm::resources;

thread_local! {
    static WEBGL_SUPPORTED: Cell<Option<bool>> = const { Cell::new(None) };
    static REDUCED_MOTION: Cell<Option<bool>> = const { Cell::new(None) };
}

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| FxError::Dom("no window".into()))
}

/// Whether WebGL2 can be used at all. The probe context is lost right away
/// so it does not count against the browser's context limit.
pub fn webgl_supported() -> bool {
    WEBGL_SUPPORTED.with(|cell| {
        if let Some(known) = cell.get() {
            return known;
        }
        let supported = probe_webgl().unwrap_or(false);
        cell.set(Some(supported));
        supported
    })
}

fn probe_webgl() -> Result<bool> {
    let document = window()?
        .document()
        .ok_or_else(|| FxError::Dom("no document".into()))?;
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")?
        .dyn_into()
        .map_err(|_| FxError::Dom("created element is not a canvas".into()))?;
    match canvas.get_context("webgl2")? {
        Some(context) => match context.dyn_into::<GL>() {
            Ok(gl) => {
                resources::lose_context(&gl);
                Ok(true)
            }
            Err(_) => Ok(false),
        },
        None => Ok(false),
    }
}

/// The OS-level `prefers-reduced-motion: reduce` preference.
pub fn prefers_reduced_motion() -> bool {
    REDUCED_MOTION.with(|cell| {
        if let Some(known) = cell.get() {
            return known;
        }
        let reduce = window()
            .ok()
            .and_then(|w| w.match_media("(prefers-reduced-motion: reduce)").ok().flatten())
            .map(|query| query.matches())
            .unwrap_or(false);
        cell.set(Some(reduce));
        reduce
    })
}

/// Milliseconds on the same clock as `requestAnimationFrame` timestamps.
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}

pub fn device_pixel_ratio(cap: Option<f64>) -> f64 {
    let dpr = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .filter(|dpr| *dpr > 0.0)
        .unwrap_or(1.0);
    match cap {
        Some(cap) => dpr.min(cap),
        None => dpr,
    }
}

/// Viewport size in CSS pixels.
pub fn viewport() -> (f64, f64) {
    let Ok(window) = window() else {
        return (0.0, 0.0);
    };
    let dimension = |value: std::result::Result<wasm_bindgen::JsValue, _>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
    };
    (dimension(window.inner_width()), dimension(window.inner_height()))
}
