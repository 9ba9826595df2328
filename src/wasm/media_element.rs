//! DOM media elements that can be uploaded as textures.

use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{HtmlImageElement, HtmlVideoElement, WebGl2RenderingContext as GL, WebGlTexture};

use crate::error::{FxError, Result};
use crate::media::{MediaKind, MediaReadyState};
use crate::wasm::resources;

/// An `<img>` or `<video>` feeding an overlay texture.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    Image(HtmlImageElement),
    Video(HtmlVideoElement),
}

impl TextureSource {
    /// Accepts an `HTMLImageElement` or `HTMLVideoElement` from JavaScript.
    pub fn from_js(value: &JsValue) -> Result<Self> {
        if let Some(video) = value.dyn_ref::<HtmlVideoElement>() {
            return Ok(TextureSource::Video(video.clone()));
        }
        if let Some(image) = value.dyn_ref::<HtmlImageElement>() {
            return Ok(TextureSource::Image(image.clone()));
        }
        Err(FxError::Dom("expected an <img> or <video> element".into()))
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            TextureSource::Image(_) => MediaKind::Image,
            TextureSource::Video(_) => MediaKind::Video,
        }
    }

    pub fn readiness(&self) -> MediaReadyState {
        match self {
            TextureSource::Image(image) => image_readiness(image),
            TextureSource::Video(video) => MediaReadyState::of_video(
                video.ready_state(),
                video.video_width(),
                video.video_height(),
            ),
        }
    }

    /// The event fired once the element first has decodable pixels.
    pub fn ready_event(&self) -> &'static str {
        match self {
            TextureSource::Image(_) => "load",
            TextureSource::Video(_) => "loadeddata",
        }
    }

    pub fn element(&self) -> &web_sys::EventTarget {
        match self {
            TextureSource::Image(image) => image.as_ref(),
            TextureSource::Video(video) => video.as_ref(),
        }
    }

    pub fn upload(&self, gl: &GL, unit: u32, texture: &WebGlTexture) -> Result<()> {
        match self {
            TextureSource::Image(image) => resources::upload_image(gl, unit, texture, image),
            TextureSource::Video(video) => resources::upload_video(gl, unit, texture, video),
        }
    }
}

pub fn image_readiness(image: &HtmlImageElement) -> MediaReadyState {
    MediaReadyState::of_image(image.complete(), image.natural_width(), image.natural_height())
}

/// Starts loading `url` into a detached, CORS-enabled `<img>` so its pixels
/// can be uploaded.
pub fn load_image(url: &str) -> Result<HtmlImageElement> {
    let image = HtmlImageElement::new()?;
    image.set_cross_origin(Some("anonymous"));
    image.set_src(url);
    Ok(image)
}
