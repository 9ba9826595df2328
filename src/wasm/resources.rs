//! Creation and disposal of textures and buffers, plus media uploads.

use js_sys::Float32Array;
use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlImageElement, HtmlVideoElement, WebGl2RenderingContext as GL, WebGlBuffer, WebGlTexture,
    WebglLoseContext,
};

use crate::error::{FxError, Result};

/// A 2D texture sampled with clamp-to-edge wrapping and linear filtering.
/// No mipmaps are generated since the content changes every frame.
pub fn create_texture(gl: &GL) -> Result<WebGlTexture> {
    let texture = gl
        .create_texture()
        .ok_or(FxError::ResourceCreation("texture"))?;
    gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::LINEAR as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::LINEAR as i32);
    Ok(texture)
}

pub fn dispose_texture(gl: &GL, texture: Option<WebGlTexture>) {
    if let Some(texture) = texture {
        gl.delete_texture(Some(&texture));
    }
}

/// A static `ARRAY_BUFFER` holding `data`.
pub fn create_buffer(gl: &GL, data: &[f32]) -> Result<WebGlBuffer> {
    let buffer = gl
        .create_buffer()
        .ok_or(FxError::ResourceCreation("buffer"))?;
    gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
    let array = Float32Array::from(data);
    gl.buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &array, GL::STATIC_DRAW);
    Ok(buffer)
}

pub fn dispose_buffer(gl: &GL, buffer: Option<WebGlBuffer>) {
    if let Some(buffer) = buffer {
        gl.delete_buffer(Some(&buffer));
    }
}

/// Binds `texture` to `unit` and uploads the image's current pixels.
pub fn upload_image(gl: &GL, unit: u32, texture: &WebGlTexture, image: &HtmlImageElement) -> Result<()> {
    gl.active_texture(GL::TEXTURE0 + unit);
    gl.bind_texture(GL::TEXTURE_2D, Some(texture));
    gl.tex_image_2d_with_u32_and_u32_and_html_image_element(
        GL::TEXTURE_2D,
        0,
        GL::RGBA as i32,
        GL::RGBA,
        GL::UNSIGNED_BYTE,
        image,
    )?;
    Ok(())
}

/// Binds `texture` to `unit` and uploads the video's current frame.
pub fn upload_video(gl: &GL, unit: u32, texture: &WebGlTexture, video: &HtmlVideoElement) -> Result<()> {
    gl.active_texture(GL::TEXTURE0 + unit);
    gl.bind_texture(GL::TEXTURE_2D, Some(texture));
    gl.tex_image_2d_with_u32_and_u32_and_html_video_element(
        GL::TEXTURE_2D,
        0,
        GL::RGBA as i32,
        GL::RGBA,
        GL::UNSIGNED_BYTE,
        video,
    )?;
    Ok(())
}

/// Forces the context into the lost state so its GPU memory is freed now
/// rather than whenever the browser collects it.
pub fn lose_context(gl: &GL) {
    match gl.get_extension("WEBGL_lose_context") {
        Ok(Some(extension)) => {
            extension.unchecked_into::<WebglLoseContext>().lose_context();
            debug!("WebGL context lost on request");
        }
        _ => debug!("WEBGL_lose_context unavailable; context left to the collector"),
    }
}
