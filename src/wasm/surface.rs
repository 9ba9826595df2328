//! One canvas, one WebGL2 context, and the GPU objects drawn with it.

use std::rc::Rc;

use log::{debug, info, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext as GL, WebGlBuffer, WebGlTexture};

use crate::context_tracker::{ContextLease, ContextTracker};
use crate::error::{FxError, Result};
use crate::wasm::frame::DomListener;
use crate::wasm::shader::{ShaderProgram, PASSTHROUGH_VERT};
use crate::wasm::{env, resources};

/// Clip-space corners of a full-viewport triangle strip.
pub const QUAD_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
/// Texture coordinates for [`QUAD_POSITIONS`]. V is flipped because image
/// rows arrive top row first.
pub const QUAD_TEX_COORDS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

pub const A_POSITION: &str = "a_position";
pub const A_TEX_COORD: &str = "a_texCoord";

/// The fragment stage and inputs a surface is initialized with.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceProgram {
    pub fragment: &'static str,
    pub uniforms: &'static [&'static str],
    pub textures: usize,
}

struct GpuState {
    gl: GL,
    program: ShaderProgram,
    positions: Option<WebGlBuffer>,
    tex_coords: Option<WebGlBuffer>,
    textures: Vec<WebGlTexture>,
    resize: Option<DomListener>,
    lease: ContextLease,
}

impl GpuState {
    fn create_objects(&mut self, textures: usize) -> Result<()> {
        self.positions = Some(resources::create_buffer(&self.gl, &QUAD_POSITIONS)?);
        self.tex_coords = Some(resources::create_buffer(&self.gl, &QUAD_TEX_COORDS)?);
        for _ in 0..textures {
            self.textures.push(resources::create_texture(&self.gl)?);
        }
        Ok(())
    }

    fn dispose_objects(&mut self) {
        for texture in self.textures.drain(..) {
            resources::dispose_texture(&self.gl, Some(texture));
        }
        resources::dispose_buffer(&self.gl, self.positions.take());
        resources::dispose_buffer(&self.gl, self.tex_coords.take());
        self.program.dispose(&self.gl);
    }
}

/// Owns every GPU object created for one canvas.
///
/// [`initialize`](Self::initialize) is a no-op while already initialized
/// and [`teardown`](Self::teardown) is a no-op while not; both may be
/// called any number of times. Dropping the surface tears it down.
pub struct RenderSurface {
    canvas: HtmlCanvasElement,
    tracker: Rc<ContextTracker>,
    max_pixel_ratio: Option<f64>,
    initialized: bool,
    state: Option<GpuState>,
}

impl RenderSurface {
    pub fn new(
        canvas: HtmlCanvasElement,
        tracker: Rc<ContextTracker>,
        max_pixel_ratio: Option<f64>,
    ) -> Self {
        Self {
            canvas,
            tracker,
            max_pixel_ratio,
            initialized: false,
            state: None,
        }
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn initialize(&mut self, program: SurfaceProgram) -> Result<()> {
        if self.initialized {
            debug!("render surface already initialized");
            return Ok(());
        }
        if !env::webgl_supported() {
            return Err(FxError::Unsupported);
        }

        let gl = match acquire_context(&self.canvas)? {
            gl if gl.is_context_lost() => {
                // a canvas keeps returning its lost context; draw on a fresh one
                self.replace_canvas()?;
                acquire_context(&self.canvas)?
            }
            gl => gl,
        };
        let lease = self.tracker.acquire();
        let state = match build_state(&gl, &self.canvas, self.max_pixel_ratio, program, lease) {
            Ok(state) => state,
            Err(err) => {
                // the lease dropped with the failed build
                resources::lose_context(&gl);
                return Err(err);
            }
        };

        self.state = Some(state);
        self.initialized = true;
        info!(
            "render surface initialized ({}x{})",
            self.canvas.width(),
            self.canvas.height()
        );
        Ok(())
    }

    fn replace_canvas(&mut self) -> Result<()> {
        let fresh: HtmlCanvasElement = self
            .canvas
            .clone_node()?
            .dyn_into()
            .map_err(|_| FxError::Dom("cloned node is not a canvas".into()))?;
        if self.canvas.parent_node().is_some() {
            self.canvas.replace_with_with_node_1(&fresh)?;
        }
        debug!("replaced canvas whose context was lost");
        self.canvas = fresh;
        Ok(())
    }

    pub fn teardown(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;

        let Some(mut state) = self.state.take() else {
            return;
        };
        state.resize = None;
        state.dispose_objects();
        resources::lose_context(&state.gl);
        state.lease.release();
        debug!("render surface torn down");
    }

    /// Prepares a frame: fits the backing store, clears to transparent and
    /// binds the program. `None` when the surface is not initialized.
    pub fn begin_frame(&self) -> Option<Frame<'_>> {
        let state = self.state.as_ref().filter(|_| self.initialized)?;
        fit_to_display(&self.canvas, &state.gl, self.max_pixel_ratio);
        state.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        state.gl.clear(GL::COLOR_BUFFER_BIT);
        state.program.use_program(&state.gl);
        Some(Frame {
            state,
            width: self.canvas.width(),
            height: self.canvas.height(),
        })
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A frame in progress on an initialized surface.
pub struct Frame<'a> {
    state: &'a GpuState,
    width: u32,
    height: u32,
}

impl<'a> Frame<'a> {
    pub fn gl(&self) -> &'a GL {
        &self.state.gl
    }

    pub fn program(&self) -> &'a ShaderProgram {
        &self.state.program
    }

    pub fn texture(&self, index: usize) -> Option<&'a WebGlTexture> {
        self.state.textures.get(index)
    }

    /// Backing-store size in device pixels.
    pub fn resolution(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }

    /// Binds the quad attributes and issues the single full-viewport draw.
    pub fn draw(self) {
        let gl = &self.state.gl;
        let program = &self.state.program;
        bind_attribute(gl, program.attribute(gl, A_POSITION).index(), self.state.positions.as_ref());
        bind_attribute(gl, program.attribute(gl, A_TEX_COORD).index(), self.state.tex_coords.as_ref());
        gl.draw_arrays(GL::TRIANGLE_STRIP, 0, 4);
    }
}

fn bind_attribute(gl: &GL, index: Option<u32>, buffer: Option<&WebGlBuffer>) {
    let (Some(index), Some(buffer)) = (index, buffer) else {
        return;
    };
    gl.bind_buffer(GL::ARRAY_BUFFER, Some(buffer));
    gl.enable_vertex_attrib_array(index);
    gl.vertex_attrib_pointer_with_i32(index, 2, GL::FLOAT, false, 0, 0);
}

/// Alpha on, premultiplied alpha off, so transparent pixels composite over
/// the DOM underneath.
fn acquire_context(canvas: &HtmlCanvasElement) -> Result<GL> {
    let options = js_sys::Object::new();
    js_sys::Reflect::set(&options, &"alpha".into(), &JsValue::TRUE)?;
    js_sys::Reflect::set(&options, &"premultipliedAlpha".into(), &JsValue::FALSE)?;

    let context = canvas
        .get_context_with_context_options("webgl2", &options)?
        .ok_or(FxError::ContextUnavailable)?;
    context.dyn_into::<GL>().map_err(|_| FxError::ContextUnavailable)
}

fn build_state(
    gl: &GL,
    canvas: &HtmlCanvasElement,
    max_pixel_ratio: Option<f64>,
    desc: SurfaceProgram,
    lease: ContextLease,
) -> Result<GpuState> {
    let program = ShaderProgram::compile(
        gl,
        PASSTHROUGH_VERT,
        desc.fragment,
        desc.uniforms,
        &[A_POSITION, A_TEX_COORD],
    )?;

    let mut state = GpuState {
        gl: gl.clone(),
        program,
        positions: None,
        tex_coords: None,
        textures: Vec::with_capacity(desc.textures),
        resize: None,
        lease,
    };
    if let Err(err) = state.create_objects(desc.textures) {
        state.dispose_objects();
        return Err(err);
    }

    gl.enable(GL::BLEND);
    gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
    fit_to_display(canvas, gl, max_pixel_ratio);

    let window = env::window()?;
    let resize = {
        let canvas = canvas.clone();
        let gl = gl.clone();
        DomListener::new(window.as_ref(), "resize", move |_| {
            fit_to_display(&canvas, &gl, max_pixel_ratio);
        })
    };
    match resize {
        Ok(listener) => state.resize = Some(listener),
        Err(err) => warn!("resize listener not attached: {err}"),
    }

    Ok(state)
}

/// Sizes the backing store to `clientSize × devicePixelRatio`.
fn fit_to_display(canvas: &HtmlCanvasElement, gl: &GL, max_pixel_ratio: Option<f64>) {
    let dpr = env::device_pixel_ratio(max_pixel_ratio);
    let width = ((canvas.client_width() as f64 * dpr).round() as u32).max(1);
    let height = ((canvas.client_height() as f64 * dpr).round() as u32).max(1);
    if canvas.width() != width || canvas.height() != height {
        canvas.set_width(width);
        canvas.set_height(height);
    }
    gl.viewport(0, 0, width as i32, height as i32);
}
