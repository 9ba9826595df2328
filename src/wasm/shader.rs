//! GLSL program compilation and uniform/attribute lookup.

use std::collections::HashMap;

use log::{debug, warn};
use web_sys::{WebGl2RenderingContext as GL, WebGlProgram, WebGlShader, WebGlUniformLocation};

use crate::error::{FxError, Result, ShaderStage};

pub const PASSTHROUGH_VERT: &str = include_str!("../shaders/passthrough.vert.glsl");
pub const BLUR_FRAG: &str = include_str!("../shaders/blur.frag.glsl");
pub const PERLIN_FRAG: &str = include_str!("../shaders/perlin_transition.frag.glsl");

/// A uniform location, or the absent sentinel for names the driver
/// optimized away. Setting a value on an absent slot does nothing.
#[derive(Debug, Clone, Default)]
pub struct UniformSlot(Option<WebGlUniformLocation>);

impl UniformSlot {
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn location(&self) -> Option<&WebGlUniformLocation> {
        self.0.as_ref()
    }
}

/// A vertex attribute index, or the absent sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttribSlot(Option<u32>);

impl AttribSlot {
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn index(&self) -> Option<u32> {
        self.0
    }
}

/// A linked program plus the locations it was asked to resolve up front.
#[derive(Debug)]
pub struct ShaderProgram {
    program: Option<WebGlProgram>,
    uniforms: HashMap<&'static str, UniformSlot>,
    attributes: HashMap<&'static str, AttribSlot>,
}

impl ShaderProgram {
    /// Compiles and links `vertex` and `fragment`, then resolves the named
    /// uniforms and attributes. Partially created GL objects are deleted
    /// before an error is returned.
    pub fn compile(
        gl: &GL,
        vertex: &str,
        fragment: &str,
        uniforms: &[&'static str],
        attributes: &[&'static str],
    ) -> Result<Self> {
        let vs = compile_stage(gl, ShaderStage::Vertex, vertex)?;
        let fs = match compile_stage(gl, ShaderStage::Fragment, fragment) {
            Ok(fs) => fs,
            Err(err) => {
                gl.delete_shader(Some(&vs));
                return Err(err);
            }
        };

        let program = link(gl, &vs, &fs);
        // the linked program keeps the compiled code
        if let Ok(program) = &program {
            gl.detach_shader(program, &vs);
            gl.detach_shader(program, &fs);
        }
        gl.delete_shader(Some(&vs));
        gl.delete_shader(Some(&fs));
        let program = program?;

        let uniforms = uniforms
            .iter()
            .map(|&name| (name, lookup_uniform(gl, &program, name)))
            .collect();
        let attributes = attributes
            .iter()
            .map(|&name| (name, lookup_attribute(gl, &program, name)))
            .collect();

        Ok(Self {
            program: Some(program),
            uniforms,
            attributes,
        })
    }

    /// Location of `name`. Names not resolved at compile time are looked up
    /// on demand.
    pub fn uniform(&self, gl: &GL, name: &str) -> UniformSlot {
        if let Some(slot) = self.uniforms.get(name) {
            return slot.clone();
        }
        match &self.program {
            Some(program) => lookup_uniform(gl, program, name),
            None => UniformSlot::default(),
        }
    }

    pub fn attribute(&self, gl: &GL, name: &str) -> AttribSlot {
        if let Some(slot) = self.attributes.get(name) {
            return *slot;
        }
        match &self.program {
            Some(program) => lookup_attribute(gl, program, name),
            None => AttribSlot::default(),
        }
    }

    pub fn use_program(&self, gl: &GL) {
        gl.use_program(self.program.as_ref());
    }

    pub fn set_f32(&self, gl: &GL, name: &str, value: f32) {
        if let Some(location) = self.uniform(gl, name).location() {
            gl.uniform1f(Some(location), value);
        }
    }

    pub fn set_vec2(&self, gl: &GL, name: &str, x: f32, y: f32) {
        if let Some(location) = self.uniform(gl, name).location() {
            gl.uniform2f(Some(location), x, y);
        }
    }

    pub fn set_sampler(&self, gl: &GL, name: &str, unit: i32) {
        if let Some(location) = self.uniform(gl, name).location() {
            gl.uniform1i(Some(location), unit);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.program.is_none()
    }

    pub fn dispose(&mut self, gl: &GL) {
        if let Some(program) = self.program.take() {
            gl.delete_program(Some(&program));
            self.uniforms.clear();
            self.attributes.clear();
        }
    }
}

fn compile_stage(gl: &GL, stage: ShaderStage, source: &str) -> Result<WebGlShader> {
    let kind = match stage {
        ShaderStage::Vertex => GL::VERTEX_SHADER,
        ShaderStage::Fragment => GL::FRAGMENT_SHADER,
    };
    let shader = gl
        .create_shader(kind)
        .ok_or(FxError::ResourceCreation("shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    let compiled = gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false);
    if compiled {
        return Ok(shader);
    }

    let log = gl
        .get_shader_info_log(&shader)
        .unwrap_or_else(|| "unknown error".into());
    gl.delete_shader(Some(&shader));
    Err(FxError::ShaderCompile { stage, log })
}

fn link(gl: &GL, vs: &WebGlShader, fs: &WebGlShader) -> Result<WebGlProgram> {
    let program = gl
        .create_program()
        .ok_or(FxError::ResourceCreation("program"))?;
    gl.attach_shader(&program, vs);
    gl.attach_shader(&program, fs);
    gl.link_program(&program);

    let linked = gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false);
    if linked {
        debug!("shader program linked");
        return Ok(program);
    }

    let log = gl
        .get_program_info_log(&program)
        .unwrap_or_else(|| "unknown error".into());
    gl.delete_program(Some(&program));
    Err(FxError::ProgramLink { log })
}

fn lookup_uniform(gl: &GL, program: &WebGlProgram, name: &str) -> UniformSlot {
    let location = gl.get_uniform_location(program, name);
    if location.is_none() {
        warn!("uniform {name} is not active in this program");
    }
    UniformSlot(location)
}

fn lookup_attribute(gl: &GL, program: &WebGlProgram, name: &str) -> AttribSlot {
    let index = gl.get_attrib_location(program, name);
    if index < 0 {
        warn!("attribute {name} is not active in this program");
        return AttribSlot(None);
    }
    AttribSlot(Some(index as u32))
}
