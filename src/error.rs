use std::fmt;

use thiserror::Error;

/// Which programmable stage a shader source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised by the overlay and transition machinery.
///
/// None of these are meant to reach the user as a crash: callers log them
/// and leave the affected effect inert.
#[derive(Debug, Error)]
pub enum FxError {
    #[error("WebGL2 is not supported in this browser")]
    Unsupported,

    #[error("failed to acquire a WebGL2 context")]
    ContextUnavailable,

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("shader program failed to link: {log}")]
    ProgramLink { log: String },

    #[error("failed to create {0}")]
    ResourceCreation(&'static str),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("DOM error: {0}")]
    Dom(String),
}

impl FxError {
    /// Level at which a caller that swallows this error should log it.
    /// Broken shaders are bugs in this crate; everything else is the
    /// browser declining.
    pub fn log_level(&self) -> log::Level {
        match self {
            FxError::ShaderCompile { .. } | FxError::ProgramLink { .. } => log::Level::Error,
            _ => log::Level::Warn,
        }
    }
}

pub type Result<T, E = FxError> = std::result::Result<T, E>;

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for FxError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        let message = value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}"));
        FxError::Dom(message)
    }
}

#[cfg(target_arch = "wasm32")]
impl From<FxError> for wasm_bindgen::JsValue {
    fn from(err: FxError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_the_stage_and_log() {
        let err = FxError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:3: 'foo' : undeclared identifier".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("fragment shader"));
        assert!(text.contains("undeclared identifier"));
    }

    #[test]
    fn shader_failures_log_as_errors() {
        let compile = FxError::ShaderCompile {
            stage: ShaderStage::Vertex,
            log: String::new(),
        };
        let link = FxError::ProgramLink { log: String::new() };
        assert_eq!(compile.log_level(), log::Level::Error);
        assert_eq!(link.log_level(), log::Level::Error);
        assert_eq!(FxError::Unsupported.log_level(), log::Level::Warn);
        assert_eq!(FxError::ContextUnavailable.log_level(), log::Level::Warn);
    }

    #[test]
    fn config_errors_convert_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FxError = parse.into();
        assert!(matches!(err, FxError::Config(_)));
    }
}
