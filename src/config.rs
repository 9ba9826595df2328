//! Runtime configuration supplied by the hosting page as JSON.
//!
//! Every section is optional; missing keys fall back to the values the site
//! was tuned with.

use log::LevelFilter;
use serde::Deserialize;

use crate::context_tracker::DEFAULT_CONTEXT_CEILING;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub blur: BlurConfig,
    pub transition: TransitionConfig,
    pub gpu: GpuConfig,
    pub log_level: LevelFilter,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            blur: BlurConfig::default(),
            transition: TransitionConfig::default(),
            gpu: GpuConfig::default(),
            log_level: LevelFilter::Info,
        }
    }
}

/// Landing-page blur/tint overlay tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Pixel-space kernel scale at full intensity.
    pub radius: f32,
    /// Burgundy tint strength at full intensity.
    pub tint_strength: f32,
    /// Scroll offset (CSS px) at which the blur reaches full intensity.
    pub scroll_threshold: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            tint_strength: 0.32,
            scroll_threshold: 500.0,
        }
    }
}

/// Gallery-to-detail transition timings, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub morph_ms: f64,
    pub pause_ms: f64,
    pub noise_ms: f64,
    pub smoothness: f32,
    /// Cubic-bezier control points `(x1, y1, x2, y2)` for the morph.
    pub morph_easing: [f64; 4],
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            morph_ms: 800.0,
            pause_ms: 300.0,
            noise_ms: 1000.0,
            smoothness: 0.5,
            morph_easing: [0.4, 0.0, 0.2, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Live-context count above which an advisory warning is logged.
    pub context_ceiling: usize,
    /// Optional cap on `devicePixelRatio` when sizing backing stores.
    pub max_pixel_ratio: Option<f64>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            context_ceiling: DEFAULT_CONTEXT_CEILING,
            max_pixel_ratio: None,
        }
    }
}

impl FxConfig {
    /// Parses a JSON document, filling gaps with defaults and clamping
    /// out-of-range values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: FxConfig = serde_json::from_str(text)?;
        Ok(config.sanitized())
    }

    pub fn sanitized(mut self) -> Self {
        let t = &mut self.transition;
        t.morph_ms = non_negative(t.morph_ms);
        t.pause_ms = non_negative(t.pause_ms);
        t.noise_ms = non_negative(t.noise_ms);
        t.smoothness = if t.smoothness.is_finite() {
            t.smoothness.clamp(0.0, 1.0)
        } else {
            TransitionConfig::default().smoothness
        };

        let b = &mut self.blur;
        b.radius = if b.radius.is_finite() { b.radius.max(0.0) } else { 0.0 };
        b.tint_strength = if b.tint_strength.is_finite() {
            b.tint_strength.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if let Some(cap) = self.gpu.max_pixel_ratio {
            if !cap.is_finite() || cap <= 0.0 {
                self.gpu.max_pixel_ratio = None;
            }
        }
        self
    }
}

fn non_negative(ms: f64) -> f64 {
    if ms.is_finite() {
        ms.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = FxConfig::from_json("{}").unwrap();
        assert_eq!(config, FxConfig::default());
        assert_eq!(config.blur.radius, 20.0);
        assert_eq!(config.blur.tint_strength, 0.32);
        assert_eq!(config.transition.noise_ms, 1000.0);
        assert_eq!(config.gpu.context_ceiling, 16);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config =
            FxConfig::from_json(r#"{"transition": {"pause_ms": 150}, "log_level": "debug"}"#)
                .unwrap();
        assert_eq!(config.transition.pause_ms, 150.0);
        assert_eq!(config.transition.morph_ms, 800.0);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = FxConfig::from_json(
            r#"{"transition": {"noise_ms": -5, "smoothness": 3.0},
                "blur": {"tint_strength": 1.5},
                "gpu": {"max_pixel_ratio": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.transition.noise_ms, 0.0);
        assert_eq!(config.transition.smoothness, 1.0);
        assert_eq!(config.blur.tint_strength, 1.0);
        assert_eq!(config.gpu.max_pixel_ratio, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(FxConfig::from_json("{\"blur\": ").is_err());
    }
}
