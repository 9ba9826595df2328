//! Per-frame parameters for the landing blur/tint overlay.

use crate::config::BlurConfig;
use crate::media::MediaKind;
use crate::scroll::scroll_progress;

/// Pure render parameters, recomputed from scroll position every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurParameters {
    intensity: f32,
    radius: f32,
    tint_strength: f32,
}

impl BlurParameters {
    /// Builds parameters, clamping intensity and tint into `[0, 1]` and the
    /// radius to be non-negative.
    pub fn new(intensity: f32, radius: f32, tint_strength: f32) -> Self {
        Self {
            intensity: unit(intensity),
            radius: if radius.is_finite() { radius.max(0.0) } else { 0.0 },
            tint_strength: unit(tint_strength),
        }
    }

    pub fn from_scroll(scroll_y: f64, config: &BlurConfig) -> Self {
        let intensity = scroll_progress(scroll_y, config.scroll_threshold) as f32;
        Self::new(intensity, config.radius, config.tint_strength)
    }

    pub fn with_intensity(self, intensity: f32) -> Self {
        Self::new(intensity, self.radius, self.tint_strength)
    }

    pub fn with_radius(self, radius: f32) -> Self {
        Self::new(self.intensity, radius, self.tint_strength)
    }

    pub fn with_tint_strength(self, tint_strength: f32) -> Self {
        Self::new(self.intensity, self.radius, tint_strength)
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn tint_strength(&self) -> f32 {
        self.tint_strength
    }

    /// At zero intensity the pass leaves the source untouched.
    pub fn is_passthrough(&self) -> bool {
        self.intensity == 0.0
    }
}

impl Default for BlurParameters {
    fn default() -> Self {
        let config = BlurConfig::default();
        Self::new(0.0, config.radius, config.tint_strength)
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Value of the `u_time` uniform. Frozen at zero under reduced motion so
/// the animated grain stops while the scroll-driven blur still applies.
pub fn shader_time(now_ms: f64, reduced_motion: bool) -> f32 {
    if reduced_motion {
        0.0
    } else {
        (now_ms * 0.001) as f32
    }
}

/// Whether the overlay should request another animation frame after one
/// has run. Video content changes continuously; a still image only needs a
/// redraw when its content or the parameters change.
pub fn keeps_looping(kind: MediaKind) -> bool {
    match kind {
        MediaKind::Video => true,
        MediaKind::Image => false,
    }
}
