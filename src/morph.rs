//! DOM-level morph of a gallery thumbnail onto its detail-page slot.

use crate::easing::CubicBezier;

/// An axis-aligned rectangle in CSS pixels, viewport-relative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// A rect with no area cannot be a morph target: it means layout has not
    /// settled yet.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn lerp(&self, to: &Rect, t: f64) -> Rect {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Rect {
            x: mix(self.x, to.x),
            y: mix(self.y, to.y),
            width: mix(self.width, to.width),
            height: mix(self.height, to.height),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphAnimation {
    from: Rect,
    to: Rect,
    duration_ms: f64,
    easing: CubicBezier,
}

impl MorphAnimation {
    pub fn new(from: Rect, to: Rect, duration_ms: f64, easing: CubicBezier) -> Self {
        Self {
            from,
            to,
            duration_ms: duration_ms.max(0.0),
            easing,
        }
    }

    pub fn target(&self) -> Rect {
        self.to
    }

    pub fn is_finished(&self, elapsed_ms: f64) -> bool {
        elapsed_ms >= self.duration_ms
    }

    /// Rect to paint `elapsed_ms` after the morph started.
    pub fn frame_at(&self, elapsed_ms: f64) -> Rect {
        if self.is_finished(elapsed_ms) {
            return self.to;
        }
        let t = (elapsed_ms / self.duration_ms).clamp(0.0, 1.0);
        self.from.lerp(&self.to, self.easing.evaluate(t))
    }
}

/// Opacity of the morphed thumbnail while the noise transition plays over
/// it: fully visible until 20% progress, gone by 40%.
pub fn overlay_opacity(noise_progress: f64) -> f64 {
    if noise_progress < 0.2 {
        1.0
    } else {
        (1.0 - (noise_progress - 0.2) * 5.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FROM: Rect = Rect::new(10.0, 20.0, 100.0, 80.0);
    const TO: Rect = Rect::new(200.0, 100.0, 600.0, 480.0);

    #[test]
    fn starts_at_source_and_lands_on_target() {
        let morph = MorphAnimation::new(FROM, TO, 800.0, CubicBezier::STANDARD);
        assert_eq!(morph.frame_at(0.0), FROM);
        assert_eq!(morph.frame_at(800.0), TO);
        assert_eq!(morph.frame_at(5000.0), TO);
        assert!(!morph.is_finished(799.0));
        assert!(morph.is_finished(800.0));
    }

    #[test]
    fn midpoint_lies_between_endpoints() {
        let morph = MorphAnimation::new(FROM, TO, 800.0, CubicBezier::STANDARD);
        let mid = morph.frame_at(400.0);
        assert!(mid.x > FROM.x && mid.x < TO.x);
        assert!(mid.width > FROM.width && mid.width < TO.width);
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let morph = MorphAnimation::new(FROM, TO, 0.0, CubicBezier::STANDARD);
        assert!(morph.is_finished(0.0));
        assert_eq!(morph.frame_at(0.0), TO);
    }

    #[test]
    fn empty_rects_are_detected() {
        assert!(Rect::default().is_empty());
        assert!(Rect::new(0.0, 0.0, 10.0, 0.0).is_empty());
        assert!(!FROM.is_empty());
        assert_eq!(TO.center(), (500.0, 340.0));
    }

    #[test]
    fn overlay_fades_between_twenty_and_forty_percent() {
        assert_eq!(overlay_opacity(0.0), 1.0);
        assert_eq!(overlay_opacity(0.19), 1.0);
        assert!((overlay_opacity(0.3) - 0.5).abs() < 1e-9);
        assert_eq!(overlay_opacity(0.4), 0.0);
        assert_eq!(overlay_opacity(1.0), 0.0);
    }
}
