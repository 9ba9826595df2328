/// A CSS-style `cubic-bezier(x1, y1, x2, y2)` timing curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    /// Material "standard" curve used for the thumbnail morph.
    pub const STANDARD: CubicBezier = CubicBezier::new(0.4, 0.0, 0.2, 1.0);

    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_points(points: [f64; 4]) -> Self {
        let [x1, y1, x2, y2] = points;
        Self::new(x1.clamp(0.0, 1.0), y1, x2.clamp(0.0, 1.0), y2)
    }

    /// Eased value for linear time `t` in `[0, 1]`.
    pub fn evaluate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        // Newton-Raphson for the curve parameter whose x equals t
        let mut guess = t;
        for _ in 0..8 {
            let x = bezier_value(self.x1, self.x2, guess) - t;
            if x.abs() < 1e-6 {
                break;
            }
            let dx = bezier_derivative(self.x1, self.x2, guess);
            if dx.abs() < 1e-6 {
                break;
            }
            guess = (guess - x / dx).clamp(0.0, 1.0);
        }

        bezier_value(self.y1, self.y2, guess)
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        Self::STANDARD
    }
}

// B(t) = 3(1-t)^2 t P1 + 3(1-t) t^2 P2 + t^3
fn bezier_value(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

fn bezier_derivative(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}
