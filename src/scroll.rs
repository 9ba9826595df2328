/// Normalised scroll progress in `[0, 1]`.
///
/// Reaches exactly `1.0` at `scroll_y == threshold` and stays there for any
/// larger offset. A non-positive threshold means the effect is always fully
/// applied.
pub fn scroll_progress(scroll_y: f64, threshold: f64) -> f64 {
    if !(threshold > 0.0) {
        return 1.0;
    }
    if !scroll_y.is_finite() {
        return if scroll_y > 0.0 { 1.0 } else { 0.0 };
    }
    (scroll_y / threshold).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_to_exactly_one_at_the_threshold() {
        let blur_end = 500.0;
        let mut last = 0.0;
        for step in 0..=50 {
            let scroll = step as f64 * 10.0;
            let progress = scroll_progress(scroll, blur_end);
            assert!(progress >= last);
            last = progress;
        }
        assert_eq!(scroll_progress(blur_end, blur_end), 1.0);
        assert_eq!(scroll_progress(0.0, blur_end), 0.0);
    }

    #[test]
    fn stays_clamped_past_the_threshold() {
        for scroll in [501.0, 900.0, 1.0e9, f64::INFINITY] {
            assert_eq!(scroll_progress(scroll, 500.0), 1.0);
        }
    }

    #[test]
    fn overscroll_and_bad_thresholds() {
        assert_eq!(scroll_progress(-40.0, 500.0), 0.0);
        assert_eq!(scroll_progress(10.0, 0.0), 1.0);
        assert_eq!(scroll_progress(10.0, f64::NAN), 1.0);
        assert_eq!(scroll_progress(f64::NAN, 500.0), 0.0);
    }
}
