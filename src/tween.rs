#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ease {
    Linear,
    /// Quadratic ease-out, `1 - (1 - t)^2`
    Power1Out,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Ease::Linear => t,
            Ease::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// Interpolates a single value over time. Advanced by the frame delta.
#[derive(Debug, Clone)]
pub struct Tween {
    from: f32,
    to: f32,
    delay: f32,
    duration: f32,
    elapsed: f32,
    ease: Ease,
}

impl Tween {
    pub fn new(from: f32, to: f32, duration: f32, ease: Ease) -> Self {
        Self {
            from,
            to,
            delay: 0.0,
            duration,
            elapsed: 0.0,
            ease,
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    pub fn advance(&mut self, delta_time: f32) -> f32 {
        self.elapsed += delta_time.max(0.0);
        self.value()
    }

    pub fn value(&self) -> f32 {
        let active = self.elapsed - self.delay;

        if active < 0.0 {
            return self.from;
        }

        if self.duration <= 0.0 || active >= self.duration {
            return self.to;
        }

        let t = self.ease.apply(active / self.duration);
        self.from + (self.to - self.from) * t
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed - self.delay >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power1_out_starts_fast_and_ends_at_one() {
        assert_eq!(Ease::Power1Out.apply(0.0), 0.0);
        assert_eq!(Ease::Power1Out.apply(1.0), 1.0);
        assert_eq!(Ease::Power1Out.apply(0.5), 0.75);
        assert!(Ease::Power1Out.apply(0.25) > Ease::Linear.apply(0.25));
    }

    #[test]
    fn tween_reaches_target_and_reports_finished() {
        let mut tween = Tween::new(0.0, -2.0, 0.5, Ease::Power1Out);

        let halfway = tween.advance(0.25);
        assert!((halfway + 1.5).abs() < 1e-6);
        assert!(!tween.is_finished());

        assert_eq!(tween.advance(0.5), -2.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn delay_holds_the_start_value() {
        let mut tween = Tween::new(1.0, 0.0, 3.0, Ease::Linear).with_delay(0.5);

        assert_eq!(tween.advance(0.4), 1.0);
        let value = tween.advance(1.6);
        assert!((value - 0.5).abs() < 1e-6);
        assert!(!tween.is_finished());
        tween.advance(10.0);
        assert_eq!(tween.value(), 0.0);
    }

    #[test]
    fn zero_duration_jumps_to_target() {
        let tween = Tween::new(3.0, 7.0, 0.0, Ease::Linear);
        assert_eq!(tween.value(), 7.0);
        assert!(tween.is_finished());
    }
}
