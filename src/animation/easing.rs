/// Easing curve mapping progress in `[0, 1]` to an interpolation factor
#[derive(Debug, Clone, Copy, Default)]
pub enum Easing {
    #[default]
    Linear,
    /// `1 - (1 - x)^5`
    EaseOutQuint,
    Custom(fn(f64) -> f64),
}

impl Easing {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Easing::Linear => x,
            Easing::EaseOutQuint => 1.0 - (1.0 - x).powi(5),
            Easing::Custom(f) => f(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        for easing in [Easing::Linear, Easing::EaseOutQuint] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
    }

    #[test]
    fn test_quint_midpoint() {
        assert_eq!(Easing::EaseOutQuint.apply(0.5), 0.96875);
        assert_eq!(Easing::Linear.apply(0.25), 0.25);
    }

    #[test]
    fn test_custom() {
        let square = Easing::Custom(|x| x * x);
        assert_eq!(square.apply(0.5), 0.25);
    }
}
