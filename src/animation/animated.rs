use crate::animation::clock::Clock;
use crate::animation::easing::Easing;

/// Retargets closer than this are ignored
pub const RETARGET_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    from: f64,
    to: f64,
    start: f64,
}

/// A scalar that eases toward its latest target over a fixed duration.
///
/// Retargeting mid-transition starts the new transition from the current
/// eased value, so the output never jumps.
#[derive(Debug, Clone)]
pub struct Animated<C: Clock> {
    duration: f64,
    easing: Easing,
    clock: C,
    transition: Option<Transition>,
}

impl<C: Clock> Animated<C> {
    pub fn new(duration: f64, easing: Easing, clock: C) -> Self {
        Self {
            duration,
            easing,
            clock,
            transition: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Current target, if one has been set
    pub fn target(&self) -> Option<f64> {
        self.transition.map(|t| t.to)
    }

    /// Jump to `value` with no transition
    pub fn force(&mut self, value: f64) -> f64 {
        self.transition = Some(Transition {
            from: value,
            to: value,
            start: self.clock.now() + self.duration,
        });
        value
    }

    /// Ease toward `value` and return the current value.
    ///
    /// The first target snaps. A target within [`RETARGET_EPSILON`] of the
    /// current one leaves the running transition alone.
    pub fn set(&mut self, value: f64) -> f64 {
        let Some(current) = self.transition else {
            return self.force(value);
        };
        if (current.to - value).abs() > RETARGET_EPSILON {
            let from = self.get();
            self.transition = Some(Transition {
                from,
                to: value,
                start: self.clock.now(),
            });
        }
        self.get()
    }

    /// [`Self::set`] with `true` as 1 and `false` as 0
    pub fn set_flag(&mut self, flag: bool) -> f64 {
        self.set(flag_value(flag))
    }

    /// [`Self::force`] with `true` as 1 and `false` as 0
    pub fn force_flag(&mut self, flag: bool) -> f64 {
        self.force(flag_value(flag))
    }

    /// Current value; 0 before any target is set
    pub fn get(&self) -> f64 {
        let Some(transition) = self.transition else {
            return 0.0;
        };
        let t = if self.duration > 0.0 {
            (self.clock.now() - transition.start) / self.duration
        } else {
            1.0
        };
        if t >= 1.0 {
            return transition.to;
        }
        let f = self.easing.apply(t.clamp(0.0, 1.0));
        transition.from + (transition.to - transition.from) * f
    }
}

fn flag_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clock::ManualClock;

    fn animated(easing: Easing) -> (Animated<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0.0);
        (Animated::new(1.0, easing, clock.clone()), clock)
    }

    #[test]
    fn test_unset_reads_zero() {
        let (value, _) = animated(Easing::Linear);
        assert_eq!(value.get(), 0.0);
        assert_eq!(value.target(), None);
    }

    #[test]
    fn test_force_is_immediate() {
        let (mut value, _) = animated(Easing::EaseOutQuint);
        assert_eq!(value.force(0.7), 0.7);
        assert_eq!(value.get(), 0.7);
    }

    #[test]
    fn test_first_set_snaps() {
        let (mut value, clock) = animated(Easing::Linear);
        assert_eq!(value.set(3.0), 3.0);
        clock.advance(0.25);
        assert_eq!(value.get(), 3.0);
    }

    #[test]
    fn test_linear_midpoint() {
        let (mut value, clock) = animated(Easing::Linear);
        value.force(0.0);
        value.set(1.0);
        clock.set(0.5);
        assert_eq!(value.get(), 0.5);
    }

    #[test]
    fn test_quint_midpoint() {
        let (mut value, clock) = animated(Easing::EaseOutQuint);
        value.force(0.0);
        value.set(1.0);
        clock.set(0.5);
        assert_eq!(value.get(), 0.96875);
    }

    #[test]
    fn test_repeated_set_is_noop() {
        let (mut value, clock) = animated(Easing::Linear);
        value.force(0.0);
        value.set(1.0);
        clock.set(0.5);
        value.set(1.0);
        value.set(1.0005);
        // The first transition keeps running
        clock.set(0.75);
        assert_eq!(value.get(), 0.75);
    }

    #[test]
    fn test_completion_is_exact() {
        let (mut value, clock) = animated(Easing::EaseOutQuint);
        value.force(0.0);
        value.set(0.3);
        clock.set(1.0);
        assert_eq!(value.get(), 0.3);
        clock.set(50.0);
        assert_eq!(value.get(), 0.3);
    }

    #[test]
    fn test_retarget_starts_from_current_value() {
        let (mut value, clock) = animated(Easing::Linear);
        value.force(0.0);
        value.set(1.0);
        clock.set(0.5);
        assert_eq!(value.set(0.0), 0.5);

        clock.set(1.0);
        assert_eq!(value.get(), 0.25);
        clock.set(1.5);
        assert_eq!(value.get(), 0.0);
    }

    #[test]
    fn test_flags() {
        let (mut value, clock) = animated(Easing::Linear);
        assert_eq!(value.force_flag(false), 0.0);
        value.set_flag(true);
        assert_eq!(value.target(), Some(1.0));
        clock.set(2.0);
        assert_eq!(value.get(), 1.0);
    }
}
