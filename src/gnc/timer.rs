/// Debounce timer: fires once a condition has held continuously for `period`
/// seconds of simulation time, and restarts as soon as it lapses.
#[derive(Debug, Clone)]
pub struct Timer {
    pub period: f64, // s
    elapsed: f64,
}

impl Timer {
    pub fn new(period: f64) -> Self {
        Self { period, elapsed: 0.0 }
    }

    /// Advance by `dt` while `condition` holds; returns true once the
    /// condition has lasted the full period.
    pub fn run_if(&mut self, condition: bool, dt: f64) -> bool {
        if !condition {
            self.reset();
            return false;
        }
        self.elapsed += dt;
        self.elapsed >= self.period
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_period_and_resets_on_lapse() {
        let mut t = Timer::new(0.9);
        for _ in 0..4 {
            assert!(!t.run_if(true, 0.2));
        }
        assert!(t.run_if(true, 0.2));
        assert!(!t.run_if(false, 0.2));
        assert!(!t.run_if(true, 0.2));
    }
}
