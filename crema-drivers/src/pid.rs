//! PID term shared by the heater and pump loops
//!
//! Gains are stored ×1000 so the loops run in integer math on a core
//! without an FPU. The controllers apply their own clamps and safety rules
//! on top of the raw output.

/// PID gains, each scaled ×1000
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidCoefficients {
    pub kp_x1000: i32,
    pub ki_x1000: i32,
    pub kd_x1000: i32,
}

impl PidCoefficients {
    /// Create gains from values scaled ×1000
    ///
    /// # Example
    /// ```
    /// use crema_drivers::pid::PidCoefficients;
    /// // Kp=100, Ki=4.5, Kd=1000
    /// let gains = PidCoefficients::from_scaled_1000(100_000, 4_500, 1_000_000);
    /// assert!(gains.is_configured());
    /// ```
    pub const fn from_scaled_1000(kp_x1000: i32, ki_x1000: i32, kd_x1000: i32) -> Self {
        Self {
            kp_x1000,
            ki_x1000,
            kd_x1000,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.kp_x1000 != 0 || self.ki_x1000 != 0 || self.kd_x1000 != 0
    }
}

/// Accumulated error terms
///
/// The integral is unbounded apart from saturation; the loops clear it
/// whenever their output is forced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidState {
    integral: i32,
    prev_error: i32,
}

impl PidState {
    pub const fn new() -> Self {
        Self {
            integral: 0,
            prev_error: 0,
        }
    }

    /// Feed one error sample and return the raw, unclamped output
    pub fn step(&mut self, gains: &PidCoefficients, error: i32) -> i64 {
        self.integral = self.integral.saturating_add(error);
        let derivative = i64::from(error) - i64::from(self.prev_error);
        self.prev_error = error;

        let p = i64::from(gains.kp_x1000) * i64::from(error);
        let i = i64::from(gains.ki_x1000) * i64::from(self.integral);
        let d = i64::from(gains.kd_x1000) * derivative;
        (p + i + d) / 1000
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn integral(&self) -> i32 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let gains = PidCoefficients::from_scaled_1000(250, 0, 0);
        let mut state = PidState::new();
        assert_eq!(state.step(&gains, 4000), 1000);
        assert_eq!(state.step(&gains, -400), -100);
    }

    #[test]
    fn test_integral_accumulates() {
        let gains = PidCoefficients::from_scaled_1000(0, 100, 0);
        let mut state = PidState::new();
        state.step(&gains, 1000);
        assert_eq!(state.step(&gains, 1000), 200);
        assert_eq!(state.integral(), 2000);
    }

    #[test]
    fn test_derivative_on_error_change() {
        let gains = PidCoefficients::from_scaled_1000(0, 0, 1_000_000);
        let mut state = PidState::new();
        // First sample sees the whole error as a step
        assert_eq!(state.step(&gains, 10), 10_000);
        assert_eq!(state.step(&gains, 10), 0);
        assert_eq!(state.step(&gains, 8), -2000);
    }

    #[test]
    fn test_reset_clears_terms() {
        let gains = PidCoefficients::from_scaled_1000(100_000, 4_500, 1_000_000);
        let mut state = PidState::new();
        state.step(&gains, 50);
        state.reset();
        assert_eq!(state, PidState::new());
        assert!(!PidCoefficients::default().is_configured());
    }
}
