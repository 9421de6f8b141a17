//! Milk frothing air pump

/// Duty of the air pump, driven as PWM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AirPumpDrive {
    percentage: u8,
}

impl AirPumpDrive {
    pub const fn new() -> Self {
        Self { percentage: 0 }
    }

    /// Store the duty, clamped to 100 %, and return the PWM value to apply
    pub fn set(&mut self, percentage: u8) -> u8 {
        self.percentage = percentage.min(100);
        self.percentage
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn is_running(&self) -> bool {
        self.percentage > 0
    }
}
