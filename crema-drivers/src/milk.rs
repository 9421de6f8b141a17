//! Steam wand milk probe

/// Wand position and whether fluid reaches the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WandStatus {
    #[default]
    ParkedNoFluid,
    ParkedFluid,
    LiftedNoFluid,
    LiftedFluid,
}

impl WandStatus {
    pub const fn new(parked: bool, fluid: bool) -> Self {
        match (parked, fluid) {
            (true, false) => WandStatus::ParkedNoFluid,
            (true, true) => WandStatus::ParkedFluid,
            (false, false) => WandStatus::LiftedNoFluid,
            (false, true) => WandStatus::LiftedFluid,
        }
    }

    /// Telemetry word
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MilkProbe {
    target_x10: i16,
    temperature_x10: i16,
    status: WandStatus,
}

impl MilkProbe {
    pub const fn new() -> Self {
        Self {
            target_x10: 0,
            temperature_x10: 0,
            status: WandStatus::ParkedNoFluid,
        }
    }

    pub fn set_target(&mut self, target_x10: i16) {
        self.target_x10 = target_x10;
    }

    /// Take one 100 ms sample; a failed temperature read keeps the last value
    pub fn sample(&mut self, temperature: Option<i16>, parked: bool, fluid: bool) {
        if let Some(t) = temperature {
            self.temperature_x10 = t;
        }
        self.status = WandStatus::new(parked, fluid);
    }

    pub fn target(&self) -> i16 {
        self.target_x10
    }

    pub fn temperature(&self) -> i16 {
        self.temperature_x10
    }

    pub fn set_temperature(&mut self, temperature_x10: i16) {
        self.temperature_x10 = temperature_x10;
    }

    pub fn status(&self) -> WandStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wand_status_words() {
        assert_eq!(WandStatus::new(true, false).as_u16(), 0);
        assert_eq!(WandStatus::new(true, true).as_u16(), 1);
        assert_eq!(WandStatus::new(false, false).as_u16(), 2);
        assert_eq!(WandStatus::new(false, true).as_u16(), 3);
    }

    #[test]
    fn test_failed_read_keeps_temperature() {
        let mut probe = MilkProbe::new();
        probe.sample(Some(455), false, true);
        probe.sample(None, true, true);
        assert_eq!(probe.temperature(), 455);
        assert_eq!(probe.status(), WandStatus::ParkedFluid);
    }
}
