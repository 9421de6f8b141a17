//! Persisted machine settings
//!
//! Settings are stored as postcard-serialized records through the
//! key/value store. A record that is missing or does not decode is replaced
//! by [`MachineSettings::default`], which the firmware then writes back.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::traits::{PumpId, SimulationScope};

/// Flow meter calibration used when none is stored, µl per pulse
pub const DEFAULT_UL_PER_PULSE: u16 = 404;

/// Lowest hardware revision this firmware drives
pub const MIN_HARDWARE_VERSION: u8 = 2;

/// Largest encoded settings record
pub const SETTINGS_RECORD_LEN: usize = 32;

/// Errors from encoding or decoding a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    Encode,
    Decode,
}

/// Which parts of the machine are simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DummyFlags {
    /// No hardware at all
    pub machine: bool,
    /// Water filter sensor missing
    pub filter: bool,
    /// Only heater 3 missing
    pub heater3: bool,
}

/// Settings the host can change at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MachineSettings {
    pub dummy: DummyFlags,
    /// Flow meter calibration of P1 and P2
    pub ul_per_pulse: [u16; 2],
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            dummy: DummyFlags::default(),
            ul_per_pulse: [DEFAULT_UL_PER_PULSE; 2],
        }
    }
}

impl MachineSettings {
    /// Simulation requested by the dummy flags, if any
    pub fn simulation(&self) -> Option<SimulationScope> {
        if self.dummy.machine {
            Some(SimulationScope::Full)
        } else if self.dummy.heater3 {
            Some(SimulationScope::Heater3)
        } else {
            None
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.dummy.machine
    }

    pub fn ul_per_pulse(&self, pump: PumpId) -> u16 {
        self.ul_per_pulse[pump.index()]
    }

    /// Replace zero calibrations with the default
    ///
    /// Returns true if anything changed and the record should be written
    /// back.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;
        for value in self.ul_per_pulse.iter_mut().filter(|v| **v == 0) {
            *value = DEFAULT_UL_PER_PULSE;
            changed = true;
        }
        changed
    }

    /// Serialize into `buf`, returning the used part
    #[cfg(feature = "serde")]
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Encode)
    }

    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)
    }
}

/// True if the strap revision cannot be driven by this firmware
pub fn hardware_incompatible(hardware_version: u8, settings: &MachineSettings) -> bool {
    hardware_version < MIN_HARDWARE_VERSION && !settings.is_simulated()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MachineSettings::default();
        assert_eq!(settings.ul_per_pulse(PumpId::P1), 404);
        assert_eq!(settings.simulation(), None);
    }

    #[test]
    fn test_sanitize_replaces_zero_calibration() {
        let mut settings = MachineSettings {
            ul_per_pulse: [0, 380],
            ..Default::default()
        };
        assert!(settings.sanitize());
        assert_eq!(settings.ul_per_pulse, [404, 380]);
        assert!(!settings.sanitize());
    }

    #[test]
    fn test_simulation_scope() {
        let mut settings = MachineSettings::default();
        settings.dummy.heater3 = true;
        assert_eq!(settings.simulation(), Some(SimulationScope::Heater3));
        settings.dummy.machine = true;
        assert_eq!(settings.simulation(), Some(SimulationScope::Full));
    }

    #[test]
    fn test_hardware_check() {
        let mut settings = MachineSettings::default();
        assert!(hardware_incompatible(1, &settings));
        assert!(!hardware_incompatible(2, &settings));
        settings.dummy.machine = true;
        assert!(!hardware_incompatible(0, &settings));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_record_survives_storage() {
        let settings = MachineSettings {
            dummy: DummyFlags {
                machine: true,
                filter: false,
                heater3: true,
            },
            ul_per_pulse: [410, 398],
        };
        let mut buf = [0u8; SETTINGS_RECORD_LEN];
        let used = settings.encode(&mut buf).unwrap().len();
        assert_eq!(MachineSettings::decode(&buf[..used]), Ok(settings));
        assert_eq!(MachineSettings::decode(&[0xFF]), Err(ConfigError::Decode));
    }
}
