//! Valves, air pump, milk sensor and mains monitor

use crate::recipe::{Circuit, Outlet};

/// Outlet valves of both circuits and the shared S3 valve
pub trait Valves {
    /// Route a circuit to an outlet, or close it with [`Outlet::Off`]
    fn set_outlet(&mut self, circuit: Circuit, outlet: Outlet);

    /// Open or close the shared S3 valve
    fn set_shared(&mut self, open: bool);

    /// Close every valve
    fn close_all(&mut self) {
        self.set_outlet(Circuit::One, Outlet::Off);
        self.set_outlet(Circuit::Two, Outlet::Off);
        self.set_shared(false);
    }

    /// One bit per open valve, for telemetry
    fn valve_bits(&self) -> u16;
}

/// Milk frothing air pump
pub trait AirPump {
    /// Set the duty, clamped to 100 %
    fn set_air_percentage(&mut self, percentage: u8);

    fn air_percentage(&self) -> u8;
}

/// Steam wand temperature sensor and switches
pub trait MilkSensor {
    /// Target milk temperature in 0.1 °C
    fn set_milk_target(&mut self, target_x10: i16);

    fn milk_target(&self) -> i16;

    /// Last measured milk temperature in 0.1 °C
    fn milk_temperature(&self) -> i16;

    /// Steam wand state word for telemetry
    fn wand_status(&self) -> u16;

    /// Sample sensor and switches (100 ms)
    fn update_milk(&mut self);
}

/// State of the mains zero-cross detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MainsStatus {
    /// Detection switched off
    #[default]
    Inactive,
    Active,
    /// Detection enabled but no edges seen
    Fault,
}

/// Mains zero-cross detection
///
/// Heaters and pumps are phase-controlled from the zero-cross reference, so
/// nothing may be started while it is missing.
pub trait MainsMonitor {
    fn enable_mains(&mut self, enabled: bool);

    fn mains_status(&self) -> MainsStatus;

    /// Mains frequency in Hz, 0 when unknown
    fn mains_frequency(&self) -> u16;

    /// Run the edge watchdog (100 ms)
    fn update_mains(&mut self);
}
