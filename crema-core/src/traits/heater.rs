//! Heater controller traits

use crate::recipe::Circuit;

/// The three heaters of the machine
///
/// H1 and H2 heat circuit 1 and circuit 2. H3 is the brew-head pre-heater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaterId {
    H1,
    H2,
    H3,
}

impl HeaterId {
    pub const ALL: [HeaterId; 3] = [HeaterId::H1, HeaterId::H2, HeaterId::H3];

    /// Array index of this heater
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Heater that belongs to a brew circuit
    pub const fn for_circuit(circuit: Circuit) -> Self {
        match circuit {
            Circuit::One => HeaterId::H1,
            Circuit::Two => HeaterId::H2,
        }
    }
}

/// Closed-loop control of all heaters
///
/// Temperatures are in 0.1 °C. Implementations run their PID loop from
/// [`HeaterBank::update_heaters`], which the scheduler calls every 50 ms.
pub trait HeaterBank {
    /// Set the target temperature
    ///
    /// `steam` marks the heater as feeding the milk outlet, which changes how
    /// the pump on the same circuit is driven.
    fn set_heater_target(&mut self, heater: HeaterId, target_x10: i16, steam: bool);

    /// Current target temperature
    fn heater_target(&self, heater: HeaterId) -> i16;

    /// Last measured temperature
    fn heater_temperature(&self, heater: HeaterId) -> i16;

    /// Enable or disable the control loop
    ///
    /// A disabled heater has its output forced off and its PID terms cleared.
    fn set_heater_active(&mut self, heater: HeaterId, active: bool);

    /// Whether the control loop is enabled
    fn heater_active(&self, heater: HeaterId) -> bool;

    /// Last power request in watts
    fn heater_power(&self, heater: HeaterId) -> u16;

    /// Take the last zero-cross window's Efast count as the new baseline
    fn rebaseline_efast(&mut self, heater: HeaterId);

    /// Run one control period
    fn update_heaters(&mut self);
}
