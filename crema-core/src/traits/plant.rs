//! The complete set of controllers the sequencer drives

use super::{AirPump, HeaterBank, Indicator, MainsMonitor, MilkSensor, PumpBank, Valves};

/// Which measurements are simulated in dummy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimulationScope {
    /// No hardware at all
    Full,
    /// Only heater 3 is missing
    Heater3,
}

/// Measurement simulation for running recipes without hardware
pub trait Simulation {
    /// Switch dummy mode on or off
    ///
    /// While a scope is set the implementation reads no sensors in that
    /// scope and drives no outputs.
    fn set_simulation(&mut self, scope: Option<SimulationScope>);

    /// Advance the simulated measurements by one sequencer tick
    fn simulate(&mut self, scope: SimulationScope);

    /// Settle measurements once a block has finished
    ///
    /// Pumps that reached their volume stop reporting flow and pressure, and
    /// heaters without a target drop to zero.
    fn settle(&mut self, scope: SimulationScope);

    /// Drop every simulated measurement
    fn clear_simulation(&mut self, scope: SimulationScope);
}

/// Readings outside the brew path, reported as-is in telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Auxiliary {
    pub water_tank_volume: u16,
    pub filter: u16,
    pub drip_tray: u16,
    /// Relative humidity in 0.1 %
    pub humidity: u16,
    /// Ambient temperature in 0.1 °C
    pub ambient: u16,
    pub coffee_button: u16,
    pub coffee_button_direction: u16,
    pub milk_button: u16,
}

/// Everything the sequencer controls
pub trait Plant:
    HeaterBank + PumpBank + AirPump + MilkSensor + Valves + Indicator + MainsMonitor + Simulation
{
    fn auxiliary(&self) -> Auxiliary {
        Auxiliary::default()
    }

    /// Advance LED effects (1 ms)
    fn update_indicators(&mut self) {}
}
