//! Hardware abstraction traits
//!
//! These traits define the interface between the sequencer and the
//! controllers that own the physical outputs. The sequencer only ever talks
//! to a [`Plant`], which bundles all of them.

pub mod heater;
pub mod indicator;
pub mod peripherals;
pub mod plant;
pub mod pump;

pub use heater::{HeaterBank, HeaterId};
pub use indicator::{Effect, Indicator, Led, LedCommand};
pub use peripherals::{AirPump, MainsMonitor, MainsStatus, MilkSensor, Valves};
pub use plant::{Auxiliary, Plant, Simulation, SimulationScope};
pub use pump::{ControlType, PumpBank, PumpId, PumpReading, PumpSetpoint, PumpStatus};
