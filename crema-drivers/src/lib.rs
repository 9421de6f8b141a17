//! Controller implementations
//!
//! This crate provides the concrete controllers behind the traits defined
//! in crema-core:
//!
//! - Heater PID loops with safety clamps and the Efast monitor
//! - Pump flow/pressure PID, flow meters and volume accounting
//! - Phase-window output selection for heaters and pumps
//! - Mains zero-cross monitor
//! - Air pump, milk probe, valves and the LED panel
//! - [`plant::CremaPlant`], the aggregate the sequencer drives, including
//!   dummy-mode simulation

#![no_std]
#![deny(unsafe_code)]

pub mod air;
pub mod heater;
pub mod io;
pub mod led;
pub mod mains;
pub mod milk;
pub mod pid;
pub mod plant;
pub mod pump;
pub mod sensor;
pub mod valves;

#[cfg(test)]
pub(crate) mod testing;

pub use io::{PlantIo, SwitchedOutput};
pub use plant::{CremaPlant, PlantConfig};
