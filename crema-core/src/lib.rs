//! Board-agnostic control core of the crema coffee machine controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Collaborator traits for heaters, pumps, valves, LEDs and mains sensing
//! - Recipe and block model with end-condition groups
//! - Work sequencer and the per-recipe prepare machine
//! - Resource claims shared by the two brewing recipes
//! - Pending host actions and their timeout
//! - Frame dispatcher and telemetry
//! - Firmware partition bookkeeping and persisted settings

#![no_std]
#![deny(unsafe_code)]

pub mod action;
pub mod claims;
pub mod conditions;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod partition;
pub mod recipe;
pub mod scheduler;
pub mod sequencer;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{DeviceInfo, MachineContext};
pub use dispatcher::{DispatchOutcome, Reply};
pub use sequencer::{MainStatus, PrepareStatus, SubStatus, WorkState};
