//! Board wiring seen by the controllers
//!
//! The firmware implements [`PlantIo`] on top of its ADC channels and GPIO
//! pins; the tests implement it with plain fields. Sensor failures surface
//! as [`SensorError`] and leave the previous measurement in place.

use crema_core::recipe::{Circuit, Outlet};
use crema_core::traits::{HeaterId, PumpId};

use crema_hal::OutputPin;

use crate::sensor::SensorError;

/// The two switched tracks of a flow-through heater
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Track {
    Low,
    High,
}

/// Sensors and outputs of the whole plant
pub trait PlantIo {
    fn heater_temperature(&mut self, heater: HeaterId) -> Result<i16, SensorError>;

    fn milk_temperature(&mut self) -> Result<i16, SensorError>;

    fn pressure_mbar(&mut self, pump: PumpId) -> Result<u32, SensorError>;

    /// Fluid detected at the steam wand
    fn milk_detected(&mut self) -> bool;

    /// Steam wand resting in its holder
    fn wand_parked(&mut self) -> bool;

    /// Switch one heater track; the single H3 track is `Track::Low`
    fn set_heater_track(&mut self, heater: HeaterId, track: Track, on: bool);

    fn set_pump_output(&mut self, pump: PumpId, on: bool);

    /// Air pump PWM duty in percent
    fn set_air_duty(&mut self, percentage: u8);

    fn set_valve(&mut self, circuit: Circuit, outlet: Outlet, open: bool);

    fn set_shared_valve(&mut self, open: bool);

    /// Power the zero-cross detector
    fn enable_zero_cross(&mut self, enabled: bool);
}

/// Triac or valve driver behind a GPIO
///
/// Opto-triac boards are often active-low; `inverted` keeps that out of the
/// controllers, which only ever speak of on and off.
pub struct SwitchedOutput<P> {
    pin: P,
    inverted: bool,
    on: bool,
}

impl<P: OutputPin> SwitchedOutput<P> {
    /// Wrap a pin and switch it off
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut output = Self {
            pin,
            inverted,
            on: false,
        };
        output.set(false);
        output
    }

    pub fn set(&mut self, on: bool) {
        self.on = on;
        self.pin.set_state(on != self.inverted);
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
