//! Board double shared by the unit tests

use crema_core::recipe::{Circuit, Outlet};
use crema_core::traits::{HeaterId, PumpId};

use crate::io::{PlantIo, Track};
use crate::sensor::SensorError;

/// Board with settable sensors that records every output
#[derive(Debug, Clone, Default)]
pub struct MockIo {
    pub temperatures: [i16; 3],
    pub failed_heater: Option<HeaterId>,
    pub milk_temperature: i16,
    pub pressures: [u32; 2],
    pub milk_detected: bool,
    pub wand_parked: bool,
    /// Low and high track per heater
    pub tracks: [[bool; 2]; 3],
    pub pumps: [bool; 2],
    pub air: u8,
    /// Coffee, milk, water per circuit
    pub valves: [[bool; 3]; 2],
    pub shared_valve: bool,
    pub zero_cross: bool,
    pub writes: u32,
}

impl PlantIo for MockIo {
    fn heater_temperature(&mut self, heater: HeaterId) -> Result<i16, SensorError> {
        if self.failed_heater == Some(heater) {
            return Err(SensorError::OpenCircuit);
        }
        Ok(self.temperatures[heater.index()])
    }

    fn milk_temperature(&mut self) -> Result<i16, SensorError> {
        Ok(self.milk_temperature)
    }

    fn pressure_mbar(&mut self, pump: PumpId) -> Result<u32, SensorError> {
        Ok(self.pressures[pump.index()])
    }

    fn milk_detected(&mut self) -> bool {
        self.milk_detected
    }

    fn wand_parked(&mut self) -> bool {
        self.wand_parked
    }

    fn set_heater_track(&mut self, heater: HeaterId, track: Track, on: bool) {
        self.writes += 1;
        let index = match track {
            Track::Low => 0,
            Track::High => 1,
        };
        self.tracks[heater.index()][index] = on;
    }

    fn set_pump_output(&mut self, pump: PumpId, on: bool) {
        self.writes += 1;
        self.pumps[pump.index()] = on;
    }

    fn set_air_duty(&mut self, percentage: u8) {
        self.writes += 1;
        self.air = percentage;
    }

    fn set_valve(&mut self, circuit: Circuit, outlet: Outlet, open: bool) {
        self.writes += 1;
        let index = match outlet {
            Outlet::Coffee => 0,
            Outlet::Milk => 1,
            Outlet::Water => 2,
            Outlet::Off => return,
        };
        self.valves[circuit.index()][index] = open;
    }

    fn set_shared_valve(&mut self, open: bool) {
        self.writes += 1;
        self.shared_valve = open;
    }

    fn enable_zero_cross(&mut self, enabled: bool) {
        self.writes += 1;
        self.zero_cross = enabled;
    }
}
