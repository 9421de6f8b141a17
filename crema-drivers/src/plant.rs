//! The complete plant behind the sequencer
//!
//! [`CremaPlant`] owns every controller and the board wiring. The control
//! core drives it through the crema-core traits; the firmware additionally
//! feeds it the interrupt events (zero-cross edges, flow-meter and Efast
//! pulses) and the phase-cut compare timeouts.
//!
//! In dummy mode nothing is read from the sensors in the simulated scope and
//! no output is driven; the sequencer advances the simulated measurements
//! through [`Simulation`].

use crema_core::recipe::{Circuit, Outlet};
use crema_core::traits::{
    AirPump, Auxiliary, Effect, HeaterBank, HeaterId, Indicator, Led, LedCommand, MainsMonitor,
    MainsStatus, MilkSensor, Plant, PumpBank, PumpId, PumpReading, PumpSetpoint, PumpStatus,
    Simulation, SimulationScope, Valves,
};
use crema_core::config::DEFAULT_UL_PER_PULSE;

use crate::air::AirPumpDrive;
use crate::heater::{phase, HeaterConfig, HeaterLoop};
use crate::io::{PlantIo, Track};
use crate::led::{LedPanel, Rgb};
use crate::mains::ZeroCrossMonitor;
use crate::milk::MilkProbe;
use crate::pump::{phase::HALF_SLOTS, PumpConfig, PumpLoop, PumpMode, SteamContext};
use crate::valves::ValveBank;

/// Tuning of the whole plant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlantConfig {
    pub heaters: [HeaterConfig; 3],
    pub pump: PumpConfig,
    /// Flow meter calibration until the settings are applied
    pub ul_per_pulse: [u16; 2],
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            heaters: [
                HeaterConfig::flow_through(),
                HeaterConfig::flow_through(),
                HeaterConfig::brew_head(),
            ],
            pump: PumpConfig::default(),
            ul_per_pulse: [DEFAULT_UL_PER_PULSE; 2],
        }
    }
}

/// Phase-cut delays armed at a zero-cross, µs after the edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpCompare {
    pub delays: [Option<u32>; 2],
}

pub struct CremaPlant<IO> {
    io: IO,
    heaters: [HeaterLoop; 3],
    pumps: [PumpLoop; 2],
    air: AirPumpDrive,
    milk: MilkProbe,
    valves: ValveBank,
    leds: LedPanel,
    mains: ZeroCrossMonitor,
    simulation: Option<SimulationScope>,
    slot: u8,
    half_slot: u8,
    auxiliary: Auxiliary,
}

impl<IO: PlantIo> CremaPlant<IO> {
    pub fn new(io: IO, config: PlantConfig) -> Self {
        let [c1, c2, c3] = config.heaters;
        Self {
            io,
            heaters: [HeaterLoop::new(c1), HeaterLoop::new(c2), HeaterLoop::new(c3)],
            pumps: [
                PumpLoop::new(PumpId::P1, config.pump, config.ul_per_pulse[0]),
                PumpLoop::new(PumpId::P2, config.pump, config.ul_per_pulse[1]),
            ],
            air: AirPumpDrive::new(),
            milk: MilkProbe::new(),
            valves: ValveBank::new(),
            leds: LedPanel::new(),
            mains: ZeroCrossMonitor::new(),
            simulation: None,
            slot: 0,
            half_slot: 0,
            auxiliary: Auxiliary::default(),
        }
    }

    fn fully_simulated(&self) -> bool {
        self.simulation == Some(SimulationScope::Full)
    }

    /// Whether a heater's sensor and outputs are simulated
    fn heater_simulated(&self, heater: HeaterId) -> bool {
        match self.simulation {
            Some(SimulationScope::Full) => true,
            Some(SimulationScope::Heater3) => heater == HeaterId::H3,
            None => false,
        }
    }

    /// Handle a mains zero-cross edge
    ///
    /// Closes the Efast windows, advances the phase slot, switches the
    /// heater tracks and the elimination-mode pumps, and returns the delays
    /// after which [`CremaPlant::pump_compare`] must be called for the
    /// phase-cut pumps.
    pub fn on_zero_cross(&mut self, now_us: u32) -> PumpCompare {
        self.mains.edge(now_us);
        for heater in [HeaterId::H1, HeaterId::H2] {
            self.heaters[heater.index()].efast_mut().close_window();
        }
        self.slot = (self.slot + 1) % phase::SLOTS;
        self.half_slot = (self.half_slot + 1) % HALF_SLOTS;

        let mut compare = PumpCompare::default();
        if self.fully_simulated() {
            return compare;
        }

        for heater in HeaterId::ALL {
            if self.heater_simulated(heater) {
                continue;
            }
            let drive = self.heaters[heater.index()].drive(self.slot);
            self.io.set_heater_track(heater, Track::Low, drive.low);
            if heater != HeaterId::H3 {
                self.io.set_heater_track(heater, Track::High, drive.high);
            }
        }

        for pump in PumpId::ALL {
            let state = &self.pumps[pump.index()];
            match state.mode() {
                PumpMode::Elimination => {
                    let on = state.elimination_on(self.half_slot);
                    self.io.set_pump_output(pump, on);
                }
                PumpMode::PhaseCutting => {
                    if !state.holds_through_slot() {
                        self.io.set_pump_output(pump, false);
                    }
                    compare.delays[pump.index()] = state.cut_delay_us();
                }
            }
        }
        compare
    }

    /// Switch a phase-cut pump on once its delay has passed
    pub fn pump_compare(&mut self, pump: PumpId) {
        if self.fully_simulated() {
            return;
        }
        let state = &self.pumps[pump.index()];
        if state.mode() == PumpMode::PhaseCutting && state.cut_delay_us().is_some() {
            self.io.set_pump_output(pump, true);
        }
    }

    /// Count an Efast feedback pulse
    pub fn efast_pulse(&mut self, heater: HeaterId) {
        if heater != HeaterId::H3 {
            self.heaters[heater.index()].efast_mut().count();
        }
    }

    /// Account a flow-meter pulse at `ticks` (10 kHz)
    pub fn flow_pulse(&mut self, pump: PumpId, ticks: u32) {
        self.pumps[pump.index()].pulse(ticks);
    }

    /// Readings outside the brew path, refreshed by the firmware
    pub fn set_auxiliary(&mut self, auxiliary: Auxiliary) {
        self.auxiliary = auxiliary;
    }

    /// LED colours in [`Led::ALL`] order
    pub fn led_frame(&self) -> [Rgb; 3] {
        self.leds.frame()
    }

    pub fn heater(&self, heater: HeaterId) -> &HeaterLoop {
        &self.heaters[heater.index()]
    }

    pub fn pump(&self, pump: PumpId) -> &PumpLoop {
        &self.pumps[pump.index()]
    }

    pub fn simulation(&self) -> Option<SimulationScope> {
        self.simulation
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    fn all_outputs_off(&mut self) {
        for heater in HeaterId::ALL {
            self.io.set_heater_track(heater, Track::Low, false);
            self.io.set_heater_track(heater, Track::High, false);
        }
        for pump in PumpId::ALL {
            self.io.set_pump_output(pump, false);
        }
        self.io.set_air_duty(0);
    }
}

/// Move a simulated heater one sequencer tick towards its target
///
/// Below target it gains a tenth of the target (at least 1 °C); above
/// target it loses `fall_x10`.
fn approach(temperature: i16, target: i16, fall_x10: i16) -> i16 {
    if temperature < target {
        let step = target.max(10) / 10;
        temperature.saturating_add(step).min(target)
    } else if temperature > target {
        temperature - fall_x10
    } else {
        temperature
    }
}

impl<IO: PlantIo> HeaterBank for CremaPlant<IO> {
    fn set_heater_target(&mut self, heater: HeaterId, target_x10: i16, steam: bool) {
        self.heaters[heater.index()].set_target(target_x10, steam);
    }

    fn heater_target(&self, heater: HeaterId) -> i16 {
        self.heaters[heater.index()].target()
    }

    fn heater_temperature(&self, heater: HeaterId) -> i16 {
        self.heaters[heater.index()].temperature()
    }

    fn set_heater_active(&mut self, heater: HeaterId, active: bool) {
        if self.fully_simulated() {
            return;
        }
        self.heaters[heater.index()].set_active(active);
        if !active {
            self.io.set_heater_track(heater, Track::Low, false);
            self.io.set_heater_track(heater, Track::High, false);
        }
    }

    fn heater_active(&self, heater: HeaterId) -> bool {
        self.heaters[heater.index()].is_active()
    }

    fn heater_power(&self, heater: HeaterId) -> u16 {
        self.heaters[heater.index()].power()
    }

    fn rebaseline_efast(&mut self, heater: HeaterId) {
        self.heaters[heater.index()].efast_mut().rebaseline();
    }

    fn update_heaters(&mut self) {
        let keep_targets = self.fully_simulated();
        for heater in HeaterId::ALL {
            let reading = if self.heater_simulated(heater) {
                Some(self.heaters[heater.index()].temperature())
            } else {
                self.io.heater_temperature(heater).ok()
            };
            self.heaters[heater.index()].update(reading, keep_targets);
        }
    }
}

impl<IO: PlantIo> PumpBank for CremaPlant<IO> {
    fn configure_pump(&mut self, pump: PumpId, setpoint: PumpSetpoint) {
        self.pumps[pump.index()].configure(setpoint);
    }

    fn pump_setpoint(&self, pump: PumpId) -> PumpSetpoint {
        self.pumps[pump.index()].setpoint()
    }

    fn set_calibration(&mut self, pump: PumpId, ul_per_pulse: u16) {
        self.pumps[pump.index()].set_calibration(ul_per_pulse);
    }

    fn pump_reading(&self, pump: PumpId) -> PumpReading {
        self.pumps[pump.index()].reading()
    }

    fn set_pump_active(&mut self, pump: PumpId, active: bool) {
        let simulated = self.fully_simulated();
        self.pumps[pump.index()].set_active(active, simulated);
        if !active && !simulated {
            self.io.set_pump_output(pump, false);
        }
    }

    fn pump_status(&self, pump: PumpId) -> PumpStatus {
        self.pumps[pump.index()].status()
    }

    fn pump_percentage(&self, pump: PumpId) -> u8 {
        self.pumps[pump.index()].percentage()
    }

    fn take_dispensed(&mut self, pump: PumpId) -> u32 {
        self.pumps[pump.index()].take_dispensed()
    }

    fn update_pumps(&mut self) {
        let simulated = self.fully_simulated();
        for pump in PumpId::ALL {
            let heater = &self.heaters[HeaterId::for_circuit(pump.circuit()).index()];
            let steam = SteamContext {
                heater_below_target: heater.temperature() < heater.target(),
                efast_overheating: heater.efast().overheating(),
            };
            self.pumps[pump.index()].update(steam, simulated);
        }
    }

    fn sample_pressure(&mut self) {
        if self.fully_simulated() {
            return;
        }
        for pump in PumpId::ALL {
            if let Ok(mbar) = self.io.pressure_mbar(pump) {
                self.pumps[pump.index()].sample_pressure(mbar);
            }
        }
    }
}

impl<IO: PlantIo> AirPump for CremaPlant<IO> {
    fn set_air_percentage(&mut self, percentage: u8) {
        let duty = self.air.set(percentage);
        if !self.fully_simulated() {
            self.io.set_air_duty(duty);
        }
    }

    fn air_percentage(&self) -> u8 {
        self.air.percentage()
    }
}

impl<IO: PlantIo> MilkSensor for CremaPlant<IO> {
    fn set_milk_target(&mut self, target_x10: i16) {
        self.milk.set_target(target_x10);
    }

    fn milk_target(&self) -> i16 {
        self.milk.target()
    }

    fn milk_temperature(&self) -> i16 {
        self.milk.temperature()
    }

    fn wand_status(&self) -> u16 {
        self.milk.status().as_u16()
    }

    fn update_milk(&mut self) {
        let temperature = if self.fully_simulated() {
            None
        } else {
            self.io.milk_temperature().ok()
        };
        let parked = self.io.wand_parked();
        let fluid = self.io.milk_detected();
        self.milk.sample(temperature, parked, fluid);
    }
}

impl<IO: PlantIo> Valves for CremaPlant<IO> {
    fn set_outlet(&mut self, circuit: Circuit, outlet: Outlet) {
        self.valves.set_outlet(circuit, outlet);
        if !self.fully_simulated() {
            self.valves.drive(&mut self.io, circuit);
        }
    }

    fn set_shared(&mut self, open: bool) {
        self.valves.set_shared(open);
        if !self.fully_simulated() {
            self.valves.drive_shared(&mut self.io);
        }
    }

    fn valve_bits(&self) -> u16 {
        self.valves.bits()
    }
}

impl<IO: PlantIo> Indicator for CremaPlant<IO> {
    fn set_led(&mut self, led: Led, command: LedCommand) {
        self.leds.set(led, command);
    }

    fn led_effect(&self, led: Led) -> Effect {
        self.leds.command(led).effect
    }

    fn led_intensity(&self, led: Led) -> u8 {
        self.leds.command(led).intensity
    }
}

impl<IO: PlantIo> MainsMonitor for CremaPlant<IO> {
    fn enable_mains(&mut self, enabled: bool) {
        self.mains.enable(enabled);
        if !self.fully_simulated() {
            self.io.enable_zero_cross(enabled);
        }
    }

    fn mains_status(&self) -> MainsStatus {
        self.mains.status()
    }

    fn mains_frequency(&self) -> u16 {
        self.mains.frequency()
    }

    fn update_mains(&mut self) {
        if self.fully_simulated() {
            self.mains.force_active();
        } else {
            self.mains.update();
        }
    }
}

impl<IO: PlantIo> Simulation for CremaPlant<IO> {
    fn set_simulation(&mut self, scope: Option<SimulationScope>) {
        #[cfg(feature = "defmt")]
        defmt::info!("simulation scope {}", scope);
        self.simulation = scope;
        match scope {
            Some(SimulationScope::Full) => {
                self.all_outputs_off();
                self.mains.force_active();
            }
            Some(SimulationScope::Heater3) => {
                self.io.set_heater_track(HeaterId::H3, Track::Low, false);
            }
            None => {}
        }
    }

    fn simulate(&mut self, scope: SimulationScope) {
        let heaters: &[HeaterId] = match scope {
            SimulationScope::Full => &[HeaterId::H1, HeaterId::H2, HeaterId::H3],
            SimulationScope::Heater3 => &[HeaterId::H3],
        };
        for &id in heaters {
            let heater = &mut self.heaters[id.index()];
            let fall = if id == HeaterId::H3 { 1 } else { 5 };
            heater.set_temperature(approach(heater.temperature(), heater.target(), fall));
        }
        if scope != SimulationScope::Full {
            return;
        }

        let (temperature, target) = (self.milk.temperature(), self.milk.target());
        if temperature < target {
            let step = (target.max(10) / 400).max(1);
            self.milk.set_temperature(temperature.saturating_add(step).min(target));
        }
        for pump in &mut self.pumps {
            pump.simulate();
        }
    }

    fn settle(&mut self, scope: SimulationScope) {
        let heaters: &[HeaterId] = match scope {
            SimulationScope::Full => &[HeaterId::H1, HeaterId::H2, HeaterId::H3],
            SimulationScope::Heater3 => &[HeaterId::H3],
        };
        for &id in heaters {
            let heater = &mut self.heaters[id.index()];
            if heater.target() == 0 {
                heater.set_temperature(0);
            }
        }
        if scope != SimulationScope::Full {
            return;
        }
        if self.milk.target() == 0 {
            self.milk.set_temperature(0);
        }
        for pump in &mut self.pumps {
            pump.settle();
        }
    }

    fn clear_simulation(&mut self, scope: SimulationScope) {
        match scope {
            SimulationScope::Full => {
                for heater in &mut self.heaters {
                    heater.set_temperature(0);
                }
                self.milk.set_temperature(0);
                for pump in &mut self.pumps {
                    pump.clear_measurements();
                }
            }
            SimulationScope::Heater3 => {
                self.heaters[HeaterId::H3.index()].set_temperature(0);
            }
        }
    }
}

impl<IO: PlantIo> Plant for CremaPlant<IO> {
    fn auxiliary(&self) -> Auxiliary {
        self.auxiliary
    }

    fn update_indicators(&mut self) {
        self.leds.tick();
    }
}
