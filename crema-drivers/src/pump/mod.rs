//! Pump control loops
//!
//! A [`PumpLoop`] regulates either flow or pressure, switching between the
//! two as the measurements fall below their set-points. Volume is counted
//! per flow-meter pulse and the pump switches itself off once its volume
//! target is met.

pub mod flow;
pub mod phase;

pub use flow::FlowMeter;
pub use phase::PumpMode;

use crema_core::traits::{PumpId, PumpReading, PumpSetpoint, PumpStatus};
use heapless::HistoryBuffer;

use crate::pid::{PidCoefficients, PidState};

/// Pressure samples in the moving average (1 ms each)
pub const PRESSURE_SAMPLES: usize = 100;

/// Tuning shared by both pumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpConfig {
    pub flow_gains: PidCoefficients,
    pub pressure_gains: PidCoefficients,
    /// Added to a useful flow PID output to get past the pump's dead band
    pub flow_offset: u16,
    /// Flow PID outputs below this switch the pump off
    pub min_flow_output: u16,
    /// Empty flow windows tolerated before the pump faults
    pub no_flow_cutoff: u16,
    pub mode: PumpMode,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            flow_gains: PidCoefficients::from_scaled_1000(250, 100, 0),
            pressure_gains: PidCoefficients::from_scaled_1000(250, 250, 0),
            flow_offset: 4000,
            min_flow_output: 10,
            no_flow_cutoff: 20_000,
            mode: PumpMode::PhaseCutting,
        }
    }
}

/// Quantity currently regulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Regulation {
    #[default]
    Idle,
    Flow,
    Pressure,
}

/// State of the heater on the same circuit, for steam mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SteamContext {
    pub heater_below_target: bool,
    pub efast_overheating: bool,
}

/// Closed-loop control of one pump
#[derive(Debug, Clone)]
pub struct PumpLoop {
    id: PumpId,
    config: PumpConfig,
    setpoint: PumpSetpoint,
    ul_per_pulse: u16,
    status: PumpStatus,
    regulation: Regulation,
    pid: PidState,
    control: u16,
    percentage: u8,
    volume: u32,
    dispensed: u32,
    meter: FlowMeter,
    pressure_samples: HistoryBuffer<u32, PRESSURE_SAMPLES>,
    pressure: u32,
}

impl PumpLoop {
    pub fn new(id: PumpId, config: PumpConfig, ul_per_pulse: u16) -> Self {
        Self {
            id,
            config,
            setpoint: PumpSetpoint::default(),
            ul_per_pulse,
            status: PumpStatus::Inactive,
            regulation: Regulation::Idle,
            pid: PidState::new(),
            control: 0,
            percentage: 0,
            volume: 0,
            dispensed: 0,
            meter: FlowMeter::new(),
            pressure_samples: HistoryBuffer::new(),
            pressure: 0,
        }
    }

    /// Replace the targets and restart volume counting
    pub fn configure(&mut self, setpoint: PumpSetpoint) {
        self.setpoint = setpoint;
        self.volume = 0;
        self.regulation = Regulation::Idle;
    }

    pub fn set_calibration(&mut self, ul_per_pulse: u16) {
        self.ul_per_pulse = ul_per_pulse;
    }

    /// Switch the pump on or off, restarting volume counting
    ///
    /// While simulated the status is left alone so no output is ever driven.
    pub fn set_active(&mut self, active: bool, simulated: bool) {
        self.volume = 0;
        if simulated {
            return;
        }
        self.status = if active {
            PumpStatus::Active
        } else {
            PumpStatus::Inactive
        };
    }

    /// Account one flow-meter pulse at `ticks` (10 kHz)
    pub fn pulse(&mut self, ticks: u32) {
        self.meter.pulse(ticks, self.ul_per_pulse);
        if self.status == PumpStatus::Active {
            let ul = u32::from(self.ul_per_pulse);
            self.volume = self.volume.saturating_add(ul);
            self.dispensed = self.dispensed.saturating_add(ul);
        }
        if self.volume >= self.setpoint.volume {
            self.status = PumpStatus::Inactive;
        }
    }

    /// Add one raw pressure sample to the moving average
    pub fn sample_pressure(&mut self, mbar: u32) {
        self.pressure_samples.write(mbar);
        let count = self.pressure_samples.len() as u32;
        let sum: u32 = self.pressure_samples.as_slice().iter().sum();
        self.pressure = sum / count.max(1);
    }

    /// Run one 100 ms control period
    pub fn update(&mut self, steam: SteamContext, simulated: bool) {
        if !simulated {
            let counting = self.status == PumpStatus::Active;
            let cutoff = self.config.no_flow_cutoff;
            if self.meter.period(self.ul_per_pulse, counting, cutoff) {
                #[cfg(feature = "defmt")]
                defmt::warn!("pump {} no flow, fault", self.id);
                self.status = PumpStatus::Fault;
            }
        }
        self.regulate_flow(steam);
        self.regulate_pressure();
    }

    fn regulate_flow(&mut self, steam: SteamContext) {
        if !self.setpoint.control.regulates_flow() {
            return;
        }
        if self.meter.flow() < self.setpoint.flow {
            self.regulation = Regulation::Flow;
        }
        if self.status != PumpStatus::Active
            || self.setpoint.flow == 0
            || self.regulation == Regulation::Idle
        {
            self.stop();
            return;
        }
        if self.regulation != Regulation::Flow {
            return;
        }

        let error = self.setpoint.flow as i32 - self.meter.flow_timed() as i32;
        let raw = self.pid.step(&self.config.flow_gains, error);
        self.control = if raw < i64::from(self.config.min_flow_output) {
            0
        } else {
            (raw + i64::from(self.config.flow_offset)).min(10_000) as u16
        };

        if !self.setpoint.steam {
            self.set_percentage((self.control / 100) as u8);
        } else if steam.heater_below_target && !steam.efast_overheating {
            self.set_percentage(0);
        } else {
            self.set_percentage(self.steam_duty());
        }
    }

    fn regulate_pressure(&mut self) {
        if !self.setpoint.control.regulates_pressure() {
            return;
        }
        if self.pressure < self.setpoint.pressure {
            self.regulation = Regulation::Pressure;
        }
        if self.status != PumpStatus::Active
            || self.setpoint.pressure == 0
            || self.regulation == Regulation::Idle
        {
            self.stop();
            return;
        }
        if self.regulation != Regulation::Pressure {
            return;
        }

        let error = self.setpoint.pressure as i32 - self.pressure as i32;
        let raw = self.pid.step(&self.config.pressure_gains, error);
        self.control = raw.clamp(0, 10_000) as u16;
        self.set_percentage((self.control / 100) as u8);
    }

    /// Fixed duty while steaming
    fn steam_duty(&self) -> u8 {
        match self.id {
            PumpId::P1 => 40,
            PumpId::P2 if self.meter.flow() < 100 => 65,
            PumpId::P2 => 50,
        }
    }

    /// Apply a duty, lifting small requests to the lowest duty the pump
    /// still runs at
    fn set_percentage(&mut self, percentage: u8) {
        let low_flow = self.meter.flow() < 100;
        self.percentage = match (self.id, percentage) {
            (_, 0) | (_, 20..=100) => percentage,
            (PumpId::P1, 1..=40) => 30,
            (PumpId::P2, 1..=65) if low_flow => 65,
            (PumpId::P2, 1..=50) => 50,
            _ => percentage,
        };
    }

    fn stop(&mut self) {
        self.pid.reset();
        self.control = 0;
        self.percentage = 0;
    }

    /// Output for one half-slot in elimination mode
    pub fn elimination_on(&self, half_slot: u8) -> bool {
        self.status == PumpStatus::Active && phase::elimination_on(self.percentage, half_slot)
    }

    /// Phase-cutting delay for the coming half-wave, `None` when the pump
    /// stays off
    pub fn cut_delay_us(&self) -> Option<u32> {
        (self.status == PumpStatus::Active && self.percentage > 10)
            .then(|| phase::cut_delay_us(self.percentage))
    }

    /// Whether the phase-cut output stays on across the slot boundary
    pub fn holds_through_slot(&self) -> bool {
        self.percentage == 100
    }

    pub fn mode(&self) -> PumpMode {
        self.config.mode
    }

    pub fn setpoint(&self) -> PumpSetpoint {
        self.setpoint
    }

    pub fn status(&self) -> PumpStatus {
        self.status
    }

    pub fn regulation(&self) -> Regulation {
        self.regulation
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn control(&self) -> u16 {
        self.control
    }

    pub fn reading(&self) -> PumpReading {
        PumpReading {
            flow: self.meter.flow(),
            flow_timed: self.meter.flow_timed(),
            pressure: self.pressure,
            volume: self.volume,
        }
    }

    /// Volume pumped since the last call
    pub fn take_dispensed(&mut self) -> u32 {
        core::mem::take(&mut self.dispensed)
    }

    /// Advance the simulated flow by one 100 ms period
    ///
    /// A pump with a flow target, a control type and volume left to pump
    /// reports its set-points as measurements and gains a tenth of its set
    /// flow in volume.
    pub fn simulate(&mut self) {
        let sp = self.setpoint;
        if self.volume >= sp.volume || sp.flow == 0 || sp.control.as_u8() == 0 {
            return;
        }
        self.meter.set_flows(sp.flow);
        self.pressure = sp.pressure;
        let step = sp.flow.max(10) / 10;
        let volume = (self.volume + step).min(sp.volume);
        self.dispensed = self.dispensed.saturating_add(volume - self.volume);
        self.volume = volume;
    }

    /// Stop reporting flow and pressure once the volume is reached
    pub fn settle(&mut self) {
        if self.volume >= self.setpoint.volume {
            self.clear_measurements();
        }
    }

    pub fn clear_measurements(&mut self) {
        self.meter.set_flows(0);
        self.pressure = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crema_core::traits::ControlType;

    fn flow_pump(id: PumpId, flow: u32) -> PumpLoop {
        let mut pump = PumpLoop::new(id, PumpConfig::default(), 404);
        pump.configure(PumpSetpoint {
            flow,
            pressure: 9000,
            volume: 40_000,
            control: ControlType::Flow,
            steam: false,
        });
        pump.set_active(true, false);
        pump
    }

    #[test]
    fn test_flow_regulation_adds_offset() {
        let mut pump = flow_pump(PumpId::P1, 2000);
        pump.update(SteamContext::default(), false);
        assert_eq!(pump.regulation(), Regulation::Flow);
        // P 0.25 * 2000 + I 0.1 * 2000 = 700, plus the offset
        assert_eq!(pump.control(), 4700);
        assert_eq!(pump.percentage(), 47);
    }

    #[test]
    fn test_small_flow_output_switches_off() {
        let mut pump = flow_pump(PumpId::P1, 20);
        pump.update(SteamContext::default(), false);
        // 0.35 * 20 = 7 is below the useful minimum
        assert_eq!(pump.control(), 0);
        assert_eq!(pump.percentage(), 0);
    }

    #[test]
    fn test_inactive_pump_is_off() {
        let mut pump = flow_pump(PumpId::P1, 2000);
        pump.set_active(false, false);
        pump.update(SteamContext::default(), false);
        assert_eq!(pump.percentage(), 0);
        assert_eq!(pump.status(), PumpStatus::Inactive);
    }

    #[test]
    fn test_minimum_duty_clamp() {
        let mut pump = PumpLoop::new(PumpId::P1, PumpConfig::default(), 404);
        pump.set_percentage(15);
        assert_eq!(pump.percentage(), 30);
        pump.set_percentage(35);
        assert_eq!(pump.percentage(), 35);
        pump.set_percentage(0);
        assert_eq!(pump.percentage(), 0);

        let mut pump = PumpLoop::new(PumpId::P2, PumpConfig::default(), 404);
        pump.set_percentage(12);
        assert_eq!(pump.percentage(), 65);
        pump.meter.set_flows(500);
        pump.set_percentage(12);
        assert_eq!(pump.percentage(), 50);
    }

    #[test]
    fn test_pressure_takes_over_when_flow_is_met() {
        let mut pump = PumpLoop::new(PumpId::P1, PumpConfig::default(), 404);
        pump.configure(PumpSetpoint {
            flow: 1000,
            pressure: 9000,
            volume: 40_000,
            control: ControlType::FlowAndPressure,
            steam: false,
        });
        pump.set_active(true, false);
        // Flow meter reads above target, pressure below
        pump.meter.set_flows(1500);
        pump.sample_pressure(1000);
        pump.update(SteamContext::default(), false);
        assert_eq!(pump.regulation(), Regulation::Pressure);
        // P 0.25 * 8000 + I 0.25 * 8000
        assert_eq!(pump.control(), 4000);
        assert_eq!(pump.percentage(), 40);
    }

    #[test]
    fn test_steam_mode_waits_for_heater() {
        let mut pump = flow_pump(PumpId::P2, 2000);
        pump.setpoint.steam = true;
        let cold = SteamContext {
            heater_below_target: true,
            efast_overheating: false,
        };
        pump.update(cold, false);
        assert_eq!(pump.percentage(), 0);

        pump.update(SteamContext::default(), false);
        assert_eq!(pump.percentage(), 65);

        let overheating = SteamContext {
            heater_below_target: true,
            efast_overheating: true,
        };
        pump.update(overheating, false);
        assert_eq!(pump.percentage(), 65);
    }

    #[test]
    fn test_volume_target_stops_pump() {
        let mut pump = flow_pump(PumpId::P1, 2000);
        pump.setpoint.volume = 1000;
        pump.pulse(100);
        pump.pulse(200);
        assert_eq!(pump.status(), PumpStatus::Active);
        pump.pulse(300);
        assert_eq!(pump.status(), PumpStatus::Inactive);
        assert_eq!(pump.reading().volume, 1212);
        assert_eq!(pump.take_dispensed(), 1212);
        assert_eq!(pump.take_dispensed(), 0);
    }

    #[test]
    fn test_pulses_while_inactive_are_not_counted() {
        let mut pump = PumpLoop::new(PumpId::P1, PumpConfig::default(), 404);
        pump.configure(PumpSetpoint {
            volume: 10_000,
            ..Default::default()
        });
        pump.pulse(100);
        assert_eq!(pump.reading().volume, 0);
        assert_eq!(pump.take_dispensed(), 0);
    }

    #[test]
    fn test_pressure_average() {
        let mut pump = PumpLoop::new(PumpId::P1, PumpConfig::default(), 404);
        pump.sample_pressure(1000);
        pump.sample_pressure(3000);
        assert_eq!(pump.reading().pressure, 2000);
        for _ in 0..PRESSURE_SAMPLES {
            pump.sample_pressure(9000);
        }
        assert_eq!(pump.reading().pressure, 9000);
    }

    #[test]
    fn test_phase_cut_delay() {
        let mut pump = flow_pump(PumpId::P1, 2000);
        assert_eq!(pump.cut_delay_us(), None);
        pump.update(SteamContext::default(), false);
        assert_eq!(pump.cut_delay_us(), Some(5300));
        assert!(!pump.holds_through_slot());
    }

    #[test]
    fn test_simulated_pump_tracks_setpoints() {
        let mut pump = PumpLoop::new(PumpId::P2, PumpConfig::default(), 404);
        pump.configure(PumpSetpoint {
            flow: 2000,
            pressure: 9000,
            volume: 500,
            control: ControlType::Flow,
            steam: false,
        });
        pump.set_active(true, true);
        assert_eq!(pump.status(), PumpStatus::Inactive);

        pump.simulate();
        let reading = pump.reading();
        assert_eq!((reading.flow_timed, reading.pressure, reading.volume), (2000, 9000, 200));
        pump.simulate();
        pump.simulate();
        assert_eq!(pump.reading().volume, 500);
        assert_eq!(pump.take_dispensed(), 500);

        pump.settle();
        assert_eq!(pump.reading().flow_timed, 0);
        assert_eq!(pump.reading().pressure, 0);
    }
}
