//! Heater control loops
//!
//! One [`HeaterLoop`] per heater, run every 50 ms. The PID output (0..=10000)
//! passes a fixed chain of safety rules before it is turned into a power
//! request in watts, which the phase tick then spreads over the zero-cross
//! window.

pub mod efast;
pub mod phase;

pub use efast::{EfastMonitor, MAX_EFAST};
pub use phase::{TrackDrive, TrackPower, EFAST_TEST_W};

use crate::pid::{PidCoefficients, PidState};

/// Full-scale controller output
pub const MAX_CONTROL: u16 = 10_000;

/// Controller output that requests the Efast test pattern
const EFAST_TEST_CONTROL: u16 = 1;

/// Element layout of a heater
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaterKind {
    /// Two switched tracks with Efast feedback
    FlowThrough(TrackPower),
    /// Single track that never drives above its set-point
    BrewHead { track_w: u16 },
}

/// Tuning of one heater loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaterConfig {
    pub kind: HeaterKind,
    pub gains: PidCoefficients,
    /// Power requested at full controller output, W
    pub full_output_w: u16,
    /// Rise per period (0.1 °C) above which the output is cut
    pub max_rise_x10: i16,
    /// Distance below set-point (0.1 °C) that forces full output
    pub boost_below_x10: i16,
    /// A falling temperature at or below set-point boosts outputs under this
    pub recovery_threshold: u16,
    /// Outputs below this are treated as zero
    pub min_output: u16,
}

impl HeaterConfig {
    /// Flow-through heaters 1 and 2
    pub const fn flow_through() -> Self {
        Self {
            kind: HeaterKind::FlowThrough(TrackPower {
                low_w: 300,
                high_w: 900,
            }),
            gains: PidCoefficients::from_scaled_1000(100_000, 4_500, 1_000_000),
            full_output_w: 1200,
            max_rise_x10: 2,
            boost_below_x10: 50,
            recovery_threshold: 7500,
            min_output: 10,
        }
    }

    /// Brew-head heater 3
    pub const fn brew_head() -> Self {
        Self {
            kind: HeaterKind::BrewHead { track_w: 500 },
            gains: PidCoefficients::from_scaled_1000(1_000, 0, 0),
            full_output_w: 400,
            max_rise_x10: 2,
            boost_below_x10: 50,
            recovery_threshold: 7500,
            min_output: 10,
        }
    }
}

/// Closed-loop control of one heater
#[derive(Debug, Clone)]
pub struct HeaterLoop {
    config: HeaterConfig,
    target_x10: i16,
    temperature_x10: i16,
    previous_x10: i16,
    active: bool,
    steam: bool,
    pid: PidState,
    control: u16,
    power_w: u16,
    efast: EfastMonitor,
}

impl HeaterLoop {
    pub fn new(config: HeaterConfig) -> Self {
        Self {
            config,
            target_x10: 0,
            temperature_x10: 0,
            previous_x10: 0,
            active: false,
            steam: false,
            pid: PidState::new(),
            control: 0,
            power_w: 0,
            efast: EfastMonitor::new(),
        }
    }

    pub fn set_target(&mut self, target_x10: i16, steam: bool) {
        self.target_x10 = target_x10;
        self.steam = steam;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.cut();
        }
    }

    /// Run one 50 ms period
    ///
    /// `reading` is `None` when the sensor failed; the output is cut for the
    /// period and the previous measurement kept. In `simulated` mode the
    /// target survives deactivation so the simulation can keep tracking it.
    pub fn update(&mut self, reading: Option<i16>, simulated: bool) {
        let Some(temperature) = reading else {
            #[cfg(feature = "defmt")]
            defmt::warn!("heater sensor read failed, output cut");
            self.cut();
            return;
        };

        self.temperature_x10 = temperature;
        let rise = temperature.saturating_sub(self.previous_x10);

        if !self.active || self.target_x10 == 0 {
            self.active = false;
            self.cut();
            if !simulated {
                self.target_x10 = 0;
                self.previous_x10 = 0;
            }
            return;
        }

        let error = i32::from(self.target_x10) - i32::from(temperature);
        let raw = self.pid.step(&self.config.gains, error);
        self.control = self.apply_limits(raw, temperature, rise);
        self.previous_x10 = temperature;
        self.power_w = self.power_for(self.control);
    }

    fn apply_limits(&self, raw: i64, temperature: i16, rise: i16) -> u16 {
        let target = self.target_x10;
        let mut control = if raw < i64::from(self.config.min_output) {
            0
        } else {
            raw.min(i64::from(MAX_CONTROL)) as u16
        };

        if rise > self.config.max_rise_x10 {
            control = 0;
        }
        if target.saturating_sub(temperature) > self.config.boost_below_x10 {
            control = MAX_CONTROL;
        }
        // At set-point and still rising
        if temperature >= target && rise > 0 {
            control = 0;
        }
        // Below set-point and falling
        if temperature <= target && rise < 0 && control < self.config.recovery_threshold {
            control = MAX_CONTROL;
        }
        if self.efast.overheating() {
            control = EFAST_TEST_CONTROL;
        }
        if matches!(self.config.kind, HeaterKind::BrewHead { .. }) && temperature > target {
            control = 0;
        }
        control
    }

    fn power_for(&self, control: u16) -> u16 {
        match self.config.kind {
            HeaterKind::FlowThrough(_) if control == EFAST_TEST_CONTROL => EFAST_TEST_W,
            _ => {
                let watts = u32::from(control) * u32::from(self.config.full_output_w)
                    / u32::from(MAX_CONTROL);
                // 1 W is reserved for the test pattern
                if watts == u32::from(EFAST_TEST_W) {
                    0
                } else {
                    watts as u16
                }
            }
        }
    }

    fn cut(&mut self) {
        self.pid.reset();
        self.control = 0;
        self.power_w = 0;
    }

    /// Track outputs for one phase slot
    ///
    /// Marks the Efast window as fired whenever a track conducts.
    pub fn drive(&mut self, slot: u8) -> TrackDrive {
        if !self.active {
            return TrackDrive::OFF;
        }
        match self.config.kind {
            HeaterKind::FlowThrough(tracks) => {
                let drive = phase::flow_through_drive(self.power_w, tracks, slot);
                if drive.any() {
                    self.efast.mark_fired();
                }
                drive
            }
            HeaterKind::BrewHead { track_w } => {
                let on = phase::single_track_drive(self.power_w, track_w, slot);
                TrackDrive { low: on, high: false }
            }
        }
    }

    pub fn target(&self) -> i16 {
        self.target_x10
    }

    pub fn temperature(&self) -> i16 {
        self.temperature_x10
    }

    /// Overwrite the measurement, used by the simulation
    pub fn set_temperature(&mut self, temperature_x10: i16) {
        self.temperature_x10 = temperature_x10;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn steam(&self) -> bool {
        self.steam
    }

    /// Controller output after the safety rules
    pub fn control(&self) -> u16 {
        self.control
    }

    /// Power request, W
    pub fn power(&self) -> u16 {
        self.power_w
    }

    pub fn efast(&self) -> &EfastMonitor {
        &self.efast
    }

    pub fn efast_mut(&mut self) -> &mut EfastMonitor {
        &mut self.efast
    }
}
