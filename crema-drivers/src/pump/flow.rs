//! Flow meter
//!
//! The turbine meter pulses once per `ul_per_pulse` µl. Two flows are
//! derived: a windowed one from the pulse count over nine control periods,
//! and a timed one from the interval between the last two pulses, measured
//! on a 10 kHz timebase.

/// Control periods per counting window (900 ms)
pub const WINDOW_PERIODS: u8 = 9;

/// Timebase of pulse timestamps, ticks per second
pub const PULSE_TIMEBASE_HZ: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlowMeter {
    pulses: u32,
    pulse_time: u32,
    periods: u8,
    no_flow: u16,
    flow: u32,
    flow_timed: u32,
}

impl FlowMeter {
    pub const fn new() -> Self {
        Self {
            pulses: 0,
            pulse_time: 0,
            periods: 0,
            no_flow: 0,
            flow: 0,
            flow_timed: 0,
        }
    }

    /// Record one pulse at `ticks` (10 kHz, wrapping)
    pub fn pulse(&mut self, ticks: u32, ul_per_pulse: u16) {
        self.pulses = self.pulses.saturating_add(1);
        let interval = ticks.wrapping_sub(self.pulse_time);
        self.pulse_time = ticks;
        self.flow_timed = if interval > 0 {
            u32::from(ul_per_pulse) * PULSE_TIMEBASE_HZ / interval
        } else {
            0
        };
    }

    /// Run one control period
    ///
    /// Every [`WINDOW_PERIODS`] periods the windowed flow is refreshed and
    /// the no-flow counter advanced. Returns `true` once the timed flow has
    /// read zero for more than `cutoff` windows in a row.
    /// The counter only advances while `counting` (pump active) and is
    /// cleared otherwise, so a stopped pump can never raise a no-flow fault.
    pub fn period(&mut self, ul_per_pulse: u16, counting: bool, cutoff: u16) -> bool {
        self.periods += 1;
        if self.periods < WINDOW_PERIODS {
            return false;
        }
        self.periods = 0;

        self.flow = self.pulses.saturating_mul(u32::from(ul_per_pulse));
        self.pulses = 0;
        if self.flow == 0 {
            self.flow_timed = 0;
        }

        if self.flow_timed == 0 && counting {
            self.no_flow = self.no_flow.saturating_add(1);
        } else {
            self.no_flow = 0;
        }
        self.no_flow > cutoff
    }

    /// Pulse count flow of the last window
    pub fn flow(&self) -> u32 {
        self.flow
    }

    /// Flow from the last pulse interval, µl/s
    pub fn flow_timed(&self) -> u32 {
        self.flow_timed
    }

    /// Overwrite both flows, used by the simulation
    pub fn set_flows(&mut self, flow: u32) {
        self.flow = flow;
        self.flow_timed = flow;
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
