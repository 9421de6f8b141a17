//! Efast heater feedback
//!
//! Each flow-through heater has a feedback input that pulses while the
//! element conducts. The pulses are counted per zero-cross window. A window
//! in which the phase output fired yields a valid value, measured against
//! a baseline taken while the machine idles. A dry or scaled element shows
//! a high value, which the heater and pump loops answer by falling back to
//! the Efast test pattern.

/// Valid values above this force the Efast test output
pub const MAX_EFAST: u16 = 20;

/// Pulse counter of one heater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EfastMonitor {
    counter: u16,
    peak: u16,
    last_window: u16,
    offset: u16,
    valid: u16,
    fired: bool,
}

impl EfastMonitor {
    pub const fn new() -> Self {
        Self {
            counter: 0,
            peak: 0,
            last_window: 0,
            offset: 0,
            valid: 0,
            fired: false,
        }
    }

    /// Count one feedback pulse
    pub fn count(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    /// The phase output switched the element on during this window
    pub fn mark_fired(&mut self) {
        self.fired = true;
    }

    /// Close the window at a zero-cross
    pub fn close_window(&mut self) {
        self.peak = self.peak.max(self.counter);
        self.last_window = self.counter;
        if self.fired {
            self.fired = false;
            self.valid = self.counter.saturating_sub(self.offset);
        }
        self.counter = 0;
    }

    /// Take the last window as the no-load baseline
    pub fn rebaseline(&mut self) {
        self.offset = self.last_window;
    }

    /// Last valid value above the baseline
    pub fn valid(&self) -> u16 {
        self.valid
    }

    /// Whether the element needs protecting
    pub fn overheating(&self) -> bool {
        self.valid > MAX_EFAST
    }

    /// Highest count seen in any window
    pub fn peak(&self) -> u16 {
        self.peak
    }
}
