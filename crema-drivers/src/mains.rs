//! Mains zero-cross monitor
//!
//! The detector interrupt records a microsecond timestamp per edge. Every
//! 100 ms the monitor derives the mains frequency from the last interval
//! and watches for missing edges.

use crema_core::traits::MainsStatus;

/// Watchdog periods without an edge before the monitor faults
const WATCHDOG_LIMIT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZeroCrossMonitor {
    status: MainsStatus,
    watchdog: u8,
    edge_us: u32,
    previous_edge_us: u32,
    interval_us: u32,
    frequency: u16,
}

impl ZeroCrossMonitor {
    pub const fn new() -> Self {
        Self {
            status: MainsStatus::Inactive,
            watchdog: 0,
            edge_us: 0,
            previous_edge_us: 0,
            interval_us: 0,
            frequency: 0,
        }
    }

    /// Start or stop monitoring; stopping clears every reading
    pub fn enable(&mut self, enabled: bool) {
        if enabled {
            self.status = MainsStatus::Active;
        } else {
            self.status = MainsStatus::Inactive;
            self.clear();
        }
    }

    /// Record a detector edge
    pub fn edge(&mut self, now_us: u32) {
        if self.status != MainsStatus::Inactive {
            self.previous_edge_us = self.edge_us;
            self.edge_us = now_us;
        }
        self.watchdog = 0;
    }

    /// Run one 100 ms period
    pub fn update(&mut self) {
        if self.status == MainsStatus::Active {
            self.watchdog = (self.watchdog + 1).min(WATCHDOG_LIMIT);
        } else {
            self.watchdog = 0;
        }

        if self.watchdog >= WATCHDOG_LIMIT {
            if self.status != MainsStatus::Fault {
                #[cfg(feature = "defmt")]
                defmt::warn!("zero-cross lost");
            }
            self.status = MainsStatus::Fault;
            self.clear();
        } else if self.edge_us > self.previous_edge_us {
            if self.status == MainsStatus::Fault {
                self.status = MainsStatus::Active;
            }
            self.interval_us = self.edge_us - self.previous_edge_us;
            // Two edges per period
            self.frequency = ((5_000_000 / self.interval_us + 5) / 10) as u16;
        }
    }

    /// Report a live mains without hardware
    pub fn force_active(&mut self) {
        self.status = MainsStatus::Active;
        self.watchdog = 0;
    }

    fn clear(&mut self) {
        self.frequency = 0;
        self.edge_us = 0;
        self.previous_edge_us = 0;
        self.interval_us = 0;
    }

    pub fn status(&self) -> MainsStatus {
        self.status
    }

    /// Mains frequency, Hz
    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    /// Last edge-to-edge interval, µs
    pub fn interval_us(&self) -> u32 {
        self.interval_us
    }
}
