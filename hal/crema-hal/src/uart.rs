//! Host link serial settings and error classification

/// UART configuration for the host link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self { baudrate: 115_200 }
    }
}

/// Receive error reported by a chip UART
///
/// Any of these leaves the receiver in an unknown state; the link task
/// restarts reception and lets the frame assembler resynchronise on the
/// next start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    Framing,
    Noise,
    Overrun,
    Parity,
    Other,
}
