//! Pump controller traits

use crate::recipe::Circuit;

/// The two brew pumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpId {
    P1,
    P2,
}

impl PumpId {
    pub const ALL: [PumpId; 2] = [PumpId::P1, PumpId::P2];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pump that belongs to a brew circuit
    pub const fn for_circuit(circuit: Circuit) -> Self {
        match circuit {
            Circuit::One => PumpId::P1,
            Circuit::Two => PumpId::P2,
        }
    }

    /// Brew circuit this pump feeds
    pub const fn circuit(self) -> Circuit {
        match self {
            PumpId::P1 => Circuit::One,
            PumpId::P2 => Circuit::Two,
        }
    }
}

/// Which quantity the pump regulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlType {
    /// Pump output is left alone
    #[default]
    None,
    Flow,
    Pressure,
    /// Flow until the flow target is met, then pressure
    FlowAndPressure,
}

impl ControlType {
    /// Decode the recipe field; unknown values regulate nothing
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => ControlType::Flow,
            2 => ControlType::Pressure,
            3 => ControlType::FlowAndPressure,
            _ => ControlType::None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            ControlType::None => 0,
            ControlType::Flow => 1,
            ControlType::Pressure => 2,
            ControlType::FlowAndPressure => 3,
        }
    }

    pub const fn regulates_flow(self) -> bool {
        matches!(self, ControlType::Flow | ControlType::FlowAndPressure)
    }

    pub const fn regulates_pressure(self) -> bool {
        matches!(self, ControlType::Pressure | ControlType::FlowAndPressure)
    }
}

/// Pump lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpStatus {
    #[default]
    Inactive,
    Active,
    /// No flow measured for longer than the cutoff
    Fault,
}

/// Targets for one pump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpSetpoint {
    /// Flow in µl/s
    pub flow: u32,
    /// Pressure in mbar
    pub pressure: u32,
    /// Volume in µl; reaching it deactivates the pump
    pub volume: u32,
    pub control: ControlType,
    /// Circuit feeds the milk outlet
    pub steam: bool,
}

/// Measured state of one pump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpReading {
    /// Flow from pulse counts over the last sample window, µl/s
    pub flow: u32,
    /// Flow from the interval between the last two pulses, µl/s
    pub flow_timed: u32,
    /// Averaged pressure, mbar
    pub pressure: u32,
    /// Volume pumped since the pump was last configured, µl
    pub volume: u32,
}

/// Closed-loop control of both brew pumps
pub trait PumpBank {
    /// Replace the targets of a pump and clear its volume counter
    fn configure_pump(&mut self, pump: PumpId, setpoint: PumpSetpoint);

    fn pump_setpoint(&self, pump: PumpId) -> PumpSetpoint;

    /// Flow meter calibration in µl per pulse
    fn set_calibration(&mut self, pump: PumpId, ul_per_pulse: u16);

    fn pump_reading(&self, pump: PumpId) -> PumpReading;

    fn set_pump_active(&mut self, pump: PumpId, active: bool);

    fn pump_status(&self, pump: PumpId) -> PumpStatus;

    /// Duty in percent currently applied
    fn pump_percentage(&self, pump: PumpId) -> u8;

    /// Volume pumped since the previous call, µl
    ///
    /// The sequencer credits this to every recipe holding the pump's circuit.
    fn take_dispensed(&mut self, pump: PumpId) -> u32;

    /// Run one control period (100 ms)
    fn update_pumps(&mut self);

    /// Take one pressure sample (1 ms)
    fn sample_pressure(&mut self);
}
