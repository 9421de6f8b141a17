//! Board wiring
//!
//! [`BoardIo`] is the [`PlantIo`] the controllers run against. Analog
//! readings come from [`ANALOG`], which the sensor task refreshes every
//! millisecond, so nothing in here ever waits on the ADC.

use core::sync::atomic::Ordering;

use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::peripherals::TIM2;
use embassy_stm32::timer::simple_pwm::SimplePwm;
use portable_atomic::AtomicU16;

use crema_core::recipe::{Circuit, Outlet};
use crema_core::traits::{Auxiliary, HeaterId, PumpId};
use crema_drivers::io::Track;
use crema_drivers::led::Rgb;
use crema_drivers::sensor::{
    AdcReader, NtcSensor, PressureSensor, PressureTransducer, SensorError, TemperatureSensor,
};
use crema_drivers::{PlantIo, SwitchedOutput};
use crema_hal_stm32l1::gpio::Pin;

use crate::config::MACHINE;

/// Triac, valve or LED output
pub type Switch = SwitchedOutput<Pin<Output<'static>>>;

/// Analog inputs in sampling order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogInput {
    Heater1,
    Heater2,
    Heater3,
    Milk,
    Pressure1,
    Pressure2,
}

pub const ANALOG_INPUTS: usize = 6;

/// Marker for a channel the sensor task has not converted yet
const NOT_SAMPLED: u16 = u16::MAX;

/// Latest 12-bit sample per [`AnalogInput`]
pub static ANALOG: [AtomicU16; ANALOG_INPUTS] =
    [const { AtomicU16::new(NOT_SAMPLED) }; ANALOG_INPUTS];

/// Reads the cached sample of one input
pub struct CachedChannel(pub AnalogInput);

impl AdcReader for CachedChannel {
    fn read(&mut self) -> Result<u16, SensorError> {
        match ANALOG[self.0 as usize].load(Ordering::Relaxed) {
            NOT_SAMPLED => Err(SensorError::Conversion),
            raw => Ok(raw),
        }
    }
}

/// Heater tracks in the order H1 low, H1 high, H2 low, H2 high, H3
pub struct HeaterOutputs(pub [Switch; 5]);

/// Brew valves per circuit in outlet order, plus the shared valve
pub struct ValveOutputs {
    pub circuits: [[Switch; 3]; 2],
    pub shared: Switch,
}

/// Inputs from the steam wand
pub struct WandInputs {
    /// High while fluid touches the probe
    pub milk_probe: Input<'static>,
    /// Pulled low by the holder switch
    pub parked: Input<'static>,
}

pub struct BoardIo {
    temperatures: [NtcSensor<CachedChannel>; 3],
    milk: NtcSensor<CachedChannel>,
    pressures: [PressureTransducer<CachedChannel>; 2],
    heaters: HeaterOutputs,
    pumps: [Switch; 2],
    valves: ValveOutputs,
    zero_cross: Switch,
    air: SimplePwm<'static, TIM2>,
    wand: WandInputs,
}

impl BoardIo {
    pub fn new(
        heaters: HeaterOutputs,
        pumps: [Switch; 2],
        valves: ValveOutputs,
        zero_cross: Switch,
        mut air: SimplePwm<'static, TIM2>,
        wand: WandInputs,
    ) -> Self {
        let ntc = |input| NtcSensor::new(CachedChannel(input), MACHINE.ntc_pullup_ohms);
        let transducer = |input| {
            PressureTransducer::new(CachedChannel(input), MACHINE.pressure_full_scale_mbar)
        };

        let mut air_channel = air.ch4();
        air_channel.set_duty_cycle_fully_off();
        air_channel.enable();

        Self {
            temperatures: [
                ntc(AnalogInput::Heater1),
                ntc(AnalogInput::Heater2),
                ntc(AnalogInput::Heater3),
            ],
            milk: ntc(AnalogInput::Milk),
            pressures: [
                transducer(AnalogInput::Pressure1),
                transducer(AnalogInput::Pressure2),
            ],
            heaters,
            pumps,
            valves,
            zero_cross,
            air,
            wand,
        }
    }
}

impl PlantIo for BoardIo {
    fn heater_temperature(&mut self, heater: HeaterId) -> Result<i16, SensorError> {
        self.temperatures[heater.index()].read_celsius_x10()
    }

    fn milk_temperature(&mut self) -> Result<i16, SensorError> {
        self.milk.read_celsius_x10()
    }

    fn pressure_mbar(&mut self, pump: PumpId) -> Result<u32, SensorError> {
        self.pressures[pump.index()].read_mbar()
    }

    fn milk_detected(&mut self) -> bool {
        self.wand.milk_probe.is_high()
    }

    fn wand_parked(&mut self) -> bool {
        self.wand.parked.is_low()
    }

    fn set_heater_track(&mut self, heater: HeaterId, track: Track, on: bool) {
        let index = match (heater, track) {
            (HeaterId::H1, Track::Low) => 0,
            (HeaterId::H1, Track::High) => 1,
            (HeaterId::H2, Track::Low) => 2,
            (HeaterId::H2, Track::High) => 3,
            (HeaterId::H3, Track::Low) => 4,
            (HeaterId::H3, Track::High) => return,
        };
        self.heaters.0[index].set(on);
    }

    fn set_pump_output(&mut self, pump: PumpId, on: bool) {
        self.pumps[pump.index()].set(on);
    }

    fn set_air_duty(&mut self, percentage: u8) {
        self.air.ch4().set_duty_cycle_percent(percentage.min(100));
    }

    fn set_valve(&mut self, circuit: Circuit, outlet: Outlet, open: bool) {
        let index = match outlet {
            Outlet::Coffee => 0,
            Outlet::Milk => 1,
            Outlet::Water => 2,
            Outlet::Off => return,
        };
        self.valves.circuits[circuit.index()][index].set(open);
    }

    fn set_shared_valve(&mut self, open: bool) {
        self.valves.shared.set(open);
    }

    fn enable_zero_cross(&mut self, enabled: bool) {
        self.zero_cross.set(enabled);
    }
}

/// Front panel buttons, sampled into [`Auxiliary`]
pub struct PanelInputs {
    pub coffee_button: Input<'static>,
    pub milk_button: Input<'static>,
}

impl PanelInputs {
    pub fn sample(&self, mut auxiliary: Auxiliary) -> Auxiliary {
        auxiliary.coffee_button = u16::from(self.coffee_button.is_low());
        auxiliary.milk_button = u16::from(self.milk_button.is_low());
        auxiliary
    }
}

/// Brightness steps of the software PWM
pub const LED_STEPS: u8 = 8;

/// RGB outputs of the three LED groups, dimmed by software PWM
pub struct LedOutputs {
    groups: [[Switch; 3]; 3],
    phase: u8,
}

impl LedOutputs {
    pub fn new(groups: [[Switch; 3]; 3]) -> Self {
        Self { groups, phase: 0 }
    }

    /// Advance the PWM by one step and drive the current frame
    pub fn refresh(&mut self, frame: &[Rgb; 3]) {
        self.phase = (self.phase + 1) % LED_STEPS;
        let threshold = u16::from(self.phase) * 256 / u16::from(LED_STEPS);
        for (outputs, colour) in self.groups.iter_mut().zip(frame) {
            for (output, level) in outputs.iter_mut().zip(colour) {
                output.set(u16::from(*level) > threshold);
            }
        }
    }
}
