//! Status LED interface
//!
//! The sequencer only requests effects; rendering them on the LED strip is
//! the implementation's business.

/// LED groups on the front panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Led {
    WaterTank,
    Outlet,
    Standby,
}

impl Led {
    pub const ALL: [Led; 3] = [Led::WaterTank, Led::Outlet, Led::Standby];

    /// Map the strip position used by the host to a group
    ///
    /// Positions 0 and 1 both sit behind the water tank.
    pub const fn from_position(position: u8) -> Option<Self> {
        match position {
            0 | 1 => Some(Led::WaterTank),
            2 => Some(Led::Outlet),
            3 => Some(Led::Standby),
            _ => None,
        }
    }
}

/// Effect played by a LED group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    #[default]
    Off,
    On,
    Blink,
    Breathe,
    FadeIn,
    FadeOut,
}

impl Effect {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Effect::Off),
            1 => Some(Effect::On),
            2 => Some(Effect::Blink),
            3 => Some(Effect::Breathe),
            4 => Some(Effect::FadeIn),
            5 => Some(Effect::FadeOut),
            _ => None,
        }
    }
}

/// Full description of an effect request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedCommand {
    pub effect: Effect,
    pub rgb: [u8; 3],
    /// 0..=255
    pub intensity: u8,
    /// Blink on time, ms
    pub on_ms: u16,
    /// Blink off time, ms
    pub off_ms: u16,
    /// Interval between intensity steps for fades and breathing, ms
    pub step_ms: u8,
    /// Cycles or time to run before the effect ends, 0 = forever
    pub cycles: u16,
    /// Restore the previous effect once `cycles` run out
    pub restore: bool,
}

impl LedCommand {
    pub const fn off() -> Self {
        Self {
            effect: Effect::Off,
            rgb: [0, 0, 0],
            intensity: 0,
            on_ms: 0,
            off_ms: 0,
            step_ms: 0,
            cycles: 0,
            restore: false,
        }
    }

    /// Fade, breathe and similar effects that only need a colour and a step
    pub const fn stepped(effect: Effect, rgb: [u8; 3], intensity: u8, step_ms: u8) -> Self {
        Self {
            effect,
            rgb,
            intensity,
            on_ms: 0,
            off_ms: 0,
            step_ms,
            cycles: 0,
            restore: false,
        }
    }

    pub const fn blink(rgb: [u8; 3], intensity: u8, on_ms: u16, off_ms: u16) -> Self {
        Self {
            effect: Effect::Blink,
            rgb,
            intensity,
            on_ms,
            off_ms,
            step_ms: 0,
            cycles: 0,
            restore: false,
        }
    }
}

/// Front panel LEDs
pub trait Indicator {
    fn set_led(&mut self, led: Led, command: LedCommand);

    /// Effect currently playing
    fn led_effect(&self, led: Led) -> Effect;

    /// Intensity of the current effect
    fn led_intensity(&self, led: Led) -> u8;
}
