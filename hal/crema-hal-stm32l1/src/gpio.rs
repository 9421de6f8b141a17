//! embassy-stm32 pins behind the `crema-hal` traits

use embassy_stm32::gpio::Input;
use embedded_hal::digital::OutputPin as _;

/// Push-pull output (valves, triacs, heater tracks)
///
/// Works with any `embedded-hal` output. The driven level is remembered
/// because reading it back needs `&mut` on that trait.
pub struct Pin<P> {
    pin: P,
    high: bool,
}

impl<P: embedded_hal::digital::OutputPin> Pin<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, high: false }
    }
}

impl<P: embedded_hal::digital::OutputPin> crema_hal::OutputPin for Pin<P> {
    fn set_high(&mut self) {
        // embassy GPIO writes are infallible
        let _ = self.pin.set_high();
        self.high = true;
    }

    fn set_low(&mut self) {
        let _ = self.pin.set_low();
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// Digital input (hardware revision straps, level switches)
pub struct Strap<'d>(pub Input<'d>);

impl crema_hal::InputPin for Strap<'_> {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}
