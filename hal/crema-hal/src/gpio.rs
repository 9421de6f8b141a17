//! GPIO pin abstractions

/// Digital output pin
pub trait OutputPin {
    /// Drive the pin high
    fn set_high(&mut self);

    /// Drive the pin low
    fn set_low(&mut self);

    /// Drive the pin to `high`
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Whether the pin is currently driven high
    fn is_set_high(&self) -> bool;
}

/// Digital input pin
pub trait InputPin {
    /// Whether the pin reads high
    fn is_high(&self) -> bool;

    /// Whether the pin reads low
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Read a group of strap pins as a binary number, first pin least significant
///
/// Used for the board hardware revision straps.
pub fn read_straps<P: InputPin>(pins: &[P]) -> u8 {
    pins.iter()
        .enumerate()
        .filter(|(_, pin)| pin.is_high())
        .fold(0u8, |acc, (i, _)| acc | (1 << i))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Strap(bool);

    impl InputPin for Strap {
        fn is_high(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_read_straps_binary_weighting() {
        let pins = [Strap(false), Strap(true), Strap(false), Strap(false)];
        assert_eq!(read_straps(&pins), 2);

        let pins = [Strap(true), Strap(true), Strap(true), Strap(true)];
        assert_eq!(read_straps(&pins), 15);
    }

    #[test]
    fn test_read_straps_all_low() {
        let pins = [Strap(false), Strap(false)];
        assert_eq!(read_straps(&pins), 0);
        assert!(pins[0].is_low());
    }
}
