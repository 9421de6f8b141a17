//! Pump output patterns
//!
//! Vibration pumps are driven either by eliminating whole half-waves or by
//! cutting each half-wave at a delay after the zero-cross.

/// Half-wave masks from 0 % to 100 % in 10 % steps
pub const PUMP_MASKS: [u16; 11] = [0, 512, 768, 896, 960, 992, 1008, 1016, 1020, 1022, 1023];

/// Half-slots in one elimination cycle
pub const HALF_SLOTS: u8 = 20;

/// Phase-cutting delay per missing percent, µs
const CUT_DELAY_PER_PERCENT_US: u32 = 100;

/// How a pump output is modulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpMode {
    /// Whole half-waves on or off
    Elimination,
    /// On after a delay in every half-wave
    #[default]
    PhaseCutting,
}

/// Output of an elimination-mode pump in one half-slot
///
/// Even half-slots are always off; odd ones follow the mask of the
/// requested duty.
pub fn elimination_on(percentage: u8, half_slot: u8) -> bool {
    if percentage == 0 || half_slot % 2 == 0 {
        return false;
    }
    let mask = PUMP_MASKS[usize::from(percentage.min(100) / 10)];
    let position = half_slot / 2;
    position < 16 && mask & (1 << position) != 0
}

/// Delay after the zero-cross before a phase-cut pump switches on
pub fn cut_delay_us(percentage: u8) -> u32 {
    CUT_DELAY_PER_PERCENT_US * u32::from(100 - percentage.min(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_half_slots(percentage: u8) -> usize {
        (0..HALF_SLOTS)
            .filter(|&slot| elimination_on(percentage, slot))
            .count()
    }

    #[test]
    fn test_elimination_duty() {
        assert_eq!(active_half_slots(0), 0);
        assert_eq!(active_half_slots(10), 1);
        assert_eq!(active_half_slots(55), 5);
        assert_eq!(active_half_slots(100), 10);
        assert_eq!(active_half_slots(200), 10);
    }

    #[test]
    fn test_even_half_slots_are_off() {
        for slot in (0..HALF_SLOTS).step_by(2) {
            assert!(!elimination_on(100, slot));
        }
    }

    #[test]
    fn test_cut_delay() {
        assert_eq!(cut_delay_us(100), 0);
        assert_eq!(cut_delay_us(40), 6000);
        assert_eq!(cut_delay_us(0), 10_000);
    }
}
