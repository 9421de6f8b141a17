//! Heater phase-window patterns
//!
//! Each zero-cross window is cut into ten slots. A power request selects
//! one of eleven slot masks, spread so that the conducting slots are
//! distributed over the window. Heaters 1 and 2 have a 300 W and a 900 W
//! track; heater 3 has a single 500 W track.

/// Slot masks from 0 % to 100 % in 10 % steps
pub const PHASE_MASKS: [u16; 11] = [0, 512, 528, 584, 585, 682, 693, 731, 887, 1022, 1023];

/// Slots per zero-cross window
pub const SLOTS: u8 = 10;

/// Power request that selects the Efast test pattern
pub const EFAST_TEST_W: u16 = 1;

/// Both tracks in two slots out of ten
const EFAST_TEST_MASK: u16 = 528;

/// Switched power of the heater tracks, W
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackPower {
    pub low_w: u16,
    pub high_w: u16,
}

impl Default for TrackPower {
    fn default() -> Self {
        Self {
            low_w: 300,
            high_w: 900,
        }
    }
}

impl TrackPower {
    pub const fn total(&self) -> u16 {
        self.low_w + self.high_w
    }
}

/// Track outputs for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackDrive {
    pub low: bool,
    pub high: bool,
}

impl TrackDrive {
    pub const OFF: Self = Self {
        low: false,
        high: false,
    };

    /// Whether either track conducts
    pub const fn any(&self) -> bool {
        self.low || self.high
    }
}

/// Whether `slot` is set in `mask`
pub const fn slot_on(mask: u16, slot: u8) -> bool {
    slot < 16 && mask & (1 << slot) != 0
}

fn mask_for(power_w: u16, track_w: u16) -> u16 {
    if track_w == 0 {
        return 0;
    }
    let index = (u32::from(power_w) * 10 / u32::from(track_w)).min(10) as usize;
    PHASE_MASKS[index]
}

/// Select the tracks of a flow-through heater for one slot
///
/// Up to the low track's rating only the low track switches. Up to the
/// high track's rating only the high track switches. Above that the high
/// track conducts continuously and the low track makes up the rest.
pub fn flow_through_drive(power_w: u16, tracks: TrackPower, slot: u8) -> TrackDrive {
    let power_w = power_w.min(tracks.total());
    if power_w == 0 {
        TrackDrive::OFF
    } else if power_w == EFAST_TEST_W {
        let on = slot_on(EFAST_TEST_MASK, slot);
        TrackDrive { low: on, high: on }
    } else if power_w > tracks.high_w {
        TrackDrive {
            low: slot_on(mask_for(power_w - tracks.high_w, tracks.low_w), slot),
            high: true,
        }
    } else if power_w <= tracks.low_w {
        TrackDrive {
            low: slot_on(mask_for(power_w, tracks.low_w), slot),
            high: false,
        }
    } else {
        TrackDrive {
            low: false,
            high: slot_on(mask_for(power_w, tracks.high_w), slot),
        }
    }
}

/// Select the single track of the brew-head heater for one slot
pub fn single_track_drive(power_w: u16, track_w: u16, slot: u8) -> bool {
    let power_w = power_w.min(track_w);
    power_w > 0 && slot_on(mask_for(power_w, track_w), slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots_on(power_w: u16) -> (u8, u8) {
        let mut low = 0;
        let mut high = 0;
        for slot in 0..SLOTS {
            let drive = flow_through_drive(power_w, TrackPower::default(), slot);
            low += drive.low as u8;
            high += drive.high as u8;
        }
        (low, high)
    }

    #[test]
    fn test_masks_grow_one_slot_per_step() {
        for (i, mask) in PHASE_MASKS.iter().enumerate() {
            assert_eq!(mask.count_ones() as usize, i);
        }
    }

    #[test]
    fn test_low_track_only() {
        assert_eq!(slots_on(0), (0, 0));
        assert_eq!(slots_on(150), (5, 0));
        assert_eq!(slots_on(300), (10, 0));
    }

    #[test]
    fn test_high_track_only() {
        assert_eq!(slots_on(450), (0, 5));
        assert_eq!(slots_on(900), (0, 10));
    }

    #[test]
    fn test_high_track_full_above_its_rating() {
        assert_eq!(slots_on(1050), (5, 10));
        assert_eq!(slots_on(1200), (10, 10));
        // Clamped to the sum of both tracks
        assert_eq!(slots_on(5000), (10, 10));
    }

    #[test]
    fn test_efast_pattern_fires_both_tracks_together() {
        let on: heapless::Vec<u8, 10> = (0..SLOTS)
            .filter(|&slot| flow_through_drive(EFAST_TEST_W, TrackPower::default(), slot).any())
            .collect();
        assert_eq!(on.as_slice(), &[4, 9]);
        let drive = flow_through_drive(EFAST_TEST_W, TrackPower::default(), 4);
        assert!(drive.low && drive.high);
    }

    #[test]
    fn test_single_track() {
        let count = |power| (0..SLOTS).filter(|&s| single_track_drive(power, 500, s)).count();
        assert_eq!(count(0), 0);
        assert_eq!(count(250), 5);
        assert_eq!(count(400), 8);
        assert_eq!(count(900), 10);
    }
}
