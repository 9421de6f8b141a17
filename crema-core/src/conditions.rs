//! Block end conditions
//!
//! A block carries up to four condition groups. The block is finished as
//! soon as any one group has every one of its conditions met. Empty groups
//! are ignored, so a block without any group never finishes on its own.

use heapless::Vec;

use crate::traits::{HeaterId, Plant, PumpId};

/// Maximum number of condition groups per block
pub const MAX_GROUPS: usize = 4;

/// One measurable predicate
///
/// The discriminant is the bit the host uses for it in a group mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConditionFlag {
    Flow1 = 0x8000,
    Flow2 = 0x4000,
    Pressure1 = 0x2000,
    Pressure2 = 0x1000,
    Temperature1 = 0x0800,
    Temperature2 = 0x0400,
    Temperature3 = 0x0200,
    Volume1 = 0x0100,
    Volume2 = 0x0080,
    MilkTemperature = 0x0040,
    TimePassed = 0x0020,
    TotalVolume = 0x0010,
}

impl ConditionFlag {
    pub const ALL: [ConditionFlag; 12] = [
        ConditionFlag::Flow1,
        ConditionFlag::Flow2,
        ConditionFlag::Pressure1,
        ConditionFlag::Pressure2,
        ConditionFlag::Temperature1,
        ConditionFlag::Temperature2,
        ConditionFlag::Temperature3,
        ConditionFlag::Volume1,
        ConditionFlag::Volume2,
        ConditionFlag::MilkTemperature,
        ConditionFlag::TimePassed,
        ConditionFlag::TotalVolume,
    ];

    pub const fn bit(self) -> u16 {
        self as u16
    }
}

/// Bits of a mask that name a condition
const KNOWN_BITS: u16 = 0xFFF0;

/// A set of conditions that must all hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConditionSet(u16);

impl ConditionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from a host mask, dropping bits that name no condition
    pub const fn from_mask(mask: u16) -> Self {
        Self(mask & KNOWN_BITS)
    }

    pub const fn mask(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, flag: ConditionFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: ConditionFlag) {
        self.0 |= flag.bit();
    }

    pub fn iter(self) -> impl Iterator<Item = ConditionFlag> {
        ConditionFlag::ALL
            .into_iter()
            .filter(move |&flag| self.contains(flag))
    }
}

impl FromIterator<ConditionFlag> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = ConditionFlag>>(iter: I) -> Self {
        let mut set = ConditionSet::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

/// The end-condition groups of one block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndConditions {
    groups: Vec<ConditionSet, MAX_GROUPS>,
}

impl EndConditions {
    pub const fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Build from the four host masks; zero masks are left out
    pub fn from_masks(masks: [u16; MAX_GROUPS]) -> Self {
        let mut groups = Vec::new();
        for set in masks.into_iter().map(ConditionSet::from_mask) {
            if !set.is_empty() {
                // At most MAX_GROUPS sets come out of MAX_GROUPS masks
                let _ = groups.push(set);
            }
        }
        Self { groups }
    }

    /// Add a group; empty groups and groups beyond the fourth are dropped
    pub fn with_group(mut self, group: ConditionSet) -> Self {
        if !group.is_empty() {
            let _ = self.groups.push(group);
        }
        self
    }

    pub fn groups(&self) -> &[ConditionSet] {
        &self.groups
    }

    /// Index of the first group whose conditions all hold
    pub fn first_met(&self, measurements: &Measurements) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.iter().all(|flag| measurements.holds(flag)))
    }

    pub fn is_met(&self, measurements: &Measurements) -> bool {
        self.first_met(measurements).is_some()
    }
}

/// Snapshot of everything an end condition can look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurements {
    /// Measured / target flow per pump, µl/s
    pub flow: [(u32, u32); 2],
    /// Measured / target pressure per pump, mbar
    pub pressure: [(u32, u32); 2],
    /// Measured / target volume per pump, µl
    pub volume: [(u32, u32); 2],
    /// Measured / target temperature per heater, 0.1 °C
    pub temperature: [(i16, i16); 3],
    /// Measured / target milk temperature, 0.1 °C
    pub milk: (i16, i16),
    /// Sequencer ticks spent in the block / block time budget
    pub time: (u16, u16),
    /// Volume credited to the recipe / recipe target, µl
    pub total_volume: (u32, u32),
}

impl Measurements {
    /// Read the live values from the plant
    pub fn sample<P: Plant>(plant: &P, time: (u16, u16), total_volume: (u32, u32)) -> Self {
        let pump = |id: PumpId| (plant.pump_reading(id), plant.pump_setpoint(id));
        let (r1, s1) = pump(PumpId::P1);
        let (r2, s2) = pump(PumpId::P2);
        let heater = |id: HeaterId| (plant.heater_temperature(id), plant.heater_target(id));

        Self {
            flow: [(r1.flow, s1.flow), (r2.flow, s2.flow)],
            pressure: [(r1.pressure, s1.pressure), (r2.pressure, s2.pressure)],
            volume: [(r1.volume, s1.volume), (r2.volume, s2.volume)],
            temperature: [
                heater(HeaterId::H1),
                heater(HeaterId::H2),
                heater(HeaterId::H3),
            ],
            milk: (plant.milk_temperature(), plant.milk_target()),
            time,
            total_volume,
        }
    }

    /// Whether a single condition currently holds
    pub fn holds(&self, flag: ConditionFlag) -> bool {
        fn reached<T: PartialOrd>((measured, target): (T, T)) -> bool {
            measured >= target
        }

        match flag {
            ConditionFlag::Flow1 => reached(self.flow[0]),
            ConditionFlag::Flow2 => reached(self.flow[1]),
            ConditionFlag::Pressure1 => reached(self.pressure[0]),
            ConditionFlag::Pressure2 => reached(self.pressure[1]),
            ConditionFlag::Temperature1 => reached(self.temperature[0]),
            ConditionFlag::Temperature2 => reached(self.temperature[1]),
            ConditionFlag::Temperature3 => reached(self.temperature[2]),
            ConditionFlag::Volume1 => reached(self.volume[0]),
            ConditionFlag::Volume2 => reached(self.volume[1]),
            ConditionFlag::MilkTemperature => reached(self.milk),
            ConditionFlag::TimePassed => reached(self.time),
            // Fails only once the credited volume has gone past the target
            ConditionFlag::TotalVolume => self.total_volume.1 >= self.total_volume.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(flags: &[ConditionFlag]) -> ConditionSet {
        flags.iter().copied().collect()
    }

    #[test]
    fn test_from_mask_drops_unknown_bits() {
        let set = ConditionSet::from_mask(0x002F);
        assert_eq!(set.mask(), 0x0020);
        assert!(set.contains(ConditionFlag::TimePassed));
        assert!(ConditionSet::from_mask(0x000F).is_empty());
    }

    #[test]
    fn test_iter_yields_every_flag() {
        let set = ConditionSet::from_mask(0xFFF0);
        assert_eq!(set.iter().count(), ConditionFlag::ALL.len());
    }

    #[test]
    fn test_zero_masks_are_skipped() {
        let conditions = EndConditions::from_masks([0, 0x0020, 0, 0x8000]);
        assert_eq!(conditions.groups().len(), 2);
        assert!(EndConditions::from_masks([0; 4]).groups().is_empty());
    }

    #[test]
    fn test_no_groups_never_met() {
        let m = Measurements::default();
        assert!(!EndConditions::new().is_met(&m));
    }

    #[test]
    fn test_all_flags_in_a_group_must_hold() {
        let conditions = EndConditions::new()
            .with_group(group(&[ConditionFlag::TimePassed, ConditionFlag::Temperature1]));

        let mut m = Measurements {
            time: (5, 5),
            temperature: [(900, 930), (0, 0), (0, 0)],
            ..Default::default()
        };
        assert!(!conditions.is_met(&m));

        m.temperature[0].0 = 930;
        assert!(conditions.is_met(&m));
    }

    #[test]
    fn test_any_group_is_enough() {
        let conditions = EndConditions::new()
            .with_group(group(&[ConditionFlag::Volume1]))
            .with_group(group(&[ConditionFlag::TimePassed]));

        let m = Measurements {
            volume: [(10_000, 40_000), (0, 0)],
            time: (30, 30),
            ..Default::default()
        };
        assert_eq!(conditions.first_met(&m), Some(1));
    }

    #[test]
    fn test_time_boundary() {
        let conditions = EndConditions::new().with_group(group(&[ConditionFlag::TimePassed]));
        let mut m = Measurements {
            time: (4, 5),
            ..Default::default()
        };
        assert!(!conditions.is_met(&m));
        m.time.0 = 5;
        assert!(conditions.is_met(&m));
    }

    #[test]
    fn test_total_volume_fails_only_when_exceeded() {
        let mut m = Measurements {
            total_volume: (50_000, 50_000),
            ..Default::default()
        };
        assert!(m.holds(ConditionFlag::TotalVolume));
        m.total_volume.0 = 50_001;
        assert!(!m.holds(ConditionFlag::TotalVolume));
    }
}
