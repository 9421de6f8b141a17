//! Machine context
//!
//! All mutable controller state lives in one [`MachineContext`]. The
//! firmware owns it behind a mutex and calls [`MachineContext::tick_1ms`]
//! from its control task and [`MachineContext::dispatch`] for every frame
//! the link delivers. Nothing in here blocks.

use heapless::Vec;

use crate::action::PendingAction;
use crate::claims::Resource;
use crate::config::{hardware_incompatible, MachineSettings};
use crate::dispatcher::Reply;
use crate::partition::PartitionTable;
use crate::recipe::{RecipeBook, RecipeSlot, NO_BLOCK};
use crate::scheduler::{Scheduler, Task};
use crate::sequencer::{MainStatus, WorkState};
use crate::traits::{Led, LedCommand, Plant, PumpId};

/// Serial number reported when the board carries none
pub const DEFAULT_SERIAL_NUMBER: u32 = 0xF145_6F12;

/// Application version, major.minor.patch packed as 4.4.8 bits
pub const SOFTWARE_VERSION: u16 = (2 << 12) + (2 << 8) + 15;

/// Identity reported in device data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub serial_number: u32,
    /// Revision read from the strap pins
    pub hardware_version: u8,
    pub software_version: u16,
    pub bootloader_version: u16,
}

impl DeviceInfo {
    pub const fn new(hardware_version: u8) -> Self {
        Self {
            serial_number: DEFAULT_SERIAL_NUMBER,
            hardware_version,
            software_version: SOFTWARE_VERSION,
            bootloader_version: 0,
        }
    }
}

/// The complete controller state
#[derive(Debug, Clone)]
pub struct MachineContext {
    pub(crate) device: DeviceInfo,
    pub(crate) settings: MachineSettings,
    pub(crate) partitions: PartitionTable,
    pub(crate) recipes: RecipeBook,
    pub(crate) work: WorkState,
    pub(crate) action: PendingAction,
    pub(crate) scheduler: Scheduler,
}

impl MachineContext {
    pub fn new(device: DeviceInfo, settings: MachineSettings, partitions: PartitionTable) -> Self {
        Self {
            device,
            settings,
            partitions,
            recipes: RecipeBook::new(),
            work: WorkState::new(),
            action: PendingAction::new(),
            scheduler: Scheduler::new(),
        }
    }

    /// Bring the plant in line with the loaded settings
    ///
    /// Must run once before the first tick. A board revision this firmware
    /// cannot drive parks the sequencer in
    /// [`MainStatus::HardwareIncompatible`] with all LEDs blinking red.
    pub fn boot<P: Plant>(&mut self, plant: &mut P) {
        plant.set_simulation(self.settings.simulation());
        for pump in PumpId::ALL {
            plant.set_calibration(pump, self.settings.ul_per_pulse(pump));
        }

        if hardware_incompatible(self.device.hardware_version, &self.settings) {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "hardware version {} not supported",
                self.device.hardware_version
            );
            for led in Led::ALL {
                plant.set_led(led, LedCommand::blink([255, 0, 0], 255, 100, 100));
            }
            self.work.set_main(MainStatus::HardwareIncompatible);
        }
    }

    /// Run one millisecond of the control loop
    ///
    /// Returns the reply of a pending action once it resolves.
    pub fn tick_1ms<P: Plant>(&mut self, plant: &mut P) -> Option<Reply> {
        plant.update_indicators();
        plant.sample_pressure();
        self.credit_dispensed(plant);

        let due: Vec<Task, 6> = self.scheduler.tick().collect();
        let now = self.scheduler.now_ms();
        let mut reply = None;

        for task in due {
            match task {
                Task::Sequence => self.run_sequence(plant),
                Task::Action => reply = self.action.poll(now).map(Reply::from),
                Task::Mains => plant.update_mains(),
                Task::Pumps => plant.update_pumps(),
                Task::Heaters => plant.update_heaters(),
                Task::Milk => plant.update_milk(),
            }
        }
        reply
    }

    /// Credit pumped volume to the recipe holding each pump's circuit
    fn credit_dispensed<P: Plant>(&mut self, plant: &mut P) {
        for pump in PumpId::ALL {
            let dispensed = plant.take_dispensed(pump);
            if dispensed == 0 {
                continue;
            }
            if let Some(owner) = self.work.claims.owner(Resource::circuit(pump.circuit())) {
                self.recipes.get_mut(owner).credit_volume(dispensed);
            }
        }
    }

    /// Current block of a slot as reported to the host
    ///
    /// While idle, slot 3 reads block 0 whenever a pre-heat temperature is
    /// set, whether or not it was started.
    pub fn reported_block(&self, slot: RecipeSlot) -> u8 {
        if slot == RecipeSlot::Three && self.work.main() == MainStatus::Idle {
            if self.recipes.preheat_temperature() > 0 {
                0
            } else {
                NO_BLOCK
            }
        } else {
            self.recipes.get(slot).current_block_raw()
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn work(&self) -> &WorkState {
        &self.work
    }

    pub fn pending_action(&self) -> &PendingAction {
        &self.action
    }

    pub fn now_ms(&self) -> u32 {
        self.scheduler.now_ms()
    }
}
