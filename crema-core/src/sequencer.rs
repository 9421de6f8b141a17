//! Work sequencer
//!
//! Runs every 100 ms. The machine moves through
//!
//! ```text
//! Undefined ──► Standby ◄──► Idle ◄──► Prepare
//! ```
//!
//! with HardwareIncompatible as a trap entered at boot. Every main state has
//! an entry step (sub status Undefined) that runs once after each change.
//!
//! Inside Prepare each brewing recipe runs its own small machine: claim the
//! resources the current block needs, program the controllers, then wait
//! for one of the block's end-condition groups.

use heapless::Vec;

use crate::action::Action;
use crate::claims::{ClaimError, Resource};
use crate::conditions::Measurements;
use crate::context::MachineContext;
use crate::recipe::{Outlet, RecipeBlock, RecipeSlot, ValveSelector};
use crate::traits::{Effect, HeaterId, Led, LedCommand, Plant, PumpId, PumpSetpoint, PumpStatus};

const WHITE: [u8; 3] = [255, 255, 255];
const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

/// Intensity of the idle and standby LED effects
const LED_INTENSITY: u8 = 50;

/// Fade and breathe step, ms
const LED_STEP_MS: u8 = 5;

/// Top-level machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MainStatus {
    #[default]
    Undefined,
    Standby,
    Idle,
    Prepare,
    /// Strap revision too old; nothing runs
    HardwareIncompatible,
}

impl MainStatus {
    /// Value reported in process data
    pub const fn wire_code(self) -> u8 {
        match self {
            MainStatus::Undefined => 0,
            MainStatus::Idle => 2,
            MainStatus::Standby => 5,
            MainStatus::Prepare => 19,
            MainStatus::HardwareIncompatible => 21,
        }
    }
}

/// Progress within a main state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubStatus {
    /// Entry step pending
    #[default]
    Undefined,
    Wait,
    Active,
}

impl SubStatus {
    pub const fn wire_code(self) -> u8 {
        match self {
            SubStatus::Undefined => 0,
            SubStatus::Active => 3,
            SubStatus::Wait => 6,
        }
    }
}

/// State of one running recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrepareStatus {
    #[default]
    Inactive,
    /// Claim and program the current block
    Initialize,
    /// Block running, end conditions polled
    WaitForConditions,
    /// The other recipe holds something this block needs
    WaitForOther,
    /// Pump fault; released and stopped on the next tick
    Error,
}

/// Heaters and pumps a recipe switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Usage {
    heaters: [bool; 3],
    pumps: [bool; 2],
}

/// Everything the sequencer remembers between ticks
///
/// Slot 3 has entries in the per-slot arrays but never leaves
/// [`PrepareStatus::Inactive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WorkState {
    main: MainStatus,
    sub: SubStatus,
    prepare: [PrepareStatus; 3],
    /// Sequencer ticks spent in the current block
    block_ticks: [u16; 3],
    /// Sequencer ticks since pre-heat was (re)started
    preheat_ticks: u16,
    usage: [Usage; 3],
    pub(crate) claims: crate::claims::ClaimTable,
}

impl WorkState {
    pub const fn new() -> Self {
        Self {
            main: MainStatus::Undefined,
            sub: SubStatus::Undefined,
            prepare: [PrepareStatus::Inactive; 3],
            block_ticks: [0; 3],
            preheat_ticks: 0,
            usage: [Usage {
                heaters: [false; 3],
                pumps: [false; 2],
            }; 3],
            claims: crate::claims::ClaimTable::new(),
        }
    }

    pub fn main(&self) -> MainStatus {
        self.main
    }

    pub fn sub(&self) -> SubStatus {
        self.sub
    }

    pub fn prepare(&self, slot: RecipeSlot) -> PrepareStatus {
        self.prepare[slot.index()]
    }

    pub fn claims(&self) -> &crate::claims::ClaimTable {
        &self.claims
    }

    /// Change the main state; the new state's entry step runs next tick
    pub(crate) fn set_main(&mut self, main: MainStatus) {
        if self.main != main {
            #[cfg(feature = "defmt")]
            defmt::info!("main status {} -> {}", self.main, main);
            self.main = main;
            self.sub = SubStatus::Undefined;
        }
    }

    fn set_prepare(&mut self, slot: RecipeSlot, status: PrepareStatus) {
        let current = &mut self.prepare[slot.index()];
        if *current != status {
            #[cfg(feature = "defmt")]
            defmt::debug!("recipe {} {} -> {}", slot, *current, status);
            *current = status;
        }
    }
}

/// Resources a block needs before it may run
fn wanted_resources(block: &RecipeBlock) -> Vec<Resource, 4> {
    let mut wanted = Vec::new();
    if let Some(selector) = ValveSelector::decode(block.valves) {
        for circuit in selector.circuits() {
            let _ = wanted.push(Resource::circuit(circuit));
        }
        if selector.outlet == Outlet::Water {
            let _ = wanted.push(Resource::S3);
        }
    }
    if block.air_pump > 0 {
        let _ = wanted.push(Resource::AirPump);
    }
    wanted
}

impl MachineContext {
    /// One sequencer tick
    pub(crate) fn run_sequence<P: Plant>(&mut self, plant: &mut P) {
        self.track_preheat();

        match self.work.main {
            MainStatus::Undefined => {
                for led in Led::ALL {
                    plant.set_led(led, LedCommand::off());
                }
                plant.close_all();
                self.work.set_main(MainStatus::Standby);
            }
            MainStatus::Standby => self.run_standby(plant),
            MainStatus::Idle => self.run_idle(plant),
            MainStatus::Prepare => self.run_prepare(plant),
            MainStatus::HardwareIncompatible => {}
        }
    }

    /// Start, stop and time out the pre-heat pseudo-recipe
    fn track_preheat(&mut self) {
        let now = self.scheduler.now_ms();
        self.work.preheat_ticks = self.work.preheat_ticks.saturating_add(1);

        if matches!(self.work.main, MainStatus::Undefined | MainStatus::Standby) {
            self.work.preheat_ticks = 0;
            self.recipes.set_active(RecipeSlot::Three, false);
            return;
        }

        if self.action.take(Action::StartRecipe(RecipeSlot::Three), now) {
            self.recipes.set_active(RecipeSlot::Three, true);
            self.work.preheat_ticks = 0;
        } else if self.action.take(Action::StopRecipe(RecipeSlot::Three), now) {
            self.recipes.set_active(RecipeSlot::Three, false);
        }

        let limit = self.recipes.preheat_time();
        if limit > 0 && self.work.preheat_ticks >= limit {
            self.work.preheat_ticks = 0;
            self.recipes.set_active(RecipeSlot::Three, false);
        }
    }

    fn run_standby<P: Plant>(&mut self, plant: &mut P) {
        let now = self.scheduler.now_ms();
        let breathe_red = LedCommand::stepped(Effect::Breathe, RED, LED_INTENSITY, LED_STEP_MS);

        match self.work.sub {
            SubStatus::Undefined => {
                match plant.led_effect(Led::WaterTank) {
                    Effect::On => {
                        let intensity = plant.led_intensity(Led::WaterTank);
                        plant.set_led(
                            Led::WaterTank,
                            LedCommand::stepped(Effect::FadeOut, [0; 3], intensity, LED_STEP_MS),
                        );
                    }
                    Effect::FadeOut => {}
                    _ => plant.set_led(Led::WaterTank, LedCommand::off()),
                }
                match plant.led_effect(Led::Standby) {
                    Effect::On => {
                        let intensity = plant.led_intensity(Led::Standby);
                        plant.set_led(
                            Led::Standby,
                            LedCommand::stepped(Effect::FadeOut, WHITE, intensity, LED_STEP_MS),
                        );
                    }
                    Effect::FadeOut => {}
                    _ => plant.set_led(Led::Standby, breathe_red),
                }

                plant.close_all();
                plant.set_heater_active(HeaterId::H3, false);
                plant.enable_mains(false);
                self.work.sub = SubStatus::Wait;
            }
            _ => {
                // A fade-out ends in Off; pick up breathing from there
                if plant.led_effect(Led::Standby) == Effect::Off {
                    plant.set_led(Led::Standby, breathe_red);
                }

                if self.action.take(Action::SwitchOn, now) {
                    plant.enable_mains(true);
                    self.work.set_main(MainStatus::Idle);
                } else {
                    self.action.take(Action::Standby, now);
                }
            }
        }
    }

    fn run_idle<P: Plant>(&mut self, plant: &mut P) {
        let now = self.scheduler.now_ms();

        match self.work.sub {
            SubStatus::Undefined => {
                plant.set_led(
                    Led::Standby,
                    LedCommand::stepped(Effect::FadeIn, WHITE, LED_INTENSITY, LED_STEP_MS),
                );
                plant.set_led(
                    Led::WaterTank,
                    LedCommand::stepped(Effect::FadeIn, BLUE, LED_INTENSITY, LED_STEP_MS),
                );

                let preheat = self.recipes.preheat_temperature();
                plant.set_heater_target(HeaterId::H3, i16::from(preheat) * 10, false);
                plant.set_heater_active(HeaterId::H3, preheat > 0);
                self.work.sub = SubStatus::Wait;
            }
            _ => {
                if self.action.take(Action::Standby, now) {
                    self.work.set_main(MainStatus::Standby);
                } else if self.action.take(Action::SwitchOn, now) {
                    // Already on
                } else if let Some(slot) = RecipeSlot::BREWING
                    .into_iter()
                    .find(|&slot| self.action.take(Action::StartRecipe(slot), now))
                {
                    self.recipes.set_active(slot, true);
                    self.recipes.set_active(RecipeSlot::Three, false);
                    self.work.set_main(MainStatus::Prepare);
                }

                plant.rebaseline_efast(HeaterId::H1);
                plant.rebaseline_efast(HeaterId::H2);
            }
        }
    }

    fn run_prepare<P: Plant>(&mut self, plant: &mut P) {
        let now = self.scheduler.now_ms();
        let brewing = |ctx: &Self| {
            RecipeSlot::BREWING
                .into_iter()
                .any(|slot| ctx.recipes.is_active(slot))
        };

        match self.work.sub {
            SubStatus::Undefined => {
                if brewing(self) {
                    self.work.sub = SubStatus::Active;
                } else {
                    for slot in RecipeSlot::BREWING {
                        self.reset_modules(slot, plant);
                    }
                    self.work.set_main(MainStatus::Idle);
                }
            }
            _ => {
                for slot in RecipeSlot::BREWING {
                    if self.recipes.is_active(slot) {
                        self.run_recipe(slot, plant);
                    }
                }

                if !brewing(self) {
                    for slot in RecipeSlot::BREWING {
                        self.reset_modules(slot, plant);
                    }
                    if let Some(scope) = self.settings.simulation() {
                        plant.clear_simulation(scope);
                    }
                    self.work.set_main(MainStatus::Idle);
                    return;
                }

                // A second recipe may join while the first one runs
                if let Some(slot) = RecipeSlot::BREWING
                    .into_iter()
                    .find(|&slot| self.action.take(Action::StartRecipe(slot), now))
                {
                    self.recipes.set_active(slot, true);
                }
            }
        }
    }

    /// One tick of a recipe's prepare machine
    fn run_recipe<P: Plant>(&mut self, slot: RecipeSlot, plant: &mut P) {
        let now = self.scheduler.now_ms();
        let ticks = &mut self.work.block_ticks[slot.index()];
        *ticks = ticks.saturating_add(1);

        if self.action.take(Action::StopRecipe(slot), now) {
            self.reset_modules(slot, plant);
            self.work.set_prepare(slot, PrepareStatus::Inactive);
            return;
        }

        match self.work.prepare(slot) {
            PrepareStatus::Inactive => self.work.set_prepare(slot, PrepareStatus::Initialize),
            PrepareStatus::Initialize | PrepareStatus::WaitForOther => {
                self.start_block(slot, plant)
            }
            PrepareStatus::WaitForConditions => self.poll_block(slot, plant),
            PrepareStatus::Error => {
                self.reset_modules(slot, plant);
                self.work.set_prepare(slot, PrepareStatus::Inactive);
            }
        }
    }

    /// Claim what the current block needs and program the controllers
    fn start_block<P: Plant>(&mut self, slot: RecipeSlot, plant: &mut P) {
        let Some(block) = self.recipes.get(slot).active_block().cloned() else {
            self.reset_modules(slot, plant);
            self.work.set_prepare(slot, PrepareStatus::Inactive);
            return;
        };

        let wanted = wanted_resources(&block);
        if let Err(ClaimError::WouldBlock { resource, owner }) =
            self.work.claims.try_claim_all(&wanted, slot)
        {
            if self.work.prepare(slot) != PrepareStatus::WaitForOther {
                #[cfg(feature = "defmt")]
                defmt::debug!("recipe {} waits for {} held by {}", slot, resource, owner);
                #[cfg(not(feature = "defmt"))]
                let _ = (resource, owner);
            }
            self.work.set_prepare(slot, PrepareStatus::WaitForOther);
            return;
        }

        // Hand back whatever the previous block held and this one does not
        for resource in Resource::ALL {
            if !wanted.contains(&resource) {
                self.release(slot, resource, plant);
            }
        }

        let selector = ValveSelector::decode(block.valves);
        let outlet = selector.map_or(Outlet::Off, |s| s.outlet);
        let steam = outlet == Outlet::Milk;
        let usage = &mut self.work.usage[slot.index()];

        if let Some(selector) = selector {
            for circuit in selector.circuits() {
                plant.set_outlet(circuit, outlet);
            }
        }
        if wanted.contains(&Resource::S3) {
            plant.set_shared(true);
        }
        if wanted.contains(&Resource::AirPump) {
            plant.set_air_percentage(block.air_pump);
        }
        if steam {
            plant.set_milk_target(i16::from(block.milk) * 10);
        }
        if block.preheat > 0 {
            plant.set_heater_target(HeaterId::H3, i16::from(block.preheat) * 10, false);
            plant.set_heater_active(HeaterId::H3, true);
            usage.heaters[HeaterId::H3.index()] = true;
        }

        for circuit in selector.into_iter().flat_map(|s| s.circuits()) {
            let targets = block.circuits[circuit.index()];

            let heater = HeaterId::for_circuit(circuit);
            let heat = targets.temperature > 0;
            plant.set_heater_target(heater, i16::from(targets.temperature) * 10, steam);
            plant.set_heater_active(heater, heat);
            usage.heaters[heater.index()] = heat;

            let pump = PumpId::for_circuit(circuit);
            let run = targets.needs_pump();
            plant.configure_pump(
                pump,
                PumpSetpoint {
                    flow: u32::from(targets.flow) * 100,
                    pressure: u32::from(targets.pressure) * 100,
                    volume: u32::from(targets.volume) * 1000,
                    control: targets.control,
                    steam,
                },
            );
            plant.set_pump_active(pump, run);
            usage.pumps[pump.index()] = run;
        }

        self.work.block_ticks[slot.index()] = 0;
        self.work.set_prepare(slot, PrepareStatus::WaitForConditions);
    }

    /// Check the end conditions of the running block
    fn poll_block<P: Plant>(&mut self, slot: RecipeSlot, plant: &mut P) {
        let simulation = self.settings.simulation();
        if let Some(scope) = simulation {
            plant.simulate(scope);
        }

        let recipe = self.recipes.get(slot);
        let Some(block) = recipe.active_block() else {
            self.reset_modules(slot, plant);
            self.work.set_prepare(slot, PrepareStatus::Inactive);
            return;
        };

        let pump_fault = self
            .work
            .claims
            .held_by(slot)
            .filter_map(Resource::as_circuit)
            .any(|c| plant.pump_status(PumpId::for_circuit(c)) == PumpStatus::Fault);
        if pump_fault {
            #[cfg(feature = "defmt")]
            defmt::warn!("recipe {} stopped by pump fault", slot);
            self.work.set_prepare(slot, PrepareStatus::Error);
            return;
        }

        let measurements = Measurements::sample(
            plant,
            (self.work.block_ticks[slot.index()], block.time),
            (recipe.total_volume(), recipe.target_total_volume()),
        );
        if !block.end_conditions.is_met(&measurements) {
            return;
        }

        if let Some(scope) = simulation {
            plant.settle(scope);
        }
        if self.recipes.get_mut(slot).advance() {
            self.work.set_prepare(slot, PrepareStatus::Initialize);
        } else {
            self.reset_modules(slot, plant);
            self.work.set_prepare(slot, PrepareStatus::Inactive);
        }
    }

    /// Release one resource held by `slot` and switch off what sits behind it
    fn release<P: Plant>(&mut self, slot: RecipeSlot, resource: Resource, plant: &mut P) {
        if !self.work.claims.release(resource, slot) {
            return;
        }
        let usage = &mut self.work.usage[slot.index()];

        if let Some(circuit) = resource.as_circuit() {
            let heater = HeaterId::for_circuit(circuit);
            if core::mem::take(&mut usage.heaters[heater.index()]) {
                plant.set_heater_active(heater, false);
            }
            let pump = PumpId::for_circuit(circuit);
            if core::mem::take(&mut usage.pumps[pump.index()]) {
                plant.set_pump_active(pump, false);
            }
            plant.set_outlet(circuit, Outlet::Off);
        } else if resource == Resource::S3 {
            plant.set_shared(false);
        } else {
            plant.set_air_percentage(0);
        }
    }

    /// Stop a recipe: release every claim, switch off what it switched on
    pub(crate) fn reset_modules<P: Plant>(&mut self, slot: RecipeSlot, plant: &mut P) {
        for resource in Resource::ALL {
            self.release(slot, resource, plant);
        }

        let mut usage = core::mem::take(&mut self.work.usage[slot.index()]);
        // H3 is not claimed; leave it on while the other recipe uses it
        let h3 = HeaterId::H3.index();
        if slot.other().is_some_and(|other| self.work.usage[other.index()].heaters[h3]) {
            usage.heaters[h3] = false;
        }
        for heater in HeaterId::ALL {
            if usage.heaters[heater.index()] {
                plant.set_heater_active(heater, false);
            }
        }
        for pump in PumpId::ALL {
            if usage.pumps[pump.index()] {
                plant.set_pump_active(pump, false);
            }
        }

        self.recipes.set_active(slot, false);
    }
}
