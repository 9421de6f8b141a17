//! Test doubles shared by the unit tests

use crema_protocol::hex::write_field;
use crema_protocol::{frame_crc, Frame, MAX_FRAME_LEN};
use heapless::Vec;

use crate::action::Action;
use crate::conditions::{ConditionFlag, EndConditions};
use crate::config::MachineSettings;
use crate::context::{DeviceInfo, MachineContext};
use crate::dispatcher::Reply;
use crate::partition::PartitionTable;
use crate::recipe::{BlockUpload, Circuit, Outlet, RecipeBlock, RecipeSlot};
use crate::sequencer::{MainStatus, SubStatus};
use crate::traits::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct MockHeater {
    pub target: i16,
    pub temperature: i16,
    pub active: bool,
    pub steam: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockPump {
    pub setpoint: PumpSetpoint,
    pub reading: PumpReading,
    pub active: bool,
    pub fault: bool,
    pub ul_per_pulse: u16,
}

/// Plant that records what the sequencer asked for
#[derive(Debug, Clone, Default)]
pub struct MockPlant {
    pub heaters: [MockHeater; 3],
    pub pumps: [MockPump; 2],
    pub dispensed: [u32; 2],
    pub air: u8,
    pub milk_target: i16,
    pub milk_temperature: i16,
    pub outlets: [Outlet; 2],
    pub shared_open: bool,
    pub leds: [LedCommand; 3],
    pub mains_enabled: bool,
    pub simulation: Option<SimulationScope>,
    pub simulate_calls: u32,
    pub settle_calls: u32,
    pub cleared: bool,
    pub rebaselines: u32,
}

impl MockPlant {
    pub fn heater(&self, id: HeaterId) -> &MockHeater {
        &self.heaters[id.index()]
    }

    pub fn pump(&self, id: PumpId) -> &MockPump {
        &self.pumps[id.index()]
    }

    pub fn led(&self, led: Led) -> &LedCommand {
        &self.leds[led as usize]
    }
}

impl HeaterBank for MockPlant {
    fn set_heater_target(&mut self, heater: HeaterId, target_x10: i16, steam: bool) {
        let h = &mut self.heaters[heater.index()];
        h.target = target_x10;
        h.steam = steam;
    }

    fn heater_target(&self, heater: HeaterId) -> i16 {
        self.heaters[heater.index()].target
    }

    fn heater_temperature(&self, heater: HeaterId) -> i16 {
        self.heaters[heater.index()].temperature
    }

    fn set_heater_active(&mut self, heater: HeaterId, active: bool) {
        self.heaters[heater.index()].active = active;
    }

    fn heater_active(&self, heater: HeaterId) -> bool {
        self.heaters[heater.index()].active
    }

    fn heater_power(&self, _heater: HeaterId) -> u16 {
        0
    }

    fn rebaseline_efast(&mut self, _heater: HeaterId) {
        self.rebaselines += 1;
    }

    fn update_heaters(&mut self) {}
}

impl PumpBank for MockPlant {
    fn configure_pump(&mut self, pump: PumpId, setpoint: PumpSetpoint) {
        let p = &mut self.pumps[pump.index()];
        p.setpoint = setpoint;
        p.reading.volume = 0;
    }

    fn pump_setpoint(&self, pump: PumpId) -> PumpSetpoint {
        self.pumps[pump.index()].setpoint
    }

    fn set_calibration(&mut self, pump: PumpId, ul_per_pulse: u16) {
        self.pumps[pump.index()].ul_per_pulse = ul_per_pulse;
    }

    fn pump_reading(&self, pump: PumpId) -> PumpReading {
        self.pumps[pump.index()].reading
    }

    fn set_pump_active(&mut self, pump: PumpId, active: bool) {
        self.pumps[pump.index()].active = active;
    }

    fn pump_status(&self, pump: PumpId) -> PumpStatus {
        let p = &self.pumps[pump.index()];
        match (p.fault, p.active) {
            (true, _) => PumpStatus::Fault,
            (false, true) => PumpStatus::Active,
            (false, false) => PumpStatus::Inactive,
        }
    }

    fn pump_percentage(&self, _pump: PumpId) -> u8 {
        0
    }

    fn take_dispensed(&mut self, pump: PumpId) -> u32 {
        core::mem::take(&mut self.dispensed[pump.index()])
    }

    fn update_pumps(&mut self) {}

    fn sample_pressure(&mut self) {}
}

impl AirPump for MockPlant {
    fn set_air_percentage(&mut self, percentage: u8) {
        self.air = percentage.min(100);
    }

    fn air_percentage(&self) -> u8 {
        self.air
    }
}

impl MilkSensor for MockPlant {
    fn set_milk_target(&mut self, target_x10: i16) {
        self.milk_target = target_x10;
    }

    fn milk_target(&self) -> i16 {
        self.milk_target
    }

    fn milk_temperature(&self) -> i16 {
        self.milk_temperature
    }

    fn wand_status(&self) -> u16 {
        0
    }

    fn update_milk(&mut self) {}
}

impl Valves for MockPlant {
    fn set_outlet(&mut self, circuit: Circuit, outlet: Outlet) {
        self.outlets[circuit.index()] = outlet;
    }

    fn set_shared(&mut self, open: bool) {
        self.shared_open = open;
    }

    fn valve_bits(&self) -> u16 {
        let mut bits = 0;
        for (i, outlet) in self.outlets.iter().enumerate() {
            if *outlet != Outlet::Off {
                bits |= 1 << i;
            }
        }
        if self.shared_open {
            bits |= 1 << 2;
        }
        bits
    }
}

impl Indicator for MockPlant {
    fn set_led(&mut self, led: Led, command: LedCommand) {
        self.leds[led as usize] = command;
    }

    fn led_effect(&self, led: Led) -> Effect {
        self.leds[led as usize].effect
    }

    fn led_intensity(&self, led: Led) -> u8 {
        self.leds[led as usize].intensity
    }
}

impl MainsMonitor for MockPlant {
    fn enable_mains(&mut self, enabled: bool) {
        self.mains_enabled = enabled;
    }

    fn mains_status(&self) -> MainsStatus {
        if self.mains_enabled {
            MainsStatus::Active
        } else {
            MainsStatus::Inactive
        }
    }

    fn mains_frequency(&self) -> u16 {
        if self.mains_enabled {
            50
        } else {
            0
        }
    }

    fn update_mains(&mut self) {}
}

impl Simulation for MockPlant {
    fn set_simulation(&mut self, scope: Option<SimulationScope>) {
        self.simulation = scope;
    }

    fn simulate(&mut self, _scope: SimulationScope) {
        self.simulate_calls += 1;
    }

    fn settle(&mut self, _scope: SimulationScope) {
        self.settle_calls += 1;
    }

    fn clear_simulation(&mut self, _scope: SimulationScope) {
        self.cleared = true;
    }
}

impl Plant for MockPlant {}

/// Build a request frame with a correct CRC around `body` (from offset 8)
pub fn request(msg_type: u8, body: &[u8]) -> Frame {
    let len = 8 + body.len();
    let mut buf: Vec<u8, MAX_FRAME_LEN> = Vec::new();
    buf.resize(len, b'0').unwrap();
    buf[0] = b'/';
    buf[1] = b'1';
    write_field(&mut buf, 2, 1, len as u32).unwrap();
    write_field(&mut buf, 4, 1, u32::from(msg_type)).unwrap();
    buf[8..].copy_from_slice(body);
    let crc = frame_crc(&buf);
    write_field(&mut buf, 6, 1, u32::from(crc)).unwrap();
    Frame::from_bytes(&buf).unwrap()
}

/// Hex body from a list of (value, byte count) fields
pub fn body(fields: &[(u32, usize)]) -> Vec<u8, MAX_FRAME_LEN> {
    let mut buf = Vec::new();
    for &(value, bytes) in fields {
        let at = buf.len();
        buf.resize(at + bytes * 2, b'0').unwrap();
        write_field(&mut buf, at, bytes, value).unwrap();
    }
    buf
}

/// Single block that ends after `time` sequencer ticks
pub fn timed_block(valves: u8, time: u16) -> RecipeBlock {
    RecipeBlock {
        valves,
        time,
        end_conditions: EndConditions::new()
            .with_group([ConditionFlag::TimePassed].into_iter().collect()),
        ..Default::default()
    }
}

/// Store a recipe made of `blocks` in `slot`
pub fn load_recipe(ctx: &mut MachineContext, slot: RecipeSlot, blocks: &[RecipeBlock]) {
    let count = blocks.len() as u8;
    for (index, block) in blocks.iter().enumerate() {
        ctx.recipes
            .get_mut(slot)
            .store(BlockUpload {
                block_count: count,
                index: index as u8,
                block: block.clone(),
            })
            .unwrap();
    }
}

/// Run the control loop for `ms` ticks, keeping the replies it produced
pub fn run(ctx: &mut MachineContext, plant: &mut MockPlant, ms: u32) -> Vec<Reply, 8> {
    let mut replies = Vec::new();
    for _ in 0..ms {
        if let Some(reply) = ctx.tick_1ms(plant) {
            replies.push(reply).unwrap();
        }
    }
    replies
}

/// Run until just after the next sequencer tick
pub fn step(ctx: &mut MachineContext, plant: &mut MockPlant) -> Vec<Reply, 8> {
    let mut replies = Vec::new();
    loop {
        let sequenced = (ctx.now_ms() + 1) % 100 == 70;
        if let Some(reply) = ctx.tick_1ms(plant) {
            replies.push(reply).unwrap();
        }
        if sequenced {
            return replies;
        }
    }
}

/// Park an action as if the dispatcher had admitted it
pub fn request_action(ctx: &mut MachineContext, action: Action) {
    let now = ctx.now_ms();
    ctx.action.set(action, now);
}

/// Booted context waiting in Idle with mains on
pub fn idle_machine(settings: MachineSettings) -> (MachineContext, MockPlant) {
    let mut ctx = MachineContext::new(DeviceInfo::new(2), settings, PartitionTable::default());
    let mut plant = MockPlant::default();
    ctx.boot(&mut plant);

    // Undefined -> Standby, then the Standby entry step
    step(&mut ctx, &mut plant);
    step(&mut ctx, &mut plant);
    request_action(&mut ctx, Action::SwitchOn);
    step(&mut ctx, &mut plant);
    step(&mut ctx, &mut plant);
    assert_eq!(ctx.work().main(), MainStatus::Idle);
    assert_eq!(ctx.work().sub(), SubStatus::Wait);
    (ctx, plant)
}
