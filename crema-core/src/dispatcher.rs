//! Frame dispatcher
//!
//! Validates a complete frame, routes it by message type and builds the
//! reply. Recipe and machine actions are not answered here: they are parked
//! in the pending-action slot and answered by the control loop once the
//! sequencer took them or the timeout ran out.
//!
//! Side effects that need the firmware (writing settings back to storage,
//! resetting the chip) are returned in a [`DispatchOutcome`] instead of
//! being performed.

use crema_hal::{ImageFlash, StorageKey};
use crema_protocol::{Frame, FrameError, MessageType, Response, Status, PROTOCOL_VERSION};

use crate::action::{admit, Action, ActionOutcome};
use crate::context::MachineContext;
use crate::partition::{ImageBlock, PartitionStatus};
use crate::recipe::{BlockUpload, RecipeSlot};
use crate::traits::{Effect, HeaterId, Led, LedCommand, Plant, PumpId};

/// A reply waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    response: Response,
    status: Status,
}

impl Reply {
    pub fn new(response: Response, status: Status) -> Self {
        Self { response, status }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn msg_type(&self) -> u8 {
        self.response.msg_type()
    }

    /// Finish the frame and return the wire bytes
    pub fn encode(&mut self) -> &[u8] {
        self.response.finish(self.status)
    }
}

impl From<ActionOutcome> for Reply {
    fn from(outcome: ActionOutcome) -> Self {
        Self::new(Response::new(outcome.action.message().to_u8()), outcome.status)
    }
}

/// What the firmware has to do after a frame was handled
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Reply to send now; `None` when the reply comes later from the
    /// pending-action slot
    pub reply: Option<Reply>,
    /// Record to write back to storage
    pub persist: Option<StorageKey>,
    /// Reset the controller once the reply is out
    pub reboot: bool,
}

impl DispatchOutcome {
    fn reply(response: Response, status: Status) -> Self {
        Self {
            reply: Some(Reply::new(response, status)),
            ..Default::default()
        }
    }

    /// Reply owed by the sequencer
    pub fn deferred() -> Self {
        Self::default()
    }

    fn persist(mut self, key: StorageKey) -> Self {
        self.persist = Some(key);
        self
    }

    fn then_reboot(mut self) -> Self {
        self.reboot = true;
        self
    }
}

/// A reply never outgrows the frame, but a full buffer must not go unnoticed
fn overflow(_: FrameError) -> Status {
    Status::UnknownType
}

/// Telemetry value of a reading that may not fit a 16-bit field
fn clamp16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

impl MachineContext {
    /// Handle one complete frame
    ///
    /// Any frame cancels an action that is still pending, before anything
    /// else is checked.
    pub fn dispatch<P: Plant, F: ImageFlash>(
        &mut self,
        frame: &Frame,
        plant: &mut P,
        flash: &mut F,
    ) -> DispatchOutcome {
        self.action.cancel();
        let mut response = Response::to(frame);

        if !frame.crc_ok() {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "crc mismatch on type {=u8:#x}: got {=u8:#x}, expected {=u8:#x}",
                frame.msg_type(),
                frame.received_crc(),
                frame.computed_crc()
            );
            return DispatchOutcome::reply(response, Status::CrcError);
        }
        if frame.version() != PROTOCOL_VERSION {
            return DispatchOutcome::reply(response, Status::VersionMismatch);
        }
        let Some(message) = MessageType::from_u8(frame.msg_type()) else {
            return DispatchOutcome::reply(response, Status::UnknownType);
        };

        if let Some(action) = Action::from_message(message) {
            return self.request_action(action, response, plant);
        }

        match self.handle(message, frame, &mut response, plant, flash) {
            Ok(outcome) => DispatchOutcome {
                reply: Some(Reply::new(response, Status::Success)),
                ..outcome
            },
            Err(status) => DispatchOutcome::reply(response, status),
        }
    }

    fn request_action<P: Plant>(
        &mut self,
        action: Action,
        response: Response,
        plant: &P,
    ) -> DispatchOutcome {
        let simulated = self.settings.is_simulated();
        match admit(action, &self.recipes, plant.mains_status(), simulated) {
            Ok(()) => {
                self.action.set(action, self.scheduler.now_ms());
                DispatchOutcome::deferred()
            }
            Err(rejected) => {
                #[cfg(feature = "defmt")]
                defmt::info!("{} rejected: {}", action, rejected);
                DispatchOutcome::reply(response, Status::from(rejected))
            }
        }
    }

    /// Handle everything that is not an action
    ///
    /// On success the reply carries whatever fields were pushed onto
    /// `response`; the returned outcome only adds persist and reboot.
    fn handle<P: Plant, F: ImageFlash>(
        &mut self,
        message: MessageType,
        frame: &Frame,
        response: &mut Response,
        plant: &mut P,
        flash: &mut F,
    ) -> Result<DispatchOutcome, Status> {
        let done = DispatchOutcome::default();

        match message {
            MessageType::RecipeBlock(index) => {
                let slot = RecipeSlot::from_index(index).ok_or(Status::UnknownType)?;
                let upload = BlockUpload::from_frame(frame)?;
                self.recipes.get_mut(slot).store(upload)?;
                if slot == RecipeSlot::Three && plant.heater_active(HeaterId::H3) {
                    let preheat = self.recipes.preheat_temperature();
                    plant.set_heater_target(HeaterId::H3, i16::from(preheat) * 10, false);
                }
            }

            MessageType::SendPartitionBlock => {
                let block = ImageBlock::from_frame(frame)?;
                self.partitions.write_block(&block, flash)?;
                response
                    .extend_u16(&self.partitions.update_fields())
                    .map_err(overflow)?;
                return Ok(done.persist(StorageKey::PartitionTable));
            }
            MessageType::UpgradeApplication | MessageType::RestorePartition => {
                if message == MessageType::UpgradeApplication {
                    self.partitions.request_upgrade()?;
                } else {
                    self.partitions.request_restore()?;
                }
                response
                    .extend_u16(&self.partitions.info_fields())
                    .map_err(overflow)?;
                return Ok(done.persist(StorageKey::PartitionTable).then_reboot());
            }
            MessageType::GetPartitionInfo => {
                response
                    .extend_u16(&self.partitions.info_fields())
                    .map_err(overflow)?;
            }
            MessageType::SetPartitionStatus => {
                let raw = frame.field(10, 2)? as u8;
                self.partitions.update.status =
                    PartitionStatus::from_u8(raw).ok_or(Status::UnknownType)?;
                response
                    .extend_u16(&self.partitions.info_fields())
                    .map_err(overflow)?;
                return Ok(done.persist(StorageKey::PartitionTable));
            }

            MessageType::GetAllData => {
                self.push_process_data(response, plant).map_err(overflow)?;
                self.push_physical_data(response, plant).map_err(overflow)?;
                self.push_device_data(response).map_err(overflow)?;
            }
            MessageType::GetProcessData => {
                self.push_process_data(response, plant).map_err(overflow)?;
            }
            MessageType::GetPhysicalData => {
                self.push_physical_data(response, plant).map_err(overflow)?;
            }
            MessageType::GetDeviceData => {
                self.push_device_data(response).map_err(overflow)?;
            }
            MessageType::GetDummyMode => {
                let dummy = self.settings.dummy;
                response
                    .extend_u16(&[
                        u16::from(dummy.machine),
                        u16::from(dummy.filter),
                        u16::from(dummy.heater3),
                    ])
                    .map_err(overflow)?;
            }
            MessageType::GetMachineParameters => {
                response
                    .extend_u16(&self.settings.ul_per_pulse)
                    .map_err(overflow)?;
            }
            MessageType::SetMachineParameters => {
                self.settings.ul_per_pulse = [frame.field(12, 4)?, frame.field(16, 4)?];
                self.settings.sanitize();
                for pump in PumpId::ALL {
                    plant.set_calibration(pump, self.settings.ul_per_pulse(pump));
                }
                return Ok(done.persist(StorageKey::MachineSettings));
            }

            MessageType::SetLed => {
                let led = Led::from_position(frame.field(12, 1)? as u8).ok_or(Status::UnknownType)?;
                let effect = Effect::from_u8(frame.field(13, 1)? as u8).ok_or(Status::UnknownType)?;
                let byte = |offset| frame.field(offset, 2).map(|v| v as u8);
                let command = LedCommand {
                    effect,
                    rgb: [byte(14)?, byte(16)?, byte(18)?],
                    intensity: byte(20)?,
                    on_ms: frame.field(22, 4)?,
                    off_ms: frame.field(26, 4)?,
                    step_ms: byte(30)?,
                    cycles: frame.field(32, 4)?,
                    restore: byte(36)? != 0,
                };
                plant.set_led(led, command);
            }
            MessageType::SetDummyMode => {
                self.settings.dummy.machine = frame.field(12, 2)? != 0;
                self.settings.dummy.filter = frame.field(14, 2)? != 0;
                self.settings.dummy.heater3 = frame.field(16, 2)? != 0;
                return Ok(done.persist(StorageKey::MachineSettings).then_reboot());
            }

            MessageType::Reboot => {
                return Ok(done.then_reboot());
            }

            // Bootloader progress, grinder settings and consumables belong to
            // other builds
            MessageType::GetUpdateProgress
            | MessageType::GetBootloaderStatus
            | MessageType::GetBackupProgress
            | MessageType::GetRestoreProgress
            | MessageType::GetDosingData
            | MessageType::GetSettings
            | MessageType::SetDosingData
            | MessageType::GetConsumableData
            | MessageType::SetConsumableData => return Err(Status::UnknownType),

            MessageType::StartRecipe(_)
            | MessageType::StopRecipe(_)
            | MessageType::SwitchOn
            | MessageType::Standby
            | MessageType::StartEmbedded => return Err(Status::UnknownType),
        }
        Ok(done)
    }

    fn push_process_data<P: Plant>(
        &self,
        response: &mut Response,
        plant: &P,
    ) -> Result<(), FrameError> {
        let aux = plant.auxiliary();
        response.extend_u16(&[
            u16::from(self.recipes.get(RecipeSlot::One).block_count()),
            u16::from(self.recipes.get(RecipeSlot::Two).block_count()),
            0,
            aux.water_tank_volume,
            aux.filter,
            plant.wand_status(),
            aux.drip_tray,
            u16::from(self.work.main().wire_code()),
            u16::from(self.work.sub().wire_code()),
            aux.humidity,
            aux.ambient,
        ])
    }

    fn push_physical_data<P: Plant>(
        &self,
        response: &mut Response,
        plant: &P,
    ) -> Result<(), FrameError> {
        let aux = plant.auxiliary();
        let p1 = plant.pump_reading(PumpId::P1);
        let p2 = plant.pump_reading(PumpId::P2);
        let temperature = |heater| plant.heater_temperature(heater) as u16;

        response.extend_u16(&[
            u16::from(self.reported_block(RecipeSlot::One)),
            u16::from(self.reported_block(RecipeSlot::Two)),
            u16::from(self.reported_block(RecipeSlot::Three)),
            temperature(HeaterId::H1),
            temperature(HeaterId::H2),
            temperature(HeaterId::H3),
            plant.milk_temperature() as u16,
            clamp16(p1.flow_timed / 100),
            clamp16(p2.flow_timed / 100),
            u16::from(plant.air_percentage()),
            clamp16(p1.pressure / 100),
            clamp16(p2.pressure / 100),
            clamp16(p1.volume / 1000),
            clamp16(p2.volume / 1000),
            plant.valve_bits(),
            aux.coffee_button,
            aux.coffee_button_direction,
            aux.milk_button,
        ])
    }

    fn push_device_data(&self, response: &mut Response) -> Result<(), FrameError> {
        let device = &self.device;
        response.extend_u16(&[
            (device.serial_number >> 16) as u16,
            device.serial_number as u16,
            u16::from(device.hardware_version),
            device.software_version,
            device.bootloader_version,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MachineSettings, DEFAULT_UL_PER_PULSE};
    use crate::conditions::ConditionFlag;
    use crate::context::DeviceInfo;
    use crate::partition::tests::MockImageFlash;
    use crate::partition::{PartitionTable, VECTOR_SIGNATURE};
    use crate::sequencer::MainStatus;
    use crate::testing::*;
    use crema_protocol::hex::write_field;
    use crema_protocol::{frame_crc, MAX_FRAME_LEN};
    use heapless::Vec;

    fn machine() -> (MachineContext, MockPlant, MockImageFlash) {
        let mut ctx = MachineContext::new(
            DeviceInfo::new(2),
            MachineSettings::default(),
            PartitionTable::default(),
        );
        let mut plant = MockPlant::default();
        ctx.boot(&mut plant);
        (ctx, plant, MockImageFlash::new())
    }

    /// Standby, waiting for switch-on
    fn standby() -> (MachineContext, MockPlant, MockImageFlash) {
        let (mut ctx, mut plant, flash) = machine();
        step(&mut ctx, &mut plant);
        step(&mut ctx, &mut plant);
        assert_eq!(ctx.work().main(), MainStatus::Standby);
        (ctx, plant, flash)
    }

    fn edited(frame: &Frame, edit: impl FnOnce(&mut [u8])) -> Frame {
        let mut buf: Vec<u8, MAX_FRAME_LEN> = Vec::from_slice(frame.as_bytes()).unwrap();
        edit(&mut buf);
        Frame::from_bytes(&buf).unwrap()
    }

    fn status_of(outcome: &DispatchOutcome) -> Status {
        outcome.reply.as_ref().unwrap().status()
    }

    fn block_upload(msg_type: u8, count: u32, index: u32, valves: u32, preheat: u32) -> Frame {
        let time_passed = u32::from(ConditionFlag::TimePassed.bit());
        request(
            msg_type,
            &body(&[
                (count, 1),
                (index, 1),
                (92, 1),
                (0, 1),
                (preheat, 1),
                (0, 1),
                (20, 1),
                (0, 1),
                (0, 1),
                (90, 1),
                (0, 1),
                (40, 2),
                (0, 2),
                (valves, 1),
                (0, 1),
                (50, 2),
                (1, 1),
                (0, 1),
                (time_passed, 2),
                (0, 2),
                (0, 2),
                (0, 2),
            ]),
        )
    }

    #[test]
    fn test_crc_error_replied_and_cancels_pending() {
        let (mut ctx, mut plant, mut flash) = standby();
        request_action(&mut ctx, Action::SwitchOn);

        let good = request(0x34, b"");
        let bad = edited(&good, |buf| {
            let crc = good.received_crc() ^ 0x5A;
            write_field(buf, 6, 1, u32::from(crc)).unwrap();
        });
        let outcome = ctx.dispatch(&bad, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::CrcError);
        assert_eq!(ctx.pending_action().peek(), None);
    }

    #[test]
    fn test_version_mismatch() {
        let (mut ctx, mut plant, mut flash) = machine();
        let frame = edited(&request(0x34, b""), |buf| {
            buf[1] = b'2';
            let crc = frame_crc(buf);
            write_field(buf, 6, 1, u32::from(crc)).unwrap();
        });
        assert!(frame.crc_ok());
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::VersionMismatch);
    }

    #[test]
    fn test_types_of_other_builds_are_unknown() {
        let (mut ctx, mut plant, mut flash) = machine();
        for msg_type in [0x24, 0x25, 0x27, 0x28, 0x36, 0x37, 0x43, 0x61, 0x62, 0x7F] {
            let outcome = ctx.dispatch(&request(msg_type, b""), &mut plant, &mut flash);
            assert_eq!(status_of(&outcome), Status::UnknownType, "type {:#x}", msg_type);
        }
    }

    #[test]
    fn test_start_without_valid_recipe_is_refused_immediately() {
        let (mut ctx, mut plant, mut flash) = standby();
        let outcome = ctx.dispatch(&request(0x11, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome).code(), 0x16);
        assert_eq!(ctx.pending_action().peek(), None);

        // The next action is not affected by the refused one
        let outcome = ctx.dispatch(&request(0x52, b""), &mut plant, &mut flash);
        assert_eq!(outcome, DispatchOutcome::deferred());
        let replies = run(&mut ctx, &mut plant, 200);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].msg_type(), 0x52);
        assert_eq!(replies[0].status(), Status::Success);
        assert_eq!(ctx.work().main(), MainStatus::Idle);
    }

    #[test]
    fn test_start_needs_zero_cross() {
        let (mut ctx, mut plant, mut flash) = standby();
        load_recipe(&mut ctx, RecipeSlot::One, &[timed_block(0x01, 5)]);
        let outcome = ctx.dispatch(&request(0x11, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::NoZeroCross);

        ctx.settings.dummy.machine = true;
        let outcome = ctx.dispatch(&request(0x11, b""), &mut plant, &mut flash);
        assert!(outcome.reply.is_none());
    }

    #[test]
    fn test_stop_of_idle_recipe_refused() {
        let (mut ctx, mut plant, mut flash) = standby();
        let outcome = ctx.dispatch(&request(0x15, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::RecipeNotActive);
    }

    #[test]
    fn test_untaken_action_times_out() {
        let (mut ctx, mut plant, mut flash) = standby();
        let outcome = ctx.dispatch(&request(0x54, b""), &mut plant, &mut flash);
        assert!(outcome.reply.is_none());

        let replies = run(&mut ctx, &mut plant, 700);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].msg_type(), 0x54);
        assert_eq!(replies[0].status().code(), 0x13);
    }

    #[test]
    fn test_new_frame_cancels_pending_action() {
        let (mut ctx, mut plant, mut flash) = standby();
        ctx.dispatch(&request(0x52, b""), &mut plant, &mut flash);
        let outcome = ctx.dispatch(&request(0x34, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);

        assert!(run(&mut ctx, &mut plant, 700).is_empty());
        assert_eq!(ctx.work().main(), MainStatus::Standby);
    }

    #[test]
    fn test_recipe_upload_frame() {
        let (mut ctx, mut plant, mut flash) = machine();
        let outcome = ctx.dispatch(&block_upload(0x01, 1, 0, 0x01, 0), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);

        let recipe = ctx.recipes().get(RecipeSlot::One);
        assert!(recipe.is_valid());
        let block = recipe.block(0).unwrap();
        assert_eq!(block.circuits[0].temperature, 92);
        assert_eq!(block.circuits[0].pressure, 90);
        assert_eq!(block.time, 50);
        assert_eq!(recipe.target_total_volume(), 40_000);

        let outcome = ctx.dispatch(&block_upload(0x01, 2, 1, 0x01, 0), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::BlockNrError);
    }

    #[test]
    fn test_preheat_upload_applies_to_running_heater() {
        let (mut ctx, mut plant) = idle_machine(MachineSettings::default());
        let mut flash = MockImageFlash::new();
        assert_eq!(plant.heater(HeaterId::H3).target, 600);

        let outcome = ctx.dispatch(&block_upload(0x03, 1, 0, 0xFF, 75), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert_eq!(plant.heater(HeaterId::H3).target, 750);
    }

    #[test]
    fn test_machine_parameters() {
        let (mut ctx, mut plant, mut flash) = machine();
        let mut outcome = ctx.dispatch(&request(0x38, b""), &mut plant, &mut flash);
        let bytes = outcome.reply.as_mut().unwrap().encode();
        assert_eq!(bytes.len(), 18);
        assert_eq!(&bytes[10..18], b"01940194");

        let frame = request(0x39, &body(&[(0, 2), (410, 2), (0, 2)]));
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert_eq!(outcome.persist, Some(StorageKey::MachineSettings));
        assert!(!outcome.reboot);
        assert_eq!(ctx.settings().ul_per_pulse, [410, DEFAULT_UL_PER_PULSE]);
        assert_eq!(plant.pump(PumpId::P1).ul_per_pulse, 410);
    }

    #[test]
    fn test_dummy_mode_persists_and_reboots() {
        let (mut ctx, mut plant, mut flash) = machine();
        let frame = request(0x42, &body(&[(0, 2), (1, 1), (0, 1), (1, 1)]));
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert_eq!(outcome.persist, Some(StorageKey::MachineSettings));
        assert!(outcome.reboot);
        assert!(ctx.settings().dummy.machine);
        assert!(ctx.settings().dummy.heater3);

        let mut outcome = ctx.dispatch(&request(0x35, b""), &mut plant, &mut flash);
        let bytes = outcome.reply.as_mut().unwrap().encode();
        assert_eq!(&bytes[10..], b"000100000001");
    }

    #[test]
    fn test_reboot() {
        let (mut ctx, mut plant, mut flash) = machine();
        let outcome = ctx.dispatch(&request(0x51, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert!(outcome.reboot);
        assert_eq!(outcome.persist, None);
    }

    #[test]
    fn test_data_replies() {
        let (mut ctx, mut plant, mut flash) = machine();

        let mut outcome = ctx.dispatch(&request(0x31, b""), &mut plant, &mut flash);
        assert_eq!(outcome.reply.as_mut().unwrap().encode().len(), 10 + 4 * 34);

        let mut outcome = ctx.dispatch(&request(0x32, b""), &mut plant, &mut flash);
        assert_eq!(outcome.reply.as_mut().unwrap().encode().len(), 10 + 4 * 11);

        plant.heaters[0].temperature = 925;
        plant.pumps[1].reading.pressure = 9_000;
        let mut outcome = ctx.dispatch(&request(0x33, b""), &mut plant, &mut flash);
        let bytes = outcome.reply.as_mut().unwrap().encode();
        assert_eq!(bytes.len(), 10 + 4 * 18);
        assert_eq!(&bytes[10..14], b"00FF");
        assert_eq!(&bytes[22..26], b"039D");
        assert_eq!(&bytes[54..58], b"005A");

        let mut outcome = ctx.dispatch(&request(0x34, b""), &mut plant, &mut flash);
        let bytes = outcome.reply.as_mut().unwrap().encode();
        assert_eq!(&bytes[10..], b"F1456F120002220F0000");
    }

    #[test]
    fn test_set_led() {
        let (mut ctx, mut plant, mut flash) = machine();
        let frame = request(
            0x41,
            &body(&[
                (0, 2),
                (0x32, 1),
                (255, 1),
                (0, 1),
                (0, 1),
                (100, 1),
                (200, 2),
                (300, 2),
                (5, 1),
                (3, 2),
                (1, 1),
            ]),
        );
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);

        let led = plant.led(Led::Standby);
        assert_eq!(led.effect, Effect::Blink);
        assert_eq!(led.rgb, [255, 0, 0]);
        assert_eq!(led.intensity, 100);
        assert_eq!((led.on_ms, led.off_ms), (200, 300));
        assert_eq!(led.cycles, 3);
        assert!(led.restore);
    }

    #[test]
    fn test_firmware_upload_and_upgrade() {
        let (mut ctx, mut plant, mut flash) = machine();

        let outcome = ctx.dispatch(&request(0x22, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::ImageNotValid);
        assert!(!outcome.reboot);

        let mut fields: Vec<(u32, usize), 70> = Vec::new();
        fields.extend_from_slice(&[(7, 2), (1, 2), (0, 2)]).unwrap();
        for i in 0..64 {
            let byte = VECTOR_SIGNATURE.get(i).copied().unwrap_or(0xA5);
            fields.push((u32::from(byte), 1)).unwrap();
        }
        let mut outcome = ctx.dispatch(&request(0x21, &body(&fields)), &mut plant, &mut flash);
        assert_eq!(outcome.persist, Some(StorageKey::PartitionTable));
        let bytes = outcome.reply.as_mut().unwrap().encode();
        assert_eq!(&bytes[8..10], b"01");
        assert_eq!(&bytes[10..], b"0007000000010001");
        assert_eq!(&flash.memory[..4], &VECTOR_SIGNATURE);

        let outcome = ctx.dispatch(&request(0x22, b""), &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert!(outcome.reboot);
        assert_eq!(ctx.partitions().application.status, PartitionStatus::Updating);
    }

    #[test]
    fn test_set_partition_status() {
        let (mut ctx, mut plant, mut flash) = machine();
        let frame = request(0x26, &body(&[(0, 1), (5, 1)]));
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::Success);
        assert_eq!(ctx.partitions().update.status, PartitionStatus::Corrupt);

        let frame = request(0x26, &body(&[(0, 1), (9, 1)]));
        let outcome = ctx.dispatch(&frame, &mut plant, &mut flash);
        assert_eq!(status_of(&outcome), Status::UnknownType);
    }
}
