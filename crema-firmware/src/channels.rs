//! Shared state and inter-task signalling

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_sync::signal::Signal;
use heapless::Vec;

use crema_core::context::MachineContext;
use crema_core::dispatcher::Reply;
use crema_drivers::CremaPlant;
use crema_hal_stm32l1::BoardFlash;
use crema_protocol::MAX_FRAME_LEN;

use crate::board::BoardIo;

/// Sequencer and plant, locked together for every tick and every frame
pub struct Machine {
    pub ctx: MachineContext,
    pub plant: CremaPlant<BoardIo>,
}

/// Held only for short synchronous sections; interrupt-driven tasks
/// (zero-cross, flow meters) go through the same lock
pub type SharedMachine = Mutex<CriticalSectionRawMutex, RefCell<Machine>>;

/// Internal flash, shared by image uploads and record writes
pub type SharedFlash = AsyncMutex<CriticalSectionRawMutex, BoardFlash<'static>>;

/// Encoded frame on its way to the host
pub struct Outgoing {
    pub frame: Vec<u8, MAX_FRAME_LEN>,
    /// Reset the controller once this frame is on the wire
    pub reboot: bool,
}

impl Outgoing {
    pub fn reply(mut reply: Reply, reboot: bool) -> Self {
        let mut frame = Vec::new();
        // An encoded reply never exceeds MAX_FRAME_LEN
        let _ = frame.extend_from_slice(reply.encode());
        Self { frame, reboot }
    }
}

const TX_CHANNEL_SIZE: usize = 4;

/// Frames for the link TX task
pub static TX_CHANNEL: Channel<CriticalSectionRawMutex, Outgoing, TX_CHANNEL_SIZE> =
    Channel::new();

/// Machine settings changed and need writing to flash
pub static PERSIST_SETTINGS: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Partition table changed and needs writing to flash
pub static PERSIST_PARTITIONS: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Reply announcing a reset has been sent
pub static REBOOT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Triac firing delay in µs after the last zero-cross, per pump
pub static PUMP_COMPARE: [Signal<CriticalSectionRawMutex, u32>; 2] =
    [Signal::new(), Signal::new()];
