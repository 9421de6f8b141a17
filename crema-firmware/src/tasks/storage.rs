//! Flash writes and controller reset
//!
//! Record writes take tens of milliseconds, so they run here instead of
//! on the link task. A reset waits until every queued write has landed.

use defmt::*;
use embassy_futures::select::{select3, Either3};
use embassy_time::Timer;

use crate::channels::{SharedFlash, SharedMachine, PERSIST_PARTITIONS, PERSIST_SETTINGS, REBOOT};
use crate::config::{save_partitions, save_settings};

/// Grace period for the last bytes to leave the UART shift register
const RESET_DELAY_MS: u64 = 5;

#[embassy_executor::task]
pub async fn storage_task(machine: &'static SharedMachine, flash: &'static SharedFlash) {
    info!("Storage task started");

    loop {
        match select3(PERSIST_SETTINGS.wait(), PERSIST_PARTITIONS.wait(), REBOOT.wait()).await {
            Either3::First(()) => persist_settings(machine, flash).await,
            Either3::Second(()) => persist_partitions(machine, flash).await,
            Either3::Third(()) => {
                if PERSIST_SETTINGS.try_take().is_some() {
                    persist_settings(machine, flash).await;
                }
                if PERSIST_PARTITIONS.try_take().is_some() {
                    persist_partitions(machine, flash).await;
                }
                info!("Resetting controller");
                Timer::after_millis(RESET_DELAY_MS).await;
                cortex_m::peripheral::SCB::sys_reset();
            }
        }
    }
}

async fn persist_settings(machine: &'static SharedMachine, flash: &'static SharedFlash) {
    let settings = machine.lock(|cell| *cell.borrow().ctx.settings());
    let mut flash = flash.lock().await;
    match save_settings(&mut *flash, &settings).await {
        Ok(()) => info!("Machine settings saved"),
        Err(e) => error!("Failed to save machine settings: {:?}", e),
    }
}

async fn persist_partitions(machine: &'static SharedMachine, flash: &'static SharedFlash) {
    let table = machine.lock(|cell| *cell.borrow().ctx.partitions());
    let mut flash = flash.lock().await;
    match save_partitions(&mut *flash, &table).await {
        Ok(()) => info!("Partition table saved"),
        Err(e) => error!("Failed to save partition table: {:?}", e),
    }
}
