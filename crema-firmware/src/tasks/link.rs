//! Host link over USART2
//!
//! RX feeds bytes into the frame assembler and hands complete frames to
//! the dispatcher. TX owns the UART transmitter and drains [`TX_CHANNEL`].

use defmt::*;
use embassy_stm32::usart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};

use crema_core::DispatchOutcome;
use crema_hal::StorageKey;
use crema_protocol::{Frame, FrameAssembler};
use crema_hal_stm32l1::uart::link_error;

use crate::channels::{
    Machine, Outgoing, SharedFlash, SharedMachine, PERSIST_PARTITIONS, PERSIST_SETTINGS, REBOOT,
    TX_CHANNEL,
};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

#[embassy_executor::task]
pub async fn link_rx_task(
    mut rx: BufferedUartRx<'static>,
    machine: &'static SharedMachine,
    flash: &'static SharedFlash,
) {
    info!("Link RX task started");

    let mut assembler = FrameAssembler::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read error: {:?}", link_error(e));
                assembler.reset();
                continue;
            }
        };
        trace!("RX: {} bytes", n);

        for &byte in &buf[..n] {
            if let Err(e) = assembler.feed(byte) {
                warn!("Frame dropped: {:?}", e);
            }
            if let Some(frame) = assembler.take() {
                let outcome = dispatch(&frame, machine, flash).await;
                apply(outcome);
            }
        }
    }
}

async fn dispatch(
    frame: &Frame,
    machine: &'static SharedMachine,
    flash: &'static SharedFlash,
) -> DispatchOutcome {
    let mut flash = flash.lock().await;
    machine.lock(|cell| {
        let mut machine = cell.borrow_mut();
        let Machine { ctx, plant } = &mut *machine;
        ctx.dispatch(frame, plant, &mut *flash)
    })
}

/// Queue the reply and hand persistence to the storage task
fn apply(outcome: DispatchOutcome) {
    match outcome.persist {
        Some(StorageKey::MachineSettings) => PERSIST_SETTINGS.signal(()),
        Some(StorageKey::PartitionTable) => PERSIST_PARTITIONS.signal(()),
        None => {}
    }

    match outcome.reply {
        Some(reply) => {
            if TX_CHANNEL
                .try_send(Outgoing::reply(reply, outcome.reboot))
                .is_err()
            {
                warn!("TX channel full, dropping reply");
                if outcome.reboot {
                    REBOOT.signal(());
                }
            }
        }
        None if outcome.reboot => REBOOT.signal(()),
        None => {}
    }
}

#[embassy_executor::task]
pub async fn link_tx_task(mut tx: BufferedUartTx<'static>) {
    info!("Link TX task started");

    loop {
        let outgoing = TX_CHANNEL.receive().await;
        let sent = match tx.write_all(&outgoing.frame).await {
            Ok(()) => tx.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!("UART write error: {:?}", link_error(e));
        }
        if outgoing.reboot {
            REBOOT.signal(());
        }
    }
}
