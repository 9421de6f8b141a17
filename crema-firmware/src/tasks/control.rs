//! Control tick
//!
//! Runs the sequencer and every controller once per millisecond. The LED
//! software PWM and the panel buttons ride on the same tick.

use defmt::*;
use embassy_time::{Duration, Ticker};

use crema_core::traits::Plant;

use crate::board::{LedOutputs, PanelInputs};
use crate::channels::{Machine, Outgoing, SharedMachine, TX_CHANNEL};

/// Panel buttons are sampled every this many ticks
const PANEL_PERIOD_MS: u32 = 20;

#[embassy_executor::task]
pub async fn control_task(
    machine: &'static SharedMachine,
    panel: PanelInputs,
    mut leds: LedOutputs,
) {
    info!("Control task started");

    let mut ticker = Ticker::every(Duration::from_millis(1));
    let mut ticks: u32 = 0;

    loop {
        ticker.next().await;
        ticks = ticks.wrapping_add(1);
        let sample_panel = ticks % PANEL_PERIOD_MS == 0;

        let (reply, frame) = machine.lock(|cell| {
            let mut machine = cell.borrow_mut();
            let Machine { ctx, plant } = &mut *machine;
            if sample_panel {
                let auxiliary = panel.sample(plant.auxiliary());
                plant.set_auxiliary(auxiliary);
            }
            (ctx.tick_1ms(plant), plant.led_frame())
        });

        leds.refresh(&frame);

        if let Some(reply) = reply {
            debug!("Deferred reply {:#04x}", reply.msg_type());
            if TX_CHANNEL.try_send(Outgoing::reply(reply, false)).is_err() {
                warn!("TX channel full, dropping deferred reply");
            }
        }
    }
}
