//! Zero-cross edges and pump firing
//!
//! Each mains half-wave advances the heater slot and lets the pumps pick
//! a firing delay. The delay is timed by a per-pump compare task.

use defmt::*;
use embassy_stm32::exti::ExtiInput;
use embassy_time::{Instant, Timer};

use crema_core::traits::PumpId;

use crate::channels::{SharedMachine, PUMP_COMPARE};

#[embassy_executor::task]
pub async fn zero_cross_task(mut detector: ExtiInput<'static>, machine: &'static SharedMachine) {
    info!("Zero-cross task started");

    loop {
        detector.wait_for_rising_edge().await;
        let now_us = Instant::now().as_micros() as u32;

        let compare = machine.lock(|cell| cell.borrow_mut().plant.on_zero_cross(now_us));
        for pump in PumpId::ALL {
            if let Some(delay) = compare.delays[pump.index()] {
                PUMP_COMPARE[pump.index()].signal(delay);
            }
        }
    }
}

#[embassy_executor::task(pool_size = 2)]
pub async fn pump_compare_task(pump: PumpId, machine: &'static SharedMachine) {
    info!("Pump compare task started for {:?}", pump);

    loop {
        let delay_us = PUMP_COMPARE[pump.index()].wait().await;
        Timer::after_micros(u64::from(delay_us)).await;
        machine.lock(|cell| cell.borrow_mut().plant.pump_compare(pump));
    }
}
