//! Pulse inputs: flow meters and the Efast heater monitors

use defmt::*;
use embassy_stm32::exti::ExtiInput;
use embassy_time::Instant;

use crema_core::traits::{HeaterId, PumpId};

use crate::channels::SharedMachine;

/// Flow meter timestamps are in 100 µs ticks
const FLOW_TICK_US: u64 = 100;

#[embassy_executor::task(pool_size = 2)]
pub async fn flow_meter_task(
    mut input: ExtiInput<'static>,
    pump: PumpId,
    machine: &'static SharedMachine,
) {
    info!("Flow meter task started for {:?}", pump);

    loop {
        input.wait_for_rising_edge().await;
        let ticks = (Instant::now().as_micros() / FLOW_TICK_US) as u32;
        machine.lock(|cell| cell.borrow_mut().plant.flow_pulse(pump, ticks));
    }
}

#[embassy_executor::task(pool_size = 2)]
pub async fn efast_task(
    mut input: ExtiInput<'static>,
    heater: HeaterId,
    machine: &'static SharedMachine,
) {
    info!("Efast task started for {:?}", heater);

    loop {
        input.wait_for_rising_edge().await;
        machine.lock(|cell| cell.borrow_mut().plant.efast_pulse(heater));
    }
}
