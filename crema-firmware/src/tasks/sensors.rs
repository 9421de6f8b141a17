//! Analog sampling
//!
//! Converts every analog input once per millisecond and publishes the raw
//! counts in [`ANALOG`] for the synchronous sensor drivers.

use core::sync::atomic::Ordering;

use defmt::*;
use embassy_stm32::adc::{Adc, AnyAdcChannel};
use embassy_stm32::peripherals::ADC1;
use embassy_time::{Duration, Ticker};

use crate::board::{ANALOG, ANALOG_INPUTS};

#[embassy_executor::task]
pub async fn sensor_task(
    mut adc: Adc<'static, ADC1>,
    mut channels: [AnyAdcChannel<ADC1>; ANALOG_INPUTS],
) {
    info!("Sensor task started");

    let mut ticker = Ticker::every(Duration::from_millis(1));

    loop {
        for (channel, slot) in channels.iter_mut().zip(&ANALOG) {
            let raw = adc.read(channel).await;
            slot.store(raw, Ordering::Relaxed);
        }
        ticker.next().await;
    }
}
