//! Crema - Coffee Machine Controller Firmware
//!
//! Main firmware binary for the STM32L152-based machine controller. Runs
//! the work sequencer, the heater and pump loops and the host link.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::adc::{self, Adc, AdcChannel};
use embassy_stm32::exti::{self, ExtiInput};
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::usart::{self, BufferedUart};
use embassy_stm32::{bind_interrupts, interrupt, peripherals, Peri};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crema_core::traits::{HeaterId, PumpId};
use crema_core::{DeviceInfo, MachineContext};
use crema_drivers::{CremaPlant, SwitchedOutput};
use crema_hal::gpio::read_straps;
use crema_hal::UartConfig;
use crema_hal_stm32l1::gpio::{Pin, Strap};
use crema_hal_stm32l1::BoardFlash;

use crate::board::{
    BoardIo, HeaterOutputs, LedOutputs, PanelInputs, Switch, ValveOutputs, WandInputs,
};
use crate::channels::{Machine, SharedFlash, SharedMachine};
use crate::config::{load_partitions, load_settings, MACHINE};

mod board;
mod channels;
mod config;
mod tasks;

bind_interrupts!(struct Irqs {
    USART2 => usart::BufferedInterruptHandler<peripherals::USART2>;
    ADC1 => adc::InterruptHandler<peripherals::ADC1>;
    EXTI0 => exti::InterruptHandler<interrupt::typelevel::EXTI0>;
    EXTI1 => exti::InterruptHandler<interrupt::typelevel::EXTI1>;
    EXTI2 => exti::InterruptHandler<interrupt::typelevel::EXTI2>;
    EXTI3 => exti::InterruptHandler<interrupt::typelevel::EXTI3>;
    EXTI4 => exti::InterruptHandler<interrupt::typelevel::EXTI4>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

static FLASH: StaticCell<SharedFlash> = StaticCell::new();
static MACHINE_STATE: StaticCell<SharedMachine> = StaticCell::new();

/// Opto-triac and LED driver boards sink current, so outputs are active-low
const OUTPUTS_INVERTED: bool = true;

/// Heartbeat log interval
const HEARTBEAT_SECS: u64 = 10;

fn switch(pin: Peri<'static, impl embassy_stm32::gpio::Pin>) -> Switch {
    let output = Output::new(pin, Level::High, Speed::Low);
    SwitchedOutput::new(Pin::new(output), OUTPUTS_INVERTED)
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Crema firmware starting...");

    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        // 16 MHz HSI x4 / 2 = 32 MHz
        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            mul: PllMul::MUL4,
            div: PllDiv::DIV2,
        });
        config.rcc.sys = Sysclk::PLL1_R;
    }
    let p = embassy_stm32::init(config);
    info!("Peripherals initialized");

    // Hardware revision straps
    let straps = [
        Strap(Input::new(p.PC13, Pull::Down)),
        Strap(Input::new(p.PC14, Pull::Down)),
        Strap(Input::new(p.PC15, Pull::Down)),
        Strap(Input::new(p.PD2, Pull::Down)),
    ];
    let hardware_version = read_straps(&straps);
    info!("Hardware version {}", hardware_version);

    // Persisted records
    let flash: &'static SharedFlash = FLASH.init(AsyncMutex::new(BoardFlash::new(p.FLASH)));
    let (settings, partitions) = {
        let mut storage = flash.lock().await;
        let settings = load_settings(&mut *storage, MACHINE.default_settings()).await;
        let partitions = load_partitions(&mut *storage).await;
        (settings, partitions)
    };

    // Plant outputs start switched off
    let heaters = HeaterOutputs([
        switch(p.PB4),
        switch(p.PB5),
        switch(p.PB6),
        switch(p.PB7),
        switch(p.PB8),
    ]);
    let pumps = [switch(p.PB9), switch(p.PB10)];
    let valves = ValveOutputs {
        circuits: [
            [switch(p.PC0), switch(p.PC1), switch(p.PC2)],
            [switch(p.PC6), switch(p.PC7), switch(p.PC8)],
        ],
        shared: switch(p.PC9),
    };
    let zero_cross_enable = switch(p.PB12);

    let air_pin = PwmPin::new(p.PB11, OutputType::PushPull);
    let air = SimplePwm::new(
        p.TIM2,
        None,
        None,
        None,
        Some(air_pin),
        khz(20),
        CountingMode::EdgeAlignedUp,
    );

    let wand = WandInputs {
        milk_probe: Input::new(p.PC10, Pull::Down),
        parked: Input::new(p.PC11, Pull::Up),
    };
    let panel = PanelInputs {
        coffee_button: Input::new(p.PA11, Pull::Up),
        milk_button: Input::new(p.PA12, Pull::Up),
    };
    let leds = LedOutputs::new([
        [switch(p.PA8), switch(p.PA9), switch(p.PA10)],
        [switch(p.PA15), switch(p.PB13), switch(p.PB14)],
        [switch(p.PB15), switch(p.PC5), switch(p.PC12)],
    ]);

    let io = BoardIo::new(heaters, pumps, valves, zero_cross_enable, air, wand);
    let mut plant = CremaPlant::new(io, MACHINE.plant());

    let device = DeviceInfo {
        serial_number: MACHINE.serial_number,
        ..DeviceInfo::new(hardware_version)
    };
    let mut ctx = MachineContext::new(device, settings, partitions);
    ctx.boot(&mut plant);
    info!("Machine context ready, serial {:#x}", device.serial_number);

    let machine: &'static SharedMachine =
        MACHINE_STATE.init(Mutex::new(RefCell::new(Machine { ctx, plant })));

    // Host link
    let link = UartConfig {
        baudrate: MACHINE.baudrate,
    };
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = link.baudrate;

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = BufferedUart::new(p.USART2, p.PA3, p.PA2, tx_buf, rx_buf, Irqs, uart_config)
        .unwrap();
    let (tx, rx) = uart.split();
    info!("Host link at {} baud", link.baudrate);

    // Analog inputs in AnalogInput order
    let adc = Adc::new(p.ADC1, Irqs);
    let channels = [
        p.PA0.degrade_adc(),
        p.PA1.degrade_adc(),
        p.PA4.degrade_adc(),
        p.PA5.degrade_adc(),
        p.PA6.degrade_adc(),
        p.PA7.degrade_adc(),
    ];

    // Pulse inputs
    let zero_cross = ExtiInput::new(p.PC4, p.EXTI4, Pull::None, Irqs);
    let flow_p1 = ExtiInput::new(p.PB0, p.EXTI0, Pull::Up, Irqs);
    let flow_p2 = ExtiInput::new(p.PB1, p.EXTI1, Pull::Up, Irqs);
    let efast_h1 = ExtiInput::new(p.PB2, p.EXTI2, Pull::Down, Irqs);
    let efast_h2 = ExtiInput::new(p.PC3, p.EXTI3, Pull::Down, Irqs);

    info!("Spawning tasks...");

    spawner.spawn(tasks::sensor_task(adc, channels)).unwrap();
    spawner.spawn(tasks::control_task(machine, panel, leds)).unwrap();
    spawner.spawn(tasks::link_rx_task(rx, machine, flash)).unwrap();
    spawner.spawn(tasks::link_tx_task(tx)).unwrap();
    spawner.spawn(tasks::storage_task(machine, flash)).unwrap();
    spawner.spawn(tasks::zero_cross_task(zero_cross, machine)).unwrap();
    for pump in PumpId::ALL {
        spawner.spawn(tasks::pump_compare_task(pump, machine)).unwrap();
    }
    spawner
        .spawn(tasks::flow_meter_task(flow_p1, PumpId::P1, machine))
        .unwrap();
    spawner
        .spawn(tasks::flow_meter_task(flow_p2, PumpId::P2, machine))
        .unwrap();
    spawner
        .spawn(tasks::efast_task(efast_h1, HeaterId::H1, machine))
        .unwrap();
    spawner
        .spawn(tasks::efast_task(efast_h2, HeaterId::H2, machine))
        .unwrap();

    info!("All tasks spawned, entering main loop");

    let mut heartbeat = Ticker::every(Duration::from_secs(HEARTBEAT_SECS));
    loop {
        heartbeat.next().await;
        let (now_ms, status) = machine.lock(|cell| {
            let machine = cell.borrow();
            (machine.ctx.now_ms(), machine.ctx.work().main())
        });
        debug!("Heartbeat at {} ms, main status {:?}", now_ms, status);
    }
}
