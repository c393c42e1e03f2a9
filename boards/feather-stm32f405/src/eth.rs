#![deny(unsafe_code)]
//! W5500 FeatherWing: SPI wiring, reset and embassy-net device
//!
//! The wing sits on SPI2 with chip select on D9 (PC6), reset on PC3 and the
//! interrupt line on PC2.

use defmt::{error, info};
use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice as SharedSpiDevice;
use embassy_net_wiznet::chip::W5500;
use embassy_net_wiznet::{Device, Runner, State};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::peripherals;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use mesh_node_hal::MeshAddress;
use static_cell::StaticCell;

use crate::error::NetworkError;

const SPI_FREQUENCY: Hertz = Hertz(10_000_000);
/// Frames buffered by the driver in each direction
const QUEUE_DEPTH: usize = 8;

type WingSpi = Spi<'static, Async>;
type WingDevice = SharedSpiDevice<'static, CriticalSectionRawMutex, WingSpi, Output<'static>>;

/// Driver task half; must be polled for the device to move packets
pub type W5500Runner = Runner<'static, W5500, WingDevice, ExtiInput<'static>, Output<'static>>;

/// Peripherals claimed for the wing in `init`
pub struct WingPeripherals {
    pub spi: Peri<'static, peripherals::SPI2>,
    pub sck: Peri<'static, peripherals::PB13>,
    pub mosi: Peri<'static, peripherals::PB15>,
    pub miso: Peri<'static, peripherals::PB14>,
    pub cs: Peri<'static, peripherals::PC6>,
    pub reset: Peri<'static, peripherals::PC3>,
    pub int: Peri<'static, peripherals::PC2>,
    pub exti: Peri<'static, peripherals::EXTI2>,
    pub dma_tx: Peri<'static, peripherals::DMA1_CH4>,
    pub dma_rx: Peri<'static, peripherals::DMA1_CH3>,
}

/// Datasheet minimum is 500 us low, then 1 ms before the PLL locks
async fn pulse_reset(reset: &mut Output<'static>) {
    reset.set_low();
    Timer::after_millis(1).await;
    reset.set_high();
    Timer::after_millis(2).await;
}

/// Bring the wing up as an embassy-net device with `mac`
pub async fn bring_up(
    periph: WingPeripherals,
    mac: [u8; 6],
) -> Result<(Device<'static>, W5500Runner), NetworkError> {
    let mut config = spi::Config::default();
    config.frequency = SPI_FREQUENCY;
    let spi = Spi::new(
        periph.spi,
        periph.sck,
        periph.mosi,
        periph.miso,
        periph.dma_tx,
        periph.dma_rx,
        config,
    );
    let cs = Output::new(periph.cs, Level::High, Speed::VeryHigh);
    let mut reset = Output::new(periph.reset, Level::High, Speed::Low);
    let int = ExtiInput::new(periph.int, periph.exti, Pull::Up);

    pulse_reset(&mut reset).await;

    static BUS: StaticCell<Mutex<CriticalSectionRawMutex, WingSpi>> = StaticCell::new();
    let device = SharedSpiDevice::new(BUS.init(Mutex::new(spi)), cs);

    static STATE: StaticCell<State<QUEUE_DEPTH, QUEUE_DEPTH>> = StaticCell::new();
    let state = STATE.init(State::new());

    info!("W5500 MAC {}", MeshAddress::new(mac));
    embassy_net_wiznet::new(mac, state, device, int, reset)
        .await
        .map_err(|_| {
            error!("W5500 did not answer on SPI2");
            NetworkError::SocketError
        })
}
