#![deny(unsafe_code)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod config;
mod device_id;
mod error;
mod eth;
mod events;
mod sensor;
mod sink;
mod transport;

use events::MeshSignals;
use mesh_node_core::NodeContext;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// Running flag and topology shared by the event loop and both pipelines
static NODE: NodeContext = NodeContext::new();
static SIGNALS: MeshSignals = MeshSignals::new();

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2])]
mod app {
    use super::*;
    use defmt::{error, info};
    use embassy_futures::join::{join, join4};
    use embassy_stm32::gpio::{Flex, Level, Output, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::Hse;
    use embassy_stm32::rcc::HseMode;
    use embassy_stm32::time::Hertz;
    use mesh_node_core::{Indication, NodeConfig, ReceivePipeline, SampleSource, TransmitPipeline};

    use crate::config::MeshConfig;
    use crate::sensor::{Dht11, StackHeadroom, UptimeClock};
    use crate::sink::HttpSink;
    use crate::transport::{UdpBuffers, UdpMeshTransport};

    /// DHT11 data line (Feather pin D6)
    type SensorPin = embassy_stm32::Peri<'static, peripherals::PC7>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Mesh sensor node starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);
        info!("System initialized: SYSCLK=84MHz");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);

        let led = Output::new(p.PC1, Level::High, Speed::Low);

        let wing = eth::WingPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        heartbeat::spawn().ok();
        network_task::spawn(wing, p.PC7).ok();

        (Shared {}, Local { led })
    }

    /// Heartbeat task: blinks the mesh layer, one long pulse when detached
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context) {
        info!("Heartbeat task started");
        let mut indication = Indication::Disconnected;
        loop {
            if let Some(next) = SIGNALS.indication.try_take() {
                info!("Status indication: {:?}", next);
                indication = next;
            }
            match indication {
                Indication::Layer(layer) => {
                    for _ in 0..layer.clamp(1, 10) {
                        cx.local.led.set_high();
                        Mono::delay(150.millis()).await;
                        cx.local.led.set_low();
                        Mono::delay(250.millis()).await;
                    }
                }
                Indication::Disconnected => {
                    cx.local.led.set_high();
                    Mono::delay(1000.millis()).await;
                    cx.local.led.set_low();
                }
            }
            Mono::delay(2000.millis()).await;
        }
    }

    /// Network task - Ethernet, mesh events and both telemetry pipelines
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        wing: eth::WingPeripherals,
        sensor_pin: SensorPin,
    ) {
        use embassy_net::{Config, StackResources};
        use static_cell::StaticCell;

        info!("Network task started");
        let mesh = MeshConfig::default();

        let mac_addr = mesh.mac_addr.unwrap_or_else(device_id::mac_address);
        let (device, w5500_runner) = match eth::bring_up(wing, mac_addr).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Ethernet unavailable: {}", e);
                return;
            }
        };

        static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            mesh.seed,
        );
        info!("Network stack initialized with DHCP");

        static UDP_BUFFERS: StaticCell<UdpBuffers> = StaticCell::new();
        let transport = match UdpMeshTransport::new(
            stack,
            UDP_BUFFERS.init(UdpBuffers::new()),
            &NODE,
            mesh.mesh_port,
            mesh.root_endpoint,
        ) {
            Ok(transport) => transport,
            Err(e) => {
                error!("Mesh transport unavailable: {}", e);
                return;
            }
        };
        let sink = HttpSink::new(stack, mesh.sink_endpoint, mesh.sink_path);

        let node = NodeConfig {
            node_id: mesh.node_id.unwrap_or_else(device_id::node_id),
            ..mesh.node
        };
        info!("Node id {}, root: {}", node.node_id, mesh.fixed_root);

        let pipelines = async {
            SIGNALS.pipelines.wait().await;
            // DHT11 is unstable for ~1 s after power-up
            embassy_time::Timer::after_secs(1).await;

            let source = SampleSource::new(
                Dht11::new(Flex::new(sensor_pin)),
                UptimeClock,
                node.min_sample_interval_us,
            );
            let diagnostics = StackHeadroom;
            let mut tx = TransmitPipeline::new(
                &NODE,
                &transport,
                source,
                embassy_time::Delay,
                &diagnostics,
                node,
            );
            let mut rx = ReceivePipeline::new(
                &NODE,
                &transport,
                &sink,
                embassy_time::Delay,
                &diagnostics,
                node,
            );
            let (tx_stats, rx_stats) = join(tx.run(), rx.run()).await;
            info!("Pipelines stopped: {:?} {:?}", tx_stats, rx_stats);
        };

        join4(
            w5500_runner.run(),
            net_runner.run(),
            events::run(stack, &NODE, &SIGNALS, &mesh),
            pipelines,
        )
        .await;
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
