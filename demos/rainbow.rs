// This example renders a moving rainbow on a LED strip connected to the
// PCM_DOUT pin (GPIO 21) of a Raspberry Pi.
//
// Needs root privileges to access /dev/mem and /dev/vcio. Use `--sim` to
// run it without hardware.

use std::{
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use palette::LinSrgb;
use ws281x_pcm::{
    sim::SimulatedBackend, Backend, Channel, ChannelConfig, ColorOrder, StripType, WaitPolicy,
};

mod common;
use common::{effects, stderr_log};

#[derive(Parser)]
#[command(name = "rainbow")]
#[command(about = "Renders a moving rainbow on a WS281x strip", long_about = None)]
struct Cli {
    /// Number of LEDs on the strip
    #[arg(long, default_value_t = 60)]
    leds: usize,
    /// Data pin, 21 or 31
    #[arg(long, default_value_t = ws281x_pcm::DEFAULT_GPIO_PIN)]
    pin: u8,
    /// DMA channel
    #[arg(long, default_value_t = ws281x_pcm::DEFAULT_DMA_CHANNEL)]
    dma: u8,
    /// Global brightness
    #[arg(long, default_value_t = 64)]
    brightness: u8,
    /// Wire color order
    #[arg(long, value_enum, default_value = "grb")]
    order: Order,
    /// The strip has a white channel
    #[arg(long)]
    rgbw: bool,
    /// Invert the output, for inverting level shifters
    #[arg(long)]
    invert: bool,
    /// Frames per second
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u32>,
    /// Render into memory instead of the PCM peripheral
    #[arg(long)]
    sim: bool,
    /// Print debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Order {
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl From<Order> for ColorOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Rgb => ColorOrder::Rgb,
            Order::Rbg => ColorOrder::Rbg,
            Order::Grb => ColorOrder::Grb,
            Order::Gbr => ColorOrder::Gbr,
            Order::Brg => ColorOrder::Brg,
            Order::Bgr => ColorOrder::Bgr,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    stderr_log::init(if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let strip = if cli.rgbw {
        StripType::rgbw(cli.order.into())
    } else {
        StripType::rgb(cli.order.into())
    };

    let config = match ChannelConfig::builder(cli.leds)
        .gpio_pin(cli.pin)
        .dma_channel(cli.dma)
        .brightness(cli.brightness)
        .strip(strip)
        .invert(cli.invert)
        .wait_policy(WaitPolicy::Block)
        .build()
    {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Initializing {} LEDs ...", config.led_count());
    let result = if cli.sim {
        let (backend, _handle) = SimulatedBackend::new(config.timing());
        run(Channel::with_backend(config, backend), &cli)
    } else {
        match Channel::init(config) {
            Ok(channel) => run(channel, &cli),
            Err(e) => {
                log::error!("Initialization failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Rendering failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run<B: Backend>(mut channel: Channel<B>, cli: &Cli) -> Result<(), ws281x_pcm::errors::Error> {
    let frame_time = Duration::from_secs(1) / cli.fps.max(1);
    let mut pixels = vec![LinSrgb::new(0, 0, 0); channel.len()];

    log::info!("Rendering ...");
    let mut t = 0;
    while cli.frames.map_or(true, |frames| t < frames) {
        let start = Instant::now();

        effects::rainbow(t, &mut pixels);
        for (index, pixel) in pixels.iter().enumerate() {
            channel.set_pixel(index, pixel)?;
        }
        channel.render()?;

        t = t.wrapping_add(1);
        if let Some(remaining) = frame_time.checked_sub(start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    channel.wait(Some(Duration::from_secs(1)))?;
    channel.clear();
    channel.render()?;
    channel.wait(Some(Duration::from_secs(1)))?;
    channel.close();
    log::info!("Done after {} frames.", t);

    Ok(())
}
