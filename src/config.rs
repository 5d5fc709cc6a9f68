use std::time::Duration;

use snafu::prelude::*;

use crate::{
    errors::{InitError, InvalidConfigSnafu, UnsupportedDmaChannelSnafu, UnsupportedPinSnafu},
    hw::{self, Board},
    Gamma, StripType, SymbolTiming, WaitPolicy,
};

/// Default data pin; PCM_DOUT on the 40-pin header.
pub const DEFAULT_GPIO_PIN: u8 = 21;
/// Default DMA channel; 10 is unused by the firmware on all supported boards.
pub const DEFAULT_DMA_CHANNEL: u8 = 10;

/// Configuration of a [Channel](crate::Channel).
///
/// Created through [`ChannelConfig::builder`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub(crate) gpio_pin: u8,
    pub(crate) led_count: usize,
    pub(crate) strip: StripType,
    pub(crate) brightness: u8,
    pub(crate) timing: SymbolTiming,
    pub(crate) wait_policy: WaitPolicy,
    pub(crate) dma_channel: u8,
    pub(crate) clock_divisor: Option<u32>,
    pub(crate) invert: bool,
    pub(crate) gamma: Gamma,
    pub(crate) board: Option<Board>,
}

impl ChannelConfig {
    /// Starts configuring a channel with `led_count` LEDs.
    pub fn builder(led_count: usize) -> ChannelConfigBuilder {
        ChannelConfigBuilder {
            config: ChannelConfig {
                gpio_pin: DEFAULT_GPIO_PIN,
                led_count,
                strip: StripType::default(),
                brightness: 255,
                timing: SymbolTiming::default(),
                wait_policy: WaitPolicy::default(),
                dma_channel: DEFAULT_DMA_CHANNEL,
                clock_divisor: None,
                invert: false,
                gamma: Gamma::default(),
                board: None,
            },
        }
    }

    /// The GPIO pin the strip is connected to.
    pub fn gpio_pin(&self) -> u8 {
        self.gpio_pin
    }

    /// Number of LEDs on the strip.
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// The strip's color layout.
    pub fn strip(&self) -> StripType {
        self.strip
    }

    /// Brightness the channel starts with.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// The symbol timing table.
    pub fn timing(&self) -> SymbolTiming {
        self.timing
    }

    /// Behavior of `render` while a frame is in flight.
    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait_policy
    }

    /// The DMA channel feeding the PCM FIFO.
    pub fn dma_channel(&self) -> u8 {
        self.dma_channel
    }

    /// Explicit PCM clock divisor, if any.
    pub fn clock_divisor(&self) -> Option<u32> {
        self.clock_divisor
    }

    /// Whether the output is inverted.
    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Gamma correction curve.
    pub fn gamma(&self) -> Gamma {
        self.gamma
    }

    /// Board override, if SoC detection is skipped.
    pub fn board(&self) -> Option<Board> {
        self.board
    }

    /// Time one frame occupies the wire, reset gap included.
    pub fn frame_duration(&self) -> Duration {
        let bytes = crate::encoder::bitstream_len(self.led_count, self.strip, self.timing) as u64;
        let samples = bytes.saturating_mul(8);
        let rate = u64::from(self.timing.sample_rate_hz());
        Duration::from_secs(samples / rate)
            + Duration::from_nanos((samples % rate) * 1_000_000_000 / rate)
    }
}

/// Builder of a [`ChannelConfig`].
#[derive(Debug, Clone)]
pub struct ChannelConfigBuilder {
    config: ChannelConfig,
}

impl ChannelConfigBuilder {
    /// GPIO pin of the data line. Only pins with a PCM_DOUT function work.
    pub fn gpio_pin(mut self, pin: u8) -> Self {
        self.config.gpio_pin = pin;
        self
    }

    /// The strip's color layout.
    pub fn strip(mut self, strip: StripType) -> Self {
        self.config.strip = strip;
        self
    }

    /// Initial brightness, `0..=255`.
    pub fn brightness(mut self, brightness: u8) -> Self {
        self.config.brightness = brightness;
        self
    }

    /// Symbol timing of the LED chips.
    pub fn timing(mut self, timing: SymbolTiming) -> Self {
        self.config.timing = timing;
        self
    }

    /// Behavior of `render` while a frame is in flight.
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.config.wait_policy = policy;
        self
    }

    /// DMA channel to use, `0..=14`.
    pub fn dma_channel(mut self, channel: u8) -> Self {
        self.config.dma_channel = channel;
        self
    }

    /// Overrides the PCM clock divisor derived from the timing table.
    pub fn clock_divisor(mut self, divisor: u32) -> Self {
        self.config.clock_divisor = Some(divisor);
        self
    }

    /// Inverts the output, for inverting level shifters.
    pub fn invert(mut self, invert: bool) -> Self {
        self.config.invert = invert;
        self
    }

    /// Gamma correction curve.
    pub fn gamma(mut self, gamma: Gamma) -> Self {
        self.config.gamma = gamma;
        self
    }

    /// Skips SoC detection and uses the given board.
    pub fn board(mut self, board: Board) -> Self {
        self.config.board = Some(board);
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<ChannelConfig, InitError> {
        let config = self.config;

        ensure!(
            config.led_count > 0,
            InvalidConfigSnafu {
                reason: "LED count must not be zero"
            }
        );
        config.timing.validate()?;
        ensure!(
            hw::gpio::pcm_dout_function(config.gpio_pin).is_some(),
            UnsupportedPinSnafu {
                pin: config.gpio_pin
            }
        );
        ensure!(
            config.dma_channel <= hw::dma::MAX_DMA_CHANNEL,
            UnsupportedDmaChannelSnafu {
                channel: config.dma_channel
            }
        );
        let transfer_len = crate::encoder::checked_bitstream_len(
            config.led_count,
            config.strip,
            config.timing,
        )
        .and_then(|bytes| bytes.checked_next_multiple_of(4));
        ensure!(
            transfer_len.is_some_and(|len| len <= hw::dma::max_transfer_len(config.dma_channel)),
            InvalidConfigSnafu {
                reason: "frame does not fit into a single DMA transfer"
            }
        );
        if let Some(divisor) = config.clock_divisor {
            ensure!(
                (1..=hw::clock::MAX_DIVISOR).contains(&divisor),
                InvalidConfigSnafu {
                    reason: "clock divisor must be between 1 and 4095"
                }
            );
        }
        if let Gamma::Power(factor) = config.gamma {
            ensure!(
                factor.is_finite() && factor > 0.0,
                InvalidConfigSnafu {
                    reason: "gamma factor must be positive"
                }
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChannelConfig::builder(10).build().unwrap();
        assert_eq!(config.gpio_pin(), 21);
        assert_eq!(config.dma_channel(), 10);
        assert_eq!(config.brightness(), 255);
        assert_eq!(config.strip(), StripType::WS2812);
        assert_eq!(config.timing(), SymbolTiming::WS2812);
        assert_eq!(config.wait_policy(), WaitPolicy::Block);
    }

    #[test]
    fn rejects_zero_leds() {
        assert!(matches!(
            ChannelConfig::builder(0).build(),
            Err(InitError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_pin() {
        assert!(matches!(
            ChannelConfig::builder(1).gpio_pin(18).build(),
            Err(InitError::UnsupportedPin { pin: 18 })
        ));
    }

    #[test]
    fn rejects_unsupported_dma_channel() {
        assert!(matches!(
            ChannelConfig::builder(1).dma_channel(15).build(),
            Err(InitError::UnsupportedDmaChannel { channel: 15 })
        ));
    }

    #[test]
    fn rejects_bad_divisor_and_gamma() {
        assert!(ChannelConfig::builder(1).clock_divisor(0).build().is_err());
        assert!(ChannelConfig::builder(1).clock_divisor(4096).build().is_err());
        assert!(ChannelConfig::builder(1)
            .gamma(Gamma::Power(-1.0))
            .build()
            .is_err());
    }

    #[test]
    fn rejects_frames_longer_than_one_transfer() {
        // 7281 * 9 + 17 bytes exceed the 16-bit length of a DMA Lite channel.
        assert!(matches!(
            ChannelConfig::builder(7281).build(),
            Err(InitError::InvalidConfig { .. })
        ));
        assert!(ChannelConfig::builder(7281).dma_channel(5).build().is_ok());
        assert!(matches!(
            ChannelConfig::builder(usize::MAX).dma_channel(5).build(),
            Err(InitError::InvalidConfig { .. })
        ));
        assert!(matches!(
            ChannelConfig::builder(i32::MAX as usize).build(),
            Err(InitError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn frame_duration() {
        // 10 LEDs * 9 bytes + 17 reset bytes = 107 bytes = 856 samples at 2.4MHz
        let config = ChannelConfig::builder(10).build().unwrap();
        assert_eq!(config.frame_duration(), Duration::from_nanos(356_666));

        // 100000 LEDs * 9 bytes + 17 = 900017 bytes = 7200136 samples
        let config = ChannelConfig::builder(100_000)
            .dma_channel(0)
            .build()
            .unwrap();
        assert_eq!(config.frame_duration(), Duration::from_nanos(3_000_056_666));
    }
}
