//! Symbol timing tables.
//!
//! Every data bit on the wire is generated by `samples_per_bit` consecutive
//! PCM samples. A `0` and a `1` differ only in how many of those samples are
//! high, which sets the duty cycle of the bit.

use snafu::ensure;

use crate::errors::{InitError, InvalidConfigSnafu};

/// Datasheet minimum of the low time that latches a frame.
pub const MIN_RESET_US: u32 = 50;

/// Describes how the bits of a WS281x-family chip are generated.
///
/// Symbols are given MSB first, using the lowest `samples_per_bit` bits:
/// with three samples, `0b110` is two samples high followed by one low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTiming {
    /// Data bits per second on the wire.
    pub bit_rate_hz: u32,
    /// Number of PCM samples per data bit.
    pub samples_per_bit: u8,
    /// Sample pattern of a `0` bit.
    pub zero: u8,
    /// Sample pattern of a `1` bit.
    pub one: u8,
    /// Low time after the last bit that latches the frame.
    pub reset_us: u32,
}

impl SymbolTiming {
    /// WS2812/WS2812B: 1.25µs bit period, 0.42µs/0.83µs high times.
    pub const WS2812: SymbolTiming = SymbolTiming {
        bit_rate_hz: 800_000,
        samples_per_bit: 3,
        zero: 0b100,
        one: 0b110,
        reset_us: 55,
    };

    /// WS2811 in low speed mode: 2.5µs bit period.
    pub const WS2811_400KHZ: SymbolTiming = SymbolTiming {
        bit_rate_hz: 400_000,
        samples_per_bit: 3,
        zero: 0b100,
        one: 0b110,
        reset_us: 55,
    };

    /// SK6812: 1.25µs bit period, 0.31µs/0.63µs high times, longer latch.
    pub const SK6812: SymbolTiming = SymbolTiming {
        bit_rate_hz: 800_000,
        samples_per_bit: 4,
        zero: 0b1000,
        one: 0b1100,
        reset_us: 80,
    };

    /// PCM samples per second.
    pub const fn sample_rate_hz(&self) -> u32 {
        self.bit_rate_hz * self.samples_per_bit as u32
    }

    /// Number of idle bytes appended to every frame.
    pub const fn reset_bytes(&self) -> usize {
        let reset_bits =
            (self.reset_us as u64 * self.sample_rate_hz() as u64).div_ceil(1_000_000);
        reset_bits.div_ceil(8) as usize
    }

    /// High time of a symbol in nanoseconds.
    pub fn high_time_ns(&self, symbol: u8) -> u32 {
        let sample_ns = 1_000_000_000 / self.sample_rate_hz();
        symbol.count_ones() * sample_ns
    }

    pub(crate) fn validate(&self) -> Result<(), InitError> {
        ensure!(
            (1..=8).contains(&self.samples_per_bit),
            InvalidConfigSnafu {
                reason: "samples per bit must be between 1 and 8"
            }
        );
        ensure!(
            self.bit_rate_hz > 0,
            InvalidConfigSnafu {
                reason: "bit rate must not be zero"
            }
        );
        let limit = 1u16 << self.samples_per_bit;
        ensure!(
            u16::from(self.zero) < limit && u16::from(self.one) < limit,
            InvalidConfigSnafu {
                reason: "symbol pattern does not fit into samples per bit"
            }
        );
        ensure!(
            self.zero != self.one,
            InvalidConfigSnafu {
                reason: "zero and one symbols must differ"
            }
        );
        ensure!(
            self.reset_us >= MIN_RESET_US,
            InvalidConfigSnafu {
                reason: "reset gap must be at least 50us"
            }
        );
        Ok(())
    }
}

impl Default for SymbolTiming {
    fn default() -> Self {
        Self::WS2812
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws2812_matches_datasheet() {
        let timing = SymbolTiming::WS2812;
        assert_eq!(timing.sample_rate_hz(), 2_400_000);
        assert_eq!(timing.high_time_ns(timing.zero), 416);
        assert_eq!(timing.high_time_ns(timing.one), 832);
        // 55us at 2.4MHz = 132 samples
        assert_eq!(timing.reset_bytes(), 17);
    }

    #[test]
    fn presets_are_valid() {
        for timing in [
            SymbolTiming::WS2812,
            SymbolTiming::WS2811_400KHZ,
            SymbolTiming::SK6812,
        ] {
            timing.validate().unwrap();
        }
    }

    #[test]
    fn rejects_oversized_symbol() {
        let timing = SymbolTiming {
            one: 0b1110,
            ..SymbolTiming::WS2812
        };
        assert!(matches!(
            timing.validate(),
            Err(InitError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_short_reset() {
        let timing = SymbolTiming {
            reset_us: 20,
            ..SymbolTiming::WS2812
        };
        assert!(timing.validate().is_err());
    }
}
