//! Converts pixel colors into the PCM sample stream.
//!
//! Every color byte is sent MSB first. Every bit becomes one symbol of
//! `samples_per_bit` samples, so every color byte expands into exactly
//! `samples_per_bit` bytes of the stream.

use crate::{color::Component, Color, Gamma, StripType, SymbolTiming};

/// Scales a color byte by a brightness value.
///
/// `255` keeps the value, `0` turns it off. The result never exceeds `value`.
pub const fn scale(value: u8, brightness: u8) -> u8 {
    ((value as u16 * (brightness as u16 + 1)) >> 8) as u8
}

/// Number of bytes a frame of `led_count` LEDs occupies in the stream,
/// including the reset gap.
pub const fn bitstream_len(led_count: usize, strip: StripType, timing: SymbolTiming) -> usize {
    led_count * strip.bytes_per_led() * timing.samples_per_bit as usize + timing.reset_bytes()
}

/// Like [`bitstream_len`], but `None` if the length does not fit a `usize`.
pub(crate) fn checked_bitstream_len(
    led_count: usize,
    strip: StripType,
    timing: SymbolTiming,
) -> Option<usize> {
    led_count
        .checked_mul(strip.bytes_per_led() * usize::from(timing.samples_per_bit))?
        .checked_add(timing.reset_bytes())
}

/// An encoded frame, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitstream {
    bytes: Vec<u8>,
    idle: u8,
}

impl Bitstream {
    /// Creates an empty bitstream.
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            idle: 0,
        }
    }

    /// The samples, eight per byte, first sample in the MSB.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the stream in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was encoded yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of 32-bit PCM words needed to transmit the stream.
    pub fn word_len(&self) -> usize {
        self.bytes.len().div_ceil(4)
    }

    /// The stream packed into 32-bit PCM words.
    ///
    /// The PCM shifts words out MSB first, so bytes are packed big endian.
    /// A trailing partial word is filled with the idle level.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes.chunks(4).map(|chunk| {
            let mut word = [self.idle; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_be_bytes(word)
        })
    }
}

/// Encodes pixel buffers for one strip configuration.
///
/// Holds precomputed lookup tables; encoding itself is a pure function of
/// the pixels and the brightness.
#[derive(Clone)]
pub struct Encoder {
    strip: StripType,
    timing: SymbolTiming,
    invert: bool,
    gamma: [u8; 256],
    expansion: Box<[[u8; 8]; 256]>,
}

impl Encoder {
    /// Creates an encoder.
    ///
    /// `timing` has to be valid; see [`SymbolTiming`].
    pub fn new(strip: StripType, timing: SymbolTiming, gamma: Gamma, invert: bool) -> Self {
        let mut expansion = Box::new([[0u8; 8]; 256]);
        for (value, expanded) in expansion.iter_mut().enumerate() {
            *expanded = expand_byte(value as u8, &timing, invert);
        }

        Self {
            strip,
            timing,
            invert,
            gamma: gamma.table(),
            expansion,
        }
    }

    /// Length of the bitstream for `led_count` LEDs.
    pub fn bitstream_len(&self, led_count: usize) -> usize {
        bitstream_len(led_count, self.strip, self.timing)
    }

    /// Encodes `pixels` into `out`, overwriting its previous content.
    pub fn encode(&self, pixels: &[Color], brightness: u8, out: &mut Bitstream) {
        let samples = usize::from(self.timing.samples_per_bit);
        let (components, bytes_per_led) = self.strip.wire_components();
        let components: &[Component] = &components[..bytes_per_led];

        out.idle = if self.invert { 0xff } else { 0x00 };
        out.bytes.clear();
        out.bytes.reserve(self.bitstream_len(pixels.len()));

        for &pixel in pixels {
            for &component in components {
                let value = self.gamma[usize::from(scale(pixel.component(component), brightness))];
                out.bytes
                    .extend_from_slice(&self.expansion[usize::from(value)][..samples]);
            }
        }

        let reset_len = out.bytes.len() + self.timing.reset_bytes();
        out.bytes.resize(reset_len, out.idle);
    }
}

fn expand_byte(value: u8, timing: &SymbolTiming, invert: bool) -> [u8; 8] {
    let samples = u32::from(timing.samples_per_bit);
    let mask = (1u64 << samples) - 1;

    let mut acc = 0u64;
    for bit in (0..8).rev() {
        let mut symbol = if value & (1 << bit) != 0 {
            u64::from(timing.one)
        } else {
            u64::from(timing.zero)
        };
        if invert {
            symbol = !symbol & mask;
        }
        acc = (acc << samples) | symbol;
    }

    // `acc` holds 8 * samples bits, i.e. exactly `samples` bytes.
    let mut expanded = [0u8; 8];
    for (i, byte) in expanded.iter_mut().take(samples as usize).enumerate() {
        *byte = (acc >> (8 * (samples as usize - 1 - i))) as u8;
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorOrder;

    fn ws2812() -> Encoder {
        Encoder::new(StripType::WS2812, SymbolTiming::WS2812, Gamma::Linear, false)
    }

    #[test]
    fn scale_never_exceeds_value() {
        for value in 0..=255u8 {
            for brightness in 0..=255u8 {
                assert!(scale(value, brightness) <= value);
            }
            assert_eq!(scale(value, 255), value);
            assert_eq!(scale(value, 0), 0);
        }
    }

    #[test]
    fn byte_expansion_ws2812() {
        // 0 -> 100 x8, 1 -> 110 x8
        assert_eq!(expand_byte(0x00, &SymbolTiming::WS2812, false)[..3], [0x92, 0x49, 0x24]);
        assert_eq!(expand_byte(0xff, &SymbolTiming::WS2812, false)[..3], [0xdb, 0x6d, 0xb6]);
        // 1000_0001 -> 110 100 100 100 100 100 100 110
        assert_eq!(expand_byte(0x81, &SymbolTiming::WS2812, false)[..3], [0xd2, 0x49, 0x26]);
    }

    #[test]
    fn byte_expansion_sk6812() {
        // 0 -> 1000 x8, 1 -> 1100 x8
        assert_eq!(expand_byte(0x00, &SymbolTiming::SK6812, false)[..4], [0x88; 4]);
        assert_eq!(expand_byte(0xff, &SymbolTiming::SK6812, false)[..4], [0xcc; 4]);
    }

    #[test]
    fn inverted_expansion() {
        assert_eq!(expand_byte(0x00, &SymbolTiming::WS2812, true)[..3], [0x6d, 0xb6, 0xdb]);
    }

    #[test]
    fn frame_layout() {
        let encoder = ws2812();
        let mut out = Bitstream::new();
        encoder.encode(&[Color::rgb(0xff, 0, 0)], 255, &mut out);

        assert_eq!(out.len(), 9 + 17);
        // Green first
        assert_eq!(out.as_bytes()[0..3], [0x92, 0x49, 0x24]);
        assert_eq!(out.as_bytes()[3..6], [0xdb, 0x6d, 0xb6]);
        assert_eq!(out.as_bytes()[6..9], [0x92, 0x49, 0x24]);
        assert!(out.as_bytes()[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn brightness_is_applied_before_encoding() {
        let encoder = Encoder::new(
            StripType::rgb(ColorOrder::Rgb),
            SymbolTiming::WS2812,
            Gamma::Linear,
            false,
        );
        let mut dimmed = Bitstream::new();
        let mut reference = Bitstream::new();
        encoder.encode(&[Color::rgb(200, 100, 50)], 127, &mut dimmed);
        encoder.encode(&[Color::rgb(100, 50, 25)], 255, &mut reference);
        assert_eq!(dimmed, reference);
    }

    #[test]
    fn words_are_big_endian_and_idle_padded() {
        let encoder = Encoder::new(StripType::WS2812, SymbolTiming::WS2812, Gamma::Linear, true);
        let mut out = Bitstream::new();
        encoder.encode(&[Color::BLACK], 255, &mut out);

        // 9 data bytes + 17 reset bytes = 26 bytes = 7 words
        assert_eq!(out.word_len(), 7);
        let words: Vec<u32> = out.words().collect();
        assert_eq!(words[0], 0x6db6db6d);
        assert_eq!(words[6], 0xffff_ffff);
    }

    #[test]
    fn encoding_reuses_buffer() {
        let encoder = ws2812();
        let mut out = Bitstream::new();
        encoder.encode(&[Color::rgb(1, 2, 3); 10], 255, &mut out);
        let first = out.clone();
        encoder.encode(&[Color::rgb(9, 9, 9); 2], 255, &mut out);
        encoder.encode(&[Color::rgb(1, 2, 3); 10], 255, &mut out);
        assert_eq!(out, first);
    }
}
