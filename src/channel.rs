use std::time::Duration;

use snafu::prelude::*;

use crate::{
    encoder::{Bitstream, Encoder},
    engine::{Backend, TransmissionEngine},
    errors::{ClosedSnafu, Error, IndexOutOfRangeSnafu, InitError},
    hw::PcmBackend,
    Color, ChannelConfig, Pixel,
};

/// A strip of LEDs connected to one output.
///
/// Holds the pixel buffer in host memory; [`render`](Self::render) encodes
/// it and hands it to the backend, which transmits it in the background.
pub struct Channel<B: Backend = PcmBackend> {
    config: ChannelConfig,
    pixels: Vec<Color>,
    brightness: u8,
    encoder: Encoder,
    bitstream: Bitstream,
    engine: TransmissionEngine<B>,
}

impl Channel<PcmBackend> {
    /// Initializes the PCM peripheral and returns a channel driving it.
    ///
    /// All LEDs start out black. Nothing is sent until the first
    /// [`render`](Self::render).
    pub fn init(config: ChannelConfig) -> Result<Self, InitError> {
        let backend = PcmBackend::open(&config)?;
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: Backend> Channel<B> {
    /// Creates a channel on top of an already initialized backend.
    pub fn with_backend(config: ChannelConfig, backend: B) -> Self {
        let encoder = Encoder::new(
            config.strip(),
            config.timing(),
            config.gamma(),
            config.invert(),
        );
        let mut bitstream = Bitstream::new();
        encoder.encode(&[], config.brightness(), &mut bitstream);

        Self {
            pixels: vec![Color::BLACK; config.led_count()],
            brightness: config.brightness(),
            engine: TransmissionEngine::new(backend, config.wait_policy()),
            encoder,
            bitstream,
            config,
        }
    }

    /// Sets the color of the LED at `index`.
    ///
    /// Only changes the buffer; the LEDs update on the next render.
    pub fn set_pixel(&mut self, index: usize, pixel: impl Pixel) -> Result<(), Error> {
        let len = self.pixels.len();
        let slot = self
            .pixels
            .get_mut(index)
            .context(IndexOutOfRangeSnafu { index, len })?;
        *slot = pixel.into_color();
        Ok(())
    }

    /// The color last written to the LED at `index`.
    pub fn get_pixel(&self, index: usize) -> Result<Color, Error> {
        self.pixels
            .get(index)
            .copied()
            .context(IndexOutOfRangeSnafu {
                index,
                len: self.pixels.len(),
            })
    }

    /// Sets every LED to the same color.
    pub fn fill(&mut self, pixel: impl Pixel) {
        self.pixels.fill(pixel.into_color());
    }

    /// Turns all LEDs off on the next render.
    pub fn clear(&mut self) {
        self.fill(Color::BLACK);
    }

    /// The pixel buffer.
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Sets the global brightness applied at the next render.
    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    /// The current global brightness.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Encodes the pixel buffer and starts transmitting it.
    ///
    /// Returns once the transfer is started. Rendering an unchanged buffer
    /// puts the identical signal on the wire again.
    pub fn render(&mut self) -> Result<(), Error> {
        ensure!(!self.engine.is_closed(), ClosedSnafu);
        self.encoder
            .encode(&self.pixels, self.brightness, &mut self.bitstream);
        self.engine.render(&self.bitstream)
    }

    /// Blocks until the current frame is on the LEDs.
    ///
    /// `None` waits without a timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.engine.wait(timeout)
    }

    /// Whether a frame is currently being transmitted.
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Stops the output and releases the hardware.
    ///
    /// Safe to call more than once, and while a frame is in flight. The
    /// pixel buffer stays accessible.
    pub fn close(&mut self) {
        self.engine.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Number of LEDs.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always `false`; a channel has at least one LED.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// The configuration this channel was created with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// The most recently rendered bitstream.
    pub fn bitstream(&self) -> &Bitstream {
        &self.bitstream
    }

    /// The backend, unless the channel was closed.
    pub fn backend(&self) -> Option<&B> {
        self.engine.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedBackend;

    fn channel(led_count: usize) -> Channel<SimulatedBackend> {
        let config = ChannelConfig::builder(led_count).build().unwrap();
        let (backend, _handle) = SimulatedBackend::manual();
        Channel::with_backend(config, backend)
    }

    #[test]
    fn starts_black() {
        let channel = channel(4);
        assert_eq!(channel.len(), 4);
        assert!(channel.pixels().iter().all(|&pixel| pixel == Color::BLACK));
    }

    #[test]
    fn index_out_of_range() {
        let mut channel = channel(4);
        assert_eq!(
            channel.set_pixel(4, Color::rgb(1, 2, 3)),
            Err(Error::IndexOutOfRange { index: 4, len: 4 })
        );
        assert_eq!(
            channel.get_pixel(17),
            Err(Error::IndexOutOfRange { index: 17, len: 4 })
        );
    }

    #[test]
    fn fill_and_clear() {
        let mut channel = channel(3);
        channel.fill([10u8, 20, 30]);
        assert_eq!(channel.get_pixel(2), Ok(Color::rgb(10, 20, 30)));
        channel.clear();
        assert_eq!(channel.get_pixel(0), Ok(Color::BLACK));
    }

    #[test]
    fn pixels_survive_close() {
        let mut channel = channel(2);
        channel.set_pixel(1, 0x00ff_0000u32).unwrap();
        channel.close();

        assert_eq!(channel.render(), Err(Error::Closed));
        assert!(channel.backend().is_none());
        assert_eq!(channel.get_pixel(1), Ok(Color::rgb(255, 0, 0)));
        channel.set_pixel(0, Color::rgb(1, 1, 1)).unwrap();
    }
}
