use std::{io, path::PathBuf, time::Duration};

use snafu::prelude::*;

/// Errors of the [Channel::init](crate::Channel::init) function.
///
/// All of them are fatal for the channel instance; the channel has to be
/// recreated after the underlying condition was fixed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InitError {
    /// Unable to open a device file; usually requires root privileges.
    #[snafu(display("Unable to open {}: {source}", path.display()))]
    PermissionDenied {
        /// The device file that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// Unable to map a peripheral or DMA memory region.
    #[snafu(display("Unable to map {what}: {source}"))]
    Map {
        /// The region that failed to map.
        what: &'static str,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// Unable to read the board revision.
    #[snafu(display("Unable to detect the board revision: {source}"))]
    BoardDetection {
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The board's SoC is unknown or not supported by this driver.
    #[snafu(display("Unsupported board revision {revision:#x}"))]
    UnsupportedBoard {
        /// The raw revision code.
        revision: u32,
    },
    /// The GPIO pin cannot be driven by the PCM peripheral.
    #[snafu(display("GPIO {pin} has no PCM_DOUT function"))]
    UnsupportedPin {
        /// The requested pin.
        pin: u8,
    },
    /// The DMA channel does not exist or is not usable.
    #[snafu(display("DMA channel {channel} is not supported"))]
    UnsupportedDmaChannel {
        /// The requested DMA channel.
        channel: u8,
    },
    /// A VideoCore mailbox request failed.
    #[snafu(display("Mailbox request failed: {what}"))]
    Mailbox {
        /// The failed request.
        what: &'static str,
    },
    /// Another channel currently owns the PCM peripheral.
    AlreadyInUse,
    /// The channel configuration is invalid.
    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: &'static str,
    },
}

/// Errors of channel operations.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The pixel index is out of range.
    #[snafu(display("Pixel index {index} out of range (length {len})"))]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of LEDs in the channel.
        len: usize,
    },
    /// A previous frame is still being transmitted.
    Busy,
    /// The transmission did not finish in time.
    #[snafu(display("Transmission did not finish within {timeout:?}"))]
    Timeout {
        /// The exceeded timeout.
        timeout: Duration,
    },
    /// The DMA controller reported an error.
    #[snafu(display("DMA error, debug register: {debug:#010x}"))]
    Dma {
        /// Content of the DMA debug register.
        debug: u32,
    },
    /// The frame is longer than the transfer buffer of the backend.
    #[snafu(display("Frame of {words} words exceeds the transfer buffer of {capacity} words"))]
    FrameTooLong {
        /// Length of the frame in 32-bit words.
        words: usize,
        /// Capacity of the transfer buffer in 32-bit words.
        capacity: usize,
    },
    /// The channel was already closed.
    Closed,
}
