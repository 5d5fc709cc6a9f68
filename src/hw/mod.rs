//! Raspberry Pi peripheral access.
//!
//! Everything in here talks to real hardware through `/dev/mem` and the
//! VideoCore mailbox; only [`Board`] detection is usable on other hosts.

use std::{thread, time::Duration};

mod board;
mod claim;
pub(crate) mod clock;
pub(crate) mod dma;
mod driver;
pub(crate) mod gpio;
mod mailbox;
pub(crate) mod pcm;
pub(crate) mod registers;

pub use board::{Board, Soc};
pub use driver::PcmBackend;

/// Gives a peripheral time to pick up a register write.
pub(crate) fn settle() {
    thread::sleep(Duration::from_micros(10));
}
