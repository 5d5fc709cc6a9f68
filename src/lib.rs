#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/Finomnis/ws281x-pcm/issues")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod channel;
mod color;
mod config;
mod encoder;
mod gamma;
mod pixel;
mod timing;

/// Errors of this crate
pub mod errors;

pub mod engine;

pub mod hw;

pub mod ffi;

pub mod sim;

pub use channel::Channel;
pub use color::{Color, ColorOrder, StripType};
pub use config::{ChannelConfig, ChannelConfigBuilder, DEFAULT_DMA_CHANNEL, DEFAULT_GPIO_PIN};
pub use encoder::{bitstream_len, scale, Bitstream, Encoder};
pub use engine::{Backend, TransferState, TransmissionEngine, WaitPolicy};
pub use gamma::Gamma;
pub use pixel::Pixel;
pub use timing::{SymbolTiming, MIN_RESET_US};
