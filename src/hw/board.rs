use std::{fs, io};

use snafu::prelude::*;

use crate::errors::{BoardDetectionSnafu, InitError, UnsupportedBoardSnafu};

const CPUINFO: &str = "/proc/cpuinfo";

/// New-style revision codes have this bit set.
const NEW_STYLE_FLAG: u32 = 1 << 23;
/// Old-style codes may carry the over-voltage warranty bit.
const OLD_STYLE_MASK: u32 = 0x00ff_ffff;

/// The system-on-chip of a Raspberry Pi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Soc {
    /// Pi 1, Zero, Compute Module 1.
    Bcm2835,
    /// Pi 2 (early revisions).
    Bcm2836,
    /// Pi 2 (later revisions), Pi 3, Zero 2, Compute Module 3.
    Bcm2837,
    /// Pi 4, Pi 400, Compute Module 4.
    Bcm2711,
}

impl Soc {
    /// Physical address of the peripheral block as seen by the ARM core.
    pub const fn periph_base(self) -> u64 {
        match self {
            Soc::Bcm2835 => 0x2000_0000,
            Soc::Bcm2836 | Soc::Bcm2837 => 0x3f00_0000,
            Soc::Bcm2711 => 0xfe00_0000,
        }
    }

    /// Base of the VideoCore bus alias used for SDRAM by the DMA engine.
    pub const fn videocore_base(self) -> u32 {
        match self {
            Soc::Bcm2835 => 0x4000_0000,
            Soc::Bcm2836 | Soc::Bcm2837 | Soc::Bcm2711 => 0xc000_0000,
        }
    }

    /// Frequency of the oscillator that feeds the PCM clock.
    pub const fn oscillator_hz(self) -> u32 {
        match self {
            Soc::Bcm2711 => 54_000_000,
            _ => 19_200_000,
        }
    }
}

/// A detected (or explicitly chosen) Raspberry Pi board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    /// The raw revision code.
    pub revision: u32,
    /// The SoC the revision maps to.
    pub soc: Soc,
}

impl Board {
    /// Detects the board this process runs on.
    pub fn detect() -> Result<Self, InitError> {
        let cpuinfo = fs::read_to_string(CPUINFO).context(BoardDetectionSnafu)?;
        let board = Self::from_cpuinfo(&cpuinfo)?;
        log::debug!(
            "Detected board revision {:#x} ({:?})",
            board.revision,
            board.soc
        );
        Ok(board)
    }

    /// Parses the `Revision` field of `/proc/cpuinfo`.
    pub fn from_cpuinfo(cpuinfo: &str) -> Result<Self, InitError> {
        let revision = cpuinfo
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim() == "Revision")
            .and_then(|(_, value)| u32::from_str_radix(value.trim(), 16).ok())
            .ok_or_else(|| InitError::BoardDetection {
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    "no Revision field in /proc/cpuinfo",
                ),
            })?;
        Self::from_revision(revision)
    }

    /// Maps a revision code to its SoC.
    pub fn from_revision(revision: u32) -> Result<Self, InitError> {
        let soc = if revision & NEW_STYLE_FLAG != 0 {
            match (revision >> 12) & 0xf {
                0 => Some(Soc::Bcm2835),
                1 => Some(Soc::Bcm2836),
                2 => Some(Soc::Bcm2837),
                3 => Some(Soc::Bcm2711),
                _ => None,
            }
        } else {
            match revision & OLD_STYLE_MASK {
                0x0002..=0x0015 => Some(Soc::Bcm2835),
                _ => None,
            }
        };

        let soc = soc.context(UnsupportedBoardSnafu { revision })?;
        Ok(Self { revision, soc })
    }
}
