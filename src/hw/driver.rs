use std::{
    ptr,
    sync::atomic::{fence, Ordering},
    thread,
    time::{Duration, Instant},
};

use snafu::prelude::*;

use super::{
    claim::HardwareClaim,
    clock::{CmPcm, CM_PCM_OFFSET, MAX_DIVISOR},
    dma::{self, ChannelStatus, ControlBlock, DmaChannel},
    gpio::{self, Gpio, GPIO_OFFSET, GPIO_SIZE},
    mailbox::{open_device, DmaMemory, DEV_MEM},
    pcm::{Pcm, PCM_OFFSET},
    registers::RegisterWindow,
    Board,
};
use crate::{
    encoder::{bitstream_len, Bitstream},
    engine::{Backend, TransferState},
    errors::{
        ClosedSnafu, Error, FrameTooLongSnafu, InitError, InvalidConfigSnafu, UnsupportedPinSnafu,
    },
    ChannelConfig,
};

/// The control block sits at the start of the DMA memory, the samples follow.
const CONTROL_BLOCK_SIZE: usize = core::mem::size_of::<ControlBlock>();

/// Extra time granted on shutdown for a frame to leave the wire.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(10);

/// Memory the DMA engine reads a frame from.
///
/// Offset 0 holds the control block, the samples follow it.
trait TransferMemory {
    /// Pointer to the byte at `offset`.
    fn ptr(&self, offset: usize) -> *mut u8;
    /// Bus address of the byte at `offset`.
    fn bus_address(&self, offset: usize) -> u32;
}

impl TransferMemory for DmaMemory {
    fn ptr(&self, offset: usize) -> *mut u8 {
        DmaMemory::ptr(self, offset)
    }

    fn bus_address(&self, offset: usize) -> u32 {
        DmaMemory::bus_address(self, offset)
    }
}

struct Peripherals<M: TransferMemory = DmaMemory> {
    memory: M,
    buffer_words: usize,
    pcm: Pcm,
    dma: DmaChannel,
    clock: CmPcm,
}

/// A [`Backend`] that streams frames through DMA into the PCM peripheral.
///
/// Owns the PCM block, its clock and one DMA channel for as long as it
/// lives. Only one instance can exist per process.
pub struct PcmBackend {
    peripherals: Option<Peripherals>,
    frame_duration: Duration,
    // Released last.
    _claim: HardwareClaim,
}

impl PcmBackend {
    /// Maps the peripherals and prepares them for transmission.
    ///
    /// Requires root privileges.
    pub fn open(config: &ChannelConfig) -> Result<Self, InitError> {
        let board = match config.board() {
            Some(board) => board,
            None => Board::detect()?,
        };
        let soc = board.soc;

        let timing = config.timing();
        let divisor = match config.clock_divisor() {
            Some(divisor) => divisor,
            None => soc.oscillator_hz() / timing.sample_rate_hz(),
        };
        ensure!(
            (1..=MAX_DIVISOR).contains(&divisor),
            InvalidConfigSnafu {
                reason: "symbol rate not reachable with the PCM clock"
            }
        );
        let pin = config.gpio_pin();
        let function = gpio::pcm_dout_function(pin).context(UnsupportedPinSnafu { pin })?;

        let frame_bytes = bitstream_len(config.led_count(), config.strip(), timing);
        let buffer_words = frame_bytes.div_ceil(4);
        let transfer_len = buffer_words
            .checked_mul(4)
            .filter(|&len| len <= dma::max_transfer_len(config.dma_channel()))
            .and_then(|len| u32::try_from(len).ok())
            .context(InvalidConfigSnafu {
                reason: "frame does not fit into a single DMA transfer",
            })?;

        let claim = HardwareClaim::acquire()?;

        let mem = open_device(DEV_MEM, true)?;
        let base = soc.periph_base();
        let pcm = Pcm::new(RegisterWindow::map(&mem, base + PCM_OFFSET, Pcm::SIZE, "PCM")?);
        let dma = DmaChannel::new(RegisterWindow::map(
            &mem,
            base + dma::channel_offset(config.dma_channel()),
            DmaChannel::SIZE,
            "DMA channel",
        )?);
        let clock = CmPcm::new(RegisterWindow::map(
            &mem,
            base + CM_PCM_OFFSET,
            CmPcm::SIZE,
            "PCM clock",
        )?);
        let gpio = Gpio::new(RegisterWindow::map(&mem, base + GPIO_OFFSET, GPIO_SIZE, "GPIO")?);

        let memory = DmaMemory::allocate(soc, CONTROL_BLOCK_SIZE + transfer_len as usize)?;

        gpio.set_function(pin, function);

        pcm.stop();
        clock.kill();
        clock.start(divisor);
        pcm.configure_transmitter();

        let control_block = ControlBlock::pcm_transmit(
            memory.bus_address(CONTROL_BLOCK_SIZE),
            Pcm::fifo_bus_address(),
            transfer_len,
        );
        // SAFETY: offset 0 of the page aligned DMA memory is reserved for the control block.
        unsafe { control_block.store(memory.ptr(0).cast()) };
        dma.reset();

        log::debug!(
            "PCM on GPIO {} via DMA channel {}, clock divisor {}, {} words per frame ({} bytes reserved)",
            pin,
            config.dma_channel(),
            divisor,
            buffer_words,
            memory.size()
        );

        Ok(Self {
            peripherals: Some(Peripherals {
                pcm,
                dma,
                clock,
                memory,
                buffer_words,
            }),
            frame_duration: config.frame_duration(),
            _claim: claim,
        })
    }
}

impl<M: TransferMemory> Peripherals<M> {
    fn state(&self) -> TransferState {
        match self.dma.status() {
            ChannelStatus::Error { debug } => TransferState::Failed { debug },
            ChannelStatus::Active => TransferState::Active,
            // The last words may still sit in the FIFO.
            ChannelStatus::Idle if !self.pcm.fifo_empty() => TransferState::Active,
            ChannelStatus::Idle => TransferState::Idle,
        }
    }

    fn load(&self, frame: &Bitstream) -> Result<(), Error> {
        let words = frame.word_len();
        ensure!(
            words <= self.buffer_words,
            FrameTooLongSnafu {
                words,
                capacity: self.buffer_words
            }
        );

        let samples: *mut u32 = self.memory.ptr(CONTROL_BLOCK_SIZE).cast();
        for (index, word) in frame.words().enumerate() {
            // SAFETY: `index` is below `buffer_words`, which the memory holds.
            unsafe { ptr::write_volatile(samples.add(index), word) };
        }

        // SAFETY: the engine never loads while the DMA engine is active.
        // The length fits, `buffer_words` was checked on open.
        unsafe {
            ControlBlock::update_source(
                self.memory.ptr(0).cast(),
                self.memory.bus_address(CONTROL_BLOCK_SIZE),
                (words * 4) as u32,
            )
        };
        Ok(())
    }

    fn start(&self) {
        fence(Ordering::SeqCst);
        self.dma.start(self.memory.bus_address(0));
        self.pcm.start_transmitter();
    }

    fn shutdown(self, frame_duration: Duration) {
        let deadline = Instant::now()
            .checked_add(frame_duration + SHUTDOWN_GRACE)
            .unwrap_or_else(Instant::now);
        while self.state() == TransferState::Active {
            if Instant::now() > deadline {
                log::warn!("Transfer still active on shutdown, aborting it");
                break;
            }
            thread::sleep(crate::engine::POLL_INTERVAL);
        }

        let Self {
            pcm,
            dma,
            clock,
            memory,
            ..
        } = self;

        // DMA has to stop before its memory is released.
        dma.reset();
        pcm.stop();
        clock.kill();
        drop(memory);
    }
}

impl Backend for PcmBackend {
    fn load(&mut self, frame: &Bitstream) -> Result<(), Error> {
        self.peripherals.as_ref().context(ClosedSnafu)?.load(frame)
    }

    fn start(&mut self) -> Result<(), Error> {
        self.peripherals.as_ref().context(ClosedSnafu)?.start();
        Ok(())
    }

    fn state(&self) -> TransferState {
        match &self.peripherals {
            Some(peripherals) => peripherals.state(),
            None => TransferState::Idle,
        }
    }

    fn shutdown(&mut self) {
        if let Some(peripherals) = self.peripherals.take() {
            peripherals.shutdown(self.frame_duration);
            log::debug!("PCM backend shut down");
        }
    }
}

impl Drop for PcmBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use memmap2::{MmapOptions, MmapRaw};

    use super::*;
    use crate::{Color, Encoder, Gamma, StripType, SymbolTiming};

    const MEMORY_BUS_ADDRESS: u32 = 0xc000_0000;

    /// Host memory that records the DMA status register at release.
    struct HostMemory {
        map: MmapRaw,
        dma_cs: *const u32,
        released_with: Arc<Mutex<Option<u32>>>,
    }

    impl TransferMemory for HostMemory {
        fn ptr(&self, offset: usize) -> *mut u8 {
            assert!(offset < self.map.len());
            unsafe { self.map.as_mut_ptr().add(offset) }
        }

        fn bus_address(&self, offset: usize) -> u32 {
            MEMORY_BUS_ADDRESS + offset as u32
        }
    }

    impl Drop for HostMemory {
        fn drop(&mut self) {
            let cs = unsafe { ptr::read_volatile(self.dma_cs) };
            *self.released_with.lock().unwrap() = Some(cs);
        }
    }

    fn peripherals(buffer_words: usize) -> (Peripherals<HostMemory>, Arc<Mutex<Option<u32>>>) {
        let dma = DmaChannel::new(RegisterWindow::anonymous(DmaChannel::SIZE, "DMA channel"));
        let released_with = Arc::new(Mutex::new(None));
        let memory = HostMemory {
            map: MmapOptions::new()
                .len(CONTROL_BLOCK_SIZE + buffer_words * 4)
                .map_anon()
                .unwrap()
                .into(),
            dma_cs: dma.window().register_ptr(0),
            released_with: released_with.clone(),
        };

        let peripherals = Peripherals {
            pcm: Pcm::new(RegisterWindow::anonymous(Pcm::SIZE, "PCM")),
            dma,
            clock: CmPcm::new(RegisterWindow::anonymous(CmPcm::SIZE, "PCM clock")),
            memory,
            buffer_words,
        };
        (peripherals, released_with)
    }

    fn one_led_frame() -> Bitstream {
        let encoder = Encoder::new(StripType::WS2812, SymbolTiming::WS2812, Gamma::Linear, false);
        let mut frame = Bitstream::new();
        encoder.encode(&[Color::rgb(255, 0, 0)], 255, &mut frame);
        frame
    }

    #[test]
    fn load_fills_samples_and_control_block() {
        let frame = one_led_frame();
        // 9 data bytes + 17 reset bytes
        assert_eq!(frame.word_len(), 7);

        let (peripherals, _) = peripherals(7);
        peripherals.load(&frame).unwrap();

        let samples: *const u32 = peripherals.memory.ptr(CONTROL_BLOCK_SIZE).cast();
        let loaded: Vec<u32> = (0..7)
            .map(|index| unsafe { ptr::read_volatile(samples.add(index)) })
            .collect();
        assert_eq!(loaded, frame.words().collect::<Vec<_>>());

        let block: ControlBlock =
            unsafe { ptr::read_volatile(peripherals.memory.ptr(0).cast()) };
        assert_eq!(block.source_ad, MEMORY_BUS_ADDRESS + CONTROL_BLOCK_SIZE as u32);
        assert_eq!(block.txfr_len, 28);
    }

    #[test]
    fn load_rejects_frames_longer_than_the_buffer() {
        let (peripherals, _) = peripherals(4);
        assert_eq!(
            peripherals.load(&one_led_frame()),
            Err(Error::FrameTooLong {
                words: 7,
                capacity: 4
            })
        );
    }

    #[test]
    fn state_includes_the_fifo() {
        let (peripherals, _) = peripherals(4);

        peripherals.dma.set_cs(dma::CS_ACTIVE);
        assert_eq!(peripherals.state(), TransferState::Active);

        // DMA done, last words still in the FIFO
        peripherals.dma.set_cs(0);
        assert_eq!(peripherals.state(), TransferState::Active);

        peripherals.pcm.set_cs(crate::hw::pcm::CS_TXE);
        assert_eq!(peripherals.state(), TransferState::Idle);

        peripherals.dma.set_cs(dma::CS_ERROR);
        peripherals.dma.set_debug(0x4);
        assert_eq!(peripherals.state(), TransferState::Failed { debug: 0x4 });
    }

    #[test]
    fn shutdown_stops_dma_before_releasing_memory() {
        let (peripherals, released_with) = peripherals(4);
        peripherals.dma.set_cs(dma::CS_ACTIVE);

        peripherals.shutdown(Duration::ZERO);

        let cs = released_with.lock().unwrap().unwrap();
        assert_eq!(cs & dma::CS_ACTIVE, 0);
        assert_eq!(cs, dma::CS_INT | dma::CS_END);
    }
}
