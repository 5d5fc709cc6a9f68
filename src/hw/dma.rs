use std::ptr;

use super::registers::register_block;

/// DMA channels 0-14 live in one block; channel 15 is elsewhere and not used.
pub(crate) const MAX_DMA_CHANNEL: u8 = 14;

/// Longest transfer in bytes a single control block can describe.
///
/// Channels 7 and up are DMA Lite channels with a 16-bit length register.
pub(crate) const fn max_transfer_len(channel: u8) -> usize {
    if channel >= 7 {
        0xffff
    } else {
        0x3fff_ffff
    }
}

/// Offset of a DMA channel's registers from the peripheral base.
pub(crate) const fn channel_offset(channel: u8) -> u64 {
    0x7000 + 0x100 * channel as u64
}

register_block! {
    /// Registers of a single DMA channel.
    DmaChannel (0x24) {
        cs: 0x00,
        conblk_ad: 0x04,
        ti: 0x08,
        source_ad: 0x0c,
        dest_ad: 0x10,
        txfr_len: 0x14,
        stride: 0x18,
        nextconbk: 0x1c,
        debug: 0x20,
    }
}

pub(crate) const CS_ACTIVE: u32 = 1 << 0;
pub(crate) const CS_END: u32 = 1 << 1;
pub(crate) const CS_INT: u32 = 1 << 2;
pub(crate) const CS_ERROR: u32 = 1 << 8;
pub(crate) const CS_WAIT_OUTSTANDING_WRITES: u32 = 1 << 28;
pub(crate) const CS_RESET: u32 = 1 << 31;

pub(crate) const fn cs_priority(x: u32) -> u32 {
    (x & 0xf) << 16
}
pub(crate) const fn cs_panic_priority(x: u32) -> u32 {
    (x & 0xf) << 20
}

pub(crate) const TI_WAIT_RESP: u32 = 1 << 3;
pub(crate) const TI_DEST_DREQ: u32 = 1 << 6;
pub(crate) const TI_SRC_INC: u32 = 1 << 8;
pub(crate) const TI_NO_WIDE_BURSTS: u32 = 1 << 26;

pub(crate) const fn ti_permap(x: u32) -> u32 {
    (x & 0x1f) << 16
}

/// Peripheral DREQ of the PCM transmitter.
pub(crate) const DREQ_PCM_TX: u32 = 2;

/// Writing these bits to DEBUG clears the error flags.
const DEBUG_CLEAR_ERRORS: u32 = 0x7;

/// A DMA control block, as read by the DMA engine.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C, align(32))]
pub(crate) struct ControlBlock {
    pub ti: u32,
    pub source_ad: u32,
    pub dest_ad: u32,
    pub txfr_len: u32,
    pub stride: u32,
    pub nextconbk: u32,
    _reserved: [u32; 2],
}

impl ControlBlock {
    /// A control block that streams `len` bytes from `source` into the PCM FIFO.
    pub fn pcm_transmit(source: u32, dest: u32, len: u32) -> Self {
        Self {
            ti: TI_NO_WIDE_BURSTS | TI_WAIT_RESP | TI_DEST_DREQ | ti_permap(DREQ_PCM_TX) | TI_SRC_INC,
            source_ad: source,
            dest_ad: dest,
            txfr_len: len,
            stride: 0,
            nextconbk: 0,
            _reserved: [0; 2],
        }
    }

    /// Writes the control block into uncached DMA memory.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of a whole, 32-byte aligned control block.
    pub unsafe fn store(self, dst: *mut ControlBlock) {
        ptr::write_volatile(dst, self);
    }

    /// Rewrites only the source address of a stored control block.
    ///
    /// # Safety
    ///
    /// Same as [`store`](Self::store); the DMA engine must not be using it.
    pub unsafe fn update_source(dst: *mut ControlBlock, source: u32, len: u32) {
        ptr::write_volatile(ptr::addr_of_mut!((*dst).source_ad), source);
        ptr::write_volatile(ptr::addr_of_mut!((*dst).txfr_len), len);
    }
}

/// What the DMA channel is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelStatus {
    Idle,
    Active,
    Error { debug: u32 },
}

impl DmaChannel {
    pub fn status(&self) -> ChannelStatus {
        let cs = self.cs();
        if cs & CS_ERROR != 0 {
            ChannelStatus::Error {
                debug: self.debug(),
            }
        } else if cs & CS_ACTIVE != 0 {
            ChannelStatus::Active
        } else {
            ChannelStatus::Idle
        }
    }

    /// Aborts whatever the channel is doing and resets it.
    pub fn reset(&self) {
        self.set_cs(CS_RESET);
        super::settle();
        self.set_cs(CS_INT | CS_END);
        super::settle();
    }

    /// Starts processing the control block at bus address `control_block`.
    pub fn start(&self, control_block: u32) {
        self.reset();
        self.set_conblk_ad(control_block);
        self.set_debug(DEBUG_CLEAR_ERRORS);
        self.set_cs(
            CS_WAIT_OUTSTANDING_WRITES | cs_panic_priority(15) | cs_priority(15) | CS_ACTIVE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::registers::RegisterWindow;

    #[test]
    fn control_block_layout() {
        assert_eq!(core::mem::size_of::<ControlBlock>(), 32);
        assert_eq!(core::mem::align_of::<ControlBlock>(), 32);
    }

    #[test]
    fn channel_offsets() {
        assert_eq!(channel_offset(0), 0x7000);
        assert_eq!(channel_offset(10), 0x7a00);
        assert_eq!(channel_offset(14), 0x7e00);
    }

    #[test]
    fn lite_channels_have_short_transfers() {
        assert_eq!(max_transfer_len(0), 0x3fff_ffff);
        assert_eq!(max_transfer_len(6), 0x3fff_ffff);
        assert_eq!(max_transfer_len(7), 0xffff);
        assert_eq!(max_transfer_len(14), 0xffff);
    }

    #[test]
    fn status_decoding() {
        let channel = DmaChannel::new(RegisterWindow::anonymous(DmaChannel::SIZE, "dma"));
        assert_eq!(channel.status(), ChannelStatus::Idle);

        channel.set_cs(CS_ACTIVE);
        assert_eq!(channel.status(), ChannelStatus::Active);

        channel.set_cs(CS_ACTIVE | CS_ERROR);
        channel.set_debug(0x4);
        assert_eq!(channel.status(), ChannelStatus::Error { debug: 0x4 });
    }

    #[test]
    fn update_source_keeps_other_fields() {
        let mut block = ControlBlock::pcm_transmit(0x1000, 0x7e20_3004, 64);
        unsafe { ControlBlock::update_source(&mut block, 0x2000, 128) };
        assert_eq!(block.source_ad, 0x2000);
        assert_eq!(block.txfr_len, 128);
        assert_eq!(block.dest_ad, 0x7e20_3004);
        assert_eq!(block.ti & TI_SRC_INC, TI_SRC_INC);
    }
}
