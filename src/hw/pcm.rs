use super::registers::register_block;

/// Offset of the PCM block from the peripheral base.
pub(crate) const PCM_OFFSET: u64 = 0x0020_3000;
/// Bus address of the PCM block, as used by the DMA engine.
pub(crate) const PCM_PERIPH_BUS: u32 = 0x7e20_3000;

register_block! {
    /// PCM / I2S audio interface.
    Pcm (0x24) {
        cs: 0x00,
        fifo: 0x04,
        mode: 0x08,
        rxc: 0x0c,
        txc: 0x10,
        dreq: 0x14,
        inten: 0x18,
        intstc: 0x1c,
        gray: 0x20,
    }
}

pub(crate) const CS_EN: u32 = 1 << 0;
pub(crate) const CS_TXON: u32 = 1 << 2;
pub(crate) const CS_TXCLR: u32 = 1 << 3;
pub(crate) const CS_DMAEN: u32 = 1 << 9;
pub(crate) const CS_TXERR: u32 = 1 << 15;
pub(crate) const CS_TXE: u32 = 1 << 21;

pub(crate) const fn mode_fslen(x: u32) -> u32 {
    x & 0x3ff
}
pub(crate) const fn mode_flen(x: u32) -> u32 {
    (x & 0x3ff) << 10
}

pub(crate) const fn txc_ch1wid(x: u32) -> u32 {
    (x & 0xf) << 16
}
pub(crate) const fn txc_ch1pos(x: u32) -> u32 {
    (x & 0x3ff) << 20
}
pub(crate) const TXC_CH1EN: u32 = 1 << 30;
pub(crate) const TXC_CH1WEX: u32 = 1 << 31;

pub(crate) const fn dreq_tx(x: u32) -> u32 {
    (x & 0x7f) << 8
}
pub(crate) const fn dreq_tx_panic(x: u32) -> u32 {
    (x & 0x7f) << 24
}

impl Pcm {
    /// Bus address of the transmit FIFO.
    pub fn fifo_bus_address() -> u32 {
        PCM_PERIPH_BUS + 0x04
    }

    /// Enables the interface with a single 32-bit channel in a 32-bit frame,
    /// fed by DMA.
    ///
    /// The block is rumored to lock up without the delays.
    pub fn configure_transmitter(&self) {
        self.set_cs(CS_EN);
        self.set_mode(mode_flen(31) | mode_fslen(1));
        // Channel width 8 + 16 (WEX) + 8 = 32 bits
        self.set_txc(TXC_CH1WEX | TXC_CH1EN | txc_ch1pos(0) | txc_ch1wid(8));
        self.modify_cs(|cs| cs | CS_TXCLR);
        super::settle();
        self.modify_cs(|cs| cs | CS_DMAEN);
        self.set_dreq(dreq_tx(0x3f) | dreq_tx_panic(0x10));
    }

    pub fn start_transmitter(&self) {
        // Clear a stale underrun from the previous frame.
        self.modify_cs(|cs| cs | CS_TXERR | CS_TXON);
    }

    pub fn stop(&self) {
        self.set_cs(0);
        super::settle();
    }

    pub fn fifo_empty(&self) -> bool {
        self.cs() & CS_TXE != 0
    }
}
