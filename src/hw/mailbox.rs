//! Physically contiguous, locked, uncached memory from the VideoCore.
//!
//! The DMA engine addresses memory by bus address and bypasses the MMU and
//! the CPU caches, so the control block and the sample buffer have to live
//! in memory the VideoCore allocated and locked for us.

use std::{
    fs::{File, OpenOptions},
    os::{fd::AsRawFd, unix::fs::OpenOptionsExt},
};

use libc::{c_char, c_ulong};
use memmap2::{MmapOptions, MmapRaw};
use snafu::prelude::*;

use super::Soc;
use crate::errors::{
    InitError, InvalidConfigSnafu, MailboxSnafu, MapSnafu, PermissionDeniedSnafu,
};

const VCIO: &str = "/dev/vcio";
pub(crate) const DEV_MEM: &str = "/dev/mem";

const IOCTL_MBOX_PROPERTY: c_ulong = libc::_IOWR::<*mut c_char>(100, 0);

const PROCESS_REQUEST: u32 = 0x0000_0000;
const REQUEST_SUCCESSFUL: u32 = 0x8000_0000;

const TAG_MEM_ALLOC: u32 = 0x0003_000c;
const TAG_MEM_LOCK: u32 = 0x0003_000d;
const TAG_MEM_UNLOCK: u32 = 0x0003_000e;
const TAG_MEM_FREE: u32 = 0x0003_000f;

/// Coherent, non-allocating in L1/L2.
const MEM_FLAG_L1_NONALLOCATING: u32 = 0xc;
/// Uncached alias.
const MEM_FLAG_DIRECT: u32 = 0x4;

/// Strips the bus alias from a VideoCore bus address.
pub(crate) const fn bus_to_phys(bus_addr: u32) -> u32 {
    bus_addr & !0xc000_0000
}

/// Opens a device file read/write; failures are reported as missing privileges.
pub(crate) fn open_device(path: &str, sync: bool) -> Result<File, InitError> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    if sync {
        options.custom_flags(libc::O_SYNC);
    }
    options
        .open(path)
        .context(PermissionDeniedSnafu { path })
}

struct Mailbox {
    file: File,
}

impl Mailbox {
    fn open() -> Result<Self, InitError> {
        Ok(Self {
            file: open_device(VCIO, false)?,
        })
    }

    /// Sends a single-tag property request; returns the first response word.
    fn property(&self, tag: u32, args: &[u32]) -> Option<u32> {
        let value_words = args.len().max(1);

        let mut buffer = [0u32; 16];
        buffer[0] = ((value_words + 6) * 4) as u32;
        buffer[1] = PROCESS_REQUEST;
        buffer[2] = tag;
        buffer[3] = (value_words * 4) as u32;
        buffer[4] = (args.len() * 4) as u32;
        buffer[5..5 + args.len()].copy_from_slice(args);
        buffer[5 + value_words] = 0;

        // SAFETY: The buffer is a complete property message, and large enough
        // for the response, which is written back in place.
        let result = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                IOCTL_MBOX_PROPERTY,
                buffer.as_mut_ptr(),
            )
        };

        if result < 0 || buffer[1] != REQUEST_SUCCESSFUL {
            log::warn!(
                "Mailbox request {:#x} failed (ioctl {}, status {:#x})",
                tag,
                result,
                buffer[1]
            );
            return None;
        }

        Some(buffer[5])
    }

    fn mem_alloc(&self, size: u32, align: u32, flags: u32) -> Option<u32> {
        self.property(TAG_MEM_ALLOC, &[size, align, flags])
            .filter(|&handle| handle != 0)
    }

    fn mem_lock(&self, handle: u32) -> Option<u32> {
        self.property(TAG_MEM_LOCK, &[handle])
            .filter(|&bus_addr| bus_addr != !0)
    }

    fn mem_unlock(&self, handle: u32) -> Option<u32> {
        self.property(TAG_MEM_UNLOCK, &[handle])
    }

    fn mem_free(&self, handle: u32) -> Option<u32> {
        self.property(TAG_MEM_FREE, &[handle])
    }
}

/// A locked VideoCore allocation, mapped into our address space.
///
/// Unmapped, unlocked and freed on drop.
pub(crate) struct DmaMemory {
    map: Option<MmapRaw>,
    mailbox: Mailbox,
    handle: u32,
    locked: bool,
    bus_addr: u32,
    size: usize,
}

impl DmaMemory {
    pub fn allocate(soc: Soc, size: usize) -> Result<Self, InitError> {
        let page = super::registers::page_size();
        let size = size.div_ceil(page) * page;

        let flags = if soc.videocore_base() == 0x4000_0000 {
            MEM_FLAG_L1_NONALLOCATING
        } else {
            MEM_FLAG_DIRECT
        };

        let (Ok(request), Ok(align)) = (u32::try_from(size), u32::try_from(page)) else {
            return InvalidConfigSnafu {
                reason: "DMA memory exceeds the VideoCore address space",
            }
            .fail();
        };

        let mailbox = Mailbox::open()?;
        let handle = mailbox
            .mem_alloc(request, align, flags)
            .context(MailboxSnafu {
                what: "allocate DMA memory",
            })?;

        let mut memory = Self {
            map: None,
            mailbox,
            handle,
            locked: false,
            bus_addr: 0,
            size,
        };

        memory.bus_addr = memory
            .mailbox
            .mem_lock(handle)
            .context(MailboxSnafu {
                what: "lock DMA memory",
            })?;
        memory.locked = true;

        let mem = open_device(DEV_MEM, true)?;
        let map = MmapOptions::new()
            .offset(u64::from(bus_to_phys(memory.bus_addr)))
            .len(size)
            .map_raw(&mem)
            .context(MapSnafu { what: "DMA memory" })?;
        memory.map = Some(map);

        log::debug!(
            "Allocated {} bytes of DMA memory at bus address {:#010x}",
            size,
            memory.bus_addr
        );

        Ok(memory)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bus address of the byte at `offset`, as seen by the DMA engine.
    pub fn bus_address(&self, offset: usize) -> u32 {
        assert!(offset < self.size);
        self.bus_addr + offset as u32
    }

    /// Pointer to the byte at `offset`.
    pub fn ptr(&self, offset: usize) -> *mut u8 {
        assert!(offset < self.size);
        match &self.map {
            // SAFETY: in bounds, checked above.
            Some(map) => unsafe { map.as_mut_ptr().add(offset) },
            None => unreachable!("DMA memory is always mapped after allocation"),
        }
    }
}

impl Drop for DmaMemory {
    fn drop(&mut self) {
        self.map = None;
        if self.locked {
            self.mailbox.mem_unlock(self.handle);
        }
        self.mailbox.mem_free(self.handle);
        log::debug!("Released DMA memory at bus address {:#010x}", self.bus_addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_alias_is_stripped() {
        assert_eq!(bus_to_phys(0xc0ab_c000), 0x00ab_c000);
        assert_eq!(bus_to_phys(0x4012_3000), 0x0012_3000);
        assert_eq!(bus_to_phys(0x0012_3000), 0x0012_3000);
    }

    #[test]
    fn missing_device_is_a_permission_error() {
        let err = open_device("/nonexistent/vcio", false).unwrap_err();
        assert!(matches!(err, InitError::PermissionDenied { .. }));
    }
}
