use std::{fs::File, ptr};

use memmap2::{MmapOptions, MmapRaw};
use snafu::prelude::*;

use crate::errors::{InitError, MapSnafu};

pub(crate) fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// A bounds-checked window over a memory mapped register block.
///
/// The underlying mapping is page aligned; the window only exposes
/// `size` bytes starting at the physical address it was created for.
pub(crate) struct RegisterWindow {
    map: MmapRaw,
    offset: usize,
    size: usize,
    name: &'static str,
}

impl RegisterWindow {
    /// Maps `size` bytes of physical memory at `phys_addr` from `mem`.
    pub fn map(
        mem: &File,
        phys_addr: u64,
        size: usize,
        name: &'static str,
    ) -> Result<Self, InitError> {
        let page = page_size() as u64;
        let base = phys_addr & !(page - 1);
        let offset = (phys_addr - base) as usize;

        let map = MmapOptions::new()
            .offset(base)
            .len(offset + size)
            .map_raw(mem)
            .context(MapSnafu { what: name })?;

        log::debug!("Mapped {} at {:#x} ({} bytes)", name, phys_addr, size);

        Ok(Self {
            map,
            offset,
            size,
            name,
        })
    }

    #[cfg(test)]
    pub fn anonymous(size: usize, name: &'static str) -> Self {
        let map = MmapOptions::new().len(size).map_anon().unwrap();
        Self {
            map: map.into(),
            offset: 0,
            size,
            name,
        }
    }

    #[cfg(test)]
    pub fn register_ptr(&self, reg: usize) -> *mut u32 {
        self.register(reg)
    }

    fn register(&self, reg: usize) -> *mut u32 {
        assert!(
            reg % 4 == 0 && reg + 4 <= self.size,
            "register offset {:#x} outside of {} ({} bytes)",
            reg,
            self.name,
            self.size
        );
        // SAFETY: in bounds of the mapping, checked above.
        unsafe { self.map.as_mut_ptr().add(self.offset + reg).cast() }
    }

    pub fn read(&self, reg: usize) -> u32 {
        // SAFETY: `register` returns an aligned pointer into our mapping.
        unsafe { ptr::read_volatile(self.register(reg)) }
    }

    pub fn write(&self, reg: usize, value: u32) {
        // SAFETY: `register` returns an aligned pointer into our mapping.
        unsafe { ptr::write_volatile(self.register(reg), value) }
    }

    pub fn modify(&self, reg: usize, f: impl FnOnce(u32) -> u32) {
        self.write(reg, f(self.read(reg)));
    }
}

/// Declares a register block on top of a [`RegisterWindow`], with one
/// getter and one setter per register.
macro_rules! register_block {
    (
        $(#[$meta:meta])*
        $name:ident ($size:literal) {
            $($reg:ident: $offset:literal),+ $(,)?
        }
    ) => {
        paste::paste! {
            $(#[$meta])*
            pub(crate) struct $name($crate::hw::registers::RegisterWindow);

            #[allow(dead_code)]
            impl $name {
                pub const SIZE: usize = $size;

                pub fn new(window: $crate::hw::registers::RegisterWindow) -> Self {
                    Self(window)
                }

                #[cfg(test)]
                pub fn window(&self) -> &$crate::hw::registers::RegisterWindow {
                    &self.0
                }

                $(
                    pub fn $reg(&self) -> u32 {
                        self.0.read($offset)
                    }

                    pub fn [<set_ $reg>](&self, value: u32) {
                        self.0.write($offset, value)
                    }

                    pub fn [<modify_ $reg>](&self, f: impl FnOnce(u32) -> u32) {
                        self.0.modify($offset, f)
                    }
                )+
            }
        }
    };
}

pub(crate) use register_block;

#[cfg(test)]
mod tests {
    use super::*;

    register_block! {
        Dummy (8) {
            first: 0x0,
            second: 0x4,
        }
    }

    #[test]
    fn read_write_modify() {
        let dummy = Dummy::new(RegisterWindow::anonymous(Dummy::SIZE, "dummy"));
        dummy.set_first(0x1234);
        dummy.set_second(0xff00);
        dummy.modify_second(|v| v | 0xf);
        assert_eq!(dummy.first(), 0x1234);
        assert_eq!(dummy.second(), 0xff0f);
    }

    #[test]
    #[should_panic(expected = "outside of dummy")]
    fn out_of_bounds_access_panics() {
        let window = RegisterWindow::anonymous(8, "dummy");
        window.read(8);
    }

    #[test]
    #[should_panic]
    fn unaligned_access_panics() {
        let window = RegisterWindow::anonymous(8, "dummy");
        window.write(2, 0);
    }
}
