//! C-callable interface.
//!
//! A channel is handed out as an opaque `ws281x_t` pointer. Every function
//! returns a [`Ws281xReturn`] code; `0` is success, errors are negative.
//!
//! Strip types use the byte layout of the classic `rpi_ws281x` library: for
//! every wire position, the bit shift of the source byte in the `0xWWRRGGBB`
//! color.

use std::{
    ffi::{c_char, c_int},
    ptr,
    time::Duration,
};

use crate::{
    errors::{Error, InitError},
    Channel, ChannelConfig, ColorOrder, StripType, SymbolTiming,
};

/// Red, green, blue.
pub const WS281X_STRIP_RGB: u32 = 0x0010_0800;
/// Red, blue, green.
pub const WS281X_STRIP_RBG: u32 = 0x0010_0008;
/// Green, red, blue.
pub const WS281X_STRIP_GRB: u32 = 0x0008_1000;
/// Green, blue, red.
pub const WS281X_STRIP_GBR: u32 = 0x0008_0010;
/// Blue, red, green.
pub const WS281X_STRIP_BRG: u32 = 0x0000_1008;
/// Blue, green, red.
pub const WS281X_STRIP_BGR: u32 = 0x0000_0810;
/// Or-ed into a strip type for strips with a white channel.
pub const WS281X_STRIP_WHITE: u32 = 0x1800_0000;

/// Opaque channel handle, `ws281x_t` on the C side.
pub struct Ws281x {
    channel: Channel,
}

/// Channel configuration, `ws281x_config_t` on the C side.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ws281xConfig {
    /// Data pin, 21 or 31.
    pub gpio_pin: c_int,
    /// Number of LEDs.
    pub led_count: c_int,
    /// One of the `WS281X_STRIP_*` values; `0` means RGB.
    pub strip_type: u32,
    /// Initial brightness.
    pub brightness: u8,
    /// Non-zero to invert the output.
    pub invert: c_int,
    /// DMA channel, 0 to 14.
    pub dma_channel: c_int,
    /// Bit rate in Hz, 800000 or 400000. `0` means 800000.
    pub freq: u32,
}

/// Result codes, `ws281x_return_t` on the C side.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ws281xReturn {
    /// Success.
    Success = 0,
    /// A pointer was null or a parameter out of range.
    InvalidArgument = -1,
    /// A device file could not be opened.
    PermissionDenied = -2,
    /// Peripheral or DMA memory could not be mapped.
    Map = -3,
    /// The board is not supported.
    UnsupportedBoard = -4,
    /// A VideoCore mailbox request failed.
    Mailbox = -5,
    /// The PCM peripheral is already in use.
    InUse = -6,
    /// Pixel index out of range.
    IndexOutOfRange = -7,
    /// A frame is still in flight.
    Busy = -8,
    /// Waiting timed out.
    Timeout = -9,
    /// The DMA controller reported an error.
    Dma = -10,
    /// The channel was closed.
    Closed = -11,
}

impl Ws281xReturn {
    const ALL: [Self; 12] = [
        Self::Success,
        Self::InvalidArgument,
        Self::PermissionDenied,
        Self::Map,
        Self::UnsupportedBoard,
        Self::Mailbox,
        Self::InUse,
        Self::IndexOutOfRange,
        Self::Busy,
        Self::Timeout,
        Self::Dma,
        Self::Closed,
    ];

    /// The result code with the numeric value `code`, if there is one.
    pub fn from_code(code: c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|&ret| ret as c_int == code)
    }
}

impl From<&InitError> for Ws281xReturn {
    fn from(err: &InitError) -> Self {
        match err {
            InitError::PermissionDenied { .. } => Self::PermissionDenied,
            InitError::Map { .. } => Self::Map,
            InitError::BoardDetection { .. } | InitError::UnsupportedBoard { .. } => {
                Self::UnsupportedBoard
            }
            InitError::UnsupportedPin { .. }
            | InitError::UnsupportedDmaChannel { .. }
            | InitError::InvalidConfig { .. } => Self::InvalidArgument,
            InitError::Mailbox { .. } => Self::Mailbox,
            InitError::AlreadyInUse => Self::InUse,
        }
    }
}

impl From<&Error> for Ws281xReturn {
    fn from(err: &Error) -> Self {
        match err {
            Error::IndexOutOfRange { .. } => Self::IndexOutOfRange,
            Error::FrameTooLong { .. } => Self::InvalidArgument,
            Error::Busy => Self::Busy,
            Error::Timeout { .. } => Self::Timeout,
            Error::Dma { .. } => Self::Dma,
            Error::Closed => Self::Closed,
        }
    }
}

impl<E> From<Result<(), E>> for Ws281xReturn
where
    for<'a> Ws281xReturn: From<&'a E>,
{
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => Self::from(&err),
        }
    }
}

/// Decodes a `WS281X_STRIP_*` value.
pub fn strip_type_from_code(code: u32) -> Option<StripType> {
    let white = match code & 0xff00_0000 {
        0 => false,
        WS281X_STRIP_WHITE => true,
        _ => return None,
    };
    let order = match code & 0x00ff_ffff {
        0 | WS281X_STRIP_RGB => ColorOrder::Rgb,
        WS281X_STRIP_RBG => ColorOrder::Rbg,
        WS281X_STRIP_GRB => ColorOrder::Grb,
        WS281X_STRIP_GBR => ColorOrder::Gbr,
        WS281X_STRIP_BRG => ColorOrder::Brg,
        WS281X_STRIP_BGR => ColorOrder::Bgr,
        _ => return None,
    };
    Some(StripType { order, white })
}

impl Ws281xConfig {
    fn to_config(self) -> Option<Result<ChannelConfig, InitError>> {
        let gpio_pin = u8::try_from(self.gpio_pin).ok()?;
        let led_count = usize::try_from(self.led_count).ok()?;
        let dma_channel = u8::try_from(self.dma_channel).ok()?;
        let strip = strip_type_from_code(self.strip_type)?;
        let timing = match self.freq {
            0 | 800_000 => SymbolTiming::WS2812,
            400_000 => SymbolTiming::WS2811_400KHZ,
            _ => return None,
        };

        Some(
            ChannelConfig::builder(led_count)
                .gpio_pin(gpio_pin)
                .strip(strip)
                .brightness(self.brightness)
                .invert(self.invert != 0)
                .dma_channel(dma_channel)
                .timing(timing)
                .build(),
        )
    }
}

/// A configuration with the library defaults and `led_count` LEDs.
#[no_mangle]
pub extern "C" fn ws281x_default_config(led_count: c_int) -> Ws281xConfig {
    Ws281xConfig {
        gpio_pin: c_int::from(crate::config::DEFAULT_GPIO_PIN),
        led_count,
        strip_type: WS281X_STRIP_GRB,
        brightness: 255,
        invert: 0,
        dma_channel: c_int::from(crate::config::DEFAULT_DMA_CHANNEL),
        freq: 800_000,
    }
}

/// Initializes the hardware and stores a new handle in `out`.
///
/// # Safety
///
/// `config` must be null or point to a valid config; `out` must be null or
/// valid for writes.
#[no_mangle]
pub unsafe extern "C" fn ws281x_init(
    config: *const Ws281xConfig,
    out: *mut *mut Ws281x,
) -> Ws281xReturn {
    let (Some(config), false) = (config.as_ref(), out.is_null()) else {
        return Ws281xReturn::InvalidArgument;
    };
    *out = ptr::null_mut();

    let Some(config) = config.to_config() else {
        return Ws281xReturn::InvalidArgument;
    };
    match config.and_then(Channel::init) {
        Ok(channel) => {
            *out = Box::into_raw(Box::new(Ws281x { channel }));
            Ws281xReturn::Success
        }
        Err(err) => {
            log::error!("Initialization failed: {}", err);
            Ws281xReturn::from(&err)
        }
    }
}

/// Sets the color (`0xWWRRGGBB`) of one LED.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`].
#[no_mangle]
pub unsafe extern "C" fn ws281x_set_pixel(
    handle: *mut Ws281x,
    index: u32,
    color: u32,
) -> Ws281xReturn {
    let Some(handle) = handle.as_mut() else {
        return Ws281xReturn::InvalidArgument;
    };
    handle.channel.set_pixel(index as usize, color).into()
}

/// Reads back the color of one LED into `color`.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`]; `color`
/// must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn ws281x_get_pixel(
    handle: *const Ws281x,
    index: u32,
    color: *mut u32,
) -> Ws281xReturn {
    let (Some(handle), false) = (handle.as_ref(), color.is_null()) else {
        return Ws281xReturn::InvalidArgument;
    };
    match handle.channel.get_pixel(index as usize) {
        Ok(value) => {
            *color = value.0;
            Ws281xReturn::Success
        }
        Err(err) => Ws281xReturn::from(&err),
    }
}

/// Sets the brightness applied at the next render.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`].
#[no_mangle]
pub unsafe extern "C" fn ws281x_set_brightness(
    handle: *mut Ws281x,
    brightness: u8,
) -> Ws281xReturn {
    let Some(handle) = handle.as_mut() else {
        return Ws281xReturn::InvalidArgument;
    };
    handle.channel.set_brightness(brightness);
    Ws281xReturn::Success
}

/// Starts transmitting the pixel buffer.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`].
#[no_mangle]
pub unsafe extern "C" fn ws281x_render(handle: *mut Ws281x) -> Ws281xReturn {
    let Some(handle) = handle.as_mut() else {
        return Ws281xReturn::InvalidArgument;
    };
    handle.channel.render().into()
}

/// Waits for the current frame; a negative `timeout_us` waits forever.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`].
#[no_mangle]
pub unsafe extern "C" fn ws281x_wait(handle: *const Ws281x, timeout_us: i64) -> Ws281xReturn {
    let Some(handle) = handle.as_ref() else {
        return Ws281xReturn::InvalidArgument;
    };
    let timeout = u64::try_from(timeout_us).ok().map(Duration::from_micros);
    handle.channel.wait(timeout).into()
}

/// Stops the output and releases the hardware. The handle stays valid.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`].
#[no_mangle]
pub unsafe extern "C" fn ws281x_close(handle: *mut Ws281x) -> Ws281xReturn {
    let Some(handle) = handle.as_mut() else {
        return Ws281xReturn::InvalidArgument;
    };
    handle.channel.close();
    Ws281xReturn::Success
}

/// Closes the channel if needed and frees the handle. Null is ignored.
///
/// # Safety
///
/// `handle` must be null or a handle returned by [`ws281x_init`] that was
/// not freed before.
#[no_mangle]
pub unsafe extern "C" fn ws281x_free(handle: *mut Ws281x) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// A static, human readable description of a result code.
///
/// Takes a plain `int`, so values that are no result code are answered
/// with "Unknown error".
#[no_mangle]
pub extern "C" fn ws281x_strerror(code: c_int) -> *const c_char {
    let Some(code) = Ws281xReturn::from_code(code) else {
        return b"Unknown error\0".as_ptr().cast();
    };
    let message: &'static [u8] = match code {
        Ws281xReturn::Success => b"Success\0",
        Ws281xReturn::InvalidArgument => b"Invalid argument\0",
        Ws281xReturn::PermissionDenied => b"Unable to open device file, try running as root\0",
        Ws281xReturn::Map => b"Unable to map memory\0",
        Ws281xReturn::UnsupportedBoard => b"Hardware revision is not supported\0",
        Ws281xReturn::Mailbox => b"Mailbox request failed\0",
        Ws281xReturn::InUse => b"PCM peripheral already in use\0",
        Ws281xReturn::IndexOutOfRange => b"Pixel index out of range\0",
        Ws281xReturn::Busy => b"Previous frame still in flight\0",
        Ws281xReturn::Timeout => b"Timed out\0",
        Ws281xReturn::Dma => b"DMA error\0",
        Ws281xReturn::Closed => b"Channel closed\0",
    };
    message.as_ptr().cast()
}
