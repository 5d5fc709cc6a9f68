use super::registers::RegisterWindow;

/// Offset of the GPIO block from the peripheral base.
pub(crate) const GPIO_OFFSET: u64 = 0x0020_0000;
/// Only the function select registers are used.
pub(crate) const GPIO_SIZE: usize = 0x18;

/// GPIO alternate functions, in the order the datasheet numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AltFunction {
    Alt0,
    Alt2,
}

impl AltFunction {
    const fn fsel_bits(self) -> u32 {
        match self {
            AltFunction::Alt0 => 0b100,
            AltFunction::Alt2 => 0b110,
        }
    }
}

/// The alternate function that routes PCM_DOUT to `pin`, if any.
pub(crate) const fn pcm_dout_function(pin: u8) -> Option<AltFunction> {
    match pin {
        21 => Some(AltFunction::Alt0),
        31 => Some(AltFunction::Alt2),
        _ => None,
    }
}

pub(crate) struct Gpio(RegisterWindow);

impl Gpio {
    pub fn new(window: RegisterWindow) -> Self {
        Self(window)
    }

    pub fn set_function(&self, pin: u8, function: AltFunction) {
        let reg = usize::from(pin / 10) * 4;
        let shift = u32::from(pin % 10) * 3;
        self.0
            .modify(reg, |fsel| (fsel & !(0b111 << shift)) | (function.fsel_bits() << shift));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pcm_dout_pins_are_supported() {
        assert_eq!(pcm_dout_function(21), Some(AltFunction::Alt0));
        assert_eq!(pcm_dout_function(31), Some(AltFunction::Alt2));
        assert_eq!(pcm_dout_function(18), None);
        assert_eq!(pcm_dout_function(10), None);
    }

    #[test]
    fn function_select_bits() {
        let gpio = Gpio::new(RegisterWindow::anonymous(GPIO_SIZE, "gpio"));
        gpio.0.write(0x08, 0xffff_ffff);
        gpio.set_function(21, AltFunction::Alt0);
        // GPIO 21 lives in GPFSEL2, bits 3..5
        assert_eq!(gpio.0.read(0x08), 0xffff_ffe7);

        gpio.set_function(31, AltFunction::Alt2);
        // GPIO 31 lives in GPFSEL3, bits 3..5
        assert_eq!(gpio.0.read(0x0c), 0b110 << 3);
    }
}
