use std::time::{Duration, Instant};

use super::registers::register_block;

/// Offset of the PCM clock manager registers from the peripheral base.
pub(crate) const CM_PCM_OFFSET: u64 = 0x0010_1098;

register_block! {
    /// Clock manager of the PCM peripheral.
    CmPcm (0x08) {
        ctl: 0x00,
        div: 0x04,
    }
}

const PASSWD: u32 = 0x5a << 24;

const CTL_SRC_OSC: u32 = 1;
const CTL_ENAB: u32 = 1 << 4;
const CTL_KILL: u32 = 1 << 5;
const CTL_BUSY: u32 = 1 << 7;

const fn div_divi(x: u32) -> u32 {
    (x & 0xfff) << 12
}

/// Largest integer divisor the clock manager accepts.
pub(crate) const MAX_DIVISOR: u32 = 0xfff;

/// Upper bound for the clock manager to react; it takes a few cycles at most.
const BUSY_TIMEOUT: Duration = Duration::from_millis(10);

impl CmPcm {
    /// Stops the PCM clock.
    pub fn kill(&self) {
        self.set_ctl(PASSWD | CTL_KILL);
        super::settle();
        self.wait_busy(false);
    }

    /// Runs the PCM clock from the oscillator with an integer divisor.
    pub fn start(&self, divisor: u32) {
        self.set_div(PASSWD | div_divi(divisor));
        self.set_ctl(PASSWD | CTL_SRC_OSC);
        self.set_ctl(PASSWD | CTL_SRC_OSC | CTL_ENAB);
        super::settle();
        self.wait_busy(true);
    }

    fn wait_busy(&self, busy: bool) {
        let start = Instant::now();
        while (self.ctl() & CTL_BUSY != 0) != busy {
            if start.elapsed() > BUSY_TIMEOUT {
                log::warn!("PCM clock did not become {}", if busy { "busy" } else { "idle" });
                return;
            }
            std::hint::spin_loop();
        }
    }
}
