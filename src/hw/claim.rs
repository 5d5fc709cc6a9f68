use core::cell::Cell;

use critical_section::Mutex;

use crate::errors::InitError;

static CLAIMED: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Exclusive ownership of the PCM peripheral within this process.
///
/// Released on drop.
#[derive(Debug)]
pub(crate) struct HardwareClaim {
    _private: (),
}

impl HardwareClaim {
    pub fn acquire() -> Result<Self, InitError> {
        critical_section::with(|cs| {
            let claimed = CLAIMED.borrow(cs);
            if claimed.replace(true) {
                Err(InitError::AlreadyInUse)
            } else {
                Ok(Self { _private: () })
            }
        })
    }
}

impl Drop for HardwareClaim {
    fn drop(&mut self) {
        critical_section::with(|cs| CLAIMED.borrow(cs).set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused() {
        let claim = HardwareClaim::acquire().unwrap();
        assert!(matches!(
            HardwareClaim::acquire(),
            Err(InitError::AlreadyInUse)
        ));
        drop(claim);
        let _claim = HardwareClaim::acquire().unwrap();
    }
}
