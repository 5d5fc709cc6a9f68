//! An in-memory stand-in for the PCM hardware.
//!
//! [`SimulatedBackend`] records every frame it is asked to transmit. It can
//! either emulate the time a frame takes on the wire, or leave completion to
//! the test through its [`SimulatedHandle`].

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    encoder::Bitstream,
    engine::{Backend, TransferState},
    errors::Error,
    SymbolTiming,
};

#[derive(Debug)]
enum Completion {
    /// Done after the time the frame needs on the wire.
    Timed { sample_rate_hz: u32 },
    /// Done when [`SimulatedHandle::finish`] is called.
    Manual,
}

#[derive(Debug, Default)]
struct SimState {
    loaded: Vec<u8>,
    frames: Vec<Vec<u8>>,
    active_until: Option<Instant>,
    manual_active: bool,
    failed: Option<u32>,
    overlapping_loads: usize,
    shutdown_count: usize,
}

/// A [`Backend`] that transmits into memory.
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    completion: Completion,
}

/// Inspects and controls a [`SimulatedBackend`] from the outside.
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedBackend {
    /// A backend whose transfers take as long as they would on real LEDs.
    pub fn new(timing: SymbolTiming) -> (Self, SimulatedHandle) {
        Self::with_completion(Completion::Timed {
            sample_rate_hz: timing.sample_rate_hz(),
        })
    }

    /// A backend whose transfers only complete through [`SimulatedHandle::finish`].
    pub fn manual() -> (Self, SimulatedHandle) {
        Self::with_completion(Completion::Manual)
    }

    fn with_completion(completion: Completion) -> (Self, SimulatedHandle) {
        let state = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: state.clone(),
                completion,
            },
            SimulatedHandle { state },
        )
    }

    fn is_active(&self, state: &SimState) -> bool {
        match self.completion {
            Completion::Timed { .. } => state
                .active_until
                .is_some_and(|until| Instant::now() < until),
            Completion::Manual => state.manual_active,
        }
    }
}

impl Backend for SimulatedBackend {
    fn load(&mut self, frame: &Bitstream) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.shutdown_count > 0 {
            return Err(Error::Closed);
        }
        if self.is_active(&state) {
            state.overlapping_loads += 1;
        }
        state.loaded.clear();
        state.loaded.extend_from_slice(frame.as_bytes());
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.shutdown_count > 0 {
            return Err(Error::Closed);
        }

        let frame = state.loaded.clone();
        match self.completion {
            Completion::Timed { sample_rate_hz } => {
                let nanos = frame.len() as u64 * 8 * 1_000_000_000 / u64::from(sample_rate_hz);
                state.active_until = Some(Instant::now() + Duration::from_nanos(nanos));
            }
            Completion::Manual => state.manual_active = true,
        }
        state.failed = None;
        state.frames.push(frame);
        Ok(())
    }

    fn state(&self) -> TransferState {
        let state = lock(&self.state);
        if let Some(debug) = state.failed {
            TransferState::Failed { debug }
        } else if self.is_active(&state) {
            TransferState::Active
        } else {
            TransferState::Idle
        }
    }

    fn shutdown(&mut self) {
        let mut state = lock(&self.state);
        state.manual_active = false;
        state.active_until = None;
        state.shutdown_count += 1;
    }
}

impl SimulatedHandle {
    /// Completes the transfer in flight.
    pub fn finish(&self) {
        let mut state = lock(&self.state);
        state.manual_active = false;
        state.active_until = None;
    }

    /// Aborts the transfer in flight with a DMA error.
    pub fn fail(&self, debug: u32) {
        let mut state = lock(&self.state);
        state.manual_active = false;
        state.failed = Some(debug);
    }

    /// All frames started so far, oldest first.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        lock(&self.state).frames.clone()
    }

    /// The most recently started frame.
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        lock(&self.state).frames.last().cloned()
    }

    /// Number of frames started so far.
    pub fn frame_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    /// How often a frame was loaded while another one was still on the wire.
    pub fn overlapping_loads(&self) -> usize {
        lock(&self.state).overlapping_loads
    }

    /// How often the backend was shut down.
    pub fn shutdown_count(&self) -> usize {
        lock(&self.state).shutdown_count
    }
}
