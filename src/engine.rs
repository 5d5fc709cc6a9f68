//! Transmission of encoded frames.
//!
//! The [`TransmissionEngine`] owns a [`Backend`] and enforces the frame
//! protocol on top of it: a frame is only loaded once the previous one left
//! the wire, and the backend is always shut down exactly once.

use std::{
    thread,
    time::{Duration, Instant},
};

use snafu::prelude::*;

use crate::{
    encoder::Bitstream,
    errors::{BusySnafu, ClosedSnafu, DmaSnafu, Error, TimeoutSnafu},
};

/// Longest time [`TransmissionEngine::wait`] sleeps between two status polls.
pub const POLL_INTERVAL: Duration = Duration::from_micros(50);

/// State of the most recently started transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing on the wire; a new frame may be loaded.
    Idle,
    /// A frame is still being transmitted.
    Active,
    /// The transfer was aborted by the hardware.
    Failed {
        /// Content of the DMA debug register.
        debug: u32,
    },
}

/// What [`render`](crate::Channel::render) does while a frame is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Wait until the previous frame is done.
    #[default]
    Block,
    /// Fail with [`Error::Busy`].
    Fail,
}

/// Something that can put a [`Bitstream`] on the wire.
///
/// The engine guarantees that [`load`](Backend::load) is never called while
/// a transfer is [`Active`](TransferState::Active), and that
/// [`shutdown`](Backend::shutdown) is the last call the backend receives.
pub trait Backend {
    /// Copies a frame into transfer memory.
    fn load(&mut self, frame: &Bitstream) -> Result<(), Error>;

    /// Starts transmitting the loaded frame and returns immediately.
    fn start(&mut self) -> Result<(), Error>;

    /// Polls the transfer state without side effects.
    fn state(&self) -> TransferState;

    /// Stops all activity and releases the hardware.
    ///
    /// Must stop any in-flight transfer before releasing memory the
    /// transfer reads from.
    fn shutdown(&mut self);
}

/// Drives a [`Backend`] frame by frame.
pub struct TransmissionEngine<B: Backend> {
    backend: Option<B>,
    policy: WaitPolicy,
}

impl<B: Backend> TransmissionEngine<B> {
    /// Creates an engine around an initialized backend.
    pub fn new(backend: B, policy: WaitPolicy) -> Self {
        Self {
            backend: Some(backend),
            policy,
        }
    }

    /// The backend, unless the engine was closed.
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Starts transmitting `frame`.
    ///
    /// A frame in flight is never interrupted: depending on the
    /// [`WaitPolicy`] this either waits for it or fails with [`Error::Busy`].
    pub fn render(&mut self, frame: &Bitstream) -> Result<(), Error> {
        let state = self.backend.as_ref().context(ClosedSnafu)?.state();
        match state {
            TransferState::Idle => {}
            TransferState::Active => match self.policy {
                WaitPolicy::Fail => return BusySnafu.fail(),
                WaitPolicy::Block => self.wait(None)?,
            },
            TransferState::Failed { debug } => {
                // Starting a new transfer resets the channel.
                log::error!("Previous transfer failed, DMA debug: {:#010x}", debug);
            }
        }

        let backend = self.backend.as_mut().context(ClosedSnafu)?;
        log::trace!("Starting transfer of {} bytes", frame.len());
        backend.load(frame)?;
        backend.start()
    }

    /// Whether a frame is currently being transmitted.
    pub fn is_busy(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.state() == TransferState::Active)
    }

    /// Blocks until the current frame is done.
    ///
    /// Polls at least every [`POLL_INTERVAL`]. `None` waits forever, and so
    /// does a timeout too large to be represented as a point in time.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), Error> {
        let backend = self.backend.as_ref().context(ClosedSnafu)?;
        let deadline = timeout.and_then(|timeout| {
            Instant::now()
                .checked_add(timeout)
                .map(|deadline| (deadline, timeout))
        });

        loop {
            match backend.state() {
                TransferState::Idle => return Ok(()),
                TransferState::Failed { debug } => return DmaSnafu { debug }.fail(),
                TransferState::Active => {}
            }

            let sleep = match deadline {
                Some((deadline, timeout)) => {
                    let now = Instant::now();
                    ensure!(now < deadline, TimeoutSnafu { timeout });
                    (deadline - now).min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            thread::sleep(sleep);
        }
    }

    /// Shuts the backend down. Does nothing if already closed.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.shutdown();
        }
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }
}

impl<B: Backend> Drop for TransmissionEngine<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedBackend;

    fn frame(byte: u8) -> Bitstream {
        let encoder = crate::Encoder::new(
            crate::StripType::WS2812,
            crate::SymbolTiming::WS2812,
            crate::Gamma::Linear,
            false,
        );
        let mut out = Bitstream::new();
        encoder.encode(&[crate::Color::rgb(byte, byte, byte)], 255, &mut out);
        out
    }

    #[test]
    fn fail_policy_reports_busy() {
        let (backend, handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Fail);

        engine.render(&frame(1)).unwrap();
        assert!(engine.is_busy());
        assert_eq!(engine.render(&frame(2)), Err(Error::Busy));
        assert_eq!(handle.frame_count(), 1);

        handle.finish();
        assert!(!engine.is_busy());
        engine.render(&frame(2)).unwrap();
        assert_eq!(handle.frame_count(), 2);
        assert_eq!(handle.overlapping_loads(), 0);
    }

    #[test]
    fn block_policy_waits_for_previous_frame() {
        let (backend, handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Block);
        engine.render(&frame(1)).unwrap();

        let finisher = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                handle.finish();
            })
        };

        engine.render(&frame(2)).unwrap();
        finisher.join().unwrap();

        assert_eq!(handle.frame_count(), 2);
        assert_eq!(handle.overlapping_loads(), 0);
    }

    #[test]
    fn wait_times_out() {
        let (backend, _handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Fail);
        engine.render(&frame(1)).unwrap();

        let timeout = Duration::from_millis(5);
        assert_eq!(engine.wait(Some(timeout)), Err(Error::Timeout { timeout }));
    }

    #[test]
    fn huge_timeout_waits_until_done() {
        let (backend, handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Fail);
        engine.render(&frame(1)).unwrap();

        let finisher = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                handle.finish();
            })
        };

        engine.wait(Some(Duration::MAX)).unwrap();
        finisher.join().unwrap();
        assert!(!engine.is_busy());
    }

    #[test]
    fn wait_reports_dma_errors() {
        let (backend, handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Fail);
        engine.render(&frame(1)).unwrap();
        handle.fail(0x2);

        assert_eq!(engine.wait(None), Err(Error::Dma { debug: 0x2 }));
        // A new frame recovers from the error.
        engine.render(&frame(1)).unwrap();
        handle.finish();
        engine.wait(None).unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let (backend, handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Fail);
        engine.render(&frame(1)).unwrap();

        engine.close();
        engine.close();
        drop(engine);

        assert_eq!(handle.shutdown_count(), 1);
    }

    #[test]
    fn closed_engine_refuses_work() {
        let (backend, _handle) = SimulatedBackend::manual();
        let mut engine = TransmissionEngine::new(backend, WaitPolicy::Block);
        engine.close();

        assert!(engine.is_closed());
        assert!(!engine.is_busy());
        assert_eq!(engine.render(&frame(1)), Err(Error::Closed));
        assert_eq!(engine.wait(None), Err(Error::Closed));
    }
}
