//! Synchronous command exchange over a [`Bus`]
use std::time::{Duration, Instant};

use cec_port::{Bus, Event, Status, UNREGISTERED};
use log::{debug, trace};

use crate::{CancelToken, Opcode, Result, WAKE_FRAME, err::Error, frame};

/// Logical addresses claimed for the session
pub const ADDRESS_MASK: u16 = 1 << UNREGISTERED;

/// How long [`Session::send_and_await`] waits by default
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for a single bus poll, so cancellation is noticed quickly
const POLL_SLICE: Duration = Duration::from_millis(10);

/// One command at a time over an exclusively owned bus
///
/// Every send is followed by a wait for its transmit completion before
/// anything else may go out, so the only response ever expected is the one
/// for the last frame.
pub struct Session<B: Bus> {
    bus: B,
    timeout: Duration,
    cancel: CancelToken,
}

impl<B: Bus> Session<B> {
    /// Claim the unregistered address on `bus` and drop whatever it had queued.
    pub fn open(mut bus: B) -> Result<Self> {
        bus.set_logical_addresses(ADDRESS_MASK)?;
        while let Some(event) = bus.poll(Duration::ZERO)? {
            trace!("Discarding stale {event:?}");
        }

        Ok(Self {
            bus,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::default(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Send `bytes` and block until the adapter reports how the transmission went.
    ///
    /// Returns `false` when the bootloader refused the frame.
    pub fn send_and_await(&mut self, bytes: &[u8]) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        trace!("TX {bytes:02x?}");
        self.bus.send(bytes)?;
        let status = self.await_completion()?;
        trace!("TX done: {status:?}");

        Ok(!status.is_failure())
    }

    /// Build and send a command frame.
    pub fn command(&mut self, opcode: Opcode, payload: &[u8]) -> Result<bool> {
        let bytes = frame(opcode, payload)?;
        self.send_and_await(&bytes)
    }

    /// Ask the running firmware to drop into the bootloader.
    pub fn enter(&mut self) -> Result<bool> {
        self.send_and_await(&WAKE_FRAME)
    }

    fn await_completion(&mut self) -> Result<Status> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    after: self.timeout,
                });
            }

            match self.bus.poll((deadline - now).min(POLL_SLICE))? {
                Some(Event::Transmitted { status }) => return Ok(status),
                Some(Event::Received {
                    message,
                    length,
                    status,
                }) => report_inbound(&message, length, status),
                None => (),
            }
        }
    }
}

/// Inbound traffic isn't part of the exchange, it's only worth a log line
fn report_inbound(message: &[u8], length: usize, status: Status) {
    let mut extra = Vec::new();
    if length > message.len() {
        extra.push(format!("{}/{}", message.len(), length));
    }
    if status.contains(Status::NACK) {
        extra.push("Nack".to_owned());
    }
    if status.contains(Status::OVERRUN) {
        extra.push("Overrun".to_owned());
    }

    let message = &message[..length.min(message.len())];
    if extra.is_empty() {
        debug!("RX {message:02x?}");
    } else {
        debug!("RX {message:02x?} {}", extra.join(", "));
    }
}
