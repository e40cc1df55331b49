use std::time::Duration;

use bitflags::bitflags;
use derive_more::IsVariant;

use crate::err::Error;

pub mod err;
#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod linux;
#[cfg(feature = "mock")]
pub mod mock;

pub type Result<T> = core::result::Result<T, Error>;

/// Unregistered logical address, the one a programmer talks from.
pub const UNREGISTERED: u8 = 0xf;

/// Adapter node used when none is given
pub const DEFAULT_DEVICE: &str = "/dev/cec0";

/// Longest message a CEC bus carries, header included.
pub const MAX_FRAME_LEN: usize = 16;

bitflags! {
    /// Completion status reported by the adapter for a sent or received frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// The destination did not acknowledge
        const NACK = 0x80;
        /// The adapter dropped data
        const OVERRUN = 0x40;
    }
}

impl Status {
    /// Either bit means the command did not go through.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.intersects(Self::NACK | Self::OVERRUN)
    }
}

/// Something the adapter delivered while being polled
#[derive(Debug, Clone, PartialEq, Eq, IsVariant)]
pub enum Event {
    /// The last frame handed to [`Bus::send`] left the adapter.
    Transmitted { status: Status },
    /// A frame arrived from the bus.
    ///
    /// `length` is what the adapter saw on the wire and may be larger than `message`.
    Received {
        message: Vec<u8>,
        length: usize,
        status: Status,
    },
}

/// A CEC adapter as seen by the protocol
///
/// Only one frame is in flight at a time: callers wait for
/// [`Event::Transmitted`] before handing over the next one.
pub trait Bus {
    /// Claim the logical addresses whose bits are set in `mask`.
    fn set_logical_addresses(&mut self, mask: u16) -> Result<()>;

    /// Queue `frame` for transmission without waiting for it to complete.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next adapter event.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn set_logical_addresses(&mut self, mask: u16) -> Result<()> {
        (**self).set_logical_addresses(mask)
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>> {
        (**self).poll(timeout)
    }
}

/// Initiator nibble of a frame header
#[inline]
#[must_use]
pub fn initiator(header: u8) -> u8 {
    header >> 4
}
