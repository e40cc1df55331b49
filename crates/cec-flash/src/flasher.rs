//! Bootloader programming sequence
use core::fmt::Display;

use cec_patcher::Firmware;
use cec_port::Bus;
use cec_protocol::{CHUNK_SIZE, CancelToken, Opcode, Session};
use derive_ctor::ctor;
use derive_more::IsVariant;
use log::debug;

use crate::{Result, err::Error, progress::Progress};

/// Attempts per chunk when nothing else is asked for
pub const DEFAULT_ATTEMPTS: u32 = 10;

/// How far a programming run got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IsVariant)]
pub enum FlashState {
    #[default]
    Idle,
    /// Wake frame sent
    Entered,
    /// Bootloader answered
    Pinged,
    /// Application area is gone
    Erased,
    /// Writing the page at `address`
    Programming { address: u32 },
    /// User program started
    Done,
}

impl FlashState {
    /// Whether the device no longer holds a runnable program
    #[must_use]
    pub fn device_erased(&self) -> bool {
        matches!(self, Self::Erased | Self::Programming { .. })
    }
}

impl Display for FlashState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Entered => write!(f, "entering the bootloader"),
            Self::Pinged => write!(f, "connected to the bootloader"),
            Self::Erased => write!(f, "erased"),
            Self::Programming { address } => write!(f, "programming page {address:#x}"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// How often a refused chunk is sent again
#[derive(Debug, Clone, Copy, PartialEq, Eq, ctor)]
pub struct RetryPolicy {
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS)
    }
}

/// Runs the bootloader steps in order over a [`Session`]
///
/// Each step only starts from the state the previous one left behind. On
/// failure the state stays where the error happened.
pub struct Flasher<B: Bus> {
    session: Session<B>,
    retry: RetryPolicy,
    cancel: CancelToken,
    state: FlashState,
    /// Address of the next chunk
    cursor: u32,
}

impl<B: Bus> Flasher<B> {
    pub fn new(session: Session<B>, retry: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            session,
            retry,
            cancel,
            state: FlashState::Idle,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> FlashState {
        self.state
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    fn expect(&self, step: &'static str, expected: FlashState) -> Result<()> {
        if self.state != expected {
            return Err(Error::OutOfOrder {
                step,
                state: self.state,
            });
        }

        Ok(())
    }

    /// Knock the running firmware into its bootloader.
    ///
    /// An unacknowledged wake frame is fine, the ping that follows decides
    /// whether the bootloader is there.
    pub fn enter(&mut self) -> Result<()> {
        self.expect("enter the bootloader", FlashState::Idle)?;
        if !self.session.enter()? {
            debug!("Wake frame was not acknowledged");
        }

        self.state = FlashState::Entered;
        Ok(())
    }

    pub fn ping(&mut self) -> Result<()> {
        self.expect("ping", FlashState::Entered)?;
        if !self.session.command(Opcode::Ping, &[])? {
            return Err(Error::NotDetected);
        }

        self.state = FlashState::Pinged;
        Ok(())
    }

    pub fn erase(&mut self) -> Result<()> {
        self.expect("erase", FlashState::Pinged)?;
        if !self.session.command(Opcode::Erase, &[])? {
            return Err(Error::EraseFailed);
        }

        self.state = FlashState::Erased;
        self.cursor = 0;
        Ok(())
    }

    /// Program the next chunk, resending it until the bootloader takes it or
    /// the retry policy runs out.
    pub fn write_data(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.len() != CHUNK_SIZE {
            return Err(Error::InvalidChunk(chunk.len()));
        }
        if !self.state.device_erased() {
            return Err(Error::OutOfOrder {
                step: "write data",
                state: self.state,
            });
        }

        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            if self.session.command(Opcode::WriteData, chunk)? {
                if attempt > 1 {
                    debug!("Chunk at {:#x} went through on attempt {attempt}", self.cursor);
                }
                self.cursor += CHUNK_SIZE as u32;
                return Ok(());
            }
            debug!(
                "Chunk at {:#x} refused ({attempt}/{attempts})",
                self.cursor
            );
        }

        Err(Error::WriteFailed {
            address: self.cursor,
            attempts,
        })
    }

    /// Write every page of `firmware` below the bootloader
    pub fn program(&mut self, firmware: &Firmware, progress: &mut dyn Progress) -> Result<()> {
        self.expect("program", FlashState::Erased)?;

        for page in firmware.pages() {
            let page = page?;
            self.state = FlashState::Programming {
                address: *page.address(),
            };
            self.cursor = *page.address();

            for chunk in page.data().chunks(CHUNK_SIZE) {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                self.write_data(chunk)?;
            }
            progress.advance();
        }

        progress.finish();
        Ok(())
    }

    /// Leave the bootloader and start the freshly written program.
    pub fn run(&mut self) -> Result<()> {
        if !self.state.is_programming() {
            return Err(Error::OutOfOrder {
                step: "run",
                state: self.state,
            });
        }
        if !self.session.command(Opcode::Run, &[])? {
            return Err(Error::RunFailed);
        }

        self.state = FlashState::Done;
        Ok(())
    }
}
