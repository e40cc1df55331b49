//! Scripted adapter for exercising the protocol without hardware
use std::{collections::VecDeque, io, thread::sleep, time::Duration};

use crate::{Bus, Event, Result, Status, err::Error};

/// What the scripted adapter does with the next sent frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Complete the transmission with this status.
    Status(Status),
    /// Deliver an unrelated inbound frame first, then complete with `Status`.
    Noise(Vec<u8>, Status),
    /// Never complete the transmission.
    Silent,
    /// Fail the send call itself.
    Broken,
}

impl Reply {
    pub const ACK: Self = Self::Status(Status::empty());
    pub const NACK: Self = Self::Status(Status::NACK);
}

/// Bus that answers from a queue of [`Reply`] and records every frame it was given
#[derive(Debug, Default)]
pub struct ScriptedBus {
    script: VecDeque<Reply>,
    events: VecDeque<Event>,
    sent: Vec<Vec<u8>>,
    mask: Option<u16>,
    /// Reply used once `script` runs dry. `None` makes that an error.
    fallback: Option<Reply>,
}

impl ScriptedBus {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Acknowledge every frame.
    pub fn always_ack() -> Self {
        Self::default().with_fallback(Reply::ACK)
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Frames handed to [`Bus::send`] so far
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Mask passed to [`Bus::set_logical_addresses`], if any
    pub fn mask(&self) -> Option<u16> {
        self.mask
    }
}

impl Bus for ScriptedBus {
    fn set_logical_addresses(&mut self, mask: u16) -> Result<()> {
        self.mask = Some(mask);
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let reply = match self.script.pop_front().or_else(|| self.fallback.clone()) {
            Some(reply) => reply,
            None => return Err(Error::ScriptExhausted(frame.to_vec())),
        };

        match reply {
            Reply::Status(status) => self.events.push_back(Event::Transmitted { status }),
            Reply::Noise(message, status) => {
                self.events.push_back(Event::Received {
                    length: message.len(),
                    message,
                    status: Status::empty(),
                });
                self.events.push_back(Event::Transmitted { status });
            }
            Reply::Silent => (),
            Reply::Broken => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "adapter unplugged").into());
            }
        }

        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Event>> {
        match self.events.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                sleep(timeout.min(Duration::from_millis(1)));
                Ok(None)
            }
        }
    }
}
