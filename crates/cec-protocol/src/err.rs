use std::time::Duration;

use thiserror::Error as TError;

use crate::Opcode;

#[derive(Debug, TError)]
pub enum Error {
    /// Payload size doesn't match what the opcode carries
    #[error("{opcode} takes {expected} payload bytes, got {got}")]
    InvalidPayload {
        opcode: Opcode,
        expected: usize,
        got: usize,
    },

    /// The adapter never reported the transmission as finished
    #[error("No response after {after:?}")]
    Timeout { after: Duration },

    /// The operator aborted while waiting for the bus
    #[error("Cancelled")]
    Cancelled,

    /// cec-port error
    #[error("Bus error: {0}")]
    Port(#[from] cec_port::err::Error),
}
