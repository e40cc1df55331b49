use thiserror::Error as TError;

use crate::flasher::FlashState;

#[derive(Debug, TError)]
pub enum Error {
    /// The bootloader did not acknowledge the ping
    #[error("Could not detect CEC bootloader")]
    NotDetected,
    /// The bootloader refused to erase the application area
    #[error("Erase failed")]
    EraseFailed,
    /// A chunk was refused on every attempt
    #[error("Write failed at {address:#x} after {attempts} attempts")]
    WriteFailed { address: u32, attempts: u32 },
    /// The bootloader refused to start the user program
    #[error("Run failed")]
    RunFailed,
    /// Write data only carries full chunks
    #[error("Unhandled data size: {0}")]
    InvalidChunk(usize),
    /// A step was requested before the ones it depends on
    #[error("Cannot {step} while {state}")]
    OutOfOrder {
        step: &'static str,
        state: FlashState,
    },
    /// The operator interrupted programming
    #[error("Cancelled")]
    Cancelled,

    /// cec-hex error
    #[error("Image error: {0}")]
    CecHex(#[from] cec_hex::err::Error),
    /// cec-patcher error
    #[error("Relocation error: {0}")]
    CecPatcher(#[from] cec_patcher::err::Error),
    /// cec-protocol error
    #[error("Protocol error: {0}")]
    CecProtocol(#[from] cec_protocol::err::Error),
    /// cec-port error
    #[error("Bus error: {0}")]
    CecPort(#[from] cec_port::err::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// indicatif crate error
    #[error("Progress bar template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
    /// nix crate error
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),
    /// Any other error
    #[error("{0}")]
    Custom(String),
}

/// Coarse classification used for the exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The image can't be flashed as is
    Format,
    /// The bootloader answered, but not the way it should
    Protocol,
    /// The adapter misbehaved or nobody answered in time
    Transport,
    Cancelled,
    Other,
}

impl ErrorKind {
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Format => 2,
            Self::Protocol => 3,
            Self::Transport => 4,
            Self::Cancelled => 130,
            Self::Other => 1,
        }
    }
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        use cec_protocol::err::Error as Protocol;

        match self {
            Self::NotDetected
            | Self::EraseFailed
            | Self::WriteFailed { .. }
            | Self::RunFailed
            | Self::InvalidChunk(_)
            | Self::CecProtocol(Protocol::InvalidPayload { .. }) => ErrorKind::Protocol,
            Self::Cancelled | Self::CecProtocol(Protocol::Cancelled) => ErrorKind::Cancelled,
            Self::CecProtocol(Protocol::Timeout { .. } | Protocol::Port(_)) | Self::CecPort(_) => {
                ErrorKind::Transport
            }
            Self::CecHex(cec_hex::err::Error::Io(_)) => ErrorKind::Other,
            Self::CecHex(_) | Self::CecPatcher(_) => ErrorKind::Format,
            Self::OutOfOrder { .. }
            | Self::Io(_)
            | Self::Template(_)
            | Self::Nix(_)
            | Self::Custom(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::NotDetected.kind().exit_code(), 3);
        assert_eq!(
            Error::WriteFailed {
                address: 0x40,
                attempts: 10
            }
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(Error::Cancelled.kind().exit_code(), 130);
        assert_eq!(
            Error::from(cec_protocol::err::Error::Cancelled).kind(),
            ErrorKind::Cancelled
        );
        assert_eq!(
            Error::from(cec_protocol::err::Error::Timeout {
                after: Duration::from_secs(1)
            })
            .kind()
            .exit_code(),
            4
        );
        assert_eq!(
            Error::from(cec_patcher::err::Error::MissingVectorTable)
                .kind()
                .exit_code(),
            2
        );
        assert_eq!(
            Error::from(cec_hex::err::Error::MissingEof).kind(),
            ErrorKind::Format
        );
        assert_eq!(Error::Custom("usage".into()).kind().exit_code(), 1);
    }
}
