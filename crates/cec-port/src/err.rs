use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// No adapter behind the requested device node
    #[error("CEC adapter {0} not found")]
    NotFound(String),

    /// More logical addresses requested than an adapter can hold
    #[error("Logical address mask {0:#06x} claims more than 4 addresses")]
    TooManyAddresses(u16),

    /// Frame does not fit into a single CEC message
    #[error("Frame of {0} bytes exceeds the 16 byte CEC limit")]
    FrameTooLong(usize),

    /// Raw transmit refused for lack of `CAP_SYS_RAWIO`
    #[cfg(feature = "linux")]
    #[error("Sending as initiator {0} needs CAP_SYS_RAWIO")]
    RawNotPermitted(u8),

    /// The scripted bus ran out of replies
    #[cfg(feature = "mock")]
    #[error("Scripted bus has no reply left for frame {0:02x?}")]
    ScriptExhausted(Vec<u8>),

    #[cfg(feature = "linux")]
    /// `nix` crate error
    #[error("ioctl error: {0}")]
    Nix(#[from] nix::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
