use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// Record doesn't begin with ':'
    #[error("Line {line}: missing ':' start code")]
    MissingStartCode { line: usize },

    /// Non-hex characters or an odd digit count
    #[error("Line {line}: invalid hex digits")]
    InvalidHex { line: usize },

    /// Byte count field disagrees with the record length
    #[error("Line {line}: record length doesn't match its byte count")]
    InvalidLength { line: usize },

    /// Record checksum is wrong
    #[error("Line {line}: checksum mismatch, expected {expected:#04x}, got {got:#04x}")]
    ChecksumMismatch { line: usize, expected: u8, got: u8 },

    /// Record type outside of I8HEX/I16HEX/I32HEX
    #[error("Line {line}: unsupported record type {kind:#04x}")]
    UnsupportedRecord { line: usize, kind: u8 },

    /// Two records write the same address
    #[error("Data at {address:#x} is defined twice")]
    Overlap { address: u32 },

    /// Record data runs past the top of the 32 bit address space
    #[error("Line {line}: data runs past address 0xffffffff")]
    AddressOverflow { line: usize },

    /// Input ended without an end-of-file record
    #[error("Missing end-of-file record")]
    MissingEof,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
