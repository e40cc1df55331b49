use thiserror::Error as TError;

#[derive(Debug, TError)]
pub enum Error {
    /// The image has gaps
    #[error("Can only handle continuous images, got {0} segments")]
    NotContinuous(usize),
    /// Nothing at address 0
    #[error("Image must contain the vector table")]
    MissingVectorTable,
    /// The image runs into the bootloader
    #[error("Image is too large: {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: u32 },
    /// The reset vector isn't an `rjmp`
    #[error("Reset vector does not contain an rjmp: {0:#06x}")]
    NotRelativeJump(u16),
    /// Destination can't be encoded in the instruction
    #[error("Jump from {from:#x} to {to:#x} is out of range")]
    JumpOutOfRange { from: u32, to: u32 },
    /// AVR code lives on word boundaries
    #[error("Jump target {0:#x} is not word aligned")]
    UnalignedTarget(u32),
    /// Bootloader start and page size don't line up
    #[error("Bootloader start {bootloader_start:#x} is not a multiple of the {page_size} byte page")]
    InvalidLayout { bootloader_start: u32, page_size: u32 },
}
