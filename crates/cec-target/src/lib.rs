/// Devices running the CEC bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    ATtiny45,
}

/// Granularity of the reserved region ceiling
const FLASH_END_ALIGN: u32 = 4096;

impl Target {
    /// Flash page size in bytes.
    pub fn page_size(&self) -> u32 {
        match self {
            Self::ATtiny45 => 0x40,
        }
    }

    /// Where the bootloader image starts. Everything below belongs to the user program.
    pub fn bootloader_start(&self) -> u32 {
        match self {
            Self::ATtiny45 => 0xec0,
        }
    }

    /// Page aligned ceiling of the region reserved for the bootloader.
    pub fn flash_end(&self) -> u32 {
        flash_end(self.bootloader_start())
    }
}

/// First 4 KiB boundary above `bootloader_start`
pub fn flash_end(bootloader_start: u32) -> u32 {
    (bootloader_start & !(FLASH_END_ALIGN - 1)) + FLASH_END_ALIGN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attiny45_layout() {
        let target = Target::ATtiny45;
        assert_eq!(target.bootloader_start() % target.page_size(), 0);
        assert_eq!(target.flash_end(), 0x1000);
    }

    #[test]
    fn test_flash_end_rounding() {
        assert_eq!(flash_end(0), 0x1000);
        assert_eq!(flash_end(0xfff), 0x1000);
        assert_eq!(flash_end(0x1000), 0x2000);
        assert_eq!(flash_end(0x1ec0), 0x2000);
    }
}
