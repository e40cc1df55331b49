use cec_hex::{Image, Segment};
use cec_target::Target;
use derive_ctor::ctor;
use enum_dispatch::enum_dispatch;
use getset::{CopyGetters, Getters};

use crate::{
    err::Error,
    page::{Page, PageProvider},
    patches::{Patches, reset_vector::ResetVector, trampoline::Trampoline},
};

pub mod avr;
pub mod err;
pub mod page;
pub mod patches;

pub type Result<T> = core::result::Result<T, Error>;

/// Room kept free below the bootloader for the trampoline
const TRAMPOLINE_LEN: u32 = 4;

#[enum_dispatch]
pub trait Patch {
    /// Address of the page to patch
    fn address(&self) -> u32;
    /// Position of the replacement inside a page of `page_size` bytes
    fn offset(&self, page_size: usize) -> usize;
    /// Patch replacement code
    fn replacement(&self) -> Result<Vec<u8>>;
    /// Human readable summary of the change
    fn describe(&self) -> String;

    /// Apply the patch to `page`
    fn patch(&self, page: &mut [u8]) -> Result<()> {
        replace(page, self.offset(page.len()), &self.replacement()?);
        Ok(())
    }
}

/// Replace in `slice` starting with `at` position with `replacement`
#[inline]
pub fn replace(slice: &mut [u8], at: usize, replacement: &[u8]) {
    slice[at..at + replacement.len()].clone_from_slice(replacement);
}

/// Flash geometry the image is laid out against
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
pub struct Layout {
    /// Flash page size in bytes
    #[getset(get_copy = "pub")]
    page_size: u32,
    /// First byte of the bootloader
    #[getset(get_copy = "pub")]
    bootloader_start: u32,
}

impl Layout {
    pub fn new(page_size: u32, bootloader_start: u32) -> Result<Self> {
        let valid = page_size >= TRAMPOLINE_LEN
            && page_size % 2 == 0
            && bootloader_start >= page_size
            && bootloader_start % page_size == 0;
        if !valid {
            return Err(Error::InvalidLayout {
                bootloader_start,
                page_size,
            });
        }

        Ok(Self {
            page_size,
            bootloader_start,
        })
    }

    /// Ceiling of the reserved region
    #[must_use]
    pub fn flash_end(&self) -> u32 {
        cec_target::flash_end(self.bootloader_start)
    }

    /// Largest image that still leaves room for the trampoline
    #[must_use]
    pub fn size_limit(&self) -> u32 {
        self.bootloader_start - TRAMPOLINE_LEN
    }

    /// Pages programmed in a full run
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.bootloader_start / self.page_size
    }

    /// Last page before the bootloader, home of the trampoline
    #[must_use]
    pub fn trampoline_page(&self) -> u32 {
        self.bootloader_start - self.page_size
    }
}

impl From<Target> for Layout {
    fn from(target: Target) -> Self {
        Self {
            page_size: target.page_size(),
            bootloader_start: target.bootloader_start(),
        }
    }
}

/// Addresses the relocation works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters, ctor)]
#[getset(get_copy = "pub")]
pub struct RelocationFacts {
    /// Where the image's reset vector jumped before patching
    user_reset: u32,
    bootloader_start: u32,
    flash_end: u32,
}

/// Validated user program ready to be cut into patched pages
#[derive(Debug, Getters)]
pub struct Firmware {
    data: Vec<u8>,
    #[getset(get = "pub")]
    layout: Layout,
    #[getset(get = "pub")]
    facts: RelocationFacts,
    #[getset(get = "pub")]
    patches: Vec<Patches>,
}

impl Firmware {
    /// Check that the image can host the bootloader hooks and decode its reset vector
    pub fn from_segments(mut segments: Vec<Segment>, layout: Layout) -> Result<Self> {
        if segments.len() != 1 {
            return Err(Error::NotContinuous(segments.len()));
        }
        let segment = segments.remove(0);

        if !segment.contains(0) {
            return Err(Error::MissingVectorTable);
        }
        if segment.size() > layout.size_limit() as usize {
            return Err(Error::TooLarge {
                size: segment.size(),
                limit: layout.size_limit(),
            });
        }

        let data = segment.into_data();
        let first = PageProvider::new(&data, layout.page_size as usize).page_at(0);
        let vector = u16::from_le_bytes([first.data()[0], first.data()[1]]);
        let user_reset = avr::decode_rjmp(vector, 0)?;

        let patches: Vec<Patches> = vec![
            ResetVector::new(layout.bootloader_start).into(),
            Trampoline::new(layout.trampoline_page(), user_reset).into(),
        ];
        // Unencodable jumps must surface before anything is erased
        for patch in &patches {
            patch.replacement()?;
        }

        Ok(Self {
            data,
            layout,
            facts: RelocationFacts::new(user_reset, layout.bootloader_start, layout.flash_end()),
            patches,
        })
    }

    pub fn from_image(image: Image, layout: Layout) -> Result<Self> {
        Self::from_segments(image.into_segments(), layout)
    }

    /// Bytes of user program
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Patched page at `address`
    pub fn page(&self, address: u32) -> Result<Page> {
        let mut page =
            PageProvider::new(&self.data, self.layout.page_size as usize).page_at(address);
        for patch in self.patches.iter().filter(|p| p.address() == address) {
            patch.patch(page.data_mut())?;
        }

        Ok(page)
    }

    /// Every page below the bootloader in programming order
    pub fn pages(&self) -> impl Iterator<Item = Result<Page>> + '_ {
        (0..self.layout.bootloader_start)
            .step_by(self.layout.page_size as usize)
            .map(|address| self.page(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::from(Target::ATtiny45)
    }

    fn image(data: Vec<u8>) -> Vec<Segment> {
        vec![Segment::new(0, data)]
    }

    fn small_image() -> Vec<u8> {
        let mut data = vec![0x07, 0xc0];
        data.extend(2..16u8);
        data
    }

    #[test]
    fn test_relocation_end_to_end() {
        let firmware = Firmware::from_segments(image(small_image()), layout()).unwrap();
        assert_eq!(firmware.facts().user_reset(), 0x10);
        assert_eq!(firmware.facts().flash_end(), 0x1000);

        let pages = firmware.pages().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(pages.len(), 59);

        let first = &pages[0];
        assert_eq!(*first.address(), 0);
        assert_eq!(&first.data()[..2], &[0x5f, 0xc7]);
        assert_eq!(&first.data()[2..16], &small_image()[2..]);
        assert!(first.data()[16..].iter().all(|b| *b == 0xff));

        let last = pages.last().unwrap();
        assert_eq!(*last.address(), 0xec0 - 0x40);
        assert_eq!(&last.data()[60..], &[0x0c, 0x94, 0x08, 0x00]);
        assert!(last.data()[..60].iter().all(|b| *b == 0xff));

        for page in &pages[1..58] {
            assert!(page.data().iter().all(|b| *b == 0xff));
        }
    }

    #[test]
    fn test_patched_vector_decodes_to_bootloader() {
        let firmware = Firmware::from_segments(image(small_image()), layout()).unwrap();
        let page = firmware.page(0).unwrap();
        let word = u16::from_le_bytes([page.data()[0], page.data()[1]]);
        assert_eq!(avr::decode_rjmp(word, 0).unwrap(), 0xec0);
    }

    #[test]
    fn test_full_image_keeps_data_under_trampoline() {
        let mut data = small_image();
        data.resize(layout().size_limit() as usize, 0x5a);
        let firmware = Firmware::from_segments(image(data.clone()), layout()).unwrap();

        let last = firmware.page(layout().trampoline_page()).unwrap();
        assert!(last.data()[..60].iter().all(|b| *b == 0x5a));
        assert_eq!(&last.data()[60..], &[0x0c, 0x94, 0x08, 0x00]);

        let middle = firmware.page(0x400).unwrap();
        assert_eq!(middle.data(), &data[0x400..0x440]);
    }

    #[test]
    fn test_wrapped_reset_vector_keeps_its_target() {
        let mut data = small_image();
        data[..2].copy_from_slice(&[0xff, 0xce]);
        let firmware = Firmware::from_segments(image(data), layout()).unwrap();
        assert_eq!(firmware.facts().user_reset(), 0x1e00);

        let last = firmware.page(layout().trampoline_page()).unwrap();
        assert_eq!(&last.data()[60..], &[0x0c, 0x94, 0x00, 0x0f]);
    }

    #[test]
    fn test_segment_at_top_of_address_space() {
        assert!(matches!(
            Firmware::from_segments(vec![Segment::new(0xffff_fff0, vec![0; 16])], layout()),
            Err(Error::MissingVectorTable)
        ));
    }

    #[test]
    fn test_too_large() {
        let mut data = small_image();
        data.resize(0xec0 - 3, 0);
        assert!(matches!(
            Firmware::from_segments(image(data), layout()),
            Err(Error::TooLarge {
                size: 0xebd,
                limit: 0xebc
            })
        ));
    }

    #[test]
    fn test_segment_count() {
        assert!(matches!(
            Firmware::from_segments(vec![], layout()),
            Err(Error::NotContinuous(0))
        ));
        assert!(matches!(
            Firmware::from_segments(
                vec![Segment::new(0, small_image()), Segment::new(0x100, vec![0])],
                layout()
            ),
            Err(Error::NotContinuous(2))
        ));
    }

    #[test]
    fn test_missing_vector_table() {
        assert!(matches!(
            Firmware::from_segments(vec![Segment::new(0x40, small_image())], layout()),
            Err(Error::MissingVectorTable)
        ));
    }

    #[test]
    fn test_reset_vector_must_be_rjmp() {
        let mut data = small_image();
        data[..2].copy_from_slice(&[0x0c, 0x94]);
        assert!(matches!(
            Firmware::from_segments(image(data), layout()),
            Err(Error::NotRelativeJump(0x940c))
        ));
    }

    #[test]
    fn test_unreachable_bootloader_fails_before_paging() {
        let layout = Layout::new(0x40, 0x1ec0).unwrap();
        assert!(matches!(
            Firmware::from_segments(image(small_image()), layout),
            Err(Error::JumpOutOfRange { to: 0x1ec0, .. })
        ));
    }

    #[test]
    fn test_layout_validation() {
        assert!(Layout::new(0x40, 0xec0).is_ok());
        assert!(Layout::new(0x40, 0xec4).is_err());
        assert!(Layout::new(0x40, 0).is_err());
        assert!(Layout::new(2, 0x40).is_err());
        assert_eq!(layout().page_count(), 59);
        assert_eq!(layout().trampoline_page(), 0xe80);
    }

    #[test]
    fn test_patch_descriptions() {
        let firmware = Firmware::from_segments(image(small_image()), layout()).unwrap();
        let names = firmware
            .patches()
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>();
        assert_eq!(names, ["reset vector", "trampoline"]);
        assert!(firmware.patches()[0].is_reset_vector());
        assert!(firmware.patches()[1].describe().contains("0x10"));
    }
}
