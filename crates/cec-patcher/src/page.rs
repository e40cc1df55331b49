use derive_ctor::ctor;
use getset::Getters;

/// Value of erased flash
pub const FILL: u8 = 0xff;

/// One flash page and where it goes
#[derive(Debug, Clone, PartialEq, Eq, Getters, ctor)]
pub struct Page {
    #[getset(get = "pub")]
    address: u32,
    #[getset(get = "pub")]
    data: Vec<u8>,
}

impl Page {
    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Pages cut out of a raw image
///
/// Any address past the image yields an erased page.
#[derive(Debug, Clone, Copy)]
pub struct PageProvider<'a> {
    data: &'a [u8],
    page_size: usize,
}

impl<'a> PageProvider<'a> {
    pub fn new(data: &'a [u8], page_size: usize) -> Self {
        Self { data, page_size }
    }

    /// Page starting at `address`, padded with [`FILL`]
    #[must_use]
    pub fn page_at(&self, address: u32) -> Page {
        let start = (address as usize).min(self.data.len());
        let end = (start + self.page_size).min(self.data.len());

        let mut data = vec![FILL; self.page_size];
        data[..end - start].copy_from_slice(&self.data[start..end]);
        Page::new(address, data)
    }
}
