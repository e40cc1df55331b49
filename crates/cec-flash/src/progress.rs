use indicatif::{ProgressBar, ProgressStyle};

use crate::Result;

/// Receives a tick for every page written
pub trait Progress {
    fn advance(&mut self);
    fn finish(&mut self);
}

/// Terminal progress bar counting pages
pub struct PageBar(ProgressBar);

impl PageBar {
    pub fn new(pages: u32) -> Result<Self> {
        let pb = ProgressBar::new(pages as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] page {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        Ok(Self(pb))
    }
}

impl Progress for PageBar {
    fn advance(&mut self) {
        self.0.inc(1);
    }

    fn finish(&mut self) {
        self.0.finish();
    }
}

impl Drop for PageBar {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            self.0.abandon();
        }
    }
}

/// Reports nothing, for runs where log output would tear the bar apart
pub struct Quiet;

impl Progress for Quiet {
    fn advance(&mut self) {}

    fn finish(&mut self) {}
}
