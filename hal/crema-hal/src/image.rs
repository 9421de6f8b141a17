//! Firmware image flash
//!
//! The update partition is written in fixed-size blocks, one erase page at a
//! time. Offsets are relative to the start of the partition.

/// Errors from image flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageFlashError {
    /// Page erase failed
    Erase,
    /// Programming failed after all retries
    Program,
    /// Offset or length outside the partition
    OutOfRange,
}

/// Raw access to the update partition
pub trait ImageFlash {
    /// Size of one erase page in bytes
    const PAGE_SIZE: usize;

    /// Size of the partition in bytes
    const CAPACITY: usize;

    /// Erase the page containing `offset`
    fn erase_page(&mut self, offset: u32) -> Result<(), ImageFlashError>;

    /// Program `data` at `offset`
    ///
    /// Implementations retry each word a bounded number of times before
    /// giving up with [`ImageFlashError::Program`].
    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), ImageFlashError>;

    /// Read back `buf.len()` bytes from `offset`
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ImageFlashError>;
}
