//! Firmware partition bookkeeping
//!
//! The application receives a new image block by block into the update
//! partition and records the state of every partition. Copying images
//! around is the bootloader's job; the application only marks what it
//! wants done and reboots.

use crema_hal::image::{ImageFlash, ImageFlashError};
use crema_protocol::{FieldError, Frame, Status};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Image bytes carried by one block message
pub const IMAGE_BLOCK_LEN: usize = 64;

/// First word of a valid image: initial stack pointer 0x2000_8000
pub const VECTOR_SIGNATURE: [u8; 4] = [0x00, 0x80, 0x00, 0x20];

/// Largest encoded partition table record
pub const PARTITION_RECORD_LEN: usize = 64;

/// State of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PartitionStatus {
    #[default]
    Undefined,
    Valid,
    /// Being written, or flagged for the bootloader to install
    Updating,
    Updated,
    /// Flagged for the bootloader to restore from rollback
    Rollback,
    Corrupt,
}

impl PartitionStatus {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PartitionStatus::Undefined),
            1 => Some(PartitionStatus::Valid),
            2 => Some(PartitionStatus::Updating),
            3 => Some(PartitionStatus::Updated),
            4 => Some(PartitionStatus::Rollback),
            5 => Some(PartitionStatus::Corrupt),
            _ => None,
        }
    }
}

/// Bookkeeping of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionInfo {
    pub version: u16,
    pub status: PartitionStatus,
    pub last_block: u16,
    pub block_count: u16,
}

/// Why an upgrade message was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PartitionError {
    /// Block index out of range or not in sequence
    BlockNumber,
    /// Block carries another version than block 0 did
    WrongVersion,
    /// Partition to install from is not valid
    ImageNotValid,
    ImageTooBig,
    /// Block 0 does not start with a vector table
    ImageCorrupt,
    ErasePage,
    /// Programming failed or read-back differs
    Verify,
}

impl From<PartitionError> for Status {
    fn from(err: PartitionError) -> Self {
        match err {
            PartitionError::BlockNumber => Status::BlockNrError,
            PartitionError::WrongVersion => Status::WrongVersion,
            PartitionError::ImageNotValid => Status::ImageNotValid,
            PartitionError::ImageTooBig => Status::ImageTooBig,
            PartitionError::ImageCorrupt => Status::ImageCorrupt,
            PartitionError::ErasePage => Status::ErasePageError,
            PartitionError::Verify => Status::VerifyError,
        }
    }
}

impl From<ImageFlashError> for PartitionError {
    fn from(err: ImageFlashError) -> Self {
        match err {
            ImageFlashError::Erase => PartitionError::ErasePage,
            ImageFlashError::Program | ImageFlashError::OutOfRange => PartitionError::Verify,
        }
    }
}

/// One block of an image upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub version: u16,
    pub block_count: u16,
    pub index: u16,
    pub data: [u8; IMAGE_BLOCK_LEN],
}

impl ImageBlock {
    pub fn from_frame(frame: &Frame) -> Result<Self, FieldError> {
        let mut data = [0u8; IMAGE_BLOCK_LEN];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = frame.field(20 + 2 * i, 2)? as u8;
        }
        Ok(Self {
            version: frame.field(8, 4)?,
            block_count: frame.field(12, 4)?,
            index: frame.field(16, 4)?,
            data,
        })
    }
}

/// State of all four partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionTable {
    pub bootloader: PartitionInfo,
    pub application: PartitionInfo,
    pub update: PartitionInfo,
    pub rollback: PartitionInfo,
}

impl PartitionTable {
    /// Store one block in the update partition
    ///
    /// Block 0 starts a new upload: it must begin with the vector table and
    /// fixes the version every later block has to carry. The first block of
    /// each flash page erases that page. The partition turns valid with the
    /// last block.
    pub fn write_block<F: ImageFlash>(
        &mut self,
        block: &ImageBlock,
        flash: &mut F,
    ) -> Result<(), PartitionError> {
        let max_blocks = F::CAPACITY / IMAGE_BLOCK_LEN;
        if usize::from(block.block_count) > max_blocks {
            return Err(PartitionError::ImageTooBig);
        }
        if block.index == 0 && block.data[..4] != VECTOR_SIGNATURE {
            return Err(PartitionError::ImageCorrupt);
        }

        let previous = self.update.last_block;
        self.update.block_count = block.block_count;
        self.update.last_block = block.index;
        let previous = if block.index == 0 {
            self.update.version = block.version;
            self.update.status = PartitionStatus::Updating;
            0
        } else {
            previous
        };

        let in_sequence = block.index >= previous && block.index - previous <= 1;
        if block.index >= block.block_count || !in_sequence {
            return Err(PartitionError::BlockNumber);
        }
        if block.version != self.update.version {
            return Err(PartitionError::WrongVersion);
        }

        let offset = u32::from(block.index) * IMAGE_BLOCK_LEN as u32;
        let blocks_per_page = (F::PAGE_SIZE / IMAGE_BLOCK_LEN) as u16;
        if block.index % blocks_per_page == 0 {
            flash
                .erase_page(offset)
                .map_err(|_| PartitionError::ErasePage)?;
        }
        flash.program(offset, &block.data)?;

        let mut readback = [0u8; IMAGE_BLOCK_LEN];
        flash.read(offset, &mut readback)?;
        if readback != block.data {
            return Err(PartitionError::Verify);
        }

        if block.index + 1 == block.block_count {
            self.update.status = PartitionStatus::Valid;
        }
        Ok(())
    }

    /// Flag the received update for installation
    pub fn request_upgrade(&mut self) -> Result<(), PartitionError> {
        if self.update.status != PartitionStatus::Valid {
            return Err(PartitionError::ImageNotValid);
        }
        self.application.status = PartitionStatus::Updating;
        Ok(())
    }

    /// Flag the rollback image for restoring
    pub fn request_restore(&mut self) -> Result<(), PartitionError> {
        if self.rollback.status != PartitionStatus::Valid {
            return Err(PartitionError::ImageNotValid);
        }
        self.application.status = PartitionStatus::Rollback;
        Ok(())
    }

    /// Reply fields of a block upload
    pub fn update_fields(&self) -> [u16; 4] {
        let u = &self.update;
        [u.version, u.last_block, u.block_count, u16::from(u.status.as_u8())]
    }

    /// Reply fields of the partition info family
    pub fn info_fields(&self) -> [u16; 8] {
        let (a, r, u) = (&self.application, &self.rollback, &self.update);
        [
            a.version,
            u16::from(a.status.as_u8()),
            r.version,
            u16::from(r.status.as_u8()),
            u.version,
            u.last_block,
            u.block_count,
            u16::from(u.status.as_u8()),
        ]
    }

    #[cfg(feature = "serde")]
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], crate::config::ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| crate::config::ConfigError::Encode)
    }

    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, crate::config::ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| crate::config::ConfigError::Decode)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Update partition of four 256-byte pages in RAM
    pub struct MockImageFlash {
        pub memory: [u8; 1024],
        pub erased_pages: heapless::Vec<u32, 8>,
        pub fail_erase: bool,
        pub corrupt_writes: bool,
    }

    impl MockImageFlash {
        pub fn new() -> Self {
            Self {
                memory: [0xFF; 1024],
                erased_pages: heapless::Vec::new(),
                fail_erase: false,
                corrupt_writes: false,
            }
        }
    }

    impl ImageFlash for MockImageFlash {
        const PAGE_SIZE: usize = 256;
        const CAPACITY: usize = 1024;

        fn erase_page(&mut self, offset: u32) -> Result<(), ImageFlashError> {
            if self.fail_erase {
                return Err(ImageFlashError::Erase);
            }
            let start = offset as usize / Self::PAGE_SIZE * Self::PAGE_SIZE;
            self.memory[start..start + Self::PAGE_SIZE].fill(0xFF);
            let _ = self.erased_pages.push(offset);
            Ok(())
        }

        fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), ImageFlashError> {
            let start = offset as usize;
            let dest = self
                .memory
                .get_mut(start..start + data.len())
                .ok_or(ImageFlashError::OutOfRange)?;
            dest.copy_from_slice(data);
            if self.corrupt_writes {
                dest[0] ^= 0x01;
            }
            Ok(())
        }

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ImageFlashError> {
            let start = offset as usize;
            let src = self
                .memory
                .get(start..start + buf.len())
                .ok_or(ImageFlashError::OutOfRange)?;
            buf.copy_from_slice(src);
            Ok(())
        }
    }

    pub fn image_block(version: u16, block_count: u16, index: u16) -> ImageBlock {
        let mut data = [index as u8; IMAGE_BLOCK_LEN];
        if index == 0 {
            data[..4].copy_from_slice(&VECTOR_SIGNATURE);
        }
        ImageBlock {
            version,
            block_count,
            index,
            data,
        }
    }

    #[test]
    fn test_full_upload_marks_update_valid() {
        let mut table = PartitionTable::default();
        let mut flash = MockImageFlash::new();

        for i in 0..6 {
            table.write_block(&image_block(7, 6, i), &mut flash).unwrap();
            let expected = if i == 5 {
                PartitionStatus::Valid
            } else {
                PartitionStatus::Updating
            };
            assert_eq!(table.update.status, expected);
        }
        assert_eq!(table.update.version, 7);
        assert_eq!(table.update_fields(), [7, 5, 6, 1]);
        // Blocks 0 and 4 open a page
        assert_eq!(flash.erased_pages.as_slice(), &[0, 256]);
        assert_eq!(flash.memory[64 * 5], 5);
    }

    #[test]
    fn test_block_zero_needs_vector_table() {
        let mut table = PartitionTable::default();
        let mut block = image_block(1, 4, 0);
        block.data[1] = 0x00;
        assert_eq!(
            table.write_block(&block, &mut MockImageFlash::new()),
            Err(PartitionError::ImageCorrupt)
        );
    }

    #[test]
    fn test_image_too_big() {
        let mut table = PartitionTable::default();
        assert_eq!(
            table.write_block(&image_block(1, 17, 0), &mut MockImageFlash::new()),
            Err(PartitionError::ImageTooBig)
        );
    }

    #[test]
    fn test_blocks_must_be_sequential() {
        let mut table = PartitionTable::default();
        let mut flash = MockImageFlash::new();
        table.write_block(&image_block(1, 8, 0), &mut flash).unwrap();
        table.write_block(&image_block(1, 8, 1), &mut flash).unwrap();
        // Repeating a block is fine
        table.write_block(&image_block(1, 8, 1), &mut flash).unwrap();
        assert_eq!(
            table.write_block(&image_block(1, 8, 3), &mut flash),
            Err(PartitionError::BlockNumber)
        );
    }

    #[test]
    fn test_version_must_match_block_zero() {
        let mut table = PartitionTable::default();
        let mut flash = MockImageFlash::new();
        table.write_block(&image_block(3, 8, 0), &mut flash).unwrap();
        assert_eq!(
            table.write_block(&image_block(4, 8, 1), &mut flash),
            Err(PartitionError::WrongVersion)
        );
    }

    #[test]
    fn test_flash_failures_map_to_status() {
        let mut table = PartitionTable::default();
        let mut flash = MockImageFlash::new();
        flash.fail_erase = true;
        let err = table.write_block(&image_block(1, 4, 0), &mut flash).unwrap_err();
        assert_eq!(Status::from(err), Status::ErasePageError);

        let mut flash = MockImageFlash::new();
        flash.corrupt_writes = true;
        let err = table.write_block(&image_block(1, 4, 0), &mut flash).unwrap_err();
        assert_eq!(Status::from(err), Status::VerifyError);
    }

    #[test]
    fn test_upgrade_and_restore_need_valid_image() {
        let mut table = PartitionTable::default();
        assert_eq!(table.request_upgrade(), Err(PartitionError::ImageNotValid));
        assert_eq!(table.request_restore(), Err(PartitionError::ImageNotValid));

        table.update.status = PartitionStatus::Valid;
        table.request_upgrade().unwrap();
        assert_eq!(table.application.status, PartitionStatus::Updating);

        table.rollback.status = PartitionStatus::Valid;
        table.request_restore().unwrap();
        assert_eq!(table.application.status, PartitionStatus::Rollback);
    }
}
