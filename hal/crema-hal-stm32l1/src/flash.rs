//! Internal flash for STM32L152RE
//!
//! One owner for the whole flash: the update partition is written block by
//! block during a firmware upgrade, and a sequential-storage map holds the
//! persisted parameters past the end of the partitions.
//!
//! ```text
//! 0x0000_0000 ┌──────────────┐
//!             │ bootloader   │
//! 0x0000_5800 ├──────────────┤
//!             │ application  │
//! 0x0001_9000 ├──────────────┤
//!             │ update       │
//! 0x0002_C800 ├──────────────┤
//!             │ rollback     │
//! 0x0004_0000 ├──────────────┤
//!             │ parameters   │
//! 0x0004_4000 └──────────────┘
//! ```

use core::ops::Range;

use crema_hal::image::{ImageFlash, ImageFlashError};
use crema_hal::storage::{KeyValueStore, StorageError, StorageKey};
use embassy_stm32::flash::{Blocking, Flash};
use embassy_stm32::peripherals::FLASH;
use embassy_stm32::Peri;
use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use sequential_storage::cache::NoCache;
use sequential_storage::map;

/// Length of each application-sized partition
pub const PARTITION_LEN: u32 = 0x1_3800;
/// Offset of the running application
pub const APPLICATION_START: u32 = 0x0_5800;
/// Offset of the update partition
pub const UPDATE_START: u32 = 0x1_9000;
/// Offset of the rollback partition
pub const ROLLBACK_START: u32 = 0x2_C800;

/// Erase page size
pub const PAGE_SIZE: usize = 256;

/// Range holding the parameter map
pub const CONFIG_RANGE: Range<u32> = 0x4_0000..0x4_4000;

/// Largest parameter record
const RECORD_BUFFER: usize = 128;

/// Attempts per word before a program failure is reported
const PROGRAM_RETRIES: usize = 100;

/// Internal flash of the controller MCU
pub struct BoardFlash<'d> {
    flash: Flash<'d, Blocking>,
}

impl<'d> BoardFlash<'d> {
    pub fn new(flash: Peri<'d, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }

    fn update_offset(offset: u32, len: usize) -> Result<u32, ImageFlashError> {
        let end = offset
            .checked_add(len as u32)
            .ok_or(ImageFlashError::OutOfRange)?;
        if end > PARTITION_LEN {
            return Err(ImageFlashError::OutOfRange);
        }
        Ok(UPDATE_START + offset)
    }
}

impl ImageFlash for BoardFlash<'_> {
    const PAGE_SIZE: usize = PAGE_SIZE;
    const CAPACITY: usize = PARTITION_LEN as usize;

    fn erase_page(&mut self, offset: u32) -> Result<(), ImageFlashError> {
        let page = offset - offset % PAGE_SIZE as u32;
        let start = Self::update_offset(page, PAGE_SIZE)?;
        self.flash
            .blocking_erase(start, start + PAGE_SIZE as u32)
            .map_err(|_| ImageFlashError::Erase)
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), ImageFlashError> {
        let start = Self::update_offset(offset, data.len())?;
        for (i, word) in data.chunks(4).enumerate() {
            let at = start + (i * 4) as u32;
            let mut attempts = 0;
            while self.flash.blocking_write(at, word).is_err() {
                attempts += 1;
                if attempts >= PROGRAM_RETRIES {
                    return Err(ImageFlashError::Program);
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ImageFlashError> {
        let start = Self::update_offset(offset, buf.len())?;
        self.flash
            .blocking_read(start, buf)
            .map_err(|_| ImageFlashError::OutOfRange)
    }
}

impl KeyValueStore for BoardFlash<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StorageError> {
        let mut data_buffer = [0u8; RECORD_BUFFER];

        let result = map::fetch_item::<StorageKey, &[u8], _>(
            &mut AsyncFlash(&mut self.flash),
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await;

        match result {
            Ok(Some(data)) => {
                let len = data.len();
                let out = buffer
                    .get_mut(..len)
                    .ok_or(StorageError::BufferTooSmall)?;
                out.copy_from_slice(data);
                Ok(len)
            }
            Ok(None) => Err(StorageError::NotFound),
            Err(_) => Err(StorageError::Flash),
        }
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StorageError> {
        let mut data_buffer = [0u8; RECORD_BUFFER];

        map::store_item(
            &mut AsyncFlash(&mut self.flash),
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        )
        .await
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => StorageError::Full,
            _ => StorageError::Flash,
        })
    }

    async fn erase_all(&mut self) -> Result<(), StorageError> {
        self.flash
            .blocking_erase(CONFIG_RANGE.start, CONFIG_RANGE.end)
            .map_err(|_| StorageError::Flash)
    }
}

/// Presents a blocking NOR flash through the async traits sequential-storage
/// expects. Every future completes on its first poll.
struct AsyncFlash<'a, F>(&'a mut F);

impl<F: ErrorType> ErrorType for AsyncFlash<'_, F> {
    type Error = F::Error;
}

impl<F: ReadNorFlash> embedded_storage_async::nor_flash::ReadNorFlash for AsyncFlash<'_, F> {
    const READ_SIZE: usize = F::READ_SIZE;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        ReadNorFlash::read(self.0, offset, bytes)
    }

    fn capacity(&self) -> usize {
        ReadNorFlash::capacity(self.0)
    }
}

impl<F: NorFlash> embedded_storage_async::nor_flash::NorFlash for AsyncFlash<'_, F> {
    const WRITE_SIZE: usize = F::WRITE_SIZE;
    const ERASE_SIZE: usize = F::ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        NorFlash::erase(self.0, from, to)
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        NorFlash::write(self.0, offset, bytes)
    }
}
