//! NVMC flash driver
//!
//! Implements [`glint_hal::FlashDriver`] on the nRF52 non-volatile
//! memory controller. The NVMC stalls the CPU for the duration of each
//! erase/program, so the async trait methods complete without actually
//! suspending; callers still observe the one-operation-at-a-time
//! contract through `&mut self`.

use embassy_nrf::nvmc::{Nvmc, PAGE_SIZE};
use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};

use glint_hal::{FlashDriver, FlashError};

/// Store region: the last two flash pages on the nRF52810, below the
/// UICR-configured bootloader (none on this board).
pub const STORE_FLASH_START: u32 = 0x0002_E000;
pub const STORE_FLASH_END: u32 = 0x0003_0000;

/// NVMC program unit in bytes (one word)
pub const PROGRAM_UNIT: u32 = 4;

/// On-chip flash driver for the settings/profile store
pub struct NvmcFlash<'d> {
    nvmc: Nvmc<'d>,
    start: u32,
    end: u32,
}

impl<'d> NvmcFlash<'d> {
    /// Wrap the NVMC, managing `[start, end)`
    ///
    /// Both bounds must be page-aligned.
    pub fn new(nvmc: Nvmc<'d>, start: u32, end: u32) -> Self {
        debug_assert_eq!(start % PAGE_SIZE as u32, 0);
        debug_assert_eq!(end % PAGE_SIZE as u32, 0);
        Self { nvmc, start, end }
    }

    fn check_range(&self, address: u32, len: u32) -> Result<(), FlashError> {
        if address < self.start || address.saturating_add(len) > self.end {
            return Err(FlashError::OutOfBounds);
        }
        Ok(())
    }

    /// Destructive erase/write/read-back check of the first store page
    ///
    /// Init path only; wipes live data.
    #[cfg(feature = "self-test")]
    pub fn self_test(&mut self) -> bool {
        #[cfg(feature = "defmt")]
        defmt::warn!("flash self-test: erasing page at {=u32:#x}", self.start);

        let patterns: [(u32, u32); 2] = [(self.start, 0xDEAD_BEEF), (self.start + 0x100, 0x5555_5555)];

        if self
            .nvmc
            .erase(self.start, self.start + PAGE_SIZE as u32)
            .is_err()
        {
            return false;
        }
        for (address, value) in patterns {
            if self.nvmc.write(address, &value.to_le_bytes()).is_err() {
                return false;
            }
        }
        for (address, value) in patterns {
            let mut readback = [0u8; 4];
            if self.nvmc.read(address, &mut readback).is_err() {
                return false;
            }
            if u32::from_le_bytes(readback) != value {
                #[cfg(feature = "defmt")]
                defmt::error!(
                    "flash self-test: read back {=u32:#x} at {=u32:#x}",
                    u32::from_le_bytes(readback),
                    address
                );
                return false;
            }
        }
        #[cfg(feature = "defmt")]
        defmt::info!("flash self-test passed");
        true
    }
}

fn map_error<E: NorFlashError>(e: E) -> FlashError {
    match e.kind() {
        NorFlashErrorKind::OutOfBounds => FlashError::OutOfBounds,
        NorFlashErrorKind::NotAligned => FlashError::Unaligned,
        _ => FlashError::Io,
    }
}

impl FlashDriver for NvmcFlash<'_> {
    async fn erase(&mut self, address: u32, pages: u32) -> Result<(), FlashError> {
        let len = pages * PAGE_SIZE as u32;
        self.check_range(address, len)?;
        self.nvmc.erase(address, address + len).map_err(map_error)
    }

    async fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(address, data.len() as u32)?;
        self.nvmc.write(address, data).map_err(map_error)
    }

    async fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), FlashError> {
        self.check_range(address, out.len() as u32)?;
        self.nvmc.read(address, out).map_err(map_error)
    }

    fn page_size(&self) -> u32 {
        PAGE_SIZE as u32
    }

    fn program_unit(&self) -> u32 {
        PROGRAM_UNIT
    }

    fn start_address(&self) -> u32 {
        self.start
    }

    fn end_address(&self) -> u32 {
        self.end
    }

    fn wait_ready(&mut self) {
        // NVMC operations stall the core and complete synchronously;
        // nothing to wait on.
    }
}
