//! In-memory collaborators for host-side store tests
//!
//! `MockFlash` models NOR semantics: erase sets a page to 0xFF and a
//! program can only clear bits, so writing over non-erased flash
//! corrupts data instead of silently succeeding - exactly the failure
//! the real hardware produces when ordering rules are violated.

use alloc::vec::Vec;

use glint_hal::{FlashDriver, FlashError};

use crate::profile::ProfileSource;

use super::StoreError;

pub const MOCK_START: u32 = 0x1000;
pub const MOCK_PAGE_SIZE: u32 = 1024;
pub const MOCK_PAGE_COUNT: u32 = 8;
pub const MOCK_PROGRAM_UNIT: u32 = 4;

pub struct MockFlash {
    mem: Vec<u8>,
    /// Completed erase operations
    pub erases: u32,
    /// Completed write operations
    pub writes: u32,
    /// Fail the next erase, then clear the flag
    pub fail_next_erase: bool,
    /// Fail the write whose ordinal (counted from construction)
    /// matches, then clear
    pub fail_write_at: Option<u32>,
}

impl MockFlash {
    pub fn new() -> Self {
        let size = (MOCK_PAGE_SIZE * MOCK_PAGE_COUNT) as usize;
        let mut mem = Vec::new();
        mem.resize(size, 0xFF);
        Self {
            mem,
            erases: 0,
            writes: 0,
            fail_next_erase: false,
            fail_write_at: None,
        }
    }

    fn offset(&self, address: u32, len: usize) -> Result<usize, FlashError> {
        let end = MOCK_START as usize + self.mem.len();
        let start = address as usize;
        if address < MOCK_START || start + len > end {
            return Err(FlashError::OutOfBounds);
        }
        Ok(start - MOCK_START as usize)
    }

    /// Inspect a region directly (test assertions)
    pub fn region(&self, address: u32, len: usize) -> &[u8] {
        let off = self.offset(address, len).unwrap();
        &self.mem[off..off + len]
    }
}

impl FlashDriver for MockFlash {
    async fn erase(&mut self, address: u32, pages: u32) -> Result<(), FlashError> {
        self.erases += 1;
        if self.fail_next_erase {
            self.fail_next_erase = false;
            return Err(FlashError::Io);
        }
        if address % MOCK_PAGE_SIZE != 0 {
            return Err(FlashError::Unaligned);
        }
        let len = (pages * MOCK_PAGE_SIZE) as usize;
        let off = self.offset(address, len)?;
        self.mem[off..off + len].fill(0xFF);
        Ok(())
    }

    async fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let ordinal = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(ordinal) {
            self.fail_write_at = None;
            return Err(FlashError::Io);
        }
        if data.is_empty() {
            return Ok(());
        }
        if address % MOCK_PROGRAM_UNIT != 0 || data.len() % MOCK_PROGRAM_UNIT as usize != 0 {
            return Err(FlashError::Unaligned);
        }
        let off = self.offset(address, data.len())?;
        // NOR: programming can only clear bits
        for (dst, src) in self.mem[off..off + data.len()].iter_mut().zip(data) {
            *dst &= *src;
        }
        Ok(())
    }

    async fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), FlashError> {
        let off = self.offset(address, out.len())?;
        out.copy_from_slice(&self.mem[off..off + out.len()]);
        Ok(())
    }

    fn page_size(&self) -> u32 {
        MOCK_PAGE_SIZE
    }

    fn program_unit(&self) -> u32 {
        MOCK_PROGRAM_UNIT
    }

    fn start_address(&self) -> u32 {
        MOCK_START
    }

    fn end_address(&self) -> u32 {
        MOCK_START + MOCK_PAGE_SIZE * MOCK_PAGE_COUNT
    }

    fn wait_ready(&mut self) {}
}

/// Scriptable profile collaborator
pub struct MockProfile {
    pub valid: bool,
    pub size: u32,
    pub default_blob: Vec<u8>,
    pub default_fails: bool,
    pub revalidate_result: bool,
    pub revalidations: u32,
}

impl MockProfile {
    pub fn new() -> Self {
        let mut default_blob = Vec::new();
        default_blob.resize(64, 0x42);
        Self {
            valid: false,
            size: 0,
            default_blob,
            default_fails: false,
            revalidate_result: true,
            revalidations: 0,
        }
    }
}

impl ProfileSource for MockProfile {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn create_default(&self) -> Result<Vec<u8>, StoreError> {
        if self.default_fails {
            Err(StoreError::OutOfMemory)
        } else {
            Ok(self.default_blob.clone())
        }
    }

    fn revalidate(&mut self) -> bool {
        self.revalidations += 1;
        self.revalidate_result
    }
}
