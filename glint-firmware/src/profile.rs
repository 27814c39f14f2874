//! Animation profile collaborator
//!
//! The animation subsystem keeps its data (palettes, keyframes,
//! behavior rules) in the profile region, immediately after the
//! settings record. On the nRF52 that region is memory-mapped, so the
//! collaborator reads it in place and only allocates when a replacement
//! blob has to be synthesized.

use alloc::vec::Vec;

use glint_core::profile::ProfileSource;
use glint_core::settings::StoreError;

/// Marker at the start of a valid profile blob
pub const PROFILE_MAGIC: u32 = 0x600D_DA7A;

/// Header: magic word + total size, both little-endian u32
pub const PROFILE_HEADER_SIZE: u32 = 8;

/// Body of the factory-default profile: one behavior rule that lights
/// the landed face white for half a second on every roll.
const DEFAULT_BODY: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, // rule count
    0x01, 0x00, // trigger: roll settled
    0x00, 0x00, // action: flash current face
    0xFF, 0xFF, 0xFF, 0x00, // color: white, full brightness
    0xF4, 0x01, 0x00, 0x00, // duration: 500 ms
];

/// Memory-mapped view of the profile region
pub struct AnimationProfile {
    base: u32,
    end: u32,
}

impl AnimationProfile {
    /// Attach to the profile region `[base, end)`
    pub fn new(base: u32, end: u32) -> Self {
        Self { base, end }
    }

    fn read_word(&self, address: u32) -> u32 {
        // In-range by construction; the region is plain readable flash
        unsafe { core::ptr::read_volatile(address as *const u32) }
    }

    /// Parse the stored header, returning the blob size
    ///
    /// Validity is never cached: the settings download erases the page
    /// holding this region, so every query re-reads flash.
    fn parse(&self) -> Option<u32> {
        if self.read_word(self.base) != PROFILE_MAGIC {
            return None;
        }
        let size = self.read_word(self.base + 4);
        if size < PROFILE_HEADER_SIZE || self.base.saturating_add(size) > self.end {
            return None;
        }
        Some(size)
    }
}

impl ProfileSource for AnimationProfile {
    fn is_valid(&self) -> bool {
        self.parse().is_some()
    }

    fn size(&self) -> u32 {
        self.parse().unwrap_or(0)
    }

    fn create_default(&self) -> Result<Vec<u8>, StoreError> {
        let size = PROFILE_HEADER_SIZE + DEFAULT_BODY.len() as u32;
        let mut blob = Vec::new();
        blob.try_reserve_exact(size as usize)
            .map_err(|_| StoreError::OutOfMemory)?;
        blob.extend_from_slice(&PROFILE_MAGIC.to_le_bytes());
        blob.extend_from_slice(&size.to_le_bytes());
        blob.extend_from_slice(&DEFAULT_BODY);
        Ok(blob)
    }

    fn revalidate(&mut self) -> bool {
        self.parse().is_some()
    }
}
