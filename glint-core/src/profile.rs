//! Profile collaborator interface
//!
//! The profile is the variable-size blob stored immediately after the
//! settings record: LED animations, behavior rules, whatever the
//! animation subsystem keeps there. The store never interprets those
//! bytes; it only needs to know whether the stored blob is currently
//! valid, how big it is, and how to synthesize a replacement when the
//! stored one cannot be preserved.

use alloc::vec::Vec;

use crate::settings::StoreError;

/// Supplier of the profile half of a commit
///
/// Implemented by the animation-data subsystem. All methods are
/// synchronous: the implementation owns its own view of the profile
/// region (on-chip flash is memory-mapped on the target).
pub trait ProfileSource {
    /// Whether the blob currently stored in the profile region is valid
    fn is_valid(&self) -> bool;

    /// Size in bytes of the stored blob
    ///
    /// Only meaningful when [`is_valid`](Self::is_valid) returns true.
    fn size(&self) -> u32;

    /// Build a factory-default blob
    ///
    /// The returned buffer is owned by the caller; dropping it releases
    /// it. Fails with [`StoreError::OutOfMemory`] when the allocation
    /// cannot be satisfied.
    fn create_default(&self) -> Result<Vec<u8>, StoreError>;

    /// Re-parse the profile region after it has been rewritten
    ///
    /// Called by the commit orchestrator once both regions are written.
    /// Returns the new validity, which becomes the overall commit
    /// outcome.
    fn revalidate(&mut self) -> bool;
}
