//! Persistent settings store
//!
//! Turns raw erase-before-write NOR flash into a validated, atomically
//! replaceable record plus an adjacent profile blob. Layout on flash,
//! starting at the store's fixed origin:
//!
//! ```text
//! [ SettingsRecord (fixed size) ][ profile blob (variable size) ]
//! ```
//!
//! Both regions are always erased and rewritten together, because the
//! erase granularity may straddle them.

pub mod commit;
pub mod notifier;
pub mod record;
pub mod store;

pub use commit::{CommitMachine, CommitState, CommitStep, FlashOp, StoreLayout};
pub use notifier::{ProgrammingEvent, ProgrammingNotifier};
pub use record::{DesignAndColor, SettingsRecord, TuningParams, SETTINGS_SIZE};
pub use store::SettingsStore;

#[cfg(test)]
pub(crate) mod testutil;

use glint_hal::FlashError;

/// Errors surfaced by the settings store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// A flash erase/write/read failed
    Flash(FlashError),
    /// A staging buffer could not be allocated (nothing was committed)
    OutOfMemory,
    /// Validity markers or version did not match on read
    InvalidRecord,
    /// Settings plus profile would not fit in the managed flash span
    NoCapacity,
}

impl From<FlashError> for StoreError {
    fn from(e: FlashError) -> Self {
        StoreError::Flash(e)
    }
}
