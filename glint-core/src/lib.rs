//! Board-agnostic core logic for the Glint smart die firmware
//!
//! This crate contains the persistent settings store and everything it
//! needs that does not depend on specific hardware:
//!
//! - Settings record layout, validity markers, and factory defaults
//! - The atomic two-region commit orchestrator
//! - The settings store facade (read accessors + named mutations)
//! - The programming lifecycle notifier
//! - Board descriptors (per-face normals, face-to-LED lookups)
//! - The profile collaborator trait
//!
//! Flash access goes through the [`glint_hal::FlashDriver`] trait, so the
//! whole store runs against an in-memory mock on the host.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod board;
pub mod profile;
pub mod settings;

// Re-export the main types at crate root for convenience
pub use board::{BoardDescriptor, Float3};
pub use profile::ProfileSource;
pub use settings::{DesignAndColor, SettingsRecord, SettingsStore, StoreError};
