//! Commit orchestration state machine
//!
//! A commit replaces the settings record and the profile blob as one
//! logical transaction: erase the minimum page span covering both
//! regions, write the staged settings, write the staged profile. The
//! sequencing lives in [`CommitMachine`], a plain state machine with a
//! single dispatch keyed on the current state and the completion result
//! of the last flash operation. The async store facade drives it against
//! a real [`glint_hal::FlashDriver`]; tests drive it directly.

use glint_hal::FlashDriver;

use super::record::SETTINGS_SIZE;

/// Geometry of the store's flash span, captured from the driver
///
/// Settings region: `[origin, origin + SETTINGS_SIZE)`.
/// Profile region: `[origin + SETTINGS_SIZE, ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreLayout {
    pub origin: u32,
    pub usable_bytes: u32,
    pub page_size: u32,
    pub program_unit: u32,
}

impl StoreLayout {
    pub fn from_driver<F: FlashDriver>(flash: &F) -> Self {
        Self {
            origin: flash.start_address(),
            usable_bytes: flash.usable_bytes(),
            page_size: flash.page_size(),
            program_unit: flash.program_unit(),
        }
    }

    pub fn settings_address(&self) -> u32 {
        self.origin
    }

    pub fn profile_address(&self) -> u32 {
        self.origin + SETTINGS_SIZE as u32
    }

    /// Whether a profile of `profile_size` bytes fits behind the record
    pub fn has_capacity(&self, profile_size: u32) -> bool {
        SETTINGS_SIZE as u32 + profile_size <= self.usable_bytes
    }

    /// Pages covering the record plus a profile of `profile_size` bytes
    pub fn erase_pages(&self, profile_size: u32) -> u32 {
        (SETTINGS_SIZE as u32 + profile_size).div_ceil(self.page_size)
    }

    /// `size` rounded up to a whole number of program units
    pub fn program_size(&self, size: u32) -> u32 {
        size.div_ceil(self.program_unit) * self.program_unit
    }
}

/// Commit progress token; one flash operation is in flight per
/// non-idle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommitState {
    Idle,
    Erasing,
    WritingSettings,
    WritingProfile,
}

/// Flash operation requested by the machine
///
/// Write targets name which staging buffer to send; the driver of the
/// machine owns those buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashOp {
    Erase { address: u32, pages: u32 },
    WriteSettings { address: u32 },
    WriteProfile { address: u32 },
}

/// Result of one dispatch step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommitStep {
    /// Issue this operation and feed its result back to `advance`
    Issue(FlashOp),
    /// Terminal outcome of the hardware chain
    Done(bool),
}

/// The two-region commit sequencer
///
/// `start` issues the erase; every completion is fed to `advance`, which
/// either issues the next operation or terminates. Any failure
/// short-circuits to `Done(false)` and returns the machine to idle.
#[derive(Debug, Clone, Copy)]
pub struct CommitMachine {
    state: CommitState,
    layout: StoreLayout,
    profile_size: u32,
}

impl CommitMachine {
    pub fn new(layout: StoreLayout, profile_size: u32) -> Self {
        Self {
            state: CommitState::Idle,
            layout,
            profile_size,
        }
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// Begin the commit; returns the erase covering both regions
    pub fn start(&mut self) -> FlashOp {
        self.state = CommitState::Erasing;
        FlashOp::Erase {
            address: self.layout.origin,
            pages: self.layout.erase_pages(self.profile_size),
        }
    }

    /// Feed the completion result of the in-flight operation
    pub fn advance(&mut self, success: bool) -> CommitStep {
        match self.state {
            // Completion with nothing in flight is a sequencing bug in
            // the caller.
            CommitState::Idle => CommitStep::Done(false),
            CommitState::Erasing => {
                if success {
                    self.state = CommitState::WritingSettings;
                    CommitStep::Issue(FlashOp::WriteSettings {
                        address: self.layout.settings_address(),
                    })
                } else {
                    self.state = CommitState::Idle;
                    CommitStep::Done(false)
                }
            }
            CommitState::WritingSettings => {
                if success {
                    self.state = CommitState::WritingProfile;
                    CommitStep::Issue(FlashOp::WriteProfile {
                        address: self.layout.profile_address(),
                    })
                } else {
                    self.state = CommitState::Idle;
                    CommitStep::Done(false)
                }
            }
            CommitState::WritingProfile => {
                self.state = CommitState::Idle;
                CommitStep::Done(success)
            }
        }
    }
}
