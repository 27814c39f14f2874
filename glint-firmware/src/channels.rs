//! Inter-task communication channels
//!
//! Static embassy-sync primitives connecting the link tasks to the
//! settings task.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use glint_protocol::{DieMessage, HostMessage};

/// Channel capacity for decoded app messages
const INBOUND_CHANNEL_SIZE: usize = 4;

/// Channel capacity for outgoing acknowledgements
const OUTBOUND_CHANNEL_SIZE: usize = 4;

/// Decoded messages from the companion app
pub static INBOUND: Channel<CriticalSectionRawMutex, HostMessage, INBOUND_CHANNEL_SIZE> =
    Channel::new();

/// Acknowledgements and notifications back to the app
pub static OUTBOUND: Channel<CriticalSectionRawMutex, DieMessage, OUTBOUND_CHANNEL_SIZE> =
    Channel::new();

/// Request to drop the current link session (after a settings download)
pub static LINK_RESET: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Whether LED animations must hold off reads of the profile region
///
/// Raised by the store's programming hook while a commit rewrites the
/// store span. The animation engine is not part of this firmware yet;
/// its render task is the consumer once it lands.
pub static ANIMATIONS_PAUSED: Signal<CriticalSectionRawMutex, bool> = Signal::new();
