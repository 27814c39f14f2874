//! Wireless message set for the Glint smart die
//!
//! The wireless transport delivers whole messages (one per GATT
//! notification/write), so there is no framing layer here - just the
//! fixed-layout payload encoding for each message type.
//!
//! Two directions:
//! - [`HostMessage`]: app → die, configuration requests
//! - [`DieMessage`]: die → app, acknowledgements and diagnostics

#![no_std]
#![deny(unsafe_code)]

pub mod messages;

pub use messages::{
    DieMessage, HostMessage, MessageError, MAX_BULK_CHUNK, MAX_MESSAGE_SIZE, MAX_NAME_BYTES,
};
