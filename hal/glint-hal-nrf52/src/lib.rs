//! nRF52-specific HAL for the Glint smart die firmware
//!
//! Implements the `glint-hal` traits on the nRF52 peripherals:
//! - NVMC-backed flash driver for the settings/profile store

#![no_std]

pub mod flash;

pub use flash::{NvmcFlash, STORE_FLASH_END, STORE_FLASH_START};
