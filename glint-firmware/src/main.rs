//! Glint - Smart Die Firmware
//!
//! Main firmware binary for nRF52-based motion-aware LED dice.
//! Owns the flash-backed settings/profile store and serves the
//! companion app's configuration protocol.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::uarte::{self, Uarte};
use embassy_nrf::{bind_interrupts, peripherals};
use embedded_alloc::LlffHeap as Heap;
use {defmt_rtt as _, panic_probe as _};

use glint_core::board::BOARD_D20;
use glint_core::settings::{SettingsStore, SETTINGS_SIZE};
use glint_hal_nrf52::{NvmcFlash, STORE_FLASH_END, STORE_FLASH_START};

use crate::profile::AnimationProfile;

// Heap allocator for profile staging buffers
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 8KB
const HEAP_SIZE: usize = 8 * 1024;

mod channels;
mod profile;
mod tasks;

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Glint firmware starting...");

    // Initialize heap allocator
    init_heap();

    // Initialize nRF52 peripherals
    let p = embassy_nrf::init(Default::default());
    info!("Peripherals initialized");

    // UART link to the companion app bridge
    let mut uart_config = uarte::Config::default();
    uart_config.baudrate = uarte::Baudrate::BAUD115200;
    let uart = Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);
    let (tx, rx) = uart.split();
    info!("UART link initialized");

    // Settings/profile store on the last flash pages
    let flash = NvmcFlash::new(Nvmc::new(p.NVMC), STORE_FLASH_START, STORE_FLASH_END);
    let animation_profile =
        AnimationProfile::new(STORE_FLASH_START + SETTINGS_SIZE as u32, STORE_FLASH_END);
    let store = SettingsStore::new(flash, animation_profile, &BOARD_D20);
    info!("Settings store attached");

    // Spawn tasks
    spawner.spawn(tasks::settings_task(store)).unwrap();
    spawner.spawn(tasks::link_rx_task(rx)).unwrap();
    spawner.spawn(tasks::link_tx_task(tx)).unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}
