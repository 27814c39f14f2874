//! Settings dispatch task
//!
//! Owns the settings store. Validates it at boot, then serves the app
//! message set: single-field mutations with acknowledgements, and the
//! full settings download (erase, then bulk chunks written straight to
//! flash).

use defmt::*;
use embassy_time::{with_timeout, Duration};

use glint_core::profile::ProfileSource;
use glint_core::settings::{
    DesignAndColor, ProgrammingEvent, SettingsStore, StoreError, StoreLayout, SETTINGS_SIZE,
};
use glint_hal::FlashDriver;
use glint_hal_nrf52::NvmcFlash;
use glint_protocol::{DieMessage, HostMessage, MAX_BULK_CHUNK};

use crate::channels::{ANIMATIONS_PAUSED, INBOUND, LINK_RESET, OUTBOUND};
use crate::profile::AnimationProfile;

/// The store as instantiated on this board
pub type Store = SettingsStore<NvmcFlash<'static>, AnimationProfile>;

/// Idle limit between bulk messages before a download is abandoned
const BULK_TIMEOUT: Duration = Duration::from_secs(5);

/// Notifier token of the animation-pause hook
const ANIMATION_HOOK_TOKEN: u32 = 1;

/// Why a settings download was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
enum DownloadError {
    Store(StoreError),
    Timeout,
    /// Announced or chunked size does not describe a settings record
    WrongSize,
    /// Record failed marker/version validation after landing
    Invalid,
}

impl From<StoreError> for DownloadError {
    fn from(e: StoreError) -> Self {
        DownloadError::Store(e)
    }
}

fn animation_pause_hook(_token: u32, event: ProgrammingEvent) {
    ANIMATIONS_PAUSED.signal(matches!(event, ProgrammingEvent::Begin));
}

/// Settings task - store init plus app message dispatch
#[embassy_executor::task]
pub async fn settings_task(mut store: Store) {
    info!("Settings task started");

    #[cfg(feature = "flash-self-test")]
    if !store.flash_mut().self_test() {
        error!("Flash self-test failed");
    }

    if !store
        .notifier_mut()
        .register(animation_pause_hook, ANIMATION_HOOK_TOKEN)
    {
        warn!("Notifier full, animations will not pause during commits");
    }

    match store.init().await {
        Ok(true) => info!("Settings store repaired with factory defaults"),
        Ok(false) => info!("Settings store valid"),
        Err(e) => error!("Settings store init failed: {:?}", e),
    }

    loop {
        let msg = INBOUND.receive().await;
        handle_message(&mut store, msg).await;
    }
}

async fn handle_message(store: &mut Store, msg: HostMessage) {
    match msg {
        HostMessage::TransferSettings => receive_settings(store).await,
        HostMessage::ProgramDefaultParameters => {
            let result = store.program_default_parameters().await;
            if let Err(e) = &result {
                warn!("Default parameters failed: {:?}", e);
            }
            OUTBOUND
                .send(DieMessage::ProgramDefaultParametersFinished {
                    success: result.is_ok(),
                })
                .await;
        }
        HostMessage::SetDesignAndColor { design } => {
            let design = DesignAndColor::from_u8(design).unwrap_or(DesignAndColor::Unknown);
            let result = store.set_design_and_color(design).await;
            if let Err(e) = &result {
                warn!("SetDesignAndColor failed: {:?}", e);
            }
            OUTBOUND
                .send(DieMessage::SetDesignAndColorAck {
                    success: result.is_ok(),
                })
                .await;
        }
        HostMessage::SetCurrentBehavior { behavior } => {
            let result = store.set_current_behavior(behavior).await;
            if let Err(e) = &result {
                warn!("SetCurrentBehavior failed: {:?}", e);
            }
            OUTBOUND
                .send(DieMessage::SetCurrentBehaviorAck {
                    success: result.is_ok(),
                })
                .await;
        }
        HostMessage::SetName { name } => {
            let success = match core::str::from_utf8(&name) {
                Ok(name) => match store.set_name(name).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("SetName failed: {:?}", e);
                        false
                    }
                },
                Err(_) => {
                    warn!("SetName payload is not UTF-8");
                    false
                }
            };
            OUTBOUND.send(DieMessage::SetNameAck { success }).await;
            if success {
                // The advertised name changed; the app reconnects
                LINK_RESET.signal(());
            }
        }
        #[cfg(debug_assertions)]
        HostMessage::PrintNormals { face } => print_normals(store, face).await,
        #[cfg(not(debug_assertions))]
        HostMessage::PrintNormals { .. } => debug!("PrintNormals ignored in release builds"),
        HostMessage::BulkSetup { .. } | HostMessage::BulkData { .. } => {
            // Only meaningful inside a settings download
            warn!("Bulk message outside a transfer, ignoring");
        }
    }
}

#[cfg(debug_assertions)]
async fn print_normals(store: &mut Store, face: u8) {
    match store.read().await {
        Ok(record) => {
            if face < store.board().face_count {
                let n = record.calibration.normals[face as usize];
                info!(
                    "face {=u8} normal: {=f32} {=f32} {=f32}",
                    face, n.x, n.y, n.z
                );
            } else {
                warn!("face {=u8} out of range", face);
            }
        }
        Err(e) => warn!("Cannot print normals: {:?}", e),
    }
}

/// Full settings download
///
/// Erases the settings region, acknowledges, then lands bulk chunks
/// directly in flash. The record is only declared good once the final
/// image passes marker/version validation; on any failure the store is
/// repaired with defaults so the die never runs on a half-written
/// record.
async fn receive_settings(store: &mut Store) {
    info!("Settings download starting");
    store.notifier_mut().notify(ProgrammingEvent::Begin);
    let result = receive_settings_inner(store).await;
    // The erase span covers the profile region on large-page parts;
    // refresh the collaborator's view before anything stages a profile.
    if !store.profile_mut().revalidate() {
        info!("Profile region cleared by settings download");
    }
    store.notifier_mut().notify(ProgrammingEvent::End);

    match result {
        Ok(()) => {
            OUTBOUND.send(DieMessage::TransferSettingsFinished).await;
            info!("Settings download complete");
        }
        Err(e) => {
            warn!("Settings download failed: {:?}", e);
            match store.init().await {
                Ok(true) => info!("Store repaired with defaults after failed download"),
                Ok(false) => {}
                Err(e) => error!("Store repair failed: {:?}", e),
            }
        }
    }

    // The app reconnects after a download either way
    LINK_RESET.signal(());
}

async fn receive_settings_inner(store: &mut Store) -> Result<(), DownloadError> {
    let layout = store.layout();
    let pages = (SETTINGS_SIZE as u32).div_ceil(layout.page_size);
    store
        .flash_mut()
        .erase(layout.settings_address(), pages)
        .await
        .map_err(StoreError::from)?;

    OUTBOUND.send(DieMessage::TransferSettingsAck).await;

    let size = loop {
        match next_bulk_message().await? {
            HostMessage::BulkSetup { size } => break size as usize,
            other => warn!("Expected BulkSetup, got {:?}", other),
        }
    };
    if size != SETTINGS_SIZE {
        warn!("Announced settings size {=usize}, expected {=usize}", size, SETTINGS_SIZE);
        return Err(DownloadError::WrongSize);
    }
    OUTBOUND.send(DieMessage::BulkSetupAck).await;

    let mut received = 0usize;
    while received < size {
        match next_bulk_message().await? {
            HostMessage::BulkData { offset, data } => {
                write_chunk(store, &layout, offset, &data).await?;
                received = received.max(offset as usize + data.len());
                OUTBOUND.send(DieMessage::BulkDataAck { offset }).await;
            }
            other => warn!("Expected BulkData, got {:?}", other),
        }
    }

    if store.check_valid().await.map_err(DownloadError::from)? {
        Ok(())
    } else {
        Err(DownloadError::Invalid)
    }
}

async fn next_bulk_message() -> Result<HostMessage, DownloadError> {
    with_timeout(BULK_TIMEOUT, INBOUND.receive())
        .await
        .map_err(|_| DownloadError::Timeout)
}

/// Land one chunk, padding the tail up to the program unit with
/// erased bytes
async fn write_chunk(
    store: &mut Store,
    layout: &StoreLayout,
    offset: u16,
    data: &[u8],
) -> Result<(), DownloadError> {
    if data.is_empty() {
        return Ok(());
    }
    if offset as usize + data.len() > SETTINGS_SIZE {
        return Err(DownloadError::WrongSize);
    }
    let mut padded = [0xFFu8; MAX_BULK_CHUNK + 4];
    padded[..data.len()].copy_from_slice(data);
    let len = layout.program_size(data.len() as u32) as usize;
    store
        .flash_mut()
        .write(layout.settings_address() + offset as u32, &padded[..len])
        .await
        .map_err(StoreError::from)?;
    Ok(())
}
