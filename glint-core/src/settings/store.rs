//! Settings store facade
//!
//! Validates the record stored in flash, answers read queries, and
//! exposes the named mutations. Every mutation is "take current (or
//! default, if current is invalid) -> apply one change -> commit the
//! whole record"; the live flash image is never edited in place.
//!
//! All mutations take `&mut self`, so a second commit cannot be issued
//! while one is in flight on the single-threaded executor.

use alloc::vec::Vec;

use glint_hal::{FlashDriver, FlashError};

use crate::board::{BoardDescriptor, Float3, MAX_FACE_COUNT};
use crate::profile::ProfileSource;

use super::commit::{CommitMachine, CommitStep, FlashOp, StoreLayout};
use super::notifier::{ProgrammingEvent, ProgrammingNotifier};
use super::record::{DesignAndColor, SettingsRecord, TuningParams, SETTINGS_SIZE};
use super::StoreError;

/// Staged RAM copies of everything a commit will write
///
/// Owned for the duration of one commit; dropping it releases both
/// buffers on every exit path.
struct StagedCommit {
    settings: [u8; SETTINGS_SIZE],
    profile: Vec<u8>,
}

/// The flash-backed settings store
pub struct SettingsStore<F: FlashDriver, P: ProfileSource> {
    flash: F,
    profile: P,
    board: &'static BoardDescriptor,
    notifier: ProgrammingNotifier,
}

impl<F: FlashDriver, P: ProfileSource> SettingsStore<F, P> {
    pub fn new(flash: F, profile: P, board: &'static BoardDescriptor) -> Self {
        Self {
            flash,
            profile,
            board,
            notifier: ProgrammingNotifier::new(),
        }
    }

    pub fn board(&self) -> &'static BoardDescriptor {
        self.board
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::from_driver(&self.flash)
    }

    /// Registry of commit begin/end hooks
    pub fn notifier_mut(&mut self) -> &mut ProgrammingNotifier {
        &mut self.notifier
    }

    /// Direct driver access, for the bulk settings download path
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// The profile collaborator
    pub fn profile_mut(&mut self) -> &mut P {
        &mut self.profile
    }

    /// Validate the stored record, programming factory defaults when it
    /// is missing or corrupt
    ///
    /// Returns `Ok(true)` when defaults had to be programmed (first boot
    /// or repair), `Ok(false)` when the existing record was valid.
    pub async fn init(&mut self) -> Result<bool, StoreError> {
        if self.check_valid().await? {
            Ok(false)
        } else {
            self.program_defaults().await?;
            Ok(true)
        }
    }

    /// Marker/version probe of the stored image
    ///
    /// Never cached: flash may have changed under us since the last
    /// call.
    pub async fn check_valid(&mut self) -> Result<bool, StoreError> {
        let mut image = [0u8; SETTINGS_SIZE];
        self.flash
            .read(self.layout().settings_address(), &mut image)
            .await?;
        Ok(super::record::region_valid(&image))
    }

    /// Read and validate the current record
    ///
    /// Returns the whole record or [`StoreError::InvalidRecord`]; never
    /// a partial or best-effort record.
    pub async fn read(&mut self) -> Result<SettingsRecord, StoreError> {
        let mut image = [0u8; SETTINGS_SIZE];
        self.flash
            .read(self.layout().settings_address(), &mut image)
            .await?;
        SettingsRecord::decode(&image)
    }

    /// Base record for a mutation: the stored one when valid, factory
    /// defaults otherwise
    async fn current_or_default(&mut self) -> Result<SettingsRecord, StoreError> {
        match self.read().await {
            Ok(record) => Ok(record),
            Err(StoreError::InvalidRecord) => Ok(SettingsRecord::default_for(self.board)),
            Err(e) => Err(e),
        }
    }

    /// Replace the whole record with factory defaults
    pub async fn program_defaults(&mut self) -> Result<(), StoreError> {
        let defaults = SettingsRecord::default_for(self.board);
        self.commit(&defaults, None).await
    }

    /// Reset the tuning parameters to firmware defaults, keeping
    /// calibration and identity fields
    pub async fn program_default_parameters(&mut self) -> Result<(), StoreError> {
        let mut record = self.current_or_default().await?;
        record.params = TuningParams::default();
        self.commit(&record, None).await
    }

    /// Replace the calibration normals and face-to-LED lookup
    ///
    /// `normals` and `face_to_led` are read up to the boards' maximum
    /// face count; all other fields are kept.
    pub async fn program_calibration(
        &mut self,
        normals: &[Float3],
        face_to_led: &[u8],
        layout_index: u8,
    ) -> Result<(), StoreError> {
        let mut record = self.current_or_default().await?;
        let count = normals
            .len()
            .min(face_to_led.len())
            .min(MAX_FACE_COUNT);
        record.calibration.normals[..count].copy_from_slice(&normals[..count]);
        record.calibration.face_to_led[..count].copy_from_slice(&face_to_led[..count]);
        record.calibration.layout_index = layout_index;
        self.commit(&record, None).await
    }

    /// Set the appearance selector
    pub async fn set_design_and_color(
        &mut self,
        design: DesignAndColor,
    ) -> Result<(), StoreError> {
        let mut record = self.current_or_default().await?;
        record.design_and_color = design;
        self.commit(&record, None).await
    }

    /// Set the active behavior index
    pub async fn set_current_behavior(&mut self, behavior: u8) -> Result<(), StoreError> {
        let mut record = self.current_or_default().await?;
        record.current_behavior = behavior;
        self.commit(&record, None).await
    }

    /// Set the device name, truncated to the name field capacity
    pub async fn set_name(&mut self, name: &str) -> Result<(), StoreError> {
        let mut record = self.current_or_default().await?;
        record.name.clear();
        for ch in name.chars() {
            if record.name.push(ch).is_err() {
                break;
            }
        }
        self.commit(&record, None).await
    }

    /// Commit a record, and optionally a new profile blob, to flash
    ///
    /// With `profile_override` of `None` the currently stored profile is
    /// preserved byte-for-byte when it is valid, and replaced by the
    /// collaborator's default otherwise. Brackets the whole operation
    /// with Begin/End programming events.
    pub async fn commit(
        &mut self,
        record: &SettingsRecord,
        profile_override: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        self.notifier.notify(ProgrammingEvent::Begin);
        let result = self.commit_inner(record, profile_override).await;
        self.notifier.notify(ProgrammingEvent::End);
        result
    }

    async fn commit_inner(
        &mut self,
        record: &SettingsRecord,
        profile_override: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        let layout = self.layout();

        // Stage everything in RAM before destroying the only on-flash
        // copy. Any error up to the erase leaves the store untouched.
        let staged = StagedCommit {
            settings: record.encode(),
            profile: self.stage_profile(&layout, profile_override).await?,
        };

        if !layout.has_capacity(staged.profile.len() as u32) {
            return Err(StoreError::NoCapacity);
        }

        let mut machine = CommitMachine::new(layout, staged.profile.len() as u32);
        let mut last_error = FlashError::Io;
        let mut step = CommitStep::Issue(machine.start());
        let success = loop {
            match step {
                CommitStep::Issue(op) => {
                    let result = match op {
                        FlashOp::Erase { address, pages } => {
                            self.flash.erase(address, pages).await
                        }
                        FlashOp::WriteSettings { address } => {
                            self.flash.write(address, &staged.settings).await
                        }
                        FlashOp::WriteProfile { address } => {
                            self.flash.write(address, &staged.profile).await
                        }
                    };
                    if let Err(e) = result {
                        last_error = e;
                    }
                    step = machine.advance(result.is_ok());
                }
                CommitStep::Done(success) => break success,
            }
        };
        // `staged` drops here whatever the outcome

        if !success {
            return Err(StoreError::Flash(last_error));
        }

        // The profile region was rewritten; the collaborator's verdict
        // on the new bytes is the overall outcome.
        if self.profile.revalidate() {
            Ok(())
        } else {
            Err(StoreError::InvalidRecord)
        }
    }

    /// Build the profile staging buffer, padded to the program unit
    async fn stage_profile(
        &mut self,
        layout: &StoreLayout,
        profile_override: Option<&[u8]>,
    ) -> Result<Vec<u8>, StoreError> {
        if let Some(blob) = profile_override {
            return copy_padded(blob, layout.program_unit);
        }

        if self.profile.is_valid() {
            // Settings-only commit: preserve the stored profile. If the
            // copy does not fit in RAM, fall back to the default blob
            // rather than failing the whole commit.
            let size = self.profile.size() as usize;
            match try_vec(layout.program_size(size as u32) as usize) {
                Ok(mut staged) => {
                    self.flash
                        .read(layout.profile_address(), &mut staged[..size])
                        .await?;
                    return Ok(staged);
                }
                Err(StoreError::OutOfMemory) => {}
                Err(e) => return Err(e),
            }
        }

        let blob = self.profile.create_default()?;
        pad_to_unit(blob, layout.program_unit)
    }
}

/// Allocate a 0xFF-filled buffer, surfacing allocation failure
fn try_vec(len: usize) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| StoreError::OutOfMemory)?;
    buf.resize(len, 0xFF);
    Ok(buf)
}

fn copy_padded(src: &[u8], unit: u32) -> Result<Vec<u8>, StoreError> {
    let padded = (src.len() as u32).div_ceil(unit) * unit;
    let mut buf = try_vec(padded as usize)?;
    buf[..src.len()].copy_from_slice(src);
    Ok(buf)
}

fn pad_to_unit(mut buf: Vec<u8>, unit: u32) -> Result<Vec<u8>, StoreError> {
    let padded = ((buf.len() as u32).div_ceil(unit) * unit) as usize;
    buf.try_reserve_exact(padded - buf.len())
        .map_err(|_| StoreError::OutOfMemory)?;
    buf.resize(padded, 0xFF);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BOARD_D12, BOARD_D20};
    use crate::settings::testutil::{MockFlash, MockProfile};
    use core::sync::atomic::{AtomicU32, Ordering};
    use embassy_futures::block_on;

    fn fresh_store() -> SettingsStore<MockFlash, MockProfile> {
        SettingsStore::new(MockFlash::new(), MockProfile::new(), &BOARD_D20)
    }

    #[test]
    fn test_fresh_flash_init_programs_defaults() {
        let mut store = fresh_store();

        // No markers yet: init must repair
        assert_eq!(block_on(store.init()), Ok(true));
        let record = block_on(store.read()).unwrap();
        assert_eq!(record, SettingsRecord::default_for(&BOARD_D20));

        // Second init finds a valid record
        assert_eq!(block_on(store.init()), Ok(false));
    }

    #[test]
    fn test_read_before_init_is_invalid() {
        let mut store = fresh_store();
        assert_eq!(block_on(store.read()), Err(StoreError::InvalidRecord));
        assert_eq!(block_on(store.check_valid()), Ok(false));
    }

    #[test]
    fn test_calibration_commit_changes_only_calibration() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        let before = block_on(store.read()).unwrap();

        // Twelve faces, layout table 2, reversed LED wiring
        let normals = BOARD_D12.face_normals;
        let lookup: [u8; 12] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0];
        block_on(store.program_calibration(normals, &lookup, 2)).unwrap();

        let after = block_on(store.read()).unwrap();
        assert_eq!(&after.calibration.normals[..12], normals);
        assert_eq!(&after.calibration.face_to_led[..12], &lookup);
        assert_eq!(after.calibration.layout_index, 2);

        // Everything else untouched
        assert_eq!(after.name, before.name);
        assert_eq!(after.design_and_color, before.design_and_color);
        assert_eq!(after.current_behavior, before.current_behavior);
        assert_eq!(after.params, before.params);
    }

    #[test]
    fn test_default_parameters_keep_calibration() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        // Commit a record with tweaked parameters and calibration
        let mut record = block_on(store.read()).unwrap();
        record.params.jerk_clamp = 99.0;
        record.calibration.layout_index = 3;
        block_on(store.commit(&record, None)).unwrap();

        block_on(store.program_default_parameters()).unwrap();
        let after = block_on(store.read()).unwrap();
        assert_eq!(after.params, TuningParams::default());
        assert_eq!(after.calibration.layout_index, 3);
    }

    #[test]
    fn test_single_field_mutations() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        block_on(store.set_name("ROLLY")).unwrap();
        block_on(store.set_current_behavior(4)).unwrap();
        block_on(store.set_design_and_color(DesignAndColor::AuroraSky)).unwrap();

        let record = block_on(store.read()).unwrap();
        assert_eq!(record.name.as_str(), "ROLLY");
        assert_eq!(record.current_behavior, 4);
        assert_eq!(record.design_and_color, DesignAndColor::AuroraSky);
    }

    #[test]
    fn test_set_name_truncates() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        block_on(store.set_name("ABCDEFGHIJKLMNOPQRST")).unwrap();
        let record = block_on(store.read()).unwrap();
        assert_eq!(record.name.as_str(), "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn test_settings_only_commit_preserves_profile_bytes() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        // The init commit wrote the collaborator's default blob into
        // the profile region; mark it valid so the next commit
        // preserves it.
        let blob = store.profile_mut().default_blob.clone();
        let profile_address = store.layout().profile_address();
        assert_eq!(
            store.flash_mut().region(profile_address, blob.len()),
            &blob[..]
        );
        store.profile_mut().valid = true;
        store.profile_mut().size = blob.len() as u32;

        block_on(store.set_name("KEEPER")).unwrap();

        assert_eq!(
            store.flash_mut().region(profile_address, blob.len()),
            &blob[..]
        );
    }

    #[test]
    fn test_wiped_profile_falls_back_to_default_blob() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        // A settings download erases the store span out from under the
        // collaborator; one that re-reads flash reports invalid, and the
        // next mutation must stage the default blob, not erased bytes.
        let layout = store.layout();
        block_on(store.flash_mut().erase(layout.origin, 1)).unwrap();
        store.profile_mut().valid = false;

        block_on(store.set_name("AFTER")).unwrap();

        let blob = store.profile_mut().default_blob.clone();
        assert_eq!(
            store.flash_mut().region(layout.profile_address(), blob.len()),
            &blob[..]
        );
        assert!(store
            .flash_mut()
            .region(layout.profile_address(), blob.len())
            .iter()
            .any(|&b| b != 0xFF));
    }

    #[test]
    fn test_profile_override_is_written() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        let record = block_on(store.read()).unwrap();
        let blob = [0xA5u8; 100];
        block_on(store.commit(&record, Some(&blob))).unwrap();

        let profile_address = store.layout().profile_address();
        assert_eq!(
            store.flash_mut().region(profile_address, blob.len()),
            &blob[..]
        );
    }

    #[test]
    fn test_failed_commit_yields_old_or_invalid_never_hybrid() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        block_on(store.set_name("FIRST")).unwrap();
        let first = block_on(store.read()).unwrap();

        // Fail the settings write of the next commit
        let writes_so_far = store.flash_mut().writes;
        store.flash_mut().fail_write_at = Some(writes_so_far);
        let result = block_on(store.set_current_behavior(9));
        assert_eq!(result, Err(StoreError::Flash(FlashError::Io)));

        // The erase destroyed the old image and the new one never
        // landed, so the region must read as invalid - but if it were
        // somehow readable it would have to equal `first` exactly.
        match block_on(store.read()) {
            Err(StoreError::InvalidRecord) => {}
            Ok(record) => assert_eq!(record, first),
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_no_capacity_performs_no_erase() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        let record = block_on(store.read()).unwrap();

        let erases_before = store.flash_mut().erases;
        let usable = store.layout().usable_bytes as usize;
        let huge = try_vec(usable).unwrap(); // cannot fit behind the record
        let result = block_on(store.commit(&record, Some(&huge)));

        assert_eq!(result, Err(StoreError::NoCapacity));
        assert_eq!(store.flash_mut().erases, erases_before);
        // Prior record intact
        assert_eq!(block_on(store.read()).unwrap(), record);
    }

    #[test]
    fn test_default_profile_oom_aborts_before_erase() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        let record = block_on(store.read()).unwrap();

        store.profile_mut().default_fails = true;
        let erases_before = store.flash_mut().erases;
        let result = block_on(store.commit(&record, None));

        assert_eq!(result, Err(StoreError::OutOfMemory));
        assert_eq!(store.flash_mut().erases, erases_before);
        assert_eq!(block_on(store.read()).unwrap(), record);
    }

    #[test]
    fn test_erase_failure_reports_flash_error() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        store.flash_mut().fail_next_erase = true;
        let result = block_on(store.program_defaults());
        assert_eq!(result, Err(StoreError::Flash(FlashError::Io)));
    }

    #[test]
    fn test_profile_revalidation_failure_fails_commit() {
        let mut store = fresh_store();
        block_on(store.init()).unwrap();

        store.profile_mut().revalidate_result = false;
        let result = block_on(store.program_defaults());
        assert_eq!(result, Err(StoreError::InvalidRecord));
        assert!(store.profile_mut().revalidations > 0);
    }

    static BEGINS: AtomicU32 = AtomicU32::new(0);
    static ENDS: AtomicU32 = AtomicU32::new(0);

    fn bracket_hook(_token: u32, event: ProgrammingEvent) {
        match event {
            ProgrammingEvent::Begin => BEGINS.fetch_add(1, Ordering::Relaxed),
            ProgrammingEvent::End => ENDS.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[test]
    fn test_notifier_brackets_success_and_failure() {
        BEGINS.store(0, Ordering::Relaxed);
        ENDS.store(0, Ordering::Relaxed);

        let mut store = fresh_store();
        block_on(store.init()).unwrap();
        assert!(store.notifier_mut().register(bracket_hook, 0));

        block_on(store.set_name("OK")).unwrap();
        assert_eq!(BEGINS.load(Ordering::Relaxed), 1);
        assert_eq!(ENDS.load(Ordering::Relaxed), 1);

        store.flash_mut().fail_next_erase = true;
        let _ = block_on(store.set_name("FAIL"));
        assert_eq!(BEGINS.load(Ordering::Relaxed), 2);
        assert_eq!(ENDS.load(Ordering::Relaxed), 2);
    }
}
