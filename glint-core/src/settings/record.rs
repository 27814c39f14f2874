//! On-flash settings record layout, validity, and factory defaults
//!
//! The record is a fixed-size little-endian image bracketed by validity
//! markers. Markers and format version exist only in the encoded image:
//! [`SettingsRecord::encode`] stamps them and [`SettingsRecord::decode`]
//! verifies them, so an in-RAM record can never carry a stale version.
//!
//! Layout (byte offsets):
//!
//! ```text
//!   0  head marker          u32
//!   4  version              u32
//!   8  name                 16 bytes, NUL padded
//!  24  design and color     u8
//!  25  current behavior     u8
//!  26  face layout index    u8
//!  27  reserved             u8 (keeps the f32 block word aligned)
//!  28  tuning parameters    12 x f32
//!  76  face normals         20 x 3 x f32
//! 316  face-to-LED lookup   20 x u8
//! 336  tail marker          u32
//! ```

use heapless::String;

use crate::board::{BoardDescriptor, Float3, MAX_FACE_COUNT};

use super::StoreError;

/// Sentinel bracketing a valid record
pub const SETTINGS_VALID_MARKER: u32 = 0x15E7_7165;

/// Current record format version
///
/// Must match exactly; records written by any other firmware build are
/// treated as invalid, never migrated.
pub const SETTINGS_VERSION: u32 = 3;

/// Maximum device name length (excluding the NUL terminator)
pub const MAX_NAME_LENGTH: usize = 15;

const NAME_FIELD_SIZE: usize = MAX_NAME_LENGTH + 1;
const PARAM_COUNT: usize = 12;

const OFF_HEAD: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_NAME: usize = 8;
const OFF_DESIGN: usize = OFF_NAME + NAME_FIELD_SIZE;
const OFF_BEHAVIOR: usize = OFF_DESIGN + 1;
const OFF_LAYOUT: usize = OFF_BEHAVIOR + 1;
const OFF_PARAMS: usize = OFF_LAYOUT + 2; // one reserved byte for alignment
const OFF_NORMALS: usize = OFF_PARAMS + PARAM_COUNT * 4;
const OFF_LOOKUP: usize = OFF_NORMALS + MAX_FACE_COUNT * 12;
const OFF_TAIL: usize = OFF_LOOKUP + MAX_FACE_COUNT;

/// Size of the encoded record in bytes
pub const SETTINGS_SIZE: usize = OFF_TAIL + 4;

/// Device appearance selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DesignAndColor {
    Unknown = 0,
    #[default]
    Generic = 1,
    OnyxBlack = 2,
    HematiteGrey = 3,
    MidnightGalaxy = 4,
    AuroraSky = 5,
}

impl DesignAndColor {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DesignAndColor::Unknown),
            1 => Some(DesignAndColor::Generic),
            2 => Some(DesignAndColor::OnyxBlack),
            3 => Some(DesignAndColor::HematiteGrey),
            4 => Some(DesignAndColor::MidnightGalaxy),
            5 => Some(DesignAndColor::AuroraSky),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Motion-detection and battery tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuningParams {
    /// Clamp applied to per-sample jerk before accumulation
    pub jerk_clamp: f32,
    /// Decay rate of the motion sigma estimate
    pub sigma_decay: f32,
    /// Sigma above which the die is considered moving
    pub start_moving_threshold: f32,
    /// Sigma below which the die is considered at rest
    pub stop_moving_threshold: f32,
    /// Dot-product threshold for face-up detection
    pub face_threshold: f32,
    /// Acceleration magnitude below which the die is falling
    pub falling_threshold: f32,
    /// Acceleration magnitude treated as a shock/tap
    pub shock_threshold: f32,
    /// Battery voltage considered empty
    pub battery_low: f32,
    /// Battery voltage considered full
    pub battery_high: f32,
    /// Accelerometer smoothing decay
    pub acc_decay: f32,
    /// LED thermal model heat-up rate
    pub heat_up_rate: f32,
    /// LED thermal model cool-down rate
    pub cool_down_rate: f32,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            jerk_clamp: 10.0,
            sigma_decay: 0.5,
            start_moving_threshold: 5.0,
            stop_moving_threshold: 0.5,
            face_threshold: 0.98,
            falling_threshold: 0.1,
            shock_threshold: 7.5,
            battery_low: 3.0,
            battery_high: 4.0,
            acc_decay: 0.9,
            heat_up_rate: 0.0004,
            cool_down_rate: 0.995,
        }
    }
}

impl TuningParams {
    fn to_array(self) -> [f32; PARAM_COUNT] {
        [
            self.jerk_clamp,
            self.sigma_decay,
            self.start_moving_threshold,
            self.stop_moving_threshold,
            self.face_threshold,
            self.falling_threshold,
            self.shock_threshold,
            self.battery_low,
            self.battery_high,
            self.acc_decay,
            self.heat_up_rate,
            self.cool_down_rate,
        ]
    }

    fn from_array(values: [f32; PARAM_COUNT]) -> Self {
        Self {
            jerk_clamp: values[0],
            sigma_decay: values[1],
            start_moving_threshold: values[2],
            stop_moving_threshold: values[3],
            face_threshold: values[4],
            falling_threshold: values[5],
            shock_threshold: values[6],
            battery_low: values[7],
            battery_high: values[8],
            acc_decay: values[9],
            heat_up_rate: values[10],
            cool_down_rate: values[11],
        }
    }
}

/// Per-face calibration data
///
/// Entries past the board's face count are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Measured unit normal of each face
    pub normals: [Float3; MAX_FACE_COUNT],
    /// Which LED lights up for each face
    pub face_to_led: [u8; MAX_FACE_COUNT],
    /// Selects among the precomputed layout lookup tables
    pub layout_index: u8,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            normals: [Float3::ZERO; MAX_FACE_COUNT],
            face_to_led: [0; MAX_FACE_COUNT],
            layout_index: 0,
        }
    }
}

impl Calibration {
    /// Canonical calibration for a board variant
    pub fn default_for(board: &BoardDescriptor) -> Self {
        let mut cal = Self::default();
        let count = (board.face_count as usize).min(MAX_FACE_COUNT);
        cal.normals[..count].copy_from_slice(&board.face_normals[..count]);
        cal.face_to_led[..count].copy_from_slice(&board.face_to_led[..count]);
        cal
    }
}

/// The settings record, payload fields only
///
/// Markers and version live exclusively in the encoded image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsRecord {
    /// Device name, also used as the advertised wireless name
    pub name: String<MAX_NAME_LENGTH>,
    /// Appearance selector
    pub design_and_color: DesignAndColor,
    /// Index of the active behavior program
    pub current_behavior: u8,
    /// Motion/battery tuning parameters
    pub params: TuningParams,
    /// Per-face calibration data
    pub calibration: Calibration,
}

impl SettingsRecord {
    /// Factory-default record for a board variant
    ///
    /// Pure: usable both to seed a first-ever flash image and to repair
    /// a corrupted one.
    pub fn default_for(board: &BoardDescriptor) -> Self {
        let mut name = String::new();
        // "GLINT" always fits in the name field
        let _ = name.push_str("GLINT");
        Self {
            name,
            design_and_color: DesignAndColor::Generic,
            current_behavior: 0,
            params: TuningParams::default(),
            calibration: Calibration::default_for(board),
        }
    }

    /// Encode to the on-flash image, stamping markers and version
    pub fn encode(&self) -> [u8; SETTINGS_SIZE] {
        let mut buf = [0u8; SETTINGS_SIZE];

        put_u32(&mut buf, OFF_HEAD, SETTINGS_VALID_MARKER);
        put_u32(&mut buf, OFF_VERSION, SETTINGS_VERSION);

        let name = self.name.as_bytes();
        buf[OFF_NAME..OFF_NAME + name.len()].copy_from_slice(name);
        // remaining name bytes stay NUL

        buf[OFF_DESIGN] = self.design_and_color.as_u8();
        buf[OFF_BEHAVIOR] = self.current_behavior;
        buf[OFF_LAYOUT] = self.calibration.layout_index;

        for (i, value) in self.params.to_array().iter().enumerate() {
            put_f32(&mut buf, OFF_PARAMS + i * 4, *value);
        }

        for (i, normal) in self.calibration.normals.iter().enumerate() {
            let off = OFF_NORMALS + i * 12;
            put_f32(&mut buf, off, normal.x);
            put_f32(&mut buf, off + 4, normal.y);
            put_f32(&mut buf, off + 8, normal.z);
        }

        buf[OFF_LOOKUP..OFF_LOOKUP + MAX_FACE_COUNT].copy_from_slice(&self.calibration.face_to_led);

        put_u32(&mut buf, OFF_TAIL, SETTINGS_VALID_MARKER);
        buf
    }

    /// Decode an on-flash image, verifying markers and version
    pub fn decode(bytes: &[u8; SETTINGS_SIZE]) -> Result<Self, StoreError> {
        if !region_valid(bytes) {
            return Err(StoreError::InvalidRecord);
        }

        let name_field = &bytes[OFF_NAME..OFF_NAME + NAME_FIELD_SIZE];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        let name_str = core::str::from_utf8(&name_field[..name_len])
            .map_err(|_| StoreError::InvalidRecord)?;
        let name = String::try_from(name_str).map_err(|_| StoreError::InvalidRecord)?;

        let mut values = [0f32; PARAM_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            *value = get_f32(bytes, OFF_PARAMS + i * 4);
        }

        let mut normals = [Float3::ZERO; MAX_FACE_COUNT];
        for (i, normal) in normals.iter_mut().enumerate() {
            let off = OFF_NORMALS + i * 12;
            normal.x = get_f32(bytes, off);
            normal.y = get_f32(bytes, off + 4);
            normal.z = get_f32(bytes, off + 8);
        }

        let mut face_to_led = [0u8; MAX_FACE_COUNT];
        face_to_led.copy_from_slice(&bytes[OFF_LOOKUP..OFF_LOOKUP + MAX_FACE_COUNT]);

        Ok(Self {
            name,
            design_and_color: DesignAndColor::from_u8(bytes[OFF_DESIGN])
                .unwrap_or(DesignAndColor::Unknown),
            current_behavior: bytes[OFF_BEHAVIOR],
            params: TuningParams::from_array(values),
            calibration: Calibration {
                normals,
                face_to_led,
                layout_index: bytes[OFF_LAYOUT],
            },
        })
    }
}

/// Marker and version check on a raw settings image
///
/// Cheap enough to run on every read; validity is never cached across a
/// flash mutation.
pub fn region_valid(bytes: &[u8]) -> bool {
    bytes.len() >= SETTINGS_SIZE
        && get_u32(bytes, OFF_HEAD) == SETTINGS_VALID_MARKER
        && get_u32(bytes, OFF_VERSION) == SETTINGS_VERSION
        && get_u32(bytes, OFF_TAIL) == SETTINGS_VALID_MARKER
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(bytes)
}

fn put_f32(buf: &mut [u8], off: usize, value: f32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_f32(buf: &[u8], off: usize) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    f32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BOARD_D20;
    use proptest::prelude::*;

    #[test]
    fn test_default_record_is_valid_and_deterministic() {
        let a = SettingsRecord::default_for(&BOARD_D20);
        let b = SettingsRecord::default_for(&BOARD_D20);
        assert_eq!(a, b);

        let image = a.encode();
        assert!(region_valid(&image));
        assert_eq!(SettingsRecord::decode(&image).unwrap(), a);
    }

    #[test]
    fn test_default_calibration_copies_board_tables() {
        let record = SettingsRecord::default_for(&BOARD_D20);
        for (i, normal) in BOARD_D20.face_normals.iter().enumerate() {
            assert_eq!(record.calibration.normals[i], *normal);
        }
        assert_eq!(record.calibration.layout_index, 0);
    }

    #[test]
    fn test_erased_flash_is_invalid() {
        let image = [0xFFu8; SETTINGS_SIZE];
        assert!(!region_valid(&image));
        assert_eq!(
            SettingsRecord::decode(&image),
            Err(StoreError::InvalidRecord)
        );
    }

    #[test]
    fn test_short_buffer_is_invalid() {
        let image = SettingsRecord::default_for(&BOARD_D20).encode();
        assert!(!region_valid(&image[..SETTINGS_SIZE - 1]));
    }

    #[test]
    fn test_name_roundtrip_and_nul_padding() {
        let mut record = SettingsRecord::default_for(&BOARD_D20);
        record.name = String::try_from("ABCDEFGHIJKLMNO").unwrap(); // 15 chars
        let image = record.encode();
        assert_eq!(image[OFF_NAME + 15], 0);
        assert_eq!(
            SettingsRecord::decode(&image).unwrap().name.as_str(),
            "ABCDEFGHIJKLMNO"
        );
    }

    proptest! {
        // Flipping any single bit of either marker or the version makes
        // the image invalid.
        #[test]
        fn prop_marker_bit_flip_invalidates(byte in 0usize..8, bit in 0u8..8) {
            let mut image = SettingsRecord::default_for(&BOARD_D20).encode();
            image[byte] ^= 1 << bit;
            prop_assert!(!region_valid(&image));
        }

        #[test]
        fn prop_tail_bit_flip_invalidates(byte in OFF_TAIL..SETTINGS_SIZE, bit in 0u8..8) {
            let mut image = SettingsRecord::default_for(&BOARD_D20).encode();
            image[byte] ^= 1 << bit;
            prop_assert!(!region_valid(&image));
        }

        // Payload fields survive an encode/decode cycle.
        #[test]
        fn prop_payload_roundtrip(behavior: u8, design in 0u8..6, layout: u8) {
            let mut record = SettingsRecord::default_for(&BOARD_D20);
            record.current_behavior = behavior;
            record.design_and_color = DesignAndColor::from_u8(design).unwrap();
            record.calibration.layout_index = layout;
            let decoded = SettingsRecord::decode(&record.encode()).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
