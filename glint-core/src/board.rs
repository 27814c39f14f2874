//! Board descriptors
//!
//! Each die variant carries a canonical table of per-face unit normals
//! (in the accelerometer's frame) and a default face-to-LED lookup.
//! The settings store copies these into flash when synthesizing default
//! calibration data; nothing here is ever written at runtime.

/// Largest face count supported by any board variant
pub const MAX_FACE_COUNT: usize = 20;

/// A 3-component vector, one per die face
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Float3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Float3 = Float3::new(0.0, 0.0, 0.0);
}

/// Static description of one board variant
///
/// `face_normals` and `face_to_led` are `face_count` entries long.
#[derive(Debug, Clone, Copy)]
pub struct BoardDescriptor {
    pub face_count: u8,
    pub face_normals: &'static [Float3],
    pub face_to_led: &'static [u8],
}

impl BoardDescriptor {
    /// Look up the descriptor for a given face count
    pub fn for_face_count(face_count: u8) -> Option<&'static BoardDescriptor> {
        match face_count {
            6 => Some(&BOARD_D6),
            12 => Some(&BOARD_D12),
            20 => Some(&BOARD_D20),
            _ => None,
        }
    }
}

// Six-sided die: faces along the cube axes, 1 and 6 on Z.
const D6_NORMALS: [Float3; 6] = [
    Float3::new(0.0, 0.0, 1.0),
    Float3::new(1.0, 0.0, 0.0),
    Float3::new(0.0, 1.0, 0.0),
    Float3::new(0.0, -1.0, 0.0),
    Float3::new(-1.0, 0.0, 0.0),
    Float3::new(0.0, 0.0, -1.0),
];

const D6_LOOKUP: [u8; 6] = [0, 1, 2, 3, 4, 5];

// Twelve-sided die: dodecahedron face normals, i.e. the icosahedron
// vertices, cyclic permutations of (0, +/-a, +/-b) with a = 1/phi and
// b = phi, normalized.
const D12_A: f32 = 0.525_731;
const D12_B: f32 = 0.850_651;

const D12_NORMALS: [Float3; 12] = [
    Float3::new(0.0, D12_A, D12_B),
    Float3::new(0.0, -D12_A, D12_B),
    Float3::new(D12_B, 0.0, D12_A),
    Float3::new(-D12_B, 0.0, D12_A),
    Float3::new(D12_A, D12_B, 0.0),
    Float3::new(-D12_A, D12_B, 0.0),
    Float3::new(D12_A, -D12_B, 0.0),
    Float3::new(-D12_A, -D12_B, 0.0),
    Float3::new(D12_B, 0.0, -D12_A),
    Float3::new(-D12_B, 0.0, -D12_A),
    Float3::new(0.0, D12_A, -D12_B),
    Float3::new(0.0, -D12_A, -D12_B),
];

const D12_LOOKUP: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

// Twenty-sided die: icosahedron face normals. Eight corners of the cube
// scaled to unit length plus cyclic permutations of (0, +/-c, +/-d) with
// c = 1/phi^2 and d = phi/sqrt(3), normalized.
const D20_S: f32 = 0.577_350;
const D20_C: f32 = 0.356_822;
const D20_D: f32 = 0.934_172;

const D20_NORMALS: [Float3; 20] = [
    Float3::new(D20_S, D20_S, D20_S),
    Float3::new(-D20_S, D20_S, D20_S),
    Float3::new(D20_S, -D20_S, D20_S),
    Float3::new(-D20_S, -D20_S, D20_S),
    Float3::new(D20_S, D20_S, -D20_S),
    Float3::new(-D20_S, D20_S, -D20_S),
    Float3::new(D20_S, -D20_S, -D20_S),
    Float3::new(-D20_S, -D20_S, -D20_S),
    Float3::new(0.0, D20_C, D20_D),
    Float3::new(0.0, -D20_C, D20_D),
    Float3::new(0.0, D20_C, -D20_D),
    Float3::new(0.0, -D20_C, -D20_D),
    Float3::new(D20_C, D20_D, 0.0),
    Float3::new(-D20_C, D20_D, 0.0),
    Float3::new(D20_C, -D20_D, 0.0),
    Float3::new(-D20_C, -D20_D, 0.0),
    Float3::new(D20_D, 0.0, D20_C),
    Float3::new(D20_D, 0.0, -D20_C),
    Float3::new(-D20_D, 0.0, D20_C),
    Float3::new(-D20_D, 0.0, -D20_C),
];

const D20_LOOKUP: [u8; 20] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19,
];

/// Six-face board variant
pub static BOARD_D6: BoardDescriptor = BoardDescriptor {
    face_count: 6,
    face_normals: &D6_NORMALS,
    face_to_led: &D6_LOOKUP,
};

/// Twelve-face board variant
pub static BOARD_D12: BoardDescriptor = BoardDescriptor {
    face_count: 12,
    face_normals: &D12_NORMALS,
    face_to_led: &D12_LOOKUP,
};

/// Twenty-face board variant
pub static BOARD_D20: BoardDescriptor = BoardDescriptor {
    face_count: 20,
    face_normals: &D20_NORMALS,
    face_to_led: &D20_LOOKUP,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn length(v: &Float3) -> f32 {
        libm_sqrt(v.x * v.x + v.y * v.y + v.z * v.z)
    }

    // f32::sqrt is std-only; Newton iterations are plenty for a test.
    fn libm_sqrt(x: f32) -> f32 {
        if x == 0.0 {
            return 0.0;
        }
        let mut guess = x;
        for _ in 0..20 {
            guess = 0.5 * (guess + x / guess);
        }
        guess
    }

    #[test]
    fn test_lookup_by_face_count() {
        assert_eq!(BoardDescriptor::for_face_count(6).unwrap().face_count, 6);
        assert_eq!(BoardDescriptor::for_face_count(12).unwrap().face_count, 12);
        assert_eq!(BoardDescriptor::for_face_count(20).unwrap().face_count, 20);
        assert!(BoardDescriptor::for_face_count(8).is_none());
    }

    #[test]
    fn test_tables_match_face_count() {
        for board in [&BOARD_D6, &BOARD_D12, &BOARD_D20] {
            assert_eq!(board.face_normals.len(), board.face_count as usize);
            assert_eq!(board.face_to_led.len(), board.face_count as usize);
            assert!(board.face_count as usize <= MAX_FACE_COUNT);
        }
    }

    #[test]
    fn test_normals_are_unit_length() {
        for board in [&BOARD_D6, &BOARD_D12, &BOARD_D20] {
            for normal in board.face_normals {
                let len = length(normal);
                assert!(
                    (len - 1.0).abs() < 1e-3,
                    "face normal {:?} has length {}",
                    normal,
                    len
                );
            }
        }
    }
}
