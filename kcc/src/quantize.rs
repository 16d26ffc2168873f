//! Position compression on the fixed `1 / POSITION_ACCURACY` grid.
//!
//! The replicated transform stores the compressed position, and a separate
//! extension record carries the sub-grid remainder so the receiver can rebuild
//! the full-precision value:
//!
//! - `base = decompress(compress(p))`
//! - `extension = p - base`
//! - `p ≈ base + extension`

use crate::{
    collision::Vec3,
    constants::{INV_POSITION_ACCURACY, POSITION_ACCURACY},
};

/// Compress a single coordinate onto the accuracy grid.
#[inline]
pub fn compress_f32(value: f32) -> i32 {
    let q = (value * POSITION_ACCURACY).round();
    q.clamp(i32::MIN as f32, i32::MAX as f32) as i32
}

#[inline]
pub fn decompress_f32(code: i32) -> f32 {
    code as f32 * INV_POSITION_ACCURACY
}

#[inline]
pub fn compress_position(position: Vec3) -> [i32; 3] {
    [
        compress_f32(position.x),
        compress_f32(position.y),
        compress_f32(position.z),
    ]
}

#[inline]
pub fn decompress_position(code: [i32; 3]) -> Vec3 {
    Vec3::new(
        decompress_f32(code[0]),
        decompress_f32(code[1]),
        decompress_f32(code[2]),
    )
}

/// Sub-grid remainder lost by compression.
#[inline]
pub fn position_extension(position: Vec3) -> Vec3 {
    position - decompress_position(compress_position(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn compressed_base_is_within_one_grid_cell() {
        let p = Vec3::new(1.2345, -987.654, 0.0001);
        let base = decompress_position(compress_position(p));
        for i in 0..3 {
            assert!((base[i] - p[i]).abs() <= INV_POSITION_ACCURACY * 0.5 + f32::EPSILON);
        }
    }

    #[test]
    fn base_plus_extension_rebuilds_random_positions() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x4b43_4301);

        for _ in 0..10_000 {
            let p = Vec3::new(
                rng.random_range(-10_000.0..10_000.0),
                rng.random_range(-10_000.0..10_000.0),
                rng.random_range(-10_000.0..10_000.0),
            );
            let base = decompress_position(compress_position(p));
            let rebuilt = base + position_extension(p);

            for i in 0..3 {
                assert!(
                    (rebuilt[i] - p[i]).abs() <= INV_POSITION_ACCURACY,
                    "axis {i}: {} vs {}",
                    rebuilt[i],
                    p[i]
                );
                // The extension recovers the value down to float precision.
                assert!((rebuilt[i] - p[i]).abs() <= p[i].abs() * f32::EPSILON * 2.0);
            }
        }
    }

    #[test]
    fn negative_values_round_to_nearest() {
        assert_eq!(compress_f32(-0.5 / POSITION_ACCURACY - 0.0001), -1);
        assert_eq!(compress_f32(-1.0), -1024);
        assert_eq!(compress_f32(0.0), 0);
    }
}
