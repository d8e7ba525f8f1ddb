//! Packed half-precision 4-lane vectors
//!
//! Every tensor element in this crate is a [`Half4`]: four IEEE-754 binary16
//! lanes packed into two 32-bit words. This is the storage format shared by
//! the CPU executors and the WGSL shader (`vec2<u32>`).
//!
//! # Packing
//!
//! ```text
//! word 0: | lane 1 (bits 31..16) | lane 0 (bits 15..0) |
//! word 1: | lane 3 (bits 31..16) | lane 2 (bits 15..0) |
//! ```
//!
//! # Example
//!
//! ```
//! use pointwise_conv::half4::{decode, encode};
//!
//! let packed = encode([1.0, -2.0, 0.5, 6.0]);
//! assert_eq!(decode(packed), [1.0, -2.0, 0.5, 6.0]);
//! ```

use bytemuck::{Pod, Zeroable};
use half::f16;

/// Four f32 lanes, the unpacked form of [`Half4`]
pub type Vec4 = [f32; 4];

/// Four binary16 lanes packed into two 32-bit words
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Half4 {
    words: [u32; 2],
}

impl Half4 {
    /// All lanes `+0.0`
    pub const ZERO: Self = Self { words: [0, 0] };

    /// Build from raw words (word 0 = lanes 0/1, word 1 = lanes 2/3)
    pub const fn from_words(words: [u32; 2]) -> Self {
        Self { words }
    }

    /// Raw packed words
    pub const fn words(self) -> [u32; 2] {
        self.words
    }

    /// Build from four binary16 lanes
    pub fn from_lanes(lanes: [f16; 4]) -> Self {
        Self {
            words: [pack_pair(lanes[0], lanes[1]), pack_pair(lanes[2], lanes[3])],
        }
    }

    /// The four binary16 lanes
    pub fn lanes(self) -> [f16; 4] {
        let (l0, l1) = unpack_pair(self.words[0]);
        let (l2, l3) = unpack_pair(self.words[1]);
        [l0, l1, l2, l3]
    }

    /// Same value in every lane
    pub fn splat(value: f32) -> Self {
        encode([value; 4])
    }
}

#[inline]
fn pack_pair(lo: f16, hi: f16) -> u32 {
    u32::from(lo.to_bits()) | (u32::from(hi.to_bits()) << 16)
}

#[inline]
fn unpack_pair(word: u32) -> (f16, f16) {
    (
        f16::from_bits((word & 0xffff) as u16),
        f16::from_bits((word >> 16) as u16),
    )
}

/// Unpack four binary16 lanes into f32
///
/// Any bit pattern is accepted; NaN and infinities widen as binary16 defines.
#[inline]
pub fn decode(packed: Half4) -> Vec4 {
    packed.lanes().map(f16::to_f32)
}

/// Round four f32 lanes to binary16 (nearest-even) and pack them
///
/// Values beyond the binary16 range become infinities.
#[inline]
pub fn encode(lanes: Vec4) -> Half4 {
    Half4::from_lanes(lanes.map(f16::from_f32))
}
