use num_traits::{PrimInt, WrappingAdd, WrappingSub};

/// Maps a zigzag-encoded unsigned value back to its two's complement form:
/// `0, 1, 2, 3, 4 -> 0, -1, 1, -2, 2`.
#[inline]
pub fn unzigzag<T>(v: T) -> T
where
    T: PrimInt + WrappingSub,
{
    T::zero().wrapping_sub(&(v & T::one())) ^ v.unsigned_shr(1)
}

/// Adds a zigzag-encoded delta to `prev`, wrapping at the type width.
#[inline]
pub fn apply_zigzag_delta<T>(prev: T, encoded: T) -> T
where
    T: PrimInt + WrappingAdd + WrappingSub,
{
    unzigzag(encoded).wrapping_add(&prev)
}

/// Reverses the bit order of a byte with the 64-bit multiply trick.
///
/// `0b0000_0001 -> 0b1000_0000`, `0b1100_1010 -> 0b0101_0011`.
#[inline]
pub fn reverse_bits8(b: u8) -> u8 {
    (((b as u64).wrapping_mul(0x8020_0802) & 0x08_8442_2110).wrapping_mul(0x01_0101_0101) >> 32) as u8
}

/// Rotates left by `r` bits, `r` taken modulo 32.
#[inline]
pub fn rotate32(v: u32, r: u32) -> u32 {
    v.rotate_left(r & 31)
}

/// Rotation the decoder applies for an xor channel tag.
#[inline]
pub fn channel_rotation(channel: u8) -> u32 {
    (32 - (channel as u32 >> 4)) & 31
}

/// Returns the number of '1' bits in a byte.
#[inline]
pub const fn count_ones8(n: u8) -> u8 {
    n.count_ones() as u8
}
