//! Byte-level encoding of integer, float, and string registers.

use crate::{Endianness, Sign};

/// Inclusive bit range of an integer register; bit 0 is the least
/// significant bit of the decoded register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitField {
    pub(crate) lsb: u32,
    pub(crate) width: u32,
}

impl BitField {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn whole(length: usize) -> Self {
        Self {
            lsb: 0,
            width: length as u32 * 8,
        }
    }

    /// `None` when `lsb > msb` or the field does not fit in `length` bytes.
    pub(crate) const fn from_bits(lsb: u8, msb: u8, length: usize) -> Option<Self> {
        if lsb > msb || msb as usize >= length * 8 {
            return None;
        }
        Some(Self {
            lsb: lsb as u32,
            width: (msb - lsb) as u32 + 1,
        })
    }

    pub(crate) const fn covers(self, length: usize) -> bool {
        self.lsb == 0 && self.width as usize == length * 8
    }

    const fn mask(self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Representable range of the field.
    pub(crate) const fn bounds(self, sign: Sign) -> (i64, i64) {
        match sign {
            Sign::Unsigned if self.width >= 63 => (0, i64::MAX),
            Sign::Unsigned => (0, (1 << self.width) - 1),
            Sign::Signed if self.width >= 64 => (i64::MIN, i64::MAX),
            Sign::Signed => (-(1 << (self.width - 1)), (1 << (self.width - 1)) - 1),
        }
    }
}

fn read_raw(bytes: &[u8], endianness: Endianness) -> u64 {
    let fold = |raw: u64, byte: &u8| (raw << 8) | u64::from(*byte);
    match endianness {
        Endianness::Little => bytes.iter().rev().fold(0, fold),
        Endianness::Big => bytes.iter().fold(0, fold),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_raw(raw: u64, endianness: Endianness, out: &mut [u8]) {
    let len = out.len();
    for position in 0..len {
        let byte = (raw >> (8 * position)) as u8;
        match endianness {
            Endianness::Little => out[position] = byte,
            Endianness::Big => out[len - 1 - position] = byte,
        }
    }
}

/// Decodes the field as an integer. `None` for unsigned 64-bit values above
/// `i64::MAX`, which have no `i64` representation.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn decode_integer(
    bytes: &[u8],
    endianness: Endianness,
    sign: Sign,
    field: BitField,
) -> Option<i64> {
    let raw = (read_raw(bytes, endianness) >> field.lsb) & field.mask();
    match sign {
        Sign::Unsigned => i64::try_from(raw).ok(),
        Sign::Signed if field.width >= 64 => Some(raw as i64),
        Sign::Signed => {
            let shift = 64 - field.width;
            Some(((raw << shift) as i64) >> shift)
        }
    }
}

/// Merges `value` into the field of `register`, keeping the other bits.
#[allow(clippy::cast_sign_loss)]
pub(crate) fn encode_integer(
    value: i64,
    register: &mut [u8],
    endianness: Endianness,
    field: BitField,
) {
    let raw = read_raw(register, endianness);
    let mask = field.mask() << field.lsb;
    let merged = (raw & !mask) | (((value as u64) & field.mask()) << field.lsb);
    write_raw(merged, endianness, register);
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn decode_float(bytes: &[u8], endianness: Endianness) -> f64 {
    let raw = read_raw(bytes, endianness);
    if bytes.len() == 4 {
        f64::from(f32::from_bits(raw as u32))
    } else {
        f64::from_bits(raw)
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn encode_float(value: f64, register: &mut [u8], endianness: Endianness) {
    let raw = if register.len() == 4 {
        u64::from((value as f32).to_bits())
    } else {
        value.to_bits()
    };
    write_raw(raw, endianness, register);
}

/// Text up to the first NUL byte.
pub(crate) fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
