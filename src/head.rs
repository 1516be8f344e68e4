//! Encoding and decoding of a single CBOR "head" (major type + argument),
//! carried over from the teacher crate's `builder::low_level::write_info`
//! and `reader::integer`, generalised to a byte-cursor based reader.
use crate::{
    constants::*,
    cursor::Cursor,
    error::{CodecError, MalformedDetail, WhileParsing},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    Value(u64),
    Indefinite,
}

#[derive(Debug, Clone, Copy)]
pub struct Head {
    pub major: u8,
    pub argument: Argument,
    /// The raw 5-bit info field the head was encoded with. Needed to tell
    /// apart a major-type-7 float16/32/64 bit pattern (info 25/26/27) from
    /// a plain numeric argument of the same resolved value, which
    /// `argument` alone cannot distinguish.
    pub info: u8,
}

/// Writes the shortest legal encoding of `(major, value)`. Returns the
/// number of bytes written, matching `write_info` in the teacher crate.
pub fn emit_head(bytes: &mut Vec<u8>, major: u8, value: u64) -> usize {
    if value < 24 {
        bytes.push(major << 5 | (value as u8));
        1
    } else if value < 0x100 {
        bytes.push(major << 5 | 24);
        bytes.push(value as u8);
        2
    } else if value < 0x1_0000 {
        bytes.push(major << 5 | 25);
        bytes.push((value >> 8) as u8);
        bytes.push(value as u8);
        3
    } else if value < 0x1_0000_0000 {
        bytes.push(major << 5 | 26);
        bytes.extend_from_slice(&(value as u32).to_be_bytes());
        5
    } else {
        bytes.push(major << 5 | 27);
        bytes.extend_from_slice(&value.to_be_bytes());
        9
    }
}

pub fn emit_indefinite(bytes: &mut Vec<u8>, major: u8) {
    bytes.push(major << 5 | INDEFINITE_SIZE);
}

pub fn emit_break(bytes: &mut Vec<u8>) {
    bytes.push(STOP_BYTE);
}

/// Number of bytes `emit_head` would write for `(major, value)` — used by
/// the string-referencing threshold and by canonical-mode minimality
/// checks.
pub fn head_len(value: u64) -> usize {
    if value < 24 {
        1
    } else if value < 0x100 {
        2
    } else if value < 0x1_0000 {
        3
    } else if value < 0x1_0000_0000 {
        5
    } else {
        9
    }
}

/// Reads one head from the cursor. Fails with `MalformedItem` on reserved
/// info values 28-30, or truncated input.
pub fn read_head(cursor: &mut Cursor) -> Result<Head, CodecError> {
    let start = cursor.tell();
    let first = cursor.take_one(WhileParsing::ItemHeader)?;
    let major = first >> 5;
    let info = first & 0x1f;
    let argument = match info {
        0..=23 => Argument::Value(info as u64),
        24 => Argument::Value(cursor.take_one(WhileParsing::HeaderValue)? as u64),
        25 => {
            let b = cursor.take(2, WhileParsing::HeaderValue)?;
            Argument::Value(u16::from_be_bytes([b[0], b[1]]) as u64)
        }
        26 => {
            let b = cursor.take(4, WhileParsing::HeaderValue)?;
            Argument::Value(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64)
        }
        27 => {
            let b = cursor.take(8, WhileParsing::HeaderValue)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(b);
            Argument::Value(u64::from_be_bytes(arr))
        }
        28..=30 => {
            return Err(cursor.error_at(start, WhileParsing::ItemHeader, MalformedDetail::ReservedArgument));
        }
        31 => Argument::Indefinite,
        _ => unreachable!("info is masked to 5 bits"),
    };
    Ok(Head { major, argument, info })
}

fn width_for_info(info: u8) -> usize {
    match info {
        0..=23 => 1,
        24 => 2,
        25 => 3,
        26 => 5,
        27 => 9,
        _ => unreachable!("caller only passes info values read_head accepted"),
    }
}

/// Whether `head` uses the shortest legal encoding of its argument, per
/// `spec.md`'s canonical discipline. Major type 7 literals (named simples,
/// floats) have no narrower head-level alternative and are always
/// minimal, except the info-24 simple-value extension, which must not be
/// used for a value under 32 that already has a direct one-byte form.
pub fn is_minimal(head: &Head) -> bool {
    match head.argument {
        Argument::Indefinite => true,
        Argument::Value(v) => {
            if head.major == MAJOR_LIT {
                match head.info {
                    24 => v >= 32,
                    _ => true,
                }
            } else {
                width_for_info(head.info) == head_len(v)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_widths() {
        for v in [0u64, 1, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64, u32::MAX as u64 + 1, u64::MAX] {
            let mut out = Vec::new();
            let n = emit_head(&mut out, MAJOR_POS, v);
            assert_eq!(n, out.len());
            assert_eq!(n, head_len(v));
            let mut cursor = Cursor::new(&out);
            let head = read_head(&mut cursor).unwrap();
            assert_eq!(head.major, MAJOR_POS);
            assert_eq!(head.argument, Argument::Value(v));
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn reserved_info_rejected() {
        let mut cursor = Cursor::new(&[0b000_11100]); // major 0, info 28
        assert!(read_head(&mut cursor).is_err());
    }

    #[test]
    fn minimal_heads_pass_the_canonical_check() {
        for v in [0u64, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64 + 1] {
            let mut out = Vec::new();
            emit_head(&mut out, MAJOR_POS, v);
            let head = read_head(&mut Cursor::new(&out)).unwrap();
            assert!(is_minimal(&head), "value {} should be minimal", v);
        }
    }

    #[test]
    fn non_minimal_head_is_rejected_by_the_canonical_check() {
        // 1 encoded via the 2-byte form (0x18 0x01) instead of the direct 0x01.
        let bytes = [MAJOR_POS << 5 | 24, 0x01];
        let head = read_head(&mut Cursor::new(&bytes)).unwrap();
        assert!(!is_minimal(&head));
    }

    #[test]
    fn indefinite_detected() {
        let mut cursor = Cursor::new(&[0b100_11111]); // major 4 (array), indefinite
        let head = read_head(&mut cursor).unwrap();
        assert_eq!(head.argument, Argument::Indefinite);
    }
}
