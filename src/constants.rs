//! Numeric constants for CBOR major types, literals and the tags this crate
//! interprets natively. Kept as a flat module of `pub const`s, matching the
//! teacher crate's `constants.rs`.
#![allow(dead_code)]

pub const MAJOR_POS: u8 = 0;
pub const MAJOR_NEG: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_STR: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_DICT: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_LIT: u8 = 7;

pub const TAG_ISO8601: u64 = 0;
pub const TAG_EPOCH: u64 = 1;
pub const TAG_BIGNUM_POS: u64 = 2;
pub const TAG_BIGNUM_NEG: u64 = 3;
pub const TAG_DECIMAL_FRACTION: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_STRINGREF: u64 = 25;
pub const TAG_SHAREABLE: u64 = 28;
pub const TAG_SHARED_REF: u64 = 29;
pub const TAG_RATIONAL: u64 = 30;
pub const TAG_REGEX: u64 = 35;
pub const TAG_MIME: u64 = 36;
pub const TAG_UUID: u64 = 37;
pub const TAG_STRINGREF_NS: u64 = 256;
pub const TAG_SET: u64 = 258;
pub const TAG_IP_ADDRESS: u64 = 260;
pub const TAG_IP_NETWORK: u64 = 261;
pub const TAG_SELF_DESCRIBE: u64 = 55799;

pub const LIT_FALSE: u8 = 20;
pub const LIT_TRUE: u8 = 21;
pub const LIT_NULL: u8 = 22;
pub const LIT_UNDEFINED: u8 = 23;
pub const LIT_FLOAT16: u8 = 25;
pub const LIT_FLOAT32: u8 = 26;
pub const LIT_FLOAT64: u8 = 27;

pub const INDEFINITE_SIZE: u8 = 31;
pub const STOP_BYTE: u8 = 0xff;

/// Default recursion limit, matching `cbor2`'s historical default.
pub const DEFAULT_MAX_DEPTH: usize = 500;
