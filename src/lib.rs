//! A CBOR (RFC 8949) codec built around a single owned value domain,
//! [`CborValue`], that can represent cyclic and shared object graphs
//! (tags 28/29), deduplicate repeated strings (tags 25/256), and round
//! through every semantic tag this crate knows about natively — dates,
//! bignums, decimal fractions, bigfloats, rationals, regexes, UUIDs and
//! IP addresses/networks — while still letting callers register their
//! own tag and object hooks for anything it doesn't.
//!
//! ```
//! use cbor_graph::{decode, encode, CborValue, DecodeOptions, EncodeOptions};
//!
//! let value = CborValue::array(vec![CborValue::int(1), CborValue::text("hi")]);
//! let bytes = encode(&value, EncodeOptions::new()).unwrap();
//! let round_tripped = decode(&bytes, DecodeOptions::new()).unwrap();
//! assert_eq!(value, round_tripped);
//! ```

mod constants;
mod cursor;
mod decoder;
mod encoder;
mod error;
mod head;
mod options;
mod share;
mod stream;
mod stringref;
mod tags;
mod value;

pub use decoder::decode;
pub use encoder::{encode, encode_into};
pub use error::{CodecError, ErrorKind, HookSide, MalformedDetail, WhileParsing};
pub use options::{DecodeOptions, EncodeOptions, StrErrors, TagHandler, TagHookRegistry};
pub use stream::{IndefiniteArrayWriter, IndefiniteMapWriter, SequenceReader, SequenceWriter};
pub use value::{
    BigDecimal, BigFloat, CborRegex, CborValue, Integer, MimeMessage, Rational, Sequence, Shared, Simple,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_round_trip_preserves_structure() {
        let value = CborValue::map(vec![(
            CborValue::text("nested"),
            CborValue::array(vec![CborValue::int(-1), CborValue::bool(true), CborValue::null()]),
        )]);
        let bytes = encode(&value, EncodeOptions::new()).unwrap();
        let decoded = decode(&bytes, DecodeOptions::new()).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn canonical_encoding_is_deterministic_regardless_of_insertion_order() {
        let a = CborValue::map(vec![(CborValue::text("z"), CborValue::int(1)), (CborValue::text("a"), CborValue::int(2))]);
        let b = CborValue::map(vec![(CborValue::text("a"), CborValue::int(2)), (CborValue::text("z"), CborValue::int(1))]);
        let opts = || EncodeOptions::new().with_canonical(true);
        assert_eq!(encode(&a, opts()).unwrap(), encode(&b, opts()).unwrap());
    }

    #[test]
    fn tag_hook_round_trips_a_custom_type() {
        // Round-trip a 2-element array tagged 9000 through a hook that
        // collapses it to a single `CborValue::Text` and back.
        let mut decode_opts = DecodeOptions::new();
        decode_opts.tag_hook.register(9000, |_decoder, payload| match payload {
            CborValue::Array(_, items) => {
                let items = items.get_clone();
                match (&items[0], &items[1]) {
                    (CborValue::Text(a), CborValue::Text(b)) => Ok(CborValue::Text(format!("{}:{}", a, b))),
                    _ => Ok(CborValue::Text(String::new())),
                }
            }
            other => Ok(other),
        });

        let original = CborValue::Tagged(
            9000,
            Box::new(CborValue::array(vec![CborValue::text("a"), CborValue::text("b")])),
        );
        let bytes = encode(&original, EncodeOptions::new()).unwrap();
        let decoded = decode(&bytes, decode_opts).unwrap();
        assert_eq!(decoded, CborValue::Text("a:b".to_string()));
    }

    #[test]
    fn uuid_round_trips_through_tag_37() {
        let u = uuid::Uuid::parse_str("f47ac10b-58cc-4372-a567-0e02b2c3d479").unwrap();
        let value = CborValue::Uuid(u);
        let bytes = encode(&value, EncodeOptions::new()).unwrap();
        assert_eq!(decode(&bytes, DecodeOptions::new()).unwrap(), value);
    }

    #[test]
    fn rational_round_trips_for_numerators_past_i64_range() {
        use num_bigint::BigInt;
        use num_rational::BigRational;
        let huge = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let value = CborValue::Rational(Rational(BigRational::new(huge, BigInt::from(3))));
        let bytes = encode(&value, EncodeOptions::new()).unwrap();
        assert_eq!(decode(&bytes, DecodeOptions::new()).unwrap(), value);
    }
}
