//! The encoder engine: `SPEC_FULL.md` §4.3. Mirrors the teacher crate's
//! `builder::low_level` byte-emission style (append to a `Vec<u8>`, no
//! intermediate tree) but walks the owned [`CborValue`] domain instead of
//! a value constructed through a fluent builder.
use crate::{
    constants::*,
    error::{CodecError, ErrorKind},
    head::emit_head,
    options::EncodeOptions,
    share::EncodeShareTable,
    stringref::{is_referencing_shorter, StringKey, StringRefStack},
    value::{BigDecimal, BigFloat, CborRegex, CborValue, Integer, MimeMessage, Rational, Sequence, Shared, Simple},
};
use chrono::TimeZone;
use ipnet::IpNet;
use num_bigint::BigInt;
use std::net::IpAddr;

/// Not `pub`: `stream.rs` needs to hold a persistent `Encoder` across
/// several pushed items (an indefinite-length container's elements share
/// one share table and string-ref stack), so it gets `pub(crate)` access
/// rather than going through the one-shot `encode`/`encode_into` functions.
pub(crate) struct Encoder {
    options: EncodeOptions,
    share: EncodeShareTable,
    string_refs: StringRefStack,
    /// Identities currently being descended into; only populated when
    /// `value_sharing` is off, to turn a cycle into `CyclicReference`
    /// instead of an infinite recursion.
    identity_stack: Vec<usize>,
}

impl Encoder {
    pub(crate) fn new(options: EncodeOptions) -> Self {
        Encoder {
            options,
            share: EncodeShareTable::new(),
            string_refs: StringRefStack::new(),
            identity_stack: Vec::new(),
        }
    }

    pub(crate) fn encode_value(&mut self, value: &CborValue, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match value {
            CborValue::Integer(i) => self.encode_integer(i, out),
            CborValue::Bytes(b) => self.encode_bytes(b, out),
            CborValue::Text(s) => self.encode_text(s, out),
            CborValue::Array(seq, shared) => {
                self.encode_shareable(value, out, |enc, out| enc.encode_array_body(*seq, shared, out))
            }
            CborValue::Map(shared) => {
                self.encode_shareable(value, out, |enc, out| enc.encode_map_body(shared, out))
            }
            CborValue::Tagged(tag, payload) => {
                emit_head(out, MAJOR_TAG, *tag);
                self.encode_value(payload, out)
            }
            CborValue::Simple(s) => self.encode_simple(value, s, out),
            CborValue::Set { elements, .. } => self.encode_set(elements, out),
            CborValue::DateTime(dt) => self.encode_datetime(dt, out),
            CborValue::NaiveDateTime(ndt) => self.encode_naive_datetime(*ndt, out),
            CborValue::Date(d) => self.encode_date(*d, out),
            CborValue::BigDecimal(d) => self.encode_bigdecimal(d, out),
            CborValue::BigFloat(bf) => self.encode_bigfloat(bf, out),
            CborValue::Rational(r) => self.encode_rational(r, out),
            CborValue::Regex(r) => self.encode_regex(r, out),
            CborValue::MimeMessage(m) => self.encode_mime(m, out),
            CborValue::Uuid(u) => self.encode_uuid(u, out),
            CborValue::IpAddr(ip) => self.encode_ip_addr(ip, out),
            CborValue::IpNetwork(net) => self.encode_ip_network(net, out),
        }
    }

    /// Wraps `encode_body` with the `value_sharing`/cycle-detection logic
    /// common to arrays and maps (`SPEC_FULL.md` §4.3.3).
    fn encode_shareable(
        &mut self,
        value: &CborValue,
        out: &mut Vec<u8>,
        encode_body: impl FnOnce(&mut Self, &mut Vec<u8>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        let identity = value.identity().expect("encode_shareable called on a container");
        if self.options.value_sharing {
            if let Some(idx) = self.share.lookup(identity) {
                emit_head(out, MAJOR_TAG, TAG_SHARED_REF);
                emit_head(out, MAJOR_POS, idx);
                return Ok(());
            }
            self.share.register(identity);
            emit_head(out, MAJOR_TAG, TAG_SHAREABLE);
            encode_body(self, out)
        } else {
            if self.identity_stack.contains(&identity) {
                return Err(CodecError::new(out.len(), ErrorKind::CyclicReference));
            }
            self.identity_stack.push(identity);
            let result = encode_body(self, out);
            self.identity_stack.pop();
            result
        }
    }

    fn encode_integer(&mut self, i: &Integer, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match i.as_u64_arg() {
            Some((negative, arg)) => {
                emit_head(out, if negative { MAJOR_NEG } else { MAJOR_POS }, arg);
            }
            None => {
                let (negative, bytes) = i.to_unsigned_bytes();
                emit_head(
                    out,
                    MAJOR_TAG,
                    if negative { TAG_BIGNUM_NEG } else { TAG_BIGNUM_POS },
                );
                emit_head(out, MAJOR_BYTES, bytes.len() as u64);
                out.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn encode_bigint(&mut self, b: &BigInt, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let integer = match i128::try_from(b) {
            Ok(small) => Integer::Small(small),
            Err(_) => Integer::Big(b.clone()),
        };
        self.encode_integer(&integer, out)
    }

    fn encode_bytes(&mut self, b: &[u8], out: &mut Vec<u8>) -> Result<(), CodecError> {
        if self.options.string_referencing && self.string_refs.is_active() {
            let key = StringKey::Bytes(b.to_vec());
            let scope = self.string_refs.current().unwrap();
            if let Some(idx) = scope.find(&key) {
                if is_referencing_shorter(idx, b.len()) {
                    emit_head(out, MAJOR_TAG, TAG_STRINGREF);
                    emit_head(out, MAJOR_POS, idx);
                    return Ok(());
                }
            } else if is_referencing_shorter(scope.len(), b.len()) {
                // Only register strings long enough that a later repeat
                // would actually benefit from referencing them.
                scope.push_entry(key);
            }
        }
        emit_head(out, MAJOR_BYTES, b.len() as u64);
        out.extend_from_slice(b);
        Ok(())
    }

    fn encode_text(&mut self, s: &str, out: &mut Vec<u8>) -> Result<(), CodecError> {
        if self.options.string_referencing && self.string_refs.is_active() {
            let key = StringKey::Text(s.to_string());
            let scope = self.string_refs.current().unwrap();
            if let Some(idx) = scope.find(&key) {
                if is_referencing_shorter(idx, s.len()) {
                    emit_head(out, MAJOR_TAG, TAG_STRINGREF);
                    emit_head(out, MAJOR_POS, idx);
                    return Ok(());
                }
            } else if is_referencing_shorter(scope.len(), s.len()) {
                scope.push_entry(key);
            }
        }
        emit_head(out, MAJOR_STR, s.len() as u64);
        out.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn encode_array_body(
        &mut self,
        _seq: Sequence,
        shared: &Shared<Vec<CborValue>>,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        let items = shared.borrow();
        emit_head(out, MAJOR_ARRAY, items.len() as u64);
        for item in items.iter() {
            self.encode_value(item, out)?;
        }
        Ok(())
    }

    fn encode_map_body(
        &mut self,
        shared: &Shared<Vec<(CborValue, CborValue)>>,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        let pairs = shared.borrow();
        if self.options.canonical {
            let mut encoded = Vec::with_capacity(pairs.len());
            for (k, v) in pairs.iter() {
                let mut kbuf = Vec::new();
                self.encode_value(k, &mut kbuf)?;
                let mut vbuf = Vec::new();
                self.encode_value(v, &mut vbuf)?;
                encoded.push((kbuf, vbuf));
            }
            encoded.sort_by(|a, b| a.0.cmp(&b.0));
            emit_head(out, MAJOR_DICT, encoded.len() as u64);
            for (k, v) in encoded {
                out.extend_from_slice(&k);
                out.extend_from_slice(&v);
            }
        } else {
            emit_head(out, MAJOR_DICT, pairs.len() as u64);
            for (k, v) in pairs.iter() {
                self.encode_value(k, out)?;
                self.encode_value(v, out)?;
            }
        }
        Ok(())
    }

    fn encode_set(&mut self, elements: &[CborValue], out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_SET);
        if self.options.canonical {
            let mut encoded = Vec::with_capacity(elements.len());
            for e in elements {
                let mut buf = Vec::new();
                self.encode_value(e, &mut buf)?;
                encoded.push(buf);
            }
            encoded.sort();
            emit_head(out, MAJOR_ARRAY, encoded.len() as u64);
            for buf in encoded {
                out.extend_from_slice(&buf);
            }
        } else {
            emit_head(out, MAJOR_ARRAY, elements.len() as u64);
            for e in elements {
                self.encode_value(e, out)?;
            }
        }
        Ok(())
    }

    fn encode_simple(&mut self, value: &CborValue, s: &Simple, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match s {
            Simple::False => out.push(MAJOR_LIT << 5 | LIT_FALSE),
            Simple::True => out.push(MAJOR_LIT << 5 | LIT_TRUE),
            Simple::Null => out.push(MAJOR_LIT << 5 | LIT_NULL),
            Simple::Undefined => out.push(MAJOR_LIT << 5 | LIT_UNDEFINED),
            Simple::Float16(v) => {
                out.push(MAJOR_LIT << 5 | LIT_FLOAT16);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Simple::Float32(v) => {
                if self.options.canonical {
                    return self.encode_float_canonical(*v as f64, out);
                }
                out.push(MAJOR_LIT << 5 | LIT_FLOAT32);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Simple::Float64(v) => {
                if self.options.canonical {
                    return self.encode_float_canonical(*v, out);
                }
                out.push(MAJOR_LIT << 5 | LIT_FLOAT64);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Simple::Unassigned(v) => {
                let v = *v;
                if (24..32).contains(&v) {
                    return self.unrepresentable(value, out);
                }
                if v < 24 {
                    out.push(MAJOR_LIT << 5 | v);
                } else {
                    out.push(MAJOR_LIT << 5 | 24);
                    out.push(v);
                }
            }
        }
        Ok(())
    }

    /// Picks the narrowest of float16/32/64 that round-trips `v` exactly,
    /// per the canonical-encoding rule in `SPEC_FULL.md` §4.3.2. NaN always
    /// collapses to the canonical half-precision quiet NaN `0x7e00`.
    fn encode_float_canonical(&mut self, v: f64, out: &mut Vec<u8>) -> Result<(), CodecError> {
        if v.is_nan() {
            out.push(MAJOR_LIT << 5 | LIT_FLOAT16);
            out.extend_from_slice(&0x7e00u16.to_be_bytes());
            return Ok(());
        }
        let as_f16 = half::f16::from_f64(v);
        if as_f16.to_f64() == v {
            out.push(MAJOR_LIT << 5 | LIT_FLOAT16);
            out.extend_from_slice(&as_f16.to_bits().to_be_bytes());
            return Ok(());
        }
        let as_f32 = v as f32;
        if as_f32 as f64 == v {
            out.push(MAJOR_LIT << 5 | LIT_FLOAT32);
            out.extend_from_slice(&as_f32.to_bits().to_be_bytes());
            return Ok(());
        }
        out.push(MAJOR_LIT << 5 | LIT_FLOAT64);
        out.extend_from_slice(&v.to_bits().to_be_bytes());
        Ok(())
    }

    fn unrepresentable(&mut self, value: &CborValue, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let replacement = self.options.on_unrepresentable.as_ref().and_then(|hook| hook(value));
        match replacement {
            Some(v) => self.encode_value(&v, out),
            None => Err(CodecError::new(
                out.len(),
                ErrorKind::UnsupportedValue(format!("cannot encode {}", value)),
            )),
        }
    }

    fn encode_datetime(&mut self, dt: &chrono::DateTime<chrono::FixedOffset>, out: &mut Vec<u8>) -> Result<(), CodecError> {
        use chrono::Timelike;
        if self.options.datetime_as_timestamp {
            emit_head(out, MAJOR_TAG, TAG_EPOCH);
            let secs = dt.timestamp();
            let nanos = dt.nanosecond();
            if nanos == 0 {
                self.encode_integer(&Integer::from(secs), out)
            } else {
                let seconds = secs as f64 + nanos as f64 / 1_000_000_000.0;
                self.encode_value(&CborValue::Simple(Simple::Float64(seconds)), out)
            }
        } else {
            emit_head(out, MAJOR_TAG, TAG_ISO8601);
            let text = dt.to_rfc3339();
            self.encode_text(&text, out)
        }
    }

    /// Resolves a naive date-time against `EncodeOptions::timezone` and
    /// defers to `encode_datetime`. Per `spec.md` §6, a naive date-time
    /// with no default timezone configured is `UnsupportedValue`.
    fn encode_naive_datetime(&mut self, ndt: chrono::NaiveDateTime, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let tz = self.options.timezone.ok_or_else(|| {
            CodecError::new(
                out.len(),
                ErrorKind::UnsupportedValue("naive date-time without a default timezone".to_string()),
            )
        })?;
        let dt = tz.from_local_datetime(&ndt).single().ok_or_else(|| {
            CodecError::new(
                out.len(),
                ErrorKind::UnsupportedValue("naive date-time is ambiguous in the default timezone".to_string()),
            )
        })?;
        self.encode_datetime(&dt, out)
    }

    /// Promotes a bare date to midnight and defers to
    /// `encode_naive_datetime`, gated on `EncodeOptions::date_as_datetime`
    /// since there is no wire representation for a date without a time.
    fn encode_date(&mut self, d: chrono::NaiveDate, out: &mut Vec<u8>) -> Result<(), CodecError> {
        if !self.options.date_as_datetime {
            return Err(CodecError::new(
                out.len(),
                ErrorKind::UnsupportedValue("bare date without date_as_datetime promotion".to_string()),
            ));
        }
        let ndt = d.and_hms_opt(0, 0, 0).expect("midnight is always a valid time");
        self.encode_naive_datetime(ndt, out)
    }

    fn encode_bigdecimal(&mut self, d: &BigDecimal, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_DECIMAL_FRACTION);
        emit_head(out, MAJOR_ARRAY, 2);
        self.encode_integer(&Integer::from(d.exponent), out)?;
        self.encode_integer(&d.mantissa, out)
    }

    fn encode_bigfloat(&mut self, bf: &BigFloat, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_BIGFLOAT);
        emit_head(out, MAJOR_ARRAY, 2);
        self.encode_integer(&Integer::from(bf.exponent), out)?;
        self.encode_integer(&bf.mantissa, out)
    }

    fn encode_rational(&mut self, r: &Rational, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_RATIONAL);
        emit_head(out, MAJOR_ARRAY, 2);
        self.encode_bigint(r.0.numer(), out)?;
        self.encode_bigint(r.0.denom(), out)
    }

    fn encode_regex(&mut self, r: &CborRegex, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_REGEX);
        self.encode_text(&r.pattern, out)
    }

    fn encode_mime(&mut self, m: &MimeMessage, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_MIME);
        self.encode_text(&m.0, out)
    }

    fn encode_uuid(&mut self, u: &uuid::Uuid, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_UUID);
        self.encode_bytes(u.as_bytes(), out)
    }

    fn encode_ip_addr(&mut self, ip: &IpAddr, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_IP_ADDRESS);
        match ip {
            IpAddr::V4(a) => self.encode_bytes(&a.octets(), out),
            IpAddr::V6(a) => self.encode_bytes(&a.octets(), out),
        }
    }

    fn encode_ip_network(&mut self, net: &IpNet, out: &mut Vec<u8>) -> Result<(), CodecError> {
        emit_head(out, MAJOR_TAG, TAG_IP_NETWORK);
        emit_head(out, MAJOR_DICT, 1);
        match net {
            IpNet::V4(n) => {
                self.encode_bytes(&n.addr().octets(), out)?;
                self.encode_integer(&Integer::from_u64(n.prefix_len() as u64), out)
            }
            IpNet::V6(n) => {
                self.encode_bytes(&n.addr().octets(), out)?;
                self.encode_integer(&Integer::from_u64(n.prefix_len() as u64), out)
            }
        }
    }
}

/// Encodes `value` as a new byte vector.
pub fn encode(value: &CborValue, options: EncodeOptions) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    encode_into(value, options, &mut out)?;
    Ok(out)
}

/// Encodes `value`, appending to `out` rather than allocating a fresh
/// buffer — used by [`crate::stream::SequenceWriter`] to pack several
/// items back to back.
pub fn encode_into(value: &CborValue, options: EncodeOptions, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let mut encoder = Encoder::new(options);
    if encoder.options.string_referencing {
        encoder.string_refs.push_scope();
        emit_head(out, MAJOR_TAG, TAG_STRINGREF_NS);
        let result = encoder.encode_value(value, out);
        encoder.string_refs.pop_scope();
        result
    } else {
        encoder.encode_value(value, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::options::DecodeOptions;

    #[test]
    fn encodes_small_int() {
        assert_eq!(encode(&CborValue::int(5), EncodeOptions::new()).unwrap(), vec![0x05]);
    }

    #[test]
    fn encodes_negative_int() {
        assert_eq!(encode(&CborValue::int(-10), EncodeOptions::new()).unwrap(), vec![0x29]);
    }

    #[test]
    fn naive_datetime_without_default_timezone_is_unsupported() {
        let ndt = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let err = encode(&CborValue::NaiveDateTime(ndt), EncodeOptions::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedValue(_)));
    }

    #[test]
    fn naive_datetime_resolves_through_configured_timezone() {
        let ndt = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let tz = chrono::FixedOffset::east_opt(3600).unwrap();
        let bytes = encode(&CborValue::NaiveDateTime(ndt), EncodeOptions::new().with_timezone(tz)).unwrap();
        let decoded = decode(&bytes, DecodeOptions::new()).unwrap();
        match decoded {
            CborValue::DateTime(dt) => assert_eq!(dt.naive_local(), ndt),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn bare_date_requires_date_as_datetime_promotion() {
        let d = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(encode(&CborValue::Date(d), EncodeOptions::new()).is_err());

        let tz = chrono::FixedOffset::east_opt(0).unwrap();
        let opts = EncodeOptions::new().with_timezone(tz).with_date_as_datetime(true);
        let bytes = encode(&CborValue::Date(d), opts).unwrap();
        let decoded = decode(&bytes, DecodeOptions::new()).unwrap();
        match decoded {
            CborValue::DateTime(dt) => assert_eq!(dt.naive_local(), d.and_hms_opt(0, 0, 0).unwrap()),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn canonical_map_sorts_keys_by_encoded_bytes() {
        let map = CborValue::map(vec![
            (CborValue::text("b"), CborValue::int(1)),
            (CborValue::text("a"), CborValue::int(2)),
        ]);
        let bytes = encode(&map, EncodeOptions::new().with_canonical(true)).unwrap();
        // {"a": 2, "b": 1} once sorted: a1 61 61 02 61 62 01
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x02, 0x61, b'b', 0x01]);
    }

    #[test]
    fn cycle_without_sharing_is_rejected() {
        let shared = Shared::new(Vec::new());
        shared.borrow_mut().push(CborValue::Array(Sequence::List, shared.clone()));
        let cyclic = CborValue::Array(Sequence::List, shared);
        assert!(encode(&cyclic, EncodeOptions::new()).is_err());
    }

    #[test]
    fn value_sharing_round_trips_a_cycle() {
        let shared = Shared::new(vec![CborValue::int(1)]);
        shared.borrow_mut().push(CborValue::Array(Sequence::List, shared.clone()));
        let cyclic = CborValue::Array(Sequence::List, shared);
        let bytes = encode(&cyclic, EncodeOptions::new().with_value_sharing(true)).unwrap();
        let decoded = decode(&bytes, DecodeOptions::new()).unwrap();
        match decoded {
            CborValue::Array(_, items) => {
                let borrowed = items.borrow();
                assert_eq!(borrowed[0], CborValue::int(1));
                match &borrowed[1] {
                    CborValue::Array(_, inner) => assert!(inner.ptr_eq(&items)),
                    other => panic!("expected self-reference, got {:?}", other),
                }
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn string_referencing_shortens_repeated_long_strings() {
        let repeated = "aaaaaaaa";
        let arr = CborValue::array(vec![CborValue::text(repeated), CborValue::text(repeated)]);
        let with_refs = encode(&arr, EncodeOptions::new().with_string_referencing(true)).unwrap();
        let without_refs = encode(&arr, EncodeOptions::new()).unwrap();
        assert!(with_refs.len() < without_refs.len());
    }

    #[test]
    fn short_repeated_strings_are_never_referenced() {
        // A one-byte string is never worth registering (SPEC_FULL.md
        // §4.3.1): referencing it later would cost more than re-emitting
        // it, so the table must not grow and neither occurrence should be
        // replaced by a tag 25. The only size difference from the
        // non-referencing encoding is the mandatory tag-256 wrapper.
        let repeated = "a";
        let arr = CborValue::array(vec![CborValue::text(repeated), CborValue::text(repeated)]);
        let with_refs = encode(&arr, EncodeOptions::new().with_string_referencing(true)).unwrap();
        let without_refs = encode(&arr, EncodeOptions::new()).unwrap();
        assert_eq!(with_refs.len(), without_refs.len() + crate::head::head_len(TAG_STRINGREF_NS));
        let decoded = decode(&with_refs, DecodeOptions::new()).unwrap();
        assert_eq!(decoded, arr);
    }
}
