//! The decoder engine: `SPEC_FULL.md` §4.4, §4.7 and §4.8. Ports the
//! teacher crate's `reader.rs` walk-the-bytes structure onto the owned
//! `CborValue` domain, adding the share table, string-ref stack and
//! immutable-context tracking the teacher's zero-copy reader never needed.
use crate::{
    constants::*,
    cursor::Cursor,
    error::{CodecError, ErrorKind, MalformedDetail, WhileParsing},
    head::{is_minimal, read_head, Argument, Head},
    options::DecodeOptions,
    share::{ContainerHandle, DecodeShareTable, Slot},
    stringref::{is_referencing_shorter, StringKey, StringRefStack},
    tags::decode_builtin_tag,
    value::{CborValue, Integer, Sequence, Shared, Simple},
};

pub struct Decoder<'a> {
    cursor: Cursor<'a>,
    options: DecodeOptions,
    share: DecodeShareTable,
    string_refs: StringRefStack,
    immutable_depth: usize,
    depth: usize,
    /// Share index of the tag-28 payload currently under construction by a
    /// user tag hook, if any; backs [`Decoder::set_shareable`].
    current_share_index: Option<u64>,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8], options: DecodeOptions) -> Self {
        Decoder {
            cursor: Cursor::new(bytes),
            options,
            share: DecodeShareTable::new(),
            string_refs: StringRefStack::new(),
            immutable_depth: 0,
            depth: 0,
            current_share_index: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.cursor.tell()
    }

    /// No bytes remain to decode. Used by [`crate::stream::SequenceReader`]
    /// to know when to stop iterating.
    pub(crate) fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    /// `true` while decoding a map key or an element of a tag-258 set,
    /// propagated through any tags wrapping that position.
    pub fn immutable(&self) -> bool {
        self.immutable_depth > 0
    }

    /// Lets a tag hook register its own (possibly still-incomplete) result
    /// as the target of the tag-28 it is currently the payload of, so a
    /// self-referential structure inside the hook's own construction can
    /// resolve via `tag 29` before the hook returns.
    pub fn set_shareable(&mut self, value: CborValue) {
        if let Some(idx) = self.current_share_index {
            self.share.fill(idx, Slot::Scalar(value));
        }
    }

    fn enter_depth(&mut self) -> Result<(), CodecError> {
        if self.depth >= self.options.max_depth {
            return Err(CodecError::new(self.offset(), ErrorKind::StackOverflow));
        }
        self.depth += 1;
        Ok(())
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    /// Decodes exactly one top-level item, leaving any trailing bytes for
    /// the caller to judge (the plain `tag 0..n` of a CBOR sequence, or an
    /// error if the caller expected nothing left).
    pub fn decode_top_level(&mut self) -> Result<CborValue, CodecError> {
        self.decode_item(None)
    }

    /// Decodes one data item, recording it at `share_index` in the share
    /// table if it is the direct payload of a `tag 28`.
    fn decode_item(&mut self, share_index: Option<u64>) -> Result<CborValue, CodecError> {
        self.enter_depth()?;
        let head_start = self.offset();
        let head = read_head(&mut self.cursor)?;
        if self.options.canonical && !is_minimal(&head) {
            self.exit_depth();
            return Err(self.cursor.error_at(head_start, WhileParsing::ItemHeader, MalformedDetail::NonCanonicalHead));
        }
        let result = match head.major {
            MAJOR_TAG => {
                let tag = match head.argument {
                    Argument::Value(v) => v,
                    Argument::Indefinite => {
                        return Err(self.cursor.error(WhileParsing::TagPayload, MalformedDetail::TruncatedTag))
                    }
                };
                self.decode_tag_body(tag, share_index)
            }
            MAJOR_ARRAY => self.decode_array(head.argument, share_index),
            MAJOR_DICT => self.decode_map(head.argument, share_index),
            MAJOR_LIT if head.argument == Argument::Indefinite => {
                Err(self.cursor.error(WhileParsing::ItemHeader, MalformedDetail::StrayBreak))
            }
            _ => self.decode_scalar(head, share_index),
        };
        self.exit_depth();
        result
    }

    fn decode_tag_body(&mut self, tag: u64, outer_share_index: Option<u64>) -> Result<CborValue, CodecError> {
        match tag {
            TAG_SHAREABLE => {
                let idx = self.share.reserve();
                self.decode_item(Some(idx))
            }
            TAG_SHARED_REF => {
                let offset = self.offset();
                let index_value = self.decode_item(None)?;
                let index = expect_u64(&index_value, offset)?;
                match self.share.get(index) {
                    Some(Slot::Container(handle)) => Ok(handle.to_value()),
                    Some(Slot::Scalar(v)) => Ok(v.clone()),
                    None => Err(CodecError::new(offset, ErrorKind::ShareIndexInvalid(index))),
                }
            }
            TAG_STRINGREF_NS => {
                self.string_refs.push_scope();
                let value = self.decode_item(outer_share_index);
                self.string_refs.pop_scope();
                value
            }
            TAG_STRINGREF => {
                let offset = self.offset();
                let index_value = self.decode_item(None)?;
                let index = expect_u64(&index_value, offset)?;
                let key = self
                    .string_refs
                    .current()
                    .and_then(|scope| scope.get(index).cloned())
                    .ok_or_else(|| CodecError::new(offset, ErrorKind::ShareIndexInvalid(index)))?;
                let value = match key {
                    StringKey::Text(s) => CborValue::Text(s),
                    StringKey::Bytes(b) => CborValue::Bytes(b),
                };
                self.maybe_fill(outer_share_index, &value);
                Ok(value)
            }
            TAG_SET => {
                self.immutable_depth += 1;
                let items = self.decode_item(None);
                self.immutable_depth -= 1;
                let items = items?;
                let elements = match items {
                    CborValue::Array(_, s) => s.get_clone(),
                    _ => {
                        return Err(CodecError::new(
                            self.offset(),
                            ErrorKind::UnsupportedValue("tag 258 payload must be an array".into()),
                        ))
                    }
                };
                let value = CborValue::Set {
                    frozen: self.immutable(),
                    elements,
                };
                self.maybe_fill(outer_share_index, &value);
                Ok(value)
            }
            other => self.decode_dispatched_tag(other, outer_share_index),
        }
    }

    /// Tags that aren't structural (28/29/256/258): user hook, then
    /// built-in table, then opaque `Tagged` fallback — the three-step
    /// dispatch from `SPEC_FULL.md` §4.2.
    fn decode_dispatched_tag(&mut self, tag: u64, outer_share_index: Option<u64>) -> Result<CborValue, CodecError> {
        if let Some(handler) = self.options.tag_hook.get(tag) {
            let payload = self.decode_item(None)?;
            let previous = self.current_share_index;
            self.current_share_index = outer_share_index;
            let result = handler(self, payload);
            self.current_share_index = previous;
            let value = result.map_err(|cause| {
                CodecError::new(
                    self.offset(),
                    ErrorKind::TagHookFailure {
                        tag,
                        side: crate::error::HookSide::Decode,
                        cause: Box::new(cause),
                    },
                )
            })?;
            self.maybe_fill(outer_share_index, &value);
            return Ok(value);
        }

        if self.options.disable_builtin_tags {
            let payload = self.decode_item(None)?;
            let value = CborValue::Tagged(tag, Box::new(payload));
            self.maybe_fill(outer_share_index, &value);
            return Ok(value);
        }

        let payload = self.decode_item(None)?;
        let value = match decode_builtin_tag(tag, payload.clone(), self)? {
            Some(v) => v,
            None => CborValue::Tagged(tag, Box::new(payload)),
        };
        self.maybe_fill(outer_share_index, &value);
        Ok(value)
    }

    fn maybe_fill(&mut self, share_index: Option<u64>, value: &CborValue) {
        if let Some(idx) = share_index {
            self.share.fill(idx, Slot::Scalar(value.clone()));
        }
    }

    fn decode_array(&mut self, argument: Argument, share_index: Option<u64>) -> Result<CborValue, CodecError> {
        let seq = if self.immutable() { Sequence::Tuple } else { Sequence::List };
        let shared = Shared::new(Vec::new());
        if let Some(idx) = share_index {
            self.share.fill(idx, Slot::Container(ContainerHandle::Array(seq, shared.clone())));
        }
        match argument {
            Argument::Value(len) => {
                for _ in 0..len {
                    let item = self.decode_item(None)?;
                    shared.borrow_mut().push(item);
                }
            }
            Argument::Indefinite => loop {
                if self.cursor.peek_byte() == Some(STOP_BYTE) {
                    self.cursor.take_one(WhileParsing::ArrayItem)?;
                    break;
                }
                let item = self.decode_item(None)?;
                shared.borrow_mut().push(item);
            },
        }
        Ok(CborValue::Array(seq, shared))
    }

    fn decode_map(&mut self, argument: Argument, share_index: Option<u64>) -> Result<CborValue, CodecError> {
        let shared = Shared::new(Vec::new());
        if let Some(idx) = share_index {
            self.share.fill(idx, Slot::Container(ContainerHandle::Map(shared.clone())));
        }
        match argument {
            Argument::Value(len) => {
                for _ in 0..len {
                    self.decode_map_entry(&shared)?;
                }
            }
            Argument::Indefinite => loop {
                if self.cursor.peek_byte() == Some(STOP_BYTE) {
                    self.cursor.take_one(WhileParsing::DictItem)?;
                    break;
                }
                self.decode_map_entry(&shared)?;
            },
        }
        let value = CborValue::Map(shared);
        Ok(match &self.options.object_hook {
            Some(hook) => hook(value),
            None => value,
        })
    }

    fn decode_map_entry(&mut self, shared: &Shared<Vec<(CborValue, CborValue)>>) -> Result<(), CodecError> {
        self.immutable_depth += 1;
        let key = self.decode_item(None);
        self.immutable_depth -= 1;
        let key = key?;
        let value = self.decode_item(None)?;
        shared.borrow_mut().push((key, value));
        Ok(())
    }

    fn decode_scalar(&mut self, head: Head, share_index: Option<u64>) -> Result<CborValue, CodecError> {
        let value = match head.major {
            MAJOR_POS => match head.argument {
                Argument::Value(v) => CborValue::Integer(Integer::from_u64(v)),
                Argument::Indefinite => {
                    return Err(self.cursor.error(WhileParsing::ItemHeader, MalformedDetail::ReservedArgument))
                }
            },
            MAJOR_NEG => match head.argument {
                Argument::Value(v) => CborValue::Integer(Integer::from_neg_arg(v)),
                Argument::Indefinite => {
                    return Err(self.cursor.error(WhileParsing::ItemHeader, MalformedDetail::ReservedArgument))
                }
            },
            MAJOR_BYTES => self.decode_byte_string(head.argument)?,
            MAJOR_STR => self.decode_text_string(head.argument)?,
            MAJOR_LIT => self.decode_literal(head)?,
            _ => unreachable!("array/dict/tag handled by decode_item"),
        };
        self.maybe_fill(share_index, &value);
        if let CborValue::Bytes(_) | CborValue::Text(_) = &value {
            self.register_string_ref_entry(&value);
        }
        Ok(value)
    }

    /// Mirrors the encoder's insertion gate exactly (same threshold
    /// function, same raw length), so both sides assign the same entry
    /// the same index.
    fn register_string_ref_entry(&mut self, value: &CborValue) {
        if !self.string_refs.is_active() {
            return;
        }
        let (key, raw_len) = match value {
            CborValue::Text(s) => (StringKey::Text(s.clone()), s.len()),
            CborValue::Bytes(b) => (StringKey::Bytes(b.clone()), b.len()),
            _ => return,
        };
        if let Some(scope) = self.string_refs.current() {
            if !is_referencing_shorter(scope.len(), raw_len) {
                return;
            }
            scope.push_entry(key);
        }
    }

    fn decode_byte_string(&mut self, argument: Argument) -> Result<CborValue, CodecError> {
        match argument {
            Argument::Value(len) => {
                let bytes = self.cursor.take(len as usize, WhileParsing::BytesValue)?.to_vec();
                Ok(CborValue::Bytes(bytes))
            }
            Argument::Indefinite => {
                let mut out = Vec::new();
                loop {
                    if self.cursor.peek_byte() == Some(STOP_BYTE) {
                        self.cursor.take_one(WhileParsing::BytesFragment)?;
                        break;
                    }
                    let chunk_start = self.offset();
                    let head = read_head(&mut self.cursor)?;
                    if head.major != MAJOR_BYTES {
                        return Err(self.cursor.error_at(
                            chunk_start,
                            WhileParsing::BytesFragment,
                            MalformedDetail::InvalidStringFragment,
                        ));
                    }
                    let len = match head.argument {
                        Argument::Value(v) => v,
                        Argument::Indefinite => {
                            return Err(self.cursor.error_at(
                                chunk_start,
                                WhileParsing::BytesFragment,
                                MalformedDetail::InvalidStringFragment,
                            ))
                        }
                    };
                    out.extend_from_slice(self.cursor.take(len as usize, WhileParsing::BytesFragment)?);
                }
                Ok(CborValue::Bytes(out))
            }
        }
    }

    fn decode_text_string(&mut self, argument: Argument) -> Result<CborValue, CodecError> {
        let raw = match argument {
            Argument::Value(len) => self.cursor.take(len as usize, WhileParsing::StringValue)?.to_vec(),
            Argument::Indefinite => {
                let mut out = Vec::new();
                loop {
                    if self.cursor.peek_byte() == Some(STOP_BYTE) {
                        self.cursor.take_one(WhileParsing::StringFragment)?;
                        break;
                    }
                    let chunk_start = self.offset();
                    let head = read_head(&mut self.cursor)?;
                    if head.major != MAJOR_STR {
                        return Err(self.cursor.error_at(
                            chunk_start,
                            WhileParsing::StringFragment,
                            MalformedDetail::InvalidStringFragment,
                        ));
                    }
                    let len = match head.argument {
                        Argument::Value(v) => v,
                        Argument::Indefinite => {
                            return Err(self.cursor.error_at(
                                chunk_start,
                                WhileParsing::StringFragment,
                                MalformedDetail::InvalidStringFragment,
                            ))
                        }
                    };
                    out.extend_from_slice(self.cursor.take(len as usize, WhileParsing::StringFragment)?);
                }
                out
            }
        };
        self.decode_utf8(raw)
    }

    fn decode_utf8(&mut self, raw: Vec<u8>) -> Result<CborValue, CodecError> {
        use crate::options::StrErrors;
        match String::from_utf8(raw) {
            Ok(s) => Ok(CborValue::Text(s)),
            Err(e) => match self.options.str_errors {
                StrErrors::Strict => Err(CodecError::malformed(
                    self.offset(),
                    WhileParsing::StringValue,
                    MalformedDetail::InvalidUtf8(crate::error::Utf8ErrorEq(e.utf8_error())),
                )),
                StrErrors::Replace => Ok(CborValue::Text(String::from_utf8_lossy(&e.into_bytes()).into_owned())),
                StrErrors::Ignore => {
                    let bytes = e.into_bytes();
                    let mut cleaned = String::new();
                    let mut rest = &bytes[..];
                    loop {
                        match std::str::from_utf8(rest) {
                            Ok(valid) => {
                                cleaned.push_str(valid);
                                break;
                            }
                            Err(err) => {
                                let (valid, after) = rest.split_at(err.valid_up_to());
                                cleaned.push_str(std::str::from_utf8(valid).unwrap());
                                let skip = err.error_len().unwrap_or(after.len());
                                rest = &after[skip..];
                                if rest.is_empty() {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(CborValue::Text(cleaned))
                }
            },
        }
    }

    fn decode_literal(&mut self, head: Head) -> Result<CborValue, CodecError> {
        match head.info {
            0..=19 => Ok(CborValue::Simple(Simple::Unassigned(head.info))),
            LIT_FALSE => Ok(CborValue::Simple(Simple::False)),
            LIT_TRUE => Ok(CborValue::Simple(Simple::True)),
            LIT_NULL => Ok(CborValue::Simple(Simple::Null)),
            LIT_UNDEFINED => Ok(CborValue::Simple(Simple::Undefined)),
            24 => match head.argument {
                Argument::Value(v) => Ok(CborValue::Simple(Simple::Unassigned(v as u8))),
                Argument::Indefinite => unreachable!("width-24 literal always resolves to a value"),
            },
            LIT_FLOAT16 => match head.argument {
                Argument::Value(bits) => Ok(CborValue::Simple(Simple::Float16(half::f16::from_bits(bits as u16)))),
                Argument::Indefinite => unreachable!(),
            },
            LIT_FLOAT32 => match head.argument {
                Argument::Value(bits) => Ok(CborValue::Simple(Simple::Float32(f32::from_bits(bits as u32)))),
                Argument::Indefinite => unreachable!(),
            },
            LIT_FLOAT64 => match head.argument {
                Argument::Value(bits) => Ok(CborValue::Simple(Simple::Float64(f64::from_bits(bits)))),
                Argument::Indefinite => unreachable!(),
            },
            _ => Err(self.cursor.error(WhileParsing::ItemHeader, MalformedDetail::InvalidInfo)),
        }
    }
}

fn expect_u64(value: &CborValue, offset: usize) -> Result<u64, CodecError> {
    match value {
        CborValue::Integer(Integer::Small(v)) if *v >= 0 => Ok(*v as u64),
        _ => Err(CodecError::new(
            offset,
            ErrorKind::UnsupportedValue("expected a non-negative integer index".into()),
        )),
    }
}

/// Decodes a single top-level CBOR item from `bytes`, failing with
/// `TrailingData` if anything follows it.
pub fn decode(bytes: &[u8], options: DecodeOptions) -> Result<CborValue, CodecError> {
    let mut decoder = Decoder::new(bytes, options);
    let value = decoder.decode_top_level()?;
    if !decoder.cursor.is_empty() {
        return Err(CodecError::new(decoder.offset(), ErrorKind::TrailingData));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_ok(bytes: &[u8]) -> CborValue {
        decode(bytes, DecodeOptions::new()).unwrap()
    }

    #[test]
    fn decodes_small_uint() {
        assert_eq!(decode_ok(&[0x05]), CborValue::int(5));
    }

    #[test]
    fn decodes_negative_int() {
        assert_eq!(decode_ok(&[0x29]), CborValue::int(-10));
    }

    #[test]
    fn canonical_mode_rejects_non_minimal_integer_heads() {
        // 1 encoded via the 2-byte form (0x18 0x01) instead of the direct 0x01.
        let bytes = [0x18, 0x01];
        assert!(decode(&bytes, DecodeOptions::new().with_canonical(true)).is_err());
        assert_eq!(decode(&bytes, DecodeOptions::new()).unwrap(), CborValue::int(1));
    }

    #[test]
    fn canonical_mode_accepts_a_minimally_encoded_item() {
        let bytes = [0x05];
        assert_eq!(decode(&bytes, DecodeOptions::new().with_canonical(true)).unwrap(), CborValue::int(5));
    }

    #[test]
    fn decodes_definite_array() {
        let v = decode_ok(&[0x82, 0x01, 0x02]);
        match v {
            CborValue::Array(Sequence::List, items) => {
                assert_eq!(items.get_clone(), vec![CborValue::int(1), CborValue::int(2)]);
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn map_key_becomes_tuple() {
        // {[1]: 2} -- a one-entry map whose key is a one-element array.
        let bytes = [0xa1, 0x81, 0x01, 0x02];
        let v = decode_ok(&bytes);
        match v {
            CborValue::Map(pairs) => {
                let pairs = pairs.get_clone();
                match &pairs[0].0 {
                    CborValue::Array(Sequence::Tuple, _) => {}
                    other => panic!("expected tuple key, got {:?}", other),
                }
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn tag29_before_tag28_close_is_invalid() {
        // A bare tag-29 reference to an index that was never registered.
        let bytes = [0xd8, 0x1d, 0x00];
        assert!(decode(&bytes, DecodeOptions::new()).is_err());
    }

    #[test]
    fn self_referencing_array_round_trips_via_share_table() {
        // tag(28)([1, tag(29)(0)]) -- an array whose second element refers
        // back to the array itself.
        let bytes = [0xd8, 0x1c, 0x82, 0x01, 0xd8, 0x1d, 0x00];
        let v = decode_ok(&bytes);
        match v {
            CborValue::Array(_, items) => {
                let borrowed = items.borrow();
                assert_eq!(borrowed[0], CborValue::int(1));
                match &borrowed[1] {
                    CborValue::Array(_, inner) => assert!(inner.ptr_eq(&items)),
                    other => panic!("expected self-reference, got {:?}", other),
                }
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn trailing_data_is_rejected() {
        let bytes = [0x01, 0x02];
        assert!(matches!(
            decode(&bytes, DecodeOptions::new()).unwrap_err().kind(),
            ErrorKind::TrailingData
        ));
    }

    #[test]
    fn stray_break_is_malformed() {
        let bytes = [0xff];
        assert!(decode(&bytes, DecodeOptions::new()).is_err());
    }
}
