//! Streaming helpers layered over the encoder/decoder engines:
//! indefinite-length container writers and the RFC 8742 CBOR sequence
//! reader/writer pair, per `SPEC_FULL.md` §4.5.
use crate::{
    constants::*,
    cursor::Cursor,
    decoder::Decoder,
    encoder::Encoder,
    error::{CodecError, MalformedDetail, WhileParsing},
    head::{emit_break, emit_indefinite},
    options::{DecodeOptions, EncodeOptions},
    value::CborValue,
};

/// The 12-byte magic prolog written by [`SequenceWriter::with_header`]:
/// `d9 d9 f7` (the `tag 55799` self-describe marker) followed by `da` plus
/// a caller-chosen 4-byte protocol tag, followed by the literal ASCII
/// bytes `BOR`.
const HEADER_PREFIX: [u8; 4] = [0xd9, 0xd9, 0xf7, 0xda];
const HEADER_SUFFIX: [u8; 4] = [0x63, 0x42, 0x4f, 0x52];
const HEADER_LEN: usize = 12;

fn write_header(out: &mut Vec<u8>, protocol_tag: u32) {
    out.extend_from_slice(&HEADER_PREFIX);
    out.extend_from_slice(&protocol_tag.to_be_bytes());
    out.extend_from_slice(&HEADER_SUFFIX);
}

/// Reads the 12-byte prolog and, if `header_tags` is non-empty, checks the
/// embedded protocol tag against it before returning — per `spec.md` §8
/// (E6), a mismatch fails `MalformedItem` before any item is produced. An
/// empty `header_tags` accepts any protocol tag.
fn verify_header(cursor: &mut Cursor, header_tags: &[u32]) -> Result<u32, CodecError> {
    let start = cursor.tell();
    let bytes = cursor.take(HEADER_LEN, WhileParsing::ItemHeader)?;
    if bytes[0..4] != HEADER_PREFIX || bytes[8..12] != HEADER_SUFFIX {
        return Err(cursor.error_at(start, WhileParsing::ItemHeader, MalformedDetail::InvalidInfo));
    }
    let protocol_tag = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if !header_tags.is_empty() && !header_tags.contains(&protocol_tag) {
        return Err(cursor.error_at(start, WhileParsing::ItemHeader, MalformedDetail::InvalidInfo));
    }
    Ok(protocol_tag)
}

/// Writes an indefinite-length CBOR array one element at a time, useful
/// when the full element count isn't known up front (e.g. streaming from
/// an iterator). All elements share one `Encoder`, so `value_sharing`
/// and `string_referencing` apply across the whole array, not per push.
pub struct IndefiniteArrayWriter<'a> {
    out: &'a mut Vec<u8>,
    encoder: Encoder,
}

impl<'a> IndefiniteArrayWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, options: EncodeOptions) -> Self {
        emit_indefinite(out, MAJOR_ARRAY);
        IndefiniteArrayWriter {
            out,
            encoder: Encoder::new(options),
        }
    }

    pub fn push(&mut self, value: &CborValue) -> Result<(), CodecError> {
        self.encoder.encode_value(value, self.out)
    }

    pub fn finish(self) {
        emit_break(self.out);
    }
}

/// Writes an indefinite-length CBOR map one entry at a time.
pub struct IndefiniteMapWriter<'a> {
    out: &'a mut Vec<u8>,
    encoder: Encoder,
}

impl<'a> IndefiniteMapWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, options: EncodeOptions) -> Self {
        emit_indefinite(out, MAJOR_DICT);
        IndefiniteMapWriter {
            out,
            encoder: Encoder::new(options),
        }
    }

    pub fn push(&mut self, key: &CborValue, value: &CborValue) -> Result<(), CodecError> {
        self.encoder.encode_value(key, self.out)?;
        self.encoder.encode_value(value, self.out)
    }

    pub fn finish(self) {
        emit_break(self.out);
    }
}

/// Writes a CBOR sequence (RFC 8742): a flat concatenation of independent
/// top-level data items, each encoded with its own fresh share table.
pub struct SequenceWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> SequenceWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        SequenceWriter { out }
    }

    /// Same as [`Self::new`], but first writes the 12-byte magic prolog
    /// tagging the sequence with `protocol_tag`.
    pub fn with_header(out: &'a mut Vec<u8>, protocol_tag: u32) -> Self {
        write_header(out, protocol_tag);
        SequenceWriter { out }
    }

    pub fn write_item(&mut self, value: &CborValue, options: EncodeOptions) -> Result<(), CodecError> {
        crate::encoder::encode_into(value, options, self.out)
    }
}

/// Reads a CBOR sequence back out, one item at a time. Items share one
/// `Decoder`, so a `tag 28`/`tag 29` pair spanning two sequence items
/// resolves correctly — a deliberate generalization beyond RFC 8742's
/// "independent items" framing, since nothing about value sharing
/// requires item boundaries to reset it.
pub struct SequenceReader<'a> {
    decoder: Decoder<'a>,
    exhausted: bool,
}

impl<'a> SequenceReader<'a> {
    pub fn new(bytes: &'a [u8], options: DecodeOptions) -> Self {
        SequenceReader {
            decoder: Decoder::new(bytes, options),
            exhausted: false,
        }
    }

    /// Verifies the 12-byte magic prolog first, returning the protocol tag
    /// alongside a reader positioned at the first item. `header_tags`, if
    /// non-empty, restricts which protocol tags are accepted — any other
    /// value fails `MalformedItem` before the first item is decoded.
    pub fn with_header(bytes: &'a [u8], options: DecodeOptions, header_tags: &[u32]) -> Result<(Self, u32), CodecError> {
        let mut cursor = Cursor::new(bytes);
        let protocol_tag = verify_header(&mut cursor, header_tags)?;
        let consumed = cursor.tell();
        Ok((Self::new(&bytes[consumed..], options), protocol_tag))
    }
}

impl<'a> Iterator for SequenceReader<'a> {
    type Item = Result<CborValue, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.decoder.is_empty() {
            return None;
        }
        match self.decoder.decode_top_level() {
            Ok(value) => Some(Ok(value)),
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indefinite_array_round_trips_through_plain_decode() {
        let mut out = Vec::new();
        let mut writer = IndefiniteArrayWriter::new(&mut out, EncodeOptions::new());
        writer.push(&CborValue::int(1)).unwrap();
        writer.push(&CborValue::int(2)).unwrap();
        writer.finish();

        let decoded = crate::decoder::decode(&out, DecodeOptions::new()).unwrap();
        match decoded {
            CborValue::Array(_, items) => {
                assert_eq!(items.get_clone(), vec![CborValue::int(1), CborValue::int(2)]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn sequence_round_trips_multiple_items() {
        let mut out = Vec::new();
        let mut writer = SequenceWriter::new(&mut out);
        writer.write_item(&CborValue::int(1), EncodeOptions::new()).unwrap();
        writer.write_item(&CborValue::text("two"), EncodeOptions::new()).unwrap();

        let items: Vec<_> = SequenceReader::new(&out, DecodeOptions::new())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items, vec![CborValue::int(1), CborValue::text("two")]);
    }

    #[test]
    fn sequence_with_header_round_trips_protocol_tag() {
        let mut out = Vec::new();
        let mut writer = SequenceWriter::with_header(&mut out, 0x1234_5678);
        writer.write_item(&CborValue::int(42), EncodeOptions::new()).unwrap();

        let (reader, protocol_tag) = SequenceReader::with_header(&out, DecodeOptions::new(), &[]).unwrap();
        assert_eq!(protocol_tag, 0x1234_5678);
        let items: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(items, vec![CborValue::int(42)]);
    }

    #[test]
    fn mismatched_header_tags_fails_before_any_item() {
        let mut out = Vec::new();
        let mut writer = SequenceWriter::with_header(&mut out, 0xDEAD_BEEF);
        writer.write_item(&CborValue::int(1), EncodeOptions::new()).unwrap();

        let err = match SequenceReader::with_header(&out, DecodeOptions::new(), &[0x1111_1111, 0x2222_2222]) {
            Err(err) => err,
            Ok(_) => panic!("expected mismatched header tags to fail"),
        };
        assert!(matches!(err.kind(), crate::error::ErrorKind::MalformedItem { .. }));
    }

    #[test]
    fn matching_header_tags_is_accepted() {
        let mut out = Vec::new();
        let mut writer = SequenceWriter::with_header(&mut out, 0xDEAD_BEEF);
        writer.write_item(&CborValue::int(1), EncodeOptions::new()).unwrap();

        let (reader, tag) = SequenceReader::with_header(&out, DecodeOptions::new(), &[0xDEAD_BEEF]).unwrap();
        assert_eq!(tag, 0xDEAD_BEEF);
        let items: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(items, vec![CborValue::int(1)]);
    }

    #[test]
    fn malformed_header_is_rejected() {
        let bytes = [0u8; HEADER_LEN];
        assert!(SequenceReader::with_header(&bytes, DecodeOptions::new(), &[]).is_err());
    }
}
