use std::{
    fmt::{Debug, Display},
    str::Utf8Error,
};

/// What the parser was looking for when bytes ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhileParsing {
    ItemHeader,
    HeaderValue,
    ArrayItem,
    DictItem,
    DictValue,
    BytesFragment,
    BytesValue,
    StringFragment,
    StringValue,
    TagPayload,
}

/// Which side raised a [`TagHookFailure`](ErrorKind::TagHookFailure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSide {
    Encode,
    Decode,
}

/// Errors that may be encountered when encoding or decoding CBOR.
///
/// This is the taxonomy, not a type hierarchy: every failure mode the codec
/// can produce fits in exactly one of these kinds.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bytes violate the CBOR grammar: bad head, stray break, mismatched
    /// indefinite-length chunk major type, invalid UTF-8 under strict mode.
    MalformedItem {
        while_parsing: WhileParsing,
        detail: MalformedDetail,
    },
    /// The encoder cannot represent the given value: a naive date-time with
    /// no default timezone configured, or a hook that returned a value the
    /// encoder still can't represent.
    UnsupportedValue(String),
    /// A cycle was detected while encoding with `value_sharing` disabled.
    CyclicReference,
    /// Tag 29 referenced a slot that doesn't exist, or tag 28 was emitted
    /// twice for the same share index.
    ShareIndexInvalid(u64),
    /// The top-level decode finished with bytes remaining.
    TrailingData,
    /// Recursion or container nesting exceeded the configured depth.
    StackOverflow,
    /// A user-supplied hook raised; the tag number and original cause are
    /// preserved.
    TagHookFailure {
        tag: u64,
        side: HookSide,
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedDetail {
    InvalidInfo,
    InvalidStringFragment,
    InvalidUtf8(Utf8ErrorEq),
    UnexpectedEof,
    ReservedArgument,
    StrayBreak,
    TruncatedTag,
    /// A head encoded its argument with more bytes than necessary, rejected
    /// only when `DecodeOptions::canonical` is set.
    NonCanonicalHead,
}

/// `Utf8Error` doesn't implement `Eq`, only `PartialEq`; wrap it so
/// `MalformedDetail` can still derive both.
#[derive(Debug, Clone, Copy)]
pub struct Utf8ErrorEq(pub Utf8Error);

impl PartialEq for Utf8ErrorEq {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Utf8ErrorEq {}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedItem {
                while_parsing,
                detail,
            } => write!(f, "malformed item ({:?}) while parsing {:?}", detail, while_parsing),
            ErrorKind::UnsupportedValue(msg) => write!(f, "unsupported value: {}", msg),
            ErrorKind::CyclicReference => write!(f, "cyclic reference without value sharing"),
            ErrorKind::ShareIndexInvalid(i) => write!(f, "invalid share index {}", i),
            ErrorKind::TrailingData => write!(f, "trailing data after top-level item"),
            ErrorKind::StackOverflow => write!(f, "recursion depth exceeded"),
            ErrorKind::TagHookFailure { tag, side, cause } => {
                write!(f, "tag hook for tag {} failed during {:?}: {}", tag, side, cause)
            }
        }
    }
}

/// Error container carrying the byte offset at which the problem was
/// detected, in the spirit of `cbor-data::ParseError`.
pub struct CodecError {
    offset: usize,
    kind: ErrorKind,
}

impl CodecError {
    pub fn new(offset: usize, kind: ErrorKind) -> Self {
        Self { offset, kind }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn malformed(offset: usize, while_parsing: WhileParsing, detail: MalformedDetail) -> Self {
        Self::new(
            offset,
            ErrorKind::MalformedItem {
                while_parsing,
                detail,
            },
        )
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl Debug for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for CodecError {}
