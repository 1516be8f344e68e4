//! The options surfaces passed into `encode`/`decode`, mirroring the
//! builder-style configuration knobs of the teacher crate's `CborBuilder`
//! (`with_max_definite_size`, `with_scratch_space`, ...).
use crate::{
    constants::DEFAULT_MAX_DEPTH,
    decoder::Decoder,
    error::CodecError,
    value::CborValue,
};
use chrono::FixedOffset;
use std::collections::HashMap;
use std::rc::Rc;

/// How to handle invalid UTF-8 in a text string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrErrors {
    /// Fail with `MalformedItem`.
    Strict,
    /// Replace invalid sequences with U+FFFD.
    Replace,
    /// Drop invalid sequences.
    Ignore,
}

impl Default for StrErrors {
    fn default() -> Self {
        StrErrors::Strict
    }
}

type UnrepresentableHook = dyn Fn(&CborValue) -> Option<CborValue>;

/// Options governing `encode`/`encode_into`.
pub struct EncodeOptions {
    pub timezone: Option<FixedOffset>,
    pub datetime_as_timestamp: bool,
    pub date_as_datetime: bool,
    pub value_sharing: bool,
    pub string_referencing: bool,
    pub canonical: bool,
    pub on_unrepresentable: Option<Box<UnrepresentableHook>>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            timezone: None,
            datetime_as_timestamp: false,
            date_as_datetime: false,
            value_sharing: false,
            string_referencing: false,
            canonical: false,
            on_unrepresentable: None,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timezone(mut self, tz: FixedOffset) -> Self {
        self.timezone = Some(tz);
        self
    }

    pub fn with_datetime_as_timestamp(mut self, v: bool) -> Self {
        self.datetime_as_timestamp = v;
        self
    }

    pub fn with_date_as_datetime(mut self, v: bool) -> Self {
        self.date_as_datetime = v;
        self
    }

    pub fn with_value_sharing(mut self, v: bool) -> Self {
        self.value_sharing = v;
        self
    }

    pub fn with_string_referencing(mut self, v: bool) -> Self {
        self.string_referencing = v;
        self
    }

    pub fn with_canonical(mut self, v: bool) -> Self {
        self.canonical = v;
        self
    }

    pub fn with_on_unrepresentable(
        mut self,
        hook: impl Fn(&CborValue) -> Option<CborValue> + 'static,
    ) -> Self {
        self.on_unrepresentable = Some(Box::new(hook));
        self
    }
}

/// A user-supplied tag decoder. Takes `&mut Decoder` (not just the payload)
/// so a hook can register its result as shareable via `Decoder::set_shareable`
/// or inspect `Decoder::immutable`, mirroring the dynamic-decoder contract in
/// `SPEC_FULL.md` §4.6.
pub type TagHandler = dyn Fn(&mut Decoder, CborValue) -> Result<CborValue, CodecError>;

/// A registry of user-supplied tag decoders, consulted before the built-in
/// table (`SPEC_FULL.md` §4.2, dispatch step 2). Handlers are kept behind
/// `Rc` rather than `Box` so the decoder's dispatch loop can clone one out
/// before calling it with `&mut Decoder` — borrowing the handler straight
/// out of `decoder.options` while also passing `decoder` mutably would not
/// satisfy the borrow checker.
#[derive(Default)]
pub struct TagHookRegistry {
    handlers: HashMap<u64, Rc<TagHandler>>,
}

impl TagHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        tag: u64,
        handler: impl Fn(&mut Decoder, CborValue) -> Result<CborValue, CodecError> + 'static,
    ) {
        self.handlers.insert(tag, Rc::new(handler));
    }

    pub fn get(&self, tag: u64) -> Option<Rc<TagHandler>> {
        self.handlers.get(&tag).cloned()
    }
}

/// Options governing `decode`/`decode_from`.
pub struct DecodeOptions {
    pub tag_hook: TagHookRegistry,
    pub object_hook: Option<Box<dyn Fn(CborValue) -> CborValue>>,
    pub disable_builtin_tags: bool,
    pub str_errors: StrErrors,
    pub max_depth: usize,
    /// Reject heads that don't use the shortest legal encoding of their
    /// argument (`SPEC_FULL.md` §4.1's `canonical::recompress` pass).
    pub canonical: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            tag_hook: TagHookRegistry::new(),
            object_hook: None,
            disable_builtin_tags: false,
            str_errors: StrErrors::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            canonical: false,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_hook(mut self, hook: impl Fn(CborValue) -> CborValue + 'static) -> Self {
        self.object_hook = Some(Box::new(hook));
        self
    }

    pub fn with_disable_builtin_tags(mut self, v: bool) -> Self {
        self.disable_builtin_tags = v;
        self
    }

    pub fn with_str_errors(mut self, v: StrErrors) -> Self {
        self.str_errors = v;
        self
    }

    pub fn with_max_depth(mut self, v: usize) -> Self {
        self.max_depth = v;
        self
    }

    pub fn with_canonical(mut self, v: bool) -> Self {
        self.canonical = v;
        self
    }
}
