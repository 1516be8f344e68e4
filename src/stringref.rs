//! The string-reference namespace backing tags 25/256: see `SPEC_FULL.md`
//! §3 and §4.3.1 for the threshold formula.
use crate::head::head_len;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringKey {
    Text(String),
    Bytes(Vec<u8>),
}

/// One scope's worth of already-emitted strings, pushed on entering a
/// `tag 256` region and popped on leaving it; nested scopes do not inherit
/// entries from their parent.
#[derive(Default)]
pub struct StringRefScope {
    entries: Vec<StringKey>,
}

impl StringRefScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, key: &StringKey) -> Option<u64> {
        self.entries.iter().position(|k| k == key).map(|i| i as u64)
    }

    pub fn push_entry(&mut self, key: StringKey) -> u64 {
        let index = self.entries.len() as u64;
        self.entries.push(key);
        index
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn get(&self, index: u64) -> Option<&StringKey> {
        self.entries.get(index as usize)
    }
}

/// Encode side: a stack of scopes, one per currently-open `tag 256` region.
#[derive(Default)]
pub struct StringRefStack {
    scopes: Vec<StringRefScope>,
}

impl StringRefStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(StringRefScope::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn current(&mut self) -> Option<&mut StringRefScope> {
        self.scopes.last_mut()
    }

    pub fn is_active(&self) -> bool {
        !self.scopes.is_empty()
    }
}

/// `crate::constants::MAJOR_TAG` argument plus the index's own head length:
/// the encoded size of a `tag 25` reference to `index`.
fn tag25_size(index: u64) -> usize {
    head_len(25) + head_len(index)
}

/// `true` iff referencing `raw_len` raw bytes as entry number `prospective_index`
/// is strictly shorter than emitting the string verbatim (whose own head
/// costs `head_len(raw_len as u64)` bytes in addition to its `raw_len` bytes
/// of payload). This is the inequality from `SPEC_FULL.md` §4.3.1.
pub fn is_referencing_shorter(prospective_index: u64, raw_len: usize) -> bool {
    tag25_size(prospective_index) < head_len(raw_len as u64) + raw_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_favors_long_strings() {
        // A one-byte string is never worth referencing.
        assert!(!is_referencing_shorter(0, 1));
        // An 8-char repeated string referenced at a small index is shorter
        // than re-emitting it (matches spec scenario E4: "aaaaaaaa").
        assert!(is_referencing_shorter(0, 8));
    }

    #[test]
    fn scopes_do_not_leak_into_children() {
        let mut stack = StringRefStack::new();
        stack.push_scope();
        stack.current().unwrap().push_entry(StringKey::Text("a".into()));
        stack.push_scope();
        assert_eq!(stack.current().unwrap().find(&StringKey::Text("a".into())), None);
        stack.pop_scope();
        assert_eq!(stack.current().unwrap().find(&StringKey::Text("a".into())), Some(0));
    }
}
