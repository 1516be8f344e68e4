//! The shared-value registry backing tags 28/29: one side per direction,
//! as laid out in `SPEC_FULL.md` §3 and §4.8.
use crate::value::{CborValue, Sequence, Shared};
use std::collections::HashMap;

/// Encode-time registry: identity (pointer value of the container's
/// `Shared` cell) -> index already assigned to it. A container is only
/// ever registered once; every later appearance becomes a `tag 29`
/// reference to the same index.
#[derive(Default)]
pub struct EncodeShareTable {
    seen: HashMap<usize, u64>,
    next_index: u64,
}

impl EncodeShareTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing index if this identity was already registered.
    pub fn lookup(&self, identity: usize) -> Option<u64> {
        self.seen.get(&identity).copied()
    }

    /// Registers a fresh identity and returns its newly assigned index.
    /// Callers must check `lookup` first, matching the "tag 28 at most
    /// once per identity" invariant.
    pub fn register(&mut self, identity: usize) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.seen.insert(identity, index);
        index
    }
}

/// A still-live handle to a container being decoded. Holding the same `Rc`
/// that will eventually be populated is what lets a `tag 29` forward
/// reference resolve correctly once the enclosing `tag 28` container
/// finishes: no value is copied, the cell itself is mutated in place.
#[derive(Clone)]
pub enum ContainerHandle {
    Array(Sequence, Shared<Vec<CborValue>>),
    Map(Shared<Vec<(CborValue, CborValue)>>),
}

impl ContainerHandle {
    pub fn to_value(&self) -> CborValue {
        match self {
            ContainerHandle::Array(seq, shared) => CborValue::Array(*seq, shared.clone()),
            ContainerHandle::Map(shared) => CborValue::Map(shared.clone()),
        }
    }
}

/// Decode-time slot: a container whose children may still be filling in,
/// or a fully-decoded scalar/tagged value (which can never legally be
/// self-referential, since it has no children to decode).
#[derive(Clone)]
pub enum Slot {
    Container(ContainerHandle),
    Scalar(CborValue),
}

/// Decode-time registry: a linear arena of slots, indexed the same way the
/// encoder assigned them.
#[derive(Default)]
pub struct DecodeShareTable {
    slots: Vec<Option<Slot>>,
}

impl DecodeShareTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next index without yet knowing its content; used the
    /// instant a `tag 28` head is seen, before its payload's own head has
    /// been read.
    pub fn reserve(&mut self) -> u64 {
        let index = self.slots.len() as u64;
        self.slots.push(None);
        index
    }

    pub fn fill(&mut self, index: u64, slot: Slot) {
        if let Some(entry) = self.slots.get_mut(index as usize) {
            *entry = Some(slot);
        }
    }

    pub fn get(&self, index: u64) -> Option<&Slot> {
        self.slots.get(index as usize).and_then(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_table_assigns_sequential_indices() {
        let mut table = EncodeShareTable::new();
        assert_eq!(table.lookup(1), None);
        assert_eq!(table.register(1), 0);
        assert_eq!(table.lookup(1), Some(0));
        assert_eq!(table.register(2), 1);
    }

    #[test]
    fn decode_table_reserve_then_fill() {
        let mut table = DecodeShareTable::new();
        let idx = table.reserve();
        assert!(table.get(idx).is_none());
        table.fill(idx, Slot::Scalar(CborValue::int(42)));
        assert!(matches!(table.get(idx), Some(Slot::Scalar(_))));
    }

    #[test]
    fn container_handle_mutation_is_visible_through_clone() {
        let shared = Shared::new(Vec::<CborValue>::new());
        let handle = ContainerHandle::Array(Sequence::List, shared.clone());
        let referenced = handle.to_value();
        shared.borrow_mut().push(CborValue::int(1));
        if let CborValue::Array(_, s) = referenced {
            assert_eq!(s.borrow().len(), 1);
        } else {
            panic!("expected array");
        }
    }
}
