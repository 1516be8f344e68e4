//! The universal value domain `CborValue`, a closed sum type standing in
//! for the teacher crate's zero-copy `CborValue<'a>` view — this one owns
//! its data so it can be built freely by callers, shared cyclically via
//! [`Shared`], and round-tripped through [`crate::encode`]/[`crate::decode`].
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use ipnet::IpNet;
use regex::Regex;
use std::{
    cell::RefCell,
    fmt::{self, Debug, Display},
    net::IpAddr,
    rc::Rc,
};
use uuid::Uuid;

mod number;
pub use number::{BigDecimal, BigFloat, Integer, Rational};

/// Interior-mutable, reference-counted cell used for every container that
/// can participate in value sharing (tags 28/29): identity is observable
/// via [`Shared::ptr_eq`], and decode-time forward references install their
/// payload into an already-shared, still-empty cell.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity key usable in an encode-time identity map.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl<T: Clone> Shared<T> {
    pub fn get_clone(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T: Debug> Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0.borrow(), f)
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

/// Whether an array was produced in a mutable ([`List`](Sequence::List)) or
/// immutable ([`Tuple`](Sequence::Tuple)) decoding context. See
/// `SPEC_FULL.md` §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    List,
    Tuple,
}

/// Simple values beyond the four named literals, and the three float
/// widths, all major type 7.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Simple {
    False,
    True,
    Null,
    Undefined,
    Float16(half::f16),
    Float32(f32),
    Float64(f64),
    /// Simple values 0-19 and 32-255 that aren't one of the named ones.
    Unassigned(u8),
}

/// An opaque MIME message: per `SPEC_FULL.md` §1, MIME parsing is out of
/// scope, so tag 36 round-trips its raw text without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeMessage(pub String);

/// A compiled regular expression plus the source pattern it was compiled
/// from (tag 35). Equality and hashing are defined on the pattern text,
/// since `regex::Regex` implements neither.
#[derive(Debug, Clone)]
pub struct CborRegex {
    pub pattern: String,
    pub compiled: Regex,
}

impl PartialEq for CborRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl CborRegex {
    pub fn compile(pattern: String) -> Result<Self, regex::Error> {
        let compiled = Regex::new(&pattern)?;
        Ok(CborRegex { pattern, compiled })
    }
}

/// The universal value domain described in `SPEC_FULL.md` §3.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Integer(Integer),
    Bytes(Vec<u8>),
    Text(String),
    Array(Sequence, Shared<Vec<CborValue>>),
    Map(Shared<Vec<(CborValue, CborValue)>>),
    /// An unrecognized or user-defined tag wrapped around its payload.
    Tagged(u64, Box<CborValue>),
    Simple(Simple),
    /// Tag 258; `frozen` records whether it was decoded in an immutable
    /// context (map key or nested set element).
    Set { frozen: bool, elements: Vec<CborValue> },
    DateTime(DateTime<FixedOffset>),
    /// A date-time with no fixed offset attached. Only ever produced by a
    /// caller building a value to encode — decoding tag 0/1 always yields
    /// a tz-aware [`CborValue::DateTime`]. Encoding requires
    /// `EncodeOptions::timezone` to resolve the offset, per `spec.md` §6.
    NaiveDateTime(NaiveDateTime),
    /// A calendar date with no time-of-day. Encoding requires
    /// `EncodeOptions::date_as_datetime` to promote it to midnight before
    /// applying `EncodeOptions::timezone`; there is no wire representation
    /// for a bare date.
    Date(NaiveDate),
    BigDecimal(BigDecimal),
    BigFloat(BigFloat),
    Rational(Rational),
    Regex(CborRegex),
    MimeMessage(MimeMessage),
    Uuid(Uuid),
    IpAddr(IpAddr),
    IpNetwork(IpNet),
}

impl CborValue {
    pub fn null() -> Self {
        CborValue::Simple(Simple::Null)
    }

    pub fn undefined() -> Self {
        CborValue::Simple(Simple::Undefined)
    }

    pub fn bool(b: bool) -> Self {
        CborValue::Simple(if b { Simple::True } else { Simple::False })
    }

    pub fn int(v: i64) -> Self {
        CborValue::Integer(Integer::from(v))
    }

    pub fn text(s: impl Into<String>) -> Self {
        CborValue::Text(s.into())
    }

    pub fn array(items: Vec<CborValue>) -> Self {
        CborValue::Array(Sequence::List, Shared::new(items))
    }

    pub fn map(pairs: Vec<(CborValue, CborValue)>) -> Self {
        CborValue::Map(Shared::new(pairs))
    }

    pub fn is_container(&self) -> bool {
        matches!(self, CborValue::Array(..) | CborValue::Map(_))
    }

    /// Identity key for the share table, valid only for containers.
    pub fn identity(&self) -> Option<usize> {
        match self {
            CborValue::Array(_, s) => Some(s.identity()),
            CborValue::Map(s) => Some(s.identity()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl Display for CborValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CborValue::Integer(i) => write!(f, "{}", i),
            CborValue::Bytes(b) => {
                write!(f, "h'")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
            CborValue::Text(s) => write!(f, "{:?}", s),
            CborValue::Array(seq, items) => {
                let open = if *seq == Sequence::Tuple { "(" } else { "[" };
                let close = if *seq == Sequence::Tuple { ")" } else { "]" };
                write!(f, "{}", open)?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "{}", close)
            }
            CborValue::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            CborValue::Tagged(tag, payload) => write!(f, "{}({})", tag, payload),
            CborValue::Simple(s) => match s {
                Simple::False => write!(f, "false"),
                Simple::True => write!(f, "true"),
                Simple::Null => write!(f, "null"),
                Simple::Undefined => write!(f, "undefined"),
                Simple::Float16(v) => write!(f, "{}", f32::from(*v)),
                Simple::Float32(v) => write!(f, "{}", v),
                Simple::Float64(v) => write!(f, "{}", v),
                Simple::Unassigned(v) => write!(f, "simple({})", v),
            },
            CborValue::Set { frozen, elements } => {
                write!(f, "{}", if *frozen { "frozenset(" } else { "set(" })?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            CborValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            CborValue::NaiveDateTime(dt) => write!(f, "{}", dt),
            CborValue::Date(d) => write!(f, "{}", d),
            CborValue::BigDecimal(d) => write!(f, "{}", d),
            CborValue::BigFloat(bf) => write!(f, "{}", bf),
            CborValue::Rational(r) => write!(f, "{}", r),
            CborValue::Regex(r) => write!(f, "/{}/", r.pattern),
            CborValue::MimeMessage(m) => write!(f, "mime({} bytes)", m.0.len()),
            CborValue::Uuid(u) => write!(f, "{}", u),
            CborValue::IpAddr(ip) => write!(f, "{}", ip),
            CborValue::IpNetwork(net) => write!(f, "{}", net),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_identity() {
        let a = Shared::new(vec![CborValue::int(1)]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        let c = Shared::new(vec![CborValue::int(1)]);
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn display_basic() {
        assert_eq!(CborValue::int(42).to_string(), "42");
        assert_eq!(CborValue::bool(true).to_string(), "true");
        assert_eq!(
            CborValue::array(vec![CborValue::int(1), CborValue::int(2)]).to_string(),
            "[1, 2]"
        );
    }
}
