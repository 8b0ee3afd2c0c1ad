//! Native value model.
//!
//! Documents and values are the `bson` crate's types: [`Document`] keeps fields in insertion
//! order, [`Bson`] covers the JSON types plus object ids, dates and binary payloads. The
//! helpers below smooth over the integer widths a decoded value can carry.

pub use bson::oid::ObjectId;
pub use bson::spec::BinarySubtype;
pub use bson::{doc, Binary, Bson, DateTime, Document};

/// Integral view of a number. Doubles qualify only when they have no fractional part.
pub fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
        _ => None,
    }
}

/// Smallest integer variant that holds `n`.
pub fn integer(n: i64) -> Bson {
    i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)
}

/// Count reply for a store result. Saturates at `i64::MAX`.
pub fn count(n: u64) -> Bson {
    integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Generic-subtype binary value.
pub fn binary(bytes: impl Into<Vec<u8>>) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes: bytes.into(),
    })
}

/// Short name of the value's type, for error messages.
pub fn type_name(value: &Bson) -> String {
    format!("{:?}", value.element_type())
}
