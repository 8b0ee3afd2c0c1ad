//! # Wire Codec
//!
//! Converts native [`Bson`] trees to and from their JSON-safe wire form.
//!
//! | Native | Wire |
//! |--------|------|
//! | `ObjectId` | `{"$oid": "507f1f77bcf86cd799439011"}` |
//! | `DateTime` | `{"$date": "2024-01-01T00:00:00.000Z"}` |
//! | `Binary` | `{"$binary": {"base64": "AQI=", "subType": "00"}}` |
//! | other BSON types | relaxed extended JSON |
//! | `Array` / `Document` | element-wise / key-wise |
//! | scalars | unchanged |
//!
//! Encoding is total. Decoding never fails: a marker that is recognized but malformed is
//! logged with `warn!` and mirrored back unchanged, so re-encoding it yields the same JSON.
//! Object identifiers also arrive as 12-byte buffers in four shapes (see [`BufferForm`]); a
//! `buffer` field that holds anything else is an ordinary field and its object is decoded
//! key by key.

mod shape;

pub use shape::{BufferForm, WireShape};

use crate::model::{integer, Binary, BinarySubtype, Bson, DateTime, Document, ObjectId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value as JsonValue};
use shape::{BINARY_KEY, DATE_KEY, OID_KEY};
use tracing::warn;

/// Encodes a native value into its wire form.
pub fn encode(value: &Bson) -> JsonValue {
    match value {
        Bson::Null => JsonValue::Null,
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::Int32(i) => JsonValue::Number((*i).into()),
        Bson::Int64(i) => JsonValue::Number((*i).into()),
        // JSON has no NaN or infinity.
        Bson::Double(d) => Number::from_f64(*d).map_or(JsonValue::Null, JsonValue::Number),
        Bson::String(s) => JsonValue::String(s.clone()),
        Bson::ObjectId(id) => marker(OID_KEY, JsonValue::String(id.to_hex())),
        Bson::DateTime(dt) => marker(DATE_KEY, JsonValue::String(format_date(dt))),
        Bson::Binary(binary) => {
            let mut payload = Map::new();
            payload.insert(
                "base64".into(),
                JsonValue::String(STANDARD.encode(&binary.bytes)),
            );
            payload.insert(
                "subType".into(),
                JsonValue::String(format!("{:02x}", u8::from(binary.subtype))),
            );
            marker(BINARY_KEY, JsonValue::Object(payload))
        }
        Bson::Array(items) => JsonValue::Array(items.iter().map(encode).collect()),
        Bson::Document(doc) => encode_document(doc),
        other => other.clone().into_relaxed_extjson(),
    }
}

pub fn encode_document(doc: &Document) -> JsonValue {
    JsonValue::Object(doc.iter().map(|(k, v)| (k.clone(), encode(v))).collect())
}

/// Encodes an argument list.
pub fn encode_all(values: &[Bson]) -> Vec<JsonValue> {
    values.iter().map(encode).collect()
}

/// Decodes a wire value, interpreting extended-type markers at any depth.
pub fn decode(json: &JsonValue) -> Bson {
    match WireShape::classify(json) {
        WireShape::OidMarker(hex) => match ObjectId::parse_str(hex) {
            Ok(id) => Bson::ObjectId(id),
            Err(e) => {
                warn!(value = %json, error = %e, "Invalid $oid, passing through");
                mirror(json)
            }
        },
        WireShape::BufferedOid(form) => match form.object_id_bytes() {
            Ok(bytes) => Bson::ObjectId(ObjectId::from_bytes(bytes)),
            Err(reason) => {
                warn!(value = %json, %reason, "Not a buffered object id, decoding as a document");
                json.as_object().map_or_else(|| mirror(json), decode_object)
            }
        },
        WireShape::DateMarker(text) => match parse_date(text) {
            Some(dt) => Bson::DateTime(dt),
            None => {
                warn!(value = %json, "Invalid $date, passing through");
                mirror(json)
            }
        },
        WireShape::BinaryMarker(payload) => {
            match shape::decode_binary(payload).and_then(|bytes| {
                Ok(Binary {
                    subtype: BinarySubtype::from(shape::binary_subtype(payload)?),
                    bytes,
                })
            }) {
                Ok(binary) => Bson::Binary(binary),
                Err(reason) => {
                    warn!(value = %json, %reason, "Invalid $binary, passing through");
                    mirror(json)
                }
            }
        }
        WireShape::Array(items) => Bson::Array(items.iter().map(decode).collect()),
        WireShape::Object(object) => decode_object(object),
        WireShape::Plain(plain) => mirror(plain),
    }
}

pub fn decode_all(values: &[JsonValue]) -> Vec<Bson> {
    values.iter().map(decode).collect()
}

fn decode_object(object: &Map<String, JsonValue>) -> Bson {
    Bson::Document(
        object
            .iter()
            .map(|(k, v)| (k.clone(), decode(v)))
            .collect(),
    )
}

/// Structural copy with no marker interpretation.
fn mirror(json: &JsonValue) -> Bson {
    match json {
        JsonValue::Null => Bson::Null,
        JsonValue::Bool(b) => Bson::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => integer(i),
            None => n.as_f64().map_or(Bson::Null, Bson::Double),
        },
        JsonValue::String(s) => Bson::String(s.clone()),
        JsonValue::Array(items) => Bson::Array(items.iter().map(mirror).collect()),
        JsonValue::Object(object) => Bson::Document(
            object
                .iter()
                .map(|(k, v)| (k.clone(), mirror(v)))
                .collect(),
        ),
    }
}

fn marker(key: &str, payload: JsonValue) -> JsonValue {
    let mut object = Map::new();
    object.insert(key.to_string(), payload);
    JsonValue::Object(object)
}

/// ISO-8601 in UTC with millisecond precision and a `Z` suffix.
pub fn format_date(dt: &DateTime) -> String {
    dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts RFC 3339, a date-time without offset (read as UTC), or a bare date (midnight UTC).
/// Precision below a millisecond is dropped.
pub fn parse_date(text: &str) -> Option<DateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(DateTime::from_chrono(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_chrono(Utc.from_utc_datetime(&naive)));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(DateTime::from_chrono(
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?),
    ))
}
