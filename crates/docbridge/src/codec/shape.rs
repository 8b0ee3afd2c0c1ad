//! Classification of raw wire values.
//!
//! Decoding first sorts a JSON value into exactly one [`WireShape`], then the codec matches on
//! the shape. Classification looks only at structure; whether the contents are valid (good hex,
//! a parseable date, exactly 12 bytes) is decided afterwards, so a recognized-but-malformed
//! marker can be reported and passed through.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value as JsonValue};

pub const OID_KEY: &str = "$oid";
pub const DATE_KEY: &str = "$date";
pub const BINARY_KEY: &str = "$binary";
pub const BUFFER_KEY: &str = "buffer";

const OBJECT_ID_LEN: usize = 12;

/// The decode-relevant shape of a wire value, in decode priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireShape<'a> {
    /// `{"$oid": "<hex>"}`; extra keys are ignored.
    OidMarker(&'a str),
    /// `{"buffer": ...}` in one of the four identifier buffer forms.
    BufferedOid(BufferForm<'a>),
    /// `{"$date": "<iso>"}`; extra keys are ignored.
    DateMarker(&'a str),
    /// `{"$binary": {...}}`.
    BinaryMarker(&'a JsonValue),
    Array(&'a [JsonValue]),
    Object(&'a Map<String, JsonValue>),
    Plain(&'a JsonValue),
}

/// The four wire forms of a buffered object identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferForm<'a> {
    /// `{"buffer": {"$binary": {"base64": ..., "subType": ...}}}`
    Raw(&'a JsonValue),
    /// `{"buffer": {"0": b0, "1": b1, ...}}`, a typed byte view serialized by index.
    TypedView(&'a Map<String, JsonValue>),
    /// `{"buffer": [b0, b1, ...]}`
    ByteArray(&'a [JsonValue]),
    /// `{"buffer": {"type": "Buffer", "data": [b0, b1, ...]}}`
    Tagged(&'a [JsonValue]),
}

impl<'a> WireShape<'a> {
    pub fn classify(value: &'a JsonValue) -> Self {
        let object = match value {
            JsonValue::Array(items) => return WireShape::Array(items),
            JsonValue::Object(object) => object,
            _ => return WireShape::Plain(value),
        };

        if let Some(JsonValue::String(hex)) = object.get(OID_KEY) {
            return WireShape::OidMarker(hex);
        }
        if let Some(form) = object.get(BUFFER_KEY).and_then(BufferForm::classify) {
            return WireShape::BufferedOid(form);
        }
        if let Some(JsonValue::String(date)) = object.get(DATE_KEY) {
            return WireShape::DateMarker(date);
        }
        if let Some(binary) = object.get(BINARY_KEY) {
            return WireShape::BinaryMarker(binary);
        }
        WireShape::Object(object)
    }
}

impl<'a> BufferForm<'a> {
    fn classify(buffer: &'a JsonValue) -> Option<Self> {
        match buffer {
            JsonValue::Array(items) => Some(BufferForm::ByteArray(items)),
            JsonValue::Object(object) => {
                if let Some(binary) = object.get(BINARY_KEY) {
                    return Some(BufferForm::Raw(binary));
                }
                if object.get("type").and_then(JsonValue::as_str) == Some("Buffer") {
                    if let Some(JsonValue::Array(data)) = object.get("data") {
                        return Some(BufferForm::Tagged(data));
                    }
                }
                let indexed = !object.is_empty()
                    && object
                        .keys()
                        .all(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()));
                indexed.then_some(BufferForm::TypedView(object))
            }
            _ => None,
        }
    }

    /// Extracts exactly 12 valid bytes, or explains why not.
    pub fn object_id_bytes(&self) -> Result<[u8; 12], String> {
        let bytes = match self {
            BufferForm::Raw(binary) => decode_binary(binary)?,
            BufferForm::ByteArray(items) | BufferForm::Tagged(items) => {
                items.iter().map(byte_value).collect::<Result<Vec<_>, _>>()?
            }
            BufferForm::TypedView(object) => {
                let mut indexed = object
                    .iter()
                    .map(|(k, v)| {
                        let index: usize = k.parse().map_err(|_| format!("bad index {k:?}"))?;
                        Ok((index, byte_value(v)?))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                indexed.sort_by_key(|(index, _)| *index);
                if indexed.iter().enumerate().any(|(i, (index, _))| i != *index) {
                    return Err("typed view indices are not contiguous from 0".to_string());
                }
                indexed.into_iter().map(|(_, b)| b).collect()
            }
        };

        <[u8; OBJECT_ID_LEN]>::try_from(bytes.as_slice())
            .map_err(|_| format!("expected {OBJECT_ID_LEN} bytes, got {}", bytes.len()))
    }
}

/// An integer in `[0, 255]`. Integral floats (`7.0`) are accepted.
fn byte_value(value: &JsonValue) -> Result<u8, String> {
    let number = value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        })
        .ok_or_else(|| format!("not a byte: {value}"))?;
    u8::try_from(number).map_err(|_| format!("byte out of range: {number}"))
}

/// Decodes the payload of a `$binary` marker: `{"base64": "...", "subType": "00"}`.
pub fn decode_binary(binary: &JsonValue) -> Result<Vec<u8>, String> {
    let encoded = binary
        .get("base64")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| "missing base64 field".to_string())?;
    STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid base64: {e}"))
}

/// The `subType` of a `$binary` payload as two hex digits; generic (`0`) when absent.
pub fn binary_subtype(binary: &JsonValue) -> Result<u8, String> {
    match binary.get("subType") {
        None => Ok(0),
        Some(JsonValue::String(hex)) => {
            u8::from_str_radix(hex, 16).map_err(|_| format!("invalid subType {hex:?}"))
        }
        Some(other) => Err(format!("invalid subType {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oid_marker_wins_over_other_keys() {
        let value = json!({"$oid": "507f1f77bcf86cd799439011", "$date": "2024-01-01"});
        assert!(matches!(
            WireShape::classify(&value),
            WireShape::OidMarker("507f1f77bcf86cd799439011")
        ));
    }

    #[test]
    fn test_non_string_markers_are_plain_objects() {
        let value = json!({"$oid": 5});
        assert!(matches!(WireShape::classify(&value), WireShape::Object(_)));
        let value = json!({"$date": null});
        assert!(matches!(WireShape::classify(&value), WireShape::Object(_)));
    }

    #[test]
    fn test_buffer_forms_are_recognized_structurally() {
        let byte_array = json!({"buffer": [1, 2]});
        let tagged = json!({"buffer": {"type": "Buffer", "data": [1]}});
        let view = json!({"buffer": {"0": 1, "1": 2}});
        let raw = json!({"buffer": {"$binary": {"base64": "AQI=", "subType": "00"}}});
        let not_a_buffer = json!({"buffer": "abc"});
        let named_keys = json!({"buffer": {"size": 12}});

        assert!(matches!(
            WireShape::classify(&byte_array),
            WireShape::BufferedOid(BufferForm::ByteArray(_))
        ));
        assert!(matches!(
            WireShape::classify(&tagged),
            WireShape::BufferedOid(BufferForm::Tagged(_))
        ));
        assert!(matches!(
            WireShape::classify(&view),
            WireShape::BufferedOid(BufferForm::TypedView(_))
        ));
        assert!(matches!(
            WireShape::classify(&raw),
            WireShape::BufferedOid(BufferForm::Raw(_))
        ));
        assert!(matches!(
            WireShape::classify(&not_a_buffer),
            WireShape::Object(_)
        ));
        assert!(matches!(
            WireShape::classify(&named_keys),
            WireShape::Object(_)
        ));
    }

    #[test]
    fn test_byte_validation() {
        let form = BufferForm::ByteArray(&[]);
        assert_eq!(
            form.object_id_bytes(),
            Err("expected 12 bytes, got 0".to_string())
        );

        let items = vec![json!(256); 12];
        assert!(BufferForm::ByteArray(&items)
            .object_id_bytes()
            .unwrap_err()
            .contains("out of range"));

        let items = vec![json!(1.5); 12];
        assert!(BufferForm::ByteArray(&items)
            .object_id_bytes()
            .unwrap_err()
            .contains("not a byte"));
    }

    #[test]
    fn test_binary_subtype() {
        assert_eq!(binary_subtype(&json!({"base64": ""})), Ok(0));
        assert_eq!(binary_subtype(&json!({"subType": "04"})), Ok(4));
        assert!(binary_subtype(&json!({"subType": "zz"})).is_err());
        assert!(binary_subtype(&json!({"subType": 4})).is_err());
    }

    #[test]
    fn test_typed_view_requires_contiguous_indices() {
        let mut object = Map::new();
        for i in (0..12).map(|i| if i == 5 { 20 } else { i }) {
            object.insert(i.to_string(), json!(0));
        }
        assert!(BufferForm::TypedView(&object)
            .object_id_bytes()
            .unwrap_err()
            .contains("contiguous"));
    }
}
