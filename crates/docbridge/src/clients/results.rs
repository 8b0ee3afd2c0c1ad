//! Typed views of the raw results a shard returns.

use crate::error::BridgeError;
use crate::model::{as_integer, type_name, Bson, Document};
use std::collections::BTreeMap;

fn protocol(what: &str, found: &Bson) -> BridgeError {
    BridgeError::Protocol(format!("expected {what}, got {}", type_name(found)))
}

fn result_document(value: Bson, what: &str) -> Result<Document, BridgeError> {
    match value {
        Bson::Document(doc) => Ok(doc),
        other => Err(protocol(what, &other)),
    }
}

fn count_field(doc: &Document, key: &str) -> Result<u64, BridgeError> {
    match doc.get(key) {
        None | Some(Bson::Null) => Ok(0),
        Some(value) => as_integer(value)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| protocol(&format!("non-negative integer {key}"), value)),
    }
}

fn acknowledged(doc: &Document) -> bool {
    doc.get("acknowledged")
        .and_then(Bson::as_bool)
        .unwrap_or(true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

impl TryFrom<Bson> for InsertOneResult {
    type Error = BridgeError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        let mut doc = result_document(value, "insertOne result")?;
        Ok(Self {
            acknowledged: acknowledged(&doc),
            inserted_id: doc.remove("insertedId").unwrap_or(Bson::Null),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    pub acknowledged: bool,
    pub inserted_count: u64,
    /// Generated or supplied `_id` by input position.
    pub inserted_ids: BTreeMap<usize, Bson>,
}

impl TryFrom<Bson> for InsertManyResult {
    type Error = BridgeError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        let mut doc = result_document(value, "insertMany result")?;
        let mut inserted_ids = BTreeMap::new();
        match doc.remove("insertedIds") {
            Some(Bson::Document(ids)) => {
                for (key, id) in ids {
                    let index = key
                        .parse()
                        .map_err(|_| BridgeError::Protocol(format!("bad insertedIds key {key:?}")))?;
                    inserted_ids.insert(index, id);
                }
            }
            Some(Bson::Array(ids)) => inserted_ids.extend(ids.into_iter().enumerate()),
            None | Some(Bson::Null) => {}
            Some(other) => return Err(protocol("insertedIds document", &other)),
        }
        Ok(Self {
            acknowledged: acknowledged(&doc),
            inserted_count: count_field(&doc, "insertedCount")?,
            inserted_ids,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<Bson>,
}

impl TryFrom<Bson> for UpdateResult {
    type Error = BridgeError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        let mut doc = result_document(value, "update result")?;
        Ok(Self {
            acknowledged: acknowledged(&doc),
            matched_count: count_field(&doc, "matchedCount")?,
            modified_count: count_field(&doc, "modifiedCount")?,
            upserted_count: count_field(&doc, "upsertedCount")?,
            upserted_id: doc
                .remove("upsertedId")
                .filter(|id| !matches!(id, Bson::Null)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl TryFrom<Bson> for DeleteResult {
    type Error = BridgeError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        let doc = result_document(value, "delete result")?;
        Ok(Self {
            acknowledged: acknowledged(&doc),
            deleted_count: count_field(&doc, "deletedCount")?,
        })
    }
}

pub(crate) fn into_optional_document(value: Bson) -> Result<Option<Document>, BridgeError> {
    match value {
        Bson::Null => Ok(None),
        Bson::Document(doc) => Ok(Some(doc)),
        other => Err(protocol("document or null", &other)),
    }
}

pub(crate) fn into_document(value: Bson) -> Result<Document, BridgeError> {
    result_document(value, "document")
}

pub(crate) fn into_documents(value: Bson) -> Result<Vec<Document>, BridgeError> {
    match value {
        Bson::Array(items) => items.into_iter().map(into_document).collect(),
        other => Err(protocol("array of documents", &other)),
    }
}

pub(crate) fn into_values(value: Bson) -> Result<Vec<Bson>, BridgeError> {
    match value {
        Bson::Array(items) => Ok(items),
        other => Err(protocol("array", &other)),
    }
}

pub(crate) fn into_count(value: Bson) -> Result<u64, BridgeError> {
    as_integer(&value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| protocol("count", &value))
}

pub(crate) fn into_bool(value: Bson) -> Result<bool, BridgeError> {
    value.as_bool().ok_or_else(|| protocol("boolean", &value))
}
