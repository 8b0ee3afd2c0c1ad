//! The request unit that crosses the shard boundary.

use crate::codec;
use crate::error::BridgeError;
use crate::model::Bson;
use crate::protocol::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `{databaseName?, collectionName?, operation, arguments}` with JSON-safe arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    pub operation: Operation,
    #[serde(default)]
    pub arguments: Vec<JsonValue>,
}

impl Envelope {
    /// A collection-scoped envelope. Arguments are encoded here.
    pub fn collection(
        database: Option<&str>,
        collection: &str,
        operation: Operation,
        arguments: &[Bson],
    ) -> Self {
        Self {
            database_name: database.map(str::to_string),
            collection_name: Some(collection.to_string()),
            operation,
            arguments: codec::encode_all(arguments),
        }
    }

    /// A database-scoped envelope.
    pub fn database(database: Option<&str>, operation: Operation, arguments: &[Bson]) -> Self {
        Self {
            database_name: database.map(str::to_string),
            collection_name: None,
            operation,
            arguments: codec::encode_all(arguments),
        }
    }

    /// Collection name if any, else database name, else `default`. Used in log lines.
    pub fn target(&self) -> &str {
        self.collection_name
            .as_deref()
            .or(self.database_name.as_deref())
            .unwrap_or("default")
    }

    pub fn decoded_arguments(&self) -> Vec<Bson> {
        codec::decode_all(&self.arguments)
    }

    pub fn to_wire(&self) -> Result<JsonValue, BridgeError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a wire envelope. An unknown operation name is reported as
    /// [`BridgeError::UnsupportedOperation`] rather than a malformed message.
    pub fn from_wire(wire: JsonValue) -> Result<Self, BridgeError> {
        let name = wire
            .get("operation")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| BridgeError::Protocol("envelope has no operation".into()))?;
        name.parse::<Operation>()?;
        Ok(serde_json::from_value(wire)?)
    }
}

/// Options for a transaction batch, forwarded to the store when the transaction starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_concern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_commit_time_ms: Option<u64>,
}
