//! The closed set of operations a shard understands.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which executor an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    Collection,
    Database,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Collection => f.write_str("collection"),
            Scope::Database => f.write_str("database"),
        }
    }
}

/// Every operation that can travel in an envelope.
///
/// The wire name is the camelCase variant name (`findOneAndUpdate`, `listCollections`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    // Collection scope
    FindOne,
    Find,
    FindOneAndUpdate,
    FindOneAndDelete,
    FindOneAndReplace,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    Aggregate,
    Distinct,
    CountDocuments,
    // Database scope
    ListCollections,
    CreateCollection,
    DropCollection,
    DropDatabase,
    RenameCollection,
    Stats,
}

impl Operation {
    pub const ALL: [Operation; 20] = [
        Operation::FindOne,
        Operation::Find,
        Operation::FindOneAndUpdate,
        Operation::FindOneAndDelete,
        Operation::FindOneAndReplace,
        Operation::InsertOne,
        Operation::InsertMany,
        Operation::UpdateOne,
        Operation::UpdateMany,
        Operation::DeleteOne,
        Operation::DeleteMany,
        Operation::Aggregate,
        Operation::Distinct,
        Operation::CountDocuments,
        Operation::ListCollections,
        Operation::CreateCollection,
        Operation::DropCollection,
        Operation::DropDatabase,
        Operation::RenameCollection,
        Operation::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindOne => "findOne",
            Operation::Find => "find",
            Operation::FindOneAndUpdate => "findOneAndUpdate",
            Operation::FindOneAndDelete => "findOneAndDelete",
            Operation::FindOneAndReplace => "findOneAndReplace",
            Operation::InsertOne => "insertOne",
            Operation::InsertMany => "insertMany",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
            Operation::Aggregate => "aggregate",
            Operation::Distinct => "distinct",
            Operation::CountDocuments => "countDocuments",
            Operation::ListCollections => "listCollections",
            Operation::CreateCollection => "createCollection",
            Operation::DropCollection => "dropCollection",
            Operation::DropDatabase => "dropDatabase",
            Operation::RenameCollection => "renameCollection",
            Operation::Stats => "stats",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Operation::ListCollections
            | Operation::CreateCollection
            | Operation::DropCollection
            | Operation::DropDatabase
            | Operation::RenameCollection
            | Operation::Stats => Scope::Database,
            _ => Scope::Collection,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| BridgeError::UnsupportedOperation {
                scope: None,
                operation: s.to_string(),
            })
    }
}
