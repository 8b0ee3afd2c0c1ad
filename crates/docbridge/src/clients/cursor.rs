//! # Lazy Cursors
//!
//! A cursor collects its query and modifiers locally. The shard is contacted exactly once, when
//! a terminal method ([`FindCursor::to_vec`], [`FindCursor::into_stream`] and their aggregate
//! counterparts) runs, and the whole result set comes back in that one reply.
//!
//! Terminal methods consume the cursor, so a cursor cannot be run twice.

use crate::clients::collection::CollectionProxy;
use crate::clients::results;
use crate::error::BridgeError;
use crate::model::{Bson, Document};
use crate::protocol::Operation;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::instrument;

fn document_stream(
    fetch: impl std::future::Future<Output = Result<Vec<Document>, BridgeError>>,
) -> impl Stream<Item = Result<Document, BridgeError>> {
    stream::once(fetch)
        .map_ok(|docs| stream::iter(docs.into_iter().map(Ok::<_, BridgeError>)))
        .try_flatten()
}

/// Cursor over a `find`. Modifiers are folded into the options document.
#[derive(Debug, Clone)]
pub struct FindCursor {
    collection: CollectionProxy,
    filter: Document,
    options: Document,
}

impl FindCursor {
    pub(crate) fn new(collection: CollectionProxy, filter: Document, options: Option<Document>) -> Self {
        Self {
            collection,
            filter,
            options: options.unwrap_or_default(),
        }
    }

    pub fn sort(mut self, spec: Document) -> Self {
        self.options.insert("sort", spec);
        self
    }

    /// `0` means no limit.
    pub fn limit(mut self, n: i64) -> Self {
        self.options.insert("limit", n);
        self
    }

    pub fn skip(mut self, n: i64) -> Self {
        self.options.insert("skip", n);
        self
    }

    pub fn project(mut self, projection: Document) -> Self {
        self.options.insert("projection", projection);
        self
    }

    /// Merges `options` over what has been set so far.
    pub fn with_options(mut self, options: Document) -> Self {
        for (key, value) in options {
            self.options.insert(key, value);
        }
        self
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn options(&self) -> &Document {
        &self.options
    }

    /// Runs the query and returns every matching document.
    #[instrument(skip(self), fields(collection = %self.collection.name()))]
    pub async fn to_vec(self) -> Result<Vec<Document>, BridgeError> {
        let options = if self.options.is_empty() {
            Bson::Null
        } else {
            self.options.into()
        };
        let reply = self
            .collection
            .call(Operation::Find, vec![self.filter.into(), options])
            .await?;
        results::into_documents(reply)
    }

    /// Runs the query on first poll and yields the documents one by one.
    pub fn into_stream(self) -> impl Stream<Item = Result<Document, BridgeError>> {
        document_stream(self.to_vec())
    }
}

/// Cursor over an `aggregate` pipeline.
#[derive(Debug, Clone)]
pub struct AggregateCursor {
    collection: CollectionProxy,
    pipeline: Vec<Document>,
    options: Document,
}

impl AggregateCursor {
    pub(crate) fn new(
        collection: CollectionProxy,
        pipeline: Vec<Document>,
        options: Option<Document>,
    ) -> Self {
        Self {
            collection,
            pipeline,
            options: options.unwrap_or_default(),
        }
    }

    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.options.insert("allowDiskUse", allow);
        self
    }

    pub fn batch_size(mut self, size: i64) -> Self {
        self.options.insert("batchSize", size);
        self
    }

    pub fn with_options(mut self, options: Document) -> Self {
        for (key, value) in options {
            self.options.insert(key, value);
        }
        self
    }

    pub fn pipeline(&self) -> &[Document] {
        &self.pipeline
    }

    pub fn options(&self) -> &Document {
        &self.options
    }

    #[instrument(skip(self), fields(collection = %self.collection.name(), stages = self.pipeline.len()))]
    pub async fn to_vec(self) -> Result<Vec<Document>, BridgeError> {
        let options = if self.options.is_empty() {
            Bson::Null
        } else {
            self.options.into()
        };
        let reply = self
            .collection
            .call(Operation::Aggregate, vec![self.pipeline.into(), options])
            .await?;
        results::into_documents(reply)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Document, BridgeError>> {
        document_stream(self.to_vec())
    }
}
