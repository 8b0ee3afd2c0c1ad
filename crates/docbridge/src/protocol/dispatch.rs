//! One call-and-response per envelope.
//!
//! Failures are logged with the operation and its target, then returned unchanged. There is no
//! retry.

use crate::codec;
use crate::error::BridgeError;
use crate::model::Bson;
use crate::protocol::{Envelope, TransactionOptions};
use crate::shard_actor::BridgeHandle;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

/// Sends one envelope and decodes the reply.
pub async fn dispatch(handle: &BridgeHandle, envelope: Envelope) -> Result<Bson, BridgeError> {
    debug!(
        operation = %envelope.operation,
        target = envelope.target(),
        shard = handle.name(),
        "Dispatching"
    );
    match send(handle, &envelope).await {
        Ok(reply) => Ok(codec::decode(&reply)),
        Err(e) => {
            error!(
                operation = %envelope.operation,
                target = envelope.target(),
                shard = handle.name(),
                error = %e,
                "Dispatch failed"
            );
            Err(e)
        }
    }
}

async fn send(handle: &BridgeHandle, envelope: &Envelope) -> Result<JsonValue, BridgeError> {
    let wire = envelope.to_wire()?;
    Ok(handle.execute(wire).await?)
}

/// Sends a batch of envelopes as one invocation. Replies are decoded independently, in order.
pub async fn dispatch_batch(
    handle: &BridgeHandle,
    envelopes: Vec<Envelope>,
    options: TransactionOptions,
) -> Result<Vec<Bson>, BridgeError> {
    debug!(count = envelopes.len(), shard = handle.name(), "Dispatching batch");
    match send_batch(handle, &envelopes, options).await {
        Ok(replies) => Ok(codec::decode_all(&replies)),
        Err(e) => {
            let operations: Vec<String> = envelopes
                .iter()
                .map(|e| format!("{}:{}", e.target(), e.operation))
                .collect();
            error!(
                operations = ?operations,
                shard = handle.name(),
                error = %e,
                "Batch dispatch failed"
            );
            Err(e)
        }
    }
}

async fn send_batch(
    handle: &BridgeHandle,
    envelopes: &[Envelope],
    options: TransactionOptions,
) -> Result<Vec<JsonValue>, BridgeError> {
    let wire = envelopes
        .iter()
        .map(Envelope::to_wire)
        .collect::<Result<Vec<_>, _>>()?;
    let replies = handle.execute_batch(wire, options).await?;
    if replies.len() != envelopes.len() {
        return Err(BridgeError::Protocol(format!(
            "batch of {} envelopes answered with {} results",
            envelopes.len(),
            replies.len()
        )));
    }
    Ok(replies)
}
