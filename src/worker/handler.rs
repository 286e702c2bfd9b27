#![allow(clippy::missing_errors_doc)]
use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, warn};

use super::event::{ResolvedRecord, resolve_event};
use crate::stores::BlobStore;

/// Lambda handler for the Worker entrypoint. `handler` receives every record
/// that resolves.
pub async fn function_handler<B, F, Fut, E>(
    event: LambdaEvent<Value>,
    blob_store: &B,
    handler: F,
) -> Result<Value, Error>
where
    B: BlobStore + ?Sized,
    F: Fn(ResolvedRecord) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    info!(request_id = %event.context.request_id, "worker received SQS event");
    process_event(&event.payload, blob_store, handler).await
}

/// Lambda deletes the queue entries for every record not reported in
/// `batchItemFailures`, so a record's blob is deleted only after `handler`
/// accepts it. A record that fails to resolve, that `handler` rejects, or
/// whose blob cannot be deleted is reported as failed, which keeps its queue
/// entry and blob for a retry.
pub async fn process_event<B, F, Fut, E>(
    payload: &Value,
    blob_store: &B,
    handler: F,
) -> Result<Value, Error>
where
    B: BlobStore + ?Sized,
    F: Fn(ResolvedRecord) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut batch = resolve_event(payload, blob_store).await.map_err(|e| {
        error!("Failed to read SQS event: {}", e);
        Error::from(e)
    })?;

    let records = std::mem::take(&mut batch.records);
    let outcomes =
        join_all(records.into_iter().map(|record| deliver(record, blob_store, &handler))).await;

    let mut delivered = 0;
    for outcome in outcomes {
        match outcome {
            Ok(()) => delivered += 1,
            Err(message_id) => batch.failures.push(message_id),
        }
    }

    info!(delivered, failed = batch.failures.len(), "worker finished batch");
    Ok(batch.batch_response())
}

/// Hands one record to `handler`, then releases its blob. Returns the message
/// id on failure.
async fn deliver<B, F, Fut, E>(
    record: ResolvedRecord,
    blob_store: &B,
    handler: &F,
) -> Result<(), String>
where
    B: BlobStore + ?Sized,
    F: Fn(ResolvedRecord) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let message_id = record.message_id.clone();
    let location = record.location.clone();
    info!(
        message_id = %message_id,
        size = record.message.size(),
        attributes = record.message.attribute_count(),
        offloaded = location.is_some(),
        "delivering record"
    );

    if let Err(e) = handler(record).await {
        warn!(
            message_id = %message_id,
            error = %e,
            "record handler failed, reporting record as failed"
        );
        return Err(message_id);
    }

    if let Some(location) = location {
        if let Err(e) = blob_store.delete(&location.bucket, &location.key).await {
            warn!(
                message_id = %message_id,
                bucket = %location.bucket,
                key = %location.key,
                error = %e,
                "failed to delete offloaded payload, reporting record as failed"
            );
            return Err(message_id);
        }
    }
    Ok(())
}
