//! Resolving SQS-triggered Lambda events whose records may be reference envelopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::client::fetch_offloaded;
use crate::errors::OffloadError;
use crate::messages::{
    AttributeData, AttributeValue, BlobLocation, EnvelopeKind, Message, MessageAttributes,
    ReferenceEnvelope, TransportKind,
};
use crate::stores::BlobStore;

fn v_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn v_str<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    v_path(root, path).and_then(|v| v.as_str())
}

/// A record whose payload is ready to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub message_id: String,
    pub message: Message,
    /// Where the payload came from, if it was offloaded.
    pub location: Option<BlobLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBatch {
    pub records: Vec<ResolvedRecord>,
    /// Message ids to report back for redelivery.
    pub failures: Vec<String>,
}

impl ResolvedBatch {
    /// Lambda partial batch response.
    #[must_use]
    pub fn batch_response(&self) -> Value {
        let failures: Vec<Value> = self
            .failures
            .iter()
            .map(|id| json!({ "itemIdentifier": id }))
            .collect();
        json!({ "batchItemFailures": failures })
    }
}

/// Walks `Records[]` of an SQS event, downloading every offloaded payload.
/// Records that cannot be resolved land in [`ResolvedBatch::failures`].
///
/// # Errors
///
/// Returns [`OffloadError::Envelope`] if the event has no `Records` array or
/// a record has no `messageId`.
pub async fn resolve_event<B>(
    payload: &Value,
    blob_store: &B,
) -> Result<ResolvedBatch, OffloadError>
where
    B: BlobStore + ?Sized,
{
    let records = payload
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| OffloadError::Envelope("event has no Records array".to_string()))?;

    let mut pending = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let message_id = v_str(record, &["messageId"])
            .ok_or_else(|| OffloadError::Envelope(format!("record {index} has no messageId")))?;
        pending.push((message_id.to_string(), record));
    }

    let outcomes = join_all(
        pending
            .iter()
            .map(|(message_id, record)| resolve_record(message_id, record, blob_store)),
    )
    .await;

    let mut batch = ResolvedBatch::default();
    for ((message_id, _), outcome) in pending.into_iter().zip(outcomes) {
        match outcome {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                error!(message_id = %message_id, error = %e, "failed to resolve record");
                batch.failures.push(message_id);
            }
        }
    }
    Ok(batch)
}

async fn resolve_record<B>(
    message_id: &str,
    record: &Value,
    blob_store: &B,
) -> Result<ResolvedRecord, OffloadError>
where
    B: BlobStore + ?Sized,
{
    let body = v_str(record, &["body"]).unwrap_or_default();

    match EnvelopeKind::sniff(body) {
        EnvelopeKind::Reference => {
            let reference = ReferenceEnvelope::from_json(body)?;
            let message = fetch_offloaded(blob_store, &reference).await?;
            Ok(ResolvedRecord {
                message_id: message_id.to_string(),
                message,
                location: Some(reference.location),
            })
        }
        kind => {
            if kind == EnvelopeKind::Error {
                warn!(message_id, "record carries an error envelope");
            }
            Ok(ResolvedRecord {
                message_id: message_id.to_string(),
                message: Message {
                    body: body.to_string(),
                    attributes: attributes_from_event(record.get("messageAttributes"))?,
                },
                location: None,
            })
        }
    }
}

/// Lambda's `messageAttributes` shape: `dataType` plus a `stringValue` or a
/// base64 `binaryValue`. An empty object maps to `None`.
///
/// # Errors
///
/// Returns [`OffloadError::InvalidAttribute`] for an unknown data type or a
/// missing or undecodable value.
pub fn attributes_from_event(
    attributes: Option<&Value>,
) -> Result<Option<MessageAttributes>, OffloadError> {
    let Some(map) = attributes.and_then(Value::as_object).filter(|map| !map.is_empty()) else {
        return Ok(None);
    };

    map.iter()
        .map(|(name, attr)| {
            let missing = |field: &str| {
                OffloadError::InvalidAttribute(format!("attribute {name} has no {field}"))
            };
            let data_type = v_str(attr, &["dataType"]).ok_or_else(|| missing("dataType"))?;

            let data = match TransportKind::for_data_type(data_type) {
                Some(TransportKind::String) => {
                    let value =
                        v_str(attr, &["stringValue"]).ok_or_else(|| missing("stringValue"))?;
                    AttributeData::String(value.to_string())
                }
                Some(TransportKind::Binary) => {
                    let encoded =
                        v_str(attr, &["binaryValue"]).ok_or_else(|| missing("binaryValue"))?;
                    let bytes = STANDARD.decode(encoded).map_err(|e| {
                        OffloadError::InvalidAttribute(format!("attribute {name}: {e}"))
                    })?;
                    AttributeData::Binary(bytes)
                }
                None => {
                    return Err(OffloadError::InvalidAttribute(format!(
                        "attribute {name} has unexpected data type {data_type}"
                    )));
                }
            };

            Ok((name.clone(), AttributeValue::new(data_type, data)?))
        })
        .collect::<Result<MessageAttributes, _>>()
        .map(Some)
}
