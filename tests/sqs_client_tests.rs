mod common;

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{
    BUCKET, FlakyBlobStore, FlakyQueue, QUEUE_URL, blob_store, connect, large_body, queue_client,
};
use queue_offload::client::{VERSION_ATTRIBUTE, WIRE_VERSION};
use queue_offload::core::config::MAX_OFFLOAD_MESSAGE_BYTES;
use queue_offload::errors::OffloadError;
use queue_offload::messages::codec;
use queue_offload::messages::digest::md5_hex;
use queue_offload::messages::envelope::{
    REFERENCE_ENVELOPE_IDENTIFIER, is_error_envelope, is_reference_envelope, reference_envelope,
};
use queue_offload::messages::{ErrorEnvelope, ReceiptHandle};
use queue_offload::stores::{MemoryQueue, QueueService};
use queue_offload::{
    AttributeValue, BlobStore, Message, OffloadConfig, OffloadQueueClient, ReceiveRequest,
};

fn all_attributes() -> ReceiveRequest {
    ReceiveRequest::new(QUEUE_URL)
        .with_attribute_names(["All"])
        .with_max_messages(10)
}

#[tokio::test]
async fn test_small_message_is_sent_directly() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let message = Message::new("hello").with_attribute("kind", AttributeValue::string("greeting"));

    let output = client.send(QUEUE_URL, &message).await.unwrap();

    assert_eq!(queue.pending(QUEUE_URL).await, vec![message]);
    assert_eq!(blobs.object_count(BUCKET).await, 0);
    assert_eq!(output.md5_of_body.as_deref(), Some(md5_hex(b"hello").as_str()));
}

#[tokio::test]
async fn test_large_message_is_offloaded() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let message = Message::new(large_body()).with_attribute("trace", AttributeValue::string("abc"));

    let output = client.send(QUEUE_URL, &message).await.unwrap();

    let pending = queue.pending(QUEUE_URL).await;
    assert_eq!(pending.len(), 1);
    assert!(is_reference_envelope(&pending[0].body));
    let expected_attributes = Message::new("")
        .with_attribute(VERSION_ATTRIBUTE, AttributeValue::string(WIRE_VERSION))
        .attributes;
    assert_eq!(pending[0].attributes, expected_attributes);

    let reference = reference_envelope(&pending[0].body).unwrap();
    assert_eq!(reference.location.region, "us-west-2");
    assert_eq!(reference.location.bucket, BUCKET);
    assert!(reference.location.key.starts_with("orders/"));

    let stored = blobs.object(BUCKET, &reference.location.key).await.unwrap();
    assert_eq!(codec::decode(&stored).unwrap(), message);

    // The caller sees the payload's digests, not the envelope's.
    assert_eq!(output.md5_of_body, Some(md5_hex(message.body.as_bytes())));
    assert_eq!(output.md5_of_body.as_deref(), Some(reference.body_digest.as_str()));
    assert_eq!(output.md5_of_attributes.as_deref(), Some(reference.attributes_digest.as_str()));
}

#[tokio::test]
async fn test_offloaded_message_round_trip_and_delete() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let message = Message::new(large_body())
        .with_attribute("trace", AttributeValue::string("abc"))
        .with_attribute("count", AttributeValue::number("3"))
        .with_attribute("raw", AttributeValue::binary(vec![1, 2, 3]));
    let sent = client.send(QUEUE_URL, &message).await.unwrap();

    let mut deliveries = client.receive(&all_attributes()).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    let received = deliveries.remove(0).unwrap();

    assert_eq!(received.body, message.body);
    assert_eq!(received.attributes, message.attributes);
    assert_eq!(received.md5_of_body, sent.md5_of_body);
    assert_eq!(received.md5_of_attributes, sent.md5_of_attributes);

    let handle = ReceiptHandle::decode(&received.receipt_handle).unwrap();
    let ReceiptHandle::Composite(composite) = handle else {
        panic!("expected a composite receipt handle");
    };
    assert_eq!(composite.bucket, BUCKET);
    assert_eq!(blobs.keys(BUCKET).await, vec![composite.key.clone()]);

    client.delete(QUEUE_URL, &received.receipt_handle).await.unwrap();
    assert_eq!(blobs.object_count(BUCKET).await, 0);
    assert_eq!(queue.len(QUEUE_URL).await, 0);
}

#[tokio::test]
async fn test_reconstructed_message_carries_all_attributes() {
    let (client, _queue, _blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let message = Message::new(large_body()).with_attribute("trace", AttributeValue::string("abc"));
    client.send(QUEUE_URL, &message).await.unwrap();

    // No attribute names requested.
    let received = client
        .receive(&ReceiveRequest::new(QUEUE_URL))
        .await
        .unwrap()
        .remove(0)
        .unwrap();
    assert_eq!(received.attributes, message.attributes);
}

#[tokio::test]
async fn test_message_over_absolute_limit_is_rejected() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    // body + "k" + "String" + "v" lands one byte over the limit
    let body = "a".repeat(MAX_OFFLOAD_MESSAGE_BYTES - 7);
    let message = Message::new(body).with_attribute("k", AttributeValue::string("v"));
    assert_eq!(message.size(), MAX_OFFLOAD_MESSAGE_BYTES + 1);

    let err = client.send(QUEUE_URL, &message).await.unwrap_err();

    assert!(matches!(
        err,
        OffloadError::MessageTooLarge { size, limit }
            if size == MAX_OFFLOAD_MESSAGE_BYTES + 1 && limit == MAX_OFFLOAD_MESSAGE_BYTES
    ));
    assert_eq!(queue.len(QUEUE_URL).await, 0);
    assert_eq!(blobs.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_always_offload_small_message() {
    let config = OffloadConfig::new(BUCKET).with_always_offload(true);
    let (client, queue, blobs) = queue_client(config).await;

    client.send(QUEUE_URL, &Message::new("test")).await.unwrap();

    let pending = queue.pending(QUEUE_URL).await;
    assert!(is_reference_envelope(&pending[0].body));
    assert_ne!(pending[0].body, "test");
    assert_eq!(blobs.object_count(BUCKET).await, 1);

    let received = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap();
    assert_eq!(received.body, "test");
    assert!(received.attributes.is_none());
    assert!(received.md5_of_attributes.is_none());
}

#[tokio::test]
async fn test_empty_body_is_passed_through() {
    let config = OffloadConfig::new(BUCKET).with_always_offload(true);
    let (client, queue, blobs) = queue_client(config).await;

    client.send(QUEUE_URL, &Message::new("")).await.unwrap();

    assert_eq!(queue.pending(QUEUE_URL).await, vec![Message::new("")]);
    assert_eq!(blobs.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_empty_body_with_oversized_attributes_is_rejected() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let attribute = AttributeValue::binary(vec![0; MAX_OFFLOAD_MESSAGE_BYTES + 10]);
    let message = Message::new("").with_attribute("blob", attribute);

    let err = client.send(QUEUE_URL, &message).await.unwrap_err();

    assert!(matches!(
        err,
        OffloadError::MessageTooLarge { limit, .. } if limit == MAX_OFFLOAD_MESSAGE_BYTES
    ));
    assert_eq!(queue.len(QUEUE_URL).await, 0);
    assert_eq!(blobs.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_upload_failure_leaves_queue_empty() {
    let queue = Arc::new(MemoryQueue::new());
    let blobs = Arc::new(FlakyBlobStore::new(blob_store()));
    let client = connect(Arc::clone(&queue), Arc::clone(&blobs)).await;
    blobs.fail_put.store(true, Ordering::SeqCst);

    let err = client.send(QUEUE_URL, &Message::new(large_body())).await.unwrap_err();

    assert!(matches!(err, OffloadError::Upstream { operation: "upload object", .. }));
    assert_eq!(queue.len(QUEUE_URL).await, 0);
}

#[tokio::test]
async fn test_queue_failure_after_upload_leaves_blob_behind() {
    let queue = Arc::new(FlakyQueue::new(Arc::new(MemoryQueue::new())));
    let blobs = blob_store();
    let client = connect(Arc::clone(&queue), Arc::clone(&blobs)).await;
    queue.fail_send.store(true, Ordering::SeqCst);

    let err = client.send(QUEUE_URL, &Message::new(large_body())).await.unwrap_err();

    assert!(matches!(err, OffloadError::Upstream { operation: "send message to", .. }));
    assert_eq!(err.source().unwrap().to_string(), "injected failure");
    assert_eq!(blobs.object_count(BUCKET).await, 1);
    assert_eq!(queue.inner.len(QUEUE_URL).await, 0);
}

#[tokio::test]
async fn test_unreadable_attributes_fail_only_their_message() {
    let queue = Arc::new(FlakyQueue::new(Arc::new(MemoryQueue::new())));
    let client = connect(Arc::clone(&queue), blob_store()).await;
    client.send(QUEUE_URL, &Message::new("first")).await.unwrap();
    client.send(QUEUE_URL, &Message::new("second")).await.unwrap();
    queue.unreadable_attributes.store(true, Ordering::SeqCst);

    let deliveries = client.receive(&all_attributes()).await.unwrap();

    assert_eq!(deliveries.len(), 2);
    for delivery in deliveries {
        let failure = delivery.unwrap_err();
        assert!(matches!(failure.source, OffloadError::InvalidAttribute(_)));
        assert!(failure.message.attribute_error.is_none());
        client.delete(QUEUE_URL, &failure.message.receipt_handle).await.unwrap();
    }
    assert_eq!(queue.inner.len(QUEUE_URL).await, 0);
}

#[tokio::test]
async fn test_blob_delete_failure_keeps_queue_entry() {
    let queue = Arc::new(MemoryQueue::new());
    let blobs = Arc::new(FlakyBlobStore::new(blob_store()));
    let client = connect(Arc::clone(&queue), Arc::clone(&blobs)).await;
    client.send(QUEUE_URL, &Message::new(large_body())).await.unwrap();
    let received = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap();

    blobs.fail_delete.store(true, Ordering::SeqCst);
    let err = client.delete(QUEUE_URL, &received.receipt_handle).await.unwrap_err();

    assert!(matches!(err, OffloadError::Upstream { operation: "delete object", .. }));
    assert_eq!(queue.len(QUEUE_URL).await, 1);
    assert_eq!(blobs.inner.object_count(BUCKET).await, 1);

    // Retrying once the store recovers cleans up both sides.
    blobs.fail_delete.store(false, Ordering::SeqCst);
    client.delete(QUEUE_URL, &received.receipt_handle).await.unwrap();
    assert_eq!(queue.len(QUEUE_URL).await, 0);
    assert_eq!(blobs.inner.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_missing_blob_fails_only_its_own_message() {
    let (client, _queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    client.send(QUEUE_URL, &Message::new(large_body())).await.unwrap();
    client.send(QUEUE_URL, &Message::new("plain")).await.unwrap();

    let key = blobs.keys(BUCKET).await.remove(0);
    blobs.delete(BUCKET, &key).await.unwrap();

    let deliveries = client.receive(&all_attributes()).await.unwrap();
    assert_eq!(deliveries.len(), 2);

    let delivered: Vec<_> = deliveries.iter().filter_map(|d| d.as_ref().ok()).collect();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].body, "plain");

    let failure = deliveries.into_iter().find_map(Result::err).unwrap();
    assert!(failure.source.is_not_found());
    assert!(matches!(
        ReceiptHandle::decode(&failure.message.receipt_handle).unwrap(),
        ReceiptHandle::Composite(_)
    ));

    // The failed message can still be deleted; the blob delete is a no-op.
    let receipt_handle = failure.message.receipt_handle.clone();
    let error_message = failure.into_error_message().unwrap();
    assert!(is_error_envelope(&error_message.body));
    let envelope = ErrorEnvelope::from_json(&error_message.body).unwrap();
    assert!(envelope.error.contains("not found"));
    assert!(envelope.reference.is_some());

    client.delete(QUEUE_URL, &receipt_handle).await.unwrap();
}

#[tokio::test]
async fn test_malformed_reference_envelope_is_a_retrieval_failure() {
    let (client, queue, _blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let body =
        format!("{{\n\t\"identifier\": \"{REFERENCE_ENVELOPE_IDENTIFIER}\",\n\t\"s3_key\": 42\n}}");
    queue.send(QUEUE_URL, &Message::new(body)).await.unwrap();

    let failure = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap_err();

    assert!(matches!(failure.source, OffloadError::Envelope(_)));
    assert!(failure.reference.is_none());
    assert!(matches!(
        ReceiptHandle::decode(&failure.message.receipt_handle).unwrap(),
        ReceiptHandle::Plain(_)
    ));
    client.delete(QUEUE_URL, &failure.message.receipt_handle).await.unwrap();
    assert_eq!(queue.len(QUEUE_URL).await, 0);
}

#[tokio::test]
async fn test_tampered_blob_fails_digest_check() {
    let (client, _queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    client.send(QUEUE_URL, &Message::new(large_body())).await.unwrap();

    let key = blobs.keys(BUCKET).await.remove(0);
    let tampered = codec::encode(&Message::new("something else")).unwrap();
    blobs.put(BUCKET, &key, tampered.into_bytes()).await.unwrap();

    let failure = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap_err();
    assert!(matches!(failure.source, OffloadError::DigestMismatch { .. }));
}

#[tokio::test]
async fn test_error_envelope_is_delivered_unchanged() {
    let (client, queue, _blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let body = ErrorEnvelope::new(&"upstream blew up", None).to_json().unwrap();
    queue.send(QUEUE_URL, &Message::new(body.clone())).await.unwrap();

    let received = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap();
    assert_eq!(received.body, body);
}

#[tokio::test]
async fn test_plain_receipt_handle_deletes_from_queue_only() {
    let (client, queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    blobs.put(BUCKET, "unrelated", vec![1]).await.unwrap();
    client.send(QUEUE_URL, &Message::new("plain")).await.unwrap();

    let received = client.receive(&all_attributes()).await.unwrap().remove(0).unwrap();
    client.delete(QUEUE_URL, &received.receipt_handle).await.unwrap();

    assert_eq!(queue.len(QUEUE_URL).await, 0);
    assert_eq!(blobs.object_count(BUCKET).await, 1);
}

#[tokio::test]
async fn test_malformed_composite_handle_is_rejected() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let (client, _queue, _blobs) = queue_client(OffloadConfig::new(BUCKET)).await;
    let handle = STANDARD.encode("offload-message|inner|bucket");

    let err = client.delete(QUEUE_URL, &handle).await.unwrap_err();
    assert!(matches!(err, OffloadError::ReceiptHandle(_)));
}

#[tokio::test]
async fn test_invalid_queue_url_fails_before_upload() {
    let (client, _queue, blobs) = queue_client(OffloadConfig::new(BUCKET)).await;

    let err = client
        .send("https://sqs.us-west-2.amazonaws.com/orders", &Message::new(large_body()))
        .await
        .unwrap_err();

    assert!(matches!(err, OffloadError::InvalidDestination(_)));
    assert_eq!(blobs.object_count(BUCKET).await, 0);
}

#[tokio::test]
async fn test_missing_bucket_is_reported_at_construction() {
    let result = OffloadQueueClient::new(
        MemoryQueue::new(),
        queue_offload::stores::MemoryBlobStore::new("us-west-2"),
        OffloadConfig::new(BUCKET),
    )
    .await;

    assert!(matches!(result, Err(OffloadError::BucketUnavailable(_))));
}
