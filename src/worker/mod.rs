//! Worker Lambda handler for SQS-triggered consumers of offloaded messages.
//!
//! A Lambda bootstrap wires its own record handler into [`function_handler`]:
//!
//! ```no_run
//! use lambda_runtime::{Error, LambdaEvent, run, service_fn};
//! use queue_offload::S3BlobStore;
//! use queue_offload::worker::{ResolvedRecord, function_handler};
//! use serde_json::Value;
//!
//! async fn handle(record: ResolvedRecord) -> Result<(), Error> {
//!     tracing::info!(message_id = %record.message_id, "handled record");
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     tracing_subscriber::fmt()
//!         .with_max_level(tracing::Level::INFO)
//!         .init();
//!
//!     // One S3 client for the lifetime of the execution environment
//!     let blob_store = S3BlobStore::from_env().await;
//!     let blob_store = &blob_store;
//!
//!     run(service_fn(move |event: LambdaEvent<Value>| async move {
//!         function_handler(event, blob_store, handle).await
//!     }))
//!     .await
//! }
//! ```

pub mod event;
pub mod handler;

pub use event::{ResolvedBatch, ResolvedRecord, resolve_event};
pub use handler::{function_handler, process_event};
