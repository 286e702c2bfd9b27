//! Composite receipt handles: the provider's handle plus the blob location,
//! packed into one opaque string so deleting a message can clean up both stores.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::envelope::BlobLocation;
use crate::errors::OffloadError;

pub const RECEIPT_HANDLE_MARKER: &str = "offload-message";
const DELIMITER: char = '|';
const EXPECTED_TOKEN_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeReceiptHandle {
    pub inner: String,
    pub bucket: String,
    pub key: String,
}

impl CompositeReceiptHandle {
    #[must_use]
    pub fn new(inner: impl Into<String>, location: &BlobLocation) -> Self {
        Self {
            inner: inner.into(),
            bucket: location.bucket.clone(),
            key: location.key.clone(),
        }
    }

    /// `base64(marker|inner|bucket|key)`
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!(
            "{RECEIPT_HANDLE_MARKER}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.inner, self.bucket, self.key
        );
        STANDARD.encode(raw)
    }
}

/// A handle handed back by receive: either the provider's own, or ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptHandle {
    Plain(String),
    Composite(CompositeReceiptHandle),
}

impl ReceiptHandle {
    /// Anything that does not decode to our marker is treated as a provider
    /// handle and returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`OffloadError::ReceiptHandle`] if the marker is present but
    /// the handle does not split into exactly four tokens.
    pub fn decode(handle: &str) -> Result<Self, OffloadError> {
        let Some(decoded) = STANDARD
            .decode(handle)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        else {
            return Ok(Self::Plain(handle.to_string()));
        };

        let has_marker = decoded
            .strip_prefix(RECEIPT_HANDLE_MARKER)
            .is_some_and(|rest| rest.starts_with(DELIMITER));
        if !has_marker {
            return Ok(Self::Plain(handle.to_string()));
        }

        let tokens: Vec<&str> = decoded.split(DELIMITER).collect();
        match tokens.as_slice() {
            [_, inner, bucket, key] => Ok(Self::Composite(CompositeReceiptHandle {
                inner: (*inner).to_string(),
                bucket: (*bucket).to_string(),
                key: (*key).to_string(),
            })),
            _ => Err(OffloadError::ReceiptHandle(format!(
                "expected {EXPECTED_TOKEN_COUNT} tokens but found {}",
                tokens.len()
            ))),
        }
    }

    /// The handle the queue provider understands.
    #[must_use]
    pub fn provider_handle(&self) -> &str {
        match self {
            Self::Plain(handle) => handle,
            Self::Composite(composite) => &composite.inner,
        }
    }
}
