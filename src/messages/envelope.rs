//! Reference and error envelopes: the small JSON payloads that stand in for an
//! offloaded message on the queue.
//!
//! Both carry a fixed identifier as their first field, so "is this one of
//! ours?" is a prefix test on the raw body and never needs a parse.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::digest::Digests;
use crate::errors::OffloadError;

pub const REFERENCE_ENVELOPE_IDENTIFIER: &str = "7c1f3e9a2d6b4f08a5e2c94b1d8f6a37";
pub const ERROR_ENVELOPE_IDENTIFIER: &str = "b58c8bae78504da3a2e32cceeb77d342";

static REFERENCE_PREFIX: Lazy<String> = Lazy::new(|| json_prefix(REFERENCE_ENVELOPE_IDENTIFIER));
static ERROR_PREFIX: Lazy<String> = Lazy::new(|| json_prefix(ERROR_ENVELOPE_IDENTIFIER));

fn json_prefix(identifier: &str) -> String {
    format!("{{\n\t\"identifier\": \"{identifier}\",")
}

/// What a queue body turned out to be, decided by prefix alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Plain,
    Reference,
    Error,
}

impl EnvelopeKind {
    #[must_use]
    pub fn sniff(body: &str) -> Self {
        if is_reference_envelope(body) {
            Self::Reference
        } else if is_error_envelope(body) {
            Self::Error
        } else {
            Self::Plain
        }
    }
}

#[must_use]
pub fn is_reference_envelope(body: &str) -> bool {
    body.starts_with(REFERENCE_PREFIX.as_str())
}

#[must_use]
pub fn is_error_envelope(body: &str) -> bool {
    body.starts_with(ERROR_PREFIX.as_str())
}

/// Parses `body` if it is a reference envelope.
///
/// Meant for consumers that read queue payloads without going through
/// [`crate::client::OffloadQueueClient`], e.g. Lambda triggers, and fetch the
/// blob themselves.
#[must_use]
pub fn reference_envelope(body: &str) -> Option<ReferenceEnvelope> {
    if !is_reference_envelope(body) {
        return None;
    }
    ReferenceEnvelope::from_json(body).ok()
}

/// Where an offloaded payload lives in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLocation {
    #[serde(rename = "s3_region")]
    pub region: String,
    #[serde(rename = "s3_bucket")]
    pub bucket: String,
    #[serde(rename = "s3_key")]
    pub key: String,
}

/// The queue or topic a message is being sent to; its name prefixes the blob key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `https://sqs.{region}.amazonaws.com/{account}/{queue}`
    Queue(String),
    /// `arn:aws:sns:{region}:{account}:{topic}`
    Topic(String),
}

impl Destination {
    /// # Errors
    ///
    /// Returns [`OffloadError::InvalidDestination`] if the queue URL or topic ARN is malformed.
    pub fn name(&self) -> Result<String, OffloadError> {
        match self {
            Destination::Queue(url) => queue_name(url),
            Destination::Topic(arn) => topic_name(arn),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Destination::Queue(s) | Destination::Topic(s) => s,
        }
    }
}

fn queue_name(queue_url: &str) -> Result<String, OffloadError> {
    const EXPECTED_SEGMENTS: usize = 2;

    let url = Url::parse(queue_url)
        .map_err(|e| OffloadError::InvalidDestination(format!("queue url {queue_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OffloadError::InvalidDestination(format!(
            "queue url {queue_url}: unsupported scheme {}",
            url.scheme()
        )));
    }

    let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
    match segments.as_slice() {
        [account, queue] if !account.is_empty() && !queue.is_empty() => Ok((*queue).to_string()),
        _ => Err(OffloadError::InvalidDestination(format!(
            "expected {EXPECTED_SEGMENTS} path segments in queue url {queue_url} but received {}",
            segments.len()
        ))),
    }
}

fn topic_name(topic_arn: &str) -> Result<String, OffloadError> {
    const EXPECTED_TOKENS: usize = 6;

    let tokens: Vec<&str> = topic_arn.split(':').collect();
    if tokens.len() != EXPECTED_TOKENS {
        return Err(OffloadError::InvalidDestination(format!(
            "expected {EXPECTED_TOKENS} tokens when splitting topic arn {topic_arn} by ':' \
             but received {}",
            tokens.len()
        )));
    }
    if tokens[0] != "arn" || tokens[2] != "sns" || tokens[5].is_empty() {
        return Err(OffloadError::InvalidDestination(format!("not an sns topic arn: {topic_arn}")));
    }
    Ok(tokens[5].to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEnvelope {
    identifier: String,
    #[serde(flatten)]
    pub location: BlobLocation,
    #[serde(rename = "md5_digest_msg_body")]
    pub body_digest: String,
    #[serde(rename = "md5_digest_msg_attr")]
    pub attributes_digest: String,
}

impl ReferenceEnvelope {
    #[must_use]
    pub fn new(location: BlobLocation, digests: Digests) -> Self {
        Self {
            identifier: REFERENCE_ENVELOPE_IDENTIFIER.to_string(),
            location,
            body_digest: digests.body,
            attributes_digest: digests.attributes,
        }
    }

    /// Builds the envelope for a fresh send, keyed `{queue-or-topic}/{uuid}`.
    ///
    /// # Errors
    ///
    /// Returns [`OffloadError::InvalidDestination`] if the destination cannot be parsed.
    pub fn for_destination(
        destination: &Destination,
        region: &str,
        bucket: &str,
        digests: Digests,
    ) -> Result<Self, OffloadError> {
        let name = destination.name()?;
        let location = BlobLocation {
            region: region.to_string(),
            bucket: bucket.to_string(),
            key: format!("{}/{}", name, Uuid::new_v4()),
        };
        Ok(Self::new(location, digests))
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn digests(&self) -> Digests {
        Digests {
            body: self.body_digest.clone(),
            attributes: self.attributes_digest.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns [`OffloadError::Envelope`] if serialization fails.
    pub fn to_json(&self) -> Result<String, OffloadError> {
        to_tabbed_json(self)
    }

    /// # Errors
    ///
    /// Returns [`OffloadError::Envelope`] if the text is not a reference envelope.
    pub fn from_json(text: &str) -> Result<Self, OffloadError> {
        let envelope: Self = serde_json::from_str(text)?;
        if envelope.identifier != REFERENCE_ENVELOPE_IDENTIFIER {
            return Err(OffloadError::Envelope(format!(
                "unexpected reference identifier {}",
                envelope.identifier
            )));
        }
        Ok(envelope)
    }
}

/// Delivered in place of a message whose offloaded payload could not be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    identifier: String,
    pub error: String,
    #[serde(rename = "reference_msg")]
    pub reference: Option<ReferenceEnvelope>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(error: &impl std::fmt::Display, reference: Option<ReferenceEnvelope>) -> Self {
        Self {
            identifier: ERROR_ENVELOPE_IDENTIFIER.to_string(),
            error: error.to_string(),
            reference,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// # Errors
    ///
    /// Returns [`OffloadError::Envelope`] if serialization fails.
    pub fn to_json(&self) -> Result<String, OffloadError> {
        to_tabbed_json(self)
    }

    /// # Errors
    ///
    /// Returns [`OffloadError::Envelope`] if the text is not an error envelope.
    pub fn from_json(text: &str) -> Result<Self, OffloadError> {
        let envelope: Self = serde_json::from_str(text)?;
        if envelope.identifier != ERROR_ENVELOPE_IDENTIFIER {
            return Err(OffloadError::Envelope(format!(
                "unexpected error identifier {}",
                envelope.identifier
            )));
        }
        Ok(envelope)
    }
}

fn to_tabbed_json<T: Serialize>(value: &T) -> Result<String, OffloadError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| OffloadError::Envelope(e.to_string()))
}
