use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("message size of {size} bytes greater than allowed message size of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Invalid message attribute: {0}")]
    InvalidAttribute(String),

    #[error("Failed to encode message: {0}")]
    Encoding(String),

    #[error("Failed to decode message: {0}")]
    Decoding(#[from] DecodeError),

    #[error("Failed to process envelope: {0}")]
    Envelope(String),

    #[error("Failed to decode receipt handle: {0}")]
    ReceiptHandle(String),

    #[error("Offloaded message not found at s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Digest mismatch for s3://{bucket}/{key}")]
    DigestMismatch { bucket: String, key: String },

    #[error("Failed to {operation} {target}: {message}")]
    Upstream {
        operation: &'static str,
        target: String,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Bucket unavailable: {0}")]
    BucketUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Reasons a wire-encoded payload can fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("short body")]
    ShortBody,

    #[error("short attribute field: {0}")]
    ShortAttributeField(&'static str),

    #[error("unknown transport tag {0}")]
    UnknownTransportTag(u8),

    #[error("unknown attribute data type {0}")]
    UnknownDataType(String),

    #[error("transport tag {tag} does not match data type {data_type}")]
    TransportTagMismatch { data_type: String, tag: u8 },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("duplicate attribute {0}")]
    DuplicateAttribute(String),
}

impl OffloadError {
    /// Wraps a failed call to the queue or blob store, keeping the cause attached.
    pub fn upstream<E>(operation: &'static str, target: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OffloadError::Upstream {
            operation,
            target: target.into(),
            message: aws_sdk_s3::error::DisplayErrorContext(&error).to_string(),
            source: Box::new(error),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, OffloadError::NotFound { .. })
    }
}

impl From<serde_json::Error> for OffloadError {
    fn from(error: serde_json::Error) -> Self {
        OffloadError::Envelope(error.to_string())
    }
}
