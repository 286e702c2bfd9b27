use std::env;

use crate::errors::OffloadError;

/// Native payload ceiling shared by SQS and SNS (256 KiB).
pub const MAX_PROVIDER_MESSAGE_BYTES: usize = 262_144;
/// Largest message this client will offload (32 MiB).
pub const MAX_OFFLOAD_MESSAGE_BYTES: usize = 33_554_432;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadConfig {
    pub bucket: String,
    pub always_offload: bool,
    pub direct_limit: usize,
    pub absolute_limit: usize,
}

impl OffloadConfig {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            always_offload: false,
            direct_limit: MAX_PROVIDER_MESSAGE_BYTES,
            absolute_limit: MAX_OFFLOAD_MESSAGE_BYTES,
        }
    }

    /// Offload every non-empty message to the blob store regardless of size.
    #[must_use]
    pub fn with_always_offload(mut self, always_offload: bool) -> Self {
        self.always_offload = always_offload;
        self
    }

    /// # Errors
    ///
    /// Returns an error if `direct_limit` is zero or not strictly below `absolute_limit`.
    pub fn with_limits(
        mut self,
        direct_limit: usize,
        absolute_limit: usize,
    ) -> Result<Self, OffloadError> {
        self.direct_limit = direct_limit;
        self.absolute_limit = absolute_limit;
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the bucket is empty or the limits are inconsistent.
    pub fn validate(&self) -> Result<(), OffloadError> {
        if self.bucket.trim().is_empty() {
            return Err(OffloadError::Config("bucket name must not be empty".to_string()));
        }
        if self.direct_limit == 0 {
            return Err(OffloadError::Config("direct limit must be greater than zero".to_string()));
        }
        if self.absolute_limit <= self.direct_limit {
            return Err(OffloadError::Config(format!(
                "absolute limit ({}) must be greater than direct limit ({})",
                self.absolute_limit, self.direct_limit
            )));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error naming the variable that is missing or malformed.
    pub fn from_env() -> Result<Self, OffloadError> {
        let bucket = env::var("OFFLOAD_BUCKET")
            .map_err(|e| OffloadError::Config(format!("OFFLOAD_BUCKET: {}", e)))?;

        let mut config = Self::new(bucket);
        config.always_offload = env::var("OFFLOAD_ALWAYS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        if let Some(limit) = parse_limit("OFFLOAD_DIRECT_LIMIT_BYTES")? {
            config.direct_limit = limit;
        }
        if let Some(limit) = parse_limit("OFFLOAD_ABSOLUTE_LIMIT_BYTES")? {
            config.absolute_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_limit(name: &str) -> Result<Option<usize>, OffloadError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| OffloadError::Config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
