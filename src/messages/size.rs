use tracing::debug;

use super::Message;
use crate::core::config::OffloadConfig;
use crate::errors::OffloadError;

/// Routing decision for an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Fits the provider's native ceiling; sent unchanged.
    Direct { size: usize },
    /// Stored in the blob store behind a reference envelope.
    Offload { size: usize },
    /// Larger than anything this client will carry.
    Rejected { size: usize, limit: usize },
}

impl Classification {
    #[must_use]
    pub fn classify(message: &Message, config: &OffloadConfig) -> Self {
        let classification = Self::for_size(message.size(), config);
        debug!(?classification, "classified outgoing message");
        classification
    }

    #[must_use]
    pub fn for_size(size: usize, config: &OffloadConfig) -> Self {
        if size > config.absolute_limit {
            Self::Rejected {
                size,
                limit: config.absolute_limit,
            }
        } else if config.always_offload || size > config.direct_limit {
            Self::Offload { size }
        } else {
            Self::Direct { size }
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match *self {
            Self::Direct { size } | Self::Offload { size } | Self::Rejected { size, .. } => size,
        }
    }

    /// Turns a rejection into the caller-facing validation error.
    ///
    /// # Errors
    ///
    /// Returns [`OffloadError::MessageTooLarge`] for [`Classification::Rejected`].
    pub fn accept(self) -> Result<Self, OffloadError> {
        match self {
            Self::Rejected { size, limit } => Err(OffloadError::MessageTooLarge { size, limit }),
            other => Ok(other),
        }
    }
}
