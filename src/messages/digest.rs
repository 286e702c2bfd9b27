use md5::{Digest, Md5};

use super::Message;
use super::codec::{self, EncodedMessage};
use crate::errors::OffloadError;

/// Hex MD5 digests over the body and attribute regions of an encoded message,
/// matching what SQS reports as `MD5OfMessageBody` / `MD5OfMessageAttributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digests {
    pub body: String,
    /// Empty when the message has no attributes.
    pub attributes: String,
}

impl Digests {
    #[must_use]
    pub fn compute(encoded: &EncodedMessage) -> Self {
        let attributes = if encoded.has_attributes() {
            md5_hex(encoded.attribute_bytes())
        } else {
            String::new()
        };

        Self {
            body: md5_hex(encoded.body_bytes()),
            attributes,
        }
    }

    /// Same digests as `compute(&encode(message)?)` without encoding the body.
    ///
    /// # Errors
    ///
    /// Propagates attribute encoding failures.
    pub fn of_message(message: &Message) -> Result<Self, OffloadError> {
        let attributes_only = Message {
            body: String::new(),
            attributes: message.attributes.clone(),
        };
        let encoded = codec::encode(&attributes_only)?;
        Ok(Self {
            body: md5_hex(message.body.as_bytes()),
            ..Self::compute(&encoded)
        })
    }

    /// The attribute digest as the provider reports it: absent when empty.
    #[must_use]
    pub fn attributes_digest(&self) -> Option<String> {
        if self.attributes.is_empty() {
            None
        } else {
            Some(self.attributes.clone())
        }
    }
}

#[must_use]
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}
