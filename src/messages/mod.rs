//! Offload protocol: message model, wire codec, digests, envelopes and receipt handles.

pub mod attributes;
pub mod codec;
pub mod digest;
pub mod envelope;
pub mod receipt;
pub mod size;

pub use attributes::{AttributeData, AttributeValue, MessageAttributes, TransportKind};
pub use codec::EncodedMessage;
pub use digest::Digests;
pub use envelope::{BlobLocation, Destination, EnvelopeKind, ErrorEnvelope, ReferenceEnvelope};
pub use receipt::{CompositeReceiptHandle, ReceiptHandle};
pub use size::Classification;

/// A queue payload: a body plus optional typed attributes.
///
/// `attributes: None` and `Some(empty)` are distinct; conversions keep the difference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub attributes: Option<MessageAttributes>,
}

impl Message {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes
            .get_or_insert_with(MessageAttributes::new)
            .insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Option<MessageAttributes>) -> Self {
        self.attributes = attributes;
        self
    }

    /// `len(body) + Σ(len(name) + len(data type) + len(value))`, in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let attributes = self.attributes.iter().flatten().map(|(name, value)| {
            name.len() + value.data_type().len() + value.data().as_bytes().len()
        });
        self.body.len() + attributes.sum::<usize>()
    }

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.as_ref().map_or(0, MessageAttributes::len)
    }
}
