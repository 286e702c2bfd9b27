//! Canonical binary encoding of a message body plus attributes.
//!
//! ```text
//! |length|body|length|name|length|data type|transport tag|length|value|
//! |4B    |    |4B    |    |4B    |         |1B           |4B    |     |
//! |---once----|--------------------zero or more-------------------------|
//! ```
//!
//! Lengths are big-endian `u32`. Attribute records are sorted by name so the
//! bytes, and therefore the digests, do not depend on map iteration order.
//! This layout is what lands in the blob store and must stay byte-for-byte stable.

use std::ops::Range;

use super::attributes::{AttributeData, AttributeValue, MessageAttributes, TransportKind};
use super::Message;
use crate::errors::{DecodeError, OffloadError};

const LENGTH_SIZE: usize = 4;
const TRANSPORT_TAG_SIZE: usize = 1;
const LENGTHS_PER_ATTRIBUTE: usize = 3;

/// Output of [`encode`]: the bytes plus the two regions the digests cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub bytes: Vec<u8>,
    pub body: Range<usize>,
    pub attributes: Range<usize>,
}

impl EncodedMessage {
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        &self.bytes[self.body.clone()]
    }

    #[must_use]
    pub fn attribute_bytes(&self) -> &[u8] {
        &self.bytes[self.attributes.clone()]
    }

    #[must_use]
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// # Errors
///
/// Returns [`OffloadError::Encoding`] if an attribute data type has no known
/// transport or a field does not fit a 32-bit length prefix.
pub fn encode(message: &Message) -> Result<EncodedMessage, OffloadError> {
    let attribute_count = message.attribute_count();
    let capacity = message.size()
        + LENGTH_SIZE
        + attribute_count * (LENGTHS_PER_ATTRIBUTE * LENGTH_SIZE + TRANSPORT_TAG_SIZE);
    let mut buf = Vec::with_capacity(capacity);

    write_field(&mut buf, message.body.as_bytes(), "body")?;
    let body = LENGTH_SIZE..buf.len();
    let attributes_start = buf.len();

    let mut sorted: Vec<(&String, &AttributeValue)> = message.attributes.iter().flatten().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    for (name, value) in sorted {
        let kind = TransportKind::for_data_type(value.data_type()).ok_or_else(|| {
            OffloadError::Encoding(format!(
                "unexpected message attribute data type {}",
                value.data_type()
            ))
        })?;

        write_field(&mut buf, name.as_bytes(), "attribute name")?;
        write_field(&mut buf, value.data_type().as_bytes(), "attribute data type")?;
        buf.push(kind.tag());
        write_field(&mut buf, value.data().as_bytes(), "attribute value")?;
    }

    let attributes = attributes_start..buf.len();
    Ok(EncodedMessage {
        bytes: buf,
        body,
        attributes,
    })
}

fn write_field(buf: &mut Vec<u8>, data: &[u8], field: &str) -> Result<(), OffloadError> {
    let len = u32::try_from(data.len()).map_err(|_| {
        OffloadError::Encoding(format!("{} of {} bytes exceeds length prefix", field, data.len()))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

/// Exact inverse of [`encode`]. A payload with no attribute records decodes
/// with `attributes: None`.
///
/// # Errors
///
/// Returns [`OffloadError::Decoding`] on truncated input, an unknown or
/// mismatched transport tag, invalid UTF-8 or a repeated attribute name.
pub fn decode(bytes: &[u8]) -> Result<Message, OffloadError> {
    let mut reader = Reader { bytes, pos: 0 };

    let body = reader.field().ok_or(DecodeError::ShortBody)?;
    let body = utf8(body, "body")?;

    let mut attributes: Option<MessageAttributes> = None;
    while !reader.is_empty() {
        let name = reader
            .field()
            .ok_or(DecodeError::ShortAttributeField("name"))?;
        let name = utf8(name, "attribute name")?;
        let data_type = reader
            .field()
            .ok_or(DecodeError::ShortAttributeField("data type"))?;
        let data_type = utf8(data_type, "attribute data type")?;
        let tag = reader
            .byte()
            .ok_or(DecodeError::ShortAttributeField("transport tag"))?;
        let kind = TransportKind::from_tag(tag).ok_or(DecodeError::UnknownTransportTag(tag))?;
        match TransportKind::for_data_type(&data_type) {
            Some(expected) if expected == kind => {}
            Some(_) => return Err(DecodeError::TransportTagMismatch { data_type, tag }.into()),
            None => return Err(DecodeError::UnknownDataType(data_type).into()),
        }
        let value = reader
            .field()
            .ok_or(DecodeError::ShortAttributeField("value"))?;

        let data = match kind {
            TransportKind::String => AttributeData::String(utf8(value, "attribute value")?),
            TransportKind::Binary => AttributeData::Binary(value.to_vec()),
        };
        let value = AttributeValue::new(data_type, data)?;

        let map = attributes.get_or_insert_with(MessageAttributes::new);
        if map.contains_key(&name) {
            return Err(DecodeError::DuplicateAttribute(name).into());
        }
        map.insert(name, value);
    }

    Ok(Message { body, attributes })
}

fn utf8(bytes: &[u8], field: &'static str) -> Result<String, DecodeError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(field))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        let end = self.pos.checked_add(n)?;
        let slice = bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn byte(&mut self) -> Option<u8> {
        self.take(TRANSPORT_TAG_SIZE).map(|b| b[0])
    }

    /// Reads one length-prefixed field; `None` if either part is truncated.
    fn field(&mut self) -> Option<&'a [u8]> {
        let len = self.take(LENGTH_SIZE)?;
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.take(len)
    }
}
