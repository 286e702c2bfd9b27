//! Typed message attributes and conversions to the SQS and SNS SDK shapes.

use std::collections::HashMap;

use aws_sdk_sns::types::MessageAttributeValue as SnsAttributeValue;
use aws_sdk_sqs::primitives::Blob as SqsBlob;
use aws_sdk_sqs::types::MessageAttributeValue as SqsAttributeValue;

use crate::errors::OffloadError;

pub type MessageAttributes = HashMap<String, AttributeValue>;

/// How an attribute value travels on the wire, selected by its data type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    String = 1,
    Binary = 2,
}

impl TransportKind {
    /// `String*` and `Number*` travel as strings, `Binary*` as bytes.
    #[must_use]
    pub fn for_data_type(data_type: &str) -> Option<Self> {
        if data_type.starts_with("String") || data_type.starts_with("Number") {
            Some(Self::String)
        } else if data_type.starts_with("Binary") {
            Some(Self::Binary)
        } else {
            None
        }
    }

    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::String),
            2 => Some(Self::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeData {
    String(String),
    Binary(Vec<u8>),
}

impl AttributeData {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttributeData::String(s) => s.as_bytes(),
            AttributeData::Binary(b) => b,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            AttributeData::String(_) => TransportKind::String,
            AttributeData::Binary(_) => TransportKind::Binary,
        }
    }
}

/// A single message attribute. The data type prefix and the populated value
/// always agree; construction enforces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    data_type: String,
    data: AttributeData,
}

impl AttributeValue {
    /// # Errors
    ///
    /// Returns an error if the data type prefix is unknown or does not match the value kind.
    pub fn new(data_type: impl Into<String>, data: AttributeData) -> Result<Self, OffloadError> {
        let data_type = data_type.into();
        match TransportKind::for_data_type(&data_type) {
            Some(kind) if kind == data.kind() => Ok(Self { data_type, data }),
            Some(kind) => Err(OffloadError::InvalidAttribute(format!(
                "data type {} requires a {:?} value",
                data_type, kind
            ))),
            None => Err(OffloadError::InvalidAttribute(format!(
                "unexpected data type {}",
                data_type
            ))),
        }
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            data: AttributeData::String(value.into()),
        }
    }

    #[must_use]
    pub fn number(value: impl Into<String>) -> Self {
        Self {
            data_type: "Number".to_string(),
            data: AttributeData::String(value.into()),
        }
    }

    #[must_use]
    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type: "Binary".to_string(),
            data: AttributeData::Binary(value.into()),
        }
    }

    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    #[must_use]
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        match &self.data {
            AttributeData::String(s) => Some(s),
            AttributeData::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn binary_value(&self) -> Option<&[u8]> {
        match &self.data {
            AttributeData::Binary(b) => Some(b),
            AttributeData::String(_) => None,
        }
    }

    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.data.kind()
    }

    /// Builds the internal shape from the raw provider fields, picking the
    /// value field the data type prefix selects.
    fn from_parts(
        name: &str,
        data_type: &str,
        string_value: Option<&str>,
        binary_value: Option<&[u8]>,
    ) -> Result<Self, OffloadError> {
        let data = match TransportKind::for_data_type(data_type) {
            Some(TransportKind::String) => string_value
                .map(|s| AttributeData::String(s.to_string()))
                .ok_or_else(|| {
                    OffloadError::InvalidAttribute(format!(
                        "attribute {} of type {} has no string value",
                        name, data_type
                    ))
                })?,
            Some(TransportKind::Binary) => binary_value
                .map(|b| AttributeData::Binary(b.to_vec()))
                .ok_or_else(|| {
                    OffloadError::InvalidAttribute(format!(
                        "attribute {} of type {} has no binary value",
                        name, data_type
                    ))
                })?,
            None => {
                return Err(OffloadError::InvalidAttribute(format!(
                    "attribute {} has unexpected data type {}",
                    name, data_type
                )));
            }
        };

        Ok(Self {
            data_type: data_type.to_string(),
            data,
        })
    }
}

// Provider conversions. An absent map stays absent.

/// # Errors
///
/// Returns an error if an attribute has an unknown data type or lacks the value its type requires.
pub fn attributes_from_sqs(
    attributes: Option<&HashMap<String, SqsAttributeValue>>,
) -> Result<Option<MessageAttributes>, OffloadError> {
    let Some(attributes) = attributes else {
        return Ok(None);
    };

    attributes
        .iter()
        .map(|(name, v)| {
            AttributeValue::from_parts(
                name,
                v.data_type(),
                v.string_value(),
                v.binary_value().map(|b| b.as_ref()),
            )
            .map(|value| (name.clone(), value))
        })
        .collect::<Result<MessageAttributes, _>>()
        .map(Some)
}

/// # Errors
///
/// Returns an error if the SDK builder rejects an attribute.
pub fn attributes_to_sqs(
    attributes: Option<&MessageAttributes>,
) -> Result<Option<HashMap<String, SqsAttributeValue>>, OffloadError> {
    let Some(attributes) = attributes else {
        return Ok(None);
    };

    attributes
        .iter()
        .map(|(name, v)| {
            let builder = SqsAttributeValue::builder().data_type(v.data_type());
            let builder = match v.data() {
                AttributeData::String(s) => builder.string_value(s),
                AttributeData::Binary(b) => builder.binary_value(SqsBlob::new(b.clone())),
            };
            builder
                .build()
                .map(|value| (name.clone(), value))
                .map_err(|e| OffloadError::InvalidAttribute(format!("{}: {}", name, e)))
        })
        .collect::<Result<HashMap<_, _>, _>>()
        .map(Some)
}

/// # Errors
///
/// Returns an error if an attribute has an unknown data type or lacks the value its type requires.
pub fn attributes_from_sns(
    attributes: Option<&HashMap<String, SnsAttributeValue>>,
) -> Result<Option<MessageAttributes>, OffloadError> {
    let Some(attributes) = attributes else {
        return Ok(None);
    };

    attributes
        .iter()
        .map(|(name, v)| {
            AttributeValue::from_parts(
                name,
                v.data_type(),
                v.string_value(),
                v.binary_value().map(|b| b.as_ref()),
            )
            .map(|value| (name.clone(), value))
        })
        .collect::<Result<MessageAttributes, _>>()
        .map(Some)
}

/// # Errors
///
/// Returns an error if the SDK builder rejects an attribute.
pub fn attributes_to_sns(
    attributes: Option<&MessageAttributes>,
) -> Result<Option<HashMap<String, SnsAttributeValue>>, OffloadError> {
    let Some(attributes) = attributes else {
        return Ok(None);
    };

    attributes
        .iter()
        .map(|(name, v)| {
            let builder = SnsAttributeValue::builder().data_type(v.data_type());
            let builder = match v.data() {
                AttributeData::String(s) => builder.string_value(s),
                AttributeData::Binary(b) => {
                    builder.binary_value(aws_sdk_sns::primitives::Blob::new(b.clone()))
                }
            };
            builder
                .build()
                .map(|value| (name.clone(), value))
                .map_err(|e| OffloadError::InvalidAttribute(format!("{}: {}", name, e)))
        })
        .collect::<Result<HashMap<_, _>, _>>()
        .map(Some)
}
