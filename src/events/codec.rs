use prost::Message;

use super::ChangeEvent;

pub const SUBJECT_CREATED: &str = "SUBJECT_CREATED";

/// Wire schema for the subject event stream. New fields get new tags; tags
/// are never reused.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubjectEventMessage {
    #[prost(string, tag = "1")]
    pub subject_id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub contact_address: String,
    #[prost(string, tag = "4")]
    pub event_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("Event payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Unsupported event type `{0}`")]
    UnsupportedType(String),
}

impl DecodeError {
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::UnsupportedType(_) => "unsupported_type",
        }
    }
}

pub fn encode(event: &ChangeEvent) -> Vec<u8> {
    SubjectEventMessage {
        subject_id: event.subject_id.clone(),
        name: event.name.clone(),
        contact_address: event.contact_address.clone(),
        event_type: SUBJECT_CREATED.to_string(),
    }
    .encode_to_vec()
}

/// Decode a stream payload. Proto3 decodes an empty buffer to all defaults,
/// so a message without a subject id is rejected explicitly. The event type
/// must be one this codec produces; other messages sharing tags 1-3 are
/// rejected here.
pub fn decode(payload: &[u8]) -> Result<ChangeEvent, DecodeError> {
    let message = SubjectEventMessage::decode(payload)?;

    if message.subject_id.is_empty() {
        return Err(DecodeError::MissingField("subject_id"));
    }
    if message.event_type != SUBJECT_CREATED {
        return Err(DecodeError::UnsupportedType(message.event_type));
    }

    Ok(ChangeEvent {
        subject_id: message.subject_id,
        name: message.name,
        contact_address: message.contact_address,
    })
}
