// ============================================================================
// Subject Change Events
// ============================================================================
//
// Minimal projection of a subject at creation time, carried over the event
// stream as protobuf. A schemaless payload could never be "invalid"; the
// tagged wire format is what lets consumers detect and skip garbage.
//
// ============================================================================

mod codec;

pub use codec::{decode, encode, DecodeError, SubjectEventMessage, SUBJECT_CREATED};

use crate::domain::subject::Subject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub subject_id: String,
    pub name: String,
    pub contact_address: String,
}

impl ChangeEvent {
    pub fn created(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id.to_string(),
            name: subject.name.clone(),
            contact_address: subject.contact_address.as_str().to_string(),
        }
    }
}
