mod errors;
mod lifecycle;
mod value_objects;

pub use errors::LifecycleError;
pub use lifecycle::{LifecycleTimeouts, SubjectLifecycle};
pub use value_objects::{ContactAddress, Subject, SubjectId, SubjectProfile};
