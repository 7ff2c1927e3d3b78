//! Service layer for workflows spanning multiple backends.

mod registration;

pub use registration::{RegistrationService, Registration};
