//! Quota-limited registration: form schema, submission ledger, availability, and the
//! allocation engine that admits a user's choices all at once or not at all.
//!
//! Every read-validate-write sequence runs inside the service's commit gate, so two
//! submissions racing for the last unit of an option can never both be admitted.

pub mod availability;
pub mod domain;
pub mod engine;
pub mod export;
pub mod gate;
pub mod router;
pub mod schema;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use availability::{
    compute_availability, AvailabilityView, OptionAvailability, OptionCapacity,
    QuestionAvailability,
};
pub use domain::{
    Confirmation, FormOption, LedgerEntry, LedgerSnapshot, OptionDraft, OptionId, Question,
    QuestionDraft, Schema, SubmissionRequest,
};
pub use engine::{InvalidSelection, RejectionReason};
pub use export::write_availability_csv;
pub use gate::{ContentionPolicy, GateTimeout};
pub use router::registration_router;
pub use schema::SchemaValidationError;
pub use service::{RegistrationError, RegistrationService};
pub use store::{InMemoryStore, JsonFileStore, SchemaStore, StoreError, SubmissionLedger};
