//! Generic multi-step application wizard.
//!
//! A wizard is an ordered list of [`StepDefinition`]s over a typed form record. The
//! engine sequences the steps, gates forward movement on each step's predicate, keeps
//! every entered value when moving back, and hands the finished form to a
//! [`SubmissionSink`] on the last step.
//!
//! ```text
//! Step[i] --advance (isValid_i)--> Step[i+1]
//! Step[i] --retreat (i > 0)------> Step[i-1]
//! Step[n-1] --submit (isValid_{n-1}, sink ok)--> Complete
//! ```

pub mod engine;
pub mod error;
pub mod form;
pub mod prefill;
pub mod sink;
pub mod step;

pub use engine::{WizardEngine, WizardState};
pub use error::{FieldError, SinkError, WizardError};
pub use form::{FieldValue, FileRef, FormMap, FormRecord};
pub use prefill::{CitizenProfile, NoProfile, ProfileProvider, StaticProfile, TomlProfileFile};
pub use sink::{
    HttpSink, LoggingSink, SubmissionAck, SubmissionEnvelope, SubmissionResult, SubmissionSink,
};
pub use step::StepDefinition;
