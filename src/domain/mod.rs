//! Domain types: wire messages, persisted settings, run modes, and outcomes.

pub mod messages;
pub mod outcome;
pub mod settings;

pub use messages::{
    Envelope, JobCancelMessage, JobRequestMessage, MetadataMessage, PlanReference, RefreshMessage,
    TaskStep, TimelineReference, kinds,
};
pub use outcome::{ReturnCode, RunMode};
pub use settings::{AgentSettings, Credentials, SignatureVerification, VerificationMode};
