//! Message source: session lifecycle and the blocking fetch the loop
//! suspends on.

pub mod broker;

pub use broker::BrokerMessageSource;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::Envelope;
use crate::error::Result;

/// Transport-facing collaborator owned by one loop invocation.
///
/// A session is exclusively owned by its loop: created at most once before
/// fetching starts and deleted exactly once on the way out, whatever the
/// exit path.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Establish the work session. `Ok(false)` means the server refused the
    /// registration (the loop terminates without a teardown call); transport
    /// failures surface as errors.
    async fn create_session(&self, shutdown: &CancellationToken) -> Result<bool>;

    /// Block until the next envelope arrives or `shutdown` fires
    /// (`DroverError::Canceled`).
    async fn get_next_message(&self, shutdown: &CancellationToken) -> Result<Envelope>;

    /// Acknowledge a consumed envelope so the server stops redelivering it.
    async fn delete_message(&self, envelope: &Envelope) -> Result<()>;

    /// Tear down the session.
    async fn delete_session(&self) -> Result<()>;
}
