//! HTTP message source backed by the orchestration server's pool endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::{AgentSettings, Envelope};
use crate::error::{DroverError, Result};

use super::MessageSource;

/// Pause between empty long-poll responses.
const EMPTY_POLL_DELAY: Duration = Duration::from_secs(1);

/// Server-side work session held for the lifetime of one loop invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub owner_name: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest<'a> {
    agent_id: u64,
    agent_name: &'a str,
    owner_name: &'a str,
}

#[derive(Default)]
struct SourceState {
    session: Option<Session>,
}

/// Production message source speaking JSON over HTTP to the broker.
pub struct BrokerMessageSource {
    client: reqwest::Client,
    settings: AgentSettings,
    owner_name: String,
    state: Mutex<SourceState>,
}

impl BrokerMessageSource {
    pub fn new(settings: AgentSettings, owner_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            owner_name: owner_name.into(),
            state: Mutex::new(SourceState::default()),
        }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/pools/{}/sessions",
            self.settings.server_url, self.settings.pool_id
        )
    }

    fn session_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.sessions_url(), session_id)
    }

    fn messages_url(&self, session_id: &str) -> String {
        format!(
            "{}/pools/{}/messages?sessionId={}",
            self.settings.server_url, self.settings.pool_id, session_id
        )
    }

    fn message_url(&self, session_id: &str, message_id: u64) -> String {
        format!(
            "{}/pools/{}/messages/{}?sessionId={}",
            self.settings.server_url, self.settings.pool_id, message_id, session_id
        )
    }

    async fn session_id(&self) -> Result<String> {
        let state = self.state.lock().await;
        state
            .session
            .as_ref()
            .map(|s| s.session_id.clone())
            .ok_or_else(|| DroverError::Session("no active session".to_string()))
    }

    async fn poll_once(&self, session_id: &str) -> Result<Option<Envelope>> {
        let response = self
            .client
            .get(self.messages_url(session_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<Envelope>().await?)),
            StatusCode::NO_CONTENT => Ok(None),
            status => Err(DroverError::Session(format!(
                "message fetch failed with {status}"
            ))),
        }
    }
}

#[async_trait]
impl MessageSource for BrokerMessageSource {
    async fn create_session(&self, shutdown: &CancellationToken) -> Result<bool> {
        let request = SessionRequest {
            agent_id: self.settings.agent_id,
            agent_name: &self.settings.agent_name,
            owner_name: &self.owner_name,
        };

        let response = tokio::select! {
            _ = shutdown.cancelled() => return Err(DroverError::Canceled),
            r = self
                .client
                .post(self.sessions_url())
                .json(&request)
                .send() => r?,
        };

        match response.status() {
            status if status.is_success() => {
                let session: Session = response.json().await?;
                info!(
                    "Session {} created for agent '{}'",
                    session.session_id, self.settings.agent_name
                );
                self.state.lock().await.session = Some(session);
                Ok(true)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Session refused: {}", response.status());
                Ok(false)
            }
            status => Err(DroverError::Session(format!(
                "session creation failed with {status}"
            ))),
        }
    }

    async fn get_next_message(&self, shutdown: &CancellationToken) -> Result<Envelope> {
        let session_id = self.session_id().await?;
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => return Err(DroverError::Canceled),
                r = self.poll_once(&session_id) => r?,
            };
            match polled {
                Some(envelope) => {
                    debug!(
                        "Received message {} ({})",
                        envelope.message_id, envelope.kind
                    );
                    return Ok(envelope);
                }
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => return Err(DroverError::Canceled),
                        _ = tokio::time::sleep(EMPTY_POLL_DELAY) => {}
                    }
                }
            }
        }
    }

    async fn delete_message(&self, envelope: &Envelope) -> Result<()> {
        let session_id = self.session_id().await?;
        self.client
            .delete(self.message_url(&session_id, envelope.message_id))
            .send()
            .await?
            .error_for_status()?;
        debug!("Deleted message {}", envelope.message_id);
        Ok(())
    }

    async fn delete_session(&self) -> Result<()> {
        let session = self.state.lock().await.session.take();
        let Some(session) = session else {
            return Ok(());
        };
        self.client
            .delete(self.session_url(&session.session_id))
            .send()
            .await?
            .error_for_status()?;
        info!("Session {} deleted", session.session_id);
        Ok(())
    }
}
