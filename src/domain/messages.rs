//! Wire messages exchanged with the orchestration server.
//!
//! An `Envelope` is the opaque unit the message source hands back; its kind
//! tag selects which payload the body decodes to. Bodies stay uninterpreted
//! JSON until the router inspects the tag.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{DroverError, Result};

/// Message type tags as they appear on the wire.
pub mod kinds {
    pub const JOB_REQUEST: &str = "JobRequest";
    pub const JOB_CANCEL: &str = "JobCancellation";
    pub const AGENT_REFRESH: &str = "AgentRefresh";
    pub const METADATA_UPDATE: &str = "JobMetadataUpdate";
}

/// One retrieved, type-tagged unit of control data.
///
/// Owned by the loop between retrieval and acknowledgment, never retained
/// afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message_id: u64,
    #[serde(rename = "messageType")]
    pub kind: String,
    pub body: String,
}

impl Envelope {
    /// Build an envelope around a payload, serializing it into the body.
    pub fn new<T: Serialize>(message_id: u64, kind: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            message_id,
            kind: kind.to_string(),
            body: serde_json::to_string(payload)?,
        })
    }

    /// Decode the body for the envelope's declared kind.
    pub fn decode<'a, T: Deserialize<'a>>(&'a self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| DroverError::Decode {
            kind: self.kind.clone(),
            source,
        })
    }
}

/// Reference to the orchestration plan a job belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReference {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
}

/// Reference to the timeline that records a job's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineReference {
    pub timeline_id: String,
}

/// One step of work inside a job, executed in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: String,
    pub name: String,
    /// Shell fragment to run; steps without one are markers the worker skips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// A decoded request to run one job. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequestMessage {
    pub plan: PlanReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineReference>,
    pub job_id: String,
    pub job_name: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub tasks: Vec<TaskStep>,
}

/// Cooperative termination request for a running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCancelMessage {
    pub job_id: String,
    timeout_millis: u64,
}

impl JobCancelMessage {
    pub fn new(job_id: impl Into<String>, grace: Duration) -> Self {
        Self {
            job_id: job_id.into(),
            timeout_millis: grace.as_millis() as u64,
        }
    }

    /// Grace period the job gets to wind down before being abandoned
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

/// Self-update trigger. Observing one preempts all further job dispatch for
/// the remainder of the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshMessage {
    pub agent_id: u64,
    pub target_version: String,
}

/// Runtime-tunable values applied to jobs started after receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_lines_frequency_millis: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_request(name: &str) -> JobRequestMessage {
        JobRequestMessage {
            plan: PlanReference {
                plan_id: "plan-1".to_string(),
                plan_type: None,
            },
            timeline: None,
            job_id: "8f7c".to_string(),
            job_name: name.to_string(),
            environment: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let request = job_request("job1");
        let envelope = Envelope::new(4234, kinds::JOB_REQUEST, &request).unwrap();
        assert_eq!(envelope.message_id, 4234);
        assert_eq!(envelope.kind, kinds::JOB_REQUEST);

        let decoded: JobRequestMessage = envelope.decode().unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_envelope_decode_failure_names_kind() {
        let envelope = Envelope {
            message_id: 1,
            kind: kinds::JOB_CANCEL.to_string(),
            body: "definitely not json".to_string(),
        };
        let err = envelope.decode::<JobCancelMessage>().unwrap_err();
        assert!(matches!(err, DroverError::Decode { ref kind, .. } if kind == kinds::JOB_CANCEL));
    }

    #[test]
    fn test_envelope_wire_names() {
        let envelope = Envelope {
            message_id: 7,
            kind: "Banana".to_string(),
            body: String::new(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"messageId\":7"));
        assert!(json.contains("\"messageType\":\"Banana\""));
    }

    #[test]
    fn test_job_request_decodes_camel_case() {
        let json = r#"{
            "plan": {"planId": "p-9"},
            "jobId": "j-1",
            "jobName": "build",
            "environment": {"CI": "true"},
            "tasks": [{"id": "t1", "name": "compile", "script": "make"}]
        }"#;
        let request: JobRequestMessage = serde_json::from_str(json).unwrap();
        assert_eq!(request.plan.plan_id, "p-9");
        assert_eq!(request.job_name, "build");
        assert_eq!(request.environment.get("CI"), Some(&"true".to_string()));
        assert_eq!(request.tasks[0].script.as_deref(), Some("make"));
        assert!(request.timeline.is_none());
    }

    #[test]
    fn test_job_cancel_grace() {
        let cancel = JobCancelMessage::new("j-2", Duration::from_secs(30));
        assert_eq!(cancel.grace(), Duration::from_secs(30));

        let zero = JobCancelMessage::new("j-3", Duration::ZERO);
        assert_eq!(zero.grace(), Duration::ZERO);
    }

    #[test]
    fn test_refresh_message_roundtrip() {
        let refresh = RefreshMessage {
            agent_id: 5678,
            target_version: "2.123.0".to_string(),
        };
        let json = serde_json::to_string(&refresh).unwrap();
        assert!(json.contains("\"agentId\":5678"));
        assert!(json.contains("\"targetVersion\":\"2.123.0\""));

        let restored: RefreshMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, refresh);
    }

    #[test]
    fn test_metadata_message_defaults() {
        let empty: MetadataMessage = serde_json::from_str("{}").unwrap();
        assert!(empty.post_lines_frequency_millis.is_none());

        let set: MetadataMessage =
            serde_json::from_str(r#"{"postLinesFrequencyMillis": 500}"#).unwrap();
        assert_eq!(set.post_lines_frequency_millis, Some(500));
    }
}
