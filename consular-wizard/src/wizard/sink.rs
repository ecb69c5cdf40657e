// Submission sinks: the external destination for a completed application
//
// The engine calls `deliver` exactly once per submit attempt. Retries, timeouts and
// authentication belong to the sink, not the engine.

use super::error::SinkError;
use crate::utils::logging::{mask_sensitive, redact_payload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// What the sink receives: the wizard that produced the data plus the form as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEnvelope {
    pub wizard: String,
    pub payload: serde_json::Value,
}

/// Acknowledgement from the sink. A sink that issues its own reference id (a backend with a
/// sequence, say) returns it here and the engine uses it verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub wizard: String,
    pub reference_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, envelope: &SubmissionEnvelope) -> Result<SubmissionAck, SinkError>;
}

/// Mint a local reference id: `<PREFIX>-<YYYYMMDD>-<12 hex chars of a v4 UUID>`.
///
/// Only used when the sink did not issue one.
pub fn generate_reference_id(prefix: &str, at: DateTime<Utc>) -> String {
    let token = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d"), &token[..12])
}

/// Stub sink: records the (redacted) submission in the log and acknowledges it.
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait]
impl SubmissionSink for LoggingSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, envelope: &SubmissionEnvelope) -> Result<SubmissionAck, SinkError> {
        let redacted = redact_payload(&envelope.payload);
        info!(
            "[PHASE: submission] [STEP: deliver] wizard={} payload={}",
            envelope.wizard, redacted
        );
        Ok(SubmissionAck::default())
    }
}

/// Sink that POSTs the envelope as JSON to a backend endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpSink {
    pub fn new(endpoint: Url, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SubmissionSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, envelope: &SubmissionEnvelope) -> Result<SubmissionAck, SinkError> {
        info!(
            "[PHASE: submission] [STEP: http_post] wizard={} endpoint={} auth={}",
            envelope.wizard,
            self.endpoint,
            self.token
                .as_deref()
                .map(mask_sensitive)
                .unwrap_or_else(|| "none".to_string())
        );

        let mut request = self.client.post(self.endpoint.clone()).json(envelope);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(
                "[PHASE: submission] [STEP: http_post] rejected status={} wizard={}",
                status.as_u16(),
                envelope.wizard
            );
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message: truncate_message(&body, 200),
            });
        }

        parse_ack(&body)
    }
}

fn parse_ack(body: &str) -> Result<SubmissionAck, SinkError> {
    if body.trim().is_empty() {
        return Ok(SubmissionAck::default());
    }
    serde_json::from_str(body).map_err(|e| SinkError::InvalidResponse(e.to_string()))
}

fn truncate_message(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_id_has_prefix_date_and_token() {
        let at = DateTime::parse_from_rfc3339("2026-10-18T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = generate_reference_id("ETC", at);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3, "unexpected shape: {}", id);
        assert_eq!(parts[0], "ETC");
        assert_eq!(parts[1], "20261018");
        assert_eq!(parts[2].len(), 12);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn reference_ids_do_not_repeat() {
        let at = Utc::now();
        let a = generate_reference_id("NOL", at);
        let b = generate_reference_id("NOL", at);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_ack_accepts_empty_body() {
        assert_eq!(parse_ack("").unwrap(), SubmissionAck::default());
        assert_eq!(parse_ack("  \n").unwrap(), SubmissionAck::default());
    }

    #[test]
    fn parse_ack_reads_backend_reference() {
        let ack =
            parse_ack(r#"{"referenceId":"ETC-000042","receivedAt":"2026-10-18T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(ack.reference_id.as_deref(), Some("ETC-000042"));
        assert!(ack.received_at.is_some());
    }

    #[test]
    fn parse_ack_rejects_garbage() {
        let err = parse_ack("<html>oops</html>").unwrap_err();
        assert!(matches!(err, SinkError::InvalidResponse(_)));
    }

    #[test]
    fn truncate_message_caps_long_bodies() {
        let long = "x".repeat(500);
        let msg = truncate_message(&long, 10);
        assert_eq!(msg, "xxxxxxxxxx...");
        assert_eq!(truncate_message(" short ", 10), "short");
    }

    #[tokio::test]
    async fn logging_sink_acks_without_reference() {
        let envelope = SubmissionEnvelope {
            wizard: "etc".to_string(),
            payload: serde_json::json!({ "fullName": "Ayesha Khan" }),
        };
        let ack = LoggingSink.deliver(&envelope).await.unwrap();
        assert!(ack.reference_id.is_none());
    }

    #[test]
    fn http_sink_drops_blank_token() {
        let sink = HttpSink::new(
            Url::parse("https://portal.example/api/submissions").unwrap(),
            Some("   ".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(sink.token.is_none());
        assert_eq!(sink.endpoint().path(), "/api/submissions");
    }

    // -------------------------------------------------------------------------
    // HttpSink against a local listener
    // -------------------------------------------------------------------------

    use crate::wizard::{FormMap, StepDefinition, WizardEngine, WizardError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads one HTTP/1.1 request (headers plus `Content-Length` body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answers one connection per scripted `(status, body)` and hands back each request.
    async fn scripted_backend(
        replies: Vec<(u16, &'static str)>,
    ) -> (Url, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut stream).await);
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            seen
        });
        let url = Url::parse(&format!("http://{}/api/submissions", addr)).unwrap();
        (url, handle)
    }

    fn sample_envelope() -> SubmissionEnvelope {
        SubmissionEnvelope {
            wizard: "etc".to_string(),
            payload: serde_json::json!({ "fullName": "Ayesha Khan" }),
        }
    }

    #[tokio::test]
    async fn http_sink_maps_backend_responses() {
        let (url, backend) = scripted_backend(vec![
            (503, "busy"),
            (200, "<html>maintenance</html>"),
            (200, r#"{"referenceId":"ETC-000042"}"#),
        ])
        .await;
        let sink = HttpSink::new(url, Some("s3cret".to_string()), Duration::from_secs(5)).unwrap();
        let envelope = sample_envelope();

        let err = sink.deliver(&envelope).await.unwrap_err();
        assert_eq!(
            err,
            SinkError::Rejected {
                status: 503,
                message: "busy".to_string()
            }
        );

        let err = sink.deliver(&envelope).await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidResponse(_)), "{:?}", err);

        let ack = sink.deliver(&envelope).await.unwrap();
        assert_eq!(ack.reference_id.as_deref(), Some("ETC-000042"));

        let requests = backend.await.unwrap();
        assert_eq!(requests.len(), 3);
        let first = requests[0].to_ascii_lowercase();
        assert!(first.starts_with("post /api/submissions "), "{}", requests[0]);
        assert!(first.contains("authorization: bearer s3cret"), "{}", requests[0]);
        assert!(requests[0].contains(r#""wizard":"etc""#), "{}", requests[0]);
    }

    #[tokio::test]
    async fn http_sink_reports_unreachable_backend_as_transport() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/api/submissions", addr)).unwrap();
        let sink = HttpSink::new(url, None, Duration::from_secs(5)).unwrap();
        let err = sink.deliver(&sample_envelope()).await.unwrap_err();
        assert!(matches!(err, SinkError::Transport(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn rejected_http_submit_keeps_state_for_retry() {
        let (url, backend) = scripted_backend(vec![(503, "busy")]).await;
        let sink = HttpSink::new(url, None, Duration::from_secs(5)).unwrap();

        let state = WizardEngine::new("etc", "ETC", vec![StepDefinition::open("only", "Only")])
            .unwrap()
            .initialize(FormMap::new().with("x", "v"));

        let err = state.submit(&sink).await.unwrap_err();
        assert!(
            matches!(
                err,
                WizardError::Submission(SinkError::Rejected { status: 503, .. })
            ),
            "{:?}",
            err
        );
        assert!(err.is_retryable());
        assert!(!state.is_complete());
        assert!(state.submission().is_none());
        assert_eq!(state.form_data().text("x"), Some("v"));
        assert_eq!(backend.await.unwrap().len(), 1);
    }
}
