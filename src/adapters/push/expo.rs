use super::{PushError, PushProvider};
use crate::config::ExpoConfig;
use crate::domain::push::{ProviderReceipt, PushMessage, PushTicket};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use flate2::{Compression, write::GzEncoder};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

const SEND_PATH: &str = "/--/api/v2/push/send";
const RECEIPTS_PATH: &str = "/--/api/v2/push/getReceipts";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ExpoApiError {
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExpoApiResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<ExpoApiError>,
}

#[derive(Debug, Serialize)]
struct ReceiptsRequest<'a> {
    ids: &'a [String],
}

/// HTTP client for the Expo push service.
#[derive(Debug, Clone)]
pub struct ExpoPushProvider {
    http: reqwest::Client,
    send_url: String,
    receipts_url: String,
    access_token: Option<String>,
    gzip_threshold_bytes: usize,
    retry_strategy: ExponentialBuilder,
}

impl ExpoPushProvider {
    /// Builds a client from configuration.
    ///
    /// # Errors
    /// Returns `PushError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: &ExpoConfig) -> Result<Self, PushError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(concat!("push-relay/", env!("CARGO_PKG_VERSION"))));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let base_url = config.base_url.trim_end_matches('/');
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.retry_min_delay_ms))
            .with_factor(2.0)
            .with_max_times(config.rate_limit_retries);

        Ok(Self {
            http,
            send_url: format!("{base_url}{SEND_PATH}"),
            receipts_url: format!("{base_url}{RECEIPTS_PATH}"),
            access_token: config.access_token.clone().filter(|t| !t.trim().is_empty()),
            gzip_threshold_bytes: config.gzip_threshold_bytes,
            retry_strategy,
        })
    }

    /// Posts `payload` and returns the `data` member of Expo's response envelope,
    /// retrying only when the service answers 429.
    async fn post(&self, url: &str, payload: &impl Serialize) -> Result<Value, PushError> {
        let body = serde_json::to_vec(payload).map_err(|e| PushError::Other(e.into()))?;
        let (body, gzipped) = if body.len() > self.gzip_threshold_bytes { (gzip(&body)?, true) } else { (body, false) };

        (|| self.post_once(url, body.clone(), gzipped))
            .retry(self.retry_strategy)
            .when(|e| matches!(e, PushError::QuotaExceeded))
            .notify(|e, duration| {
                tracing::warn!(error = %e, delay_ms = %duration.as_millis(), "Push service rate limited, retrying");
            })
            .await
    }

    async fn post_once(&self, url: &str, body: Vec<u8>, gzipped: bool) -> Result<Value, PushError> {
        let mut request = self.http.post(url).header(header::CONTENT_TYPE, "application/json").body(body);
        if gzipped {
            request = request.header(header::CONTENT_ENCODING, "gzip");
        }
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PushError::QuotaExceeded);
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(rejection(status, &text));
        }

        let envelope: ExpoApiResponse = serde_json::from_str(&text)
            .map_err(|e| PushError::InvalidResponse(format!("malformed JSON envelope: {e}")))?;

        // A 200 carrying top-level errors means the whole request failed.
        if let Some(first) = envelope.errors.into_iter().next() {
            return Err(PushError::Rejected { status: status.as_u16(), code: first.code, message: first.message });
        }

        envelope.data.ok_or_else(|| PushError::InvalidResponse("response has no data member".into()))
    }
}

#[async_trait]
impl PushProvider for ExpoPushProvider {
    #[tracing::instrument(level = "debug", skip_all, fields(messages = chunk.len()))]
    async fn send_chunk(&self, chunk: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let data = self.post(&self.send_url, &chunk).await?;
        if !data.is_array() {
            return Err(PushError::InvalidResponse("expected an array of tickets".into()));
        }

        let tickets: Vec<PushTicket> = serde_json::from_value(data)
            .map_err(|e| PushError::InvalidResponse(format!("malformed ticket list: {e}")))?;

        if tickets.len() != chunk.len() {
            return Err(PushError::InvalidResponse(format!(
                "expected {} tickets but got {}",
                chunk.len(),
                tickets.len()
            )));
        }

        Ok(tickets)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(ids = ids.len()))]
    async fn get_receipts(&self, ids: &[String]) -> Result<HashMap<String, ProviderReceipt>, PushError> {
        let data = self.post(&self.receipts_url, &ReceiptsRequest { ids }).await?;
        if !data.is_object() {
            return Err(PushError::InvalidResponse("expected a map of receipts keyed by id".into()));
        }

        serde_json::from_value(data).map_err(|e| PushError::InvalidResponse(format!("malformed receipt map: {e}")))
    }
}

fn gzip(body: &[u8]) -> Result<Vec<u8>, PushError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body).map_err(|e| PushError::Other(e.into()))?;
    encoder.finish().map_err(|e| PushError::Other(e.into()))
}

fn rejection(status: StatusCode, text: &str) -> PushError {
    if let Ok(envelope) = serde_json::from_str::<ExpoApiResponse>(text)
        && let Some(first) = envelope.errors.into_iter().next()
    {
        return PushError::Rejected { status: status.as_u16(), code: first.code, message: first.message };
    }

    let message = if text.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        text.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };
    PushError::Rejected { status: status.as_u16(), code: None, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::push::DeliveryStatus;
    use httpmock::prelude::*;
    use serde_json::{Map, json};

    fn provider_for(server: &MockServer) -> ExpoPushProvider {
        let config = ExpoConfig {
            base_url: server.base_url(),
            retry_min_delay_ms: 1,
            ..ExpoConfig::default()
        };
        ExpoPushProvider::new(&config).expect("client")
    }

    fn message(token: &str) -> PushMessage {
        PushMessage {
            to: token.to_string(),
            sound: "default".to_string(),
            title: None,
            body: "hi".to_string(),
            data: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_send_chunk_returns_tickets_in_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("content-type", "application/json")
                .json_body(json!([
                    { "to": "ExponentPushToken[a]", "sound": "default", "body": "hi", "data": {} },
                    { "to": "ExponentPushToken[b]", "sound": "default", "body": "hi", "data": {} }
                ]));
            then.status(200).json_body(json!({
                "data": [
                    { "status": "ok", "id": "r1" },
                    { "status": "error", "message": "gone", "details": { "error": "DeviceNotRegistered" } }
                ]
            }));
        });

        let provider = provider_for(&server);
        let tickets = provider
            .send_chunk(&[message("ExponentPushToken[a]"), message("ExponentPushToken[b]")])
            .await
            .expect("send");

        mock.assert_calls(1);
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].receipt_id(), Some("r1"));
        assert_eq!(tickets[1].status, DeliveryStatus::Error);
        assert_eq!(tickets[1].message.as_deref(), Some("gone"));
    }

    #[tokio::test]
    async fn test_send_chunk_rejects_ticket_count_mismatch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(200).json_body(json!({ "data": [{ "status": "ok", "id": "r1" }] }));
        });

        let provider = provider_for(&server);
        let err = provider
            .send_chunk(&[message("ExponentPushToken[a]"), message("ExponentPushToken[b]")])
            .await
            .unwrap_err();

        assert!(matches!(err, PushError::InvalidResponse(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_top_level_errors_fail_the_request() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(400).json_body(json!({
                "errors": [{ "code": "PUSH_TOO_MANY_EXPERIENCE_IDS", "message": "mixed projects" }]
            }));
        });

        let provider = provider_for(&server);
        let err = provider.send_chunk(&[message("ExponentPushToken[a]")]).await.unwrap_err();

        match err {
            PushError::Rejected { status, code, message } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("PUSH_TOO_MANY_EXPERIENCE_IDS"));
                assert_eq!(message, "mixed projects");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_without_envelope_keeps_body_text() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(503).body("upstream unavailable");
        });

        let provider = provider_for(&server);
        let err = provider.send_chunk(&[message("ExponentPushToken[a]")]).await.unwrap_err();

        assert!(
            matches!(err, PushError::Rejected { status: 503, code: None, ref message } if message == "upstream unavailable")
        );
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_then_reported() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(429).body("slow down");
        });

        let provider = provider_for(&server);
        let err = provider.send_chunk(&[message("ExponentPushToken[a]")]).await.unwrap_err();

        assert!(matches!(err, PushError::QuotaExceeded));
        // One initial attempt plus the configured two retries.
        mock.assert_calls(3);
    }

    #[tokio::test]
    async fn test_large_bodies_are_gzipped_and_authorized() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("content-encoding", "gzip")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(json!({ "data": [{ "status": "ok", "id": "r1" }] }));
        });

        let config = ExpoConfig {
            base_url: server.base_url(),
            access_token: Some("secret".into()),
            gzip_threshold_bytes: 16,
            ..ExpoConfig::default()
        };
        let provider = ExpoPushProvider::new(&config).expect("client");
        let tickets = provider.send_chunk(&[message("ExponentPushToken[a]")]).await.expect("send");

        mock.assert_calls(1);
        assert_eq!(tickets.len(), 1);
    }

    #[tokio::test]
    async fn test_get_receipts_parses_id_map() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(RECEIPTS_PATH).json_body(json!({ "ids": ["r1", "r2"] }));
            then.status(200).json_body(json!({
                "data": {
                    "r1": { "status": "ok" },
                    "r2": { "status": "error", "message": "gone", "details": { "error": "DeviceNotRegistered" } }
                }
            }));
        });

        let provider = provider_for(&server);
        let receipts = provider.get_receipts(&["r1".to_string(), "r2".to_string()]).await.expect("receipts");

        mock.assert_calls(1);
        assert_eq!(receipts["r1"].status, DeliveryStatus::Ok);
        assert_eq!(receipts["r2"].status, DeliveryStatus::Error);
        assert_eq!(receipts["r2"].details.as_ref().and_then(|d| d.error.as_deref()), Some("DeviceNotRegistered"));
    }

    #[tokio::test]
    async fn test_get_receipts_rejects_non_object_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(RECEIPTS_PATH);
            then.status(200).json_body(json!({ "data": [] }));
        });

        let provider = provider_for(&server);
        let err = provider.get_receipts(&["r1".to_string()]).await.unwrap_err();

        assert!(matches!(err, PushError::InvalidResponse(_)));
    }
}
