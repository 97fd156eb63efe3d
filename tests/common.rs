#![allow(dead_code, unreachable_pub, clippy::unwrap_used, clippy::missing_panics_doc)]

use async_trait::async_trait;
use push_relay::adapters::push::{PushError, PushProvider};
use push_relay::api;
use push_relay::config::Config;
use push_relay::domain::push::{ProviderReceipt, PushMessage, PushTicket};
use push_relay::services::push::PushService;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("push_relay=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config {
        server: push_relay::config::ServerConfig::default(),
        expo: push_relay::config::ExpoConfig::default(),
        telemetry: push_relay::config::TelemetryConfig::default(),
    };
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config
}

/// In-memory provider that records every call and fails the calls listed in `failing_calls`.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    pub chunk_limit: Option<usize>,
    pub failing_calls: HashSet<usize>,
    pub receipts: HashMap<String, ProviderReceipt>,
    pub sent: Mutex<Vec<Vec<PushMessage>>>,
    pub looked_up: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl PushProvider for RecordingProvider {
    fn message_chunk_limit(&self) -> usize {
        self.chunk_limit.unwrap_or(100)
    }

    fn receipt_chunk_limit(&self) -> usize {
        self.chunk_limit.unwrap_or(300)
    }

    async fn send_chunk(&self, chunk: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let call = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(chunk.to_vec());
            sent.len() - 1
        };
        if self.failing_calls.contains(&call) {
            return Err(PushError::Other(anyhow::anyhow!("socket hang up")));
        }
        Ok(chunk.iter().enumerate().map(|(i, _)| PushTicket::accepted(format!("ticket-{call}-{i}"))).collect())
    }

    async fn get_receipts(&self, ids: &[String]) -> Result<HashMap<String, ProviderReceipt>, PushError> {
        let call = {
            let mut looked_up = self.looked_up.lock().unwrap();
            looked_up.push(ids.to_vec());
            looked_up.len() - 1
        };
        if self.failing_calls.contains(&call) {
            return Err(PushError::QuotaExceeded);
        }
        Ok(ids.iter().filter_map(|id| self.receipts.get(id).map(|r| (id.clone(), r.clone()))).collect())
    }
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub provider: Arc<RecordingProvider>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_provider(RecordingProvider::default()).await
    }

    pub async fn spawn_with_provider(provider: RecordingProvider) -> Self {
        setup_tracing();
        let config = get_test_config();
        let provider = Arc::new(provider);
        let service = PushService::new(provider.clone());

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let app = api::app_router(&config, service);
        let mgmt = api::mgmt_router();
        tokio::spawn(async move { axum::serve(api_listener, app).await.unwrap() });
        tokio::spawn(async move { axum::serve(mgmt_listener, mgmt).await.unwrap() });

        Self { server_url, mgmt_url, client: reqwest::Client::new(), provider }
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client.post(format!("{}{path}", self.server_url)).json(body).send().await.unwrap()
    }
}
