use crate::adapters::push::PushProvider;
use crate::domain::push::{
    DeliveryStatus, DispatchOutcome, NotificationRequest, PushMessage, PushTicket, ReceiptOutcome,
};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

pub mod dispatch;
pub mod receipts;
pub mod validator;

pub use receipts::receipt_ids;

#[derive(Clone, Debug)]
struct Metrics {
    invalid_tokens: Counter<u64>,
    tickets: Counter<u64>,
    receipts: Counter<u64>,
    chunk_failures: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("push-relay");
        Self {
            invalid_tokens: meter
                .u64_counter("push_relay_invalid_tokens_total")
                .with_description("Notifications dropped because their push token was malformed")
                .build(),
            tickets: meter
                .u64_counter("push_relay_tickets_total")
                .with_description("Push tickets returned by the provider")
                .build(),
            receipts: meter
                .u64_counter("push_relay_receipts_total")
                .with_description("Push receipts fetched from the provider")
                .build(),
            chunk_failures: meter
                .u64_counter("push_relay_chunk_failures_total")
                .with_description("Provider calls that failed for a whole chunk")
                .build(),
        }
    }

    fn record_statuses(counter: &Counter<u64>, statuses: impl Iterator<Item = DeliveryStatus>) {
        let (ok, error) = statuses.fold((0, 0), |(ok, error), status| match status {
            DeliveryStatus::Ok => (ok + 1, error),
            DeliveryStatus::Error => (ok, error + 1),
        });
        if ok > 0 {
            counter.add(ok, &[KeyValue::new("status", "ok")]);
        }
        if error > 0 {
            counter.add(error, &[KeyValue::new("status", "error")]);
        }
    }
}

/// Dispatches notifications and reconciles receipts through a [`PushProvider`].
///
/// Holds no per-request state: every call is an independent, sequential pass over
/// its input.
#[derive(Clone, Debug)]
pub struct PushService {
    provider: Arc<dyn PushProvider>,
    metrics: Metrics,
}

impl PushService {
    #[must_use]
    pub fn new(provider: Arc<dyn PushProvider>) -> Self {
        Self { provider, metrics: Metrics::new() }
    }

    /// Drops requests with malformed tokens and converts the rest into messages.
    #[must_use]
    pub fn validate_tokens(&self, requests: Vec<NotificationRequest>) -> Vec<PushMessage> {
        let submitted = requests.len();
        let messages = validator::validate_tokens(self.provider.as_ref(), requests);

        let dropped = submitted - messages.len();
        if dropped > 0 {
            self.metrics.invalid_tokens.add(dropped as u64, &[]);
        }
        messages
    }

    /// Groups messages into provider-sized chunks, preserving order.
    #[must_use]
    pub fn batch_messages(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>> {
        let chunks = self.provider.chunk_messages(messages);
        tracing::debug!(chunks = chunks.len(), "Batched push messages");
        chunks
    }

    /// Sends every chunk in turn, collecting tickets and per-chunk failures.
    pub async fn dispatch(&self, chunks: Vec<Vec<PushMessage>>) -> DispatchOutcome {
        let outcome = dispatch::dispatch_chunks(self.provider.as_ref(), chunks).await;

        Metrics::record_statuses(&self.metrics.tickets, outcome.tickets.iter().map(|t| t.status));
        if !outcome.failures.is_empty() {
            self.metrics
                .chunk_failures
                .add(outcome.failures.len() as u64, &[KeyValue::new("operation", "send")]);
        }
        outcome
    }

    /// Validates, batches and dispatches a set of notification requests.
    #[tracing::instrument(skip_all, fields(requested = requests.len()))]
    pub async fn send_notifications(&self, requests: Vec<NotificationRequest>) -> DispatchOutcome {
        let messages = self.validate_tokens(requests);
        if messages.is_empty() {
            tracing::debug!("No valid push tokens, nothing to send");
            return DispatchOutcome::default();
        }

        let chunks = self.batch_messages(messages);
        let outcome = self.dispatch(chunks).await;

        tracing::info!(
            tickets = outcome.tickets.len(),
            failed_chunks = outcome.failures.len(),
            "Push notification dispatch finished"
        );
        outcome
    }

    /// Fetches receipts for every ticket that carries a receipt id.
    #[tracing::instrument(skip_all, fields(tickets = tickets.len()))]
    pub async fn collect_receipts(&self, tickets: &[PushTicket]) -> ReceiptOutcome {
        let ids = receipt_ids(tickets);
        if ids.is_empty() {
            tracing::debug!("No tickets with receipt ids, nothing to look up");
            return ReceiptOutcome::default();
        }

        let chunks = self.provider.chunk_receipt_ids(ids);
        let outcome = receipts::collect_receipts(self.provider.as_ref(), chunks).await;

        Metrics::record_statuses(&self.metrics.receipts, outcome.receipts.iter().map(|r| r.status));
        if !outcome.failures.is_empty() {
            self.metrics
                .chunk_failures
                .add(outcome.failures.len() as u64, &[KeyValue::new("operation", "receipts")]);
        }

        tracing::info!(
            receipts = outcome.receipts.len(),
            failed_chunks = outcome.failures.len(),
            "Push receipt collection finished"
        );
        outcome
    }
}
