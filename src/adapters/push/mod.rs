use crate::domain::push::{
    MESSAGE_CHUNK_LIMIT, ProviderReceipt, PushMessage, PushTicket, RECEIPT_CHUNK_LIMIT, chunk_items,
    is_expo_push_token,
};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub mod expo;

pub use expo::ExpoPushProvider;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Rate limit exceeded")]
    QuotaExceeded,
    #[error("Push service rejected the request ({status}): {message}")]
    Rejected { status: u16, code: Option<String>, message: String },
    #[error("Unexpected response from push service: {0}")]
    InvalidResponse(String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

/// The delivery provider behind the relay.
///
/// Token syntax and chunking default to Expo's rules; implementations only have to
/// provide the two network calls.
#[async_trait]
pub trait PushProvider: Send + Sync + std::fmt::Debug {
    /// Whether `token` has the syntax the provider requires for a destination.
    fn is_push_token(&self, token: &str) -> bool {
        is_expo_push_token(token)
    }

    fn message_chunk_limit(&self) -> usize {
        MESSAGE_CHUNK_LIMIT
    }

    fn receipt_chunk_limit(&self) -> usize {
        RECEIPT_CHUNK_LIMIT
    }

    /// Partitions messages into provider-sized chunks, preserving order.
    fn chunk_messages(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>> {
        chunk_items(messages, self.message_chunk_limit())
    }

    /// Partitions receipt ids into provider-sized chunks, preserving order.
    fn chunk_receipt_ids(&self, ids: Vec<String>) -> Vec<Vec<String>> {
        chunk_items(ids, self.receipt_chunk_limit())
    }

    /// Sends one chunk and returns one ticket per message, in message order.
    ///
    /// # Errors
    /// Returns an error if the chunk as a whole could not be delivered to the provider.
    async fn send_chunk(&self, chunk: &[PushMessage]) -> Result<Vec<PushTicket>, PushError>;

    /// Looks up receipts for one chunk of ids. Ids with no receipt yet are absent from the map.
    ///
    /// # Errors
    /// Returns an error if the lookup request failed.
    async fn get_receipts(&self, ids: &[String]) -> Result<HashMap<String, ProviderReceipt>, PushError>;
}
