use crate::adapters::push::PushProvider;
use crate::domain::push::{ChunkFailure, DispatchOutcome, PushMessage};
use tracing::Instrument;

/// Sends chunks one at a time and concatenates their tickets.
///
/// A failed chunk is logged and recorded in `failures`; the remaining chunks are still sent.
pub async fn dispatch_chunks(provider: &dyn PushProvider, chunks: Vec<Vec<PushMessage>>) -> DispatchOutcome {
    let mut outcome = DispatchOutcome { chunks_attempted: chunks.len(), ..DispatchOutcome::default() };

    for (chunk_index, chunk) in chunks.iter().enumerate() {
        let result = provider
            .send_chunk(chunk)
            .instrument(tracing::debug_span!("send_chunk", chunk_index, messages = chunk.len()))
            .await;

        match result {
            Ok(tickets) => {
                tracing::info!(chunk_index, tickets = tickets.len(), "Received push tickets");
                tracing::debug!(chunk_index, ?tickets, "Push ticket chunk");
                outcome.tickets.extend(tickets);
            }
            Err(e) => {
                tracing::error!(error = %e, chunk_index, messages = chunk.len(), "Failed to send push notification chunk");
                outcome.failures.push(ChunkFailure { chunk_index, item_count: chunk.len(), error: e.to_string() });
            }
        }
    }

    outcome
}
