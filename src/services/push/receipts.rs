use crate::adapters::push::PushProvider;
use crate::domain::push::{ChunkFailure, DeliveryStatus, PushErrorDetails, PushReceipt, PushTicket, ReceiptOutcome};
use std::collections::HashSet;
use tracing::Instrument;

/// Receipt ids of every ticket that has one, in ticket order, without duplicates.
/// Tickets the provider rejected carry no id and are skipped.
#[must_use]
pub fn receipt_ids(tickets: &[PushTicket]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickets
        .iter()
        .filter_map(PushTicket::receipt_id)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Queries every chunk of ids in order and accumulates the receipts found.
///
/// Ids the provider has no receipt for yet are absent from the result. Error receipts
/// are logged but still returned.
pub async fn collect_receipts(provider: &dyn PushProvider, chunks: Vec<Vec<String>>) -> ReceiptOutcome {
    let mut outcome = ReceiptOutcome { chunks_attempted: chunks.len(), ..ReceiptOutcome::default() };

    for (chunk_index, ids) in chunks.iter().enumerate() {
        let result = provider
            .get_receipts(ids)
            .instrument(tracing::debug_span!("get_receipts", chunk_index, ids = ids.len()))
            .await;

        let mut found = match result {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, chunk_index, ids = ids.len(), "Failed to fetch push receipts");
                outcome.failures.push(ChunkFailure { chunk_index, item_count: ids.len(), error: e.to_string() });
                continue;
            }
        };

        tracing::debug!(chunk_index, requested = ids.len(), found = found.len(), "Fetched push receipts");

        for id in ids {
            if let Some(receipt) = found.remove(id) {
                let receipt = PushReceipt::from_provider(id.clone(), receipt);
                log_receipt(&receipt);
                outcome.receipts.push(receipt);
            }
        }
    }

    outcome
}

fn log_receipt(receipt: &PushReceipt) {
    if receipt.status == DeliveryStatus::Ok {
        return;
    }

    let message = receipt.message.as_deref().unwrap_or_default();
    tracing::error!(receipt_id = %receipt.id, error_message = %message, "There was an error sending a notification");

    if let Some(code) = receipt.details.as_ref().and_then(PushErrorDetails::code) {
        tracing::error!(
            receipt_id = %receipt.id,
            error_code = %code,
            meaning = code.description(),
            "Push receipt error code"
        );
    }
}
