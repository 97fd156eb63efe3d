use crate::adapters::push::PushProvider;
use crate::domain::push::{NotificationRequest, PushMessage};

/// Keeps the requests whose destination token has valid provider syntax and turns
/// them into messages. Invalid entries are dropped with a warning, never failed.
pub fn validate_tokens(provider: &dyn PushProvider, requests: Vec<NotificationRequest>) -> Vec<PushMessage> {
    requests
        .into_iter()
        .filter(|request| {
            let valid = provider.is_push_token(&request.push_token);
            if !valid {
                tracing::warn!(token = %request.push_token, "Push token is not a valid push token, skipping");
            }
            valid
        })
        .map(PushMessage::from)
        .collect()
}
