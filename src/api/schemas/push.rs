use crate::domain::push::{NotificationRequest, PushTicket};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Upper bound on notifications accepted in one send request.
pub const MAX_NOTIFICATIONS_PER_REQUEST: usize = 10_000;

/// Upper bound on tickets accepted in one receipt request.
pub const MAX_TICKETS_PER_REQUEST: usize = 30_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub push_token: String,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl From<NotificationPayload> for NotificationRequest {
    fn from(payload: NotificationPayload) -> Self {
        Self {
            push_token: payload.push_token,
            title: payload.title,
            body: payload.body,
            data: payload.data.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendPushRequest {
    pub notifications: Vec<NotificationPayload>,
}

impl SendPushRequest {
    /// Validates the request envelope. Individual tokens are checked later and
    /// never fail the request.
    ///
    /// # Errors
    /// Returns an error if the request carries more notifications than allowed.
    pub fn validate(&self) -> Result<(), String> {
        if self.notifications.len() > MAX_NOTIFICATIONS_PER_REQUEST {
            return Err(format!("Too many notifications (max {MAX_NOTIFICATIONS_PER_REQUEST})"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct GetReceiptsRequest {
    pub tickets: Vec<PushTicket>,
}

impl GetReceiptsRequest {
    /// # Errors
    /// Returns an error if the request carries more tickets than allowed.
    pub fn validate(&self) -> Result<(), String> {
        if self.tickets.len() > MAX_TICKETS_PER_REQUEST {
            return Err(format!("Too many tickets (max {MAX_TICKETS_PER_REQUEST})"));
        }
        Ok(())
    }
}
