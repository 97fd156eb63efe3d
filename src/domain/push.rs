use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sound profile attached to every outgoing message.
pub const DEFAULT_SOUND: &str = "default";

/// Maximum number of messages Expo accepts in a single send request.
pub const MESSAGE_CHUNK_LIMIT: usize = 100;

/// Maximum number of receipt ids Expo accepts in a single lookup request.
pub const RECEIPT_CHUNK_LIMIT: usize = 300;

/// A caller-supplied request to notify one device.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub push_token: String,
    pub title: Option<String>,
    pub body: String,
    pub data: Map<String, Value>,
}

/// Provider-ready representation of one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl From<NotificationRequest> for PushMessage {
    fn from(request: NotificationRequest) -> Self {
        Self {
            to: request.push_token,
            sound: DEFAULT_SOUND.to_string(),
            title: request.title,
            body: request.body,
            data: request.data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Ok,
    Error,
}

/// Extra information the provider attaches to a rejected ticket or failed receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PushErrorDetails {
    #[must_use]
    pub fn code(&self) -> Option<PushErrorCode> {
        self.error.as_deref().map(PushErrorCode::from)
    }
}

/// The provider's acknowledgment of one message.
///
/// Accepted messages carry an `id` that can later be exchanged for a receipt.
/// Rejected messages carry `message`/`details` and never get an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PushErrorDetails>,
}

impl PushTicket {
    #[must_use]
    pub fn accepted(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), ..Self::default() }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>, details: Option<PushErrorDetails>) -> Self {
        Self { id: None, status: DeliveryStatus::Error, message: Some(message.into()), details }
    }

    /// The receipt id, if the provider issued one. Blank ids count as absent.
    #[must_use]
    pub fn receipt_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// A receipt as the provider reports it, keyed externally by its id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderReceipt {
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PushErrorDetails>,
}

/// Asynchronous delivery outcome of a previously accepted ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub id: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PushErrorDetails>,
}

impl PushReceipt {
    #[must_use]
    pub fn from_provider(id: String, receipt: ProviderReceipt) -> Self {
        Self { id, status: receipt.status, message: receipt.message, details: receipt.details }
    }
}

/// Error codes Expo reports in `details.error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushErrorCode {
    DeviceNotRegistered,
    InvalidCredentials,
    MessageTooBig,
    MessageRateExceeded,
    MismatchSenderId,
    InvalidProviderToken,
    ProviderError,
    Unknown(String),
}

impl PushErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::DeviceNotRegistered => "DeviceNotRegistered",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::MessageTooBig => "MessageTooBig",
            Self::MessageRateExceeded => "MessageRateExceeded",
            Self::MismatchSenderId => "MismatchSenderId",
            Self::InvalidProviderToken => "InvalidProviderToken",
            Self::ProviderError => "ProviderError",
            Self::Unknown(code) => code,
        }
    }

    /// What the code means for the sender.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::DeviceNotRegistered => "the device cannot receive push notifications anymore; stop sending to this token",
            Self::InvalidCredentials => "the push credentials for this app are missing or invalid",
            Self::MessageTooBig => "the notification payload exceeds the 4096 byte limit",
            Self::MessageRateExceeded => "messages are being sent to this device too frequently",
            Self::MismatchSenderId => "the FCM sender id does not match the one the token was registered with",
            Self::InvalidProviderToken => "the APNs provider token or key is invalid",
            Self::ProviderError => "the underlying delivery service reported an error",
            Self::Unknown(_) => "unrecognized error code",
        }
    }
}

impl From<&str> for PushErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "DeviceNotRegistered" => Self::DeviceNotRegistered,
            "InvalidCredentials" => Self::InvalidCredentials,
            "MessageTooBig" => Self::MessageTooBig,
            "MessageRateExceeded" => Self::MessageRateExceeded,
            "MismatchSenderId" => Self::MismatchSenderId,
            "InvalidProviderToken" => Self::InvalidProviderToken,
            "ProviderError" => Self::ProviderError,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PushErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk whose provider call failed; its items contributed nothing to the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub item_count: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub tickets: Vec<PushTicket>,
    pub failures: Vec<ChunkFailure>,
    #[serde(skip)]
    pub chunks_attempted: usize,
}

impl DispatchOutcome {
    /// True when chunks were attempted and none of them succeeded.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.chunks_attempted > 0 && self.failures.len() == self.chunks_attempted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceiptOutcome {
    pub receipts: Vec<PushReceipt>,
    pub failures: Vec<ChunkFailure>,
    #[serde(skip)]
    pub chunks_attempted: usize,
}

impl ReceiptOutcome {
    /// True when chunks were attempted and none of them succeeded.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.chunks_attempted > 0 && self.failures.len() == self.chunks_attempted
    }
}

/// Checks Expo's push token syntax: `ExponentPushToken[...]`, `ExpoPushToken[...]`,
/// or a bare hyphenated 8-4-4-4-12 alphanumeric identifier.
#[must_use]
pub fn is_expo_push_token(token: &str) -> bool {
    let bracketed = (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
        && token.ends_with(']');
    bracketed || is_bare_device_id(token)
}

fn is_bare_device_id(token: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = token.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Splits `items` into consecutive chunks of at most `limit` items, preserving order.
#[must_use]
pub fn chunk_items<T>(items: Vec<T>, limit: usize) -> Vec<Vec<T>> {
    let limit = limit.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(limit));
    let mut current = Vec::with_capacity(limit.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == limit {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
