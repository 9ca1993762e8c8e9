use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Maximum number of addresses accepted in each of `to`, `cc` and `bcc`
pub const MAX_RECIPIENTS_PER_LIST: usize = 10;

/// Delimiter used when address lists are flattened into a single column
pub const RECIPIENT_DELIMITER: char = ';';

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

pub const SENT_MESSAGE: &str = "Your email has been sent";
pub const QUEUED_MESSAGE: &str = "Your email has been added into the queue";
pub const UNREACHABLE_REASON: &str = "Both providers couldn't be reached";

// ============================================================================
// Core Message Types
// ============================================================================

/// An outbound mail request as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    #[serde(rename = "from", default)]
    pub sender: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub text: String,
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl MailMessage {
    pub fn new(
        sender: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            reply_to: None,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            text: text.into(),
            content_type: default_content_type(),
        }
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

// ============================================================================
// Provider Types
// ============================================================================

/// Wire format spoken by a delivery provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    SendGrid,
    MailGun,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SendGrid => "sendgrid",
            ProviderKind::MailGun => "mailgun",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failover position of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderSlot {
    Primary,
    Secondary,
}

impl std::fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderSlot::Primary => f.write_str("primary"),
            ProviderSlot::Secondary => f.write_str("secondary"),
        }
    }
}

// ============================================================================
// Dispatch Outcome Types
// ============================================================================

/// Result of a dispatch that was accepted for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered to a provider
    Sent {
        provider_name: String,
        external_id: Option<String>,
        external_message: String,
    },
    /// Not delivered, persisted for a later attempt
    Queued { reason: String },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }

    /// Caller-facing confirmation text for this outcome
    pub fn message(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent { .. } => SENT_MESSAGE,
            DispatchOutcome::Queued { .. } => QUEUED_MESSAGE,
        }
    }
}

/// Response body returned to the caller on acceptance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailResponse {
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl EmailResponse {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl From<&DispatchOutcome> for EmailResponse {
    fn from(outcome: &DispatchOutcome) -> Self {
        EmailResponse::now(outcome.message())
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// A message that was accepted by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Option<i64>,
    pub sender: String,
    pub reply_to: Option<String>,
    pub to_recipients: String,
    pub cc_recipients: String,
    pub bcc_recipients: String,
    pub subject: String,
    pub text: String,
    pub content_type: String,
    pub provider: String,
    pub response_id: Option<String>,
    pub response_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        message: &MailMessage,
        provider: impl Into<String>,
        response_id: Option<String>,
        response_message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            sender: message.sender.clone(),
            reply_to: message.reply_to.clone(),
            to_recipients: join_recipients(&message.to),
            cc_recipients: join_recipients(&message.cc),
            bcc_recipients: join_recipients(&message.bcc),
            subject: message.subject.clone(),
            text: message.text.clone(),
            content_type: message.content_type.clone(),
            provider: provider.into(),
            response_id,
            response_message: response_message.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to(&self) -> Vec<String> {
        split_recipients(&self.to_recipients)
    }

    pub fn cc(&self) -> Vec<String> {
        split_recipients(&self.cc_recipients)
    }

    pub fn bcc(&self) -> Vec<String> {
        split_recipients(&self.bcc_recipients)
    }
}

/// A message that could not be delivered and awaits another attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: Option<i64>,
    pub sender: String,
    pub reply_to: Option<String>,
    pub to_recipients: String,
    pub cc_recipients: String,
    pub bcc_recipients: String,
    pub subject: String,
    pub text: String,
    pub content_type: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueRecord {
    pub fn new(message: &MailMessage, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            sender: message.sender.clone(),
            reply_to: message.reply_to.clone(),
            to_recipients: join_recipients(&message.to),
            cc_recipients: join_recipients(&message.cc),
            bcc_recipients: join_recipients(&message.bcc),
            subject: message.subject.clone(),
            text: message.text.clone(),
            content_type: message.content_type.clone(),
            reason: reason.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to(&self) -> Vec<String> {
        split_recipients(&self.to_recipients)
    }

    pub fn cc(&self) -> Vec<String> {
        split_recipients(&self.cc_recipients)
    }

    pub fn bcc(&self) -> Vec<String> {
        split_recipients(&self.bcc_recipients)
    }
}

pub fn join_recipients(addresses: &[String]) -> String {
    addresses.join(&RECIPIENT_DELIMITER.to_string())
}

pub fn split_recipients(joined: &str) -> Vec<String> {
    joined
        .split(RECIPIENT_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
