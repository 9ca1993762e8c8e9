//! Provider response interpretation

use mr_common::ProviderKind;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::transport::{RawResponse, ResponseStream};

/// What a provider said about a send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Delivered {
        external_id: Option<String>,
        external_message: String,
    },
    Rejected {
        message: String,
    },
}

/// SendGrid error document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendGridErrorResponse {
    #[serde(default)]
    pub errors: Option<Vec<SendGridError>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendGridError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
}

/// MailGun response document, used for both success and error bodies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailGunResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn interpret(kind: ProviderKind, response: &RawResponse) -> Result<Interpretation> {
    match kind {
        ProviderKind::SendGrid => interpret_sendgrid(response),
        ProviderKind::MailGun => interpret_mailgun(response),
    }
}

fn interpret_sendgrid(response: &RawResponse) -> Result<Interpretation> {
    match response.stream {
        ResponseStream::Normal => Ok(Interpretation::Delivered {
            external_id: response.message_id.clone(),
            external_message: response.body.clone(),
        }),
        ResponseStream::Error => {
            let document: SendGridErrorResponse = serde_json::from_str(&response.body)
                .map_err(|e| DispatchError::malformed(ProviderKind::SendGrid, e.to_string()))?;

            let message = document
                .errors
                .and_then(|errors| errors.into_iter().next())
                .and_then(|first| first.message)
                .unwrap_or_else(|| response.body.clone());

            Ok(Interpretation::Rejected { message })
        }
    }
}

fn interpret_mailgun(response: &RawResponse) -> Result<Interpretation> {
    let document: MailGunResponse = serde_json::from_str(&response.body)
        .map_err(|e| DispatchError::malformed(ProviderKind::MailGun, e.to_string()))?;

    match response.stream {
        ResponseStream::Normal => Ok(Interpretation::Delivered {
            external_id: document.id,
            external_message: document.message.unwrap_or_default(),
        }),
        ResponseStream::Error => Ok(Interpretation::Rejected {
            message: document.message.unwrap_or_else(|| response.body.clone()),
        }),
    }
}
