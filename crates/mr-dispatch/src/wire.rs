//! Provider wire formats
//!
//! SendGrid receives a v3 `mail/send` JSON document; MailGun receives a
//! URL-encoded form. Both are built from an already validated message.

use mr_common::{MailMessage, ProviderKind};
use serde::Serialize;

use crate::error::{DispatchError, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A serialized request body ready to be written to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub content_type: &'static str,
    pub body: String,
}

/// Build the request body for the given provider
pub fn build_request(kind: ProviderKind, message: &MailMessage) -> Result<WireRequest> {
    match kind {
        ProviderKind::SendGrid => SendGridRequest::from_message(message).encode(),
        ProviderKind::MailGun => Ok(MailGunRequest::from_message(message).encode()),
    }
}

// ============================================================================
// SendGrid
// ============================================================================

/// SendGrid v3 mail/send payload
#[derive(Debug, Serialize)]
pub struct SendGridRequest<'a> {
    pub personalizations: Vec<Personalization<'a>>,
    pub from: EmailAddress<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EmailAddress<'a>>,
    pub content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Personalization<'a> {
    pub to: Vec<EmailAddress<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<EmailAddress<'a>>,
    pub subject: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmailAddress<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    #[serde(rename = "type")]
    pub content_type: &'a str,
    pub value: &'a str,
}

fn addresses(list: &[String]) -> Vec<EmailAddress<'_>> {
    list.iter().map(|email| EmailAddress { email: email.as_str() }).collect()
}

impl<'a> SendGridRequest<'a> {
    pub fn from_message(message: &'a MailMessage) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: addresses(&message.to),
                cc: addresses(&message.cc),
                bcc: addresses(&message.bcc),
                subject: &message.subject,
            }],
            from: EmailAddress { email: &message.sender },
            reply_to: message.reply_to.as_deref().map(|email| EmailAddress { email }),
            content: vec![Content {
                content_type: &message.content_type,
                value: &message.text,
            }],
        }
    }

    pub fn encode(&self) -> Result<WireRequest> {
        let body = serde_json::to_string(self).map_err(|e| DispatchError::Encoding(e.to_string()))?;
        Ok(WireRequest {
            content_type: JSON_CONTENT_TYPE,
            body,
        })
    }
}

// ============================================================================
// MailGun
// ============================================================================

/// MailGun messages API form
#[derive(Debug)]
pub struct MailGunRequest<'a> {
    fields: Vec<(&'static str, &'a str)>,
}

impl<'a> MailGunRequest<'a> {
    pub fn from_message(message: &'a MailMessage) -> Self {
        let mut fields = vec![("from", message.sender.as_str())];
        fields.extend(message.to.iter().map(|a| ("to", a.as_str())));
        fields.extend(message.cc.iter().map(|a| ("cc", a.as_str())));
        fields.extend(message.bcc.iter().map(|a| ("bcc", a.as_str())));
        fields.push(("subject", message.subject.as_str()));
        fields.push(("text", message.text.as_str()));
        // extra MIME headers go after the fixed fields
        if let Some(reply_to) = message.reply_to.as_deref() {
            fields.push(("h:Reply-To", reply_to));
        }

        Self { fields }
    }

    pub fn fields(&self) -> &[(&'static str, &'a str)] {
        &self.fields
    }

    pub fn encode(&self) -> WireRequest {
        let body = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        WireRequest {
            content_type: FORM_CONTENT_TYPE,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MailMessage {
        MailMessage::new(
            "noreply@example.org",
            vec!["john@example.org".to_string(), "tom@example.org".to_string()],
            "Hello & welcome",
            "Line one\nLine two",
        )
        .with_cc(vec!["keith@example.org".to_string()])
        .with_bcc(vec!["james@example.org".to_string()])
    }

    #[test]
    fn test_sendgrid_document() {
        let request = build_request(ProviderKind::SendGrid, &sample()).unwrap();
        assert_eq!(request.content_type, "application/json");

        let value: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(
            value,
            json!({
                "personalizations": [{
                    "to": [{"email": "john@example.org"}, {"email": "tom@example.org"}],
                    "cc": [{"email": "keith@example.org"}],
                    "bcc": [{"email": "james@example.org"}],
                    "subject": "Hello & welcome"
                }],
                "from": {"email": "noreply@example.org"},
                "content": [{"type": "text/plain", "value": "Line one\nLine two"}]
            })
        );
    }

    #[test]
    fn test_sendgrid_omits_empty_lists() {
        let msg = MailMessage::new("a@example.org", vec!["b@example.org".to_string()], "s", "t")
            .with_reply_to("c@example.org");
        let request = build_request(ProviderKind::SendGrid, &msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&request.body).unwrap();

        let personalization = &value["personalizations"][0];
        assert!(personalization.get("cc").is_none());
        assert!(personalization.get("bcc").is_none());
        assert_eq!(value["reply_to"]["email"], "c@example.org");
    }

    #[test]
    fn test_mailgun_form() {
        let request = build_request(ProviderKind::MailGun, &sample()).unwrap();
        assert_eq!(request.content_type, "application/x-www-form-urlencoded");
        assert_eq!(
            request.body,
            "from=noreply%40example.org\
             &to=john%40example.org\
             &to=tom%40example.org\
             &cc=keith%40example.org\
             &bcc=james%40example.org\
             &subject=Hello%20%26%20welcome\
             &text=Line%20one%0ALine%20two"
        );
    }

    #[test]
    fn test_mailgun_html_body_stays_in_text_field() {
        let mut msg = MailMessage::new("a@example.org", vec!["b@example.org".to_string()], "Grüße", "<p>é</p>");
        msg.content_type = "text/html".to_string();

        let form = MailGunRequest::from_message(&msg);
        assert!(form.fields().iter().all(|(key, _)| *key != "html"));

        let body = form.encode().body;
        assert_eq!(
            body,
            "from=a%40example.org&to=b%40example.org&subject=Gr%C3%BC%C3%9Fe&text=%3Cp%3E%C3%A9%3C%2Fp%3E"
        );
    }

    #[test]
    fn test_mailgun_reply_to_follows_text() {
        let msg = MailMessage::new("a@example.org", vec!["b@example.org".to_string()], "s", "t")
            .with_reply_to("c@example.org");

        let body = build_request(ProviderKind::MailGun, &msg).unwrap().body;
        assert_eq!(
            body,
            "from=a%40example.org&to=b%40example.org&subject=s&text=t&h%3AReply-To=c%40example.org"
        );
    }
}
