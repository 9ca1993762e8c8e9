//! Message Validation
//!
//! Checks run in a fixed order. A missing sender or an empty recipient set
//! stops validation with a single error; the remaining checks accumulate.

use std::collections::HashSet;
use std::sync::LazyLock;

use mr_common::{MailMessage, MAX_RECIPIENTS_PER_LIST};
use regex::Regex;

pub const MISSING_SENDER: &str = "From email is missing";
pub const NO_RECIPIENTS: &str = "No no, cannot send an email without any recipients";

const MAX_ADDRESS_LENGTH: usize = 254;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$"#,
    )
    .expect("email pattern is valid")
});

/// Returns true when `address` is a syntactically valid mailbox with a
/// fully qualified domain
pub fn is_valid_address(address: &str) -> bool {
    address.len() <= MAX_ADDRESS_LENGTH && EMAIL_PATTERN.is_match(address)
}

/// Validate a message. An empty result means the message may be dispatched.
pub fn validate(message: &MailMessage) -> Vec<String> {
    if message.sender.is_empty() {
        return vec![MISSING_SENDER.to_string()];
    }
    if !message.has_recipients() {
        return vec![NO_RECIPIENTS.to_string()];
    }

    let mut errors = Vec::new();

    for (field, list) in recipient_lists(message) {
        if list.len() > MAX_RECIPIENTS_PER_LIST {
            errors.push(format!(
                "'{}' must not contain more than {} addresses",
                field, MAX_RECIPIENTS_PER_LIST
            ));
        }
    }

    check_format(&mut errors, "from", std::slice::from_ref(&message.sender));
    for (field, list) in recipient_lists(message) {
        check_format(&mut errors, field, list);
    }

    if let Some(error) = check_duplicates(message) {
        errors.push(error);
    }

    errors
}

fn recipient_lists(message: &MailMessage) -> [(&'static str, &[String]); 3] {
    [
        ("to", message.to.as_slice()),
        ("cc", message.cc.as_slice()),
        ("bcc", message.bcc.as_slice()),
    ]
}

fn check_format(errors: &mut Vec<String>, field: &str, addresses: &[String]) {
    for address in addresses {
        if !is_valid_address(address) {
            errors.push(format!("'{}' email is invalid - {}", field, address));
        }
    }
}

/// An address is a duplicate when it was already seen in `to`, or in `cc`
/// for a `cc`/`bcc` entry, or in `bcc` for a `bcc` entry.
fn check_duplicates(message: &MailMessage) -> Option<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();

    for address in message.to.iter().chain(&message.cc).chain(&message.bcc) {
        let address = address.as_str();
        if !seen.insert(address) && reported.insert(address) {
            duplicates.push(address);
        }
    }

    if duplicates.is_empty() {
        None
    } else {
        Some(format!(
            "Email address in to, cc and bcc should be unique - {}",
            duplicates.join(",")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn message(to: &[&str]) -> MailMessage {
        MailMessage::new("noreply@example.org", addrs(to), "subject", "body")
    }

    #[test]
    fn test_valid_message() {
        let msg = message(&["john@example.org", "tom@example.org"])
            .with_cc(addrs(&["keith@example.org"]))
            .with_bcc(addrs(&["james@example.org"]));
        assert!(validate(&msg).is_empty());
    }

    #[test]
    fn test_missing_sender_stops() {
        let mut msg = message(&["not-an-address"]);
        msg.sender = String::new();

        assert_eq!(validate(&msg), vec![MISSING_SENDER.to_string()]);
    }

    #[test]
    fn test_blank_sender_is_invalid_not_missing() {
        let mut msg = message(&["john@example.org"]);
        msg.sender = " ".to_string();

        assert_eq!(validate(&msg), vec!["'from' email is invalid -  ".to_string()]);
    }

    #[test]
    fn test_no_recipients_stops() {
        let mut msg = message(&[]);
        msg.sender = "broken".to_string();

        assert_eq!(validate(&msg), vec![NO_RECIPIENTS.to_string()]);
    }

    #[test]
    fn test_invalid_addresses_reported_per_field() {
        let mut msg = message(&["john@example", "tom@example.org"])
            .with_cc(addrs(&["keith"]))
            .with_bcc(addrs(&["@example.org"]));
        msg.sender = "noreply@".to_string();

        let errors = validate(&msg);
        assert_eq!(
            errors,
            vec![
                "'from' email is invalid - noreply@".to_string(),
                "'to' email is invalid - john@example".to_string(),
                "'cc' email is invalid - keith".to_string(),
                "'bcc' email is invalid - @example.org".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicates_combined_into_one_error() {
        let msg = message(&["john@example.org", "john@example.org", "tom@example.org"])
            .with_cc(addrs(&["tom@example.org", "keith@example.org"]))
            .with_bcc(addrs(&["keith@example.org", "john@example.org"]));

        let errors = validate(&msg);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            "Email address in to, cc and bcc should be unique - john@example.org,tom@example.org,keith@example.org"
        );
    }

    #[test]
    fn test_same_address_in_cc_and_bcc() {
        let msg = message(&["a@example.org"])
            .with_cc(addrs(&["b@example.org"]))
            .with_bcc(addrs(&["b@example.org"]));

        let errors = validate(&msg);
        assert_eq!(errors, vec!["Email address in to, cc and bcc should be unique - b@example.org".to_string()]);
    }

    #[test]
    fn test_list_cap() {
        let many: Vec<String> = (0..11).map(|i| format!("user{}@example.org", i)).collect();
        let msg = MailMessage::new("noreply@example.org", many, "s", "t");

        let errors = validate(&msg);
        assert_eq!(errors, vec!["'to' must not contain more than 10 addresses".to_string()]);
    }

    #[test]
    fn test_address_syntax() {
        assert!(is_valid_address("john.smith+tag@mail.example.co.uk"));
        assert!(is_valid_address("o'brien@example.ie"));
        assert!(!is_valid_address("john@example"));
        assert!(!is_valid_address("john..smith@example.org"));
        assert!(!is_valid_address(".john@example.org"));
        assert!(!is_valid_address("john@-example.org"));
        assert!(!is_valid_address("john@example.o"));
        assert!(!is_valid_address("john example@example.org"));
        assert!(!is_valid_address(""));
    }
}
