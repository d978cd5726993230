//! Sending notification emails through the Gmail REST API.
//!
//! Gmail's `messages.send` endpoint takes a complete RFC 822 message, base64url-encoded, in the
//! `raw` field of the request body. We assemble the message by hand, it is plain text with a
//! handful of headers.

use crate::api::TokenProvider;
use crate::model::{EmailAddress, PaymentRecord};
use crate::{MailConfig, Result};
use anyhow::{bail, Context};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use tracing::debug;

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// A rendered notification, ready to be wrapped in RFC 822 headers and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutgoingEmail {
    to: Vec<EmailAddress>,
    subject: String,
    body: String,
}

impl OutgoingEmail {
    /// Fills the configured subject and body templates with the values of one payment record.
    pub(crate) fn render(
        mail: &MailConfig,
        record: &PaymentRecord,
        recipients: &[EmailAddress],
        payment_code: &str,
    ) -> Self {
        Self {
            to: recipients.to_vec(),
            subject: fill(mail.subject(), record, payment_code),
            body: fill(mail.body_template(), record, payment_code),
        }
    }

    pub(crate) fn to(&self) -> &[EmailAddress] {
        &self.to
    }

    pub(crate) fn subject(&self) -> &str {
        &self.subject
    }

    pub(crate) fn body(&self) -> &str {
        &self.body
    }

    /// Assembles the RFC 822 message. Non-ASCII header values are RFC 2047 encoded, the body is
    /// sent as UTF-8 plain text.
    pub(crate) fn to_rfc822(&self, sender_name: &str, sender_email: &str) -> String {
        let to = self
            .to
            .iter()
            .map(|a| a.address().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut message = String::new();
        message.push_str(&format!(
            "From: {} <{}>\r\n",
            encode_header_word(sender_name),
            sender_email
        ));
        message.push_str(&format!("To: {to}\r\n"));
        message.push_str(&format!(
            "Subject: {}\r\n",
            encode_header_word(&self.subject)
        ));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");
        message.push_str(&self.body);
        message
    }
}

/// Substitutes the template placeholders with the record's values.
fn fill(template: &str, record: &PaymentRecord, payment_code: &str) -> String {
    template
        .replace("{name}", record.name())
        .replace("{troop}", record.troop().name())
        .replace("{amount}", &record.amount().to_string())
        .replace("{currency}", record.currency())
        .replace("{due_date}", &record.human_due_date())
        .replace("{account}", record.account_human())
        .replace("{iban}", record.iban())
        .replace("{vs}", record.variable_symbol())
        .replace("{ss}", record.specific_symbol())
        .replace("{message}", record.message())
        .replace("{payment_code}", payment_code)
}

/// RFC 2047 encoded-word form for header values that are not plain ASCII.
fn encode_header_word(s: &str) -> String {
    if s.is_ascii() {
        s.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(s.as_bytes()))
    }
}

/// An abstract mail transport, so the notification pipeline can run against a recording fake in
/// tests.
#[async_trait::async_trait]
pub(crate) trait Mailer {
    async fn send(&mut self, email: &OutgoingEmail) -> Result<()>;
}

/// Sends mail as the authorized account through Gmail's `messages.send` endpoint.
pub(crate) struct Gmail {
    token_provider: TokenProvider,
    client: reqwest::Client,
    sender_name: String,
    sender_email: String,
}

impl Gmail {
    pub(crate) fn new(
        token_provider: TokenProvider,
        sender_name: impl Into<String>,
        sender_email: impl Into<String>,
    ) -> Self {
        Self {
            token_provider,
            client: reqwest::Client::new(),
            sender_name: sender_name.into(),
            sender_email: sender_email.into(),
        }
    }
}

#[async_trait::async_trait]
impl Mailer for Gmail {
    async fn send(&mut self, email: &OutgoingEmail) -> Result<()> {
        let access_token = self.token_provider.token_with_refresh().await?.to_string();
        let raw = URL_SAFE_NO_PAD.encode(email.to_rfc822(&self.sender_name, &self.sender_email));

        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(&access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .context("Failed to send the message to the Gmail API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Gmail API returned status {status}: {body}");
        }

        debug!("Sent notification to {}", email.to().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LedgerColumns, PaymentTerms, Roster, SchemaConfig};
    use crate::PaymentConfig;
    use chrono::NaiveDate;

    const IBAN: &str = "CZ6508000000192000145399";

    fn record() -> PaymentRecord {
        let schema = SchemaConfig::new(
            "Name",
            "Troop",
            "Reg",
            vec!["Email".to_string()],
            LedgerColumns::PaidFlag {
                paid_flag: "Paid".to_string(),
            },
        );
        let grid = vec![
            vec![
                "Name".to_string(),
                "Troop".to_string(),
                "Reg".to_string(),
                "Email".to_string(),
                "Paid".to_string(),
            ],
            // No Paid cell, so the person still owes the fixed amount.
            vec![
                "Jana Nováková".to_string(),
                "Sokol".to_string(),
                "042".to_string(),
                "jana@example.com".to_string(),
            ],
        ];
        let roster = Roster::parse(grid, &schema).unwrap();
        let troops = crate::model::TroopTable::parse(&[
            "Sokol, SK, 07, Vedoucí, vedouci@example.com".to_string()
        ])
        .unwrap();
        let payment = PaymentConfig::new(
            IBAN,
            "99",
            Some("500".to_string()),
            "CZK",
            "Prispevky {troop_code} {name}",
            10,
            true,
        );
        let terms =
            PaymentTerms::new(&payment, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()).unwrap();
        PaymentRecord::build(&roster.rows()[0], &schema, &troops, &terms).unwrap()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let mail = MailConfig::new(
            "Oddíl",
            "oddil@example.com",
            "Příspěvky: {name}",
            "Částka {amount} {currency}, účet {account}, VS {vs}, SS {ss}, do {due_date}.\n{payment_code}",
        );
        let recipients = vec![EmailAddress::new("Email", "jana@example.com")];
        let email = OutgoingEmail::render(&mail, &record(), &recipients, "SPD*1.0*ACC:X");

        // The record's name has been transliterated by the record builder.
        assert_eq!("Příspěvky: Jana Novakova", email.subject());
        assert_eq!(
            "Částka 500 CZK, účet 000019-2000145399/0800, VS 042, SS 9907, \
             do 15. 01. 2026.\nSPD*1.0*ACC:X",
            email.body()
        );
        assert_eq!(1, email.to().len());
    }

    #[test]
    fn test_rfc822_ascii_headers() {
        let email = OutgoingEmail {
            to: vec![EmailAddress::new("Email", "jana@example.com")],
            subject: "Dues reminder".to_string(),
            body: "Hello".to_string(),
        };
        let message = email.to_rfc822("Troop", "troop@example.com");
        assert!(message.starts_with("From: Troop <troop@example.com>\r\n"));
        assert!(message.contains("To: jana@example.com\r\n"));
        assert!(message.contains("Subject: Dues reminder\r\n"));
        assert!(message.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_rfc822_encodes_non_ascii_subject() {
        let email = OutgoingEmail {
            to: vec![
                EmailAddress::new("A", "a@example.com"),
                EmailAddress::new("B", "b@example.com"),
            ],
            subject: "Příspěvky".to_string(),
            body: "Ahoj".to_string(),
        };
        let message = email.to_rfc822("Oddíl", "troop@example.com");
        assert!(message.contains("To: a@example.com, b@example.com\r\n"));
        // Both the sender name and the subject carry Czech diacritics.
        assert!(message.contains("Subject: =?UTF-8?B?"));
        assert!(message.contains("From: =?UTF-8?B?"));
        assert!(!message.contains("Subject: Příspěvky"));
    }
}
