//! Extraction, validation, and deduplication of email addresses from a roster row.

use crate::model::{RosterRow, SchemaConfig};
use std::fmt;
use tracing::warn;

/// A validated mailbox together with the role label of the column it came from. The label doubles
/// as a display name, e.g. `Otec: mail <otec@example.com>`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EmailAddress {
    label: String,
    address: String,
}

impl EmailAddress {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.label, self.address)
    }
}

/// The outcome of resolving one row's email columns. Invalid addresses are data, not errors:
/// they are reported upward only as counts and logs.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct ResolvedEmails {
    valid: Vec<EmailAddress>,
    invalid: Vec<(String, String)>,
}

impl ResolvedEmails {
    /// The deduplicated valid addresses, in column-priority order.
    pub fn valid(&self) -> &[EmailAddress] {
        &self.valid
    }

    /// Candidates that failed validation, as (column label, raw address) pairs.
    pub fn invalid(&self) -> &[(String, String)] {
        &self.invalid
    }

    /// True when no address across all columns both exists and validates. This is the trigger
    /// for routing a row to missing-contact.
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Extracts, validates, and deduplicates the email addresses of one row.
///
/// Cells are read in the schema's column priority order. A cell may hold several comma-separated
/// addresses. Deduplication is by exact address: the first occurrence wins and later duplicates
/// are silently dropped, whatever their label. Purely functional over its inputs, aside from a
/// warning log per invalid candidate.
pub fn resolve(row: &RosterRow, schema: &SchemaConfig) -> ResolvedEmails {
    let mut resolved = ResolvedEmails::default();
    for col in schema.emails() {
        let Some(cell) = row.get(col) else {
            continue;
        };
        for candidate in cell.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !is_valid_mailbox(candidate) {
                warn!("Incorrect email address read: '{col}': '{candidate}'");
                resolved.invalid.push((col.clone(), candidate.to_string()));
                continue;
            }
            if resolved.valid.iter().any(|a| a.address == candidate) {
                continue;
            }
            resolved.valid.push(EmailAddress::new(col, candidate));
        }
    }
    resolved
}

/// A strict mailbox grammar: exactly one `@`, a non-empty local part, and a domain containing at
/// least one interior dot. Whitespace anywhere disqualifies the candidate.
fn is_valid_mailbox(s: &str) -> bool {
    if s.chars().any(|c| c.is_whitespace()) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
