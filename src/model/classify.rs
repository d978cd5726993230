//! Partitions the roster into missing-contact, paid, and unpaid sets.

use crate::model::email::{self, ResolvedEmails};
use crate::model::{Amount, LedgerColumns, Roster, RosterRow, SchemaConfig};
use tracing::info;

/// One roster row together with its resolved email addresses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Classified {
    row: RosterRow,
    emails: ResolvedEmails,
}

impl Classified {
    pub fn row(&self) -> &RosterRow {
        &self.row
    }

    pub fn emails(&self) -> &ResolvedEmails {
        &self.emails
    }
}

/// The three disjoint partitions of the roster. Every input row lands in exactly one partition,
/// and each partition preserves the original row order.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Classification {
    missing_contact: Vec<Classified>,
    paid: Vec<Classified>,
    unpaid: Vec<Classified>,
}

impl Classification {
    /// Rows with no valid email address at all; they are excluded from payment processing and
    /// reported for operator follow-up.
    pub fn missing_contact(&self) -> &[Classified] {
        &self.missing_contact
    }

    /// Emailable rows whose ledger says they have paid.
    pub fn paid(&self) -> &[Classified] {
        &self.paid
    }

    /// Emailable rows whose ledger says they still owe.
    pub fn unpaid(&self) -> &[Classified] {
        &self.unpaid
    }

    pub fn total(&self) -> usize {
        self.missing_contact.len() + self.paid.len() + self.unpaid.len()
    }

    /// The number of invalid email candidates across all rows.
    pub fn invalid_email_count(&self) -> usize {
        [&self.missing_contact, &self.paid, &self.unpaid]
            .into_iter()
            .flatten()
            .map(|c| c.emails.invalid().len())
            .sum()
    }
}

/// Classifies every roster row: resolves its emails, then applies the unpaid predicate of the
/// configured ledger shape. Emits a summary count for operator visibility; the summary is
/// informational only and never affects control flow.
pub fn classify(roster: Roster, schema: &SchemaConfig) -> Classification {
    let mut classification = Classification::default();
    for row in roster.into_rows() {
        let emails = email::resolve(&row, schema);
        let classified = Classified { emails, row };
        if classified.emails.is_empty() {
            classification.missing_contact.push(classified);
        } else if is_unpaid(&classified.row, schema.ledger()) {
            classification.unpaid.push(classified);
        } else {
            classification.paid.push(classified);
        }
    }

    info!(
        "Of {} people, missing email: {}, emailable paid: {}, emailable unpaid: {}. \
        Also there were {} invalid emails.",
        classification.total(),
        classification.missing_contact.len(),
        classification.paid.len(),
        classification.unpaid.len(),
        classification.invalid_email_count(),
    );

    classification
}

/// The due and paid totals of a row under the due/paid ledger shape, with absent and non-numeric
/// cells coerced to zero. `None` for the paid-flag shape, which has no amounts.
pub(crate) fn due_paid_totals(row: &RosterRow, ledger: &LedgerColumns) -> Option<(Amount, Amount)> {
    match ledger {
        LedgerColumns::PaidFlag { .. } => None,
        LedgerColumns::DuePaid {
            amount_due,
            amount_paid,
            amount_due_sts,
            amount_paid_sts,
        } => {
            let cell = |col: &str| Amount::from_cell(row.get(col));
            let due = cell(amount_due)
                + amount_due_sts.as_deref().map(cell).unwrap_or(Amount::ZERO);
            let paid = cell(amount_paid)
                + amount_paid_sts.as_deref().map(cell).unwrap_or(Amount::ZERO);
            Some((due, paid))
        }
    }
}

fn is_unpaid(row: &RosterRow, ledger: &LedgerColumns) -> bool {
    match ledger {
        // Empty cells never survive roster parsing, so absence means unpaid.
        LedgerColumns::PaidFlag { paid_flag } => row.get(paid_flag).is_none(),
        LedgerColumns::DuePaid { .. } => {
            let (due, paid) = due_paid_totals(row, ledger)
                .unwrap_or((Amount::ZERO, Amount::ZERO));
            paid.value() < due.value()
        }
    }
}
