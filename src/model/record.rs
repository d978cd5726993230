//! Derivation of the canonical payment record for one roster row.

use crate::model::classify::due_paid_totals;
use crate::model::{Amount, RosterRow, SchemaConfig, Troop, TroopTable};
use crate::{PaymentConfig, Result};
use anyhow::{bail, ensure, Context};
use chrono::{Duration, NaiveDate};
use deunicode::deunicode;
use std::str::FromStr;

/// Payment messages are truncated to this many characters. This is a protocol constraint of the
/// payment-order encoding, not a display preference.
const MESSAGE_MAX_CHARS: usize = 60;

/// How the billed amount is determined.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum AmountMode {
    /// Every unpaid member is billed the same configured amount.
    Fixed(Amount),
    /// Each member is billed `amount_due - amount_paid` from the ledger columns.
    FromLedger,
}

/// The payment settings shared by every record of one run. Constructed once per batch so that
/// every notification carries the same due date.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PaymentTerms {
    iban: String,
    ss_prefix: String,
    currency: String,
    message_template: String,
    amount: AmountMode,
    due_date: NaiveDate,
}

impl PaymentTerms {
    /// Builds the terms from the payment config, with the due date computed from `today` plus the
    /// configured offset.
    pub fn new(payment: &PaymentConfig, today: NaiveDate) -> Result<Self> {
        ensure!(
            !payment.iban().is_empty(),
            "payment.iban is not configured; edit config.json"
        );
        let amount = match payment.fixed_amount() {
            Some(raw) => {
                let amount = Amount::from_str(raw)
                    .with_context(|| format!("Invalid payment.fixed_amount '{raw}'"))?;
                AmountMode::Fixed(amount)
            }
            None => AmountMode::FromLedger,
        };
        Ok(Self {
            iban: payment.iban().to_string(),
            ss_prefix: payment.ss_prefix().to_string(),
            currency: payment.currency().to_string(),
            message_template: payment.message_template().to_string(),
            amount,
            due_date: today + Duration::days(payment.due_days()),
        })
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }
}

/// The canonical, validated payment record of one person. Immutable; every derived field is
/// computed eagerly at construction so that invariant violations surface immediately.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PaymentRecord {
    name: String,
    troop: Troop,
    variable_symbol: String,
    specific_symbol: String,
    amount: Amount,
    currency: String,
    due_date: NaiveDate,
    iban: String,
    account_human: String,
    message: String,
}

impl PaymentRecord {
    /// Derives the payment record for one roster row. Any violated invariant is a structural,
    /// per-row error naming the row; the caller logs it and continues with the other rows.
    pub fn build(
        row: &RosterRow,
        schema: &SchemaConfig,
        troops: &TroopTable,
        terms: &PaymentTerms,
    ) -> Result<Self> {
        let Some(raw_name) = row.name(schema) else {
            bail!("Row {} has no name", row.row_num());
        };
        ensure!(
            raw_name.trim().chars().count() > 5,
            "Row {}: name '{raw_name}' is implausibly short",
            row.row_num()
        );
        let name = deunicode(raw_name);

        let Some(troop_name) = row.troop(schema) else {
            bail!("Row {} ({raw_name}) has no troop", row.row_num());
        };
        let Some(troop) = troops.get(troop_name) else {
            bail!(
                "Unknown troop '{troop_name}' at row {}; a person cannot be billed without a \
                specific symbol",
                row.row_num()
            );
        };

        let Some(variable_symbol) = row.reg_num(schema) else {
            bail!("Row {} ({raw_name}) has no registration number", row.row_num());
        };
        ensure!(
            variable_symbol.chars().count() > 2,
            "Row {}: registration number '{variable_symbol}' is implausibly short",
            row.row_num()
        );

        let amount = match terms.amount {
            AmountMode::Fixed(amount) => amount,
            AmountMode::FromLedger => {
                let Some((due, paid)) = due_paid_totals(row, schema.ledger()) else {
                    bail!(
                        "The configured ledger shape has no amount columns; \
                        set payment.fixed_amount in config.json"
                    );
                };
                due - paid
            }
        };
        ensure!(
            amount.is_positive() && amount.is_integer(),
            "Row {}: computed amount '{amount}' is not a positive whole amount",
            row.row_num()
        );

        let parts = IbanParts::split(&terms.iban)
            .with_context(|| format!("Cannot derive a payment record for row {}", row.row_num()))?;

        let message = render_message(&terms.message_template, troop.text_code(), &name);

        Ok(Self {
            name,
            specific_symbol: troop.specific_symbol(&terms.ss_prefix),
            troop: troop.clone(),
            variable_symbol: variable_symbol.to_string(),
            amount,
            currency: terms.currency.clone(),
            due_date: terms.due_date,
            iban: terms.iban.clone(),
            account_human: parts.human_form(),
            message,
        })
    }

    /// The display name, transliterated to ASCII.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn troop(&self) -> &Troop {
        &self.troop
    }

    pub fn variable_symbol(&self) -> &str {
        &self.variable_symbol
    }

    pub fn specific_symbol(&self) -> &str {
        &self.specific_symbol
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The account number in machine (IBAN) form.
    pub fn iban(&self) -> &str {
        &self.iban
    }

    /// The account number in human-readable form, `prefix-number/bank`.
    pub fn account_human(&self) -> &str {
        &self.account_human
    }

    /// The rendered payment message, transliterated and at most 60 characters.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    /// The due date in the 8-digit form used by the encoded payment code.
    pub fn qr_due_date(&self) -> String {
        self.due_date.format("%Y%m%d").to_string()
    }

    /// The due date in the localized human form, e.g. `05. 09. 2026`.
    pub fn human_due_date(&self) -> String {
        self.due_date.format("%d. %m. %Y").to_string()
    }
}

/// Interpolates the troop code and transliterated name into the message template, transliterates
/// the result again, and hard-truncates to the 60-character ceiling.
fn render_message(template: &str, troop_code: &str, name: &str) -> String {
    let expanded = template
        .replace("{troop_code}", troop_code)
        .replace("{name}", name);
    deunicode(&expanded).chars().take(MESSAGE_MAX_CHARS).collect()
}

/// The four fixed-width fields of a Czech IBAN after the country/checksum leader:
///
/// `CZkk bbbb ssss sscc cccc cccc`
///
/// Where `b` is the national bank code, `s` the account-number prefix, and `c` the account
/// number. See https://en.wikipedia.org/wiki/International_Bank_Account_Number
#[derive(Debug, Clone, Eq, PartialEq)]
struct IbanParts {
    country: String,
    checksum: String,
    bank: String,
    prefix: String,
    number: String,
}

impl IbanParts {
    /// Decomposes the IBAN. A malformed string (wrong length, bad character, failed mod-97
    /// checksum, or a decomposition that does not reassemble byte-for-byte) is corrupt input and
    /// a fatal error, not a recoverable condition.
    fn split(iban: &str) -> Result<IbanParts> {
        ensure!(
            iban.len() == 24 && iban.chars().all(|c| c.is_ascii_alphanumeric()),
            "'{iban}' is not a 24-character Czech IBAN"
        );
        ensure!(
            iban_mod97(iban) == 1,
            "IBAN '{iban}' fails its checksum; the account number is corrupt"
        );
        let parts = IbanParts {
            country: iban[0..2].to_string(),
            checksum: iban[2..4].to_string(),
            bank: iban[4..8].to_string(),
            prefix: iban[8..14].to_string(),
            number: iban[14..24].to_string(),
        };
        ensure!(
            parts.assemble() == iban,
            "IBAN '{iban}' did not survive decomposition; the account number is corrupt"
        );
        Ok(parts)
    }

    /// Reassembles the four decomposed fields; must reproduce the original IBAN.
    fn assemble(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.country, self.checksum, self.bank, self.prefix, self.number
        )
    }

    /// The domestic human-readable form, `prefix-number/bank`.
    fn human_form(&self) -> String {
        format!("{}-{}/{}", self.prefix, self.number, self.bank)
    }
}

/// The ISO 13616 mod-97 check: move the first four characters to the end, read letters as two
/// decimal digits (A=10 .. Z=35), and reduce modulo 97. A valid IBAN yields 1.
fn iban_mod97(iban: &str) -> u32 {
    let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
    let mut rem: u32 = 0;
    for c in rearranged.chars() {
        match c.to_digit(10) {
            Some(d) => rem = (rem * 10 + d) % 97,
            None => {
                let v = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 10;
                rem = (rem * 100 + v) % 97;
            }
        }
    }
    rem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LedgerColumns;
    use std::collections::HashMap;

    // The Czech example IBAN from ISO 13616 documentation; checksum-valid.
    const IBAN: &str = "CZ6508000000192000145399";

    fn schema() -> SchemaConfig {
        SchemaConfig::new(
            "Name",
            "Troop",
            "Reg",
            vec!["Email".to_string()],
            LedgerColumns::DuePaid {
                amount_due: "Due".to_string(),
                amount_paid: "Paid".to_string(),
                amount_due_sts: None,
                amount_paid_sts: None,
            },
        )
    }

    fn troops() -> TroopTable {
        TroopTable::parse(&["Sokol, SK, 07, Jana Vedoucí, vedouci@example.com"]).unwrap()
    }

    fn payment_config(fixed_amount: Option<&str>) -> PaymentConfig {
        PaymentConfig::new(
            IBAN,
            "99",
            fixed_amount.map(|s| s.to_string()),
            "CZK",
            "Prispevky {troop_code} {name}",
            10,
            true,
        )
    }

    fn terms(fixed_amount: Option<&str>) -> PaymentTerms {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        PaymentTerms::new(&payment_config(fixed_amount), today).unwrap()
    }

    fn row(cells: &[(&str, &str)]) -> RosterRow {
        let fields: HashMap<String, String> = cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RosterRow::new(2, fields)
    }

    fn good_row() -> RosterRow {
        row(&[
            ("Name", "Jana Nováková"),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", "500"),
            ("Paid", "0"),
        ])
    }

    #[test]
    fn test_build_from_ledger() {
        let record = PaymentRecord::build(&good_row(), &schema(), &troops(), &terms(None)).unwrap();
        assert_eq!(record.name(), "Jana Novakova");
        assert_eq!(record.variable_symbol(), "042");
        assert_eq!(record.specific_symbol(), "9907");
        assert_eq!(record.amount().qr_format(), "500.00");
        assert_eq!(record.account_human(), "000019-2000145399/0800");
        assert_eq!(record.message(), "Prispevky SK Jana Novakova");
    }

    #[test]
    fn test_build_fixed_amount() {
        let record =
            PaymentRecord::build(&good_row(), &schema(), &troops(), &terms(Some("350"))).unwrap();
        assert_eq!(record.amount().qr_format(), "350.00");
    }

    #[test]
    fn test_build_partial_payment() {
        let r = row(&[
            ("Name", "Jana Nováková"),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", "500"),
            ("Paid", "200"),
        ]);
        let record = PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).unwrap();
        assert_eq!(record.amount().qr_format(), "300.00");
    }

    #[test]
    fn test_build_unknown_troop() {
        let r = row(&[
            ("Name", "Jana Nováková"),
            ("Troop", "Neznámá"),
            ("Reg", "042"),
            ("Due", "500"),
        ]);
        let err = PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).unwrap_err();
        assert!(err.to_string().contains("Unknown troop 'Neznámá'"));
    }

    #[test]
    fn test_build_short_name() {
        let r = row(&[
            ("Name", "Jan"),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", "500"),
        ]);
        assert!(PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).is_err());
    }

    #[test]
    fn test_build_short_variable_symbol() {
        let r = row(&[
            ("Name", "Jana Nováková"),
            ("Troop", "Sokol"),
            ("Reg", "42"),
            ("Due", "500"),
        ]);
        assert!(PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).is_err());
    }

    #[test]
    fn test_build_non_positive_amount() {
        let r = row(&[
            ("Name", "Jana Nováková"),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", "500"),
            ("Paid", "500"),
        ]);
        assert!(PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).is_err());
    }

    #[test]
    fn test_due_dates() {
        let record = PaymentRecord::build(&good_row(), &schema(), &troops(), &terms(None)).unwrap();
        assert_eq!(record.qr_due_date(), "20260115");
        assert_eq!(record.human_due_date(), "15. 01. 2026");
    }

    #[test]
    fn test_message_truncation() {
        let long_name = "Ánna".repeat(30);
        let r = row(&[
            ("Name", long_name.as_str()),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", "500"),
        ]);
        let record = PaymentRecord::build(&r, &schema(), &troops(), &terms(None)).unwrap();
        assert!(record.message().chars().count() <= 60);
        assert_eq!(record.message().chars().count(), 60);
    }

    #[test]
    fn test_iban_round_trip() {
        let parts = IbanParts::split(IBAN).unwrap();
        assert_eq!(parts.assemble(), IBAN);
        assert_eq!(parts.human_form(), "000019-2000145399/0800");
    }

    #[test]
    fn test_iban_corruption_detected() {
        // Altering one character breaks the mod-97 checksum.
        let corrupted = IBAN.replace("4539", "4549");
        assert_ne!(corrupted, IBAN);
        assert!(IbanParts::split(&corrupted).is_err());
    }

    #[test]
    fn test_iban_wrong_length() {
        assert!(IbanParts::split("CZ65").is_err());
        assert!(IbanParts::split(&format!("{IBAN}9")).is_err());
    }

    #[test]
    fn test_iban_mod97_valid() {
        assert_eq!(iban_mod97(IBAN), 1);
        // The ISO example IBAN for Great Britain.
        assert_eq!(iban_mod97("GB82WEST12345698765432"), 1);
    }

    #[test]
    fn test_terms_require_iban() {
        let payment = PaymentConfig::new("", "99", None, "CZK", "x", 10, true);
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert!(PaymentTerms::new(&payment, today).is_err());
    }

    #[test]
    fn test_terms_reject_junk_fixed_amount() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert!(PaymentTerms::new(&payment_config(Some("abc")), today).is_err());
    }
}
