//! The mapping of logical column roles to the header names of the roster sheet.

use crate::Result;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maps each logical role the program needs to a column header of the roster sheet. Resolved once
/// from config.json and never mutated.
///
/// The `emails` list is ordered: when one person has addresses in several columns the earlier
/// column wins during deduplication.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchemaConfig {
    /// Header of the person-name column.
    name: String,

    /// Header of the troop (organizational sub-group) column.
    troop: String,

    /// Header of the registration-number column. The registration number becomes the variable
    /// symbol of the payment order.
    reg_num: String,

    /// Headers of the email-bearing columns, in priority order.
    emails: Vec<String>,

    /// The shape of the payment ledger columns.
    ledger: LedgerColumns,
}

/// The two observed ledger shapes. They are mutually exclusive configuration modes: a sheet
/// either has a single "paid" marker column, or numeric due/paid columns (optionally split into
/// a base payment and a secondary "STS" payment).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LedgerColumns {
    /// A single column whose emptiness means "unpaid".
    PaidFlag { paid_flag: String },

    /// Numeric amount-due and amount-paid columns. When the `_sts` columns are configured, the
    /// due and paid totals are the sums of the base and STS columns.
    DuePaid {
        amount_due: String,
        amount_paid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount_due_sts: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount_paid_sts: Option<String>,
    },
}

impl SchemaConfig {
    pub fn new(
        name: impl Into<String>,
        troop: impl Into<String>,
        reg_num: impl Into<String>,
        emails: Vec<String>,
        ledger: LedgerColumns,
    ) -> Self {
        Self {
            name: name.into(),
            troop: troop.into(),
            reg_num: reg_num.into(),
            emails,
            ledger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn troop(&self) -> &str {
        &self.troop
    }

    pub fn reg_num(&self) -> &str {
        &self.reg_num
    }

    /// The email column headers in priority order.
    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    pub fn ledger(&self) -> &LedgerColumns {
        &self.ledger
    }

    /// All column headers this schema requires from the sheet.
    pub fn colnames(&self) -> Vec<&str> {
        let mut cols = vec![self.name.as_str(), self.troop.as_str(), self.reg_num.as_str()];
        cols.extend(self.emails.iter().map(|s| s.as_str()));
        cols.extend(self.ledger.colnames());
        cols
    }

    /// Verifies that every required column is present in the sheet's header row. A missing column
    /// is fatal for the whole run: no row can be trusted once the schema contract is broken. The
    /// error lists every missing header.
    pub fn verify_headers(&self, headers: &[String]) -> Result<()> {
        let available: HashSet<&str> = headers.iter().map(|h| h.as_str()).collect();
        let missing: Vec<&str> = self
            .colnames()
            .into_iter()
            .filter(|c| !available.contains(c))
            .collect();
        if !missing.is_empty() {
            bail!(
                "The sheet does not have the needed columns {missing:?} (it has the following: \
                {headers:?})"
            );
        }
        Ok(())
    }
}

impl LedgerColumns {
    /// The headers of the ledger columns for this mode.
    pub fn colnames(&self) -> Vec<&str> {
        match self {
            LedgerColumns::PaidFlag { paid_flag } => vec![paid_flag.as_str()],
            LedgerColumns::DuePaid {
                amount_due,
                amount_paid,
                amount_due_sts,
                amount_paid_sts,
            } => {
                let mut cols = vec![amount_due.as_str(), amount_paid.as_str()];
                cols.extend(amount_due_sts.as_deref());
                cols.extend(amount_paid_sts.as_deref());
                cols
            }
        }
    }
}

impl Default for SchemaConfig {
    /// The column headers of the original roster sheet this program was written for, as a
    /// starting point for a fresh config.json.
    fn default() -> Self {
        Self {
            name: "Osoba".to_string(),
            troop: "Jednotka".to_string(),
            reg_num: "Registrační číslo".to_string(),
            emails: vec![
                "E-mail (hlavní)".to_string(),
                "Matka: mail".to_string(),
                "Otec: mail".to_string(),
                "E-mail (další)".to_string(),
                "Ostatní: mail".to_string(),
            ],
            ledger: LedgerColumns::DuePaid {
                amount_due: "Poplatek".to_string(),
                amount_paid: "Zaplaceno".to_string(),
                amount_due_sts: None,
                amount_paid_sts: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn schema() -> SchemaConfig {
        SchemaConfig::new(
            "Name",
            "Troop",
            "Reg",
            vec!["Email 1".to_string(), "Email 2".to_string()],
            LedgerColumns::DuePaid {
                amount_due: "Due".to_string(),
                amount_paid: "Paid".to_string(),
                amount_due_sts: None,
                amount_paid_sts: None,
            },
        )
    }

    #[test]
    fn test_colnames() {
        let schema = schema();
        let cols = schema.colnames();
        assert_eq!(
            cols,
            vec!["Name", "Troop", "Reg", "Email 1", "Email 2", "Due", "Paid"]
        );
    }

    #[test]
    fn test_verify_headers_ok() {
        let h = headers(&["Extra", "Name", "Troop", "Reg", "Email 1", "Email 2", "Due", "Paid"]);
        schema().verify_headers(&h).unwrap();
    }

    #[test]
    fn test_verify_headers_missing() {
        let h = headers(&["Name", "Troop", "Email 1", "Email 2", "Due", "Paid"]);
        let err = schema().verify_headers(&h).unwrap_err();
        assert!(err.to_string().contains("Reg"));
    }

    #[test]
    fn test_verify_headers_lists_all_missing() {
        let h = headers(&["Name", "Email 1", "Email 2", "Due"]);
        let err = schema().verify_headers(&h).unwrap_err().to_string();
        assert!(err.contains("Troop"));
        assert!(err.contains("Reg"));
        assert!(err.contains("Paid"));
    }

    #[test]
    fn test_sts_colnames() {
        let ledger = LedgerColumns::DuePaid {
            amount_due: "Due".to_string(),
            amount_paid: "Paid".to_string(),
            amount_due_sts: Some("STS".to_string()),
            amount_paid_sts: Some("Paid STS".to_string()),
        };
        assert_eq!(ledger.colnames(), vec!["Due", "Paid", "STS", "Paid STS"]);
    }

    #[test]
    fn test_ledger_serde() {
        let json = r#"{"mode":"paid_flag","paid_flag":"Zaplaceno"}"#;
        let ledger: LedgerColumns = serde_json::from_str(json).unwrap();
        assert_eq!(
            ledger,
            LedgerColumns::PaidFlag {
                paid_flag: "Zaplaceno".to_string()
            }
        );
        assert_eq!(serde_json::to_string(&ledger).unwrap(), json);
    }
}
