//! Serializes a `PaymentRecord` into the short-form payment-order string defined by the
//! QR Platba standard (https://qr-platba.cz/). The resulting single-line ASCII string is what a
//! barcode renderer turns into the QR image; this module's contract ends at the string.

use crate::model::PaymentRecord;

/// The literal leader identifying the protocol version.
const SPD_LEADER: &str = "SPD*1.0";

/// Encodes the record into the fixed key-value grammar:
///
/// `SPD*1.0*ACC:<iban>*AM:<amount>*CC:<currency>*MSG:<message>*X-VS:<vs>*X-SS:<ss>[*DT:<date>]`
///
/// The field order is fixed and must not be reordered; it matches the published standard. The
/// amount always carries exactly two decimal places, and the trailing due-date segment is
/// emitted only when `include_due_date` is set.
pub fn encode(record: &PaymentRecord, include_due_date: bool) -> String {
    let mut code = format!(
        "{SPD_LEADER}*ACC:{acc}*AM:{amount}*CC:{currency}*MSG:{message}*X-VS:{vs}*X-SS:{ss}",
        acc = record.iban(),
        amount = record.amount().qr_format(),
        currency = record.currency(),
        message = record.message(),
        vs = record.variable_symbol(),
        ss = record.specific_symbol(),
    );
    if include_due_date {
        code.push_str(&format!("*DT:{}", record.qr_due_date()));
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LedgerColumns, PaymentTerms, RosterRow, SchemaConfig, TroopTable};
    use crate::PaymentConfig;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn record(due: &str, paid: &str) -> PaymentRecord {
        let schema = SchemaConfig::new(
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
        );
        let troops = TroopTable::parse(&["Sokol, SK, 07, Jana, j@example.com"]).unwrap();
        let payment = PaymentConfig::new(
            "CZ6508000000192000145399",
            "99",
            None,
            "CZK",
            "Prispevky {troop_code} {name}",
            10,
            true,
        );
        let terms =
            PaymentTerms::new(&payment, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()).unwrap();
        let fields: HashMap<String, String> = [
            ("Name", "Jana Nováková"),
            ("Troop", "Sokol"),
            ("Reg", "042"),
            ("Due", due),
            ("Paid", paid),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let row = RosterRow::new(2, fields);
        PaymentRecord::build(&row, &schema, &troops, &terms).unwrap()
    }

    #[test]
    fn test_encode_full() {
        let code = encode(&record("500", "0"), true);
        assert_eq!(
            code,
            "SPD*1.0*ACC:CZ6508000000192000145399*AM:500.00*CC:CZK\
            *MSG:Prispevky SK Jana Novakova*X-VS:042*X-SS:9907*DT:20260115"
        );
    }

    #[test]
    fn test_encode_without_due_date() {
        let code = encode(&record("500", "0"), false);
        assert!(code.starts_with("SPD*1.0*ACC:"));
        assert!(!code.contains("*DT:"));
        assert!(code.ends_with("*X-SS:9907"));
    }

    #[test]
    fn test_amount_always_two_decimals() {
        assert!(encode(&record("150", "0"), false).contains("*AM:150.00*"));
        // Thousands separators in the ledger cells must not leak into the code.
        assert!(encode(&record("1 500", "1 000"), false).contains("*AM:500.00*"));
    }

    #[test]
    fn test_encode_is_ascii() {
        let code = encode(&record("500", "0"), true);
        assert!(code.is_ascii());
    }

    #[test]
    fn test_field_order_fixed() {
        let code = encode(&record("500", "0"), true);
        let keys: Vec<&str> = code
            .split('*')
            .skip(2) // "SPD", "1.0"
            .map(|seg| seg.split(':').next().unwrap())
            .collect();
        assert_eq!(keys, vec!["ACC", "AM", "CC", "MSG", "X-VS", "X-SS", "DT"]);
    }
}
